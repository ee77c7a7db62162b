//! Wires validated configuration into the conversion core and runs a single
//! source file through probe, plan, command synthesis, and execution.

use crate::config::{self, Config, ContainerPolicy};
use crate::workflow::JobError;
use mediamill_convert::capabilities::Capabilities;
use mediamill_convert::command;
use mediamill_convert::container::{Container, ContainerFormat};
use mediamill_convert::encoders::{EncoderRegistry, EncoderSelector};
use mediamill_convert::exec::ExecDriver;
use mediamill_convert::formats::Format;
use mediamill_convert::options::{Options, StreamOption};
use mediamill_convert::plan::{self, PlanBuilder, PlanConfig};
use mediamill_convert::probe;
use mediamill_convert::streams::StreamKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// A target-container conversion profile resolved from configuration.
///
/// Building one is cheap apart from the transcoder capability probe, which
/// runs once per profile.
pub struct Conversion {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    target_format: ContainerFormat,
    plan_config: PlanConfig,
    registry: EncoderRegistry,
    encoder_defaults: HashMap<String, Vec<StreamOption>>,
    preferred_encoders: HashMap<String, String>,
    preopts: Vec<String>,
    postopts: Vec<String>,
}

impl Conversion {
    /// Resolve the profile for one of the configured target containers.
    pub fn from_config(config: &Config, target: &str) -> Result<Self, JobError> {
        let policy = config
            .containers
            .get(target)
            .ok_or_else(|| JobError::Config(format!("no configured container named {target:?}")))?;
        let target_format: ContainerFormat = target
            .parse()
            .map_err(|e| JobError::Config(format!("container {target:?}: {e}")))?;

        let ffmpeg = resolve_tool(&config.ffmpeg.ffmpeg)?;
        let ffprobe = resolve_tool(&config.ffmpeg.ffprobe)?;

        let capabilities = Capabilities::detect(&ffmpeg)?;
        tracing::debug!(
            "transcoder reports {} encoders",
            capabilities.encoder_count()
        );
        let registry = EncoderRegistry::new(&capabilities);

        let plan_config = build_plan_config(config, policy)?;
        let encoder_defaults = build_encoder_defaults(config);

        let mut preopts = policy.preopts.clone();
        if config.ffmpeg.threads != "auto" {
            preopts.extend(["-threads".to_string(), config.ffmpeg.threads.clone()]);
        }

        Ok(Self {
            ffmpeg,
            ffprobe,
            target_format,
            plan_config,
            registry,
            encoder_defaults,
            preferred_encoders: config
                .preferred_encoders
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            preopts,
            postopts: policy.postopts.clone(),
        })
    }

    pub fn target_format(&self) -> ContainerFormat {
        self.target_format
    }

    /// Probe the source and synthesize the transcoder argv without running
    /// anything. This is the dry-run surface.
    pub fn plan_command(
        &self,
        input: &Path,
        work_file: &Path,
    ) -> Result<Vec<String>, mediamill_convert::Error> {
        let (argv, _) = self.prepare(input, work_file)?;
        Ok(argv)
    }

    /// Run the full conversion, reporting progress fractions to the callback.
    /// On success the returned container describes the working file.
    pub fn run<F>(
        &self,
        input: &Path,
        work_file: &Path,
        cancel: &AtomicBool,
        on_progress: F,
    ) -> Result<Container, mediamill_convert::Error>
    where
        F: FnMut(f32),
    {
        let (argv, target) = self.prepare(input, work_file)?;
        tracing::debug!("transcoder command: {}", argv.join(" "));

        ExecDriver::new().run(&argv, cancel, on_progress)?;
        Ok(target)
    }

    fn prepare(
        &self,
        input: &Path,
        work_file: &Path,
    ) -> Result<(Vec<String>, Container), mediamill_convert::Error> {
        let source = probe(&self.ffprobe, input)?;
        let built = PlanBuilder::new(&source, &self.plan_config, self.target_format, work_file)
            .build()?;
        if built.mapping.is_empty() {
            return Err(mediamill_convert::Error::plan(
                "no mappable streams in source",
            ));
        }
        plan::log_mapping(&source, &built);

        let selector = EncoderSelector::new(
            &self.registry,
            &self.encoder_defaults,
            &self.preferred_encoders,
        );
        let argv = command::synthesize(
            &self.ffmpeg,
            &source,
            &built,
            &selector,
            &self.preopts,
            &self.postopts,
        )?;
        Ok((argv, built.target))
    }
}

fn resolve_tool(configured: &Path) -> Result<PathBuf, JobError> {
    if configured.components().count() > 1 {
        if configured.exists() {
            return Ok(configured.to_path_buf());
        }
        return Err(JobError::Config(format!(
            "configured tool {:?} does not exist",
            configured
        )));
    }
    which::which(configured)
        .map_err(|_| JobError::Config(format!("tool {:?} not found on PATH", configured)))
}

/// Translate a container policy into the plan builder's inputs.
fn build_plan_config(config: &Config, policy: &ContainerPolicy) -> Result<PlanConfig, JobError> {
    let mut plan_config = PlanConfig {
        audio_languages: config.languages.audio.clone(),
        subtitle_languages: config.languages.subtitle.clone(),
        ..PlanConfig::default()
    };

    plan_config
        .prefer_copy
        .insert(StreamKind::Video, policy.video.prefer_copy);
    plan_config
        .prefer_copy
        .insert(StreamKind::Audio, policy.audio.prefer_copy);
    plan_config
        .prefer_copy
        .insert(StreamKind::Subtitle, policy.subtitle.prefer_copy);

    let accepted = policy
        .video
        .accepted_track_formats
        .iter()
        .chain(&policy.audio.accepted_track_formats)
        .chain(&policy.subtitle.accepted_track_formats);
    for name in accepted {
        let format = lookup_format(name)?;
        plan_config
            .templates
            .insert(format.name, template_options(config, format));
    }

    for (kind, default_name) in [
        (StreamKind::Video, &policy.video.default_format),
        (StreamKind::Audio, &policy.audio.default_format),
        (StreamKind::Subtitle, &policy.subtitle.default_format),
    ] {
        let format = lookup_format(default_name)?;
        plan_config
            .defaults
            .insert(kind, (format, template_options(config, format)));
    }

    for name in &policy.audio.force_create_tracks {
        plan_config.extra_audio.push(lookup_format(name)?);
    }

    Ok(plan_config)
}

fn lookup_format(name: &str) -> Result<&'static Format, JobError> {
    mediamill_convert::formats::lookup(name)
        .ok_or_else(|| JobError::Config(format!("unknown stream format {name:?}")))
}

/// The configured option template for a format, empty when the config has no
/// section for it.
fn template_options(config: &Config, format: &'static Format) -> Options {
    let mut options = Options::unique();
    let Some(section) = config.stream_formats.get(format.name) else {
        return options;
    };
    for (key, value) in section {
        match config::parse_option(key, value) {
            Some(opt) => options.add(opt),
            None => tracing::warn!(
                "[stream_formats.{}]: ignoring option {key:?}",
                format.name
            ),
        }
    }
    options
}

fn build_encoder_defaults(config: &Config) -> HashMap<String, Vec<StreamOption>> {
    let mut defaults = HashMap::new();
    for (encoder, section) in &config.encoder_options {
        let mut options = Vec::new();
        for (key, value) in section {
            match config::parse_option(key, value) {
                Some(opt) => options.push(opt),
                None => tracing::warn!(
                    "[encoder_options.{encoder}]: ignoring option {key:?}"
                ),
            }
        }
        defaults.insert(encoder.clone(), options);
    }
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediamill_convert::options::OptionKind;

    fn test_config() -> Config {
        let toml_src = r#"
            [languages]
            audio = ["eng", "fre"]
            subtitle = ["eng"]

            [containers.mp4.video]
            accepted_track_formats = ["h264"]
            default_format = "h264"
            prefer_copy = true

            [containers.mp4.audio]
            accepted_track_formats = ["aac"]
            default_format = "aac"
            prefer_copy = true
            force_create_tracks = ["aac"]

            [containers.mp4.subtitle]
            accepted_track_formats = ["mov_text"]
            default_format = "mov_text"

            [stream_formats.aac]
            bitrate = 256
            channels = 2

            [encoder_options.h264]
            crf = 19
        "#;
        let mut config: Config = toml::from_str(toml_src).unwrap();
        crate::config::validate_config(&mut config).unwrap();
        config
    }

    #[test]
    fn test_build_plan_config() {
        let config = test_config();
        let policy = &config.containers["mp4"];
        let plan_config = build_plan_config(&config, policy).unwrap();

        assert!(plan_config.templates.contains_key("aac"));
        assert!(plan_config.templates.contains_key("h264"));
        assert!(plan_config.templates.contains_key("mov_text"));

        let aac_template = &plan_config.templates["aac"];
        assert!(aac_template.has(OptionKind::Bitrate));
        assert!(aac_template.has(OptionKind::Channels));

        let (format, _) = &plan_config.defaults[&StreamKind::Audio];
        assert_eq!(format.name, "aac");
        assert_eq!(plan_config.extra_audio.len(), 1);
        assert_eq!(plan_config.audio_languages, vec!["eng", "fre"]);
    }

    #[test]
    fn test_encoder_defaults() {
        let config = test_config();
        let defaults = build_encoder_defaults(&config);
        assert_eq!(defaults["h264"], vec![StreamOption::Crf(19)]);
    }
}
