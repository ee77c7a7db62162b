//! The plan builder: computes the target container and the source→target
//! stream mapping.
//!
//! For each retained source stream the builder emits a target stream that is
//! either a verbatim copy (when its format is accepted and its options fit
//! the configured template) or a transcode to the per-kind default format.
//! Forced extra audio tracks are appended afterwards, then dispositions are
//! normalized so each kind has exactly one default stream.

use crate::container::{Container, ContainerFormat};
use crate::error::{Error, Result};
use crate::formats::Format;
use crate::options::{OptionClass, Options, StreamOption};
use crate::streams::{Stream, StreamKind};
use std::collections::HashMap;
use std::path::Path;

/// Everything the builder needs from configuration.
#[derive(Debug, Default)]
pub struct PlanConfig {
    /// Template options per accepted format name. A format present here is
    /// accepted by the target container.
    pub templates: HashMap<&'static str, Options>,
    /// Fallback format and options per kind, for sources whose format is not
    /// accepted.
    pub defaults: HashMap<StreamKind, (&'static Format, Options)>,
    /// Accepted audio languages (bibliographic three-letter codes).
    pub audio_languages: Vec<String>,
    /// Accepted subtitle languages.
    pub subtitle_languages: Vec<String>,
    /// Per-kind flag: copy source options verbatim instead of enforcing the
    /// template.
    pub prefer_copy: HashMap<StreamKind, bool>,
    /// Audio formats to force-create from the best source per language.
    pub extra_audio: Vec<&'static Format>,
}

impl PlanConfig {
    pub fn accepts(&self, format: &Format) -> bool {
        self.templates.contains_key(format.name)
    }

    fn prefers_copy(&self, kind: StreamKind) -> bool {
        self.prefer_copy.get(&kind).copied().unwrap_or(false)
    }
}

/// The computed target container and its stream mapping.
///
/// Mapping pairs are (source absolute index, target absolute index) in target
/// insertion order; paired streams always share a kind. A source index can
/// back more than one target when extra tracks are forced.
#[derive(Debug)]
pub struct Plan {
    pub target: Container,
    pub mapping: Vec<(usize, usize)>,
}

/// Builds a [`Plan`] from a source container and configuration.
pub struct PlanBuilder<'a> {
    source: &'a Container,
    config: &'a PlanConfig,
    target: Container,
    mapping: Vec<(usize, usize)>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(
        source: &'a Container,
        config: &'a PlanConfig,
        target_format: ContainerFormat,
        target_path: &Path,
    ) -> Self {
        Self {
            source,
            config,
            target: Container::new(target_format, target_path),
            mapping: Vec::new(),
        }
    }

    pub fn build(mut self) -> Result<Plan> {
        self.plan_source_streams()?;
        self.plan_extra_audio();
        self.target.fix_disposition();
        Ok(Plan {
            target: self.target,
            mapping: self.mapping,
        })
    }

    fn plan_source_streams(&mut self) -> Result<()> {
        let source = self.source;
        for (index, stream) in source.streams().iter().enumerate() {
            if !stream.format().enabled {
                tracing::debug!(
                    "skipping stream {index}: format {} is disabled",
                    stream.format().name
                );
                continue;
            }

            if !self.language_accepted(stream) {
                tracing::debug!(
                    "skipping stream {index}: language {:?} not accepted",
                    stream.language()
                );
                continue;
            }

            let target_stream = if self.config.accepts(stream.format()) {
                self.conforming_stream(stream)
            } else {
                self.transcoded_stream(stream)?
            };

            let mut target_stream = target_stream;
            self.overlay_template_metadata(&mut target_stream);

            // ffmpeg cannot rasterize image subtitles into text.
            if stream.kind() == StreamKind::Subtitle
                && stream.format().is_image
                && !target_stream.format().is_image
            {
                tracing::info!(
                    "dropping stream {index}: image subtitle {} cannot become {}",
                    stream.format().name,
                    target_stream.format().name
                );
                continue;
            }

            self.push_mapping(index, target_stream)?;
        }
        Ok(())
    }

    /// True when the stream's language passes the per-kind accept list.
    /// Video is never language-gated.
    fn language_accepted(&self, stream: &Stream) -> bool {
        let accepted = match stream.kind() {
            StreamKind::Audio => &self.config.audio_languages,
            StreamKind::Subtitle => &self.config.subtitle_languages,
            _ => return true,
        };
        match stream.language() {
            Some(lang) => accepted.iter().any(|a| a == lang),
            None => false,
        }
    }

    /// The accepted-format path: same format, options conforming to the
    /// template (or copied verbatim under prefer_copy).
    fn conforming_stream(&self, stream: &Stream) -> Stream {
        let mut target = Stream::new(stream.format());

        if self.config.prefers_copy(stream.kind()) {
            target.add_options(stream.options().iter().cloned());
            return target;
        }

        let template = &self.config.templates[stream.format().name];
        let conflicts = stream.options().diff(template);
        for opt in stream.options() {
            match template.get(opt.kind()) {
                Some(wanted) if conflicts.has(opt.kind()) => {
                    target.add_option(wanted.clone());
                }
                _ => {
                    target.add_option(opt.clone());
                }
            }
        }
        target
    }

    /// The transcode path: default format for the kind, default options, and
    /// remaining attributes carried over from the source.
    fn transcoded_stream(&self, stream: &Stream) -> Result<Stream> {
        let (format, options) = self.config.defaults.get(&stream.kind()).ok_or_else(|| {
            Error::plan(format!(
                "no default format configured for {} streams",
                stream.kind()
            ))
        })?;

        let mut target = Stream::new(*format);
        target.add_options(options.iter().cloned());
        fill_from_source(&mut target, stream);
        Ok(target)
    }

    /// Mux-time metadata from the target format's template always wins.
    fn overlay_template_metadata(&self, target: &mut Stream) {
        if let Some(template) = self.config.templates.get(target.format().name) {
            for opt in template {
                if opt.class() == OptionClass::Metadata {
                    target.add_option(opt.clone());
                }
            }
        }
    }

    /// Force-create configured audio formats from the best source stream per
    /// accepted language, without inventing quality or duplicating tracks.
    fn plan_extra_audio(&mut self) {
        let config = self.config;
        let source = self.source;
        if config.extra_audio.is_empty() {
            return;
        }

        for lang in &config.audio_languages {
            let Some(best) = best_audio_source(source, lang) else {
                continue;
            };
            let Some(source_index) = source.absolute_index(best.uid()) else {
                continue;
            };

            for format in &config.extra_audio {
                let Some(template) = config.templates.get(format.name) else {
                    tracing::debug!(
                        "not forcing {}: no template for the format",
                        format.name
                    );
                    continue;
                };

                let mut extra = Stream::new(*format);
                extra.add_options(template.iter().cloned());
                fill_from_source(&mut extra, best);

                if self.suppress_extra(best, &extra) {
                    continue;
                }

                tracing::info!(
                    "forcing extra {} track for language {lang}",
                    format.name
                );
                if let Err(e) = self.push_mapping(source_index, extra) {
                    tracing::warn!("could not map extra track: {e}");
                }
            }
        }
    }

    /// Extra tracks are suppressed rather than upgraded or duplicated:
    /// never more bits or channels than the source has, and never a second
    /// track equal-or-worse than one already planned for the language.
    fn suppress_extra(&self, source: &Stream, extra: &Stream) -> bool {
        if source.format() == extra.format() {
            if let (Some(s), Some(t)) = (source.bitrate(), extra.bitrate()) {
                if t > s {
                    return true;
                }
            }
            if let (Some(s), Some(t)) = (source.channels(), extra.channels()) {
                if t > s {
                    return true;
                }
            }
        }

        self.target.audio_streams().any(|planned| {
            planned.format() == extra.format()
                && planned.language() == extra.language()
                && planned.bitrate().unwrap_or(0) >= extra.bitrate().unwrap_or(0)
        })
    }

    fn push_mapping(&mut self, source_index: usize, target_stream: Stream) -> Result<()> {
        let source_stream = self
            .source
            .stream(source_index)
            .ok_or_else(|| Error::plan(format!("no source stream at index {source_index}")))?;
        if source_stream.kind() != target_stream.kind() {
            return Err(Error::plan(format!(
                "kind mismatch mapping stream {source_index}: {} -> {}",
                source_stream.kind(),
                target_stream.kind()
            )));
        }

        let target_index = self.target.add_stream(target_stream);
        self.mapping.push((source_index, target_index));
        Ok(())
    }
}

/// Carry source attributes into the target for every kind the target does
/// not set yet.
fn fill_from_source(target: &mut Stream, source: &Stream) {
    for opt in source.options() {
        if !target.options().has(opt.kind()) {
            target.add_option(opt.clone());
        }
    }
}

/// The best transcode source among a language's audio streams, ranked by
/// format score, then channel count, then bitrate. Ties keep the earlier
/// stream.
fn best_audio_source<'c>(container: &'c Container, lang: &str) -> Option<&'c Stream> {
    let mut best: Option<(&Stream, (i32, u32, u32))> = None;
    for stream in container
        .audio_streams()
        .filter(|s| s.language() == Some(lang))
    {
        let key = (
            stream.format().score,
            stream.channels().unwrap_or(0),
            stream.bitrate().unwrap_or(0),
        );
        match &best {
            Some((_, best_key)) if key <= *best_key => {}
            _ => best = Some((stream, key)),
        }
    }
    best.map(|(stream, _)| stream)
}

/// Log the mapping at debug level, one line per pair.
pub fn log_mapping(source: &Container, plan: &Plan) {
    for (src, tgt) in &plan.mapping {
        let (Some(s), Some(t)) = (source.stream(*src), plan.target.stream(*tgt)) else {
            continue;
        };
        tracing::debug!(
            "map {src}:{} -> {tgt}:{}",
            s.format().name,
            t.format().name
        );
    }
}
