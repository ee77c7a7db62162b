mod types;

pub use types::*;

use anyhow::{Context, Result};
use mediamill_convert::container::ContainerFormat;
use mediamill_convert::options::StreamOption;
use mediamill_convert::{formats, language};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file and validate it.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&mut config)?;

    Ok(config)
}

/// Load config from default locations or fall back to built-in defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = find_config_file(custom_path) {
        return load_config(&path);
    }

    let mut config = Config::default();
    validate_config(&mut config)?;
    Ok(config)
}

/// Like [`load_config_or_default`], with TOML snippets merged over the file
/// before validation. Later snippets win; tables merge recursively.
pub fn load_config_with_overrides(
    custom_path: Option<&Path>,
    overrides: &[String],
) -> Result<Config> {
    if overrides.is_empty() {
        return load_config_or_default(custom_path);
    }

    let mut value: toml::Value = match find_config_file(custom_path) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        }
        None => toml::Value::try_from(Config::default())
            .context("could not serialize default configuration")?,
    };

    for snippet in overrides {
        let patch: toml::Value = toml::from_str(snippet)
            .with_context(|| format!("invalid configuration override {snippet:?}"))?;
        merge_value(&mut value, patch);
    }

    let mut config: Config = value
        .try_into()
        .context("configuration invalid after overrides")?;
    validate_config(&mut config)?;
    Ok(config)
}

fn find_config_file(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    let default_paths = [
        "./mediamill.toml",
        "~/.config/mediamill/config.toml",
        "/etc/mediamill/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }
    None
}

fn merge_value(base: &mut toml::Value, patch: toml::Value) {
    match (base, patch) {
        (toml::Value::Table(base), toml::Value::Table(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Normalize and validate configuration in place: collapse codec aliases,
/// canonicalize language codes, expand directories, and reject references to
/// unknown formats or containers.
pub fn validate_config(config: &mut Config) -> Result<()> {
    for (name, policy) in &mut config.containers {
        name.parse::<ContainerFormat>()
            .map_err(|e| anyhow::anyhow!("container section [{name}]: {e}"))?;

        canonicalize_formats(&mut policy.video.accepted_track_formats, name)?;
        canonicalize_formats(&mut policy.audio.accepted_track_formats, name)?;
        canonicalize_formats(&mut policy.subtitle.accepted_track_formats, name)?;
        canonicalize_formats(&mut policy.audio.force_create_tracks, name)?;

        for default in [
            &mut policy.video.default_format,
            &mut policy.audio.default_format,
            &mut policy.subtitle.default_format,
        ] {
            let format = formats::lookup(default)
                .ok_or_else(|| anyhow::anyhow!("container [{name}]: unknown default format {default:?}"))?;
            *default = format.name.to_string();
        }
    }

    config.languages.audio = language::normalize_all(&config.languages.audio);
    config.languages.subtitle = language::normalize_all(&config.languages.subtitle);

    // Template section keys must name known formats too.
    let keys: Vec<String> = config.stream_formats.keys().cloned().collect();
    for key in keys {
        let Some(format) = formats::lookup(&key) else {
            anyhow::bail!("stream_formats section names unknown format {key:?}");
        };
        if format.name != key {
            if let Some(options) = config.stream_formats.remove(&key) {
                config
                    .stream_formats
                    .entry(format.name.to_string())
                    .or_insert(options);
            }
        }
    }

    for path in [
        &mut config.file.work_directory,
        &mut config.file.copy_to,
        &mut config.file.move_to,
    ]
    .into_iter()
    .flatten()
    {
        *path = expand_path(path);
    }

    Ok(())
}

fn canonicalize_formats(names: &mut Vec<String>, section: &str) -> Result<()> {
    let mut out: Vec<String> = Vec::new();
    for name in names.iter() {
        let format = formats::lookup(name)
            .ok_or_else(|| anyhow::anyhow!("container [{section}]: unknown format {name:?}"))?;
        let canonical = format.name.to_string();
        if !out.contains(&canonical) {
            out.push(canonical);
        }
    }
    *names = out;
    Ok(())
}

fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy().into_owned();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.as_ref())
}

/// Build a stream option from a configuration key/value pair. Unknown keys
/// and null-ish sentinels yield None and are dropped with a log line by
/// callers.
pub fn parse_option(name: &str, value: &toml::Value) -> Option<StreamOption> {
    fn as_u32(value: &toml::Value) -> Option<u32> {
        value.as_integer().filter(|v| *v >= 0).map(|v| v as u32)
    }
    fn as_string(value: &toml::Value) -> Option<String> {
        match value {
            toml::Value::String(s) if !s.is_empty() => Some(s.clone()),
            toml::Value::Array(items) => items.first().and_then(as_string),
            _ => None,
        }
    }

    match name.to_lowercase().as_str() {
        "bitrate" => as_u32(value).map(StreamOption::Bitrate),
        "channels" => as_u32(value).map(StreamOption::Channels),
        "height" => as_u32(value).map(StreamOption::Height),
        "width" => as_u32(value).map(StreamOption::Width),
        "crf" => as_u32(value).map(StreamOption::Crf),
        "level" => value
            .as_float()
            .or_else(|| value.as_integer().map(|v| v as f64))
            .filter(|v| *v >= 0.0)
            .map(|v| StreamOption::Level(v as f32)),
        "pix_fmt" | "pixel_format" => as_string(value).map(StreamOption::PixelFormat),
        "profile" => as_string(value).map(StreamOption::Profile),
        "language" => as_string(value).map(StreamOption::Language),
        "tag" => as_string(value).map(StreamOption::Tag),
        "filter" => as_string(value).map(StreamOption::Filter),
        "bsf" | "bitstream_filter" => as_string(value).map(StreamOption::BitstreamFilter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let mut config = Config::default();
        assert!(validate_config(&mut config).is_ok());
        assert!(config.containers.contains_key("mp4"));
    }

    #[test]
    fn test_alias_collapse() {
        let toml_src = r#"
            [containers.mp4.video]
            accepted_track_formats = ["x264", "h265", "hevc"]
            default_format = "h265"
        "#;
        let mut config: Config = toml::from_str(toml_src).unwrap();
        validate_config(&mut config).unwrap();

        let video = &config.containers["mp4"].video;
        assert_eq!(video.accepted_track_formats, vec!["h264", "hevc"]);
        assert_eq!(video.default_format, "hevc");
    }

    #[test]
    fn test_language_normalization() {
        let toml_src = r#"
            [languages]
            audio = ["en", "fra", "klingon"]
            subtitle = ["english"]
        "#;
        let mut config: Config = toml::from_str(toml_src).unwrap();
        validate_config(&mut config).unwrap();
        assert_eq!(config.languages.audio, vec!["eng", "fre"]);
        assert_eq!(config.languages.subtitle, vec!["eng"]);
    }

    #[test]
    fn test_unknown_container_rejected() {
        let toml_src = r#"
            [containers.ogg.video]
            default_format = "theora"
        "#;
        let mut config: Config = toml::from_str(toml_src).unwrap();
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let toml_src = r#"
            [containers.mp4.video]
            accepted_track_formats = ["h264", "realvideo"]
        "#;
        let mut config: Config = toml::from_str(toml_src).unwrap();
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_stream_format_alias_key_renamed() {
        let toml_src = r#"
            [stream_formats.x265]
            crf = 20
        "#;
        let mut config: Config = toml::from_str(toml_src).unwrap();
        validate_config(&mut config).unwrap();
        assert!(config.stream_formats.contains_key("hevc"));
        assert!(!config.stream_formats.contains_key("x265"));
    }

    #[test]
    fn test_parse_option() {
        use toml::Value;

        assert_eq!(
            parse_option("bitrate", &Value::Integer(640)),
            Some(StreamOption::Bitrate(640))
        );
        assert_eq!(parse_option("bitrate", &Value::Integer(-1)), None);
        assert_eq!(
            parse_option("pix_fmt", &Value::String("yuv420p".into())),
            Some(StreamOption::PixelFormat("yuv420p".into()))
        );
        assert_eq!(
            parse_option("level", &Value::Integer(4)),
            Some(StreamOption::Level(4.0))
        );
        assert_eq!(
            parse_option("profile", &Value::Array(vec![Value::String("High".into())])),
            Some(StreamOption::Profile("High".into()))
        );
        assert_eq!(parse_option("unknown_key", &Value::Integer(1)), None);
    }

    #[test]
    fn test_overrides_merge_recursively() {
        let overrides = vec![
            "file.delete_original = true".to_string(),
            "[containers.mp4.audio]\ndefault_format = \"ac3\"".to_string(),
        ];
        let config = load_config_with_overrides(Some(Path::new("/nonexistent")), &overrides);
        // A named but missing config file is an error, not a silent default.
        assert!(config.is_err());

        let config = load_config_with_overrides(None, &overrides).unwrap();
        assert!(config.file.delete_original);
        assert_eq!(config.containers["mp4"].audio.default_format, "ac3");
        // Untouched siblings keep their defaults.
        assert!(config.containers["mp4"].audio.prefer_copy);
        assert!(config.containers.contains_key("matroska"));
    }

    #[test]
    fn test_refresher_base_url() {
        let mut cfg = RefresherConfig::default();
        assert_eq!(cfg.base_url(), "http://localhost:32400");
        cfg.ssl = true;
        cfg.webroot = "/plex/".to_string();
        assert_eq!(cfg.base_url(), "https://localhost:32400/plex");
    }

    #[test]
    fn test_file_mode() {
        let mut file = FileConfig::default();
        assert_eq!(file.mode(), 0o777);
        file.permissions = 644;
        assert_eq!(file.mode(), 0o644);
    }
}
