//! FFprobe adapter: runs the prober and parses its JSON into a [`Container`].

use crate::container::{Container, ContainerFormat};
use crate::error::{Error, Result};
use crate::formats;
use crate::options::StreamOption;
use crate::streams::{Stream, StreamKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: String,
    filename: String,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    pix_fmt: Option<String>,
    bit_rate: Option<String>,
    channels: Option<u32>,
    height: Option<u32>,
    width: Option<u32>,
    level: Option<f64>,
    profile: Option<String>,
    #[serde(default)]
    disposition: BTreeMap<String, u8>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    language: Option<String>,
    #[serde(rename = "BPS")]
    bps: Option<String>,
}

/// Probe a media file and build the source container.
pub fn probe(ffprobe: &Path, path: &Path) -> Result<Container> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }

    let output = Command::new(ffprobe)
        .args(["-show_format", "-show_streams", "-hide_banner", "-print_format", "json"])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(ffprobe.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    parse_probe_json(&String::from_utf8_lossy(&output.stdout))
}

/// Probe a media file and return the raw prober JSON unprocessed.
pub fn probe_json(ffprobe: &Path, path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }

    let output = Command::new(ffprobe)
        .args(["-show_format", "-show_streams", "-hide_banner", "-print_format", "json"])
        .arg(path)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse prober JSON into a source container. Fails when the `streams` or
/// `format` keys are missing or a stream's codec is unknown.
pub fn parse_probe_json(json: &str) -> Result<Container> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| Error::probe(format!("unusable ffprobe output: {e}")))?;

    let format = container_format(&output.format.format_name)?;
    let mut container = Container::new(format, &output.format.filename);

    for (index, raw) in output.streams.iter().enumerate() {
        let codec = raw.codec_name.as_deref().unwrap_or("");
        let format = formats::lookup(codec)
            .ok_or_else(|| Error::probe(format!("stream {index}: unknown codec {codec:?}")))?;

        let mut stream = Stream::new(format);
        match format.kind {
            StreamKind::Video => {
                if let Some(pix_fmt) = &raw.pix_fmt {
                    stream.add_option(StreamOption::PixelFormat(pix_fmt.clone()));
                }
                if let Some(height) = raw.height {
                    stream.add_option(StreamOption::Height(height));
                }
                if let Some(width) = raw.width {
                    stream.add_option(StreamOption::Width(width));
                }
                stream.add_option(StreamOption::Bitrate(bitrate_kbps(raw)));
                stream.add_option(StreamOption::Disposition(raw.disposition.clone()));
                if let Some(level) = raw.level {
                    // ffprobe reports 40 for level 4.0
                    stream.add_option(StreamOption::Level((level / 10.0) as f32));
                }
                if let Some(profile) = &raw.profile {
                    stream.add_option(StreamOption::Profile(profile.clone()));
                }
            }
            StreamKind::Audio => {
                if let Some(channels) = raw.channels {
                    stream.add_option(StreamOption::Channels(channels));
                }
                stream.add_option(StreamOption::Language(language(raw)));
                stream.add_option(StreamOption::Bitrate(bitrate_kbps(raw)));
                stream.add_option(StreamOption::Disposition(raw.disposition.clone()));
            }
            StreamKind::Subtitle => {
                stream.add_option(StreamOption::Language(language(raw)));
                stream.add_option(StreamOption::Disposition(raw.disposition.clone()));
            }
            StreamKind::Image => {}
        }

        container.add_stream(stream);
    }

    Ok(container)
}

fn container_format(format_name: &str) -> Result<ContainerFormat> {
    let lowered = format_name.to_lowercase();
    if lowered.contains("matroska") {
        Ok(ContainerFormat::Matroska)
    } else if lowered.contains("mp4") {
        Ok(ContainerFormat::Mp4)
    } else if lowered.contains("avi") {
        Ok(ContainerFormat::Avi)
    } else {
        Err(Error::UnsupportedFormat {
            format: format_name.to_string(),
        })
    }
}

/// Bitrate in kbps, preferring the stream field, then `tags.BPS`, then 0.
fn bitrate_kbps(raw: &ProbeStream) -> u32 {
    let bps = raw
        .bit_rate
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .or_else(|| raw.tags.bps.as_deref().and_then(|s| s.parse::<u64>().ok()))
        .unwrap_or(0);
    (bps / 1000) as u32
}

fn language(raw: &ProbeStream) -> String {
    raw.tags
        .language
        .clone()
        .unwrap_or_else(|| crate::language::UNDETERMINED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionKind;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "profile": "High",
                "pix_fmt": "yuv420p",
                "level": 40,
                "width": 1920,
                "height": 800,
                "bit_rate": "2052000",
                "disposition": {"default": 1, "forced": 0}
            },
            {
                "index": 1,
                "codec_name": "ac3",
                "codec_type": "audio",
                "channels": 6,
                "bit_rate": "384000",
                "disposition": {"default": 1},
                "tags": {"language": "fre"}
            },
            {
                "index": 2,
                "codec_name": "aac",
                "codec_type": "audio",
                "channels": 2,
                "disposition": {"default": 0},
                "tags": {"language": "eng", "BPS": "127987"}
            },
            {
                "index": 3,
                "codec_name": "ass",
                "codec_type": "subtitle",
                "disposition": {"default": 0},
                "tags": {"language": "eng"}
            }
        ],
        "format": {
            "filename": "/downloads/movie.mkv",
            "format_name": "matroska,webm"
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let c = parse_probe_json(SAMPLE).unwrap();
        assert_eq!(c.format(), ContainerFormat::Matroska);
        assert_eq!(c.path(), Path::new("/downloads/movie.mkv"));
        assert_eq!(c.streams().len(), 4);

        let video = c.stream(0).unwrap();
        assert_eq!(video.format().name, "h264");
        assert_eq!(
            video.options().get(OptionKind::PixelFormat),
            Some(&StreamOption::PixelFormat("yuv420p".into()))
        );
        assert_eq!(video.options().get(OptionKind::Level), Some(&StreamOption::Level(4.0)));
        assert_eq!(video.bitrate(), Some(2052));

        let ac3 = c.stream(1).unwrap();
        assert_eq!(ac3.format().name, "ac3");
        assert_eq!(ac3.language(), Some("fre"));
        assert_eq!(ac3.channels(), Some(6));
        assert_eq!(ac3.bitrate(), Some(384));

        // bit_rate missing: falls back to tags.BPS
        let aac = c.stream(2).unwrap();
        assert_eq!(aac.bitrate(), Some(127));

        // "ass" is an alias of the ssa format
        let sub = c.stream(3).unwrap();
        assert_eq!(sub.format().name, "ssa");
        assert_eq!(sub.kind(), StreamKind::Subtitle);
    }

    #[test]
    fn test_missing_streams_key_fails() {
        let json = r#"{"format": {"filename": "a.mkv", "format_name": "matroska"}}"#;
        assert!(matches!(parse_probe_json(json), Err(Error::Probe { .. })));
    }

    #[test]
    fn test_missing_format_key_fails() {
        let json = r#"{"streams": []}"#;
        assert!(matches!(parse_probe_json(json), Err(Error::Probe { .. })));
    }

    #[test]
    fn test_unknown_codec_fails() {
        let json = r#"{
            "streams": [{"index": 0, "codec_name": "binkvideo", "codec_type": "video"}],
            "format": {"filename": "a.avi", "format_name": "avi"}
        }"#;
        assert!(matches!(parse_probe_json(json), Err(Error::Probe { .. })));
    }

    #[test]
    fn test_unsupported_container_fails() {
        let json = r#"{"streams": [], "format": {"filename": "a.ogv", "format_name": "ogg"}}"#;
        assert!(matches!(
            parse_probe_json(json),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_language_defaults_to_und() {
        let json = r#"{
            "streams": [{"index": 0, "codec_name": "aac", "codec_type": "audio", "channels": 2}],
            "format": {"filename": "a.mp4", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
        }"#;
        let c = parse_probe_json(json).unwrap();
        assert_eq!(c.stream(0).unwrap().language(), Some("und"));
        assert_eq!(c.stream(0).unwrap().bitrate(), Some(0));
    }
}
