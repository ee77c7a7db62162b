use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub ffmpeg: FfmpegConfig,

    pub languages: LanguagesConfig,

    pub tagging: TaggingConfig,

    pub file: FileConfig,

    /// Target container policies, keyed by container name (mp4, matroska).
    pub containers: BTreeMap<String, ContainerPolicy>,

    /// Per-format option templates: `[stream_formats.aac] bitrate = 640`.
    pub stream_formats: BTreeMap<String, BTreeMap<String, toml::Value>>,

    /// Preferred encoder (ffmpeg codec name) per format.
    pub preferred_encoders: BTreeMap<String, String>,

    /// Default options per encoder name: `[encoder_options.h264] crf = 19`.
    pub encoder_options: BTreeMap<String, BTreeMap<String, toml::Value>>,

    /// Library refreshers, keyed by refresher name (plex, sickrage).
    pub refreshers: BTreeMap<String, RefresherConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut containers = BTreeMap::new();
        containers.insert("mp4".to_string(), ContainerPolicy::default());
        containers.insert("matroska".to_string(), ContainerPolicy::default());
        Self {
            ffmpeg: FfmpegConfig::default(),
            languages: LanguagesConfig::default(),
            tagging: TaggingConfig::default(),
            file: FileConfig::default(),
            containers,
            stream_formats: BTreeMap::new(),
            preferred_encoders: BTreeMap::new(),
            encoder_options: BTreeMap::new(),
            refreshers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Transcoder binary; a bare name is resolved on PATH.
    pub ffmpeg: PathBuf,

    /// Prober binary.
    pub ffprobe: PathBuf,

    /// Thread count passed through to the transcoder ("auto" leaves the
    /// choice to it).
    pub threads: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            threads: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LanguagesConfig {
    /// Audio languages to retain.
    pub audio: Vec<String>,

    /// Subtitle languages to retain.
    pub subtitle: Vec<String>,

    /// Language metadata fetchers should query in.
    pub tagging: String,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            audio: vec!["eng".to_string()],
            subtitle: vec!["eng".to_string()],
            tagging: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Whether to tag the converted file at all.
    pub tagfile: bool,

    pub preferred_show_tagger: String,

    pub preferred_movie_tagger: String,

    pub download_artwork: bool,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            tagfile: true,
            preferred_show_tagger: "tvdb".to_string(),
            preferred_movie_tagger: "tmdb".to_string(),
            download_artwork: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    /// Where working files are written. Defaults to the source's directory.
    pub work_directory: Option<PathBuf>,

    /// Copy the finished file here. Takes precedence over move_to.
    pub copy_to: Option<PathBuf>,

    /// Move the finished file here.
    pub move_to: Option<PathBuf>,

    /// Delete the source file after a successful deploy.
    pub delete_original: bool,

    /// Octal permission digits applied before deleting, e.g. 777.
    pub permissions: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            work_directory: None,
            copy_to: None,
            move_to: None,
            delete_original: false,
            permissions: 777,
        }
    }
}

impl FileConfig {
    /// The permissions field as a unix mode (the digits are octal).
    pub fn mode(&self) -> u32 {
        u32::from_str_radix(&self.permissions.to_string(), 8).unwrap_or(0o777)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainerPolicy {
    pub video: TrackPolicy,

    pub audio: AudioTrackPolicy,

    pub subtitle: TrackPolicy,

    /// Post-processor names to run after conversion, e.g. "faststart".
    pub post_processors: Vec<String>,

    /// Raw transcoder flags inserted after the input.
    pub preopts: Vec<String>,

    /// Raw transcoder flags inserted before the output.
    pub postopts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackPolicy {
    /// Formats carried over without transcoding (subject to the template).
    pub accepted_track_formats: Vec<String>,

    /// Transcode target for anything not accepted.
    pub default_format: String,

    /// Copy source options verbatim instead of enforcing the template.
    pub prefer_copy: bool,
}

impl Default for TrackPolicy {
    fn default() -> Self {
        Self {
            accepted_track_formats: vec!["h264".to_string(), "hevc".to_string()],
            default_format: "hevc".to_string(),
            prefer_copy: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioTrackPolicy {
    pub accepted_track_formats: Vec<String>,

    pub default_format: String,

    pub prefer_copy: bool,

    /// Audio formats force-created from the best source per language.
    pub force_create_tracks: Vec<String>,
}

impl Default for AudioTrackPolicy {
    fn default() -> Self {
        Self {
            accepted_track_formats: vec!["aac".to_string(), "ac3".to_string()],
            default_format: "aac".to_string(),
            prefer_copy: true,
            force_create_tracks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefresherConfig {
    pub host: String,

    pub port: u16,

    pub ssl: bool,

    /// Path prefix when the server sits behind a reverse proxy.
    pub webroot: String,

    pub refresh: bool,

    /// Plex authentication token.
    pub token: Option<String>,

    /// Sickrage API key.
    pub api_key: Option<String>,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 32400,
            ssl: false,
            webroot: String::new(),
            refresh: false,
            token: None,
            api_key: None,
        }
    }
}

impl RefresherConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let webroot = self.webroot.trim_end_matches('/');
        format!("{scheme}://{}:{}{webroot}", self.host, self.port)
    }
}
