//! Static registry of known stream formats.
//!
//! A format is a codec/representation identifier carried by a stream (h264,
//! aac, mov_text, ...). Each entry declares the option kinds streams of that
//! format may carry, whether the format is enabled for planning, whether a
//! subtitle format is image-based, and a score used to rank source candidates
//! when forcing extra audio tracks.

use crate::options::OptionKind;
use crate::streams::StreamKind;

/// Immutable descriptor for one known stream format.
#[derive(Debug, PartialEq, Eq)]
pub struct Format {
    pub name: &'static str,
    pub kind: StreamKind,
    /// Higher scores win candidate ranking.
    pub score: i32,
    /// Disabled formats are skipped by the plan builder.
    pub enabled: bool,
    /// Image-based subtitle formats cannot be transcoded to text.
    pub is_image: bool,
    supported: &'static [OptionKind],
}

impl Format {
    pub fn supports(&self, kind: OptionKind) -> bool {
        self.supported.contains(&kind)
    }

    pub fn supported_options(&self) -> &'static [OptionKind] {
        self.supported
    }
}

const VIDEO_OPTIONS: &[OptionKind] = &[
    OptionKind::PixelFormat,
    OptionKind::Bitrate,
    OptionKind::Disposition,
    OptionKind::Height,
    OptionKind::Width,
    OptionKind::Level,
    OptionKind::Profile,
    OptionKind::Tag,
    OptionKind::Filter,
    OptionKind::Metadata,
];

const AUDIO_OPTIONS: &[OptionKind] = &[
    OptionKind::Channels,
    OptionKind::Language,
    OptionKind::Disposition,
    OptionKind::Bitrate,
    OptionKind::Tag,
    OptionKind::Metadata,
];

const SUBTITLE_OPTIONS: &[OptionKind] = &[
    OptionKind::Language,
    OptionKind::Disposition,
    OptionKind::Tag,
    OptionKind::Metadata,
];

const IMAGE_OPTIONS: &[OptionKind] = &[];

macro_rules! video_format {
    ($ident:ident, $name:literal) => {
        pub static $ident: Format = Format {
            name: $name,
            kind: StreamKind::Video,
            score: 0,
            enabled: true,
            is_image: false,
            supported: VIDEO_OPTIONS,
        };
    };
}

macro_rules! audio_format {
    ($ident:ident, $name:literal, $score:literal) => {
        audio_format!($ident, $name, $score, true);
    };
    ($ident:ident, $name:literal, $score:literal, $enabled:literal) => {
        pub static $ident: Format = Format {
            name: $name,
            kind: StreamKind::Audio,
            score: $score,
            enabled: $enabled,
            is_image: false,
            supported: AUDIO_OPTIONS,
        };
    };
}

macro_rules! subtitle_format {
    ($ident:ident, $name:literal, $is_image:literal) => {
        pub static $ident: Format = Format {
            name: $name,
            kind: StreamKind::Subtitle,
            score: 0,
            enabled: true,
            is_image: $is_image,
            supported: SUBTITLE_OPTIONS,
        };
    };
}

video_format!(THEORA, "theora");
video_format!(DIVX, "divx");
video_format!(VP8, "vp8");
video_format!(H263, "h263");
video_format!(FLV, "flv");
video_format!(MPEG1, "mpeg1");
video_format!(MPEG2, "mpeg2");
video_format!(H264, "h264");
video_format!(HEVC, "hevc");

audio_format!(VORBIS, "vorbis", 0);
audio_format!(MP3, "mp3", 0);
audio_format!(MP2, "mp2", 0);
audio_format!(AAC, "aac", 1);
audio_format!(AC3, "ac3", 1);
audio_format!(EAC3, "eac3", 2);
audio_format!(DTS, "dts", 3);
audio_format!(FLAC, "flac", 3);
// Present in remuxes but not convertible by stock ffmpeg builds.
audio_format!(TRUEHD, "truehd", 5, false);

subtitle_format!(MOV_TEXT, "mov_text", false);
subtitle_format!(SRT, "srt", false);
subtitle_format!(SSA, "ssa", false);
subtitle_format!(SUBRIP, "subrip", false);
subtitle_format!(WEBVTT, "webvtt", false);
subtitle_format!(DVDSUB, "dvdsub", true);
subtitle_format!(DVBSUB, "dvbsub", true);
subtitle_format!(PGS, "hdmv_pgs_subtitle", true);

pub static PNG: Format = Format {
    name: "png",
    kind: StreamKind::Image,
    score: 0,
    enabled: false,
    is_image: false,
    supported: IMAGE_OPTIONS,
};

pub static MJPEG: Format = Format {
    name: "mjpeg",
    kind: StreamKind::Image,
    score: 0,
    enabled: false,
    is_image: false,
    supported: IMAGE_OPTIONS,
};

/// Collapse the common alternate codec names onto the registry's canonical
/// ones.
pub fn canonical_name(name: &str) -> &str {
    match name {
        "h265" | "x265" => "hevc",
        "x264" => "h264",
        "ass" => "ssa",
        "pgs" => "hdmv_pgs_subtitle",
        other => other,
    }
}

/// Look up a format by codec name, accepting aliases. Case-insensitive.
pub fn lookup(name: &str) -> Option<&'static Format> {
    let lowered = name.to_lowercase();
    let entry = match canonical_name(lowered.as_str()) {
        "theora" => &THEORA,
        "divx" => &DIVX,
        "vp8" => &VP8,
        "h263" => &H263,
        "flv" => &FLV,
        "mpeg1" => &MPEG1,
        "mpeg2" => &MPEG2,
        "h264" => &H264,
        "hevc" => &HEVC,
        "vorbis" => &VORBIS,
        "mp3" => &MP3,
        "mp2" => &MP2,
        "aac" => &AAC,
        "ac3" => &AC3,
        "eac3" => &EAC3,
        "dts" => &DTS,
        "flac" => &FLAC,
        "truehd" => &TRUEHD,
        "mov_text" => &MOV_TEXT,
        "srt" => &SRT,
        "ssa" => &SSA,
        "subrip" => &SUBRIP,
        "webvtt" => &WEBVTT,
        "dvdsub" => &DVDSUB,
        "dvbsub" => &DVBSUB,
        "hdmv_pgs_subtitle" => &PGS,
        "png" => &PNG,
        "mjpeg" => &MJPEG,
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_canonical() {
        assert_eq!(lookup("h264"), Some(&H264));
        assert_eq!(lookup("AAC"), Some(&AAC));
        assert_eq!(lookup("quicktime"), None);
    }

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(lookup("h265"), Some(&HEVC));
        assert_eq!(lookup("x264"), Some(&H264));
        assert_eq!(lookup("x265"), Some(&HEVC));
        assert_eq!(lookup("ass"), Some(&SSA));
        assert_eq!(lookup("pgs"), Some(&PGS));
    }

    #[test]
    fn test_disabled_formats() {
        assert!(!TRUEHD.enabled);
        assert!(!PNG.enabled);
        assert!(!MJPEG.enabled);
        assert!(H264.enabled);
    }

    #[test]
    fn test_image_subtitles() {
        assert!(PGS.is_image);
        assert!(DVBSUB.is_image);
        assert!(!MOV_TEXT.is_image);
    }

    #[test]
    fn test_supported_options_per_kind() {
        assert!(H264.supports(OptionKind::PixelFormat));
        assert!(!H264.supports(OptionKind::Channels));
        assert!(AAC.supports(OptionKind::Channels));
        assert!(!AAC.supports(OptionKind::PixelFormat));
        assert!(MOV_TEXT.supports(OptionKind::Language));
        assert!(!MOV_TEXT.supports(OptionKind::Bitrate));
    }
}
