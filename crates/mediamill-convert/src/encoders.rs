//! Encoder descriptors, the availability-filtered registry, and the
//! copy-vs-transcode selector.
//!
//! An encoder is a concrete ffmpeg codec implementation producing one stream
//! format. Several encoders can produce the same format (libx264 and the
//! hardware h264 variants); scores rank them when configuration does not name
//! a preference. The registry only exposes encoders the capability probe
//! found in the local binary.

use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::options::{OptionKind, Options, StreamOption};
use crate::streams::{Stream, StreamKind};
use std::collections::HashMap;

/// Immutable descriptor for one encoder implementation.
#[derive(Debug, PartialEq, Eq)]
pub struct EncoderDesc {
    /// Configuration-facing name, also the key for encoder default options.
    pub name: &'static str,
    /// The codec name passed to ffmpeg's `-c:` flag.
    pub ffmpeg_name: &'static str,
    pub kind: StreamKind,
    /// Name of the stream format this encoder produces. Empty for copy.
    pub produces: &'static str,
    pub score: i32,
    supported: &'static [OptionKind],
    /// Fixed flags always emitted after the codec name.
    pub fixed_args: &'static [&'static str],
}

impl EncoderDesc {
    pub fn supports(&self, kind: OptionKind) -> bool {
        self.supported.contains(&kind)
    }

    pub fn is_copy(&self) -> bool {
        self.ffmpeg_name == "copy"
    }
}

const COPY_OPTIONS: &[OptionKind] = &[
    OptionKind::BitstreamFilter,
    OptionKind::Language,
    OptionKind::Disposition,
    OptionKind::Tag,
    OptionKind::Metadata,
];

const VIDEO_ENC_OPTIONS: &[OptionKind] = &[
    OptionKind::Filter,
    OptionKind::BitstreamFilter,
    OptionKind::PixelFormat,
    OptionKind::Bitrate,
    OptionKind::Disposition,
    OptionKind::Height,
    OptionKind::Width,
    OptionKind::Level,
    OptionKind::Profile,
    OptionKind::Tag,
    OptionKind::Metadata,
];

const VIDEO_ENC_CRF_OPTIONS: &[OptionKind] = &[
    OptionKind::Filter,
    OptionKind::BitstreamFilter,
    OptionKind::PixelFormat,
    OptionKind::Bitrate,
    OptionKind::Disposition,
    OptionKind::Height,
    OptionKind::Width,
    OptionKind::Level,
    OptionKind::Profile,
    OptionKind::Tag,
    OptionKind::Metadata,
    OptionKind::Crf,
];

const AUDIO_ENC_OPTIONS: &[OptionKind] = &[
    OptionKind::Filter,
    OptionKind::BitstreamFilter,
    OptionKind::Channels,
    OptionKind::Language,
    OptionKind::Disposition,
    OptionKind::Bitrate,
    OptionKind::Tag,
    OptionKind::Metadata,
];

const SUBTITLE_ENC_OPTIONS: &[OptionKind] = &[
    OptionKind::Filter,
    OptionKind::Language,
    OptionKind::Disposition,
    OptionKind::Tag,
    OptionKind::Metadata,
];

macro_rules! encoder {
    ($name:literal, $ffmpeg:literal, $kind:ident, $produces:literal, $score:literal, $supported:ident) => {
        encoder!($name, $ffmpeg, $kind, $produces, $score, $supported, &[])
    };
    ($name:literal, $ffmpeg:literal, $kind:ident, $produces:literal, $score:literal, $supported:ident, $fixed:expr) => {
        EncoderDesc {
            name: $name,
            ffmpeg_name: $ffmpeg,
            kind: StreamKind::$kind,
            produces: $produces,
            score: $score,
            supported: $supported,
            fixed_args: $fixed,
        }
    };
}

static ENCODERS: &[EncoderDesc] = &[
    // Video
    encoder!("h264", "libx264", Video, "h264", 5, VIDEO_ENC_CRF_OPTIONS),
    encoder!("h264_nvenc", "h264_nvenc", Video, "h264", 1, VIDEO_ENC_OPTIONS),
    encoder!("h264_qsv", "h264_qsv", Video, "h264", 1, VIDEO_ENC_OPTIONS),
    encoder!("h264_vaapi", "h264_vaapi", Video, "h264", 1, VIDEO_ENC_OPTIONS),
    encoder!("hevc", "libx265", Video, "hevc", 5, VIDEO_ENC_CRF_OPTIONS),
    encoder!("hevc_nvenc", "hevc_nvenc", Video, "hevc", 1, VIDEO_ENC_OPTIONS),
    encoder!("hevc_qsv", "hevc_qsv", Video, "hevc", 1, VIDEO_ENC_OPTIONS),
    encoder!("theora", "libtheora", Video, "theora", 5, VIDEO_ENC_OPTIONS),
    encoder!("divx", "mpeg4", Video, "divx", 5, VIDEO_ENC_OPTIONS),
    encoder!("vp8", "libvpx", Video, "vp8", 5, VIDEO_ENC_OPTIONS),
    encoder!("h263", "h263", Video, "h263", 5, VIDEO_ENC_OPTIONS),
    encoder!("flv", "flv", Video, "flv", 5, VIDEO_ENC_OPTIONS),
    encoder!("mpeg1", "mpeg1video", Video, "mpeg1", 5, VIDEO_ENC_OPTIONS),
    encoder!("mpeg2", "mpeg2video", Video, "mpeg2", 5, VIDEO_ENC_OPTIONS),
    // Audio
    encoder!("aac", "aac", Audio, "aac", 5, AUDIO_ENC_OPTIONS),
    encoder!("libfdk_aac", "libfdk_aac", Audio, "aac", 2, AUDIO_ENC_OPTIONS),
    encoder!("libfaac", "libfaac", Audio, "aac", 1, AUDIO_ENC_OPTIONS),
    encoder!("ac3", "ac3", Audio, "ac3", 5, AUDIO_ENC_OPTIONS),
    encoder!("eac3", "eac3", Audio, "eac3", 5, AUDIO_ENC_OPTIONS),
    encoder!("flac", "flac", Audio, "flac", 5, AUDIO_ENC_OPTIONS),
    encoder!("dts", "dca", Audio, "dts", 5, AUDIO_ENC_OPTIONS, &["-strict", "-2"]),
    encoder!("mp3", "libmp3lame", Audio, "mp3", 5, AUDIO_ENC_OPTIONS),
    encoder!("mp2", "mp2", Audio, "mp2", 5, AUDIO_ENC_OPTIONS),
    encoder!("vorbis", "libvorbis", Audio, "vorbis", 5, AUDIO_ENC_OPTIONS),
    // Subtitle
    encoder!("mov_text", "mov_text", Subtitle, "mov_text", 5, SUBTITLE_ENC_OPTIONS),
    encoder!("srt", "srt", Subtitle, "srt", 5, SUBTITLE_ENC_OPTIONS),
    encoder!("webvtt", "webvtt", Subtitle, "webvtt", 5, SUBTITLE_ENC_OPTIONS),
    encoder!("ass", "ass", Subtitle, "ssa", 5, SUBTITLE_ENC_OPTIONS),
    encoder!("subrip", "subrip", Subtitle, "subrip", 5, SUBTITLE_ENC_OPTIONS),
    encoder!("dvbsub", "dvbsub", Subtitle, "dvbsub", 5, SUBTITLE_ENC_OPTIONS),
    encoder!("dvdsub", "dvdsub", Subtitle, "dvdsub", 5, SUBTITLE_ENC_OPTIONS),
    encoder!("hdmv_pgs_subtitle", "pgssub", Subtitle, "hdmv_pgs_subtitle", 5, SUBTITLE_ENC_OPTIONS),
];

static VIDEO_COPY: EncoderDesc =
    encoder!("video_copy", "copy", Video, "", 0, COPY_OPTIONS);
static AUDIO_COPY: EncoderDesc =
    encoder!("audio_copy", "copy", Audio, "", 0, COPY_OPTIONS);
static SUBTITLE_COPY: EncoderDesc =
    encoder!("subtitle_copy", "copy", Subtitle, "", 0, COPY_OPTIONS);

/// Encoders actually present in the local transcoder build.
#[derive(Debug)]
pub struct EncoderRegistry {
    available: Vec<&'static EncoderDesc>,
}

impl EncoderRegistry {
    pub fn new(caps: &Capabilities) -> Self {
        let available = ENCODERS
            .iter()
            .filter(|e| caps.has_encoder(e.ffmpeg_name))
            .collect();
        Self { available }
    }

    /// Encoders producing the given format, best score first.
    pub fn encoders_producing(&self, format: &str) -> Vec<&'static EncoderDesc> {
        let mut out: Vec<&'static EncoderDesc> = self
            .available
            .iter()
            .copied()
            .filter(|e| e.produces == format)
            .collect();
        out.sort_by(|a, b| b.score.cmp(&a.score));
        out
    }

    pub fn by_ffmpeg_name(&self, name: &str) -> Option<&'static EncoderDesc> {
        let lowered = name.to_lowercase();
        self.available
            .iter()
            .copied()
            .find(|e| e.ffmpeg_name == lowered)
    }

    /// The passthrough encoder for a stream kind.
    pub fn copy_for(&self, kind: StreamKind) -> &'static EncoderDesc {
        match kind {
            StreamKind::Video | StreamKind::Image => &VIDEO_COPY,
            StreamKind::Audio => &AUDIO_COPY,
            StreamKind::Subtitle => &SUBTITLE_COPY,
        }
    }
}

/// A selected encoder accumulating the options it will render.
#[derive(Debug)]
pub struct Encoder {
    desc: &'static EncoderDesc,
    options: Options,
}

impl Encoder {
    pub fn new(desc: &'static EncoderDesc) -> Self {
        Self {
            desc,
            options: Options::unique(),
        }
    }

    pub fn desc(&self) -> &'static EncoderDesc {
        self.desc
    }

    pub fn is_copy(&self) -> bool {
        self.desc.is_copy()
    }

    /// Attach an option. Unsupported kinds are logged and ignored, never an
    /// error.
    pub fn add_option(&mut self, opt: StreamOption) {
        if self.desc.supports(opt.kind()) {
            self.options.add(opt);
        } else {
            tracing::warn!(
                "option {:?} not supported by encoder {}, skipping",
                opt.kind(),
                self.desc.name
            );
        }
    }

    /// Render `-c:<t>:<n> <codec>` followed by fixed flags and every attached
    /// option.
    pub fn render(&self, kind: StreamKind, relative_index: usize) -> Vec<String> {
        let mut out = vec![
            format!("-c:{}:{}", kind.specifier(), relative_index),
            self.desc.ffmpeg_name.to_string(),
        ];
        out.extend(self.desc.fixed_args.iter().map(|s| s.to_string()));
        for opt in &self.options {
            out.extend(opt.render(kind, relative_index));
        }
        out
    }
}

/// Picks an encoder per mapped stream pair.
pub struct EncoderSelector<'a> {
    registry: &'a EncoderRegistry,
    /// Default options per encoder name, from configuration.
    defaults: &'a HashMap<String, Vec<StreamOption>>,
    /// Preferred encoder (ffmpeg name) per format name, from configuration.
    preferred: &'a HashMap<String, String>,
}

impl<'a> EncoderSelector<'a> {
    pub fn new(
        registry: &'a EncoderRegistry,
        defaults: &'a HashMap<String, Vec<StreamOption>>,
        preferred: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            registry,
            defaults,
            preferred,
        }
    }

    /// Copy when source and target streams are equal, otherwise the preferred
    /// encoder for the target format, falling back to the best-scoring
    /// available one.
    pub fn select(&self, source: &Stream, target: &Stream) -> Result<Encoder> {
        if source.matches(target) {
            return Ok(Encoder::new(self.registry.copy_for(target.kind())));
        }

        let format = target.format().name;
        let desc = self
            .preferred_for(format)
            .or_else(|| self.registry.encoders_producing(format).into_iter().next())
            .ok_or_else(|| {
                Error::plan(format!("no available encoder produces format {format}"))
            })?;

        let mut encoder = Encoder::new(desc);
        if let Some(defaults) = self.defaults.get(desc.name) {
            for opt in defaults {
                encoder.add_option(opt.clone());
            }
        }
        Ok(encoder)
    }

    fn preferred_for(&self, format: &str) -> Option<&'static EncoderDesc> {
        let name = self.preferred.get(format)?;
        match self.registry.by_ffmpeg_name(name) {
            Some(desc) if desc.produces == format => Some(desc),
            Some(desc) => {
                tracing::warn!(
                    "preferred encoder {} produces {}, not {format}; using best available",
                    desc.name,
                    desc.produces
                );
                None
            }
            None => {
                tracing::warn!(
                    "preferred encoder {name} for {format} not available, using best available"
                );
                None
            }
        }
    }
}
