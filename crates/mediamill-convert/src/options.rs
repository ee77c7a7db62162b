//! Typed per-stream attributes and the ordered collections that hold them.
//!
//! Every attribute a stream or encoder can carry is one variant of
//! [`StreamOption`]. Options compare structurally over (kind, value) and know
//! how to render themselves into ffmpeg argv tokens for a given stream
//! specifier. Collections come in two modes: unique (streams, at most one
//! option per kind) and multi (filters).

use crate::streams::StreamKind;
use std::collections::BTreeMap;

/// Discriminant identifying a [`StreamOption`] variant regardless of value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    PixelFormat,
    Bitrate,
    Channels,
    Level,
    Profile,
    Height,
    Width,
    Language,
    Disposition,
    Tag,
    Filter,
    BitstreamFilter,
    Crf,
    Metadata,
}

/// Broad class of an option, deciding where in the pipeline it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionClass {
    /// Describes stream content (pixel format, bitrate, ...).
    Stream,
    /// Passed to the encoder (CRF, bitstream filter, ...).
    Encoder,
    /// Passed at mux time (disposition, metadata key/values).
    Metadata,
}

/// One typed attribute attached to a stream or an encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOption {
    PixelFormat(String),
    /// Kilobits per second.
    Bitrate(u32),
    Channels(u32),
    /// Stored on the "4.0" convention; ffprobe reports levels scaled by 10.
    Level(f32),
    Profile(String),
    Height(u32),
    Width(u32),
    /// ISO 639-2 three-letter code.
    Language(String),
    /// Flag map as reported by the prober, e.g. default/forced -> 0/1.
    Disposition(BTreeMap<String, u8>),
    /// Container codec tag, e.g. hvc1.
    Tag(String),
    /// A raw filter chain for -filter:<spec>.
    Filter(String),
    BitstreamFilter(String),
    Crf(u32),
    /// Arbitrary mux-time metadata key/value.
    Metadata(String, String),
}

impl StreamOption {
    pub fn kind(&self) -> OptionKind {
        match self {
            StreamOption::PixelFormat(_) => OptionKind::PixelFormat,
            StreamOption::Bitrate(_) => OptionKind::Bitrate,
            StreamOption::Channels(_) => OptionKind::Channels,
            StreamOption::Level(_) => OptionKind::Level,
            StreamOption::Profile(_) => OptionKind::Profile,
            StreamOption::Height(_) => OptionKind::Height,
            StreamOption::Width(_) => OptionKind::Width,
            StreamOption::Language(_) => OptionKind::Language,
            StreamOption::Disposition(_) => OptionKind::Disposition,
            StreamOption::Tag(_) => OptionKind::Tag,
            StreamOption::Filter(_) => OptionKind::Filter,
            StreamOption::BitstreamFilter(_) => OptionKind::BitstreamFilter,
            StreamOption::Crf(_) => OptionKind::Crf,
            StreamOption::Metadata(..) => OptionKind::Metadata,
        }
    }

    pub fn class(&self) -> OptionClass {
        self.kind().class()
    }

    /// Render this option to argv tokens for the stream at `index` (relative
    /// within its kind). Options that only describe content render nothing.
    pub fn render(&self, kind: StreamKind, index: usize) -> Vec<String> {
        let t = kind.specifier();
        match self {
            StreamOption::PixelFormat(v) => vec![format!("-pix_fmt:{t}:{index}"), v.clone()],
            StreamOption::Bitrate(v) => vec![format!("-b:{t}:{index}"), format!("{v}k")],
            StreamOption::Channels(v) => vec![format!("-ac:{t}:{index}"), v.to_string()],
            StreamOption::Level(v) => vec![format!("-level:{t}:{index}"), v.to_string()],
            StreamOption::Profile(v) => vec![format!("-profile:{t}:{index}"), v.clone()],
            // Dimensions describe content; scaling goes through Filter.
            StreamOption::Height(_) | StreamOption::Width(_) => Vec::new(),
            StreamOption::Language(v) => {
                vec![format!("-metadata:s:{t}:{index}"), format!("language={v}")]
            }
            StreamOption::Disposition(flags) => {
                let set: Vec<&str> = flags
                    .iter()
                    .filter(|(_, v)| **v != 0)
                    .map(|(k, _)| k.as_str())
                    .collect();
                let value = if set.is_empty() {
                    "0".to_string()
                } else {
                    set.join("+")
                };
                vec![format!("-disposition:{t}:{index}"), value]
            }
            StreamOption::Tag(v) => vec![format!("-tag:{t}:{index}"), v.clone()],
            StreamOption::Filter(v) => vec![format!("-filter:{t}:{index}"), v.clone()],
            StreamOption::BitstreamFilter(v) => vec![format!("-bsf:{t}:{index}"), v.clone()],
            StreamOption::Crf(v) => vec![format!("-crf:{t}:{index}"), v.to_string()],
            StreamOption::Metadata(k, v) => {
                vec![format!("-metadata:s:{t}:{index}"), format!("{k}={v}")]
            }
        }
    }
}

impl OptionKind {
    pub fn class(self) -> OptionClass {
        match self {
            OptionKind::PixelFormat
            | OptionKind::Bitrate
            | OptionKind::Channels
            | OptionKind::Level
            | OptionKind::Profile
            | OptionKind::Height
            | OptionKind::Width
            | OptionKind::Language => OptionClass::Stream,
            OptionKind::Tag
            | OptionKind::Filter
            | OptionKind::BitstreamFilter
            | OptionKind::Crf => OptionClass::Encoder,
            OptionKind::Disposition | OptionKind::Metadata => OptionClass::Metadata,
        }
    }
}

/// Ordered bag of options.
///
/// In unique mode adding an option replaces any existing option of the same
/// kind; in multi mode duplicates accumulate in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    items: Vec<StreamOption>,
    unique: bool,
}

impl Options {
    /// At most one option per kind. Used by streams.
    pub fn unique() -> Self {
        Self {
            items: Vec::new(),
            unique: true,
        }
    }

    /// Multiple options per kind. Used by filter chains.
    pub fn multi() -> Self {
        Self {
            items: Vec::new(),
            unique: false,
        }
    }

    pub fn add(&mut self, opt: StreamOption) {
        if self.unique {
            if let Some(existing) = self.items.iter_mut().find(|o| o.kind() == opt.kind()) {
                *existing = opt;
                return;
            }
        }
        self.items.push(opt);
    }

    pub fn has(&self, kind: OptionKind) -> bool {
        self.items.iter().any(|o| o.kind() == kind)
    }

    /// First option of the given kind, if any. In unique mode this is the
    /// only one.
    pub fn get(&self, kind: OptionKind) -> Option<&StreamOption> {
        self.items.iter().find(|o| o.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamOption> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True iff every option in self is either absent from `other` or present
    /// with an equal value. A kind missing from `other` is a wildcard, so
    /// templates only constrain the attributes they name.
    pub fn subset_of(&self, other: &Options) -> bool {
        self.items.iter().all(|a| match other.get(a.kind()) {
            Some(b) => a == b,
            None => true,
        })
    }

    /// Options of self whose kind is absent from `other` or whose value
    /// differs from other's.
    pub fn diff(&self, other: &Options) -> Options {
        let mut out = Options {
            items: Vec::new(),
            unique: self.unique,
        };
        for a in &self.items {
            match other.get(a.kind()) {
                Some(b) if a == b => {}
                _ => out.add(a.clone()),
            }
        }
        out
    }

    /// Projection to metadata-class options only.
    pub fn metadata_options(&self) -> Options {
        let mut out = Options {
            items: Vec::new(),
            unique: self.unique,
        };
        for o in &self.items {
            if o.class() == OptionClass::Metadata {
                out.add(o.clone());
            }
        }
        out
    }

    /// Projection excluding metadata-class options, used for stream equality.
    pub fn comparable(&self) -> Options {
        let mut out = Options {
            items: Vec::new(),
            unique: self.unique,
        };
        for o in &self.items {
            if o.class() != OptionClass::Metadata {
                out.add(o.clone());
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a Options {
    type Item = &'a StreamOption;
    type IntoIter = std::slice::Iter<'a, StreamOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<StreamOption> for Options {
    fn from_iter<T: IntoIterator<Item = StreamOption>>(iter: T) -> Self {
        let mut out = Options::unique();
        for o in iter {
            out.add(o);
        }
        out
    }
}
