//! The stream model: one track within a container.

use crate::formats::Format;
use crate::options::{OptionKind, Options, StreamOption};
use uuid::Uuid;

/// Kind of content a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Image,
}

impl StreamKind {
    /// The ffmpeg stream-specifier letter.
    pub fn specifier(self) -> char {
        match self {
            StreamKind::Video | StreamKind::Image => 'v',
            StreamKind::Audio => 'a',
            StreamKind::Subtitle => 's',
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
            StreamKind::Image => "image",
        };
        f.write_str(name)
    }
}

/// One track within a container.
///
/// The uid is assigned at construction and never reused within a container;
/// index maps are keyed by it. Options are unique-mode and constrained to the
/// format's supported set.
#[derive(Debug, Clone)]
pub struct Stream {
    format: &'static Format,
    uid: Uuid,
    options: Options,
}

impl Stream {
    pub fn new(format: &'static Format) -> Self {
        Self {
            format,
            uid: Uuid::new_v4(),
            options: Options::unique(),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.format.kind
    }

    pub fn format(&self) -> &'static Format {
        self.format
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Add an option, rejecting kinds the stream format does not support.
    /// Returns whether the option was accepted.
    pub fn add_option(&mut self, opt: StreamOption) -> bool {
        if self.format.supports(opt.kind()) {
            self.options.add(opt);
            true
        } else {
            tracing::debug!(
                "option {:?} rejected: unsupported by {} streams",
                opt.kind(),
                self.format.name
            );
            false
        }
    }

    pub fn add_options<I: IntoIterator<Item = StreamOption>>(&mut self, opts: I) {
        for opt in opts {
            self.add_option(opt);
        }
    }

    /// Convenience accessors used by the plan builder.
    pub fn language(&self) -> Option<&str> {
        match self.options.get(OptionKind::Language) {
            Some(StreamOption::Language(code)) => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn bitrate(&self) -> Option<u32> {
        match self.options.get(OptionKind::Bitrate) {
            Some(StreamOption::Bitrate(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn channels(&self) -> Option<u32> {
        match self.options.get(OptionKind::Channels) {
            Some(StreamOption::Channels(v)) => Some(*v),
            _ => None,
        }
    }

    /// Set or clear the `default` disposition flag in place.
    pub fn set_default_disposition(&mut self, value: u8) {
        let mut flags = match self.options.get(OptionKind::Disposition) {
            Some(StreamOption::Disposition(map)) => map.clone(),
            _ => Default::default(),
        };
        flags.insert("default".to_string(), value);
        self.options.add(StreamOption::Disposition(flags));
    }

    pub fn default_disposition(&self) -> Option<u8> {
        match self.options.get(OptionKind::Disposition) {
            Some(StreamOption::Disposition(map)) => map.get("default").copied(),
            _ => None,
        }
    }

    /// Streams are equal iff they share a format and their non-metadata
    /// options are mutual subsets. With missing-is-wildcard subset semantics
    /// this lets template-built streams match fully-probed ones.
    pub fn matches(&self, other: &Stream) -> bool {
        if self.format != other.format {
            return false;
        }
        let a = self.options.comparable();
        let b = other.options.comparable();
        a.subset_of(&b) && b.subset_of(&a)
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats;
    use std::collections::BTreeMap;

    fn aac_stream(bitrate: u32, lang: &str) -> Stream {
        let mut s = Stream::new(&formats::AAC);
        s.add_option(StreamOption::Bitrate(bitrate));
        s.add_option(StreamOption::Channels(2));
        s.add_option(StreamOption::Language(lang.into()));
        s
    }

    #[test]
    fn test_rejects_unsupported_option() {
        let mut s = Stream::new(&formats::AAC);
        assert!(!s.add_option(StreamOption::PixelFormat("yuv420p".into())));
        assert!(s.options().is_empty());
        assert!(s.add_option(StreamOption::Channels(6)));
    }

    #[test]
    fn test_equality_ignores_metadata() {
        let mut a = aac_stream(128, "eng");
        let b = aac_stream(128, "eng");

        let mut flags = BTreeMap::new();
        flags.insert("default".to_string(), 1u8);
        a.add_option(StreamOption::Disposition(flags));

        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_requires_same_format() {
        let mut ac3 = Stream::new(&formats::AC3);
        ac3.add_option(StreamOption::Bitrate(128));
        let aac = aac_stream(128, "eng");
        assert_ne!(ac3, aac);
    }

    #[test]
    fn test_missing_option_is_wildcard() {
        // A template-built stream with no bitrate matches any bitrate.
        let mut template = Stream::new(&formats::AAC);
        template.add_option(StreamOption::Language("eng".into()));

        let mut probed = Stream::new(&formats::AAC);
        probed.add_option(StreamOption::Language("eng".into()));
        probed.add_option(StreamOption::Bitrate(448));

        assert_eq!(template, probed);
    }

    #[test]
    fn test_set_default_disposition() {
        let mut s = aac_stream(128, "eng");
        assert_eq!(s.default_disposition(), None);
        s.set_default_disposition(1);
        assert_eq!(s.default_disposition(), Some(1));
        s.set_default_disposition(0);
        assert_eq!(s.default_disposition(), Some(0));
    }

    #[test]
    fn test_uids_are_distinct() {
        assert_ne!(aac_stream(128, "eng").uid(), aac_stream(128, "eng").uid());
    }
}
