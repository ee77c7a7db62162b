//! The container model: a media file and its ordered streams.

use crate::error::Error;
use crate::options::OptionKind;
use crate::streams::{Stream, StreamKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Supported container formats. Constructing anything else fails upstream in
/// [`ContainerFormat::from_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    Matroska,
    Avi,
}

impl ContainerFormat {
    /// The file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Matroska => "mkv",
            ContainerFormat::Avi => "avi",
        }
    }

    /// The ffmpeg muxer name, as passed to `-f`.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Matroska => "matroska",
            ContainerFormat::Avi => "avi",
        }
    }
}

impl std::str::FromStr for ContainerFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp4" | "m4v" => Ok(ContainerFormat::Mp4),
            "mkv" | "matroska" => Ok(ContainerFormat::Matroska),
            "avi" => Ok(ContainerFormat::Avi),
            other => Err(Error::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// Rough video definition class, used to pick tagging resolution flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definition {
    Hd1080,
    Hd720,
    Sd,
}

/// A media file at a path: its format plus an ordered list of streams.
///
/// Two injective maps keyed by stream uid track each stream's absolute index
/// (its position in the list, equal to the ffmpeg stream index) and its
/// relative index among streams of the same kind. Both are assigned on
/// insertion and stable for the container's lifetime.
#[derive(Debug, Clone)]
pub struct Container {
    format: ContainerFormat,
    path: PathBuf,
    streams: Vec<Stream>,
    absolute: HashMap<Uuid, usize>,
    relative: HashMap<Uuid, usize>,
}

impl Container {
    pub fn new(format: ContainerFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
            streams: Vec::new(),
            absolute: HashMap::new(),
            relative: HashMap::new(),
        }
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a stream, returning its absolute index.
    pub fn add_stream(&mut self, stream: Stream) -> usize {
        let absolute = self.streams.len();
        let relative = self
            .streams
            .iter()
            .filter(|s| s.kind() == stream.kind())
            .count();
        self.absolute.insert(stream.uid(), absolute);
        self.relative.insert(stream.uid(), relative);
        self.streams.push(stream);
        absolute
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&Stream> {
        self.streams.get(index)
    }

    pub fn absolute_index(&self, uid: Uuid) -> Option<usize> {
        self.absolute.get(&uid).copied()
    }

    pub fn relative_index(&self, uid: Uuid) -> Option<usize> {
        self.relative.get(&uid).copied()
    }

    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(move |s| s.kind() == kind)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams_of(StreamKind::Audio)
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams_of(StreamKind::Video)
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams_of(StreamKind::Subtitle)
    }

    /// Ensure exactly one stream per kind carries `default=1`: if none does,
    /// promote the first; if several do, keep the first and clear the rest.
    /// Streams without a disposition get an explicit `default=0`.
    pub fn fix_disposition(&mut self) {
        for kind in [StreamKind::Video, StreamKind::Audio, StreamKind::Subtitle] {
            let mut seen_default = false;
            let mut first_of_kind: Option<usize> = None;
            let mut any_default = false;

            for (i, stream) in self.streams.iter().enumerate() {
                if stream.kind() != kind {
                    continue;
                }
                if first_of_kind.is_none() {
                    first_of_kind = Some(i);
                }
                if stream.default_disposition().unwrap_or(0) == 1 {
                    any_default = true;
                }
            }

            for stream in self.streams.iter_mut().filter(|s| s.kind() == kind) {
                match stream.default_disposition().unwrap_or(0) {
                    1 if seen_default => stream.set_default_disposition(0),
                    1 => seen_default = true,
                    _ => stream.set_default_disposition(0),
                }
            }

            if !any_default {
                if let Some(i) = first_of_kind {
                    self.streams[i].set_default_disposition(1);
                }
            }
        }
    }

    /// Classify the container by its video dimensions.
    pub fn definition(&self) -> Definition {
        let mut width = 0u32;
        let mut height = 0u32;
        for stream in self.video_streams() {
            if let Some(crate::options::StreamOption::Width(w)) =
                stream.options().get(OptionKind::Width)
            {
                width = width.max(*w);
            }
            if let Some(crate::options::StreamOption::Height(h)) =
                stream.options().get(OptionKind::Height)
            {
                height = height.max(*h);
            }
        }
        if width >= 1900 || height >= 1060 {
            Definition::Hd1080
        } else if width >= 1260 || height >= 500 {
            Definition::Hd720
        } else {
            Definition::Sd
        }
    }
}
