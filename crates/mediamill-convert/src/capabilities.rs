//! Transcoder capability probe.
//!
//! ffmpeg builds vary in which encoders and decoders they ship; the encoder
//! registry only exposes entries the local binary can actually run. Listings
//! come from `ffmpeg -v 0 -encoders` / `-decoders`.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

/// The set of encoder and decoder names the local transcoder supports.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    encoders: HashSet<String>,
    decoders: HashSet<String>,
}

impl Capabilities {
    /// Query the given ffmpeg binary for its encoders and decoders.
    pub fn detect(ffmpeg: &Path) -> Result<Self> {
        Ok(Self {
            encoders: run_listing(ffmpeg, "-encoders")?,
            decoders: run_listing(ffmpeg, "-decoders")?,
        })
    }

    /// Build a capability set from known encoder names. Useful for tests and
    /// dry runs without a local ffmpeg.
    pub fn with_encoders<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            encoders: names.into_iter().map(Into::into).collect(),
            decoders: HashSet::new(),
        }
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }

    pub fn has_decoder(&self, name: &str) -> bool {
        self.decoders.contains(name)
    }

    pub fn encoder_count(&self) -> usize {
        self.encoders.len()
    }
}

fn run_listing(ffmpeg: &Path, flag: &str) -> Result<HashSet<String>> {
    let output = Command::new(ffmpeg)
        .args(["-v", "0", flag])
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(ffmpeg.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

    Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse one capability listing. Codec lines follow a `------` separator and
/// read `TYPE NAME description`; whitespace runs vary between builds, so
/// lines are tokenized rather than split on single spaces.
pub fn parse_listing(text: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut started = false;
    for line in text.lines() {
        let line = line.trim();
        if line == "------" {
            started = true;
            continue;
        }
        if !started {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(kind), Some(name)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if matches!(kind.chars().next(), Some('V' | 'A' | 'S')) {
            names.insert(name.to_string());
        }
    }
    names
}
