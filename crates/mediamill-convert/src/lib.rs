//! # mediamill-convert
//!
//! Transcode planning and execution library for media files.
//!
//! This crate provides functionality for:
//! - Probing media files with ffprobe and modelling them as containers of
//!   typed streams
//! - Computing a target container whose streams either copy through or are
//!   transcoded to match a configured specification
//! - Synthesizing the ffmpeg command line that realizes the plan
//! - Driving ffmpeg, streaming normalized progress off its stderr, and
//!   classifying failures
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use mediamill_convert::probe;
//!
//! let source = probe(Path::new("ffprobe"), Path::new("/path/to/video.mkv"))?;
//! println!("container: {}", source.format());
//! # Ok::<(), mediamill_convert::Error>(())
//! ```

mod error;

pub mod capabilities;
pub mod command;
pub mod container;
pub mod encoders;
pub mod exec;
pub mod formats;
pub mod language;
pub mod options;
pub mod plan;
pub mod probe;
pub mod streams;

// Re-exports
pub use capabilities::Capabilities;
pub use container::{Container, ContainerFormat, Definition};
pub use error::{Error, Result};
pub use exec::ExecDriver;
pub use formats::Format;
pub use options::{OptionClass, OptionKind, Options, StreamOption};
pub use plan::{Plan, PlanBuilder, PlanConfig};
pub use probe::probe;
pub use streams::{Stream, StreamKind};
