//! # mediamill
//!
//! Plans and executes media-file transcoding jobs. A job probes its source,
//! computes a target container whose streams copy through or transcode to
//! match configuration, drives ffmpeg with progress reporting, and then walks
//! a fixed post-conversion workflow: tag, post-process, deploy, delete the
//! original, notify library servers.
//!
//! The conversion core (stream model, plan builder, command synthesis,
//! execution driver) lives in the `mediamill-convert` crate; this crate adds
//! configuration, the workflow state machine, and the collaborator seams for
//! tagging, post-processing, and library refreshing.

pub mod config;
pub mod postprocess;
pub mod processor;
pub mod refresh;
pub mod tagging;
pub mod workflow;

pub use processor::Conversion;
pub use workflow::{Job, JobError, JobState};
