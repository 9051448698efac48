//! germanizer - Automated German Dubbing Workflow
//!
//! The core is a timing-aware speech pipeline: synthesize each translated
//! segment, speed up whatever overruns its slot, and assemble the pieces into
//! a track that follows the source video's cadence. Download, transcription,
//! translation and muxing are thin adapters around external tools and APIs.

pub mod adjust;
pub mod audio;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod media;
pub mod scratch;
pub mod segment;
pub mod text;
pub mod transcribe;
pub mod translate;
pub mod tts;
pub mod workflow;
