//! vidpipe - Job-oriented video transformation pipeline
//!
//! Takes one uploaded video through a fixed catalog of ffmpeg-backed steps
//! (enhance, watermark removal, audio extraction, short clip, audio
//! replacement), writing every result to its own uniquely named artifact and
//! returning a manifest of what was produced.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod retention;
