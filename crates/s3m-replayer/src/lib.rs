//! Scream Tracker 3 (S3M) module loader and software playback engine.
//!
//! This crate parses S3M files into a read-only [`S3mFile`] and renders
//! them to PCM float buffers with [`S3mPlayer`], a deterministic state
//! machine over orders, patterns, rows and ticks:
//!
//! - Packed pattern decoding into per-channel slots
//! - Per-channel effects: speed/tempo, volume slide, tone portamento,
//!   pattern jump/break, sample offset, note cut/delay, pattern delay,
//!   global volume, pan position
//! - Nearest-sample resampling of unsigned 8-bit PCM with loop wrap
//! - Mono or interleaved-stereo mixing of up to 32 channels
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use s3m_replayer::{S3mFile, S3mPlayer};
//!
//! let file = Arc::new(S3mFile::load("song.s3m")?);
//! println!("Title: {}", file.name);
//!
//! let mut player = S3mPlayer::new();
//! player.set_sample_rate(44_100);
//! player.load_file(file);
//!
//! let mut buffer = vec![0.0f32; 4096];
//! while !player.is_finished() {
//!     player.synth_mono(&mut buffer);
//!     // ... hand the buffer to an audio device
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod export;
pub mod format;
mod parser;
mod player;

pub use crate::error::{Result, S3mError};
pub use crate::format::{Instrument, Pattern, Row, S3mFile, Slot};
pub use crate::parser::load_s3m;
pub use crate::player::{RowPosition, S3mPlayer};
