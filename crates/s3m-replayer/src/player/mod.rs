//! S3M playback engine.
//!
//! [`S3mPlayer`] walks the module's order list row by row and tick by tick,
//! mixing up to 32 resampled PCM channels into caller-provided float
//! buffers. Synthesis is synchronous and never blocks; the only state that
//! crosses threads is the loop counter behind [`S3mPlayer::finished_handle`].
//!
//! # Module organization
//!
//! - `cursor` - order/pattern/row position and pending jumps
//! - `channel` - per-channel effect state and the resampler
//! - `tick` - row dispatch and tick scheduling
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use s3m_replayer::{S3mFile, S3mPlayer};
//!
//! let file = Arc::new(S3mFile::load("song.s3m")?);
//! let mut player = S3mPlayer::new();
//! player.set_sample_rate(44_100);
//! player.load_file(file);
//!
//! let mut buffer = vec![0.0f32; 882];
//! while !player.is_finished() {
//!     player.synth_mono(&mut buffer);
//!     // ... hand the buffer to an audio device
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod channel;
mod cursor;
mod tick;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::format::{MAX_CHANNELS, Row, S3mFile};

use channel::Channel;
use cursor::{Cursor, Jump};

/// Cursor coordinates handed to a row observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPosition {
    /// Index into the order list.
    pub order: usize,
    /// Pattern the order resolves to.
    pub pattern: usize,
    /// Row within the pattern, 0..=63.
    pub row: usize,
}

impl fmt::Display for RowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{:02}P{:02}R{:02}", self.order, self.pattern, self.row)
    }
}

type RowObserver = Box<dyn FnMut(RowPosition, &Row) + Send>;

/// Software synthesizer for a loaded [`S3mFile`].
///
/// Call order: [`set_sample_rate`](Self::set_sample_rate), then
/// [`load_file`](Self::load_file), then pull samples with
/// [`synth_mono`](Self::synth_mono) or [`synth_stereo`](Self::synth_stereo).
pub struct S3mPlayer {
    file: Option<Arc<S3mFile>>,
    /// Completed passes through the song; shared with monitoring threads.
    finished: Arc<AtomicU32>,
    sample_rate: u32,
    /// Length of one tick in output samples.
    tick_length: i32,
    /// Samples already produced inside the current tick.
    tick_offset: i32,
    tempo: i32,
    speed: i32,
    global_volume: i32,
    /// Ticks elapsed inside the current row; negative during pattern delay.
    current_tick: i32,
    cursor: Cursor,
    jump: Jump,
    channels: [Channel; MAX_CHANNELS],
    row_observer: Option<RowObserver>,
}

impl Default for S3mPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl S3mPlayer {
    /// Create a player with no file bound.
    pub fn new() -> Self {
        S3mPlayer {
            file: None,
            finished: Arc::new(AtomicU32::new(0)),
            sample_rate: 0,
            tick_length: 0,
            tick_offset: 0,
            tempo: 0,
            speed: 0,
            global_volume: 0,
            current_tick: 0,
            cursor: Cursor::default(),
            jump: Jump::default(),
            channels: [Channel::default(); MAX_CHANNELS],
            row_observer: None,
        }
    }

    /// Set the output rate in Hz. Must precede [`load_file`](Self::load_file).
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Bind a module and reset playback to its start.
    pub fn load_file(&mut self, file: Arc<S3mFile>) {
        self.file = Some(file);
        self.reset();
    }

    /// Rewind to the start of the song and reinitialize all channels.
    ///
    /// Does nothing until a file is bound.
    pub fn reset(&mut self) {
        debug_assert!(self.sample_rate > 0, "set_sample_rate must come first");
        let Some(file) = self.file.clone() else {
            return;
        };

        self.set_tempo(file.initial_tempo as u32);
        self.speed = file.initial_speed as i32;
        self.global_volume = file.global_volume as i32;

        self.finished.store(0, Ordering::Relaxed);
        self.tick_offset = 0;
        // One increment past this lands on tick 0 of row 0.
        self.current_tick = self.speed;

        self.jump.clear();
        self.cursor.reset(&file);

        self.channels = [Channel::default(); MAX_CHANNELS];
        for (channel, &pan) in self.channels.iter_mut().zip(&file.panning) {
            channel.pan = pan;
        }
    }

    /// Install a callback invoked with every row as it is dispatched.
    pub fn set_row_observer<F>(&mut self, observer: F)
    where
        F: FnMut(RowPosition, &Row) + Send + 'static,
    {
        self.row_observer = Some(Box::new(observer));
    }

    /// Number of complete passes through the song so far.
    pub fn finished(&self) -> u32 {
        self.finished.load(Ordering::Relaxed)
    }

    /// Whether the song has played through at least once.
    pub fn is_finished(&self) -> bool {
        self.finished() > 0
    }

    /// Shared handle to the loop counter, for monitoring from another
    /// thread while synthesis owns the player.
    pub fn finished_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.finished)
    }

    /// Output rate in Hz, as set by [`set_sample_rate`](Self::set_sample_rate).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo as i32;
        self.tick_length = ((2.5 * self.sample_rate as f64 / tempo as f64) as i32).max(1);
    }

    fn output_scale(&self, file: &S3mFile) -> f64 {
        // 512 == 2^7 * 2^8 / 64, spreading master and global volume over
        // the 32-channel sum.
        (file.master_volume & 127) as f64 * self.global_volume as f64 / (512.0 * 32.0)
    }

    /// Render mono samples, overwriting the whole buffer.
    pub fn synth_mono(&mut self, buffer: &mut [f32]) {
        buffer.fill(0.0);
        let Some(file) = self.file.clone() else {
            return;
        };

        let mut offset = 0;
        while offset < buffer.len() {
            let chunk = self.advance_tick(&file, buffer.len() - offset);
            let scale = self.output_scale(&file);
            for frame in &mut buffer[offset..offset + chunk] {
                let mut sound = 0.0f64;
                for channel in self.channels.iter_mut() {
                    if channel.active {
                        sound += channel.sample(&file, self.sample_rate);
                    }
                }
                *frame = (sound * scale) as f32;
            }
            offset += chunk;
        }
    }

    /// Render interleaved stereo samples, overwriting the whole buffer.
    ///
    /// `buffer.len()` counts individual samples, so a length of 20 yields
    /// 10 left/right frames.
    pub fn synth_stereo(&mut self, buffer: &mut [f32]) {
        buffer.fill(0.0);
        let Some(file) = self.file.clone() else {
            return;
        };

        let frames = buffer.len() / 2;
        let mut offset = 0;
        while offset < frames {
            let chunk = self.advance_tick(&file, frames - offset);
            let scale = self.output_scale(&file);
            for frame in buffer[offset * 2..(offset + chunk) * 2].chunks_exact_mut(2) {
                let mut left = 0.0f64;
                let mut right = 0.0f64;
                for channel in self.channels.iter_mut() {
                    if channel.active {
                        let sound = channel.sample(&file, self.sample_rate);
                        left += sound * (1.0 - channel.pan as f64);
                        right += sound * channel.pan as f64;
                    }
                }
                frame[0] = (left * scale) as f32;
                frame[1] = (right * scale) as f32;
            }
            offset += chunk;
        }
    }

    /// Reserve the next run of frames inside the current tick, firing the
    /// tick scheduler when the boundary is reached. Returns the run length.
    fn advance_tick(&mut self, file: &S3mFile, wanted: usize) -> usize {
        let mut chunk = (self.tick_length - self.tick_offset) as usize;
        if chunk > wanted {
            chunk = wanted;
        }
        self.tick_offset += chunk as i32;
        if self.tick_offset == self.tick_length {
            self.tick(file);
            self.tick_offset = 0;
        }
        chunk
    }
}
