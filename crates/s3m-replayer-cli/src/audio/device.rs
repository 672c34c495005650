//! Audio device integration using rodio.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rodio::{OutputStream, Sink, Source};

use super::RingBuffer;

/// Handle keeping the output stream alive while playback runs.
pub struct AudioOutput {
    _stream: OutputStream,
    sink: Sink,
}

impl AudioOutput {
    /// Open the default output device and start draining the ring buffer.
    ///
    /// `done` ends the stream once set *and* the ring buffer has drained.
    pub fn start(
        sample_rate: u32,
        channels: u16,
        ring: Arc<RingBuffer>,
        done: Arc<AtomicBool>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;
        sink.append(RingBufferSource {
            ring,
            done,
            sample_rate,
            channels,
            batch: vec![0.0; 1024],
            batch_len: 0,
            batch_pos: 0,
        });
        Ok(AudioOutput {
            _stream: stream,
            sink,
        })
    }

    /// Block until the source has played out.
    pub fn finish(self) {
        self.sink.sleep_until_end();
    }
}

/// rodio source reading batches from the ring buffer, emitting silence on
/// underrun so the stream stays alive until shutdown.
struct RingBufferSource {
    ring: Arc<RingBuffer>,
    done: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    batch: Vec<f32>,
    batch_len: usize,
    batch_pos: usize,
}

impl Iterator for RingBufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.batch_pos >= self.batch_len {
            self.batch_len = self.ring.read(&mut self.batch);
            self.batch_pos = 0;
            if self.batch_len == 0 {
                if self.done.load(Ordering::Relaxed) {
                    return None;
                }
                // Underrun: keep the device fed with silence.
                self.batch.fill(0.0);
                self.batch_len = self.batch.len();
            }
        }

        let sample = self.batch[self.batch_pos];
        self.batch_pos += 1;
        Some(sample)
    }
}

impl Source for RingBufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
