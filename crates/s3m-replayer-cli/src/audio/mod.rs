//! Streaming audio output.
//!
//! The synth thread writes into a ring buffer; rodio drains it on the audio
//! callback side. Memory stays bounded by the ring capacity regardless of
//! song length.

// Allow unused methods - these are part of a complete streaming API
#![allow(dead_code)]

mod device;
mod ring_buffer;

pub use device::AudioOutput;
pub use ring_buffer::RingBuffer;

/// Default sample rate (44.1 kHz).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Samples generated per producer iteration.
pub const PRODUCER_CHUNK: usize = 4096;

/// Back-off when the ring buffer is full, in microseconds.
pub const BUFFER_BACKOFF_MICROS: u64 = 200;

/// Configuration for streaming playback.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Ring buffer capacity in samples; larger means more latency but
    /// fewer underruns.
    pub ring_buffer_size: usize,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// 1 = mono, 2 = interleaved stereo.
    pub channels: u16,
}

impl StreamConfig {
    /// A stable default: 16384 samples of buffer, roughly 370 ms of mono
    /// at 44.1 kHz.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        StreamConfig {
            ring_buffer_size: 16_384,
            sample_rate,
            channels,
        }
    }

    /// Buffered duration in milliseconds.
    pub fn latency_ms(&self) -> f32 {
        self.ring_buffer_size as f32 / (self.sample_rate as f32 * self.channels as f32) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_reflects_rate_and_channels() {
        let mono = StreamConfig::new(44_100, 1);
        let stereo = StreamConfig::new(44_100, 2);
        assert!(mono.latency_ms() > 360.0 && mono.latency_ms() < 380.0);
        assert!((stereo.latency_ms() - mono.latency_ms() / 2.0).abs() < 1.0);
    }
}
