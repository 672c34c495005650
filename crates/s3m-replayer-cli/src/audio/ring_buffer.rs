//! Ring buffer between the synth thread and the audio device.
//!
//! One producer, one consumer. The storage sits behind a mutex; read and
//! write positions are atomics so `available_read` stays lock-free. The
//! capacity is rounded up to a power of two so position wrapping is a mask.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded sample queue for streaming playback.
pub struct RingBuffer {
    buffer: Mutex<Vec<f32>>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    capacity: usize,
    mask: usize,
}

impl RingBuffer {
    /// Create a buffer holding at least `requested` samples.
    pub fn new(requested: usize) -> Self {
        let capacity = requested.max(2).next_power_of_two();
        RingBuffer {
            buffer: Mutex::new(vec![0.0; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
        }
    }

    /// Number of samples ready to read.
    ///
    /// Positions grow without bound and only wrap at the integer limit, so
    /// their difference is the fill level directly.
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Write as many samples as fit; returns how many were taken.
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut buf = self.buffer.lock();

        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        let used = write.wrapping_sub(read);
        let free = self.capacity - 1 - used;
        let count = samples.len().min(free);
        if count == 0 {
            return 0;
        }

        let start = write & self.mask;
        let first = count.min(self.capacity - start);
        buf[start..start + first].copy_from_slice(&samples[..first]);
        buf[..count - first].copy_from_slice(&samples[first..count]);
        drop(buf);

        self.write_pos.store(write + count, Ordering::Release);
        count
    }

    /// Read up to `dest.len()` samples; returns how many were produced.
    pub fn read(&self, dest: &mut [f32]) -> usize {
        let buf = self.buffer.lock();

        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        let count = dest.len().min(write.wrapping_sub(read));
        if count == 0 {
            return 0;
        }

        let start = read & self.mask;
        let first = count.min(self.capacity - start);
        dest[..first].copy_from_slice(&buf[start..start + first]);
        dest[first..count].copy_from_slice(&buf[..count - first]);
        drop(buf);

        self.read_pos.store(read + count, Ordering::Release);
        count
    }
}
