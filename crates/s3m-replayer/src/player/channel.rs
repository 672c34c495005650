//! Per-channel playback state and the nearest-sample resampler.

use crate::format::S3mFile;

/// Amiga-PAL-derived clock constant shared by all S3M period math.
const S3M_CLOCK: f64 = 14_317_056.0;

/// Mixer period for a semitone index at the given C-4 rate.
///
/// Smaller periods play higher; the constant keeps C-4 at `c4spd` Hz.
pub(crate) fn note_period(base_note: i32, c4spd: u32) -> f64 {
    8362.0 * 16.0 * 1712.0 / 2f64.powf(base_note as f64 / 12.0) / c4spd as f64
}

/// Playback state for one of the 32 mixer channels.
///
/// The `last_*` fields carry effect memory: a Dxy or Gxx with a zero
/// parameter repeats the previous value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Channel {
    pub active: bool,
    pub instrument: usize,
    pub base_note: i32,
    /// Current mixer period; positive whenever the channel is active.
    pub period: f64,
    /// Period the Gxx effect slides towards.
    pub slide_period: f64,
    /// Fractional position into the instrument's sample data.
    pub sample_offset: f64,
    pub volume: i32,
    /// Tick at which the pending note fires (SDx note delay).
    pub note_on_tick: i32,
    /// Tick at which the channel cuts (SCx note cut).
    pub note_off_tick: i32,
    pub volume_slide: i32,
    pub last_volume_slide: i32,
    pub portamento: f64,
    pub last_portamento: f64,
    /// Armed by Oxx; consumed by the next note trigger.
    pub new_sample_offset: f64,
    /// Stereo placement, 0.0 = left .. 1.0 = right.
    pub pan: f32,
}

impl Default for Channel {
    fn default() -> Self {
        Channel {
            active: false,
            instrument: 0,
            base_note: -1,
            period: 0.0,
            slide_period: 0.0,
            sample_offset: 0.0,
            volume: 64,
            note_on_tick: 0,
            note_off_tick: 999,
            volume_slide: 0,
            last_volume_slide: 0,
            portamento: 0.0,
            last_portamento: 0.0,
            new_sample_offset: 0.0,
            pan: 0.5,
        }
    }
}

impl Channel {
    /// Apply the per-tick volume delta, clamped to the 0..=64 range.
    pub fn apply_volume_slide(&mut self) {
        self.volume = (self.volume + self.volume_slide).clamp(0, 64);
    }

    /// Move `period` towards `slide_period` by the portamento rate,
    /// stopping exactly on the target.
    pub fn apply_portamento(&mut self) {
        if self.portamento == 0.0 {
            return;
        }
        if self.period < self.slide_period {
            self.period = (self.period + self.portamento).min(self.slide_period);
        } else if self.period > self.slide_period {
            self.period = (self.period - self.portamento).max(self.slide_period);
        }
    }

    /// Produce one output sample, advancing the fractional read position.
    ///
    /// Nearest-sample only. Running off the end of a non-looping sample
    /// deactivates the channel; looping samples wrap into their loop span
    /// unless the span is degenerate.
    pub fn sample(&mut self, file: &S3mFile, sample_rate: u32) -> f64 {
        let ins = &file.instruments[self.instrument];

        if self.sample_offset >= ins.sample_data.len() as f64 {
            self.active = false;
            return 0.0;
        }

        let step = S3M_CLOCK / sample_rate as f64 / self.period;
        let raw = ins.sample_data[self.sample_offset as usize] as f64 - 128.0;

        self.sample_offset += step;
        if ins.loops() && self.sample_offset >= ins.loop_end as f64 {
            let begin = ins.loop_begin as f64;
            let span = ins.loop_end as f64 - begin;
            if span > 0.0 {
                self.sample_offset = begin + (self.sample_offset - begin) % span;
            }
        }

        (raw / 128.0) * (self.volume as f64 / 64.0)
    }
}
