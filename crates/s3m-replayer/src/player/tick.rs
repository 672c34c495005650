//! Row dispatch and tick scheduling.
//!
//! The engine runs two interleaved state machines: the coarse one walks
//! (order, pattern, row) through the [`Cursor`](super::cursor::Cursor), the
//! fine one counts ticks within the row. A row fires its effect dispatch on
//! tick 0; ticks 1..speed-1 apply the per-tick deltas (slides, portamento,
//! delayed notes and cuts).

use std::sync::atomic::Ordering;

use log::debug;

use crate::format::{NO_VOLUME, S3mFile, Slot};

use super::channel::note_period;
use super::{RowPosition, S3mPlayer};

impl S3mPlayer {
    /// One tick boundary: either fire the next row or run per-tick updates.
    pub(super) fn tick(&mut self, file: &S3mFile) {
        self.current_tick += 1;
        if self.current_tick >= self.speed {
            self.current_tick = 0;
            self.tick_row(file);
        } else {
            self.channel_tick(file);
        }
    }

    /// Dispatch the current row, then move the cursor: a queued jump wins
    /// over the natural row advance, and only the natural advance can
    /// increment the finished counter.
    fn tick_row(&mut self, file: &S3mFile) {
        self.update_row(file);

        if self.cursor.apply(&self.jump) {
            self.jump.clear();
        } else if self.cursor.next_row(file) {
            self.finished.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// First-tick processing of every slot in the current row.
    fn update_row(&mut self, file: &S3mFile) {
        let position = RowPosition {
            order: self.cursor.order,
            pattern: self.cursor.pattern,
            row: self.cursor.row,
        };
        let row = self.cursor.current_row(file);
        debug!("{position} {row}");
        if let Some(observer) = self.row_observer.as_mut() {
            observer(position, row);
        }

        for slot in row.slots() {
            let idx = slot.channel as usize;
            {
                let channel = &mut self.channels[idx];
                channel.note_on_tick = 0;
                channel.note_off_tick = 999;
                channel.volume_slide = 0;
                channel.portamento = 0.0;
                channel.new_sample_offset = 0.0;
            }

            match slot.command_letter() {
                Some('A') => self.speed = slot.infobyte as i32,
                Some('B') => {
                    self.jump.set_row(0);
                    self.jump.set_order(slot.infobyte as usize, file);
                }
                Some('C') => {
                    if !self.jump.has_target() {
                        self.jump.set_order(self.cursor.order + 1, file);
                    }
                    let row = (slot.infobyte >> 4) as usize * 10 + (slot.infobyte & 0x0F) as usize;
                    self.jump.set_row(row.min(63));
                }
                Some('T') => self.set_tempo(slot.infobyte as u32),
                Some('V') => self.global_volume = slot.infobyte as i32,
                Some('O') => {
                    self.channels[idx].new_sample_offset = slot.infobyte as f64 * 256.0;
                }
                Some('G') => {
                    let channel = &mut self.channels[idx];
                    if slot.infobyte != 0 {
                        channel.last_portamento = slot.infobyte as f64 * 4.0;
                    }
                    channel.portamento = channel.last_portamento;
                }
                Some('D') => {
                    let channel = &mut self.channels[idx];
                    if slot.infobyte != 0 {
                        let up = (slot.infobyte >> 4) as i32;
                        let down = (slot.infobyte & 0x0F) as i32;
                        if up > 0 {
                            channel.last_volume_slide = up;
                        } else if down > 0 {
                            channel.last_volume_slide = -down;
                        }
                    }
                    channel.volume_slide = channel.last_volume_slide;
                }
                Some('S') => {
                    let x = (slot.infobyte & 0x0F) as i32;
                    match slot.infobyte & 0xF0 {
                        0x80 => self.channels[idx].pan = x as f32 / 16.0,
                        0xC0 => self.channels[idx].note_off_tick = x,
                        0xD0 => self.channels[idx].note_on_tick = x,
                        0xE0 => self.current_tick = -(slot.infobyte as i32) * self.speed,
                        _ => {}
                    }
                }
                // E, F, H..L, I, J, Q, R, U, X, Y: not implemented.
                _ => {}
            }

            if self.channels[idx].note_on_tick == self.current_tick {
                self.note_on(slot, file);
            }
            if file.fast_volume_slides() {
                self.channels[idx].apply_volume_slide();
            }
        }
    }

    /// Per-tick updates for ticks 1..speed-1 of a row.
    fn channel_tick(&mut self, file: &S3mFile) {
        let row = self.cursor.current_row(file);
        for slot in row.slots() {
            let idx = slot.channel as usize;
            if self.channels[idx].note_on_tick == self.current_tick {
                self.note_on(slot, file);
            }

            let channel = &mut self.channels[idx];
            if channel.note_off_tick == self.current_tick {
                channel.active = false;
            }
            channel.apply_volume_slide();
            channel.apply_portamento();
        }
    }

    /// Trigger a slot on its channel: latch note and instrument, resolve
    /// the target period, and retune immediately unless a portamento is in
    /// flight.
    fn note_on(&mut self, slot: &Slot, file: &S3mFile) {
        let channel = &mut self.channels[slot.channel as usize];

        if slot.has_note() || slot.instrument != 0 {
            if slot.has_note() {
                channel.base_note = slot.base_note();
                channel.active = true;
                channel.sample_offset = channel.new_sample_offset;
            }
            if slot.instrument != 0 {
                channel.instrument = slot.instrument as usize - 1;
            }
            if slot.volume == NO_VOLUME && slot.instrument != 0 {
                channel.volume = file.instruments[channel.instrument].volume as i32;
            }

            let c4spd = file.instruments[channel.instrument].c4spd;
            channel.slide_period = note_period(channel.base_note, c4spd);
        }

        if slot.volume != NO_VOLUME {
            channel.volume = (slot.volume as i32).min(64);
        }

        if channel.portamento == 0.0 {
            channel.period = channel.slide_period;
        }
    }
}
