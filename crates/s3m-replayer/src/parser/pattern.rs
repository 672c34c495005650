//! Packed pattern decoding.
//!
//! On disk a pattern is a little-endian length word followed by that many
//! packed bytes. Rows are terminated by a zero byte; every other byte opens
//! a slot whose high bits select which columns follow:
//!
//! - bit 0x20: note and instrument bytes
//! - bit 0x40: volume byte
//! - bit 0x80: command and infobyte
//!
//! The low five bits are the channel number.

use crate::error::{Result, S3mError};
use crate::format::{MAX_CHANNELS, Pattern, ROWS_PER_PATTERN, Row, Slot};

/// Decode `ROWS_PER_PATTERN` rows from a packed pattern payload.
///
/// Trailing bytes past the 64th row terminator are ignored; running out of
/// bytes mid-row is an error.
pub(crate) fn decode_pattern(data: &[u8], pattern: usize) -> Result<Pattern> {
    let mut reader = PackedReader { data, pos: 0, pattern };
    let mut rows = Vec::with_capacity(ROWS_PER_PATTERN);
    for _ in 0..ROWS_PER_PATTERN {
        rows.push(reader.read_row()?);
    }
    Ok(Pattern { rows })
}

struct PackedReader<'a> {
    data: &'a [u8],
    pos: usize,
    pattern: usize,
}

impl PackedReader<'_> {
    fn read_row(&mut self) -> Result<Row> {
        let mut slots = Vec::new();
        loop {
            let what = self.read_byte()?;
            if what == 0 {
                return Ok(Row { slots });
            }
            if slots.len() >= MAX_CHANNELS {
                return Err(self.malformed("more than 32 slots in one row"));
            }

            let mut slot = Slot::empty(what & 0x1F);
            if what & 0x20 != 0 {
                slot.note = self.read_byte()?;
                slot.instrument = self.read_byte()?;
            }
            if what & 0x40 != 0 {
                slot.volume = self.read_byte()?;
            }
            if what & 0x80 != 0 {
                slot.command = self.read_byte()?;
                slot.infobyte = self.read_byte()?;
            }
            slots.push(slot);
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.malformed("packed data truncated"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn malformed(&self, reason: &str) -> S3mError {
        S3mError::MalformedPattern {
            pattern: self.pattern,
            reason: reason.to_string(),
        }
    }
}
