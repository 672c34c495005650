//! S3M file parser producing a structured [`S3mFile`].
//!
//! The format is little-endian with paragraph (x16) file pointers: a fixed
//! 96-byte header, the order list, 16-bit pointer tables for instruments and
//! patterns, an optional 32-byte panning table, then instrument headers and
//! sample/pattern payloads wherever their pointers say.

mod pattern;

use std::path::Path;

use log::warn;

use crate::error::{Result, S3mError};
use crate::format::{
    Instrument, MAX_CHANNELS, MAX_INSTRUMENTS, MAX_ORDERS, MAX_PATTERNS, MAX_SAMPLE_LENGTH,
    ORDER_END, ORDER_MARKER, Pattern, S3mFile,
};

/// Parse an S3M module from raw bytes.
pub fn load_s3m(data: &[u8]) -> Result<S3mFile> {
    S3mParser { data }.parse()
}

impl S3mFile {
    /// Read and parse an S3M module from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<S3mFile> {
        let data = std::fs::read(path)?;
        load_s3m(&data)
    }
}

const HEADER_LEN: usize = 96;
const INSTRUMENT_HEADER_LEN: usize = 80;

struct S3mParser<'a> {
    data: &'a [u8],
}

impl S3mParser<'_> {
    fn parse(&self) -> Result<S3mFile> {
        self.ensure_range(0, HEADER_LEN)
            .map_err(|_| S3mError::BadModule("file shorter than header"))?;

        if self.data[28] != 0x1A {
            return Err(S3mError::BadModule("missing 0x1A end-of-file byte"));
        }
        if self.data[29] != 16 {
            return Err(S3mError::BadModule("type byte is not 16"));
        }
        if &self.data[44..48] != b"SCRM" {
            return Err(S3mError::BadModule("SCRM magic not found"));
        }

        let num_orders = self.read_u16(32)? as usize;
        let num_instruments = self.read_u16(34)? as usize;
        let num_patterns = self.read_u16(36)? as usize;
        if num_orders > MAX_ORDERS {
            return Err(S3mError::BadModule("too many orders"));
        }
        if num_instruments > MAX_INSTRUMENTS {
            return Err(S3mError::BadModule("too many instruments"));
        }
        if num_patterns > MAX_PATTERNS {
            return Err(S3mError::BadModule("too many patterns"));
        }

        let flags = self.read_u16(38)?;
        let version = self.read_u16(40)?;
        let global_volume = self.data[48];
        let initial_speed = self.data[49];
        let initial_tempo = self.data[50];
        let master_volume = self.data[51];
        let default_panning = self.data[53];

        let mut channel_settings = [0u8; MAX_CHANNELS];
        channel_settings.copy_from_slice(&self.data[64..96]);

        let mut orders = [ORDER_END; MAX_ORDERS];
        self.ensure_range(HEADER_LEN, num_orders)?;
        orders[..num_orders].copy_from_slice(&self.data[HEADER_LEN..HEADER_LEN + num_orders]);
        self.check_orders(&orders, num_orders)?;

        let ins_ptrs_off = HEADER_LEN + num_orders;
        let pat_ptrs_off = ins_ptrs_off + 2 * num_instruments;
        let pan_table_off = pat_ptrs_off + 2 * num_patterns;

        let panning = self.derive_panning(
            &channel_settings,
            default_panning,
            master_volume,
            pan_table_off,
        )?;

        let mut instruments = vec![Instrument::default(); MAX_INSTRUMENTS];
        for (i, instrument) in instruments.iter_mut().enumerate().take(num_instruments) {
            let paragraph = self.read_u16(ins_ptrs_off + 2 * i)? as usize;
            *instrument = self.parse_instrument(paragraph * 16, i)?;
        }

        let mut patterns = vec![Pattern::default(); MAX_PATTERNS];
        for (i, pattern) in patterns.iter_mut().enumerate().take(num_patterns) {
            let paragraph = self.read_u16(pat_ptrs_off + 2 * i)? as usize;
            if paragraph == 0 {
                continue; // empty pattern
            }
            *pattern = self.parse_pattern(paragraph * 16, i)?;
        }

        Ok(S3mFile {
            name: fixed_string(&self.data[0..28]),
            num_orders,
            num_instruments,
            num_patterns,
            flags,
            version,
            global_volume,
            initial_speed,
            initial_tempo,
            master_volume,
            default_panning,
            channel_settings,
            orders,
            panning,
            instruments,
            patterns,
        })
    }

    /// Every playable entry must name a representable pattern, and at least
    /// one playable entry must exist or the order walk would never settle.
    fn check_orders(&self, orders: &[u8; MAX_ORDERS], num_orders: usize) -> Result<()> {
        let mut playable = false;
        for &entry in &orders[..num_orders] {
            if entry == ORDER_MARKER || entry == ORDER_END {
                continue;
            }
            if entry as usize >= MAX_PATTERNS {
                return Err(S3mError::BadModule("order entry out of pattern range"));
            }
            playable = true;
        }
        if !playable {
            return Err(S3mError::BadModule("order list has no playable entry"));
        }
        Ok(())
    }

    fn derive_panning(
        &self,
        channel_settings: &[u8; MAX_CHANNELS],
        default_panning: u8,
        master_volume: u8,
        pan_table_off: usize,
    ) -> Result<[f32; MAX_CHANNELS]> {
        let mut panning = [0.5f32; MAX_CHANNELS];

        for (pan, &setting) in panning.iter_mut().zip(channel_settings) {
            if setting < 8 {
                *pan = 0.25;
            } else if setting < 16 {
                *pan = 0.75;
            }
        }

        if default_panning == 0xFC {
            self.ensure_range(pan_table_off, MAX_CHANNELS)?;
            let table = &self.data[pan_table_off..pan_table_off + MAX_CHANNELS];
            for (pan, &byte) in panning.iter_mut().zip(table) {
                if byte & 0x20 != 0 {
                    *pan = (byte & 0x0F) as f32 / 16.0;
                }
            }
        }

        // Mono module: everything to the centre.
        if master_volume & 0x80 == 0 {
            panning = [0.5; MAX_CHANNELS];
        }

        Ok(panning)
    }

    fn parse_instrument(&self, offset: usize, index: usize) -> Result<Instrument> {
        self.ensure_range(offset, INSTRUMENT_HEADER_LEN)
            .map_err(|_| S3mError::BadInstrument {
                index,
                reason: "header extends past end of file".to_string(),
            })?;
        let header = &self.data[offset..offset + INSTRUMENT_HEADER_LEN];

        if &header[76..80] != b"SCRS" {
            return Err(S3mError::BadInstrument {
                index,
                reason: "SCRS magic not found".to_string(),
            });
        }

        let kind = header[0];
        let length = u32::from_le_bytes(header[16..20].try_into().unwrap()).min(MAX_SAMPLE_LENGTH);
        let loop_begin = u32::from_le_bytes(header[20..24].try_into().unwrap());
        let loop_end = u32::from_le_bytes(header[24..28].try_into().unwrap());
        let volume = header[28].min(64);
        let flags = header[31];
        let c4spd = u32::from_le_bytes(header[32..36].try_into().unwrap());

        if flags & 1 != 0 && (loop_begin >= length || loop_end > length) {
            return Err(S3mError::BadInstrument {
                index,
                reason: format!(
                    "loop {loop_begin}..{loop_end} outside sample of length {length}"
                ),
            });
        }

        let sample_data = if kind == 1 {
            // The three memseg bytes form a paragraph pointer in the order
            // high, low, mid.
            let memseg = ((header[13] as usize) << 16)
                | ((header[15] as usize) << 8)
                | header[14] as usize;
            let data_off = memseg * 16;
            self.ensure_range(data_off, length as usize)
                .map_err(|_| S3mError::BadInstrument {
                    index,
                    reason: "sample data extends past end of file".to_string(),
                })?;
            self.data[data_off..data_off + length as usize].to_vec()
        } else {
            if kind > 1 {
                warn!(
                    "instrument {}: unsupported sample type {}, will play silence",
                    index + 1,
                    kind
                );
            }
            Vec::new()
        };

        Ok(Instrument {
            kind,
            name: fixed_string(&header[48..76]),
            length,
            loop_begin,
            loop_end,
            volume,
            flags,
            c4spd,
            sample_data,
        })
    }

    fn parse_pattern(&self, offset: usize, index: usize) -> Result<Pattern> {
        let packed_len = self.read_u16(offset).map_err(|_| S3mError::MalformedPattern {
            pattern: index,
            reason: "pattern pointer past end of file".to_string(),
        })? as usize;
        // Some writers count the length word itself, so the payload may stop
        // short of `packed_len` at end of file; the 64-row requirement in the
        // decoder still catches real truncation.
        let start = offset + 2;
        let end = (start + packed_len).min(self.data.len());
        pattern::decode_pattern(&self.data[start..end], index)
    }

    fn read_u16(&self, offset: usize) -> Result<u16> {
        self.ensure_range(offset, 2)?;
        Ok(u16::from_le_bytes([self.data[offset], self.data[offset + 1]]))
    }

    fn ensure_range(&self, offset: usize, size: usize) -> Result<()> {
        let end = offset
            .checked_add(size)
            .ok_or(S3mError::BadModule("offset overflow"))?;
        if end > self.data.len() {
            return Err(S3mError::BadModule("unexpected end of file"));
        }
        Ok(())
    }
}

fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}
