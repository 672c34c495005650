//! WAV file export via `hound`.

use std::path::Path;

use crate::error::{Result, S3mError};
use crate::player::S3mPlayer;

use super::{ExportConfig, render_song};

/// Render one full pass through the song to a 16-bit WAV file.
///
/// The engine does not clip; the f32 to i16 conversion here clamps to the
/// nominal range.
pub fn export_to_wav<P: AsRef<Path>>(
    player: &mut S3mPlayer,
    output_path: P,
    config: ExportConfig,
) -> Result<()> {
    let samples = render_song(player, config);

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(output_path, spec).map_err(io_error)?;
    for &sample in &samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(quantized).map_err(io_error)?;
    }
    writer.finalize().map_err(io_error)?;

    Ok(())
}

fn io_error(err: hound::Error) -> S3mError {
    match err {
        hound::Error::IoError(io) => S3mError::Io(io),
        other => S3mError::Io(std::io::Error::other(other.to_string())),
    }
}
