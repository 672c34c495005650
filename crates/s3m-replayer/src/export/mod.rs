//! Offline rendering of a module to audio files.

mod wav;

pub use wav::export_to_wav;

use crate::player::S3mPlayer;

/// Configuration for offline rendering.
#[derive(Debug, Clone, Copy)]
pub struct ExportConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// 1 = mono, 2 = interleaved stereo.
    pub channels: u16,
    /// Hard cap on the rendered duration, for songs that loop through a
    /// jump effect and never raise the finished counter.
    pub max_seconds: f32,
}

impl ExportConfig {
    /// Mono at 44.1 kHz.
    pub fn mono() -> Self {
        ExportConfig {
            sample_rate: 44_100,
            channels: 1,
            max_seconds: 600.0,
        }
    }

    /// Stereo at 44.1 kHz.
    pub fn stereo() -> Self {
        ExportConfig {
            channels: 2,
            ..Self::mono()
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::mono()
    }
}

/// Render one full pass through the song into a sample vector.
///
/// The player must already have a file bound; it is reset first so the
/// render starts from the top. Stops when the song finishes or the
/// configured duration cap is hit.
pub fn render_song(player: &mut S3mPlayer, config: ExportConfig) -> Vec<f32> {
    player.reset();

    let max_samples =
        (config.max_seconds as f64 * config.sample_rate as f64) as usize * config.channels as usize;
    let mut samples = Vec::new();
    let mut chunk = [0.0f32; 4096];

    while !player.is_finished() && samples.len() < max_samples {
        if config.channels == 2 {
            player.synth_stereo(&mut chunk);
        } else {
            player.synth_mono(&mut chunk);
        }
        samples.extend_from_slice(&chunk);
    }

    samples
}
