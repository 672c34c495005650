//! Command-line argument parsing for the S3M replayer CLI.

use std::env;

use crate::audio::DEFAULT_SAMPLE_RATE;

/// Parsed command-line arguments.
#[derive(Debug)]
pub struct CliArgs {
    /// Module path to play.
    pub file_path: Option<String>,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Mix to interleaved stereo instead of mono.
    pub stereo: bool,
    /// Render to this WAV file instead of playing in realtime.
    pub wav_out: Option<String>,
    /// Print every row as it is dispatched.
    pub trace: bool,
    /// Whether help was requested (or arguments were invalid).
    pub show_help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            file_path: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            stereo: false,
            wav_out: None,
            trace: false,
            show_help: false,
        }
    }
}

impl CliArgs {
    /// Parse arguments from the process command line.
    pub fn parse() -> Self {
        let mut args = Self::default();
        let mut iter = env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--stereo" => {
                    args.stereo = true;
                }
                "--trace" => {
                    args.trace = true;
                }
                "--rate" => match iter.next().map(|v| v.parse::<u32>()) {
                    Some(Ok(rate)) if rate > 0 => args.sample_rate = rate,
                    _ => {
                        eprintln!("--rate requires a positive sample rate in Hz");
                        args.show_help = true;
                    }
                },
                "--wav" => {
                    if let Some(path) = iter.next() {
                        args.wav_out = Some(path);
                    } else {
                        eprintln!("--wav requires an output path");
                        args.show_help = true;
                    }
                }
                "--help" | "-h" => {
                    args.show_help = true;
                }
                _ if arg.starts_with('-') => {
                    eprintln!("Unknown flag: {}", arg);
                    args.show_help = true;
                }
                _ => {
                    args.file_path = Some(arg);
                }
            }
        }

        args
    }

    /// Print help text to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage:\n  s3m-replayer [--stereo] [--rate <hz>] [--wav <out.wav>] [--trace] <file.s3m>\n\n\
             Flags:\n\
             \x20 --stereo             Mix to stereo using the module's panning\n\
             \x20 --rate <hz>          Output sample rate (default 44100)\n\
             \x20 --wav <out.wav>      Render one pass to a WAV file instead of playing\n\
             \x20 --trace              Print rows in tracker notation while playing\n\
             \x20 -h, --help           Show this help\n\n\
             Examples:\n\
             \x20 s3m-replayer song.s3m\n\
             \x20 s3m-replayer --stereo --wav out.wav song.s3m\n"
        );
    }
}
