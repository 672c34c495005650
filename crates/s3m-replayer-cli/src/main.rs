//! Terminal player for Scream Tracker 3 modules.
//!
//! Loads an S3M file, prints a short banner, and either streams it to the
//! default audio device or renders one pass to a WAV file. Synthesis runs
//! on a dedicated producer thread; the main thread only watches the
//! engine's loop counter to decide when to stop.

mod args;
mod audio;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::info;

use s3m_replayer::export::{ExportConfig, export_to_wav};
use s3m_replayer::{S3mFile, S3mPlayer};

use args::CliArgs;
use audio::{AudioOutput, BUFFER_BACKOFF_MICROS, PRODUCER_CHUNK, RingBuffer, StreamConfig};

fn main() -> ExitCode {
    env_logger::init();

    let args = CliArgs::parse();
    if args.show_help {
        CliArgs::print_help();
        return ExitCode::SUCCESS;
    }
    let Some(path) = args.file_path.clone() else {
        CliArgs::print_help();
        return ExitCode::from(2);
    };

    match run(&path, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str, args: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let file = Arc::new(S3mFile::load(path)?);
    print_banner(&file);

    let mut player = S3mPlayer::new();
    player.set_sample_rate(args.sample_rate);
    player.load_file(Arc::clone(&file));

    if args.trace {
        player.set_row_observer(|position, row| println!("{position} {row}"));
    }

    if let Some(wav_path) = &args.wav_out {
        let config = ExportConfig {
            sample_rate: args.sample_rate,
            channels: if args.stereo { 2 } else { 1 },
            ..ExportConfig::default()
        };
        info!("rendering {} to {}", path, wav_path);
        export_to_wav(&mut player, wav_path, config)?;
        println!("Wrote {wav_path}");
        return Ok(());
    }

    stream(player, args)
}

/// Realtime path: producer thread synthesizes into the ring buffer, rodio
/// drains it, the main thread waits for the song to loop once.
fn stream(player: S3mPlayer, args: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let channels: u16 = if args.stereo { 2 } else { 1 };
    let config = StreamConfig::new(args.sample_rate, channels);
    info!("streaming with {:.0} ms of buffer", config.latency_ms());

    let ring = Arc::new(RingBuffer::new(config.ring_buffer_size));
    let done = Arc::new(AtomicBool::new(false));
    let finished = player.finished_handle();

    let output = AudioOutput::start(
        config.sample_rate,
        config.channels,
        Arc::clone(&ring),
        Arc::clone(&done),
    )?;

    let producer = {
        let ring = Arc::clone(&ring);
        let done = Arc::clone(&done);
        let stereo = args.stereo;
        std::thread::spawn(move || {
            let mut player = player;
            let mut buffer = [0.0f32; PRODUCER_CHUNK];
            while !done.load(Ordering::Relaxed) {
                if stereo {
                    player.synth_stereo(&mut buffer);
                } else {
                    player.synth_mono(&mut buffer);
                }

                let mut written = 0;
                while written < buffer.len() && !done.load(Ordering::Relaxed) {
                    written += ring.write(&buffer[written..]);
                    if written < buffer.len() {
                        std::thread::sleep(Duration::from_micros(BUFFER_BACKOFF_MICROS));
                    }
                }
            }
        })
    };

    // The loop counter is the only state shared with the synth thread.
    while finished.load(Ordering::Relaxed) == 0 {
        std::thread::sleep(Duration::from_millis(10));
    }
    done.store(true, Ordering::Relaxed);

    producer.join().expect("synth thread panicked");
    output.finish();
    Ok(())
}

fn print_banner(file: &S3mFile) {
    println!("Song: {}", file.name);

    print!("Pans: |");
    for pan in &file.panning {
        print!("{pan:.2}|");
    }
    println!();

    println!("Master volume: {}", file.master_volume);
    println!(
        "Speed {} / Tempo {} / {}",
        file.initial_speed,
        file.initial_tempo,
        if file.is_stereo() { "stereo" } else { "mono" }
    );
}
