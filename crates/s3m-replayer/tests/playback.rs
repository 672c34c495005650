//! Engine scenarios: tick timing, effect semantics, cursor movement and
//! mixer output, all driven through the public synth API.

use std::sync::{Arc, Mutex};

use s3m_replayer::format::{
    Instrument, MAX_INSTRUMENTS, MAX_ORDERS, MAX_PATTERNS, NO_VOLUME, ORDER_END, ORDER_MARKER,
    Pattern, S3mFile, Slot,
};
use s3m_replayer::{RowPosition, S3mPlayer};

const RATE: u32 = 44_100;
const NOTE_C4: u8 = 0x40;
const NOTE_C5: u8 = 0x50;

/// A constant-full-scale instrument: every output sample is 127/128.
fn loud_instrument() -> Instrument {
    Instrument {
        kind: 1,
        length: 64_000,
        volume: 64,
        c4spd: 8363,
        sample_data: vec![255; 64_000],
        ..Instrument::default()
    }
}

/// Module skeleton: given patterns, given order list, one loud instrument,
/// stereo master with a clean 0.25 output scale.
fn test_file(patterns: Vec<Pattern>, order_list: &[u8]) -> S3mFile {
    let mut orders = [ORDER_END; MAX_ORDERS];
    orders[..order_list.len()].copy_from_slice(order_list);

    let mut instruments = vec![Instrument::default(); MAX_INSTRUMENTS];
    instruments[0] = loud_instrument();

    let mut all_patterns = vec![Pattern::default(); MAX_PATTERNS];
    for (slot, pattern) in all_patterns.iter_mut().zip(patterns) {
        *slot = pattern;
    }

    S3mFile {
        name: "test".to_string(),
        num_orders: order_list.len(),
        num_instruments: 1,
        num_patterns: MAX_PATTERNS,
        flags: 0,
        version: 0x1320,
        global_volume: 64,
        initial_speed: 6,
        initial_tempo: 125,
        master_volume: 0xC0, // stereo, mixing scale (64 * 64) / (512 * 32) = 0.25
        default_panning: 0,
        channel_settings: [16; 32],
        orders,
        panning: [0.5; 32],
        instruments,
        patterns: all_patterns,
    }
}

fn player_for(file: S3mFile) -> S3mPlayer {
    let mut player = S3mPlayer::new();
    player.set_sample_rate(RATE);
    player.load_file(Arc::new(file));
    player
}

fn observed_positions(player: &mut S3mPlayer) -> Arc<Mutex<Vec<RowPosition>>> {
    let positions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&positions);
    player.set_row_observer(move |position, _row| sink.lock().unwrap().push(position));
    positions
}

/// Expected first-sample amplitude for the loud instrument at a channel
/// volume, with the default global volume and master 0xC0.
fn amp(volume: i32) -> f32 {
    (127.0 / 128.0) * (volume as f32 / 64.0) * 0.25
}

/// Looping 16-byte square wave, positive for 8 samples then negative for 8,
/// so output pitch is observable as the sign-flip rate.
fn square_instrument() -> Instrument {
    let mut data = vec![255u8; 8];
    data.extend(std::iter::repeat_n(0u8, 8));
    Instrument {
        kind: 1,
        length: 16,
        loop_begin: 0,
        loop_end: 16,
        volume: 64,
        flags: 1,
        c4spd: 8363,
        sample_data: data,
        ..Instrument::default()
    }
}

/// Number of positive-to-negative transitions in a window; one per square
/// wave cycle.
fn cycles(window: &[f32]) -> usize {
    window
        .windows(2)
        .filter(|pair| pair[0] > 0.0 && pair[1] < 0.0)
        .count()
}

fn note_slot(channel: u8, volume: u8) -> Slot {
    Slot {
        note: NOTE_C4,
        instrument: 1,
        volume,
        ..Slot::empty(channel)
    }
}

fn command_slot(channel: u8, letter: char, infobyte: u8) -> Slot {
    Slot {
        command: letter as u8 - 64,
        infobyte,
        ..Slot::empty(channel)
    }
}

fn pattern_with_rows(rows: &[(usize, Vec<Slot>)]) -> Pattern {
    let mut pattern = Pattern::default();
    for (row, slots) in rows {
        pattern.rows[*row].slots = slots.clone();
    }
    pattern
}

#[test]
fn tick_length_follows_initial_tempo() {
    // speed 6, tempo 125 at 44100 Hz: one tick is 882 samples, one row six
    // ticks. The second row fires with the 7th tick reservation.
    let mut player = player_for(test_file(vec![Pattern::default()], &[0]));
    let positions = observed_positions(&mut player);

    let mut buffer = vec![0.0f32; 882 * 6];
    player.synth_mono(&mut buffer);
    assert_eq!(positions.lock().unwrap().len(), 1);

    let mut one_tick = vec![0.0f32; 882];
    player.synth_mono(&mut one_tick);
    assert_eq!(positions.lock().unwrap().len(), 2);
}

#[test]
fn tempo_effect_recomputes_tick_length() {
    // T with 150 BPM on row 0: the remaining five ticks of the row shrink
    // to floor(2.5 * 44100 / 150) = 735 samples.
    let pattern = pattern_with_rows(&[(0, vec![command_slot(0, 'T', 150)])]);
    let mut player = player_for(test_file(vec![pattern], &[0]));
    let positions = observed_positions(&mut player);

    let mut buffer = vec![0.0f32; 882 + 735 * 5];
    player.synth_mono(&mut buffer);
    assert_eq!(positions.lock().unwrap().len(), 1);

    let mut one_tick = vec![0.0f32; 735];
    player.synth_mono(&mut one_tick);
    assert_eq!(positions.lock().unwrap().len(), 2);
}

#[test]
fn volume_slide_memory_repeats_last_rate() {
    // Row 0 carries D84 (up 8 per tick) on a note at volume 16; every
    // following row repeats the slide through D00.
    let mut rows = vec![(0usize, vec![{
        let mut slot = note_slot(0, 16);
        slot.command = b'D' - 64;
        slot.infobyte = 0x84;
        slot
    }])];
    for row in 1..64 {
        rows.push((row, vec![command_slot(0, 'D', 0x00)]));
    }
    let mut player = player_for(test_file(vec![pattern_with_rows(&rows)], &[0]));

    let mut buffer = vec![0.0f32; 882 * 8];
    player.synth_mono(&mut buffer);

    let tolerance = 1e-4;
    assert!((buffer[0] - amp(16)).abs() < tolerance, "tick 0: {}", buffer[0]);
    assert!((buffer[882] - amp(24)).abs() < tolerance, "tick 1");
    assert!((buffer[882 * 5] - amp(56)).abs() < tolerance, "tick 5");
    // Row 1 dispatch does not slide, but its D00 re-arms the memory...
    assert!((buffer[882 * 6] - amp(56)).abs() < tolerance, "row 1 tick 0");
    // ...so tick 1 of row 1 keeps climbing, clamped at 64.
    assert!((buffer[882 * 7] - amp(64)).abs() < tolerance, "row 1 tick 1");
}

#[test]
fn st300_quirk_slides_on_the_first_tick_too() {
    let mut rows = vec![(0usize, vec![{
        let mut slot = note_slot(0, 16);
        slot.command = b'D' - 64;
        slot.infobyte = 0x84;
        slot
    }])];
    for row in 1..64 {
        rows.push((row, vec![command_slot(0, 'D', 0x00)]));
    }
    let mut file = test_file(vec![pattern_with_rows(&rows)], &[0]);
    file.version = 0x1300;
    let mut player = player_for(file);

    let mut buffer = vec![0.0f32; 882];
    player.synth_mono(&mut buffer);
    assert!((buffer[0] - amp(24)).abs() < 1e-4, "got {}", buffer[0]);
}

#[test]
fn tone_portamento_slides_instead_of_snapping() {
    // Row 0 plays C-4 on the looping square, row 1 asks for C-5 through
    // G04; later rows keep the slide running through G00 memory. The pitch
    // must move tick by tick: halfway through the slide the wave cycles
    // faster than C-4 but slower than C-5, and long after arrival it runs
    // at exactly the rate of a control player whose G00 carried no memory
    // and therefore retuned immediately.
    let build = |infobyte: u8| {
        let mut rows = vec![(0usize, vec![note_slot(0, 64)])];
        rows.push((1, vec![{
            let mut slot = note_slot(0, 64);
            slot.note = NOTE_C5;
            slot.command = b'G' - 64;
            slot.infobyte = infobyte;
            slot
        }]));
        for row in 2..64 {
            rows.push((row, vec![command_slot(0, 'G', 0x00)]));
        }
        let mut file = test_file(vec![pattern_with_rows(&rows)], &[0]);
        file.instruments[0] = square_instrument();
        player_for(file)
    };

    const ROW: usize = 882 * 6;
    let mut sliding = vec![0.0f32; ROW * 40];
    build(0x04).synth_mono(&mut sliding);
    let mut snapped = vec![0.0f32; ROW * 40];
    build(0x00).synth_mono(&mut snapped);

    // Reference rates: ~63 cycles per row at C-4, ~125 at C-5.
    let c4_rate = cycles(&sliding[..ROW]);
    assert!((55..=70).contains(&c4_rate), "C-4 rate: {c4_rate}");
    let c5_rate = cycles(&snapped[ROW..ROW * 2]);
    assert!((115..=135).contains(&c5_rate), "C-5 rate: {c5_rate}");

    // Mid-slide the armed portamento sits strictly between the two.
    let mid = cycles(&sliding[ROW * 5..ROW * 6]);
    assert!(
        mid > c4_rate + 5 && mid < c5_rate - 5,
        "mid-slide rate {mid} not between {c4_rate} and {c5_rate}"
    );

    // The slide arrives on the target period and stays there: far past the
    // slide both players cycle at the same rate, with no overshoot.
    let settled = cycles(&sliding[ROW * 32..ROW * 40]);
    let target = cycles(&snapped[ROW * 32..ROW * 40]);
    assert!(
        settled.abs_diff(target) <= 4,
        "settled {settled} vs target {target}"
    );
}

#[test]
fn pattern_break_lands_on_decimal_row() {
    // C04 on row 5 of the pattern at order 2: playback continues at the
    // next order, row 4.
    let break_pattern = pattern_with_rows(&[(5, vec![command_slot(0, 'C', 0x04)])]);
    let mut file = test_file(
        vec![
            Pattern::default(),
            Pattern::default(),
            break_pattern,
            Pattern::default(),
        ],
        &[0, 1, 2, 3],
    );
    file.initial_speed = 1;
    file.initial_tempo = 255;
    let mut player = player_for(file);
    let positions = observed_positions(&mut player);

    let mut chunk = vec![0.0f32; 4096];
    while positions.lock().unwrap().len() < 135 {
        player.synth_mono(&mut chunk);
    }

    let positions = positions.lock().unwrap();
    assert_eq!(
        positions[133],
        RowPosition {
            order: 2,
            pattern: 2,
            row: 5
        }
    );
    assert_eq!(
        positions[134],
        RowPosition {
            order: 3,
            pattern: 3,
            row: 4
        }
    );
}

#[test]
fn pattern_break_reads_the_parameter_as_decimal_digits() {
    // C19 targets row 1 * 10 + 9 = 19, not 0x19 = 25.
    let break_pattern = pattern_with_rows(&[(0, vec![command_slot(0, 'C', 0x19)])]);
    let mut file = test_file(vec![break_pattern, Pattern::default()], &[0, 1]);
    file.initial_speed = 1;
    file.initial_tempo = 255;
    let mut player = player_for(file);
    let positions = observed_positions(&mut player);

    let mut chunk = vec![0.0f32; 432 * 2];
    player.synth_mono(&mut chunk);

    let positions = positions.lock().unwrap();
    assert_eq!(
        positions[1],
        RowPosition {
            order: 1,
            pattern: 1,
            row: 19
        }
    );
}

#[test]
fn pattern_jump_takes_precedence_over_break_order() {
    // B03 queues order 3; the C22 in the same row only contributes row 22.
    let jump_pattern = pattern_with_rows(&[(
        0,
        vec![command_slot(0, 'B', 3), command_slot(1, 'C', 0x22)],
    )]);
    let mut file = test_file(
        vec![
            jump_pattern,
            Pattern::default(),
            Pattern::default(),
            Pattern::default(),
        ],
        &[0, 1, 2, 3],
    );
    file.initial_speed = 1;
    file.initial_tempo = 255;
    let mut player = player_for(file);
    let positions = observed_positions(&mut player);

    let mut chunk = vec![0.0f32; 432 * 2];
    player.synth_mono(&mut chunk);

    let positions = positions.lock().unwrap();
    assert_eq!(
        positions[1],
        RowPosition {
            order: 3,
            pattern: 3,
            row: 22
        }
    );
}

#[test]
fn order_walk_skips_markers_and_counts_loops() {
    let mut file = test_file(
        vec![Pattern::default(), Pattern::default()],
        &[0, ORDER_MARKER, 1, ORDER_END],
    );
    file.initial_speed = 1;
    file.initial_tempo = 255;
    let mut player = player_for(file);
    let positions = observed_positions(&mut player);

    assert!(!player.is_finished());

    let mut chunk = vec![0.0f32; 4096];
    while positions.lock().unwrap().len() < 129 {
        player.synth_mono(&mut chunk);
    }

    {
        let positions = positions.lock().unwrap();
        // Order 1 is a marker: row 64 of the song lands on order 2.
        assert_eq!(
            positions[64],
            RowPosition {
                order: 2,
                pattern: 1,
                row: 0
            }
        );
        // After the sentinel the song wraps to the front.
        assert_eq!(
            positions[128],
            RowPosition {
                order: 0,
                pattern: 0,
                row: 0
            }
        );
    }

    assert!(player.is_finished());
    assert_eq!(player.finished(), 1);
}

#[test]
fn note_cut_silences_at_the_given_tick() {
    // SC2 cuts the note at tick 2; later rows keep the channel present so
    // the per-tick scan reaches it.
    let mut rows = vec![(0usize, vec![{
        let mut slot = note_slot(0, 64);
        slot.command = b'S' - 64;
        slot.infobyte = 0xC2;
        slot
    }])];
    for row in 1..64 {
        rows.push((row, vec![Slot::empty(0)]));
    }
    let mut player = player_for(test_file(vec![pattern_with_rows(&rows)], &[0]));

    let mut buffer = vec![0.0f32; 882 * 6];
    player.synth_mono(&mut buffer);

    assert!((buffer[0] - amp(64)).abs() < 1e-4);
    assert!((buffer[882] - amp(64)).abs() < 1e-4);
    assert!(buffer[882 * 2..].iter().all(|&s| s == 0.0));
}

#[test]
fn note_delay_fires_at_the_given_tick() {
    // SD2 delays the trigger to tick 2. The per-tick scan reads the slots
    // of the row the cursor has already advanced to, so row 1 repeats the
    // note for the delayed trigger to latch.
    let rows = vec![
        (0usize, vec![{
            let mut slot = note_slot(0, NO_VOLUME);
            slot.command = b'S' - 64;
            slot.infobyte = 0xD2;
            slot
        }]),
        (1, vec![note_slot(0, NO_VOLUME)]),
    ];
    let mut player = player_for(test_file(vec![pattern_with_rows(&rows)], &[0]));

    let mut buffer = vec![0.0f32; 882 * 3];
    player.synth_mono(&mut buffer);

    assert!(buffer[..882 * 2].iter().all(|&s| s == 0.0));
    assert!((buffer[882 * 2] - amp(64)).abs() < 1e-4);
}

#[test]
fn pattern_delay_stretches_the_row() {
    // SE1 rewinds the tick counter by the whole parameter byte (0xE1 = 225)
    // times the speed, so the row spans 226 * 6 = 1356 ticks in total.
    let pattern = pattern_with_rows(&[(0, vec![command_slot(0, 'S', 0xE1)])]);
    let mut player = player_for(test_file(vec![pattern], &[0]));
    let positions = observed_positions(&mut player);

    let mut buffer = vec![0.0f32; 882 * 1356];
    player.synth_mono(&mut buffer);
    assert_eq!(positions.lock().unwrap().len(), 1);

    let mut one_tick = vec![0.0f32; 882];
    player.synth_mono(&mut one_tick);
    assert_eq!(positions.lock().unwrap().len(), 2);
}

#[test]
fn sample_offset_skips_into_the_sample() {
    // The sample is silent for its first 256 bytes; O01 starts right after.
    let mut quiet_then_loud = loud_instrument();
    quiet_then_loud.sample_data[..256].fill(128);

    let make = |with_offset: bool| {
        let mut slot = note_slot(0, 64);
        if with_offset {
            slot.command = b'O' - 64;
            slot.infobyte = 0x01;
        }
        let mut file = test_file(
            vec![pattern_with_rows(&[(0, vec![slot])])],
            &[0],
        );
        file.instruments[0] = quiet_then_loud.clone();
        player_for(file)
    };

    let mut buffer = vec![0.0f32; 64];
    make(false).synth_mono(&mut buffer);
    assert_eq!(buffer[0], 0.0);

    make(true).synth_mono(&mut buffer);
    assert!((buffer[0] - amp(64)).abs() < 1e-4);
}

#[test]
fn global_volume_effect_scales_output() {
    let pattern = pattern_with_rows(&[(
        0,
        vec![note_slot(0, 64), command_slot(1, 'V', 32)],
    )]);
    let mut player = player_for(test_file(vec![pattern], &[0]));

    let mut buffer = vec![0.0f32; 64];
    player.synth_mono(&mut buffer);
    assert!((buffer[0] - amp(64) / 2.0).abs() < 1e-4, "got {}", buffer[0]);
}

#[test]
fn pan_command_places_channel_hard_left() {
    let pattern = pattern_with_rows(&[(0, vec![{
        let mut slot = note_slot(0, 64);
        slot.command = b'S' - 64;
        slot.infobyte = 0x80; // pan 0/16
        slot
    }])]);
    let mut player = player_for(test_file(vec![pattern], &[0]));

    let mut buffer = vec![0.0f32; 64];
    player.synth_stereo(&mut buffer);
    assert!((buffer[0] - amp(64)).abs() < 1e-4, "left: {}", buffer[0]);
    assert_eq!(buffer[1], 0.0, "right");
}

#[test]
fn stereo_uses_file_panning_and_interleaves() {
    let pattern = pattern_with_rows(&[(0, vec![note_slot(0, 64)])]);
    let mut file = test_file(vec![pattern], &[0]);
    file.panning[0] = 0.75;
    let mut player = player_for(file);

    let mut buffer = vec![0.0f32; 64];
    player.synth_stereo(&mut buffer);
    assert!((buffer[0] - amp(64) * 0.25).abs() < 1e-4, "left");
    assert!((buffer[1] - amp(64) * 0.75).abs() < 1e-4, "right");
}

#[test]
fn synth_is_deterministic_across_chunkings() {
    let mut rows = vec![(0usize, vec![note_slot(0, 48), note_slot(3, 64)])];
    rows.push((8, vec![command_slot(0, 'D', 0x04)]));
    let file = test_file(vec![pattern_with_rows(&rows)], &[0]);

    let mut player_a = player_for(file.clone());
    let mut whole = vec![0.0f32; 10_000];
    player_a.synth_mono(&mut whole);

    let mut player_b = player_for(file);
    let mut pieces = Vec::new();
    for chunk_len in [1, 999, 4096, 10_000 - 1 - 999 - 4096] {
        let mut chunk = vec![0.0f32; chunk_len];
        player_b.synth_mono(&mut chunk);
        pieces.extend_from_slice(&chunk);
    }

    assert_eq!(whole, pieces);
}

#[test]
fn synth_overwrites_the_whole_buffer() {
    let pattern = pattern_with_rows(&[(0, vec![note_slot(0, 64)])]);
    let file = test_file(vec![pattern], &[0]);

    let mut clean = vec![0.0f32; 2001];
    player_for(file.clone()).synth_stereo(&mut clean);

    let mut dirty = vec![f32::NAN; 2001];
    player_for(file).synth_stereo(&mut dirty);

    assert!(dirty.iter().all(|s| s.is_finite()));
    assert_eq!(clean, dirty);
    // Odd trailing sample of an interleaved buffer stays silent.
    assert_eq!(dirty[2000], 0.0);
}

#[test]
fn synth_without_a_file_emits_silence() {
    let mut player = S3mPlayer::new();
    player.set_sample_rate(RATE);
    let mut buffer = vec![1.0f32; 128];
    player.synth_mono(&mut buffer);
    assert!(buffer.iter().all(|&s| s == 0.0));
}

#[test]
fn reset_restarts_playback_identically() {
    let pattern = pattern_with_rows(&[(0, vec![note_slot(0, 64)])]);
    let mut player = player_for(test_file(vec![pattern], &[0]));

    let mut first = vec![0.0f32; 4096];
    player.synth_mono(&mut first);

    player.reset();
    let mut second = vec![0.0f32; 4096];
    player.synth_mono(&mut second);

    assert_eq!(first, second);
    assert!(!player.is_finished());
}
