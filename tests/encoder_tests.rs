// Tests for the block-averaging PCM16 frame encoder. The encoding is part of
// the wire format, so these pin down exact numeric behavior.

use visit_scribe::audio::{encode_sample, FrameEncoder};

/// Deterministic pseudo-waveform in [-1, 1].
fn waveform(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| ((i as f32 * 0.37).sin() * 0.8) + ((i % 7) as f32 - 3.0) * 0.01)
        .collect()
}

#[test]
fn encoding_is_byte_identical_across_runs() {
    let input = waveform(48_000);

    let mut first = FrameEncoder::new(48_000, 16_000, 320).unwrap();
    let mut second = FrameEncoder::new(48_000, 16_000, 320).unwrap();

    assert_eq!(first.push(&input), second.push(&input));
}

#[test]
fn batching_does_not_change_the_output() {
    let input = waveform(9_600);

    let mut whole = FrameEncoder::new(48_000, 16_000, 320).unwrap();
    let expected: Vec<Vec<i16>> = whole.push(&input);

    let mut chunked = FrameEncoder::new(48_000, 16_000, 320).unwrap();
    let mut collected = Vec::new();
    for chunk in input.chunks(701) {
        collected.extend(chunked.push(chunk));
    }

    assert_eq!(collected, expected);
}

#[test]
fn frames_have_exactly_the_configured_size() {
    let mut encoder = FrameEncoder::new(16_000, 16_000, 320).unwrap();
    let frames = encoder.push(&waveform(3_210));

    assert_eq!(frames.len(), 10); // 3210 samples -> 10 full frames
    assert!(frames.iter().all(|f| f.len() == 320));
}

#[test]
fn output_samples_are_window_means() {
    let mut encoder = FrameEncoder::new(32_000, 16_000, 4).unwrap();
    let frames = encoder.push(&[0.2, 0.4, -0.5, -0.3, 1.0, 1.0, 0.0, 0.0]);

    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame[0], encode_sample(0.3));
    assert_eq!(frame[1], encode_sample(-0.4));
    assert_eq!(frame[2], encode_sample(1.0));
    assert_eq!(frame[3], encode_sample(0.0));
}

#[test]
fn scaling_is_asymmetric_and_clamped() {
    assert_eq!(encode_sample(-1.0), -32768);
    assert_eq!(encode_sample(1.0), 32767);
    assert_eq!(encode_sample(-2.0), -32768);
    assert_eq!(encode_sample(3.5), 32767);
    assert_eq!(encode_sample(0.5), (0.5 * 32767.0) as i16);
    assert_eq!(encode_sample(-0.5), (-0.5 * 32768.0) as i16);
}

#[test]
fn partial_frames_are_discarded_on_reset() {
    let mut encoder = FrameEncoder::new(16_000, 16_000, 320).unwrap();

    // 319 samples: one short of a frame.
    assert!(encoder.push(&waveform(319)).is_empty());
    encoder.reset();

    // After the reset the pending tail is gone; a fresh 319 still completes
    // nothing, and the next sample closes a frame made only of new input.
    assert!(encoder.push(&waveform(319)).is_empty());
    let frames = encoder.push(&[0.0]);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].len(), 320);
}

#[test]
fn leftover_input_carries_across_pushes() {
    let mut encoder = FrameEncoder::new(48_000, 16_000, 2).unwrap();

    // Two of the three samples in the first window arrive first.
    assert!(encoder.push(&[0.3, 0.3]).is_empty());
    let frames = encoder.push(&[0.3, 0.6, 0.6, 0.6]);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0][0], encode_sample(0.3));
    assert_eq!(frames[0][1], encode_sample(0.6));
}
