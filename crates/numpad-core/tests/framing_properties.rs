//! Integration tests for the framing layer.
//!
//! These tests drive `encode_frame` and `FrameParser` together through the
//! public API with many pseudo-random frame sets and chunk splits, checking
//! that fragmentation, truncation and corruption never change which frames
//! come out the other end.

use numpad_core::protocol::{
    checksum, encode_frame, Frame, FrameParser, ETX, MAX_DATA_LEN, STX,
};
use numpad_core::{Key, KeyEvent, KeyState};

/// Small deterministic generator so failures are reproducible without a
/// `rand` dependency.
struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }

    fn byte(&mut self) -> u8 {
        self.next_u32() as u8
    }
}

fn random_frames(rng: &mut Lcg, count: usize) -> Vec<Frame> {
    (0..count)
        .map(|_| {
            let len = rng.below(MAX_DATA_LEN as u32 + 1) as usize;
            let data: Vec<u8> = (0..len).map(|_| rng.byte()).collect();
            Frame::new(rng.byte(), &data)
        })
        .collect()
}

fn concat(frames: &[Frame]) -> Vec<u8> {
    frames.iter().flat_map(Frame::encode).collect()
}

/// Feeds `bytes` in random-sized chunks and collects every emitted frame.
fn feed_in_chunks(rng: &mut Lcg, bytes: &[u8]) -> Vec<Frame> {
    let mut parser = FrameParser::new();
    let mut out = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let take = (rng.below(9) as usize + 1).min(rest.len());
        let (chunk, tail) = rest.split_at(take);
        out.extend(parser.push(chunk));
        rest = tail;
    }
    out
}

// ── Round trip across arbitrary splits ────────────────────────────────────────

#[test]
fn test_frames_survive_arbitrary_chunk_splits() {
    let mut rng = Lcg(0x5EED);
    for round in 0..200 {
        // Arrange
        let frames = random_frames(&mut rng, 1 + round % 8);
        let bytes = concat(&frames);

        // Act
        let parsed = feed_in_chunks(&mut rng, &bytes);

        // Assert
        assert_eq!(parsed, frames, "round {round} produced a different frame sequence");
    }
}

#[test]
fn test_byte_at_a_time_equals_all_at_once() {
    let mut rng = Lcg(42);
    for _ in 0..50 {
        // Arrange
        let frames = random_frames(&mut rng, 5);
        let bytes = concat(&frames);

        // Act
        let all_at_once = FrameParser::new().push(&bytes);
        let mut parser = FrameParser::new();
        let one_by_one: Vec<Frame> = bytes.iter().flat_map(|b| parser.push(&[*b])).collect();

        // Assert
        assert_eq!(all_at_once, one_by_one);
        assert_eq!(all_at_once, frames);
    }
}

// ── Truncation ────────────────────────────────────────────────────────────────

#[test]
fn test_oversized_payload_round_trips_as_first_sixteen_bytes() {
    // Arrange
    let data: Vec<u8> = (0u8..=40).collect();

    // Act
    let bytes = encode_frame(0x02, &data);
    let parsed = FrameParser::new().push(&bytes);

    // Assert
    assert_eq!(bytes[2], 16);
    assert_eq!(parsed, vec![Frame::new(0x02, &data[..16])]);
}

// ── Corruption and noise ──────────────────────────────────────────────────────

#[test]
fn test_corrupted_checksum_then_valid_frame_yields_only_valid_frame() {
    let mut rng = Lcg(7);
    for _ in 0..100 {
        // Arrange – the bad frame's checksum is off by a non-zero delta
        let bad = random_frames(&mut rng, 1).remove(0);
        let good = random_frames(&mut rng, 1).remove(0);
        let mut bytes = bad.encode();
        let delta = rng.below(255) as u8 + 1;
        if let Some(chk) = bytes.last_mut() {
            *chk = chk.wrapping_add(delta);
        }
        bytes.extend(good.encode());

        // Act
        let parsed = feed_in_chunks(&mut rng, &bytes);

        // Assert
        assert_eq!(parsed, vec![good]);
    }
}

#[test]
fn test_noise_between_frames_is_skipped() {
    let mut rng = Lcg(99);
    for _ in 0..100 {
        // Arrange – noise bytes never equal STX, so they cannot open a candidate
        let frames = random_frames(&mut rng, 4);
        let mut bytes = Vec::new();
        for frame in &frames {
            for _ in 0..rng.below(6) {
                let mut noise = rng.byte();
                if noise == STX {
                    noise = 0x00;
                }
                bytes.push(noise);
            }
            bytes.extend(frame.encode());
        }

        // Act
        let parsed = feed_in_chunks(&mut rng, &bytes);

        // Assert
        assert_eq!(parsed, frames);
    }
}

/// Finds `frame` as a checksum-valid window of `input` at or after `from`,
/// returning the index just past it.  A LEN byte above 16 is accepted for a
/// 16-byte payload because the parser clamps it.
fn find_source_window(input: &[u8], from: usize, frame: &Frame) -> Option<usize> {
    let len = frame.data.len();
    let n = len + 5;
    (from..=input.len().saturating_sub(n)).find_map(|start| {
        let w = input.get(start..start + n)?;
        let declared = usize::from(w[2]);
        let len_ok = declared == len || (len == MAX_DATA_LEN && declared > MAX_DATA_LEN);
        let matches = w[0] == STX
            && w[1] == frame.command
            && len_ok
            && w[3..3 + len] == frame.data[..]
            && w[3 + len] == ETX
            && w[n - 1] == checksum(&w[..n - 1]);
        matches.then_some(start + n)
    })
}

#[test]
fn test_every_emitted_frame_comes_from_a_valid_window_of_the_input() {
    // Arrange – random noise with frames planted in it; noise may swallow
    // some of them, but nothing may come out that the input did not carry.
    let mut rng = Lcg(2024_03_23);
    let planted = random_frames(&mut rng, 50);
    let mut bytes = Vec::new();
    for frame in &planted {
        let noise_len = rng.below(400) as usize;
        bytes.extend((0..noise_len).map(|_| rng.byte()));
        bytes.extend(frame.encode());
    }

    // Act
    let parsed = feed_in_chunks(&mut rng, &bytes);

    // Assert – emitted frames map, in order, onto windows of the input
    assert!(!parsed.is_empty());
    let mut cursor = 0;
    for frame in &parsed {
        assert!(frame.data.len() <= MAX_DATA_LEN);
        cursor = find_source_window(&bytes, cursor, frame)
            .unwrap_or_else(|| panic!("{frame:?} does not appear in the input"));
    }
}

// ── Key notifications end to end ──────────────────────────────────────────────

#[test]
fn test_key_notifications_decode_from_parsed_frames() {
    // Arrange – press and release Num5 as the firmware would report it
    let events = [
        KeyEvent::new(Key::Num5, KeyState::Rise),
        KeyEvent::new(Key::Num5, KeyState::High),
        KeyEvent::new(Key::Num5, KeyState::Fall),
        KeyEvent::new(Key::Num5, KeyState::Low),
    ];
    let bytes: Vec<u8> = events.iter().flat_map(|e| e.to_frame().encode()).collect();

    // Act
    let decoded: Vec<KeyEvent> = FrameParser::new()
        .push(&bytes)
        .iter()
        .filter_map(KeyEvent::from_frame)
        .collect();

    // Assert
    assert_eq!(decoded, events);
}
