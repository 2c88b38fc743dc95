//! Wire frame encode/decode: START/END delimiters, byte-stuffing, and the
//! decoder's recovery state machine (§4.2).

use crate::crc::{crc32_compute, crc32_to_bytes};
use crate::error::LinkError;

pub const START: u8 = 0x95;
pub const END: u8 = 0xea;
pub const ESC: u8 = 0xbb;
pub const MAX_PAYLOAD: usize = 254;
pub const OVERHEAD: usize = 7; // dest + source + length + 4-byte CRC

/// Decoder states, matching the table in §4.2.
enum State {
    Idle,
    InFrame,
    InFrameEsc,
}

/// One complete, unstuffed inner buffer handed to the packet assembler once
/// the decoder sees END: `[dest, source, length] ++ payload ++ crc`.
pub struct DecodedBuf(pub Vec<u8>);

/// Byte-stuffed frame decoder. Owns exactly the state described in §3's
/// `DecoderState` entity: the accumulation buffer, the escape flag, and
/// whether a frame is currently in progress.
pub struct Decoder {
    buf: Vec<u8>,
    state: State,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder {
            buf: Vec::with_capacity(MAX_PAYLOAD + OVERHEAD),
            state: State::Idle,
        }
    }

    fn clear(&mut self) {
        self.buf.clear();
    }

    /// Feeds one byte into the decoder. Returns `Ok(Some(buf))` when a
    /// frame completes, `Ok(None)` while still assembling, and `Err` for a
    /// single garbage byte seen in `Idle` — the decoder always resynchronizes
    /// on its own, so the error is purely informational (count-and-continue,
    /// per §4.2/§7).
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<DecodedBuf>, LinkError> {
        match self.state {
            State::Idle => {
                if byte == START {
                    self.clear();
                    self.state = State::InFrame;
                    Ok(None)
                } else {
                    Err(LinkError::GarbageByte)
                }
            }
            State::InFrame => {
                if byte == ESC {
                    self.state = State::InFrameEsc;
                    Ok(None)
                } else if byte == END {
                    self.state = State::Idle;
                    let buf = std::mem::take(&mut self.buf);
                    Ok(Some(DecodedBuf(buf)))
                } else if byte == START {
                    // A stray START mid-frame cannot occur in a valid
                    // stuffed encoding (START is always escaped), so treat
                    // it as a restart of frame sync rather than an error.
                    self.clear();
                    Ok(None)
                } else {
                    self.buf.push(byte);
                    Ok(None)
                }
            }
            State::InFrameEsc => {
                self.buf.push(byte ^ ESC);
                self.state = State::InFrame;
                Ok(None)
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes one wire frame for `(source, dest, payload)` per §4.2. Returns
/// `Err` if the payload is at or above [`MAX_PAYLOAD`].
pub fn encode(source: u8, dest: u8, payload: &[u8]) -> Result<Vec<u8>, LinkError> {
    if payload.len() >= MAX_PAYLOAD {
        return Err(LinkError::FrameTooLarge);
    }

    let mut inner = Vec::with_capacity(3 + payload.len() + 4);
    inner.push(dest);
    inner.push(source);
    inner.push(payload.len() as u8);
    inner.extend_from_slice(payload);

    let crc = crc32_compute(&inner);
    inner.extend_from_slice(&crc32_to_bytes(crc));

    let mut out = Vec::with_capacity(inner.len() * 2 + 2);
    out.push(START);
    for &byte in &inner {
        if byte == START || byte == END || byte == ESC {
            out.push(ESC);
            out.push(byte ^ ESC);
        } else {
            out.push(byte);
        }
    }
    out.push(END);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut decoder = Decoder::new();
        let mut frames = Vec::new();
        for &b in bytes {
            if let Ok(Some(DecodedBuf(buf))) = decoder.push_byte(b) {
                frames.push(buf);
            }
        }
        frames
    }

    #[test]
    fn s1_one_byte_payload_no_stuffing() {
        let wire = encode(0, 10, &[0x01]).unwrap();
        let frames = decode_all(&wire);
        assert_eq!(frames.len(), 1);
        let inner = &frames[0];
        assert_eq!(inner[0], 10); // dest
        assert_eq!(inner[1], 0); // source
        assert_eq!(inner[2], 1); // length
        assert_eq!(&inner[3..4], &[0x01]);
    }

    #[test]
    fn s2_stuffing_round_trips() {
        let payload = [0x95_u8, 0xbb, 0xea];
        let wire = encode(5, 6, &payload).unwrap();
        // every payload byte needing escape doubles on the wire
        assert!(wire.len() > payload.len() + OVERHEAD + 2);
        let frames = decode_all(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][3..6], &payload);
    }

    #[test]
    fn s3_garbage_recovery_around_two_frames() {
        let f1 = encode(0, 1, &[1, 2, 3]).unwrap();
        let f2 = encode(0, 1, &[4, 5, 6]).unwrap();
        let mut wire = vec![0xff, 0xff, 0xff];
        wire.extend_from_slice(&f1);
        wire.push(0x00);
        wire.extend_from_slice(&f2);

        let mut decoder = Decoder::new();
        let mut frames = Vec::new();
        let mut failures = 0;
        for &b in &wire {
            match decoder.push_byte(b) {
                Ok(Some(DecodedBuf(buf))) => frames.push(buf),
                Ok(None) => {}
                Err(_) => failures += 1,
            }
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(failures, 4);
    }

    #[test]
    fn round_trip_law_all_dest_source_pairs_sampled() {
        for (source, dest) in [(0u8, 0u8), (255, 0), (0, 255), (128, 64)] {
            let payload = [1u8, 2, 3, 4, 5];
            let wire = encode(source, dest, &payload).unwrap();
            let frames = decode_all(&wire);
            assert_eq!(frames.len(), 1);
            let inner = &frames[0];
            assert_eq!(inner[0], dest);
            assert_eq!(inner[1], source);
            assert_eq!(&inner[3..3 + payload.len()], &payload);
        }
    }

    #[test]
    fn payload_at_max_is_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD];
        assert!(encode(0, 0, &payload).is_err());
    }

    #[test]
    fn payload_one_below_max_succeeds() {
        let payload = vec![0u8; MAX_PAYLOAD - 1];
        assert!(encode(0, 0, &payload).is_ok());
    }

    #[test]
    fn corrupting_a_stuffed_byte_never_yields_a_different_valid_frame() {
        let payload = [0x95_u8, 0x01, 0x02];
        let wire = encode(0, 1, &payload).unwrap();
        let original = decode_all(&wire).remove(0);
        // flip a byte inside the stuffed region (skip START/END markers)
        for i in 1..wire.len() - 1 {
            let mut corrupted = wire.clone();
            corrupted[i] ^= 0x01;
            let frames = decode_all(&corrupted);
            if let Some(buf) = frames.first() {
                // If a frame was produced at all, it must not silently
                // reconstruct to the same bytes as the uncorrupted frame.
                assert_ne!(buf, &original);
            }
        }
    }
}
