//! Packet assembler (§4.3): validates a decoded frame's length field and
//! CRC, then hands the unstuffed inner packet to the inbound queue.

use crate::crc::{crc32_compare, crc32_compute};
use crate::error::LinkError;
use crate::frame::OVERHEAD;

/// A validated packet: header (`dest`, `source`) plus the unstuffed inner
/// bytes `[dest, source, length] ++ payload`, stripped of its trailing CRC.
pub struct Packet {
    pub dest: u8,
    pub source: u8,
    pub bytes: Vec<u8>,
}

/// Validates a decoded frame buffer and extracts the packet, per the five
/// checks in §4.3. Any failed check logs the raw buffer at the call site
/// (stages do this since they own the logger target) and returns an error;
/// the decoder has already been reset by the time this runs.
pub fn assemble(buf: Vec<u8>) -> Result<Packet, LinkError> {
    if buf.len() < OVERHEAD {
        return Err(LinkError::FrameTooLarge);
    }

    let declared_len = buf[2] as usize;
    if declared_len != buf.len() - OVERHEAD {
        return Err(LinkError::FrameTooLarge);
    }

    let (pkt, crc_recv) = buf.split_at(buf.len() - 4);
    if crc_recv.len() != 4 {
        return Err(LinkError::FrameTooLarge);
    }
    if pkt.len() - 3 != declared_len {
        return Err(LinkError::FrameTooLarge);
    }

    let crc_expected = crc32_compute(pkt);
    if !crc32_compare(crc_expected, crc_recv) {
        let mut received = [0u8; 4];
        received.copy_from_slice(crc_recv);
        return Err(LinkError::CrcMismatch {
            computed: crc_expected,
            received: u32::from_be_bytes(received),
        });
    }

    Ok(Packet {
        dest: buf[0],
        source: buf[1],
        bytes: pkt.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;

    fn unstuff(wire: &[u8]) -> Vec<u8> {
        let mut decoder = crate::frame::Decoder::new();
        for &b in wire {
            if let Ok(Some(crate::frame::DecodedBuf(buf))) = decoder.push_byte(b) {
                return buf;
            }
        }
        panic!("frame never completed");
    }

    #[test]
    fn valid_frame_assembles() {
        let wire = encode(0, 10, &[1, 2, 3]).unwrap();
        let inner = unstuff(&wire);
        let pkt = assemble(inner).unwrap();
        assert_eq!(pkt.dest, 10);
        assert_eq!(pkt.source, 0);
        assert_eq!(&pkt.bytes[3..], &[1, 2, 3]);
    }

    #[test]
    fn zero_byte_payload_assembles() {
        // S1-style minimal frame: buf.len() == OVERHEAD exactly, one byte
        // short of what a spurious "+3" floor would have rejected.
        let wire = encode(0, 10, &[]).unwrap();
        let inner = unstuff(&wire);
        let pkt = assemble(inner).unwrap();
        assert_eq!(pkt.dest, 10);
        assert_eq!(pkt.source, 0);
        assert_eq!(&pkt.bytes[3..], &[] as &[u8]);
    }

    #[test]
    fn one_and_two_byte_payloads_assemble() {
        for payload in [&[0xAAu8][..], &[0xAA, 0xBB][..]] {
            let wire = encode(0, 10, payload).unwrap();
            let inner = unstuff(&wire);
            let pkt = assemble(inner).unwrap();
            assert_eq!(&pkt.bytes[3..], payload);
        }
    }

    #[test]
    fn length_mismatch_rejected() {
        let wire = encode(0, 10, &[1, 2, 3]).unwrap();
        let mut inner = unstuff(&wire);
        inner[2] = 99;
        assert!(matches!(assemble(inner), Err(LinkError::FrameTooLarge)));
    }

    #[test]
    fn crc_mismatch_rejected() {
        let wire = encode(0, 10, &[1, 2, 3]).unwrap();
        let mut inner = unstuff(&wire);
        let last = inner.len() - 1;
        inner[last] ^= 0xff;
        assert!(matches!(assemble(inner), Err(LinkError::CrcMismatch { .. })));
    }
}
