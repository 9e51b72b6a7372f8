//! Streaming MAVLink v2 frame parser.
//!
//! The parser is fed raw byte chunks as they arrive off the wire and yields
//! discrete frames in arrival order. A frame is either a validated message
//! from the known-message table or an invalid marker covering the bytes that
//! failed to parse. Corrupt input never stops the stream: the parser
//! resynchronizes on the next magic byte and keeps going.

use crate::messages;

/// MAVLink v2 start-of-frame magic.
pub const MAGIC_V2: u8 = 0xFD;

/// Fixed v2 header length (magic through 24-bit message id).
pub const HEADER_LEN: usize = 10;

const CHECKSUM_LEN: usize = 2;
const SIGNATURE_LEN: usize = 13;
const INCOMPAT_SIGNED: u8 = 0x01;

/// One parsed unit of the transport protocol.
///
/// `Valid` carries the complete wire bytes of the frame (header, payload,
/// checksum, signature if present) so a consumer can forward it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Valid { name: &'static str, payload: Vec<u8> },
    Invalid { raw: Vec<u8> },
}

/// Stateful parser. A message may span multiple chunks and a chunk may hold
/// multiple messages; leftover bytes are carried between `feed` calls.
#[derive(Debug, Default)]
pub struct MavParser {
    buf: Vec<u8>,
}

impl MavParser {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume one raw chunk, returning every frame completed by it.
    /// Never blocks and never fails; unparseable bytes come back as
    /// `Frame::Invalid`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            // Resynchronize: everything before the next magic byte is noise.
            match self.buf.iter().position(|b| *b == MAGIC_V2) {
                Some(0) => {}
                Some(n) => {
                    let raw: Vec<u8> = self.buf.drain(..n).collect();
                    out.push(Frame::Invalid { raw });
                }
                None => {
                    if !self.buf.is_empty() {
                        let raw = std::mem::take(&mut self.buf);
                        out.push(Frame::Invalid { raw });
                    }
                    return out;
                }
            }

            if self.buf.len() < HEADER_LEN {
                return out;
            }

            let payload_len = self.buf[1] as usize;
            let signed = self.buf[2] & INCOMPAT_SIGNED != 0;
            let total = HEADER_LEN
                + payload_len
                + CHECKSUM_LEN
                + if signed { SIGNATURE_LEN } else { 0 };
            if self.buf.len() < total {
                return out;
            }

            let msg_id = u32::from(self.buf[7])
                | u32::from(self.buf[8]) << 8
                | u32::from(self.buf[9]) << 16;
            let frame: Vec<u8> = self.buf.drain(..total).collect();

            match messages::lookup(msg_id) {
                Some(def) if checksum_ok(&frame, payload_len, def.crc_extra) => {
                    out.push(Frame::Valid {
                        name: def.name,
                        payload: frame,
                    });
                }
                // Unknown id or checksum mismatch: the whole candidate is
                // consumed as one invalid marker, keeping the decision
                // independent of how the input was chunked.
                _ => out.push(Frame::Invalid { raw: frame }),
            }
        }
    }
}

fn checksum_ok(frame: &[u8], payload_len: usize, crc_extra: u8) -> bool {
    let crc_at = HEADER_LEN + payload_len;
    let wire = u16::from_le_bytes([frame[crc_at], frame[crc_at + 1]]);
    wire == crc_x25(&frame[1..crc_at], crc_extra)
}

/// X.25 checksum over the frame starting at the length byte, folding in the
/// message's CRC_EXTRA seed last.
pub(crate) fn crc_x25(bytes: &[u8], crc_extra: u8) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for b in bytes.iter().copied().chain(std::iter::once(crc_extra)) {
        let tmp = b ^ (crc & 0xFF) as u8;
        let tmp = tmp ^ (tmp << 4);
        crc = (crc >> 8)
            ^ (u16::from(tmp) << 8)
            ^ (u16::from(tmp) << 3)
            ^ (u16::from(tmp) >> 4);
    }
    crc
}
