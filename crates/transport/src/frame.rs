//! Wire framing for the instrument's control channel.
//!
//! Every request and response is framed the same way:
//!
//! ```text
//! [0..2]  magic   CE 93
//! [2]     code
//! [3]     payload length
//! [4..]   payload
//! last 2  CRC-16/XMODEM over everything before it, big-endian
//! ```
//!
//! Frames never exceed 64 bytes (a single USB bulk packet).  Responses
//! carry the request code with bit 7 set for an ACK.

use crate::crc::crc16;
use crate::TransportError;

/// Frame magic.
pub const MAGIC: [u8; 2] = [0xce, 0x93];

/// Largest whole frame, and so the largest payload is `MAX_FRAME - 6`.
pub const MAX_FRAME: usize = 64;

/// Largest payload that fits a frame.
pub const MAX_PAYLOAD: usize = MAX_FRAME - 6;

/// Request codes, and the ACK/NACK response codes.
pub mod codes {
    #![allow(missing_docs)]

    pub const ACK: u8 = 0x80;
    pub const NACK: u8 = 0x81;

    pub const PING: u8 = 0x00;
    pub const GET_PROTOCOL_VERSION: u8 = 0x02;
    pub const GET_SERIAL_NUMBER: u8 = 0x03;

    pub const CPU_REBOOT: u8 = 0x10;
    pub const GPS_RESET: u8 = 0x11;
    pub const LMK05318B_PDN: u8 = 0x12;

    pub const SERIAL_SYNC: u8 = 0x1e;
    pub const SET_BAUD: u8 = 0x1f;

    pub const LMK05318B_WRITE: u8 = 0x60;
    pub const LMK05318B_READ: u8 = 0x61;

    pub const TMP117_WRITE: u8 = 0x62;
    pub const TMP117_READ: u8 = 0x63;

    pub const PEEK: u8 = 0x71;
    pub const POKE: u8 = 0x72;
    pub const GET_CRC: u8 = 0x73;
    pub const FLASH_ERASE: u8 = 0x74;
}

/// Payload bytes, bounded by the frame size.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// A deframed message: the magic, length and CRC are implicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Request or response code.
    pub code: u8,
    /// Payload bytes.
    pub payload: Payload,
}

impl Message {
    /// Build a message, failing if the payload cannot fit a frame.
    pub fn new(code: u8, payload: &[u8]) -> Result<Message, TransportError> {
        let payload = Payload::from_slice(payload)
            .map_err(|_| TransportError::Oversize(payload.len()))?;
        Ok(Message { code, payload })
    }

    /// Frame this message for the wire.
    pub fn frame(&self) -> heapless::Vec<u8, MAX_FRAME> {
        frame(self.code, &self.payload)
    }
}

impl core::fmt::Display for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.code)?;
        for b in &self.payload {
            write!(f, " {b:02x}")?;
        }
        Ok(())
    }
}

/// Frame a code and payload.  The payload must fit: callers constructing
/// payloads from [`Payload`] cannot overflow.
pub fn frame(code: u8, payload: &[u8]) -> heapless::Vec<u8, MAX_FRAME> {
    assert!(payload.len() + 6 <= MAX_FRAME);
    let mut message = heapless::Vec::new();
    let _ = message.extend_from_slice(&MAGIC);
    let _ = message.push(code);
    let _ = message.push(payload.len() as u8);
    let _ = message.extend_from_slice(payload);
    let sum = crc16(&message);
    let _ = message.extend_from_slice(&sum.to_be_bytes());
    message
}

/// Validate and strip the framing from a received message.
pub fn deframe(message: &[u8]) -> Result<Message, TransportError> {
    if message.len() < 6 {
        return Err(TransportError::UnderLength);
    }
    if message[..2] != MAGIC {
        return Err(TransportError::BadMagic);
    }
    if crc16(message) != 0 {
        return Err(TransportError::BadCrc);
    }
    let code = message[2];
    let length = usize::from(message[3]);
    if message.len() != length + 6 {
        return Err(TransportError::LengthMismatch);
    }
    Message::new(code, &message[4..message.len() - 2])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let code = 0x12;
        let payload = b"This is a test";
        let framed = frame(code, payload);
        let msg = deframe(&framed).unwrap();
        assert_eq!(msg.code, code);
        assert_eq!(&msg.payload[..], payload);
    }

    #[test]
    fn frame_layout() {
        let framed = frame(codes::PING, &[0xaa]);
        assert_eq!(&framed[..5], &[0xce, 0x93, 0x00, 0x01, 0xaa]);
        assert_eq!(framed.len(), 7);
    }

    #[test]
    fn deframe_rejects_corruption() {
        let mut framed = frame(0x12, b"payload").to_vec();
        framed[5] ^= 1;
        assert_eq!(deframe(&framed), Err(TransportError::BadCrc));

        assert_eq!(deframe(&[0xce]), Err(TransportError::UnderLength));

        let mut wrong_magic = frame(0x12, b"payload").to_vec();
        wrong_magic[0] = 0xb5;
        assert_eq!(deframe(&wrong_magic), Err(TransportError::BadMagic));
    }

    #[test]
    fn deframe_rejects_truncation() {
        // A frame whose declared length disagrees with its size fails
        // the CRC first unless the CRC is recomputed, so patch one up.
        let mut framed = frame(0x12, b"abcd").to_vec();
        framed[3] = 3;
        let l = framed.len();
        let sum = crate::crc::crc16(&framed[..l - 2]);
        framed[l - 2..].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(deframe(&framed), Err(TransportError::LengthMismatch));
    }
}
