//! Transport capability for talking to the instrument.
//!
//! The planner and persistence layers never perform I/O themselves: they
//! are handed something implementing [`Transport`], whose single required
//! method exchanges one framed request for one framed response.  The
//! concrete operations (register bursts, memory peek/poke, flash erase,
//! device CRC) are provided methods layered on top, so an implementation
//! over USB, a serial port, or an in-memory test double is a few lines.
//!
//! [`Recorder`] is the odd one out: a `Transport` that executes nothing
//! and instead appends each framed request to a byte vector.  The
//! persistence layer uses it to express "the sequence of writes that
//! reproduces this configuration" as the body of a flash blob.

mod crc;
mod frame;

pub use crate::crc::{crc16, crc32, CRC32_EMPTY_SLOT, CRC32_VERIFY_MAGIC};
pub use crate::frame::{
    codes, deframe, frame, Message, Payload, MAGIC, MAX_FRAME, MAX_PAYLOAD,
};

/// Failures raised by a transport or by the framing layer.
///
/// Implementations map their underlying I/O errors into [`Failed`];
/// everything else is produced by this crate.
///
/// [`Failed`]: TransportError::Failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Fewer bytes than the smallest possible frame.
    #[error("under-length message")]
    UnderLength,
    /// The frame does not start with `CE 93`.
    #[error("incorrect magic")]
    BadMagic,
    /// The frame CRC-16 does not verify.
    #[error("bad CRC")]
    BadCrc,
    /// The declared payload length disagrees with the frame size.
    #[error("length mismatch")]
    LengthMismatch,
    /// The payload cannot fit a 64-byte frame.
    #[error("payload of {0} bytes does not fit a frame")]
    Oversize(usize),
    /// The device NACKed the request.
    #[error("result code is NACK {0:02x?}")]
    Nack(Vec<u8>),
    /// The device replied with an unrelated code.
    #[error("result code is {got:#04x}, wanted {want:#04x}")]
    UnexpectedCode {
        /// Code the caller expected.
        want: u8,
        /// Code the device sent.
        got: u8,
    },
    /// A retrieve echoed back different parameters than were sent.
    #[error("response does not match request")]
    ResponseMismatch,
    /// A ping came back with a different payload.
    #[error("ping self-test mismatch")]
    SelfTest,
    /// The underlying transport failed.
    #[error("transport failed: {0}")]
    Failed(String),
}

/// Largest register burst per request.
pub const MAX_BURST: usize = 32;

fn check(msg: Message, want: u8) -> Result<Message, TransportError> {
    if want != codes::NACK && msg.code == codes::NACK {
        return Err(TransportError::Nack(msg.payload.to_vec()));
    }
    if msg.code != want {
        return Err(TransportError::UnexpectedCode { want, got: msg.code });
    }
    Ok(msg)
}

/// The device capability consumed by the core.
pub trait Transport {
    /// Exchange one request for one response.
    fn transact(
        &mut self,
        code: u8,
        payload: &[u8],
    ) -> Result<Message, TransportError>;

    /// A request acknowledged with a bare ACK.
    fn command(
        &mut self,
        code: u8,
        payload: &[u8],
    ) -> Result<Message, TransportError> {
        check(self.transact(code, payload)?, codes::ACK)
    }

    /// A request answered with data under the request code with bit 7 set.
    fn retrieve(
        &mut self,
        code: u8,
        payload: &[u8],
    ) -> Result<Message, TransportError> {
        check(self.transact(code, payload)?, code | 0x80)
    }

    /// Echo check.  Any mismatch fails the whole operation.
    fn ping(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let resp = self.retrieve(codes::PING, payload)?;
        if resp.payload.as_slice() != payload {
            return Err(TransportError::SelfTest);
        }
        Ok(())
    }

    /// Protocol version of the connected firmware.
    fn protocol_version(&mut self) -> Result<u32, TransportError> {
        let resp = self.retrieve(codes::GET_PROTOCOL_VERSION, &[])?;
        let bytes: [u8; 4] = resp.payload.as_slice().try_into()
            .map_err(|_| TransportError::ResponseMismatch)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Serial number bytes of the connected device.
    fn serial_number(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self.retrieve(codes::GET_SERIAL_NUMBER, &[])?.payload.to_vec())
    }

    /// Pause the GPS pass-through serial stream.
    fn serial_sync(&mut self, microseconds: u32) -> Result<(), TransportError> {
        self.command(codes::SERIAL_SYNC, &microseconds.to_le_bytes())?;
        Ok(())
    }

    /// Set the GPS pass-through baud rate.
    fn set_baud(&mut self, baud: u32) -> Result<(), TransportError> {
        self.command(codes::SET_BAUD, &baud.to_le_bytes())?;
        Ok(())
    }

    /// Read device memory, chunking requests to fit the frame size.
    fn peek(
        &mut self,
        address: u32,
        length: u32,
    ) -> Result<Vec<u8>, TransportError> {
        let mut out = Vec::with_capacity(length as usize);
        let mut done = 0u32;
        while done < length {
            let todo = (length - done).min(MAX_BURST as u32);
            let addr = address + done;
            let mut req = [0u8; 8];
            req[..4].copy_from_slice(&addr.to_le_bytes());
            req[4..].copy_from_slice(&todo.to_le_bytes());
            let resp = self.retrieve(codes::PEEK, &req)?;
            let payload = resp.payload.as_slice();
            if payload.len() != todo as usize + 4
                || payload[..4] != addr.to_le_bytes()
            {
                return Err(TransportError::ResponseMismatch);
            }
            out.extend_from_slice(&payload[4..]);
            done += todo;
        }
        Ok(out)
    }

    /// Write device memory, 32 bytes per request.
    fn poke(&mut self, address: u32, data: &[u8]) -> Result<(), TransportError> {
        for (i, chunk) in data.chunks(MAX_BURST).enumerate() {
            let addr = address + (i * MAX_BURST) as u32;
            let mut req = Vec::with_capacity(4 + chunk.len());
            req.extend_from_slice(&addr.to_le_bytes());
            req.extend_from_slice(chunk);
            self.command(codes::POKE, &req)?;
        }
        Ok(())
    }

    /// CRC-32 of a span of device memory, computed device-side.
    fn crc(&mut self, address: u32, length: u32) -> Result<u32, TransportError> {
        let mut req = [0u8; 8];
        req[..4].copy_from_slice(&address.to_le_bytes());
        req[4..].copy_from_slice(&length.to_le_bytes());
        let resp = self.retrieve(codes::GET_CRC, &req)?;
        let payload = resp.payload.as_slice();
        if payload.len() != 12
            || payload[..4] != address.to_le_bytes()
            || payload[4..8] != length.to_le_bytes()
        {
            return Err(TransportError::ResponseMismatch);
        }
        let bytes: [u8; 4] = payload[8..].try_into()
            .map_err(|_| TransportError::ResponseMismatch)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Erase the flash sector containing `address`.
    fn flash_erase(&mut self, address: u32) -> Result<(), TransportError> {
        self.command(codes::FLASH_ERASE, &address.to_le_bytes())?;
        Ok(())
    }

    /// Read a burst of consecutive clock-chip registers.
    fn lmk05318b_read(
        &mut self,
        address: u16,
        length: u8,
    ) -> Result<Vec<u8>, TransportError> {
        let mut req = [0u8; 3];
        req[0] = length;
        req[1..].copy_from_slice(&address.to_be_bytes());
        let resp = self.retrieve(codes::LMK05318B_READ, &req)?;
        if resp.payload.len() != usize::from(length) {
            return Err(TransportError::ResponseMismatch);
        }
        Ok(resp.payload.to_vec())
    }

    /// Write a burst of consecutive clock-chip registers.
    fn lmk05318b_write(
        &mut self,
        address: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let mut req = Vec::with_capacity(2 + data.len());
        req.extend_from_slice(&address.to_be_bytes());
        req.extend_from_slice(data);
        self.command(codes::LMK05318B_WRITE, &req)?;
        Ok(())
    }
}

/// A transport that records framed requests instead of executing them.
///
/// Everything is ACKed with an empty payload, so only command-style
/// operations (writes) make sense against it; a retrieve will report
/// [`TransportError::UnexpectedCode`].
#[derive(Debug, Default)]
pub struct Recorder {
    bytes: Vec<u8>,
}

impl Recorder {
    /// A recorder with an empty tape.
    pub fn new() -> Recorder {
        Recorder::default()
    }

    /// The recorded frames, concatenated.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the recorder, yielding the concatenated frames.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Transport for Recorder {
    fn transact(
        &mut self,
        code: u8,
        payload: &[u8],
    ) -> Result<Message, TransportError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(TransportError::Oversize(payload.len()));
        }
        self.bytes.extend_from_slice(&frame(code, payload));
        Message::new(codes::ACK, &[])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    /// Answers every request from a canned queue, recording what it saw.
    struct Scripted {
        sent: Vec<(u8, Vec<u8>)>,
        replies: Vec<Message>,
    }

    impl Scripted {
        fn new(replies: Vec<Message>) -> Scripted {
            Scripted { sent: Vec::new(), replies }
        }
    }

    impl Transport for Scripted {
        fn transact(
            &mut self,
            code: u8,
            payload: &[u8],
        ) -> Result<Message, TransportError> {
            self.sent.push((code, payload.to_vec()));
            Ok(self.replies.remove(0))
        }
    }

    fn reply(code: u8, payload: &[u8]) -> Message {
        Message::new(code, payload).unwrap()
    }

    #[test]
    fn ping_round_trip() {
        let mut t = Scripted::new(vec![reply(0x80, b"abc")]);
        t.ping(b"abc").unwrap();
        assert_eq!(t.sent, vec![(codes::PING, b"abc".to_vec())]);
    }

    #[test]
    fn ping_detects_mismatch() {
        let mut t = Scripted::new(vec![reply(0x80, b"abd")]);
        assert_eq!(t.ping(b"abc").unwrap_err(), TransportError::SelfTest);
    }

    #[test]
    fn nack_is_reported() {
        let mut t = Scripted::new(vec![reply(codes::NACK, &[7])]);
        assert_eq!(
            t.set_baud(9600).unwrap_err(),
            TransportError::Nack(vec![7])
        );
    }

    #[test]
    fn peek_chunks_and_checks_echo() {
        let addr = 0x0800c000u32;
        let mut r1 = addr.to_le_bytes().to_vec();
        r1.extend_from_slice(&[1u8; 32]);
        let mut r2 = (addr + 32).to_le_bytes().to_vec();
        r2.extend_from_slice(&[2u8; 8]);
        let mut t = Scripted::new(vec![
            reply(codes::PEEK | 0x80, &r1),
            reply(codes::PEEK | 0x80, &r2),
        ]);
        let data = t.peek(addr, 40).unwrap();
        assert_eq!(data.len(), 40);
        assert_eq!(&data[..32], &[1u8; 32]);
        assert_eq!(&data[32..], &[2u8; 8]);
        assert_eq!(t.sent.len(), 2);
    }

    #[test]
    fn poke_chunks_writes() {
        let acks = (0..3).map(|_| reply(codes::ACK, &[])).collect();
        let mut t = Scripted::new(acks);
        t.poke(0x1000, &[0u8; 70]).unwrap();
        assert_eq!(t.sent.len(), 3);
        let (code, first) = &t.sent[0];
        assert_eq!(*code, codes::POKE);
        assert_eq!(first.len(), 36);
        let (_, last) = &t.sent[2];
        assert_eq!(last.len(), 4 + 6);
        assert_eq!(&last[..4], &0x1040u32.to_le_bytes());
    }

    #[test]
    fn lmk_read_payload_layout() {
        let mut t = Scripted::new(vec![reply(codes::LMK05318B_READ | 0x80, &[0xaa; 5])]);
        let data = t.lmk05318b_read(0x0123, 5).unwrap();
        assert_eq!(data, vec![0xaa; 5]);
        // Length byte, then big-endian address.
        assert_eq!(t.sent[0], (codes::LMK05318B_READ, vec![5, 0x01, 0x23]));
    }

    #[test]
    fn recorder_appends_frames() {
        let mut r = Recorder::new();
        r.lmk05318b_write(12, &[0x0c]).unwrap();
        r.set_baud(115200).unwrap();
        let bytes = r.into_bytes();
        let first_len = 6 + 3;
        let first = deframe(&bytes[..first_len]).unwrap();
        assert_eq!(first.code, codes::LMK05318B_WRITE);
        assert_eq!(first.payload.as_slice(), &[0x00, 0x0c, 0x0c]);
        let second = deframe(&bytes[first_len..]).unwrap();
        assert_eq!(second.code, codes::SET_BAUD);
    }
}
