//! Scanning a blob body into its constituent framed messages.
//!
//! Two frame families coexist: the instrument's own `CE 93` frames and
//! raw U-Blox `B5 62` frames.  Anything framed correctly but carrying an
//! unrecognised code is preserved verbatim for forward compatibility.

use crate::ConfigError;
use transport::{codes, crc16};

/// Message category within a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// A clock-chip register write.
    Lmk,
    /// GPS traffic: a raw U-Blox frame, or the baud/sync helpers that
    /// bracket it.
    Ubx,
    /// Anything else; preserved verbatim.
    Unknown,
}

/// U-Blox 8-bit Fletcher checksum over the class/id/length/payload.
fn ubx_checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a = 0u8;
    let mut ck_b = 0u8;
    for &b in data {
        ck_a = ck_a.wrapping_add(b);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// Split a blob body into categorised frames.
pub fn parse_messages(
    body: &[u8],
) -> Result<Vec<(Category, &[u8])>, ConfigError> {
    let mut out = Vec::new();
    let mut done = 0;
    while done < body.len() {
        let rest = &body[done..];
        match rest[0] {
            // U-Blox magic is B5 62.
            0xb5 => {
                if rest.len() < 8 {
                    return Err(ConfigError::BadBlob("UBX frame too short"));
                }
                if rest[1] != 0x62 {
                    return Err(ConfigError::BadBlob("wrong UBX magic"));
                }
                let length =
                    usize::from(rest[4]) + usize::from(rest[5]) * 256;
                let total = length + 8;
                if total > rest.len() {
                    return Err(ConfigError::BadBlob("UBX frame truncated"));
                }
                let msg = &rest[..total];
                let (ck_a, ck_b) = ubx_checksum(&msg[2..total - 2]);
                if ck_a != msg[total - 2] || ck_b != msg[total - 1] {
                    return Err(ConfigError::BadBlob("UBX checksum mismatch"));
                }
                out.push((Category::Ubx, msg));
                done += total;
            }
            // Our own magic is CE 93.
            0xce => {
                if rest.len() < 6 {
                    return Err(ConfigError::BadBlob("frame too short"));
                }
                if rest[1] != 0x93 {
                    return Err(ConfigError::BadBlob("wrong frame magic"));
                }
                let length = usize::from(rest[3]);
                let total = 4 + length + 2;
                if total > rest.len() {
                    return Err(ConfigError::BadBlob("frame truncated"));
                }
                let msg = &rest[..total];
                if crc16(msg) != 0 {
                    return Err(ConfigError::BadBlob("frame CRC mismatch"));
                }
                let category = match msg[2] {
                    codes::LMK05318B_WRITE => Category::Lmk,
                    codes::SET_BAUD | codes::SERIAL_SYNC => Category::Ubx,
                    _ => Category::Unknown,
                };
                out.push((category, msg));
                done += total;
            }
            _ => return Err(ConfigError::BadBlob("unknown message")),
        }
    }
    Ok(out)
}
