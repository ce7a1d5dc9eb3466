//! CRC primitives shared by the wire frames and the flash blobs.
//!
//! The frame CRC is CRC-16/XMODEM (poly 0x1021, init 0, unreflected).
//! The blob CRC is CRC-32/BZIP2 (poly 0x04C11DB7, init 0xFFFFFFFF,
//! unreflected, final XOR), which is what the STM32 CRC unit computes in
//! hardware, so the firmware can verify blobs without a software table.

use crc::{Crc, CRC_16_XMODEM, CRC_32_BZIP2};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_BZIP2);

/// Frame CRC.  A whole frame including its trailing CRC sums to zero.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Blob CRC.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// `crc32` of any blob with its own big-endian CRC-32 appended.
pub const CRC32_VERIFY_MAGIC: u32 = 0x38fb2284;

/// `crc32` of a freshly erased 2 KiB flash slot (2048 × 0xFF).
pub const CRC32_EMPTY_SLOT: u32 = 0xfe8baafc;
