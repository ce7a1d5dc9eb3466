//! End-to-end persistence tests against an in-memory device: flash
//! peek/poke/CRC/erase plus a flat clock-chip register file.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use provision::{
    active_header, compare_config, config_is_empty, get_headers, make_config,
    next_header, save_config, slot_addresses, Category, GpsSave, MAGIC,
};
use transport::{codes, crc32, Message, Transport, TransportError};

const FLASH_BASE: u32 = 0x0800_0000;
const FLASH_SIZE: usize = 0x20000;

struct MockDevice {
    flash: Vec<u8>,
    regs: [u8; 500],
    erases: Vec<u32>,
}

impl MockDevice {
    fn new() -> MockDevice {
        MockDevice {
            flash: vec![0xff; FLASH_SIZE],
            regs: [0; 500],
            erases: Vec::new(),
        }
    }

    fn slot(&self, address: u32) -> &[u8] {
        let off = (address - FLASH_BASE) as usize;
        &self.flash[off..off + 2048]
    }
}

impl Transport for MockDevice {
    fn transact(
        &mut self,
        code: u8,
        payload: &[u8],
    ) -> Result<Message, TransportError> {
        let word = |i: usize| {
            u32::from_le_bytes(payload[4 * i..4 * i + 4].try_into().unwrap())
        };
        match code {
            codes::PEEK => {
                let (addr, len) = (word(0), word(1));
                let off = (addr - FLASH_BASE) as usize;
                let mut reply = addr.to_le_bytes().to_vec();
                reply.extend_from_slice(&self.flash[off..off + len as usize]);
                Message::new(code | 0x80, &reply)
            }
            codes::POKE => {
                let addr = word(0);
                let off = (addr - FLASH_BASE) as usize;
                let data = &payload[4..];
                self.flash[off..off + data.len()].copy_from_slice(data);
                Message::new(codes::ACK, &[])
            }
            codes::GET_CRC => {
                let (addr, len) = (word(0), word(1));
                let off = (addr - FLASH_BASE) as usize;
                let sum = crc32(&self.flash[off..off + len as usize]);
                let mut reply = payload[..8].to_vec();
                reply.extend_from_slice(&sum.to_le_bytes());
                Message::new(code | 0x80, &reply)
            }
            codes::FLASH_ERASE => {
                let addr = word(0);
                self.erases.push(addr);
                let off = (addr - FLASH_BASE) as usize;
                // One 8 KiB sector.
                self.flash[off..off + 0x2000].fill(0xff);
                Message::new(codes::ACK, &[])
            }
            codes::LMK05318B_READ => {
                let length = usize::from(payload[0]);
                let addr = usize::from(u16::from_be_bytes(
                    payload[1..3].try_into().unwrap(),
                ));
                Message::new(code | 0x80, &self.regs[addr..addr + length])
            }
            codes::LMK05318B_WRITE => {
                let addr = usize::from(u16::from_be_bytes(
                    payload[..2].try_into().unwrap(),
                ));
                let data = &payload[2..];
                self.regs[addr..addr + data.len()].copy_from_slice(data);
                Message::new(codes::ACK, &[])
            }
            _ => panic!("unexpected code {code:#04x}"),
        }
    }
}

#[test]
fn empty_flash_has_no_active_config() {
    let mut dev = MockDevice::new();
    let headers = get_headers(&mut dev).unwrap();
    assert_eq!(headers.len(), 16);
    assert!(active_header(&mut dev, &headers).unwrap().is_none());
    assert!(config_is_empty(&mut dev, &headers[8]).unwrap());
}

#[test]
fn save_and_reload_round_trip() {
    let mut dev = MockDevice::new();
    for (i, r) in dev.regs.iter_mut().enumerate() {
        *r = (i % 251) as u8;
    }

    assert!(save_config(&mut dev, true, GpsSave::Preserve).unwrap());

    let mut headers = get_headers(&mut dev).unwrap();
    let active = active_header(&mut dev, &headers).unwrap().unwrap();
    assert_eq!(headers[active].generation, 1);
    assert_eq!(headers[active].magic, MAGIC);
    // First free slot of the second bank.
    assert_eq!(headers[active].address, slot_addresses()[8]);

    // The blob body is entirely clock-chip write frames.
    let data = headers[active].fetch(&mut dev).unwrap().to_vec();
    let body = &data[16..data.len() - 4];
    let msgs = provision::parse_messages(body).unwrap();
    assert!(!msgs.is_empty());
    assert!(msgs.iter().all(|(c, _)| *c == Category::Lmk));
    assert_eq!(crc32(&data), transport::CRC32_VERIFY_MAGIC);
}

#[test]
fn identical_config_is_not_rewritten() {
    let mut dev = MockDevice::new();
    dev.regs[100] = 0x5a;

    assert!(save_config(&mut dev, true, GpsSave::Preserve).unwrap());
    // Nothing changed: the second save compares equal and writes nothing.
    assert!(!save_config(&mut dev, true, GpsSave::Preserve).unwrap());

    let headers = get_headers(&mut dev).unwrap();
    let occupied: Vec<_> =
        headers.iter().filter(|h| h.magic == MAGIC).collect();
    assert_eq!(occupied.len(), 1);
}

#[test]
fn changed_config_bumps_the_generation() {
    let mut dev = MockDevice::new();
    assert!(save_config(&mut dev, true, GpsSave::Preserve).unwrap());
    dev.regs[64] = 7; // A divider changed.
    assert!(save_config(&mut dev, true, GpsSave::Preserve).unwrap());

    let mut headers = get_headers(&mut dev).unwrap();
    let active = active_header(&mut dev, &headers).unwrap().unwrap();
    assert_eq!(headers[active].generation, 2);

    // The new blob replays the changed register value.
    let data = headers[active].fetch(&mut dev).unwrap().to_vec();
    let body = &data[16..data.len() - 4];
    let msgs = provision::parse_messages(body).unwrap();
    let holds_value = msgs.iter().any(|(_, m)| {
        let payload = &m[4..m.len() - 2];
        let addr = u16::from_be_bytes(payload[..2].try_into().unwrap());
        let data = &payload[2..];
        let a = usize::from(addr);
        (a..a + data.len()).contains(&64) && data[64 - a] == 7
    });
    assert!(holds_value, "changed register must appear in the blob");
}

#[test]
fn gps_frames_are_appended_and_preserved() {
    let mut dev = MockDevice::new();
    let mut gps = transport::Recorder::new();
    gps.set_baud(38_400).unwrap();
    gps.serial_sync(100_000).unwrap();
    let gps_bytes = gps.into_bytes();

    assert!(
        save_config(&mut dev, true, GpsSave::Frames(gps_bytes.clone()))
            .unwrap()
    );

    // A later clock-only save keeps the GPS frames verbatim.
    dev.regs[64] = 1;
    assert!(save_config(&mut dev, true, GpsSave::Preserve).unwrap());

    let mut headers = get_headers(&mut dev).unwrap();
    let active = active_header(&mut dev, &headers).unwrap().unwrap();
    let data = headers[active].fetch(&mut dev).unwrap().to_vec();
    let body = &data[16..data.len() - 4];
    let msgs = provision::parse_messages(body).unwrap();
    let ubx: Vec<u8> = msgs
        .iter()
        .filter(|(c, _)| *c == Category::Ubx)
        .flat_map(|(_, m)| m.iter().copied())
        .collect();
    assert_eq!(ubx, gps_bytes);
}

#[test]
fn slots_cycle_and_erase_when_full() {
    let mut dev = MockDevice::new();
    for generation in 1..=9u8 {
        dev.regs[64] = generation; // Force a fresh blob each time.
        assert!(save_config(&mut dev, true, GpsSave::Preserve).unwrap());
    }
    // Eight second-bank slots filled, then one sector erase.
    assert_eq!(dev.erases, vec![0x0801_c000]);

    let mut headers = get_headers(&mut dev).unwrap();
    let active = active_header(&mut dev, &headers).unwrap().unwrap();
    assert_eq!(headers[active].generation, 9);
    let data = headers[active].fetch(&mut dev).unwrap().to_vec();
    assert_eq!(crc32(&data), transport::CRC32_VERIFY_MAGIC);
}

#[test]
fn compare_spots_header_and_body_differences() {
    let mut dev = MockDevice::new();
    assert!(save_config(&mut dev, true, GpsSave::Preserve).unwrap());
    let mut headers = get_headers(&mut dev).unwrap();
    let active = active_header(&mut dev, &headers).unwrap().unwrap();
    let stored = dev.slot(headers[active].address)
        [..headers[active].length as usize]
        .to_vec();

    assert!(compare_config(&mut dev, &mut headers[active], &stored).unwrap());

    let mut other = stored.clone();
    // A different body re-CRC'd: lengths agree, contents do not.
    let n = other.len();
    other[20] ^= 1;
    let sum = crc32(&other[..n - 4]);
    other[n - 4..].copy_from_slice(&sum.to_be_bytes());
    let mut headers2 = get_headers(&mut dev).unwrap();
    assert!(
        !compare_config(&mut dev, &mut headers2[active], &other).unwrap()
    );
}

#[test]
fn empty_save_produces_a_bare_blob() {
    let mut dev = MockDevice::new();
    let mut headers = get_headers(&mut dev).unwrap();
    let cfg = make_config(
        &mut dev,
        &mut headers,
        None,
        false,
        GpsSave::Preserve,
        false,
    )
    .unwrap()
    .unwrap();
    // Header plus CRC only: there was nothing to preserve.
    assert_eq!(cfg.len() % 32, 0);
    assert_eq!(u32::from_le_bytes(cfg[12..16].try_into().unwrap()), 20);
}

#[test]
fn next_header_prefers_the_current_sector() {
    let mut dev = MockDevice::new();
    let headers = get_headers(&mut dev).unwrap();
    // With no current config, scanning starts at slot 8.
    assert_eq!(next_header(&mut dev, &headers, None).unwrap(), 8);
}
