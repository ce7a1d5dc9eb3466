//! Generation-numbered configuration blobs in flash.
//!
//! A blob is a little-endian header (magic, version, generation, total
//! length), a body of complete wire frames (clock-chip register writes,
//! GPS configuration traffic, plus anything a future firmware adds), and
//! a big-endian CRC-32, padded with `0xFF` to a 32-byte boundary.
//! Sixteen 2 KiB flash slots in two banks hold blobs; the active one is
//! the valid header with the highest generation whose CRC verifies.
//!
//! Everything here goes through the injected [`Transport`]: reading
//! headers and blobs with `peek`/`crc`, writing with `poke`, erasing a
//! sector when no empty slot is left.

use lmk05318b::device::load_config;
use lmk05318b::registers;
use transport::{
    crc32, Recorder, Transport, TransportError, CRC32_EMPTY_SLOT,
    CRC32_VERIFY_MAGIC,
};

mod messages;

pub use messages::{parse_messages, Category};

/// Blob magic: "ΦrK" in UTF-8, read as a little-endian word.
pub const MAGIC: u32 = 0x4b72a6ce;

/// Blob format version.
pub const VERSION: u32 = 1;

/// Flash slot size.
pub const SLOT_SIZE: u32 = 2048;

/// Byte length of the blob header.
pub const HEADER_SIZE: usize = 16;

/// The sixteen flash slot addresses, two banks of eight.
pub fn slot_addresses() -> [u32; 16] {
    let mut out = [0u32; 16];
    for (i, slot) in out.iter_mut().enumerate() {
        let bank = if i < 8 { 0x0800_c000 } else { 0x0801_c000 };
        *slot = bank + (i as u32 % 8) * SLOT_SIZE;
    }
    out
}

/// Failures from the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The transport failed or NACKed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A blob body did not parse as a sequence of frames.
    #[error("bad config blob: {0}")]
    BadBlob(&'static str),
}

/// One flash slot's header, plus a cache of its fetched contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Flash address of the slot.
    pub address: u32,
    /// Header magic.
    pub magic: u32,
    /// Header version.
    pub version: u32,
    /// Generation number; newer generations supersede older.
    pub generation: u32,
    /// Total blob length including the trailing CRC.
    pub length: u32,
    content: Option<Vec<u8>>,
}

impl Config {
    /// Does the header look like a blob at all?
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && (20..=SLOT_SIZE).contains(&self.length)
    }

    /// Fetch (and cache) the blob contents.
    pub fn fetch(
        &mut self,
        t: &mut dyn Transport,
    ) -> Result<&[u8], TransportError> {
        if self.content.is_none() {
            let data = t.peek(self.address, self.length)?;
            self.content = Some(data);
        }
        Ok(self.content.as_ref().unwrap())
    }
}

/// Load all sixteen slot headers from the device.
pub fn get_headers(
    t: &mut dyn Transport,
) -> Result<Vec<Config>, TransportError> {
    let mut headers = Vec::with_capacity(16);
    for address in slot_addresses() {
        let raw = t.peek(address, HEADER_SIZE as u32)?;
        let word = |i: usize| {
            u32::from_le_bytes(raw[4 * i..4 * i + 4].try_into().unwrap_or_default())
        };
        headers.push(Config {
            address,
            magic: word(0),
            version: word(1),
            generation: word(2),
            length: word(3),
            content: None,
        });
    }
    Ok(headers)
}

/// Find the active configuration: among valid headers, the highest
/// `(generation, address)` whose device-side CRC verifies.
pub fn active_header(
    t: &mut dyn Transport,
    headers: &[Config],
) -> Result<Option<usize>, TransportError> {
    let mut best: Vec<usize> =
        (0..headers.len()).filter(|&i| headers[i].is_valid()).collect();
    best.sort_by_key(|&i| (headers[i].generation, headers[i].address));

    for &i in best.iter().rev() {
        let h = &headers[i];
        if t.crc(h.address, h.length)? == CRC32_VERIFY_MAGIC {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Is the slot fully erased?  Cheap header check, then a device-side
/// CRC of the whole slot, then a full read to be sure.
pub fn config_is_empty(
    t: &mut dyn Transport,
    h: &Config,
) -> Result<bool, TransportError> {
    const E: u32 = 0xffff_ffff;
    if h.magic != E || h.version != E || h.generation != E || h.length != E {
        return Ok(false);
    }
    if t.crc(h.address, SLOT_SIZE)? != CRC32_EMPTY_SLOT {
        return Ok(false);
    }
    Ok(t.peek(h.address, SLOT_SIZE)? == vec![0xff; SLOT_SIZE as usize])
}

/// Pick the slot for the next write, erasing a sector if none is empty.
///
/// Writes cycle through the second bank; when the current config sits in
/// its upper sector, prefer that sector's slots so the other stays
/// intact as a fallback.
pub fn next_header(
    t: &mut dyn Transport,
    headers: &[Config],
    current: Option<usize>,
) -> Result<usize, TransportError> {
    let in_upper =
        current.is_some_and(|i| headers[i].address >= 0x0801_e000);
    let scan: [usize; 8] = if in_upper {
        [12, 13, 14, 15, 8, 9, 10, 11]
    } else {
        [8, 9, 10, 11, 12, 13, 14, 15]
    };

    for i in scan {
        if config_is_empty(t, &headers[i])? {
            return Ok(i);
        }
    }

    let erase = scan[4];
    let address = headers[erase].address;
    debug_assert!(address == 0x0801_c000 || address == 0x0801_e000);
    tracing::info!(address, "erasing flash sector");
    t.flash_erase(address)?;
    Ok(erase)
}

/// What to save for the GPS side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpsSave {
    /// Append these pre-framed bytes: the baud-rate handshake followed
    /// by the receiver configuration, encoded by the GPS layer.
    Frames(Vec<u8>),
    /// Copy the GPS frames of the previous configuration.
    Preserve,
}

/// Record the live clock-chip configuration as replayable write frames.
///
/// The replay holds the chip in software reset while its registers load:
/// the first frame asserts `RESET_SW`, and a trailing frame restores the
/// original value when it differed.
fn add_live_lmk(
    t: &mut dyn Transport,
    out: &mut Vec<u8>,
) -> Result<(), TransportError> {
    let mut cfg = load_config(t)?;
    let reset_sw = registers::lookup("RESET_SW")
        .map_err(|e| TransportError::Failed(e.to_string()))?;
    let orig = cfg.extract(reset_sw);
    cfg.insert(reset_sw, 1);

    let mut rec = Recorder::new();
    let reset_byte = usize::from(reset_sw.base);
    rec.lmk05318b_write(reset_sw.base, &[cfg.data[reset_byte]])?;
    for (address, chunk) in cfg.bundle(32, None) {
        rec.lmk05318b_write(address as u16, &chunk)?;
    }
    if orig != 1 {
        cfg.insert(reset_sw, orig);
        rec.lmk05318b_write(reset_sw.base, &[cfg.data[reset_byte]])?;
    }
    out.extend_from_slice(rec.bytes());
    Ok(())
}

/// Assemble a candidate configuration blob.
///
/// Returns `None` when the result is identical to the active blob and
/// `force` is unset.
pub fn make_config(
    t: &mut dyn Transport,
    headers: &mut [Config],
    active: Option<usize>,
    save_lmk: bool,
    gps: GpsSave,
    force: bool,
) -> Result<Option<Vec<u8>>, ConfigError> {
    let generation = match active {
        Some(i) => headers[i].generation + 1,
        None => 1,
    };

    let mut out = Vec::with_capacity(1024);
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&generation.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let prior: Option<Vec<(Category, Vec<u8>)>> = match active {
        Some(i) => {
            let data = headers[i].fetch(t)?.to_vec();
            let body = body_slice(&data)?;
            Some(
                parse_messages(body)?
                    .into_iter()
                    .map(|(c, m)| (c, m.to_vec()))
                    .collect(),
            )
        }
        None => None,
    };

    if save_lmk {
        tracing::info!("add clock generator configuration");
        add_live_lmk(t, &mut out)?;
    } else if let Some(prior) = &prior {
        tracing::info!("preserve clock generator configuration");
        for (category, msg) in prior {
            if *category == Category::Lmk {
                out.extend_from_slice(msg);
            }
        }
    } else {
        tracing::info!("no saved clock configuration to conserve");
    }

    match &gps {
        GpsSave::Frames(frames) => {
            tracing::info!("add GPS configuration");
            out.extend_from_slice(frames);
        }
        GpsSave::Preserve => match &prior {
            Some(prior) => {
                tracing::info!("preserve GPS configuration");
                for (category, msg) in prior {
                    if *category == Category::Ubx {
                        out.extend_from_slice(msg);
                    }
                }
            }
            None => tracing::info!("no saved GPS configuration to conserve"),
        },
    }

    if let Some(prior) = &prior {
        let mut unknown = 0;
        for (category, msg) in prior {
            if *category == Category::Unknown {
                out.extend_from_slice(msg);
                unknown += 1;
            }
        }
        if unknown != 0 {
            tracing::warn!(unknown, "preserving unexpected config messages");
        }
    }

    let length = (out.len() + 4) as u32;
    out[12..16].copy_from_slice(&length.to_le_bytes());
    let sum = crc32(&out);
    out.extend_from_slice(&sum.to_be_bytes());
    debug_assert_eq!(crc32(&out), CRC32_VERIFY_MAGIC);

    if let Some(i) = active {
        if !force {
            tracing::debug!("compare with saved configuration");
            if compare_config(t, &mut headers[i], &out)? {
                return Ok(None);
            }
        }
    }

    let pad = out.len().wrapping_neg() & 31;
    out.resize(out.len() + pad, 0xff);
    Ok(Some(out))
}

fn body_slice(data: &[u8]) -> Result<&[u8], ConfigError> {
    if data.len() < HEADER_SIZE + 4 {
        return Err(ConfigError::BadBlob("too short"));
    }
    Ok(&data[HEADER_SIZE..data.len() - 4])
}

/// Is the candidate blob identical to the stored one?
///
/// The header CRCs can't just be compared: they cover the generation,
/// which always differs.  Compare the header-less, CRC-less slices via
/// a device-side CRC first, then byte for byte.
pub fn compare_config(
    t: &mut dyn Transport,
    old: &mut Config,
    new: &[u8],
) -> Result<bool, ConfigError> {
    if new.len() < HEADER_SIZE + 4 {
        return Err(ConfigError::BadBlob("too short"));
    }
    let word = |i: usize| {
        u32::from_le_bytes(new[4 * i..4 * i + 4].try_into().unwrap_or_default())
    };
    if word(0) != old.magic || word(1) != old.version || word(3) != old.length
    {
        return Ok(false);
    }
    debug_assert_eq!(crc32(new), CRC32_VERIFY_MAGIC);

    let new_body = &new[HEADER_SIZE..new.len() - 4];
    let old_sum =
        t.crc(old.address + HEADER_SIZE as u32, old.length - 20)?;
    if crc32(new_body) != old_sum {
        return Ok(false);
    }

    let old_data = old.fetch(t)?;
    Ok(&old_data[HEADER_SIZE..old_data.len() - 4] == new_body)
}

/// Write a blob to the next free slot.
pub fn write_config(
    t: &mut dyn Transport,
    headers: &[Config],
    active: Option<usize>,
    config: &[u8],
) -> Result<u32, TransportError> {
    let slot = next_header(t, headers, active)?;
    let address = headers[slot].address;
    t.poke(address, config)?;
    Ok(address)
}

/// Capture and persist the device configuration in one step.
///
/// Returns `false` when the stored configuration already matches and
/// nothing was written.
pub fn save_config(
    t: &mut dyn Transport,
    save_lmk: bool,
    gps: GpsSave,
) -> Result<bool, ConfigError> {
    tracing::info!("retrieving saved configuration state");
    let mut headers = get_headers(t)?;
    let active = active_header(t, &headers)?;
    let Some(cfg) = make_config(t, &mut headers, active, save_lmk, gps, false)?
    else {
        tracing::info!("no config changes, not writing to device");
        return Ok(false);
    };
    tracing::info!("writing config to flash");
    write_config(t, &headers, active, &cfg)?;
    Ok(true)
}
