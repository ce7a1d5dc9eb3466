//! Operations against a live device through the transport capability.
//!
//! Nothing here blocks or retries: every call either completes or
//! propagates the transport failure to the caller.

use crate::codec::freq_make_data;
use crate::image::{never_write, MaskedBytes};
use crate::pll2::PllPlan;
use crate::registers::{self, lookup, must, Register, UnknownRegister};
use transport::{Transport, TransportError};

/// Register bursts carry at most this many data bytes.
const MAX_BLOCK: usize = 30;

/// Failures from device-level operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The transport failed or NACKed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A symbolic register name did not resolve.
    #[error(transparent)]
    Register(#[from] UnknownRegister),
    /// An output drive specification did not parse.
    #[error("unknown drive {0:?}")]
    BadDrive(String),
    /// A drive specification is not valid for its channel.
    #[error("drive {drive:?} cannot apply to channel {channel}")]
    DriveChannel {
        /// Requested channel number.
        channel: u8,
        /// Requested drive name.
        drive: String,
    },
}

/// Read the given byte ranges from the chip into the image data.
pub fn read_ranges(
    t: &mut dyn Transport,
    data: &mut MaskedBytes,
    ranges: &[(usize, usize)],
) -> Result<(), TransportError> {
    for &(base, span) in ranges {
        let segment = t.lmk05318b_read(base as u16, span as u8)?;
        debug_assert_eq!(segment.len(), span);
        data.data[base..base + span].copy_from_slice(&segment);
    }
    Ok(())
}

/// Where the image holds only part of a byte, fill in the rest from the
/// live device so the byte can be written back whole.
pub fn complete_partials(
    t: &mut dyn Transport,
    data: &mut MaskedBytes,
) -> Result<(), TransportError> {
    let ranges = data.partial_ranges(MAX_BLOCK);
    let mut gaps = MaskedBytes::new();
    read_ranges(t, &mut gaps, &ranges)?;
    for (start, span) in ranges {
        for i in start..start + span {
            data.data[i] =
                (data.data[i] & data.mask[i]) | (gaps.data[i] & !data.mask[i]);
            data.mask[i] = 255;
        }
    }
    Ok(())
}

/// Flush a masked image to the chip: complete partial bytes, then issue
/// bursts over the touched ranges in ascending address order, skipping
/// the never-written addresses.
pub fn masked_write(
    t: &mut dyn Transport,
    data: &mut MaskedBytes,
) -> Result<(), TransportError> {
    complete_partials(t, data)?;
    let ranges =
        data.ranges_select(MAX_BLOCK, |i, m| m != 0 && !never_write(i));
    for (base, span) in ranges {
        t.lmk05318b_write(base as u16, &data.data[base..base + span])?;
    }
    Ok(())
}

/// Addresses excluded from configuration capture: not writeable, lock
/// flags and their interrupts, PLL1 volatile state, NVM machinery, and
/// DPLL status.
fn capture_skip(address: u16) -> bool {
    address < 12
        || matches!(address, 13 | 14 | 17..=20 | 123..=127)
        || matches!(address, 155..=159 | 161 | 162 | 164 | 168)
        || address >= 352
}

/// Read the complete writeable configuration from the chip.
pub fn load_config(
    t: &mut dyn Transport,
) -> Result<MaskedBytes, TransportError> {
    let mut data = MaskedBytes::new();
    for address in registers::addresses() {
        if !capture_skip(address) {
            data.mask[usize::from(address)] = 0xff;
        }
    }
    let ranges = data.ranges(32);
    read_ranges(t, &mut data, &ranges)?;
    Ok(data)
}

/// Write registers by symbolic name.
pub fn set_registers(
    t: &mut dyn Transport,
    values: &[(&str, u64)],
) -> Result<(), DeviceError> {
    let mut data = MaskedBytes::new();
    for &(name, value) in values {
        data.insert(lookup(name)?, value);
    }
    masked_write(t, &mut data)?;
    Ok(())
}

/// Read registers by symbolic name.
pub fn get_registers(
    t: &mut dyn Transport,
    names: &[&str],
) -> Result<Vec<u64>, DeviceError> {
    let mut regs: Vec<&'static Register> = Vec::with_capacity(names.len());
    let mut data = MaskedBytes::new();
    for name in names {
        let r = lookup(name)?;
        data.insert(r, 0);
        regs.push(r);
    }
    let ranges = data.ranges(MAX_BLOCK);
    read_ranges(t, &mut data, &ranges)?;
    Ok(regs.into_iter().map(|r| data.extract(r)).collect())
}

/// Program a frequency plan: hold the chip in software reset, write the
/// register image, power PLL2 back up if the plan uses it, and release
/// the reset.
pub fn apply_plan(
    t: &mut dyn Transport,
    plan: &PllPlan,
) -> Result<(), TransportError> {
    let mut data = freq_make_data(plan);
    t.lmk05318b_write(12, &[0x0c])?;
    masked_write(t, &mut data)?;
    if !num_traits::Zero::is_zero(&plan.pll2_target) {
        let pdn = must("PLL2_PDN");
        let byte = data.data[usize::from(pdn.base)] & !(1 << pdn.shift);
        t.lmk05318b_write(pdn.base, &[byte])?;
    }
    t.lmk05318b_write(12, &[0x02])?;
    Ok(())
}

/// An output driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drive {
    /// Driver format select.
    pub sel: u8,
    /// First mode field: LVDS swing, or the first CMOS pin mode.
    pub mode1: u8,
    /// Second mode field: the second CMOS pin mode.
    pub mode2: u8,
    /// Human-readable description.
    pub label: &'static str,
}

const CMOS_MODES: [(char, &str); 4] =
    [('z', "hi-z"), ('0', "low"), ('-', "inverted"), ('+', "normal")];

/// Parse a drive name: `off`, `lvds`/`lvds4`/`lvds6`/`lvds8`, or
/// `cmos` followed by two of `z 0 - +` for the two pins.
pub fn parse_drive(name: &str) -> Option<Drive> {
    match name {
        "off" => return Some(Drive { sel: 0, mode1: 0, mode2: 0, label: "Off" }),
        "lvds" | "lvds4" => {
            return Some(Drive { sel: 1, mode1: 0, mode2: 0, label: "LVDS, 4mA" })
        }
        "lvds6" => {
            return Some(Drive { sel: 1, mode1: 1, mode2: 0, label: "LVDS, 6mA" })
        }
        "lvds8" => {
            return Some(Drive { sel: 1, mode1: 2, mode2: 0, label: "LVDS, 8mA" })
        }
        _ => {}
    }
    let rest = name.strip_prefix("cmos")?;
    let mut pins = rest.chars();
    let (a, b) = (pins.next()?, pins.next()?);
    if pins.next().is_some() {
        return None;
    }
    let mode1 = CMOS_MODES.iter().position(|&(c, _)| c == a)? as u8;
    let mode2 = CMOS_MODES.iter().position(|&(c, _)| c == b)? as u8;
    Some(Drive { sel: 3, mode1, mode2, label: "CMOS" })
}

/// The hardware default drive assignment, channel by channel.
pub const DEFAULT_DRIVES: [(u8, &str); 8] = [
    (0, "lvds8"),
    (1, "off"),
    (2, "lvds8"),
    (3, "off"),
    (4, "off"),
    (5, "off"),
    (6, "cmos+z"),
    (7, "lvds8"),
];

/// Set output drives.  Each entry names a channel 0..=7 and a drive; a
/// leading `2` on the drive applies it to both channels of the 0/1 or
/// 2/3 pair.  With `defaults` set, the hardware default assignment is
/// applied first and the explicit entries override it.
pub fn set_drives(
    t: &mut dyn Transport,
    drives: &[(u8, &str)],
    defaults: bool,
) -> Result<(), DeviceError> {
    let mut data = MaskedBytes::new();
    let mut all: Vec<(u8, &str)> = Vec::new();
    if defaults {
        all.extend_from_slice(&DEFAULT_DRIVES);
    }
    all.extend_from_slice(drives);

    for (channel, name) in all {
        let bad = || DeviceError::DriveChannel {
            channel,
            drive: name.to_owned(),
        };
        if channel >= 8 {
            return Err(bad());
        }
        let mut channels = vec![channel];
        let name = match name.strip_prefix('2') {
            Some(rest) => {
                if channel != 0 && channel != 2 {
                    return Err(bad());
                }
                channels.push(channel + 1);
                rest
            }
            None => name,
        };
        if name.starts_with("cmos") && channel < 4 {
            return Err(bad());
        }
        let drive = parse_drive(name)
            .ok_or_else(|| DeviceError::BadDrive(name.to_owned()))?;
        for c in channels {
            data.insert(lookup(&format!("OUT{c}_SEL"))?, u64::from(drive.sel));
            data.insert(
                lookup(&format!("OUT{c}_MODE1"))?,
                u64::from(drive.mode1),
            );
            data.insert(
                lookup(&format!("OUT{c}_MODE2"))?,
                u64::from(drive.mode2),
            );
        }
    }

    masked_write(t, &mut data)?;
    Ok(())
}

/// The drive state of one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveStatus {
    /// Channel power-down flag.
    pub power_down: bool,
    /// Raw format select.
    pub sel: u8,
    /// Raw mode fields.
    pub mode1: u8,
    /// See `mode1`.
    pub mode2: u8,
}

/// Read back the drive configuration of all eight outputs.
pub fn read_drives(
    t: &mut dyn Transport,
) -> Result<Vec<DriveStatus>, DeviceError> {
    let mut data = MaskedBytes::new();
    let (base, length) = (50usize, 24usize);
    let segment = t.lmk05318b_read(base as u16, length as u8)?;
    data.data[base..base + length].copy_from_slice(&segment);

    let pdowns = ["0_1", "0_1", "2_3", "2_3", "4", "5", "6", "7"];
    let mut out = Vec::with_capacity(8);
    for (i, pair) in pdowns.iter().enumerate() {
        out.push(DriveStatus {
            power_down: data.extract(lookup(&format!("CH{pair}_PD"))?) != 0,
            sel: data.extract(lookup(&format!("OUT{i}_SEL"))?) as u8,
            mode1: data.extract(lookup(&format!("OUT{i}_MODE1"))?) as u8,
            mode2: data.extract(lookup(&format!("OUT{i}_MODE2"))?) as u8,
        });
    }
    Ok(out)
}
