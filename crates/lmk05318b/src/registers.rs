//! Derivation of logical registers from the physical field table.
//!
//! Fields sharing a basename (the name with any `_hi:lo` suffix removed)
//! aggregate into one [`Register`].  Derivation validates the whole map
//! once, on first use: every described address must cover its eight bits
//! exactly, and every register must assemble from contiguous, big-endian,
//! access-consistent parts.

use crate::fields::{Access, FieldDef, FIELDS};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Lookup failure for a symbolic register name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown register {0:?}")]
pub struct UnknownRegister(pub String);

/// A logical register assembled from one or more physical fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    /// Canonical name.
    pub name: &'static str,
    /// Lowest byte address (the most significant byte).
    pub base: u16,
    /// Number of bytes spanned, 1..=5.
    pub span: u8,
    /// Left shift of the value within the byte span.
    pub shift: u8,
    /// Width in bits, up to 40.
    pub width: u8,
    /// Access mode shared by all parts.
    pub access: Access,
    /// Reset value assembled from the parts.
    pub reset: u64,
}

impl Register {
    /// Mask of the value bits, unshifted.
    pub fn value_mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }
}

struct Part {
    def: &'static FieldDef,
    reg_hi: u8,
    reg_lo: u8,
}

/// Split `NAME_39:32` into the basename and bit range; a plain name maps
/// its byte bits to register bits directly.
fn parse_suffix(def: &'static FieldDef) -> (&'static str, Part) {
    if let Some((base, rest)) = def.name.rsplit_once('_') {
        if let Some((hi, lo)) = rest.split_once(':') {
            if let (Ok(hi), Ok(lo)) = (hi.parse::<u8>(), lo.parse::<u8>()) {
                return (base, Part { def, reg_hi: hi, reg_lo: lo });
            }
        }
    }
    (
        def.name,
        Part { def, reg_hi: def.bit_hi - def.bit_lo, reg_lo: 0 },
    )
}

fn validate_addresses() {
    let mut coverage: HashMap<u16, u8> = HashMap::new();
    for def in FIELDS {
        assert!(def.bit_lo <= def.bit_hi && def.bit_hi < 8, "{}", def.name);
        let mask = (((1u16 << (def.bit_hi + 1)) - (1 << def.bit_lo)) & 0xff) as u8;
        let entry = coverage.entry(def.address).or_insert(0);
        assert!(
            *entry & mask == 0,
            "overlapping fields at R{}",
            def.address
        );
        *entry |= mask;
    }
    for (address, mask) in coverage {
        assert!(mask == 0xff, "R{address} only covers {mask:#04x}");
    }
}

fn build() -> HashMap<&'static str, Register> {
    validate_addresses();

    let mut parts: HashMap<&'static str, Vec<Part>> = HashMap::new();
    for def in FIELDS {
        if def.name == "RESERVED" {
            continue;
        }
        let (base, part) = parse_suffix(def);
        parts.entry(base).or_default().push(part);
    }

    let mut registers = HashMap::new();
    for (name, mut parts) in parts {
        parts.sort_by_key(|p| p.reg_lo);
        let first = &parts[0];
        assert!(first.reg_lo == 0, "{name} does not start at bit 0");
        // Everything is big endian: higher register bits at lower
        // addresses, partial bytes only in the topmost.
        for pair in parts.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.reg_hi + 1 == b.reg_lo, "{name} has a bit gap");
            assert!(a.def.bit_hi == 7, "{name} splits inside a byte");
            assert!(b.def.bit_lo == 0, "{name} shifts a middle byte");
            assert!(a.def.address == b.def.address + 1, "{name} not contiguous");
            assert!(a.def.access == b.def.access, "{name} mixes access modes");
        }
        let last = &parts[parts.len() - 1];
        let base = last.def.address;
        let span = (first.def.address - last.def.address + 1) as u8;
        let shift = first.def.bit_lo;
        let width = last.reg_hi + 1;
        if span > 1 {
            assert!(shift == 0, "{name} shifts a multi-byte register");
        }
        let bits: u8 =
            parts.iter().map(|p| p.def.bit_hi - p.def.bit_lo + 1).sum();
        assert!(bits == width, "{name} width mismatch");
        let mut reset = 0u64;
        for p in &parts {
            reset |= u64::from(p.def.reset) << p.reg_lo;
        }
        registers.insert(
            name,
            Register {
                name,
                base,
                span,
                shift,
                width,
                access: first.def.access,
                reset,
            },
        );
    }

    // The unlock VCO counter overlays other registers at 336; some
    // DWIM'ing in the chip decides what actually happens there, and the
    // datasheet only describes it in prose.  Patch it in by hand.
    registers.insert(
        "DPLL_REF_UNLOCKDET_VCO_CNTSTRT",
        Register {
            name: "DPLL_REF_UNLOCKDET_VCO_CNTSTRT",
            base: 336,
            span: 4,
            shift: 0,
            width: 30,
            access: Access::Rw,
            reset: 0,
        },
    );

    registers
}

fn registry() -> &'static HashMap<&'static str, Register> {
    static REGISTRY: OnceLock<HashMap<&'static str, Register>> =
        OnceLock::new();
    REGISTRY.get_or_init(build)
}

/// Canonical form of a register name: uppercase, `-` folded to `_`.
pub fn canonical(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

/// Look up a register by (canonicalised) name.
pub fn lookup(name: &str) -> Result<&'static Register, UnknownRegister> {
    registry()
        .get(canonical(name).as_str())
        .ok_or_else(|| UnknownRegister(name.to_owned()))
}

/// Look up a register the codec depends on; absence is a table bug.
pub(crate) fn must(name: &str) -> &'static Register {
    match registry().get(name) {
        Some(r) => r,
        None => panic!("register table is missing {name}"),
    }
}

/// All byte addresses the map describes, ascending.
pub fn addresses() -> Vec<u16> {
    let mut out: Vec<u16> = FIELDS.iter().map(|d| d.address).collect();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn table_validates_and_derives() {
        // Forces the coverage and aggregation checks.
        assert!(registry().len() > 40);
    }

    #[test]
    fn single_byte_register() {
        let r = lookup("PLL2_P1").unwrap();
        assert_eq!((r.base, r.span, r.shift, r.width), (115, 1, 0, 3));
        assert_eq!(r.reset, 1);
    }

    #[test]
    fn shifted_field() {
        let r = lookup("PLL2_CP").unwrap();
        assert_eq!((r.base, r.span, r.shift, r.width), (111, 1, 4, 4));
        let r = lookup("APLL2_DEN_MODE").unwrap();
        assert_eq!((r.base, r.span, r.shift, r.width), (101, 1, 4, 1));
    }

    #[test]
    fn multi_byte_big_endian() {
        let r = lookup("DPLL_REF_NUM").unwrap();
        assert_eq!((r.base, r.span, r.shift, r.width), (205, 5, 0, 40));
        let r = lookup("OUT7_STG2_DIV").unwrap();
        assert_eq!((r.base, r.span, r.shift, r.width), (70, 3, 0, 24));
        let r = lookup("BAW_LOCK_VCO_CNTSTRT").unwrap();
        assert_eq!((r.base, r.span, r.shift, r.width), (315, 4, 0, 30));
    }

    #[test]
    fn hand_patched_unlock_counter() {
        let r = lookup("DPLL_REF_UNLOCKDET_VCO_CNTSTRT").unwrap();
        assert_eq!((r.base, r.span, r.width), (336, 4, 30));
    }

    #[test]
    fn lookup_canonicalises() {
        assert_eq!(lookup("pll2-p1").unwrap().name, "PLL2_P1");
        assert_eq!(lookup("reset_sw").unwrap().base, 12);
        assert!(lookup("NO_SUCH_REGISTER").is_err());
    }

    #[test]
    fn reset_values_assemble() {
        // Default feedback divider integer part is 70 in the low byte.
        assert_eq!(lookup("DPLL_REF_FB_DIV").unwrap().reset, 70);
        assert_eq!(lookup("VNDRID").unwrap().reset, 0x100b);
        assert_eq!(lookup("DPLL_PRIREF_RDIV").unwrap().reset, 1);
    }

    #[test]
    fn addresses_are_sparse_and_sorted() {
        let addrs = addresses();
        assert!(addrs.windows(2).all(|w| w[0] < w[1]));
        assert!(addrs.contains(&12) && addrs.contains(&100));
        assert!(!addrs.contains(&99));
    }
}
