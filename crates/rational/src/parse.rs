//! Parsing and display of frequencies.
//!
//! The accepted forms follow the host tool conventions: an optional SI
//! suffix (`Hz`, `kHz`, `MHz`, `GHz`, or the bare `k`/`M`/`G`), with a bare
//! number meaning megahertz.  The mantissa may be an integer, an exact
//! decimal, or an explicit `p/q` rational, so values like `32768.298` stay
//! exact all the way into the planner.

use crate::Freq;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Error from [`parse_freq`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFreqError {
    /// The mantissa was not an integer, decimal or `p/q` rational.
    #[error("invalid frequency {0:?}")]
    Invalid(String),
    /// Parsed successfully but negative.
    #[error("negative frequency {0:?}")]
    Negative(String),
}

/// Parse a frequency string with an optional SI suffix.
///
/// A bare number is megahertz; `hz`/`khz`/`mhz`/`ghz` (any case, the
/// one-letter `k`/`m`/`g` forms included) select the scale explicitly.
pub fn parse_freq(s: &str) -> Result<Freq, ParseFreqError> {
    let lower = s.trim().to_ascii_lowercase();
    let (body, scale) = split_suffix(&lower);
    let value = parse_rational(body.trim_end())
        .ok_or_else(|| ParseFreqError::Invalid(s.to_owned()))?;
    if value.is_negative() {
        return Err(ParseFreqError::Negative(s.to_owned()));
    }
    Ok(value * Freq::from_integer(BigInt::from(scale)))
}

fn split_suffix(s: &str) -> (&str, i64) {
    for (suffix, scale) in
        [("khz", 1000), ("mhz", 1_000_000), ("ghz", 1_000_000_000), ("hz", 1)]
    {
        if let Some(body) = s.strip_suffix(suffix) {
            return (body, scale);
        }
        if suffix != "hz" {
            if let Some(body) = s.strip_suffix(&suffix[..1]) {
                return (body, scale);
            }
        }
    }
    // No suffix: megahertz.
    (s, 1_000_000)
}

/// Parse `123`, `12.25` or `31/7` into an exact rational.
fn parse_rational(s: &str) -> Option<Freq> {
    if let Some((num, den)) = s.split_once('/') {
        let n: BigInt = num.trim().parse().ok()?;
        let d: BigInt = den.trim().parse().ok()?;
        if d.is_zero() {
            return None;
        }
        return Some(Freq::new(n, d));
    }
    if let Some((int, frac)) = s.split_once('.') {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let negative = int.trim_start().starts_with('-');
        let i: BigInt = if int.is_empty() || int == "-" {
            BigInt::zero()
        } else {
            int.parse().ok()?
        };
        let f: BigInt = frac.parse().ok()?;
        let den = num_traits::pow(BigInt::from(10), frac.len());
        let whole = &i * &den;
        let numer = if negative { whole - f } else { whole + f };
        return Some(Freq::new(numer, den));
    }
    let n: BigInt = s.parse().ok()?;
    Some(Freq::from_integer(n))
}

/// Exact sub-unit fractions with a single-glyph rendering.
const VULGAR: [(u32, u32, &str); 6] = [
    (1, 3, "⅓"),
    (2, 3, "⅔"),
    (1, 6, "⅙"),
    (5, 6, "⅚"),
    (1, 7, "⅐"),
    (1, 9, "⅑"),
];

/// Render a frequency with an SI suffix.
///
/// Exact repeating fractions that would be mangled by float conversion are
/// kept symbolic: thirds, sixths, sevenths and ninths get their vulgar
/// fraction glyph, other small denominators a `+p/q` tail.
pub fn format_freq(f: &Freq) -> String {
    let (scaled, suffix) = scale(f);
    let fract = &scaled - scaled.trunc();
    let whole = scaled.to_integer();

    for (n, d, glyph) in VULGAR {
        if fract == crate::freq(i64::from(n), i64::from(d)) {
            return format!("{whole}{glyph} {suffix}");
        }
    }
    let den = fract.denom();
    if !fract.is_zero()
        && (*den == BigInt::from(6)
            || *den == BigInt::from(7)
            || *den == BigInt::from(9)
            || (BigInt::from(11)..=BigInt::from(19)).contains(den))
    {
        return format!("{whole}+{fract} {suffix}");
    }
    let float = scaled.to_f64().unwrap_or(f64::NAN);
    format!("{float} {suffix}")
}

fn scale(f: &Freq) -> (Freq, &'static str) {
    let tera = crate::int_freq(1_000_000_000_000);
    // VCO frequencies are reported in MHz; the GHz band starts at 10 GHz.
    let ten_giga = crate::int_freq(10_000_000_000);
    let mega = crate::int_freq(1_000_000);
    let kilo = crate::int_freq(1000);
    if *f >= tera {
        (f / tera, "THz")
    } else if *f >= ten_giga {
        (f / crate::int_freq(1_000_000_000), "GHz")
    } else if *f >= mega {
        (f / mega, "MHz")
    } else if *f >= kilo {
        (f / kilo, "kHz")
    } else {
        (f.clone(), "Hz")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{freq, int_freq};

    #[test]
    fn bare_number_is_megahertz() {
        assert_eq!(parse_freq("11").unwrap(), int_freq(11_000_000));
    }

    #[test]
    fn suffixes() {
        assert_eq!(parse_freq("32768.298Hz").unwrap(), freq(32_768_298, 1000));
        assert_eq!(parse_freq("110khz").unwrap(), int_freq(110_000));
        assert_eq!(parse_freq("2.5G").unwrap(), int_freq(2_500_000_000));
        assert_eq!(parse_freq("30.72M").unwrap(), int_freq(30_720_000));
    }

    #[test]
    fn explicit_rational() {
        assert_eq!(parse_freq("3276829/100 Hz").unwrap(), freq(3_276_829, 100));
    }

    #[test]
    fn rejects_junk() {
        assert!(parse_freq("eleven").is_err());
        assert!(parse_freq("1/0Hz").is_err());
        assert!(parse_freq("-5Hz").is_err());
    }

    #[test]
    fn formats_si_bands() {
        assert_eq!(format_freq(&int_freq(11_000_000)), "11 MHz");
        assert_eq!(format_freq(&int_freq(110_000)), "110 kHz");
        assert_eq!(format_freq(&int_freq(2_500_000_000)), "2500 MHz");
        assert_eq!(format_freq(&int_freq(10_000_000_000)), "10 GHz");
    }

    #[test]
    fn formats_vulgar_fractions() {
        let third = int_freq(100) + freq(1, 3);
        assert_eq!(format_freq(&third), "100⅓ Hz");
        let thirteenth = int_freq(5) + freq(2, 13);
        assert_eq!(format_freq(&thirteenth), "5+2/13 Hz");
    }
}
