//! Exact rational arithmetic for frequency planning.
//!
//! Every frequency handled by the planner is a [`Freq`]: an arbitrary
//! precision rational number of hertz.  Floating point appears only at
//! display boundaries; all planning arithmetic is exact.
//!
//! Besides the basic type, this crate carries the number-theoretic
//! helpers the planner searches are built from: bounded-denominator
//! approximation, rational LCM, prime factorisation, lazy enumeration of
//! two-way factor splits, and the mid-out symmetric range iterator.

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

mod approx;
mod factor;
mod parse;
mod range;
mod split;

pub use approx::{convergents, limit_denominator, Convergents};
pub use factor::{factorize, is_probable_prime, SMALL_PRIMES};
pub use parse::{format_freq, parse_freq, ParseFreqError};
pub use range::{sym_range, SymRange};
pub use split::{factor_splitting, FactorSplit};

// The gcd surface comes straight from num-integer.
pub use num_integer::Integer;

/// An exact rational number of hertz.
pub type Freq = num_rational::BigRational;

/// Build a frequency from a numerator/denominator pair of machine integers.
pub fn freq(numer: i64, denom: i64) -> Freq {
    Freq::new(BigInt::from(numer), BigInt::from(denom))
}

/// Build a frequency from an integer number of hertz.
pub fn int_freq(hz: i64) -> Freq {
    Freq::from_integer(BigInt::from(hz))
}

/// Does `b` divide `a` exactly, as rationals?
///
/// True iff `a / b` is a non-negative integer: the numerator of `b` must
/// divide the numerator of `a` and the denominator of `a` must divide the
/// denominator of `b`.  `b` must be non-zero.
pub fn is_multiple_of(a: &Freq, b: &Freq) -> bool {
    !b.is_zero()
        && a.numer().mod_floor(b.numer()).is_zero()
        && b.denom().mod_floor(a.denom()).is_zero()
}

/// Least common multiple of two positive rationals: the smallest positive
/// rational that is an integer multiple of both.
pub fn fract_lcm(a: &Freq, b: &Freq) -> Freq {
    debug_assert!(a.is_positive() && b.is_positive());
    let g1 = a.denom().gcd(b.denom());
    let g2 = a.numer().gcd(b.numer());
    let u = (a.denom() / &g1) * (b.numer() / &g2);
    let v = (a.numer() / &g2) * (b.denom() / &g1);
    debug_assert!(a * &u == b * &v);
    debug_assert!(u.gcd(&v).is_one());
    a * u
}

/// Fold a rational LCM over an optional accumulator.
pub fn fract_lcm_opt(acc: Option<Freq>, f: &Freq) -> Option<Freq> {
    match acc {
        None => Some(f.clone()),
        Some(a) => Some(fract_lcm(&a, f)),
    }
}
