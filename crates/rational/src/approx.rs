//! Continued-fraction machinery: bounded-denominator approximation and
//! convergent enumeration.

use crate::Freq;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// The closest rational to `f` whose denominator does not exceed
/// `max_den`.
///
/// Walks the Stern–Brocot tree via the continued-fraction expansion and
/// compares the final convergent against the best semiconvergent, so ties
/// resolve exactly as `Fraction.limit_denominator` does.
pub fn limit_denominator(f: &Freq, max_den: &BigInt) -> Freq {
    assert!(*max_den >= BigInt::one());
    if f.denom() <= max_den {
        return f.clone();
    }

    let (mut p0, mut q0, mut p1, mut q1) =
        (BigInt::zero(), BigInt::one(), BigInt::one(), BigInt::zero());
    let mut n = f.numer().clone();
    let mut d = f.denom().clone();
    loop {
        let a = n.div_floor(&d);
        let q2 = &q0 + &a * &q1;
        if q2 > *max_den {
            break;
        }
        let p2 = &p0 + &a * &p1;
        (p0, q0) = (p1, q1);
        (p1, q1) = (p2, q2);
        let rem = &n - &a * &d;
        (n, d) = (d, rem);
    }
    let k = (max_den - &q0).div_floor(&q1);
    let bound1 = Freq::new(&p0 + &k * &p1, &q0 + &k * &q1);
    let bound2 = Freq::new(p1, q1);
    if (&bound2 - f).abs() <= (&bound1 - f).abs() {
        bound2
    } else {
        bound1
    }
}

/// Iterator over the continued-fraction convergents of a rational,
/// starting from `floor(f)` and ending with `f` itself.
pub fn convergents(f: &Freq) -> Convergents {
    Convergents {
        n: f.numer().clone(),
        d: f.denom().clone(),
        p0: BigInt::zero(),
        q0: BigInt::one(),
        p1: BigInt::one(),
        q1: BigInt::zero(),
    }
}

/// See [`convergents`].
pub struct Convergents {
    n: BigInt,
    d: BigInt,
    p0: BigInt,
    q0: BigInt,
    p1: BigInt,
    q1: BigInt,
}

impl Iterator for Convergents {
    type Item = Freq;

    fn next(&mut self) -> Option<Freq> {
        if self.d.is_zero() {
            return None;
        }
        let a = self.n.div_floor(&self.d);
        let p2 = &self.p0 + &a * &self.p1;
        let q2 = &self.q0 + &a * &self.q1;
        let rem = &self.n - &a * &self.d;
        self.n = std::mem::replace(&mut self.d, rem);
        self.p0 = std::mem::replace(&mut self.p1, p2.clone());
        self.q0 = std::mem::replace(&mut self.q1, q2.clone());
        Some(Freq::new(p2, q2))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::freq;

    #[test]
    fn exact_when_denominator_fits() {
        let f = freq(22, 7);
        assert_eq!(limit_denominator(&f, &BigInt::from(10)), f);
    }

    #[test]
    fn pi_convergents() {
        // π ≈ 3.14159265358979: the classic bounded approximations.
        let pi = freq(314_159_265_358_979, 100_000_000_000_000);
        assert_eq!(limit_denominator(&pi, &BigInt::from(10)), freq(22, 7));
        assert_eq!(limit_denominator(&pi, &BigInt::from(100)), freq(311, 99));
        assert_eq!(
            limit_denominator(&pi, &BigInt::from(10_000)),
            freq(355, 113)
        );
    }

    #[test]
    fn chooses_nearest_bound() {
        // 0.3 with denominator ≤ 3 is 1/3, not 1/4.
        assert_eq!(limit_denominator(&freq(3, 10), &BigInt::from(3)), freq(1, 3));
    }

    #[test]
    fn convergent_sequence() {
        let seq: Vec<_> = convergents(&freq(43, 19)).collect();
        assert_eq!(
            seq,
            vec![freq(2, 1), freq(7, 3), freq(9, 4), freq(43, 19)]
        );
    }

    #[test]
    fn convergents_end_exact() {
        let f = freq(730_877_267_270, 1_099_509_789_039);
        assert_eq!(convergents(&f).last().unwrap(), f);
    }
}
