//! Mid-out symmetric range iteration.

use crate::Freq;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};

/// Multipliers `m` with `low ≤ m·f ≤ high` and `m ≤ limit`.
///
/// Even multipliers come before odd ones, and within each parity class
/// values closer to the range mid-point come first (the value below the
/// mid-point breaking the tie).  Callers that accept the first feasible
/// multiplier therefore land on a 50% duty cycle divider whenever one
/// exists.
pub fn sym_range(f: &Freq, low: &Freq, high: &Freq, limit: u64) -> SymRange {
    let mid = (low + high) / crate::int_freq(2);
    let offset = floor_div(&mid, f);
    let start = ceil_div(low, f);
    let end = floor_div(high, f).min(BigInt::from(limit));
    if start > end {
        return SymRange::done();
    }
    let initial = BigInt::zero().max(&offset - &end).max(&start - &offset);
    let final_i = (&end - &offset).max(&offset - &start);
    SymRange {
        offset,
        start,
        end,
        i: initial.clone(),
        initial,
        final_i,
        pass: 0,
        pending: None,
        done: false,
    }
}

/// See [`sym_range`].
pub struct SymRange {
    offset: BigInt,
    start: BigInt,
    end: BigInt,
    i: BigInt,
    initial: BigInt,
    final_i: BigInt,
    // 0 scans even multipliers, 1 odd.
    pass: u8,
    pending: Option<BigInt>,
    done: bool,
}

impl SymRange {
    fn done() -> SymRange {
        SymRange {
            offset: BigInt::zero(),
            start: BigInt::zero(),
            end: BigInt::zero(),
            i: BigInt::zero(),
            initial: BigInt::zero(),
            final_i: BigInt::zero(),
            pass: 0,
            pending: None,
            done: true,
        }
    }

    fn in_range(&self, m: &BigInt) -> bool {
        &self.start <= m && m <= &self.end
    }
}

impl Iterator for SymRange {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if let Some(m) = self.pending.take() {
            return m.to_u64();
        }
        while !self.done {
            // Keep i in the parity class of the current pass: offset ± i
            // even on the first pass, odd on the second.
            let phase =
                ((&self.i + &self.offset) % BigInt::from(2)).to_u8().unwrap_or(0);
            if phase != self.pass {
                self.i += BigInt::one();
            }
            if self.i > self.final_i {
                if self.pass == 0 {
                    self.pass = 1;
                    self.i = self.initial.clone();
                    continue;
                }
                self.done = true;
                break;
            }
            let below = &self.offset - &self.i;
            let above = &self.offset + &self.i;
            let i_nonzero = !self.i.is_zero();
            self.i += BigInt::from(2);
            if self.in_range(&below) {
                if i_nonzero && self.in_range(&above) {
                    self.pending = Some(above);
                }
                return below.to_u64();
            }
            if i_nonzero && self.in_range(&above) {
                return above.to_u64();
            }
        }
        None
    }
}

fn floor_div(a: &Freq, b: &Freq) -> BigInt {
    let q = a / b;
    q.numer().div_floor(q.denom())
}

fn ceil_div(a: &Freq, b: &Freq) -> BigInt {
    let q = a / b;
    q.numer().div_ceil(q.denom())
}
