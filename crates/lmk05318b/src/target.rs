//! The planning request: an ordered list of output frequencies plus the
//! optional constraints, and the output divider decomposition shared by
//! both PLL paths.

use crate::consts::{BIG_DIVIDE, NUM_OUTPUTS};
use num_traits::Zero;
use rational::{int_freq, is_multiple_of, Freq};

/// Target output frequencies.  A frequency of zero leaves that output
/// off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Requested frequency per channel; trailing zeros may be omitted.
    pub freqs: Vec<Freq>,
    /// DPLL reference input frequency.
    pub reference: Freq,
    /// PLL1 phase-detector frequency (the doubled XO).
    pub pll1_pfd: Freq,
    /// When set, constrain the BAW to an integer multiple of this value.
    pub pll1_base: Option<Freq>,
    /// When set, constrain PLL2 to an integer multiple of this value, and
    /// route every frequency dividing it through PLL2.
    pub pll2_base: Option<Freq>,
}

impl Default for Target {
    fn default() -> Target {
        Target {
            freqs: Vec::new(),
            reference: crate::consts::ref_freq(),
            pll1_pfd: crate::consts::pll1_pfd_default(),
            pll1_base: None,
            pll2_base: None,
        }
    }
}

impl Target {
    /// A target for the given frequencies with default constraints.
    pub fn new(freqs: Vec<Freq>) -> Target {
        assert!(freqs.len() <= NUM_OUTPUTS);
        Target { freqs, ..Target::default() }
    }

    /// The requested frequency on channel `index`, zero when absent.
    pub fn freq(&self, index: usize) -> Freq {
        self.freqs.get(index).cloned().unwrap_or_else(|| int_freq(0))
    }

    /// Must `f` be generated from PLL2?  True iff a PLL2 base frequency is
    /// set and `f` divides it exactly.
    pub fn force_pll2(&self, f: &Freq) -> bool {
        match &self.pll2_base {
            Some(base) => is_multiple_of(base, f),
            None => false,
        }
    }
}

/// Break an integer division `ratio` into the output divider stages.
///
/// A single-stage divider covers 2..=256.  Only the big-divide output has
/// a second stage: stage1 in 6..=256 and stage2 up to 2²⁴.  An even
/// stage2 gives an exact 50% duty cycle, so prefer one, and with stage2
/// even keep stage1 as high as possible; failing that take the lowest
/// stage1 that divides, which keeps stage2 (and the duty cycle error
/// denominator) as high as possible.
pub fn output_divider(index: usize, ratio: u64) -> Option<(u32, u32)> {
    if (2..=256).contains(&ratio) {
        return Some((ratio as u32, 1));
    }

    if index != BIG_DIVIDE {
        return None;
    }

    // Try an even second stage: `first` is twice the stage1 divider.
    let mut first = 512;
    while first > 11 {
        if ratio % first == 0 && ratio / first <= 1 << 23 {
            return Some(((first / 2) as u32, (ratio * 2 / first) as u32));
        }
        first -= 2;
    }

    // Settle for any second stage.
    for first in 6..=256u64 {
        if ratio % first == 0 && ratio / first <= 1 << 24 {
            return Some((first as u32, (ratio / first) as u32));
        }
    }

    None
}

/// Divider stages realising `f` from a source frequency, when the ratio
/// is an exact integer.
pub fn divider_for(index: usize, source: &Freq, f: &Freq) -> Option<(u32, u32)> {
    if f.is_zero() || !is_multiple_of(source, f) {
        return None;
    }
    let ratio = source / f;
    debug_assert!(ratio.is_integer());
    let ratio = num_traits::ToPrimitive::to_u64(&ratio.to_integer())?;
    output_divider(index, ratio)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rational::freq;

    #[test]
    fn single_stage_band() {
        assert_eq!(output_divider(0, 2), Some((2, 1)));
        assert_eq!(output_divider(0, 256), Some((256, 1)));
        assert_eq!(output_divider(0, 1), None);
        assert_eq!(output_divider(0, 257), None);
    }

    #[test]
    fn two_stage_only_on_big_divide() {
        assert_eq!(output_divider(3, 1000), None);
        // 1000 = 250 · 4: largest even-stage2 split keeps stage1 high.
        assert_eq!(output_divider(BIG_DIVIDE, 1000), Some((250, 4)));
    }

    #[test]
    fn even_stage2_preferred() {
        // 6 · 2²³ has plenty of even splits; the chosen stage2 is even.
        let (s1, s2) = output_divider(BIG_DIVIDE, 6 << 23).unwrap();
        assert_eq!(u64::from(s1) * u64::from(s2), 6 << 23);
        assert_eq!(s2 % 2, 0);
        // An odd prime beyond 256² forces an odd stage2.
        let ratio = 7 * 65537;
        let (s1, s2) = output_divider(BIG_DIVIDE, ratio).unwrap();
        assert_eq!(u64::from(s1) * u64::from(s2), ratio);
        assert_eq!(s1, 7);
        assert_eq!(s2, 65537);
    }

    #[test]
    fn two_stage_range_limits() {
        // stage2 would have to exceed 2²⁴.
        assert!(output_divider(BIG_DIVIDE, (1 << 24) * 257 + 1).is_none());
        // Largest expressible two-stage ratio.
        let max = 256u64 << 24;
        let (s1, s2) = output_divider(BIG_DIVIDE, max).unwrap();
        assert_eq!(u64::from(s1) * u64::from(s2), max);
    }

    #[test]
    fn divider_for_requires_exact_ratio() {
        let baw = crate::consts::baw_freq();
        assert_eq!(divider_for(0, &baw, &int_freq(25_000_000)), Some((100, 1)));
        assert_eq!(divider_for(0, &baw, &int_freq(24_999_999)), None);
        assert_eq!(divider_for(0, &baw, &freq(0, 1)), None);
    }

    #[test]
    fn force_pll2_requires_exact_division() {
        let mut t = Target::default();
        assert!(!t.force_pll2(&int_freq(10)));
        t.pll2_base = Some(int_freq(10_000_000));
        assert!(t.force_pll2(&int_freq(2_500_000)));
        assert!(!t.force_pll2(&int_freq(3_000_000)));
    }
}
