//! Planning for PLL2: pick a VCO frequency, feedback multiplier, the two
//! shared post-dividers and the per-output divider stages.

use crate::consts::{
    pll2_high, pll2_low, pll2_mid, BIG_DIVIDE, MAX_HALF_RANGE, NUM_OUTPUTS,
    OFFICIAL_PLL2_HIGH_HZ, OFFICIAL_PLL2_LOW_HZ,
};
use crate::dpll::DpllPlan;
use crate::error::PlanError;
use crate::target::output_divider;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use rational::{
    factor_splitting, factorize, format_freq, int_freq, is_multiple_of,
    limit_denominator, Freq,
};
use std::cmp::Ordering;

/// Denominator bound of the PLL2 feedback multiplier.
const MULT_DEN_LIMIT: u64 = 1 << 24;

/// A complete frequency plan: the DPLL configuration plus the PLL2
/// configuration and the divider triple for every output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PllPlan {
    /// The DPLL plan this assumes.
    pub dpll: DpllPlan,
    /// The PLL2 VCO frequency actually realised; zero when PLL2 is off.
    pub pll2: Freq,
    /// The PLL2 VCO frequency aimed at; zero when PLL2 is off.
    pub pll2_target: Freq,
    /// PLL2 feedback multiplier relative to the PLL2 phase detector.
    pub multiplier: Freq,
    /// `(post, stage1, stage2)` per output.  A post-divider of zero means
    /// the output is fed from the BAW; all zeros means off.
    pub dividers: Vec<(u32, u32, u32)>,
}

impl PllPlan {
    /// A plan with PLL2 powered down and every output off.
    pub fn pll2_off(dpll: DpllPlan) -> PllPlan {
        PllPlan {
            dpll,
            pll2: Freq::zero(),
            pll2_target: Freq::zero(),
            multiplier: Freq::zero(),
            dividers: vec![(0, 0, 0); NUM_OUTPUTS],
        }
    }

    /// The frequency produced on output `index`, zero when off.
    pub fn freq(&self, index: usize) -> Freq {
        let Some(&(pre, s1, s2)) = self.dividers.get(index) else {
            return Freq::zero();
        };
        if s1 == 0 {
            return Freq::zero();
        }
        let stages = int_freq(i64::from(s1) * i64::from(s2));
        if pre == 0 {
            &self.dpll.baw / stages
        } else {
            &self.pll2 / (int_freq(i64::from(pre)) * stages)
        }
    }

    /// `pll2 / pll2_target − 1`, zero when PLL2 is unused.
    pub fn error_ratio(&self) -> Freq {
        if self.pll2_target.is_zero() {
            Freq::zero()
        } else {
            &self.pll2 / &self.pll2_target - Freq::one()
        }
    }

    /// Is the VCO inside the officially documented range?
    pub fn is_official(&self) -> bool {
        int_freq(OFFICIAL_PLL2_LOW_HZ) <= self.pll2
            && self.pll2 <= int_freq(OFFICIAL_PLL2_HIGH_HZ)
    }

    /// Does the multiplier denominator divide 2²⁴?  Such plans use the
    /// simpler fixed-denominator register encoding.
    pub fn fixed_denom(&self) -> bool {
        match self.multiplier.denom().to_u64() {
            Some(d) => d != 0 && MULT_DEN_LIMIT % d == 0,
            None => false,
        }
    }

    /// Is the big-divide stage2 divider even (or trivial)?  Even gives an
    /// exact 50/50 duty cycle.
    pub fn stage2_even(&self) -> bool {
        match self.dividers.get(BIG_DIVIDE) {
            None => true,
            Some(&(_, _, stage2)) => stage2 <= 1 || stage2 % 2 == 0,
        }
    }

    /// Total quality order, less is better.
    pub fn quality_cmp(&self, b: &PllPlan) -> Ordering {
        let a_err = self.error_ratio().abs();
        let b_err = b.error_ratio().abs();
        // Exact beats everything, then the officially supported range.
        (!a_err.is_zero())
            .cmp(&!b_err.is_zero())
            .then_with(|| (!self.is_official()).cmp(&!b.is_official()))
            .then_with(|| a_err.cmp(&b_err))
            .then_with(|| (!self.stage2_even()).cmp(&!b.stage2_even()))
            .then_with(|| (!self.fixed_denom()).cmp(&!b.fixed_denom()))
            .then_with(|| {
                let a_df = (&self.pll2 - pll2_mid()).abs();
                let b_df = (&b.pll2 - pll2_mid()).abs();
                a_df.cmp(&b_df)
            })
            .then_with(|| self.pll2.cmp(&b.pll2))
    }

    /// Check the plan invariants.
    pub fn validate(&self) {
        self.dpll.validate();
        if self.pll2_target.is_zero() {
            assert!(self.pll2.is_zero());
        } else {
            assert!(self.pll2 == &self.multiplier * self.dpll.pll2_pfd());
            assert!(pll2_low() <= self.pll2 && self.pll2 <= pll2_high());
            assert!(*self.multiplier.denom() <= BigInt::from(MULT_DEN_LIMIT));
        }
        for (i, &(pre, s1, s2)) in self.dividers.iter().enumerate() {
            assert!(pre == 0 || (2..=7).contains(&pre));
            assert!(s1 <= 256);
            assert!(u64::from(s2) <= 1 << 24);
            assert!(s2 <= 1 || i == BIG_DIVIDE);
            if s2 > 1 {
                assert!(s1 >= 6);
            }
        }
    }
}

/// Bitmask of post-divider pairs `(p1, p2)` that include `div`: bit
/// `8·p1 + p2` is set when the pair can serve an output needing `div`.
fn postdiv_mask(div: u32) -> u64 {
    debug_assert!((2..=7).contains(&div));
    0x0101_0101_0101_0101u64 << div | 0xfeu64 << (8 * div)
}

fn floor_div(a: &Freq, b: &Freq) -> BigInt {
    let q = a / b;
    q.numer().div_floor(q.denom())
}

fn ceil_div(a: &Freq, b: &Freq) -> BigInt {
    let q = a / b;
    q.numer().div_ceil(q.denom())
}

/// Try to build a plan around one particular PLL2 frequency.  The
/// frequency list holds only the PLL2-path outputs; the rest stay zero
/// here and are back-filled from PLL1 later.
fn pll2_plan1(
    dpll: &DpllPlan,
    freqs: &[Freq],
    pll2_freq: &Freq,
) -> Option<PllPlan> {
    debug_assert!(pll2_low() <= *pll2_freq && *pll2_freq <= pll2_high());
    // Bit masks of usable post-divider pairs; `postdive` additionally
    // requires an even final divider stage.
    let mut postdivs = u64::MAX;
    let mut postdive = u64::MAX;
    for (i, f) in freqs.iter().enumerate() {
        if f.is_zero() {
            continue;
        }
        debug_assert!(is_multiple_of(pll2_freq, f));
        let ratio = (pll2_freq / f).to_integer().to_u64()?;
        if ratio <= 1 {
            return None;
        }

        let mut postdivs1 = 0u64;
        let mut postdive1 = 0u64;
        for postdiv in 2..=7u32 {
            if ratio % u64::from(postdiv) != 0 {
                continue;
            }
            let Some((s1, s2)) = output_divider(i, ratio / u64::from(postdiv))
            else {
                continue;
            };
            postdivs1 |= postdiv_mask(postdiv);
            if s1 % 2 == 0 && s2 == 1 || s2 % 2 == 0 {
                postdive1 |= postdiv_mask(postdiv);
            }
        }
        postdivs &= postdivs1;
        postdive &= postdive1;
        if postdivs == 0 {
            return None;
        }
    }
    if postdivs == 0 {
        return None;
    }

    let mult_exact = pll2_freq / dpll.pll2_pfd();
    let mult_actual =
        limit_denominator(&mult_exact, &BigInt::from(MULT_DEN_LIMIT));

    // Use the highest usable pair, preferring one that keeps the final
    // stages even.
    let mask = if postdive != 0 { postdive } else { postdivs };
    let postdiv_bit = 63 - mask.leading_zeros();
    let p1 = postdiv_bit >> 3 & 7;
    let p2 = postdiv_bit & 7;

    let mut dividers = vec![(0u32, 0u32, 0u32); freqs.len()];
    for (i, f) in freqs.iter().enumerate() {
        if f.is_zero() {
            continue;
        }
        let ratio = (pll2_freq / f).to_integer().to_u64()?;
        let mut chosen = None;
        if ratio % u64::from(p1) == 0 {
            chosen = output_divider(i, ratio / u64::from(p1))
                .map(|(s1, s2)| (p1, s1, s2));
        }
        if chosen.is_none() {
            debug_assert!(ratio % u64::from(p2) == 0);
            chosen = output_divider(i, ratio / u64::from(p2))
                .map(|(s1, s2)| (p2, s1, s2));
        }
        dividers[i] = chosen?;
    }

    Some(PllPlan {
        dpll: dpll.clone(),
        pll2: dpll.pll2_pfd() * &mult_actual,
        pll2_target: pll2_freq.clone(),
        multiplier: mult_actual,
        dividers,
    })
}

/// Brute-force PLL2 planning over multiples of the output LCM.
///
/// Sane run times need a bounded number of multiples of `pll2_lcm` in
/// the VCO range, so the sweep is clamped to ±[`MAX_HALF_RANGE`] steps
/// around the mid-point.  Use [`pll2_plan_low`] when the LCM is small.
pub fn pll2_plan(
    dpll: &DpllPlan,
    freqs: &[Freq],
    pll2_lcm: &Freq,
) -> Result<PllPlan, PlanError> {
    // Good luck actually getting 1600 MHz through the output drivers,
    // but anything above that is definitely out.
    if let Some(maxf) = freqs.iter().max() {
        if *maxf > pll2_high() / int_freq(4) {
            return Err(PlanError::MaxFrequencyTooHigh(maxf.clone()));
        }
    }

    let start = ceil_div(&pll2_low(), pll2_lcm);
    let end = floor_div(&pll2_high(), pll2_lcm);
    if start > end {
        return Err(PlanError::MultipleNotInRange(pll2_lcm.clone()));
    }

    // Clamp the sweep for small LCMs.
    let mid = floor_div(&pll2_mid(), pll2_lcm);
    let start = start.max(&mid - BigInt::from(MAX_HALF_RANGE));
    let end = end.min(&mid + BigInt::from(MAX_HALF_RANGE));

    let mut best: Option<PllPlan> = None;
    let mut mult = start;
    while mult <= end {
        let pll2_freq = pll2_lcm * Freq::from_integer(mult.clone());
        if let Some(plan) = pll2_plan1(dpll, freqs, &pll2_freq) {
            if best.as_ref().map_or(true, |b| plan.quality_cmp(b).is_lt()) {
                best = Some(plan);
            }
        }
        mult += BigInt::one();
    }

    best.ok_or_else(|| PlanError::Pll2Failed(pll2_lcm.clone()))
}

/// One candidate of the low-frequency search: a concrete split of the
/// ratio denominator over the post, stage1, multiplier-denominator and
/// stage2 dividers.  `stage2` is then scaled up to put the VCO in range.
fn pll2_plan_low1(
    dpll: &DpllPlan,
    freqs: &[Freq],
    f: &Freq,
    post_div: u32,
    stage1_div: u32,
    mult_den: u64,
    stage2_div: u64,
) -> Option<PllPlan> {
    let pll2_pfd = dpll.pll2_pfd();
    let ratio = f / &pll2_pfd;
    let total_divide = BigInt::from(mult_den)
        * BigInt::from(post_div)
        * BigInt::from(stage1_div)
        * BigInt::from(stage2_div);
    debug_assert!(total_divide.mod_floor(ratio.denom()).is_zero());

    let output_divide = u64::from(post_div) * u64::from(stage1_div) * stage2_div;
    let per_extra = f * int_freq(output_divide as i64);

    // Scale stage2 to put the VCO in the supported range.
    let max_extra = floor_div(&pll2_high(), &per_extra)
        .min(BigInt::from((1u64 << 24) / stage2_div));
    let min_extra = ceil_div(&pll2_low(), &per_extra);
    if min_extra > max_extra {
        return None; // Impossible.
    }
    let mut extra = floor_div(&pll2_mid(), &per_extra).max(min_extra.clone());

    // Attempt to make the stage2 divide even.
    if stage2_div % 2 != 0 && extra.is_odd() {
        if extra < max_extra {
            extra += BigInt::one();
        } else if extra > min_extra {
            extra -= BigInt::one();
        }
    }
    let stage2_div = stage2_div * extra.to_u64()?;

    let vco_freq = f
        * int_freq(i64::from(post_div))
        * int_freq(i64::from(stage1_div))
        * int_freq(stage2_div as i64);
    let multiplier = &vco_freq / &pll2_pfd;

    assert!(pll2_low() <= vco_freq && vco_freq <= pll2_high());
    assert!(*multiplier.denom() <= BigInt::from(MULT_DEN_LIMIT));

    let mut dividers = vec![(0u32, 0u32, 0u32); freqs.len()];
    dividers[BIG_DIVIDE] = (post_div, stage1_div, stage2_div as u32);

    Some(PllPlan {
        dpll: dpll.clone(),
        pll2: vco_freq.clone(),
        pll2_target: vco_freq,
        multiplier,
        dividers,
    })
}

/// Search for an exact PLL2 plan for a single low output frequency by
/// partitioning the denominator of the PFD-to-output ratio over the PLL2
/// multiplier denominator, the post divider, and the two output stages.
///
/// `factors` holds the prime factors of that denominator.  `fast`
/// enables a heuristic cap on the multiplier denominator that almost
/// always succeeds and slashes the run time.
fn pll2_plan_low_exact(
    dpll: &DpllPlan,
    freqs: &[Freq],
    f: &Freq,
    fast: bool,
    factors: &[u64],
) -> Option<PllPlan> {
    // Prime factors at or above 2²⁴ can't be placed anywhere.
    if factors.last().map_or(true, |&p| p >= 1 << 24) {
        return None;
    }

    let ratio = f / dpll.pll2_pfd();
    let mut best: Option<PllPlan> = None;
    for post_div in 2..=7u32 {
        for stage1_div in 6..=256u32 {
            let combined = BigInt::from(post_div) * BigInt::from(stage1_div);
            let bigden_big = ratio.denom() / ratio.denom().gcd(&combined);
            let Some(bigden) = bigden_big.to_u64() else {
                continue;
            };

            let per_unit =
                f * int_freq(i64::from(post_div) * i64::from(stage1_div));
            let s2_max = floor_div(&pll2_high(), &per_unit)
                .min(BigInt::from(1u64 << 24));
            let Some(s2_max) = s2_max.to_u64() else { continue };
            if bigden > s2_max << 24 {
                continue; // Not achievable.
            }

            // s2_min is no lower bound on the search, because an extra
            // multiplier brings stage2 into range later; it still rejects
            // infeasible splits and feeds the fast heuristic.
            let s2_min = ceil_div(&pll2_low(), &per_unit);
            let Some(s2_min) = s2_min.to_u64() else { continue };
            if s2_min > 1 << 24 {
                continue; // Not achievable.
            }

            let den_max = if fast {
                (bigden / s2_min.max(1)).min(1 << 24)
            } else {
                1 << 24
            };

            for (stage2_div, mult_den) in
                factor_splitting(bigden, factors, s2_max, den_max)
            {
                let plan = pll2_plan_low1(
                    dpll, freqs, f, post_div, stage1_div, mult_den, stage2_div,
                );
                if let Some(plan) = plan {
                    if best
                        .as_ref()
                        .map_or(true, |b| plan.quality_cmp(b).is_lt())
                    {
                        best = Some(plan);
                    }
                }
            }
        }
    }
    best
}

/// Plan for the special case where only the big-divide output is live
/// and the stage2 divider is definitely needed.
///
/// A full sweep of the VCO range is infeasible down here, so first try
/// to hit the frequency exactly by factorising the frequency ratio; only
/// if that fails fall back to the (bounded) normal sweep and accept an
/// approximation.
pub fn pll2_plan_low(
    dpll: &DpllPlan,
    freqs: &[Freq],
    f: &Freq,
) -> Result<PllPlan, PlanError> {
    debug_assert!(*f < pll2_low() / int_freq(7 * 256));
    debug_assert!(*f == freqs[BIG_DIVIDE]);

    let ratio = f / dpll.pll2_pfd();
    // The biggest achievable divider is 7 · 256 · 2²⁴ with another 2²⁴
    // of multiplier denominator on top; don't waste time factorising
    // anything beyond that.
    if *ratio.denom() <= BigInt::from(7u64 << 56) {
        let den = ratio.denom().to_u64().unwrap_or(u64::MAX);
        // We only get called well below the PLL2 PFD, so the ratio is a
        // genuine fraction.
        let factors = factorize(den);
        assert!(!factors.is_empty());

        tracing::debug!(freq = %format_freq(f), "PLL2 low exact, fast pass");
        if let Some(plan) = pll2_plan_low_exact(dpll, freqs, f, true, &factors)
        {
            return Ok(plan);
        }
        tracing::debug!("PLL2 low exact, slow pass");
        if let Some(plan) =
            pll2_plan_low_exact(dpll, freqs, f, false, &factors)
        {
            return Ok(plan);
        }
    }

    // Give up on an exact match; sweep a limited part of the range.
    tracing::debug!("PLL2 low fallback to bounded sweep");
    pll2_plan(dpll, freqs, f)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dpll::dpll_plan;
    use crate::target::Target;
    use rational::freq;

    fn freq_list(entries: &[(usize, Freq)]) -> Vec<Freq> {
        let mut out = vec![Freq::zero(); NUM_OUTPUTS];
        for (i, f) in entries {
            out[*i] = f.clone();
        }
        out
    }

    fn nominal_dpll() -> DpllPlan {
        dpll_plan(&Target::default()).unwrap()
    }

    #[test]
    fn postdiv_mask_pairs() {
        // Pair (3, 5) must be present in both masks.
        let bit = 8 * 3 + 5;
        assert!(postdiv_mask(3) & (1 << bit) != 0);
        assert!(postdiv_mask(5) & (1 << bit) != 0);
        // Pair (4, 6) involves neither 3 nor 5.
        let bit = 8 * 4 + 6;
        assert!(postdiv_mask(3) & (1u64 << bit) == 0);
        assert!(postdiv_mask(5) & (1u64 << bit) == 0);
    }

    #[test]
    fn plan_single_high_output() {
        // 123 MHz can't come off the BAW; it needs PLL2.
        let dpll = nominal_dpll();
        let freqs = freq_list(&[(0, int_freq(123_000_000))]);
        let plan = pll2_plan(&dpll, &freqs, &int_freq(123_000_000)).unwrap();
        plan.validate();
        assert_eq!(plan.pll2, plan.pll2_target);
        assert_eq!(plan.freq(0), int_freq(123_000_000));
        let (pre, s1, s2) = plan.dividers[0];
        assert!((2..=7).contains(&pre));
        assert_eq!(s2, 1);
        assert!(s1 >= 1);
    }

    #[test]
    fn plan_two_outputs_share_postdivs() {
        let dpll = nominal_dpll();
        let fa = int_freq(123_000_000);
        let fb = int_freq(61_500_000);
        let freqs = freq_list(&[(0, fa.clone()), (1, fb.clone())]);
        let lcm = rational::fract_lcm(&fa, &fb);
        let plan = pll2_plan(&dpll, &freqs, &lcm).unwrap();
        plan.validate();
        assert_eq!(plan.freq(0), fa);
        assert_eq!(plan.freq(1), fb);
        // At most two distinct post-divider values live at once.
        let mut posts: Vec<u32> =
            plan.dividers.iter().map(|d| d.0).filter(|&p| p != 0).collect();
        posts.sort_unstable();
        posts.dedup();
        assert!(posts.len() <= 2);
    }

    #[test]
    fn lcm_out_of_range_fails() {
        let dpll = nominal_dpll();
        // No multiple of 3.3 GHz lands inside [5.34, 6.41] GHz.
        let f = int_freq(3_300_000_000);
        let freqs = freq_list(&[(0, f.clone())]);
        let err = pll2_plan(&dpll, &freqs, &f).unwrap_err();
        assert!(matches!(err, PlanError::MaxFrequencyTooHigh(_)));

        // In the divider range but the LCM skips the window.
        let f = int_freq(1_300_000_000);
        let freqs = freq_list(&[(0, f.clone())]);
        let err = pll2_plan(&dpll, &freqs, &f).unwrap_err();
        assert!(matches!(err, PlanError::MultipleNotInRange(_)));
    }

    #[test]
    fn low_path_exact_32768_298() {
        // The classic awkward customer: 32768.298 Hz.
        let dpll = nominal_dpll();
        let f = freq(32_768_298, 1000);
        let freqs = freq_list(&[(BIG_DIVIDE, f.clone())]);
        let plan = pll2_plan_low(&dpll, &freqs, &f).unwrap();
        plan.validate();
        assert_eq!(plan.pll2, plan.pll2_target);
        assert_eq!(plan.freq(BIG_DIVIDE), f);
        let (pre, s1, s2) = plan.dividers[BIG_DIVIDE];
        assert!((2..=7).contains(&pre));
        assert!((6..=256).contains(&s1));
        assert!(u64::from(s2) <= 1 << 24);
    }

    #[test]
    fn low_path_prefers_even_stage2() {
        let dpll = nominal_dpll();
        let f = freq(32_768_298, 1000);
        let freqs = freq_list(&[(BIG_DIVIDE, f.clone())]);
        let plan = pll2_plan_low(&dpll, &freqs, &f).unwrap();
        assert!(plan.stage2_even());
    }

    #[test]
    fn quality_ordering_prefers_exact_and_official() {
        let dpll = nominal_dpll();
        let mid = pll2_mid();
        let exact = PllPlan {
            pll2: mid.clone(),
            pll2_target: mid.clone(),
            multiplier: &mid / dpll.pll2_pfd(),
            ..PllPlan::pll2_off(dpll.clone())
        };
        let near = PllPlan {
            pll2: &mid + int_freq(1),
            pll2_target: mid.clone(),
            multiplier: (&mid + int_freq(1)) / dpll.pll2_pfd(),
            ..PllPlan::pll2_off(dpll.clone())
        };
        assert_eq!(exact.quality_cmp(&near), Ordering::Less);

        // Both exact: official range wins over the extension.
        let low_ext = PllPlan {
            pll2: int_freq(5_400_000_000),
            pll2_target: int_freq(5_400_000_000),
            multiplier: int_freq(5_400_000_000) / dpll.pll2_pfd(),
            ..PllPlan::pll2_off(dpll.clone())
        };
        let official = PllPlan {
            pll2: int_freq(5_600_000_000),
            pll2_target: int_freq(5_600_000_000),
            multiplier: int_freq(5_600_000_000) / dpll.pll2_pfd(),
            ..PllPlan::pll2_off(dpll)
        };
        assert_eq!(official.quality_cmp(&low_ext), Ordering::Less);
    }
}
