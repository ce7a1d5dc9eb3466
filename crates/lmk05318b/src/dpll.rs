//! Planning for the DPLL: pick the BAW frequency and the reference
//! feedback divider chain that realises it.
//!
//! The feedback path has three stages: a fixed ÷2, the rational ΣΔ
//! divider, and a pre-divider in 2..=17.  With an R-divider of 1 the
//! phase detector runs at the raw reference rate.

use crate::consts::{
    baw_freq, baw_high, baw_low, BIG_DIVIDE, FPD_DIVIDE,
};
use crate::error::PlanError;
use crate::target::{output_divider, Target};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use rational::{
    freq, int_freq, is_multiple_of, limit_denominator, sym_range, Freq,
};
use std::cmp::Ordering;

/// Denominator bound of the ΣΔ feedback divider.
fn fb_den_limit() -> BigInt {
    BigInt::one() << 40
}

/// A DPLL configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpllPlan {
    /// The BAW frequency actually realised.
    pub baw: Freq,
    /// The BAW frequency aimed at; downstream calculations use this.
    pub baw_target: Freq,
    /// Input reference frequency.
    pub reference: Freq,
    /// PLL1 phase-detector frequency, carried for the ratio registers.
    pub pll1_pfd: Freq,
    /// Reference divider.  Always 1 at present.
    pub ref_div: u32,
    /// Variable pre-divider, 2..=17.  This sits after the main divider.
    pub fb_prediv: u32,
    /// The main ΣΔ divider.  A fixed ÷2 applies on top.
    pub fb_div: Freq,
}

impl DpllPlan {
    /// The nominal plan: BAW dead on 2500 MHz from the default reference.
    pub fn nominal(target: &Target) -> DpllPlan {
        DpllPlan {
            baw: baw_freq(),
            baw_target: baw_freq(),
            reference: target.reference.clone(),
            pll1_pfd: target.pll1_pfd.clone(),
            ref_div: 1,
            fb_prediv: 2,
            fb_div: baw_freq() / &target.reference / int_freq(4),
        }
    }

    /// Total quality order, less is better: exactness, centring, small
    /// pre-divider, then a small and simple ΣΔ fraction.
    pub fn quality_cmp(&self, b: &DpllPlan) -> Ordering {
        let a_err = (&self.baw - &self.baw_target).abs();
        let b_err = (&b.baw - &b.baw_target).abs();
        a_err
            .cmp(&b_err)
            .then_with(|| {
                let a_mid = (&self.baw - baw_freq()).abs();
                let b_mid = (&b.baw - baw_freq()).abs();
                a_mid.cmp(&b_mid)
            })
            .then_with(|| self.fb_prediv.cmp(&b.fb_prediv))
            .then_with(|| self.fb_div.denom().cmp(b.fb_div.denom()))
            .then_with(|| self.fb_div.cmp(&b.fb_div))
    }

    /// Divider stages delivering `f` from the BAW, using the target
    /// frequency rather than the realised one.
    pub fn pll1_divider(&self, index: usize, f: &Freq) -> Option<(u32, u32)> {
        crate::target::divider_for(index, &self.baw_target, f)
    }

    /// The PLL2 phase-detector frequency.  Like TICS Pro, a fixed ÷18,
    /// whose only purpose is to get under the 150 MHz PFD limit.
    pub fn pll2_pfd(&self) -> Freq {
        &self.baw / int_freq(FPD_DIVIDE)
    }

    /// PLL1 feedback ratio split into its integer part and a 40-bit
    /// fraction.  The ratio always lands strictly between 40 and 41.
    pub fn pll1_ratio(&self) -> (u64, u64) {
        let ratio = &self.baw / &self.pll1_pfd;
        let int = ratio.to_integer();
        assert!(
            int == BigInt::from(40),
            "PLL1 feedback ratio out of range"
        );
        let frac = &ratio - Freq::from_integer(int.clone());
        let scaled = round_rational(&(frac * Freq::from_integer(BigInt::one() << 40)));
        (40, scaled.to_u64().unwrap_or(0))
    }

    /// Check the plan invariants.
    pub fn validate(&self) {
        assert!(*self.fb_div.denom() < fb_den_limit());
        assert!((2..=17).contains(&self.fb_prediv));
        let chain = &self.reference / int_freq(i64::from(self.ref_div))
            * int_freq(2)
            * int_freq(i64::from(self.fb_prediv))
            * &self.fb_div;
        assert!(self.baw == chain);
        assert!((&self.baw - &self.baw_target).abs() < int_freq(1));
    }
}

fn round_rational(f: &Freq) -> BigInt {
    (f + freq(1, 2)).floor().to_integer()
}

/// Pick `(n_low, n_high)` counter start values so that counting `n_low`
/// cycles of `f_low` and `n_high` cycles of `f_high` measures close to
/// the same `window` (in seconds).
///
/// The low-side count is searched within ±10 of its nominal value for
/// the pair whose high-side rounding error is smallest.
pub fn lock_counts(f_low: &Freq, f_high: &Freq, window: &Freq) -> (u64, u64) {
    let nominal = round_rational(&(window * f_low)).max(BigInt::one());
    let mut best: Option<(Freq, BigInt, BigInt, BigInt)> = None;
    for delta in -10i64..=10 {
        let n_low = &nominal + BigInt::from(delta);
        if n_low < BigInt::one() {
            continue;
        }
        let exact_high = Freq::from_integer(n_low.clone()) * f_high / f_low;
        let n_high = round_rational(&exact_high);
        let err = (Freq::from_integer(n_high.clone()) / &exact_high
            - Freq::one())
        .abs();
        let dist = BigInt::from(delta.abs());
        let better = match &best {
            None => true,
            Some((e, d, _, _)) => err < *e || (err == *e && dist < *d),
        };
        if better {
            best = Some((err, dist, n_low, n_high));
        }
    }
    let (_, _, n_low, n_high) =
        best.unwrap_or((Freq::zero(), BigInt::zero(), nominal.clone(), nominal));
    // The VCO-side count must land within 1% of its nominal window.
    let vco_nominal = window * f_high;
    let off = (Freq::from_integer(n_high.clone()) / vco_nominal - Freq::one())
        .abs();
    assert!(off <= freq(1, 100), "lock detect window off by more than 1%");
    (n_low.to_u64().unwrap_or(0), n_high.to_u64().unwrap_or(0))
}

/// Make a DPLL plan aiming at the given frequency.  The frequency itself
/// is not validated against the BAW window.
pub fn baw_plan_for_freq(target: &Target, freq_aim: &Freq) -> DpllPlan {
    let mut best: Option<DpllPlan> = None;
    let mut fallback: Option<DpllPlan> = None;
    let ratio = freq_aim / &target.reference;
    for pre_div in 2..=17u32 {
        let fb_div_target = &ratio / int_freq(2 * i64::from(pre_div));
        let fb_div = limit_denominator(
            &fb_div_target,
            &(fb_den_limit() - BigInt::one()),
        );
        let plan = DpllPlan {
            baw: &target.reference
                * int_freq(2 * i64::from(pre_div))
                * &fb_div,
            baw_target: freq_aim.clone(),
            reference: target.reference.clone(),
            pll1_pfd: target.pll1_pfd.clone(),
            ref_div: 1,
            fb_prediv: pre_div,
            fb_div,
        };
        if plan.baw == *freq_aim {
            return plan; // Exact is good enough.
        }
        // An inexact ΣΔ fraction too close to an integer is degenerate;
        // skip it unless nothing else turns up.
        if fraction_degenerate(&plan.fb_div) {
            if fallback.as_ref().map_or(true, |b| plan.quality_cmp(b).is_lt()) {
                fallback = Some(plan);
            }
            continue;
        }
        if best.as_ref().map_or(true, |b| plan.quality_cmp(b).is_lt()) {
            best = Some(plan);
        }
    }
    match best.or(fallback) {
        Some(plan) => plan,
        None => unreachable!("some pre-divider always yields a plan"),
    }
}

/// Is the fractional part of the ΣΔ divider within 1/8 of an integer?
fn fraction_degenerate(fb_div: &Freq) -> bool {
    let fract = fb_div - fb_div.floor();
    fract < freq(1, 8) || fract > freq(7, 8)
}

/// If there is exactly one multiple of `f` in the BAW window, return it.
pub fn single_baw_mult(f: &Freq) -> Option<BigInt> {
    let m = ceil_div(&baw_low(), f);
    if m == floor_div(&baw_high(), f) {
        Some(m)
    } else {
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

/// Brute force an exact low-frequency plan out of the BAW, assuming the
/// stage2 divider is needed.  Speed comes from skipping the song and
/// dance needed for approximation: the first divider chain whose ΣΔ
/// denominator fits is taken as-is.
fn baw_plan_low_exact(target: &Target, f: &Freq) -> Option<DpllPlan> {
    for stage1 in 6..=256i64 {
        let base = f * int_freq(stage1);
        for prediv in 2..=17u32 {
            let post_fb_div =
                &target.reference * int_freq(2 * i64::from(prediv));
            let fb_base = &base / &post_fb_div;
            for stage2 in sym_range(&base, &baw_low(), &baw_high(), 1 << 24) {
                let fb_div = &fb_base * int_freq(stage2 as i64);
                if *fb_div.denom() < fb_den_limit() {
                    let baw = &post_fb_div * &fb_div;
                    debug_assert!(
                        baw == f * int_freq(stage1) * int_freq(stage2 as i64)
                    );
                    return Some(DpllPlan {
                        baw_target: baw.clone(),
                        baw,
                        reference: target.reference.clone(),
                        pll1_pfd: target.pll1_pfd.clone(),
                        ref_div: 1,
                        fb_prediv: prediv,
                        fb_div,
                    });
                }
            }
        }
    }
    None
}

/// Bounded approximate search: no exact solution exists, so try the best
/// of a window of multipliers around the nominal mid-point.
fn baw_plan_low_approx(target: &Target, f: &Freq) -> Option<DpllPlan> {
    let half_range = BigInt::from(1000);
    let mut best: Option<DpllPlan> = None;
    // Relative error |baw − m·f| / f of the best plan so far.
    let mut error = baw_high();
    let start = ceil_div(&baw_low(), f);
    let end = floor_div(&baw_high(), f);
    let mid = floor_div(&baw_freq(), f);
    let end = end.min(&mid + &half_range).min(BigInt::one() << 32);
    let start = start.max(&end - BigInt::from(2) * &half_range);
    for prediv in 2..=17u32 {
        let ref_mult = &target.reference * int_freq(2 * i64::from(prediv));
        let ratio_target = f / &ref_mult;
        let mut m = start.clone();
        while m <= end {
            let fb_div = limit_denominator(
                &(&ratio_target * Freq::from_integer(m.clone())),
                &fb_den_limit(),
            );
            let baw = &fb_div * &ref_mult;
            let target_baw = f * Freq::from_integer(m.clone());
            let e = (&baw - &target_baw).abs() / f;
            if e < error
                && m.to_u64()
                    .and_then(|m| output_divider(BIG_DIVIDE, m))
                    .is_some()
            {
                error = e;
                best = Some(DpllPlan {
                    baw,
                    baw_target: target_baw,
                    reference: target.reference.clone(),
                    pll1_pfd: target.pll1_pfd.clone(),
                    ref_div: 1,
                    fb_prediv: prediv,
                    fb_div,
                });
            }
            m += BigInt::one();
        }
    }
    best
}

fn baw_plan_low(target: &Target, f: &Freq) -> Option<DpllPlan> {
    tracing::debug!(freq = %rational::format_freq(f),
                    "try BAW low-frequency exact brute force");
    if let Some(exact) = baw_plan_low_exact(target, f) {
        return Some(exact);
    }
    tracing::debug!("try BAW low-frequency inexact brute force");
    baw_plan_low_approx(target, f)
}

/// Pick the best BAW frequency for the target.
pub fn dpll_plan(target: &Target) -> Result<DpllPlan, PlanError> {
    // An explicit BAW base constraint takes priority.
    if let Some(base) = &target.pll1_base {
        let m = single_baw_mult(base)
            .ok_or_else(|| PlanError::BawMultipleNotInRange(base.clone()))?;
        return Ok(baw_plan_for_freq(target, &(base * Freq::from_integer(m))));
    }

    let mut default = baw_plan_for_freq(target, &baw_freq());
    default.baw_target = default.baw.clone();

    // Vote for BAW frequencies that are unique in-window multiples of a
    // requested output.
    let mut counts: Vec<(Freq, u32)> = Vec::new();
    for (i, f) in target.freqs.iter().enumerate() {
        if f.is_zero() || target.force_pll2(f) {
            continue;
        }

        if is_multiple_of(&default.baw, f)
            && crate::target::divider_for(i, &default.baw, f).is_some()
        {
            // If the default BAW frequency works for anything, use it.
            return Ok(default);
        }

        if let Some(m) = single_baw_mult(f) {
            if m.to_u64().and_then(|m| output_divider(i, m)).is_some() {
                let baw = f * Freq::from_integer(m);
                match counts.iter().position(|(b, _)| *b == baw) {
                    Some(found) => counts[found].1 += 1,
                    None => counts.push((baw, 1)),
                }
            }
        }
    }

    // Re-assess the big-divide output: a candidate that also divides
    // down to it earns an extra vote.
    let bd = target.freq(BIG_DIVIDE);
    if !bd.is_zero() && !target.force_pll2(&bd) {
        let m1 = ceil_div(&baw_low(), &bd);
        let m2 = floor_div(&baw_high(), &bd);
        if m1 < m2 {
            for (baw, count) in &mut counts {
                if crate::target::divider_for(BIG_DIVIDE, baw, &bd).is_some() {
                    *count += 1;
                }
            }
        }
    }

    if counts.is_empty() {
        // Nothing divides uniquely out of the BAW window.  A sufficiently
        // low big-divide frequency is still worth a dedicated search.
        if !bd.is_zero()
            && !target.force_pll2(&bd)
            && bd <= baw_high() - baw_low()
        {
            if let Some(plan) = baw_plan_low(target, &bd) {
                return Ok(plan);
            }
        }
        return Ok(default);
    }

    // Most votes first; equal votes resolved by the higher frequency.
    counts.sort_by(|(fa, ca), (fb, cb)| cb.cmp(ca).then_with(|| fb.cmp(fa)));

    let mut best: Option<DpllPlan> = None;
    for (f, _) in &counts {
        let plan = baw_plan_for_freq(target, f);
        if best.as_ref().map_or(true, |b| plan.quality_cmp(b).is_lt()) {
            best = Some(plan);
        }
    }
    match best {
        Some(plan) => Ok(plan),
        None => unreachable!("candidate list was checked non-empty"),
    }
}
