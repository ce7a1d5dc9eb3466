//! Top-level frequency planning: route each requested output onto a PLL
//! path, plan the DPLL and PLL2, and reconcile the two.

use crate::consts::{pll2_low, BIG_DIVIDE, FPD_DIVIDE, NUM_OUTPUTS, SMALL_HZ};
use crate::dpll::{baw_plan_for_freq, dpll_plan};
use crate::error::PlanError;
use crate::pll2::{pll2_plan, pll2_plan_low, PllPlan};
use crate::target::Target;
use num_traits::Zero;
use rational::{convergents, fract_lcm_opt, int_freq, Freq};

/// Plan the whole device for a target.
///
/// Classification per output: anything that divides exactly off the BAW
/// stays on PLL1 (unless a PLL2 base constraint claims it); whatever is
/// left must fit PLL2's divider range, with the big-divide output allowed
/// all the way down.
pub fn plan(target: &Target) -> Result<PllPlan, PlanError> {
    let dpll = dpll_plan(target)?;

    let zero = Freq::zero();
    let mut pll1 = vec![zero.clone(); NUM_OUTPUTS];
    let mut pll2 = vec![zero.clone(); NUM_OUTPUTS];
    for i in 0..NUM_OUTPUTS {
        let f = target.freq(i);
        if f.is_zero() {
            continue;
        }
        if !target.force_pll2(&f) && dpll.pll1_divider(i, &f).is_some() {
            pll1[i] = f;
        } else if i == BIG_DIVIDE || f >= pll2_low() / int_freq(7 * 256) {
            pll2[i] = f;
        } else {
            return Err(PlanError::Unachievable(f, i));
        }
    }

    // LCM over the PLL2-path outputs, folding in the base constraint.
    let mut lcm = None;
    for f in pll2.iter().filter(|f| !f.is_zero()) {
        lcm = fract_lcm_opt(lcm, f);
    }
    if lcm.is_some() {
        if let Some(base) = &target.pll2_base {
            lcm = fract_lcm_opt(lcm, base);
        }
    }

    let mut plan = match lcm {
        None => PllPlan::pll2_off(dpll.clone()),
        Some(lcm) => {
            let planned = if lcm >= int_freq(SMALL_HZ) {
                pll2_plan(&dpll, &pll2, &lcm)?
            } else {
                pll2_plan_low(&dpll, &pll2, &pll2[BIG_DIVIDE])?
            };
            // Only reconcile when no output hangs off the BAW: moving the
            // BAW would break those.
            if pll1.iter().all(Zero::is_zero) {
                rejig(target, planned)
            } else {
                planned
            }
        }
    };

    add_pll1(&mut plan, &pll1)?;
    Ok(plan)
}

/// Trade a slightly off-nominal BAW for an exact PLL2.
///
/// When PLL2 missed its target, walk the convergents of the multiplier
/// and retry DPLL planning against the BAW frequency each convergent
/// implies.  Any retry that lands the exact product wins under the plan
/// ordering and is adopted.
fn rejig(target: &Target, plan: PllPlan) -> PllPlan {
    if plan.pll2_target.is_zero() || plan.pll2 == plan.pll2_target {
        return plan;
    }
    tracing::debug!("PLL2 off target, retrying DPLL against convergents");
    let mut best = plan;
    let original = best.multiplier.clone();
    for mult in convergents(&original) {
        if mult.is_zero() {
            continue;
        }
        let baw_target =
            &best.pll2_target * int_freq(FPD_DIVIDE) / &mult;
        if baw_target < crate::consts::baw_low()
            || baw_target > crate::consts::baw_high()
        {
            continue;
        }
        let dpll = baw_plan_for_freq(target, &baw_target);
        let pll2 = dpll.pll2_pfd() * &mult;
        // An inexact DPLL retry can push the VCO over a range edge.
        if pll2 < pll2_low() || pll2 > crate::consts::pll2_high() {
            continue;
        }
        let candidate = PllPlan {
            dpll,
            pll2,
            pll2_target: best.pll2_target.clone(),
            multiplier: mult,
            dividers: best.dividers.clone(),
        };
        if candidate.quality_cmp(&best).is_lt() {
            best = candidate;
        }
    }
    best
}

/// Fill the divider entries for the PLL1-path outputs.
fn add_pll1(plan: &mut PllPlan, freqs: &[Freq]) -> Result<(), PlanError> {
    for (i, f) in freqs.iter().enumerate() {
        if f.is_zero() {
            continue;
        }
        let (s1, s2) = plan
            .dpll
            .pll1_divider(i, f)
            .ok_or_else(|| PlanError::Unachievable(f.clone(), i))?;
        plan.dividers[i] = (0, s1, s2);
    }
    Ok(())
}
