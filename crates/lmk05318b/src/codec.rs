//! Translate a finished plan into register values and back.

use crate::consts::{CHANNEL_TAGS, FPD_DIVIDE, NUM_OUTPUTS};
use crate::dpll::{lock_counts, DpllPlan};
use crate::image::MaskedBytes;
use crate::pll2::PllPlan;
use crate::registers::must;
use crate::target::Target;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rational::{freq, int_freq, Freq};

/// BAW and DPLL frequency lock detectors compare VCO/24 cycle counts
/// against the doubled XO and the DPLL reference over these windows.
fn baw_lock_window() -> Freq {
    freq(192, 10_000) // 19.2 ms
}

fn dpll_lock_window() -> Freq {
    freq(96, 1000) // 96 ms
}

/// Derive the two live post-divider values from the plan, defaulting
/// unused slots to 2.
fn postdiv_pair(plan: &PllPlan) -> (u32, u32) {
    let mut p1 = 0;
    let mut p2 = 0;
    for &(pd, _, _) in &plan.dividers {
        if pd == 0 {
            continue;
        }
        if p1 == 0 {
            p1 = pd;
            p2 = pd;
        } else if pd != p1 && p2 == p1 {
            p2 = pd;
        } else {
            assert!(pd == p1 || pd == p2, "more than two post dividers");
        }
    }
    (if p1 == 0 { 2 } else { p1 }, if p2 == 0 { 2 } else { p2 })
}

/// Build the masked register image realising a plan.
pub fn freq_make_data(plan: &PllPlan) -> MaskedBytes {
    let mut data = MaskedBytes::new();

    let (p1, p2) = postdiv_pair(plan);
    data.insert(must("PLL2_P1"), u64::from(p1 - 1));
    data.insert(must("PLL2_P2"), u64::from(p2 - 1));

    for (i, &(pd, s1, s2)) in plan.dividers.iter().enumerate() {
        let t = CHANNEL_TAGS[i];
        let ch_pd = must(&format!("CH{t}_PD"));
        if s1 == 0 {
            data.insert(ch_pd, 1);
            continue;
        }
        data.insert(ch_pd, 0);
        // Source select: 1 taps the BAW, 2 and 3 the two post dividers.
        let mux = if pd == 0 {
            1
        } else if pd == p1 {
            2
        } else {
            assert!(pd == p2, "divider uses a dead post divider");
            3
        };
        data.insert(must(&format!("CH{t}_MUX")), mux);
        assert!((1..=256).contains(&s1));
        data.insert(must(&format!("OUT{t}_DIV")), u64::from(s1 - 1));
        if i == 5 {
            assert!((1..=1u64 << 24).contains(&u64::from(s2)));
            data.insert(must("OUT7_STG2_DIV"), u64::from(s2 - 1));
        } else {
            assert!(s2 == 1);
        }
    }

    // DPLL reference feedback chain.
    let dpll = &plan.dpll;
    data.insert(must("DPLL_PRIREF_RDIV"), u64::from(dpll.ref_div));
    data.insert(
        must("DPLL_REF_FB_PRE_DIV"),
        u64::from(dpll.fb_prediv - 2),
    );
    let div = dpll.fb_div.to_integer();
    let num = dpll.fb_div.numer() - &div * dpll.fb_div.denom();
    // Scale the fraction up to use the full 40 bits of precision.
    let scale: BigInt = ((BigInt::one() << 40) - BigInt::one()) / dpll.fb_div.denom();
    assert!(!scale.is_zero());
    data.insert(must("DPLL_REF_FB_DIV"), big_u64(&div));
    data.insert(must("DPLL_REF_NUM"), big_u64(&(num * &scale)));
    data.insert(must("DPLL_REF_DEN"), big_u64(&(dpll.fb_div.denom() * &scale)));

    // PLL1 feedback ratio.
    let (pll1_int, pll1_num) = dpll.pll1_ratio();
    data.insert(must("PLL1_NDIV"), pll1_int);
    data.insert(must("PLL1_NUM"), pll1_num);

    // Frequency lock detect counters.
    let vco24 = &dpll.baw / int_freq(24);
    let (n_low, n_high) =
        lock_counts(&dpll.pll1_pfd, &vco24, &baw_lock_window());
    data.insert(must("BAW_LOCK_CNTSTRT"), n_low);
    data.insert(must("BAW_LOCK_VCO_CNTSTRT"), n_high);
    data.insert(must("BAW_UNLK_CNTSTRT"), n_low);
    data.insert(must("BAW_UNLK_VCO_CNTSTRT"), n_high);
    let (n_low, n_high) =
        lock_counts(&dpll.reference, &vco24, &dpll_lock_window());
    data.insert(must("DPLL_REF_LOCKDET_CNTSTRT"), n_low);
    data.insert(must("DPLL_REF_LOCKDET_VCO_CNTSTRT"), n_high);
    data.insert(must("DPLL_REF_UNLOCKDET_VCO_CNTSTRT"), n_high);

    if plan.pll2_target.is_zero() {
        // PLL2 unused: power it down and stop it muting anything.
        data.insert(must("LOL_PLL2_MASK"), 1);
        data.insert(must("MUTE_APLL2_LOCK"), 0);
        data.insert(must("PLL2_PDN"), 1);
        return data;
    }

    data.insert(must("PLL2_PDN"), 0);
    data.insert(must("LOL_PLL2_MASK"), 0);
    data.insert(must("MUTE_APLL2_LOCK"), 1);

    let den = plan.multiplier.denom().clone();
    let int = plan.multiplier.numer().div_floor(&den);
    let mut num = plan.multiplier.numer().mod_floor(&den);
    let mut den_field = big_u64(&den);
    if plan.fixed_denom() {
        data.insert(must("APLL2_DEN_MODE"), 0);
        num = num * (BigInt::one() << 24) / &den;
        den_field = 0;
    } else {
        data.insert(must("APLL2_DEN_MODE"), 1);
    }
    data.insert(must("PLL2_NDIV"), big_u64(&int));
    data.insert(must("PLL2_NUM"), big_u64(&num));
    data.insert(must("PLL2_DEN"), den_field);

    // Canned reference-path and loop-filter values; the only PLL2 input
    // configuration we have filter settings for is BAW/18.
    data.insert(must("PLL2_RCLK_SEL"), 0);
    data.insert(must("PLL2_RDIV_PRE"), 0);
    data.insert(must("PLL2_RDIV_SEC"), 5);
    data.insert(must("PLL2_DISABLE_3RD4TH"), 15);
    data.insert(must("PLL2_CP"), 1);
    data.insert(must("PLL2_LF_R2"), 2);
    data.insert(must("PLL2_LF_C1"), 0);
    data.insert(must("PLL2_LF_R3"), 1);
    data.insert(must("PLL2_LF_R4"), 1);
    data.insert(must("PLL2_LF_C4"), 7);
    data.insert(must("PLL2_LF_C3"), 7);

    data
}

fn big_u64(v: &BigInt) -> u64 {
    match v.to_u64() {
        Some(v) => v,
        None => panic!("register value out of range: {v}"),
    }
}

/// Reconstruct the plan a register image encodes.
///
/// The inverse of [`freq_make_data`]: output frequencies, the BAW and
/// PLL2 frequencies, and the divider triples all come back exactly.
pub fn reverse_plan(data: &MaskedBytes, reference: &Freq) -> (Target, PllPlan) {
    let rdiv = data.extract(must("DPLL_PRIREF_RDIV"));
    assert!(rdiv != 0, "reference divider of zero");
    let prediv = data.extract(must("DPLL_REF_FB_PRE_DIV")) + 2;
    let fb_int = data.extract(must("DPLL_REF_FB_DIV"));
    let fb_num = data.extract(must("DPLL_REF_NUM"));
    let mut fb_den = data.extract(must("DPLL_REF_DEN"));
    if fb_den == 0 {
        fb_den = 1 << 40;
    }
    let fb_div = int_freq(fb_int as i64)
        + Freq::new(BigInt::from(fb_num), BigInt::from(fb_den));
    let baw = reference / int_freq(rdiv as i64)
        * int_freq(2)
        * int_freq(prediv as i64)
        * &fb_div;

    let dpll = DpllPlan {
        baw: baw.clone(),
        baw_target: baw.clone(),
        reference: reference.clone(),
        pll1_pfd: crate::consts::pll1_pfd_default(),
        ref_div: rdiv as u32,
        fb_prediv: prediv as u32,
        fb_div,
    };

    let p1 = data.extract(must("PLL2_P1")) as u32 + 1;
    let p2 = data.extract(must("PLL2_P2")) as u32 + 1;

    let pll2_used = data.extract(must("PLL2_PDN")) == 0;
    let (pll2, multiplier) = if pll2_used {
        let rdiv_pre = data.extract(must("PLL2_RDIV_PRE")) + 3;
        let rdiv_sec = data.extract(must("PLL2_RDIV_SEC")) + 1;
        assert!(
            rdiv_pre * rdiv_sec == FPD_DIVIDE as u64,
            "unsupported PLL2 reference divide"
        );
        let ndiv = data.extract(must("PLL2_NDIV"));
        let num = data.extract(must("PLL2_NUM"));
        let den = match data.extract(must("PLL2_DEN")) {
            0 => 1 << 24,
            den => den,
        };
        let multiplier = int_freq(ndiv as i64)
            + Freq::new(BigInt::from(num), BigInt::from(den));
        let pll2 = &baw / int_freq(FPD_DIVIDE) * &multiplier;
        (pll2, multiplier)
    } else {
        (Freq::zero(), Freq::zero())
    };

    let mut freqs = vec![Freq::zero(); NUM_OUTPUTS];
    let mut dividers = vec![(0u32, 0u32, 0u32); NUM_OUTPUTS];
    for (i, t) in CHANNEL_TAGS.iter().enumerate() {
        if data.extract(must(&format!("CH{t}_PD"))) != 0 {
            continue;
        }
        let mux = data.extract(must(&format!("CH{t}_MUX")));
        let s1 = data.extract(must(&format!("OUT{t}_DIV"))) as u32 + 1;
        let s2 = if *t == "7" {
            data.extract(must("OUT7_STG2_DIV")) as u32 + 1
        } else {
            1
        };
        let (pre, source) = match mux {
            2 => (p1, &pll2 / int_freq(i64::from(p1))),
            3 => (p2, &pll2 / int_freq(i64::from(p2))),
            _ => (0, baw.clone()),
        };
        dividers[i] = (pre, s1, s2);
        freqs[i] = source / int_freq(i64::from(s1) * i64::from(s2));
    }

    let target = Target { freqs, reference: reference.clone(), ..Target::default() };
    let plan = PllPlan {
        dpll,
        pll2_target: pll2.clone(),
        pll2,
        multiplier,
        dividers,
    };
    (target, plan)
}
