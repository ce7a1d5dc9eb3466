//! Planner constants.  All frequencies are exact rationals in hertz.

use rational::{freq, int_freq, Freq};

/// Nominal BAW oscillator frequency.
pub const BAW_FREQ_HZ: i64 = 2_500_000_000;

/// Nominal BAW frequency as a rational.
pub fn baw_freq() -> Freq {
    int_freq(BAW_FREQ_HZ)
}

/// Lower edge of the BAW tuning window: nominal − 50 ppm.
pub fn baw_low() -> Freq {
    baw_freq() * freq(1_000_000 - 50, 1_000_000)
}

/// Upper edge of the BAW tuning window: nominal + 50 ppm.
pub fn baw_high() -> Freq {
    baw_freq() * freq(1_000_000 + 50, 1_000_000)
}

/// The crystal oscillator frequency.  It is doubled at the PLL1 PFD.
pub const XO_FREQ_HZ: i64 = 30_720_000;

/// Default PLL1 phase-frequency detector rate: the doubled XO.
pub fn pll1_pfd_default() -> Freq {
    int_freq(2 * XO_FREQ_HZ)
}

/// Default DPLL reference frequency (the GPS time-pulse rate).
pub const REF_FREQ_HZ: i64 = 8_844_582;

/// Default DPLL reference as a rational.
pub fn ref_freq() -> Freq {
    int_freq(REF_FREQ_HZ)
}

/// Fixed divider between the BAW and the PLL2 phase detector.  TICS Pro
/// only ever uses 18, which is also the only value we have loop filter
/// settings for; its purpose is to bring the ≈2500 MHz BAW under the
/// 150 MHz PLL2 PFD limit.
pub const FPD_DIVIDE: i64 = 18;

/// Official PLL2 VCO range per the datasheet.
pub const OFFICIAL_PLL2_LOW_HZ: i64 = 5_500_000_000;
/// See [`OFFICIAL_PLL2_LOW_HZ`].
pub const OFFICIAL_PLL2_HIGH_HZ: i64 = 6_250_000_000;

/// Extended PLL2 VCO range: pushed 110 MHz (÷2 at the lowest post
/// divider: 160 MHz of output head-room) past the official limits in each
/// direction, to cover all output frequencies up to 800 MHz.
pub const PLL2_LOW_HZ: i64 = 5_340_000_000;
/// See [`PLL2_LOW_HZ`].
pub const PLL2_HIGH_HZ: i64 = 6_410_000_000;

/// Extended range lower edge as a rational.
pub fn pll2_low() -> Freq {
    int_freq(PLL2_LOW_HZ)
}

/// Extended range upper edge as a rational.
pub fn pll2_high() -> Freq {
    int_freq(PLL2_HIGH_HZ)
}

/// PLL2 range mid-point.
pub fn pll2_mid() -> Freq {
    int_freq((PLL2_LOW_HZ + PLL2_HIGH_HZ) / 2)
}

/// Threshold below which an output LCM counts as "small" and the normal
/// brute-force PLL2 sweep becomes infeasible.
pub const SMALL_HZ: i64 = 50_000;

/// Brute-force sweeps are clamped to this many multipliers either side of
/// the range mid-point: (PLL2_HIGH − PLL2_LOW) / 2 / SMALL.
pub const MAX_HALF_RANGE: i64 = (PLL2_HIGH_HZ - PLL2_LOW_HZ) / 2 / SMALL_HZ;

/// Number of output channels the planner fills.
pub const NUM_OUTPUTS: usize = 6;

/// Index of the output with the second-stage divider, able to reach 1 Hz.
///
/// Channel numbering:
/// 0 = LMK 0,1; 1 = LMK 2,3; 2 = LMK 4; 3 = LMK 5 (U.Fl); 4 = LMK 6;
/// 5 = LMK 7, the big-divide output.
pub const BIG_DIVIDE: usize = 5;

/// Register-name tag for each planner channel.
pub const CHANNEL_TAGS: [&str; NUM_OUTPUTS] = ["0_1", "2_3", "4", "5", "6", "7"];
