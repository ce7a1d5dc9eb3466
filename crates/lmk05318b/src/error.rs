//! Planning failures.

use rational::{format_freq, Freq};

/// A structured planning failure.  Planning never partially mutates
/// state: on error the caller has exactly what it started with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// The frequency fits neither PLL path on its channel.
    #[error("frequency {freq} is not achievable on output {1}", freq = format_freq(.0))]
    Unachievable(Freq, usize),

    /// An output frequency exceeds what the dividers can deliver.
    #[error("max frequency too high: {}", format_freq(.0))]
    MaxFrequencyTooHigh(Freq),

    /// No multiple of the required PLL2 base lands in the VCO range.
    #[error("PLL2 needs to be a multiple of {} which is not in range",
            format_freq(.0))]
    MultipleNotInRange(Freq),

    /// The bounded PLL2 sweep found no assignable post-divider pair.
    #[error("PLL2 planning failed, LCM = {}", format_freq(.0))]
    Pll2Failed(Freq),

    /// No multiple of the required BAW base lands in the BAW window.
    #[error("BAW needs to be a multiple of {} which is not in range",
            format_freq(.0))]
    BawMultipleNotInRange(Freq),
}
