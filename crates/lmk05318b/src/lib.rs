//! Host-side core for the LMK05318b clock synthesiser.
//!
//! Three layers, in dependency order:
//!
//! - the **frequency planner** ([`plan`], [`dpll`], [`pll2`]): turn a
//!   list of requested output frequencies into a fully specified divider
//!   and feedback configuration, exactly when achievable;
//! - the **register codec** ([`registers`], [`image`], [`codec`]):
//!   translate plans to and from masked byte images of the chip's
//!   register map;
//! - the **device layer** ([`device`]): issue the images as bursts over
//!   an injected [`transport::Transport`], with read-modify-write for
//!   partially assigned bytes.
//!
//! Everything is synchronous and deterministic; the planner performs no
//! I/O at all.

pub mod codec;
pub mod consts;
pub mod device;
pub mod dpll;
pub mod error;
pub mod fields;
pub mod image;
pub mod plan;
pub mod pll2;
pub mod registers;
pub mod target;

pub use codec::{freq_make_data, reverse_plan};
pub use dpll::{dpll_plan, DpllPlan};
pub use error::PlanError;
pub use image::MaskedBytes;
pub use plan::plan;
pub use pll2::PllPlan;
pub use target::Target;
