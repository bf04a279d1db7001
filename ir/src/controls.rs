//! Numeric and signaling controls.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Default exponent bias for fp8_152 inputs.
pub const EXPONENT_BIAS_FP8_152_15: u64 = 15;
/// Default exponent bias for fp8_143 outputs.
pub const EXPONENT_BIAS_FP8_143_7: u64 = 7;
/// The only valid exponent bias for ufp16.
pub const EXPONENT_BIAS_UFP16_31: u64 = 31;

/// Hardware rounding mode. Values are aligned to the register encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[repr(u8)]
pub enum RoundingMode {
    RoundToNearest = 0,
    RoundToZero = 1,
    RoundUp = 2,
    RoundDown = 3,
    StochasticRounding = 4,
    RoundAwayFromZero = 6,
    StochasticRoundingAndNearest = 7,
}

/// When a completion signal fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SignalingMode {
    None,
    /// Signal once, on the very last activation of the operation.
    Once,
    /// Signal on every descriptor.
    Desc,
    /// Signal on every descriptor that stores output.
    DescWithStore,
    /// Signal when the slowest real loop increments.
    Chunk,
    /// Signal whenever a full output tile is produced.
    Output,
    /// Signal after every partial chunk. Not supported by this engine.
    Partial,
    /// Signal at least the amount requested in the recipe.
    Amount,
}

/// How strictly infinities and NaNs are propagated for an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum InfNanMode {
    Full,
    NoInfNan,
    Minimal,
}

/// Per-operation numeric and signaling controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    /// EU (multiply-accumulate) rounding mode.
    pub rounding_mode: RoundingMode,
    /// Output-conversion rounding mode.
    pub conversion_rounding_mode: RoundingMode,
    /// Accumulator rounding mode.
    pub acc_rounding_mode: RoundingMode,
    pub signaling_mode: SignalingMode,
    /// Signals required per chunk in [`SignalingMode::Amount`].
    pub signal_amount: u64,
    /// Slave units signal independently of their master.
    pub slave_signaling: bool,
    /// Use the same color set for duplicated outputs.
    pub use_same_color_set: bool,
    /// Accumulate the output into memory instead of overwriting it.
    pub atomic_add: bool,
    /// Squash all IO ROIs into the first activation.
    pub squash_io_rois: bool,
    pub relu_en: bool,
    pub flush_denormals: bool,
    pub stochastic_flush: bool,
    pub sb_cache_en: bool,
    pub fp8_bias_in: u64,
    pub fp8_bias_in2: u64,
    pub fp8_bias_out: u64,
    pub inf_nan_mode_a: InfNanMode,
    pub inf_nan_mode_b: InfNanMode,
    pub inf_nan_mode_out: InfNanMode,
    pub clipping_en: bool,
    pub clip_inf_in: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            rounding_mode: RoundingMode::RoundToNearest,
            conversion_rounding_mode: RoundingMode::RoundToNearest,
            acc_rounding_mode: RoundingMode::RoundToZero,
            signaling_mode: SignalingMode::Output,
            signal_amount: 1,
            slave_signaling: false,
            use_same_color_set: true,
            atomic_add: false,
            squash_io_rois: false,
            relu_en: false,
            flush_denormals: false,
            stochastic_flush: false,
            sb_cache_en: true,
            fp8_bias_in: EXPONENT_BIAS_FP8_152_15,
            fp8_bias_in2: EXPONENT_BIAS_FP8_152_15,
            fp8_bias_out: EXPONENT_BIAS_FP8_143_7,
            inf_nan_mode_a: InfNanMode::Full,
            inf_nan_mode_b: InfNanMode::Full,
            inf_nan_mode_out: InfNanMode::Full,
            clipping_en: false,
            clip_inf_in: false,
        }
    }
}
