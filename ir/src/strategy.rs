//! Execution strategy: geometry, walking pattern and optimization hints.
//!
//! Every field the caller leaves undecided (`None` / [`Toggle::Undef`]) is
//! filled in by the performance brain; the descriptor stage requires a fully
//! decided strategy.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Tile geometry: how the engine's ports are arranged into one output tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Geometry {
    /// Widest arrangement: all units side by side.
    FourXw,
    TwoXw,
    TwoXh,
    /// Tallest arrangement: all units stacked.
    FourXh,
}

/// Walking pattern: the nesting order of the fcd / spatial / non-spatial
/// loops. Letter order is outermost-first; `s` = spatial, `k`/`f`/`c` follow
/// the dedw/bgemm dimension naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum WalkPattern {
    // dedw / bgemm patterns
    Kfc,
    Fkc,
    Fck,
    Cfk,
    Kcf,
    Ckf,
    // fwd / dedx / dma patterns
    Ksf,
    Skf,
}

impl WalkPattern {
    /// Raster patterns walk the output row-major: the fcd loop is the
    /// innermost real loop.
    pub const fn is_raster(self) -> bool {
        matches!(self, Self::Skf | Self::Fck | Self::Cfk)
    }

    /// Whether this pattern belongs to the fwd/dedx spatial family.
    pub const fn is_spatial(self) -> bool {
        matches!(self, Self::Ksf | Self::Skf)
    }
}

/// Tri-state optimization toggle: the caller may force a mode on or off, or
/// leave the decision to the brain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Toggle {
    #[default]
    Off,
    On,
    Undef,
}

impl Toggle {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Strategy hints and decisions for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Selected geometry; `None` until the brain decides.
    pub geometry: Option<Geometry>,
    /// Selected walking pattern; `None` until the brain decides.
    pub pattern: Option<WalkPattern>,
    /// Generate descriptors for fewer engine units. 0 means all units.
    pub mme_limit: u64,
    /// Minimal number of descriptors requested per sub-view split.
    pub pipeline_level: u64,
    /// Dedx output-packing factor. 1 means unpacked.
    pub packing_factor: u64,
    /// Number of slices a reduction-add operation accumulates.
    pub reduction_level: u64,

    /// Allow lowering the filter into the common dimension (fwd, dedw,
    /// transposed dedx).
    pub lowering_en: bool,
    /// Allow store-buffer reuse between consecutive descriptors.
    pub sb_reuse: bool,
    /// All operand addresses are promised cache-line aligned.
    pub aligned_addresses: bool,
    /// Allow mapping a batch-like dedw to bgemm.
    pub dedw_as_bgemm_en: bool,
    /// Split fwd/transposed-dedx into sub-problems when the common-dim
    /// access pattern recurs misaligned against the cache line.
    pub recurring_misalignment_opt_en: bool,
    pub batch_concurrency_en: Toggle,
    pub cd_concurrency_en: Toggle,
    /// Deterministic accumulation order required.
    pub is_deterministic: bool,
    /// Flatten broadcast batch dims into the spatial dim when profitable.
    pub flatten_en: bool,
    /// Build a dual-gemm descriptor pair for this operation.
    pub dual_gemm: bool,
    /// Signal after every partial chunk. Unsupported; rejected by validation.
    pub signal_partial: bool,
    /// Memset the x pixels that no fwd window covers (dedx).
    pub memset_void_pixels: bool,
    /// Align dedx sub-problems to ease later padding patching.
    pub dedx_dynamic_padding: bool,
    /// Masked bgemm via auxiliary tensors. Unsupported; rejected by
    /// validation.
    pub masked_bgemm: bool,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            geometry: None,
            pattern: None,
            mme_limit: 0,
            pipeline_level: 1,
            packing_factor: 1,
            reduction_level: 1,
            lowering_en: true,
            sb_reuse: false,
            aligned_addresses: false,
            dedw_as_bgemm_en: false,
            recurring_misalignment_opt_en: false,
            batch_concurrency_en: Toggle::Off,
            cd_concurrency_en: Toggle::Off,
            is_deterministic: false,
            flatten_en: true,
            dual_gemm: false,
            signal_partial: false,
            memset_void_pixels: true,
            dedx_dynamic_padding: false,
            masked_bgemm: false,
        }
    }
}
