//! Per-chip hardware constants.

use axion_ir::{DType, OpType};

/// Supported ASIC generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Chip {
    Gaudi,
    Gaudi2,
    Gaudi3,
}

/// Fixed capability constants of one chip generation.
///
/// Everything here is a property of the silicon, independent of the
/// operation being compiled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipCaps {
    /// Number of dcores the chip is partitioned into. Perforation splits
    /// work across these; chips with a single dcore never perforate.
    pub dcore_nr: u64,
    /// Number of MME units available to one operation.
    pub mme_nr: u64,
    /// Compute cores inside one MME unit.
    pub cores_per_mme: u64,
    /// Core clock in MHz, used only to convert cycles to microseconds.
    pub clk_freq_mhz: f64,
    pub cache_line_bytes: u64,
    /// Output-accumulation completion latency in cycles. A lower bound on
    /// the cost of any descriptor.
    pub rollup_latency: u64,
    /// Accumulator buffers per core.
    pub accums_nr: u64,
    /// Read bandwidth of a single input port, bytes per cycle.
    pub single_port_bw: f64,
    /// Height of the transpose engine in rows.
    pub te_height: u64,
    /// Suspension-buffer capacity behind one input port, in bytes.
    pub sb_size_bytes: u64,
}

impl Chip {
    pub const fn caps(self) -> ChipCaps {
        match self {
            Chip::Gaudi => ChipCaps {
                dcore_nr: 1,
                mme_nr: 4,
                cores_per_mme: 1,
                clk_freq_mhz: 1500.0,
                cache_line_bytes: 128,
                rollup_latency: 128,
                accums_nr: 2,
                single_port_bw: 12.8,
                te_height: 64,
                sb_size_bytes: 64 * 1024,
            },
            Chip::Gaudi2 => ChipCaps {
                dcore_nr: 1,
                mme_nr: 2,
                cores_per_mme: 2,
                clk_freq_mhz: 1750.0,
                cache_line_bytes: 128,
                rollup_latency: 256,
                accums_nr: 4,
                single_port_bw: 25.6,
                te_height: 64,
                sb_size_bytes: 96 * 1024,
            },
            Chip::Gaudi3 => ChipCaps {
                dcore_nr: 4,
                mme_nr: 8,
                cores_per_mme: 2,
                clk_freq_mhz: 1600.0,
                cache_line_bytes: 128,
                rollup_latency: 512,
                accums_nr: 4,
                single_port_bw: 51.2,
                te_height: 128,
                sb_size_bytes: 192 * 1024,
            },
        }
    }
}

impl ChipCaps {
    /// Elements of `dtype` that fit in one cache line.
    pub fn cache_line_elements(&self, dtype: DType) -> u64 {
        self.cache_line_bytes / dtype.size_bytes()
    }

    /// Minimal common-dimension slice alignment in elements. DMA operations
    /// have no common dimension and carry no alignment requirement.
    pub fn min_cd_alignment(&self, dtype: DType, op: OpType) -> u64 {
        if op.is_dma() { 1 } else { self.cache_line_elements(dtype) }
    }
}
