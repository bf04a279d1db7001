use axion_hal::Chip;
use axion_ir::{DType, Geometry, OpType, RoundingMode, SignalingMode};
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parameter-validation failures.
///
/// Every variant is detected before any descriptor is built; the caller
/// must not proceed to decomposition or compilation on failure. Violations
/// of internal invariants (signal-count mismatch, missing sub-problem
/// context) are compiler bugs and panic instead.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The engine-unit limit must be a power of two, at most 8.
    #[snafu(display("mme limit {limit} is not a power of two up to 8"))]
    InvalidMmeLimit { limit: u64 },

    /// Masked bgemm needs auxiliary tensors this pipeline does not carry.
    #[snafu(display("masked bgemm is not supported"))]
    MaskedBgemmUnsupported,

    /// Signaling after every partial chunk is not supported by the engine.
    #[snafu(display("partial signaling is not supported"))]
    SignalPartialUnsupported,

    /// DMA strategy knobs on a compute operation, or the other way around.
    #[snafu(display("strategy field {field} does not apply to operation {op}"))]
    StrategyOpMismatch { field: &'static str, op: OpType },

    /// Memcpy streams through the wide geometries only.
    #[snafu(display("geometry {geometry} is not supported for memcpy"))]
    InvalidMemcpyGeometry { geometry: Geometry },

    /// Input element types must match or form an allowed mixed pair.
    #[snafu(display("input element types {a} and {b} cannot be mixed"))]
    MixedPrecision { a: DType, b: DType },

    /// The memory reduction unit cannot accumulate fp8 outputs.
    #[snafu(display("fp8 output {dtype} cannot be combined with memory reduction"))]
    Fp8OutputReduction { dtype: DType },

    /// Stochastic rounding applies only to narrow output types.
    #[snafu(display("rounding mode {mode} is invalid for output type {dtype}"))]
    InvalidRounding { mode: RoundingMode, dtype: DType },

    /// CD concurrency produces partial sums that must reduce through memory.
    #[snafu(display("cd concurrency requires a memory reduction op"))]
    CdConcurrencyNeedsReduction,

    /// ROI squashing is only coherent when signaling per output tile.
    #[snafu(display("roi squashing requires output signaling, got {mode}"))]
    SignalingSquashMismatch { mode: SignalingMode },

    /// Transposed dedx cannot be decomposed over convolution strides.
    #[snafu(display("transposed dedx with conv stride product {strides} needs sub-problems"))]
    TransposedDedxStrides { strides: u64 },

    /// Output packing assumes the stride-unrolling count collapses to 1.
    #[snafu(display("packing factor {packing} does not match conv stride product {strides}"))]
    PackingStrideMismatch { packing: u64, strides: u64 },

    /// This chip generation has no descriptor builder.
    #[snafu(display("no descriptor builder for chip {chip}"))]
    UnsupportedChip { chip: Chip },

    /// Structural view/shape error reported by the data model.
    #[snafu(display("malformed parameters: {source}"))]
    Params { source: axion_ir::Error },
}
