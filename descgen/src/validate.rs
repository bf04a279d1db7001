//! Pre-compilation parameter validation.
//!
//! This is the single externally observable pre-check: every unsupported
//! parameter combination is rejected here, before decomposition or
//! descriptor construction touch the operation.

use axion_ir::{DType, Geometry, LayerParams, OpType, Operand, RoundingMode, SignalingMode};
use snafu::{ResultExt, ensure};

use crate::error::{
    CdConcurrencyNeedsReductionSnafu, Fp8OutputReductionSnafu, InvalidMemcpyGeometrySnafu, InvalidMmeLimitSnafu,
    InvalidRoundingSnafu, MaskedBgemmUnsupportedSnafu, MixedPrecisionSnafu, PackingStrideMismatchSnafu, ParamsSnafu,
    Result, SignalPartialUnsupportedSnafu, SignalingSquashMismatchSnafu, StrategyOpMismatchSnafu,
    TransposedDedxStridesSnafu,
};

/// Check one operation against every supported-combination rule.
pub fn validate_params(params: &LayerParams) -> Result<()> {
    params.verify().context(ParamsSnafu)?;

    let strategy = &params.strategy;
    let limit = strategy.mme_limit;
    ensure!(limit <= 8 && (limit == 0 || limit.is_power_of_two()), InvalidMmeLimitSnafu { limit });
    ensure!(!strategy.masked_bgemm, MaskedBgemmUnsupportedSnafu);
    ensure!(
        !strategy.signal_partial && params.controls.signaling_mode != SignalingMode::Partial,
        SignalPartialUnsupportedSnafu
    );

    validate_op_strategy(params)?;
    validate_dtypes(params)?;
    validate_signaling(params)?;
    validate_decomposition(params)?;
    Ok(())
}

fn validate_op_strategy(params: &LayerParams) -> Result<()> {
    let op = params.op;
    if op.is_dma() {
        // DMA moves data through the engine untouched; everything that
        // shapes a gemm is meaningless for it.
        ensure!(params.strategy.packing_factor <= 1, StrategyOpMismatchSnafu { field: "packing_factor", op });
        ensure!(
            !params.strategy.batch_concurrency_en.is_on() && !params.strategy.cd_concurrency_en.is_on(),
            StrategyOpMismatchSnafu { field: "concurrency", op }
        );
        ensure!(!params.strategy.lowering_en, StrategyOpMismatchSnafu { field: "lowering_en", op });
        if op == OpType::Memcpy {
            if let Some(geometry) = params.strategy.geometry {
                ensure!(
                    matches!(geometry, Geometry::FourXw | Geometry::TwoXw),
                    InvalidMemcpyGeometrySnafu { geometry }
                );
            }
        }
    }
    if params.strategy.packing_factor > 1 {
        ensure!(op == OpType::Dedx, StrategyOpMismatchSnafu { field: "packing_factor", op });
    }
    if params.strategy.dual_gemm {
        ensure!(op.is_gemm(), StrategyOpMismatchSnafu { field: "dual_gemm", op });
    }
    Ok(())
}

fn validate_dtypes(params: &LayerParams) -> Result<()> {
    let a = params.operand(Operand::A).dtype;
    let b = params.operand(Operand::B).dtype;
    let out = params.operand(Operand::C).dtype;

    let allowed_pair = a == b
        || matches!((a, b), (DType::Fp8e4m3, DType::Fp8e5m2) | (DType::Fp8e5m2, DType::Fp8e4m3))
        || matches!((a, b), (DType::Fp32, DType::Tf32) | (DType::Tf32, DType::Fp32));
    ensure!(allowed_pair, MixedPrecisionSnafu { a, b });

    let reduces = params.memory_cfg.reduction_en() || params.controls.atomic_add;
    ensure!(!(out.is_fp8() && reduces), Fp8OutputReductionSnafu { dtype: out });

    let stochastic = matches!(
        params.controls.conversion_rounding_mode,
        RoundingMode::StochasticRounding | RoundingMode::StochasticRoundingAndNearest
    );
    if stochastic {
        // Stochastic conversion exists to de-bias narrow outputs; a full
        // precision output never converts.
        ensure!(
            !matches!(out, DType::Fp32 | DType::Fp32Ieee),
            InvalidRoundingSnafu { mode: params.controls.conversion_rounding_mode, dtype: out }
        );
    }

    if params.strategy.cd_concurrency_en.is_on() {
        ensure!(params.memory_cfg.reduction_en(), CdConcurrencyNeedsReductionSnafu);
    }
    Ok(())
}

fn validate_signaling(params: &LayerParams) -> Result<()> {
    if params.controls.squash_io_rois {
        let mode = params.controls.signaling_mode;
        ensure!(mode == SignalingMode::Output, SignalingSquashMismatchSnafu { mode });
    }
    Ok(())
}

fn validate_decomposition(params: &LayerParams) -> Result<()> {
    let strides: u64 = params.conv.stride_product();
    if params.op == OpType::TransposedDedx {
        ensure!(strides == 1, TransposedDedxStridesSnafu { strides });
    }
    if params.op == OpType::Dedx && params.strategy.packing_factor > 1 {
        // Packing folds the whole stride unroll into one sub-problem; a
        // residual stride would silently drop work.
        ensure!(
            strides == params.strategy.packing_factor,
            PackingStrideMismatchSnafu { packing: params.strategy.packing_factor, strides }
        );
    }
    Ok(())
}
