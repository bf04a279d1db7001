//! Shared operation fixtures.

use axion_ir::{DType, Geometry, LayerParams, OpType, TensorView, WalkPattern};

/// Dense fwd convolution with a 3x3 filter, ready for compilation:
/// x=[C,W,H,D,B], w=[K,C,S,R,Q], y=[K,W,H,D,B].
pub fn fwd_params() -> LayerParams {
    let mut p = LayerParams::new(
        OpType::Fwd,
        TensorView::contiguous(DType::Bf16, [16, 28, 28, 1, 1]),
        TensorView::contiguous(DType::Bf16, [64, 16, 3, 3, 1]),
        TensorView::contiguous(DType::Bf16, [64, 28, 28, 1, 1]),
    );
    p.strategy.geometry = Some(Geometry::TwoXw);
    p.strategy.pattern = Some(WalkPattern::Skf);
    p
}

/// Dedx with a configurable first-dimension stride.
pub fn dedx_params(stride0: u64) -> LayerParams {
    let mut p = LayerParams::new(
        OpType::Dedx,
        TensorView::contiguous(DType::Bf16, [16, 28, 28, 1, 1]),
        TensorView::contiguous(DType::Bf16, [64, 16, 3, 3, 1]),
        TensorView::contiguous(DType::Bf16, [64, 14, 28, 1, 1]),
    );
    p.conv.stride[0] = stride0;
    p.strategy.geometry = Some(Geometry::TwoXw);
    p.strategy.pattern = Some(WalkPattern::Skf);
    p
}

/// Batched ab gemm: x=[CD,M,B,1,1], w=[K,CD,B,1,1], y=[K,M,B,1,1].
pub fn bgemm_params() -> LayerParams {
    let mut p = LayerParams::new(
        OpType::Ab,
        TensorView::contiguous(DType::Fp32, [128, 256, 8, 1, 1]),
        TensorView::contiguous(DType::Fp32, [512, 128, 8, 1, 1]),
        TensorView::contiguous(DType::Fp32, [512, 256, 8, 1, 1]),
    );
    p.strategy.geometry = Some(Geometry::TwoXw);
    p.strategy.pattern = Some(WalkPattern::Fck);
    p
}

/// Pointwise fwd whose output overflows one geometry in both directions.
pub fn large_fwd_params() -> LayerParams {
    let mut p = LayerParams::new(
        OpType::Fwd,
        TensorView::contiguous(DType::Bf16, [16, 600, 1, 1, 1]),
        TensorView::contiguous(DType::Bf16, [1200, 16, 1, 1, 1]),
        TensorView::contiguous(DType::Bf16, [1200, 600, 1, 1, 1]),
    );
    p.strategy.geometry = Some(Geometry::TwoXw);
    p.strategy.pattern = Some(WalkPattern::Skf);
    p
}

/// Fwd whose operand-A row stride (24 bf16 elements) recurs misaligned
/// against the 64-element cache line: realignment period 8.
pub fn misaligned_fwd_params() -> LayerParams {
    let mut p = LayerParams::new(
        OpType::Fwd,
        TensorView::contiguous(DType::Bf16, [24, 64, 1, 1, 1]),
        TensorView::contiguous(DType::Bf16, [64, 24, 3, 1, 1]),
        TensorView::contiguous(DType::Bf16, [64, 64, 1, 1, 1]),
    );
    p.strategy.geometry = Some(Geometry::TwoXw);
    p.strategy.pattern = Some(WalkPattern::Skf);
    p.strategy.sb_reuse = true;
    p.strategy.recurring_misalignment_opt_en = true;
    p
}

/// Ab gemm whose 60000-element common dimension overflows the suspension
/// buffer: three accumulating partials per output tile under SB reuse.
pub fn deep_bgemm_params() -> LayerParams {
    let mut p = LayerParams::new(
        OpType::Ab,
        TensorView::contiguous(DType::Fp32, [60000, 256, 1, 1, 1]),
        TensorView::contiguous(DType::Fp32, [1024, 60000, 1, 1, 1]),
        TensorView::contiguous(DType::Fp32, [1024, 256, 1, 1, 1]),
    );
    p.strategy.geometry = Some(Geometry::TwoXw);
    p.strategy.pattern = Some(WalkPattern::Fck);
    p.strategy.sb_reuse = true;
    p
}

/// DMA copy through the engine.
pub fn memcpy_params() -> LayerParams {
    let mut p = LayerParams::new(
        OpType::Memcpy,
        TensorView::contiguous(DType::Bf16, [256, 64, 1, 1, 1]),
        TensorView::contiguous(DType::Bf16, [256, 64, 1, 1, 1]),
        TensorView::contiguous(DType::Bf16, [256, 64, 1, 1, 1]),
    );
    p.strategy.geometry = Some(Geometry::TwoXw);
    p.strategy.pattern = Some(WalkPattern::Fck);
    p.strategy.lowering_en = false;
    p
}
