use test_case::test_case;

use crate::dtype::DType;
use crate::op::{Operand, OperandRole, OpType};
use crate::params::LayerParams;
use crate::strategy::WalkPattern;
use crate::view::TensorView;

/// Dense fwd convolution: x=[C,W,H,D,B], w=[K,C,S,R,Q], y=[K,W,H,D,B].
fn fwd_params() -> LayerParams {
    LayerParams::new(
        OpType::Fwd,
        TensorView::contiguous(DType::Bf16, [16, 28, 28, 1, 1]),
        TensorView::contiguous(DType::Bf16, [64, 16, 3, 3, 1]),
        TensorView::contiguous(DType::Bf16, [64, 28, 28, 1, 1]),
    )
}

/// Dense ab bgemm with batches: x=[CD,M,B..], w=[K,CD,B..], y=[K,M,B..].
fn bgemm_params(b_batch0: u64) -> LayerParams {
    LayerParams::new(
        OpType::Ab,
        TensorView::contiguous(DType::Fp32, [128, 256, 8, 2, 1]),
        TensorView::contiguous(DType::Fp32, [512, 128, b_batch0, 2, 1]),
        TensorView::contiguous(DType::Fp32, [512, 256, 8, 2, 1]),
    )
}

#[test]
fn test_fwd_sizes() {
    let p = fwd_params();
    assert_eq!(p.fcd_size(), 64);
    assert_eq!(p.spatial_size(), 28 * 28);
    assert_eq!(p.batch_size(1), 1);
    // CD = C * S * R * Q regardless of lowering.
    assert_eq!(p.cd_size(), 16 * 3 * 3);
}

#[test]
fn test_fwd_lowering() {
    let p = fwd_params();
    // Dense layout, unit dilation: the filter can be lowered.
    assert!(p.can_lower());
    assert_eq!(p.single_gemm_cd(), 16 * 3);

    let mut strided = fwd_params();
    strided.x.strides[1] += 8;
    assert!(!strided.can_lower());
    assert_eq!(strided.single_gemm_cd(), 16);
}

#[test]
fn test_bgemm_sizes_without_flattening() {
    let p = bgemm_params(8);
    assert!(!p.can_flatten());
    assert_eq!(p.cd_size(), 128);
    assert_eq!(p.spatial_size(), 256);
    assert_eq!(p.batch_size(1), 8 * 2);
    assert_eq!(p.batch_size(2), 4 * 2);
}

#[test]
fn test_bgemm_flattening_conditions() {
    // Broadcast first batch dim of B: the batch can fold into spatial.
    let p = bgemm_params(1);
    assert!(p.can_flatten());
    assert_eq!(p.spatial_size(), 256 * 8);
    assert_eq!(p.batch_size(1), 2);

    let mut off = bgemm_params(1);
    off.strategy.flatten_en = false;
    assert!(!off.can_flatten());
}

#[test]
fn test_dedx_operand_swap() {
    let mut p = fwd_params();
    p.op = OpType::Dedx;
    assert_eq!(p.op.role_of(Operand::C), OperandRole::X);
    // For dedx the output is x, so fcd comes from x.
    assert_eq!(p.fcd_size(), 16);
    assert_eq!(p.cd_size(), 64 * 3 * 3);
}

#[test_case(OpType::Ab, false, WalkPattern::Fck; "ab_right_first")]
#[test_case(OpType::Ab, true, WalkPattern::Fkc; "ab_down_first")]
#[test_case(OpType::Dedw, true, WalkPattern::Kfc; "dedw_down_first")]
#[test_case(OpType::Fwd, false, WalkPattern::Skf; "fwd_right_first")]
#[test_case(OpType::Dedx, true, WalkPattern::Ksf; "dedx_down_first")]
fn test_set_pattern(op: OpType, down_first: bool, expected: WalkPattern) {
    let mut p = fwd_params();
    p.op = op;
    p.set_pattern(down_first);
    assert_eq!(p.strategy.pattern, Some(expected));
}

#[test]
fn test_verify_rejects_bad_views() {
    let mut p = fwd_params();
    p.w.strides[0] = 2;
    assert!(p.verify().is_err());

    let mut p = fwd_params();
    p.x.sizes[1] = 0;
    assert!(p.verify().is_err());

    let mut p = fwd_params();
    p.conv.stride[1] = 0;
    assert!(p.verify().is_err());

    assert!(fwd_params().verify().is_ok());
}
