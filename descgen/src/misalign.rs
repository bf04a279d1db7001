//! Recurring-misalignment decomposition for fwd / transposed-dedx.
//!
//! These operations read operand A with an effective row stride of
//! `cd_row * conv_stride[0]` elements. When that stride is not a multiple
//! of the cache line, every activation straddles a line at the same offset
//! and wastes read bandwidth on every fetch. Splitting the output rows into
//! `lcm(cl, stride) / stride` interleaved sub-problems restores alignment:
//! within one sub-problem consecutive reads advance by a whole number of
//! cache lines.

use axion_hal::ChipCaps;
use axion_ir::helpers::{div_ceil, lcm};
use axion_ir::{LayerParams, OpType, Operand};

use crate::subproblem::{AddressOffset, sub_problem_size};

/// Effective element stride between consecutive spatial reads of A.
fn effective_stride(params: &LayerParams) -> u64 {
    params.operand(Operand::A).sizes[0] * params.conv.stride[0]
}

fn misalignment_period(caps: &ChipCaps, params: &LayerParams) -> u64 {
    let cl = caps.cache_line_elements(params.operand(Operand::A).dtype);
    let stride = effective_stride(params);
    if stride == 0 {
        return 1;
    }
    lcm(cl, stride) / stride
}

/// Whether the optimization applies to this operation at all.
pub fn can_apply(caps: &ChipCaps, params: &LayerParams) -> bool {
    if !params.strategy.recurring_misalignment_opt_en
        || !params.is_sb_reuse()
        || !params.strategy.lowering_en
        || !params.can_lower()
    {
        return false;
    }
    if !matches!(params.op, OpType::Fwd | OpType::TransposedDedx) {
        return false;
    }
    let cl = caps.cache_line_elements(params.operand(Operand::A).dtype);
    // A short common dimension never spans a full line; nothing to fix.
    if params.single_gemm_cd() <= cl {
        return false;
    }
    let n = misalignment_period(caps, params);
    n > 1 && n <= params.operand(Operand::C).sizes[1]
}

/// Number of sub-problems needed to realign the access pattern.
pub fn num_sub_problems(caps: &ChipCaps, params: &LayerParams) -> u64 {
    if can_apply(caps, params) { misalignment_period(caps, params) } else { 1 }
}

/// Element offset within a cache line at which sub-problem `idx` starts
/// reading. 0 for an already aligned pattern.
pub fn cut_point_per_sub_problem(caps: &ChipCaps, params: &LayerParams, idx: u64) -> u64 {
    let cl = caps.cache_line_elements(params.operand(Operand::A).dtype);
    (idx * effective_stride(params)) % cl
}

/// Specialize the parameters for sub-problem `idx` of `num`.
///
/// Sub-problem `idx` handles output rows `idx, idx + num, idx + 2*num, ...`
/// of the original operation. The returned address offsets are derived from
/// the original (pre-split) strides so descriptor patching can apply them
/// without re-deriving the split.
pub fn params_for_sub_problem(original: &LayerParams, num: u64, idx: u64) -> (LayerParams, AddressOffset) {
    let mut p = original.clone();
    let mut offset = AddressOffset::default();
    p.strategy.pipeline_level = div_ceil(p.strategy.pipeline_level.max(1), num);

    let a_role = original.op.role_of(Operand::A);
    let c_role = original.op.role_of(Operand::C);
    let a_row_step = idx * original.conv.stride[0];

    p.view_mut(a_role).bases[1] += a_row_step;
    p.view_mut(c_role).bases[1] += idx;
    p.conv.stride[0] *= num;

    let c_rows = original.view(c_role).sizes[1];
    p.view_mut(c_role).sizes[1] = sub_problem_size(c_rows, num, idx);

    *offset.view_mut(a_role) = {
        let mut o = [0i64; axion_ir::MAX_DIMS];
        o[1] = (a_row_step * original.view(a_role).strides[1]) as i64;
        o
    };
    *offset.view_mut(c_role) = {
        let mut o = [0i64; axion_ir::MAX_DIMS];
        o[1] = (idx * original.view(c_role).strides[1]) as i64;
        o
    };
    (p, offset)
}
