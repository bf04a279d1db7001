use axion_hal::Chip;
use axion_ir::Operand;
use test_case::test_case;

use crate::misalign::{can_apply, cut_point_per_sub_problem, num_sub_problems, params_for_sub_problem};
use crate::subproblem::decompose;
use crate::test::common::{fwd_params, misaligned_fwd_params};

#[test]
fn test_misaligned_fwd_splits_at_realignment_period() {
    let caps = Chip::Gaudi2.caps();
    let p = misaligned_fwd_params();
    // 24 bf16 elements per row against a 64-element cache line: the
    // pattern realigns after lcm(64, 24) / 24 = 8 rows.
    assert!(can_apply(&caps, &p));
    assert_eq!(num_sub_problems(&caps, &p), 8);
}

#[test_case(0, 0; "first_starts_aligned")]
#[test_case(1, 24; "second_straddles_at_24")]
#[test_case(2, 48; "third_straddles_at_48")]
#[test_case(3, 8; "fourth_wraps_to_8")]
fn test_cut_points(idx: u64, expected: u64) {
    let caps = Chip::Gaudi2.caps();
    let p = misaligned_fwd_params();
    assert_eq!(cut_point_per_sub_problem(&caps, &p, idx), expected);
}

#[test]
fn test_aligned_pattern_is_left_whole() {
    let caps = Chip::Gaudi2.caps();
    let mut p = misaligned_fwd_params();
    // A 64-element row advances by whole cache lines; cut point 0 means
    // the split must collapse to a single sub-problem.
    p.x.sizes[0] = 64;
    p.w.sizes[1] = 64;
    assert_eq!(cut_point_per_sub_problem(&caps, &p, 1), 0);
    assert_eq!(num_sub_problems(&caps, &p), 1);
}

#[test]
fn test_optimization_requires_opt_in() {
    let caps = Chip::Gaudi2.caps();

    let mut p = misaligned_fwd_params();
    p.strategy.recurring_misalignment_opt_en = false;
    assert_eq!(num_sub_problems(&caps, &p), 1);

    let mut p = misaligned_fwd_params();
    p.strategy.sb_reuse = false;
    assert_eq!(num_sub_problems(&caps, &p), 1);
}

#[test]
fn test_short_common_dim_never_splits() {
    let caps = Chip::Gaudi2.caps();
    // One gemm's common dim fits inside a single cache line.
    let mut p = fwd_params();
    p.strategy.sb_reuse = true;
    p.strategy.recurring_misalignment_opt_en = true;
    assert!(!can_apply(&caps, &p));
    assert_eq!(num_sub_problems(&caps, &p), 1);
}

#[test]
fn test_sub_problem_parameters() {
    let original = misaligned_fwd_params();
    let (p, offset) = params_for_sub_problem(&original, 8, 3);

    // Sub-problem 3 handles output rows 3, 11, 19, ...
    assert_eq!(p.x.bases[1], original.x.bases[1] + 3);
    assert_eq!(p.y.bases[1], original.y.bases[1] + 3);
    assert_eq!(p.conv.stride[0], 8);
    assert_eq!(p.y.sizes[1], 8);

    // Address offsets come from the original, pre-split strides.
    assert_eq!(offset.x[1], (3 * original.x.strides[1]) as i64);
    assert_eq!(offset.y[1], (3 * original.y.strides[1]) as i64);
}

#[test]
fn test_decompose_covers_all_output_rows() {
    let p = misaligned_fwd_params();
    let subs = decompose(Chip::Gaudi2, &p).unwrap();
    assert_eq!(subs.len(), 8);
    let rows: u64 = subs.iter().map(|s| s.params.operand(Operand::C).sizes[1]).sum();
    assert_eq!(rows, p.operand(Operand::C).sizes[1]);
}
