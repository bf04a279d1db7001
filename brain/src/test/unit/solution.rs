use axion_hal::{Chip, GeoAttr};
use axion_ir::{DType, Geometry, LayerParams, MAX_DIMS, OpType, TensorView, Toggle};

use crate::perf::Brain;
use crate::solution::PerforationDim;
use crate::test::common::{bgemm_params, dedw_params, large_fwd_params, undecided};

const UNIT_GRANULARITY: [u64; MAX_DIMS] = [1; MAX_DIMS];

fn brain() -> Brain {
    Brain::new(Chip::Gaudi2)
}

#[test]
fn test_undecided_bgemm_yields_one_solution_per_geometry() {
    let p = undecided(bgemm_params());
    let solutions = brain().solutions(&p, &UNIT_GRANULARITY, &[]).unwrap();
    assert_eq!(solutions.len(), 4);
    for s in &solutions {
        assert!(s.strategy.geometry.is_some());
        assert!(s.strategy.pattern.is_some());
        assert!(s.perf.expected_runtime_cycles > 0.0);
        assert!(!s.requirements.cd_sliced);
    }
}

#[test]
fn test_previous_solutions_are_not_reproduced() {
    let p = undecided(bgemm_params());
    let brain = brain();
    let first = brain.solutions(&p, &UNIT_GRANULARITY, &[]).unwrap();
    assert!(!first.is_empty());
    let again = brain.solutions(&p, &UNIT_GRANULARITY, &first).unwrap();
    assert!(again.is_empty());

    // Seeding only part of the set yields exactly the rest.
    let rest = brain.solutions(&p, &UNIT_GRANULARITY, &first[..1]).unwrap();
    assert_eq!(rest.len(), first.len() - 1);
}

#[test]
fn test_forced_strategy_narrows_the_enumeration() {
    let solutions = brain().solutions(&bgemm_params(), &UNIT_GRANULARITY, &[]).unwrap();
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].strategy.geometry, Some(Geometry::TwoXw));
}

#[test]
fn test_multipliers_are_one_geometry_step_in_granularity_units() {
    let p = bgemm_params();
    let solutions = brain().solutions(&p, &UNIT_GRANULARITY, &[]).unwrap();
    // 512x256 tile, no batch concurrency: one step per dim.
    assert_eq!(solutions[0].multipliers, [512, 256, 1, 1, 1]);

    let granularity = [128, 64, 1, 1, 1];
    let solutions = brain().solutions(&p, &granularity, &[]).unwrap();
    assert_eq!(solutions[0].multipliers, [4, 4, 1, 1, 1]);
}

#[test]
fn test_dedw_concurrency_modes_deduplicate() {
    // Four toggle combinations; hybrid collapses onto the cd mode because
    // cd concurrency suppresses the batch fold.
    let solutions = brain().solutions(&dedw_params(), &UNIT_GRANULARITY, &[]).unwrap();
    assert_eq!(solutions.len(), 3);

    let cd = solutions
        .iter()
        .find(|s| s.strategy.cd_concurrency_en.is_on() && !s.strategy.batch_concurrency_en.is_on())
        .unwrap();
    // Non-deterministic cd concurrency reduces in memory onto a zeroed
    // output.
    assert!(cd.requirements.performs_reduction);
    assert!(cd.requirements.requires_memset);
    assert!(!cd.requirements.cd_sliced);

    let batch = solutions
        .iter()
        .find(|s| s.strategy.batch_concurrency_en.is_on() && !s.strategy.cd_concurrency_en.is_on())
        .unwrap();
    assert!(!batch.requirements.performs_reduction);
    // Two filter rows per geometry along the concurrent dim.
    assert_eq!(batch.multipliers[3], 2);
}

#[test]
fn test_deep_gemm_gets_cd_split_variants() {
    let mut p = bgemm_params();
    p.x.sizes[0] = 2048;
    p.w.sizes[1] = 2048;
    let solutions = brain().solutions(&p, &UNIT_GRANULARITY, &[]).unwrap();
    assert_eq!(solutions.len(), 2);

    let split = solutions.iter().find(|s| s.requirements.cd_sliced).unwrap();
    assert!(split.requirements.performs_reduction);
    // fp32 output accumulates in place; no cast step needed.
    assert!(!split.requirements.requires_cast);
}

#[test]
fn test_cd_split_needs_a_reducible_output() {
    let mut p = bgemm_params();
    p.x.sizes[0] = 2048;
    p.w.sizes[1] = 2048;
    for view in [&mut p.x, &mut p.w, &mut p.y] {
        view.dtype = DType::Fp8e4m3;
    }
    let solutions = brain().solutions(&p, &UNIT_GRANULARITY, &[]).unwrap();
    assert!(solutions.iter().all(|s| !s.requirements.cd_sliced));
}

#[test]
fn test_cd_split_with_narrow_output_requires_a_cast() {
    let mut p = bgemm_params();
    p.x.sizes[0] = 2048;
    p.w.sizes[1] = 2048;
    for view in [&mut p.x, &mut p.w, &mut p.y] {
        view.dtype = DType::Bf16;
    }
    let solutions = brain().solutions(&p, &UNIT_GRANULARITY, &[]).unwrap();
    let split = solutions.iter().find(|s| s.requirements.cd_sliced).unwrap();
    assert!(split.requirements.requires_cast);
}

#[test]
fn test_inflation_hints_for_a_sliced_conv() {
    let solutions = brain().solutions(&large_fwd_params(), &UNIT_GRANULARITY, &[]).unwrap();
    let req = &solutions[0].requirements;
    // Spatial dims and the conv batch dim can regain utilization.
    assert_eq!(req.utilization_inflation_dims.as_slice(), &[1, 2, 3, 4]);
    // A raster walk over 1200 fcd re-reads B per fcd step.
    assert_eq!(req.bw_inflation_dim, Some(0));
}

#[test]
fn test_perforation_follows_the_geometry_shape() {
    let brain = Brain::new(Chip::Gaudi3);
    let mut p = large_fwd_params();

    p.strategy.geometry = Some(Geometry::FourXw);
    let geo = GeoAttr::new(Chip::Gaudi3, &p);
    assert_eq!(brain.perforation_dim(&p, &geo), Some(PerforationDim::Fcd));

    p.strategy.geometry = Some(Geometry::FourXh);
    let geo = GeoAttr::new(Chip::Gaudi3, &p);
    assert_eq!(brain.perforation_dim(&p, &geo), Some(PerforationDim::Batch));
}

#[test]
fn test_gemm_perforates_the_fcd_tiling_first() {
    let brain = Brain::new(Chip::Gaudi3);
    let mut p = LayerParams::new(
        OpType::Ab,
        TensorView::contiguous(DType::Bf16, [128, 2048, 1, 1, 1]),
        TensorView::contiguous(DType::Bf16, [4096, 128, 1, 1, 1]),
        TensorView::contiguous(DType::Bf16, [4096, 2048, 1, 1, 1]),
    );
    p.strategy.geometry = Some(Geometry::FourXw);
    let geo = GeoAttr::new(Chip::Gaudi3, &p);
    // Eight units side by side cover all four dcores.
    assert_eq!(brain.perforation_dim(&p, &geo), Some(PerforationDim::Fcd));

    p.strategy.geometry = Some(Geometry::FourXh);
    let geo = GeoAttr::new(Chip::Gaudi3, &p);
    assert_eq!(brain.perforation_dim(&p, &geo), Some(PerforationDim::Spatial));
}

#[test]
fn test_single_dcore_chips_never_perforate() {
    let solutions = brain().solutions(&large_fwd_params(), &UNIT_GRANULARITY, &[]).unwrap();
    assert!(solutions.iter().all(|s| s.requirements.perforation.is_none()));
}

#[test]
fn test_inflation_grows_the_slice_to_the_target() {
    // A 64-row slice of the 256-row output fills a quarter of the
    // geometry; growing in 64-row steps reaches full fill at 256.
    let p = bgemm_params();
    let mut slice = p.clone();
    slice.y.sizes[1] = 64;
    assert!(brain().inflate_for_utilization(&p, &mut slice, 1, 0.9, 64));
    assert_eq!(slice.y.sizes[1], 256);
}

#[test]
fn test_inflation_stops_at_the_full_extent() {
    // The full 600-row conv output tops out below 0.99; inflation gives
    // up at the full extent instead of looping.
    let p = large_fwd_params();
    let mut slice = p.clone();
    slice.y.sizes[1] = 100;
    assert!(!brain().inflate_for_utilization(&p, &mut slice, 1, 0.99, 100));
    assert_eq!(slice.y.sizes[1], 600);
}

#[test]
fn test_dedw_cd_concurrency_perforates_the_cd() {
    let brain = Brain::new(Chip::Gaudi3);
    let mut p = dedw_params();
    p.strategy.cd_concurrency_en = Toggle::On;
    let geo = GeoAttr::new(Chip::Gaudi3, &p);
    // All eight units stack on the common dim, covering the dcores.
    assert_eq!(brain.perforation_dim(&p, &geo), Some(PerforationDim::Cd));
}
