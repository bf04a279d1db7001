use axion_hal::{Chip, GeoAttr};
use axion_ir::SignalingMode;

use crate::recipe::Recipe;
use crate::test::common::{bgemm_params, fwd_params, large_fwd_params};

fn recipe_for(params: &axion_ir::LayerParams) -> Recipe {
    let geo = GeoAttr::new(Chip::Gaudi2, params);
    Recipe::new(&Chip::Gaudi2.caps(), &geo, params)
}

#[test]
fn test_small_output_splits_spatial_only() {
    let recipe = recipe_for(&fwd_params());
    assert_eq!(recipe.fcd_splits_nr(), 1);
    // 28x28 output rows against a 256-tall geometry: 256 + 256 + 256 + 16.
    assert_eq!(recipe.sp_splits_nr(), 4);
    assert_eq!(recipe.iterations_nr(), 4);
}

#[test]
fn test_subviews_cover_the_output() {
    // 1200 against a 512-wide geometry: 512 + 512 + 176.
    let recipe = recipe_for(&large_fwd_params());
    let sizes: Vec<u64> = recipe.fcd_subviews.iter().map(|s| s.size).collect();
    assert_eq!(sizes, vec![512, 512, 176]);
    assert_eq!(recipe.fcd_subviews[2].base, 1024);

    // 600 against a 256-tall geometry: 256 + 256 + 88.
    let sizes: Vec<u64> = recipe.sp_subviews.iter().map(|s| s.size).collect();
    assert_eq!(sizes, vec![256, 256, 88]);
}

#[test]
fn test_raster_walks_fcd_fastest() {
    let recipe = recipe_for(&large_fwd_params());
    assert!(recipe.raster);
    let order: Vec<(usize, usize)> = recipe.iter().map(|it| (it.fcd_idx, it.sp_idx)).collect();
    assert_eq!(order[0], (0, 0));
    assert_eq!(order[1], (1, 0));
    assert_eq!(order[3], (0, 1));
    assert_eq!(order.len(), 9);
}

#[test]
fn test_non_raster_walks_spatial_fastest() {
    let mut p = large_fwd_params();
    p.set_pattern(true);
    let recipe = recipe_for(&p);
    assert!(!recipe.raster);
    let order: Vec<(usize, usize)> = recipe.iter().map(|it| (it.fcd_idx, it.sp_idx)).collect();
    assert_eq!(order[0], (0, 0));
    assert_eq!(order[1], (0, 1));
    assert_eq!(order[3], (1, 0));
}

#[test]
fn test_first_and_last_flags() {
    let recipe = recipe_for(&large_fwd_params());
    let iterations: Vec<_> = recipe.iter().collect();
    assert!(iterations.first().unwrap().is_first);
    assert!(iterations.last().unwrap().is_last);
    assert_eq!(iterations.iter().filter(|it| it.is_first).count(), 1);
    assert_eq!(iterations.iter().filter(|it| it.is_last).count(), 1);
}

#[test]
fn test_batch_steps_fold_into_non_spatial() {
    let recipe = recipe_for(&bgemm_params());
    assert_eq!(recipe.batch_steps, 8);
    assert_eq!(recipe.non_spatial_nr(), 8);
    let batches: Vec<u64> = recipe.iter().map(|it| it.batch_idx).collect();
    assert_eq!(&batches[..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_sb_overflow_splits_partials() {
    // CD of 65536 * 3 bf16 elements against a 96KB SB: four partials.
    let mut p = large_fwd_params();
    p.x.sizes[0] = 65536;
    p.w.sizes[1] = 65536;
    p.w.sizes[2] = 3;
    p.strategy.sb_reuse = true;
    let recipe = recipe_for(&p);
    assert!(recipe.reuse_a);
    assert_eq!(recipe.partials_nr, 4);
    assert!(recipe.partial_reuse());

    // Partials accumulate innermost; only the last one stores.
    let first: Vec<_> = recipe.iter().take(4).collect();
    assert!(first.iter().take(3).all(|it| !it.is_last_partial));
    assert!(first[3].is_last_partial);
    assert_eq!(first[3].fcd_idx, 0);
}

#[test]
fn test_reuse_flags_follow_walk_direction() {
    let mut p = large_fwd_params();
    p.strategy.sb_reuse = true;
    let recipe = recipe_for(&p);
    // Raster walk re-reads A on every fcd step after the first.
    assert!(recipe.reuse_a);
    assert!(!recipe.reuse_b);
    let iterations: Vec<_> = recipe.iter().collect();
    assert!(!iterations[0].reuse_a);
    assert!(iterations[1].reuse_a);
}

#[test]
fn test_signal_amount_only_in_amount_mode() {
    let mut p = fwd_params();
    p.controls.signal_amount = 5;
    assert_eq!(recipe_for(&p).signal_amount, 1);

    p.controls.signaling_mode = SignalingMode::Amount;
    assert_eq!(recipe_for(&p).signal_amount, 5);
}

#[test]
fn test_memset_recipe_is_single_iteration() {
    let recipe = Recipe::memset(&fwd_params());
    assert_eq!(recipe.iterations_nr(), 1);
    assert!(!recipe.reuse_a && !recipe.reuse_b);
    assert_eq!(recipe.partials_nr, 1);
    let it = recipe.iter().next().unwrap();
    assert!(it.is_first && it.is_last && it.is_last_partial);
}
