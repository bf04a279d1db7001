use axion_hal::Chip;
use axion_ir::SignalingMode;

use crate::builder::{DescGenerator, builder_for_chip};
use crate::error::Error;
use crate::test::common::{bgemm_params, dedx_params, deep_bgemm_params, fwd_params, large_fwd_params};

#[test]
fn test_no_builder_for_first_generation() {
    assert!(matches!(builder_for_chip(Chip::Gaudi), Err(Error::UnsupportedChip { chip: Chip::Gaudi })));
    assert!(builder_for_chip(Chip::Gaudi2).is_ok());
    assert!(builder_for_chip(Chip::Gaudi3).is_ok());
}

#[test]
fn test_compile_rejects_invalid_params() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let mut p = fwd_params();
    p.strategy.mme_limit = 3;
    assert!(matches!(generator.compile(&p), Err(Error::InvalidMmeLimit { limit: 3 })));
}

#[test]
fn test_compile_trivial_fwd() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let compiled = generator.compile(&fwd_params()).unwrap();

    assert_eq!(compiled.sub_problems.len(), 1);
    assert_eq!(compiled.activations.len(), compiled.sub_problems.total_activations());
    assert_eq!(compiled.activations_per_dcore, vec![compiled.activations.len()]);
    assert!(compiled.activations.last().unwrap().is_last);
    assert_eq!(compiled.activations.iter().filter(|a| a.is_last).count(), 1);

    // One descriptor per cooperating unit on a two-unit chip.
    for activation in &compiled.activations {
        assert_eq!(activation.descs.len(), 2);
    }
}

#[test]
fn test_signal_count_uniform_across_units() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    for params in [fwd_params(), dedx_params(2), bgemm_params(), large_fwd_params()] {
        let compiled = generator.compile(&params).unwrap();
        for activation in &compiled.activations {
            assert!(activation.descs.iter().all(|d| d.signal_nr() == activation.signal_nr));
        }
    }
}

#[test]
fn test_once_signaling_fires_on_last_activation_only() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let mut p = large_fwd_params();
    p.controls.signaling_mode = SignalingMode::Once;
    let compiled = generator.compile(&p).unwrap();

    let signaling: Vec<u16> = compiled.activations.iter().map(|a| a.signal_nr).collect();
    assert!(signaling[..signaling.len() - 1].iter().all(|&s| s == 0));
    assert_eq!(*signaling.last().unwrap(), 1);
}

#[test]
fn test_dedx_activations_carry_phase_offsets() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let compiled = generator.compile(&dedx_params(2)).unwrap();
    assert_eq!(compiled.sub_problems.len(), 2);

    let offsets: Vec<i64> = compiled.activations.iter().map(|a| a.address_offset.w[2]).collect();
    assert!(offsets.contains(&0));
    assert!(offsets.iter().any(|&o| o > 0));
}

#[test]
fn test_dual_gemm_is_chip_gated() {
    let mut p = bgemm_params();
    p.strategy.dual_gemm = true;

    let gen2 = DescGenerator::new(Chip::Gaudi2).unwrap();
    assert!(matches!(gen2.compile(&p), Err(Error::StrategyOpMismatch { field: "dual_gemm", .. })));

    let gen3 = DescGenerator::new(Chip::Gaudi3).unwrap();
    assert!(gen3.compile(&p).is_ok());
}

#[test]
fn test_dcore_activation_parity() {
    let generator = DescGenerator::new(Chip::Gaudi3).unwrap();
    let compiled = generator.compile(&large_fwd_params()).unwrap();

    let first = compiled.activations_per_dcore[0];
    assert_eq!(compiled.activations_per_dcore.len(), 4);
    assert!(compiled.activations_per_dcore.iter().all(|&n| n == first));

    // Units whose share of a tail tile is empty carry null descriptors.
    let nulls = compiled
        .activations
        .iter()
        .flat_map(|a| a.descs.iter())
        .filter(|d| d.ctrl.null_desc)
        .count();
    assert!(nulls > 0);
}

#[test]
fn test_dcores_jointly_cover_the_unit_grid() {
    let generator = DescGenerator::new(Chip::Gaudi3).unwrap();
    let compiled = generator.compile(&large_fwd_params()).unwrap();

    // First tile: 1024x512 on the 4x2 unit grid, every share non-empty.
    let activation =
        compiled.activations.iter().find(|a| a.fcd_idx == 0 && a.sp_idx == 0).unwrap();
    assert!(activation.descs.iter().all(|d| !d.ctrl.null_desc));

    let mut slots: Vec<(i64, i64)> = activation
        .descs
        .iter()
        .map(|d| (d.agu_out.roi_base_offset[1], d.agu_out.roi_base_offset[0]))
        .collect();
    slots.sort_unstable();
    let expected: Vec<(i64, i64)> = [0, 256 * 1200]
        .into_iter()
        .flat_map(|sp| [0, 256, 512, 768].into_iter().map(move |fcd| (sp, fcd)))
        .collect();
    assert_eq!(slots, expected);
}

#[test]
fn test_cd_partials_read_disjoint_chunks() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let compiled = generator.compile(&deep_bgemm_params()).unwrap();
    let recipe = &compiled.sub_problems.get(0).recipe;
    assert_eq!(recipe.partials_nr, 3);

    // Partials are innermost, so the first tile's partials come in order.
    let tile: Vec<_> =
        compiled.activations.iter().filter(|a| a.fcd_idx == 0 && a.sp_idx == 0).collect();
    assert_eq!(tile.len(), 3);

    let mut covered = 0i64;
    for (partial, activation) in tile.iter().enumerate() {
        let desc = &activation.descs[0];
        assert_eq!(desc.header.accum_en, partial > 0);
        assert_eq!(desc.header.store_en, partial == 2);
        assert_eq!(desc.agu_a.roi_base_offset[0], covered);
        assert_eq!(desc.agu_b.roi_base_offset[1], covered * 1024);
        covered += i64::from(desc.spatial_size_minus_1_b) + 1;
    }
    assert_eq!(covered, 60000);
}

#[test]
fn test_merged_activations_span_all_dcores() {
    let generator = DescGenerator::new(Chip::Gaudi3).unwrap();
    let compiled = generator.compile(&large_fwd_params()).unwrap();

    let per_dcore_units = 8 / 4;
    for activation in &compiled.activations {
        assert_eq!(activation.descs.len(), per_dcore_units * 4);
    }
}

#[test]
fn test_patch_tensor_addresses() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let mut compiled = generator.compile(&fwd_params()).unwrap();
    compiled.patch_tensor_addresses(0x1000, 0x2000, 0x3000);

    // Fwd maps x/w/y onto A/B/C directly; no decomposition offsets apply.
    for activation in &compiled.activations {
        for desc in &activation.descs {
            assert_eq!(desc.base_addr_a, 0x1000);
            assert_eq!(desc.base_addr_b, 0x2000);
            assert_eq!(desc.base_addr_cout, 0x3000);
        }
    }
}

#[test]
fn test_patch_tensor_addresses_applies_dedx_offsets() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let mut compiled = generator.compile(&dedx_params(2)).unwrap();
    compiled.patch_tensor_addresses(0, 0, 0);

    // The second phase reads the weights shifted by one filter row.
    let bases: Vec<u64> = compiled.activations.iter().map(|a| a.descs[0].base_addr_b).collect();
    assert!(bases.iter().any(|&b| b == 0));
    assert!(bases.iter().any(|&b| b > 0));
}

#[test]
fn test_patch_context_id() {
    let generator = DescGenerator::new(Chip::Gaudi2).unwrap();
    let mut compiled = generator.compile(&fwd_params()).unwrap();
    compiled.patch_context_id(42);
    for activation in &compiled.activations {
        for desc in &activation.descs {
            assert_eq!(desc.wkld_id, 42);
            assert_eq!(desc.perf_evt_in.value, 42);
        }
    }
}

#[test]
fn test_gaudi3_descriptors_carry_cache_directives() {
    let generator = DescGenerator::new(Chip::Gaudi3).unwrap();
    let mut p = fwd_params();
    p.memory_cfg.mc_id = [7, 8, 9];
    let compiled = generator.compile(&p).unwrap();

    let desc = &compiled.activations[0].descs[0];
    assert_eq!(desc.cache_a.mc_id, 7);
    assert_eq!(desc.cache_out.mc_id, 9);
    assert_eq!(desc.axi_user_data.first, 9);

    // The previous generation has no cache fabric; fields stay reset.
    let gen2 = DescGenerator::new(Chip::Gaudi2).unwrap();
    let compiled2 = gen2.compile(&p).unwrap();
    assert_eq!(compiled2.activations[0].descs[0].cache_a.mc_id, 0);
}
