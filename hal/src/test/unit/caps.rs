use axion_ir::{DType, OpType};
use strum::IntoEnumIterator;
use test_case::test_case;

use crate::caps::Chip;

#[test_case(Chip::Gaudi, 128; "gaudi")]
#[test_case(Chip::Gaudi2, 256; "gaudi2")]
#[test_case(Chip::Gaudi3, 512; "gaudi3")]
fn test_rollup_latency(chip: Chip, expected: u64) {
    assert_eq!(chip.caps().rollup_latency, expected);
}

#[test]
fn test_cache_line_elements() {
    let caps = Chip::Gaudi2.caps();
    assert_eq!(caps.cache_line_elements(DType::Fp32), 32);
    assert_eq!(caps.cache_line_elements(DType::Bf16), 64);
    assert_eq!(caps.cache_line_elements(DType::Fp8e4m3), 128);
}

#[test]
fn test_min_cd_alignment_dma_is_unconstrained() {
    for chip in Chip::iter() {
        let caps = chip.caps();
        assert_eq!(caps.min_cd_alignment(DType::Bf16, OpType::Memcpy), 1);
        assert_eq!(
            caps.min_cd_alignment(DType::Bf16, OpType::Fwd),
            caps.cache_line_elements(DType::Bf16)
        );
    }
}
