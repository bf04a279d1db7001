//! Sub-problem decomposition.
//!
//! One logical operation becomes one or more independently compiled
//! sub-problems when a single descriptor cannot express it: dedx unrolls
//! its convolution strides, fwd / transposed-dedx split to realign
//! recurring cache-line misalignment, everything else compiles whole.

use axion_hal::{Chip, GeoAttr};
use axion_ir::helpers::{div_ceil, div_floor, gcd, mod_neg};
use axion_ir::{LayerParams, MAX_DIMS, OpType, OperandRole};
use tracing::debug;

use crate::error::Result;
use crate::misalign;
use crate::recipe::Recipe;

/// Per-operand, per-dimension address deltas in elements of the original
/// tensor, applied after descriptor base-address patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressOffset {
    pub x: [i64; MAX_DIMS],
    pub w: [i64; MAX_DIMS],
    pub y: [i64; MAX_DIMS],
}

impl AddressOffset {
    pub fn view(&self, role: OperandRole) -> &[i64; MAX_DIMS] {
        match role {
            OperandRole::X => &self.x,
            OperandRole::W => &self.w,
            OperandRole::Y => &self.y,
        }
    }

    pub fn view_mut(&mut self, role: OperandRole) -> &mut [i64; MAX_DIMS] {
        match role {
            OperandRole::X => &mut self.x,
            OperandRole::W => &mut self.w,
            OperandRole::Y => &mut self.y,
        }
    }
}

/// One decomposition unit: specialized parameters, the address offset of
/// its views, its recipe and its classification.
#[derive(Debug, Clone)]
pub struct SubProblem {
    pub params: LayerParams,
    pub address_offset: AddressOffset,
    pub recipe: Recipe,
    /// The hardware would read nothing meaningful; the descriptor only
    /// clears the output region.
    pub memset: bool,
}

/// The ordered decomposition of one operation.
///
/// `current` indexes the sub-problem being compiled; it is only valid
/// while the descriptor stage walks the sequence.
#[derive(Debug, Clone)]
pub struct SubProblems {
    items: Vec<SubProblem>,
    pub current: Option<usize>,
}

impl SubProblems {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SubProblem> {
        self.items.iter()
    }

    pub fn get(&self, idx: usize) -> &SubProblem {
        &self.items[idx]
    }

    /// The sub-problem currently being compiled.
    ///
    /// # Panics
    /// Outside of descriptor generation there is no current sub-problem.
    pub fn current(&self) -> &SubProblem {
        let idx = self.current.unwrap_or_else(|| panic!("no current sub-problem outside descriptor generation"));
        &self.items[idx]
    }

    pub fn total_activations(&self) -> usize {
        self.items.iter().map(|sp| sp.recipe.iterations_nr()).sum()
    }
}

/// Size of the split dimension in sub-problem `idx` of `num`: an even
/// split with the remainder redistributed to the first sub-problems.
pub fn sub_problem_size(size: u64, num: u64, idx: u64) -> u64 {
    size / num + u64::from(idx < size % num)
}

/// Split `params` into its ordered sub-problem sequence.
///
/// The strategy must be fully decided (geometry and pattern chosen);
/// parameters are assumed validated.
pub fn decompose(chip: Chip, params: &LayerParams) -> Result<SubProblems> {
    let caps = chip.caps();
    let num = match params.op {
        OpType::Dedx => {
            let strides = params.conv.stride_product();
            // Packing folds the whole unroll into one padded descriptor;
            // validation has already matched the factor to the strides.
            if params.strategy.packing_factor > 1 { 1 } else { strides }
        }
        OpType::Fwd | OpType::TransposedDedx => misalign::num_sub_problems(&caps, params),
        _ => 1,
    };
    debug!(op = %params.op, num, "decomposing");

    let mut items = Vec::with_capacity(num as usize);
    for idx in 0..num {
        let (sub_params, address_offset) = match params.op {
            OpType::Dedx => make_dedx_sub_problem(params, num, idx),
            OpType::Fwd | OpType::TransposedDedx if num > 1 => misalign::params_for_sub_problem(params, num, idx),
            _ => (params.clone(), AddressOffset::default()),
        };

        let memset = is_memset(&sub_params);
        if is_out_of_bounds(&sub_params) {
            debug!(idx, "dropping out-of-bounds sub-problem");
            continue;
        }
        if memset && !params.strategy.memset_void_pixels {
            debug!(idx, "skipping memset sub-problem");
            continue;
        }

        let geo = GeoAttr::new(chip, &sub_params);
        let recipe = if memset {
            Recipe::memset(&sub_params)
        } else {
            Recipe::new(&caps, &geo, &sub_params)
        };
        items.push(SubProblem { params: sub_params, address_offset, recipe, memset });
    }

    assert!(!items.is_empty(), "decomposition of {} produced no sub-problems", params.op);
    Ok(SubProblems { items, current: None })
}

/// A sub-problem whose filter collapsed to zero on some dimension reads
/// nothing; its output region is memset instead.
fn is_memset(params: &LayerParams) -> bool {
    params.w.sizes[2..].iter().any(|&s| s == 0)
}

/// A sub-problem whose input view collapsed to zero covers no output
/// elements at all and is dropped.
fn is_out_of_bounds(params: &LayerParams) -> bool {
    params.x.sizes.iter().any(|&s| s == 0) || params.y.sizes.iter().any(|&s| s == 0)
}

/// Derive dedx sub-problem `idx` of `num`.
///
/// Each sub-problem computes the output pixels congruent to one filter
/// phase: the weights view starts at a distinct base along each filter
/// dimension and both x and w become stride-`S` subviews. A common divisor
/// of stride and dilation cannot be expressed by the hardware directly and
/// is first moved out of the convolution into the tensor strides.
fn make_dedx_sub_problem(original: &LayerParams, num: u64, idx: u64) -> (LayerParams, AddressOffset) {
    const CONV_DIMS: usize = 3;

    let mut p = original.clone();
    let mut offset = AddressOffset::default();

    if original.strategy.packing_factor > 1 {
        // Packed dedx: widen the padding so one descriptor covers the
        // whole stride unroll.
        p.conv.padding[0] += original.strategy.packing_factor as i64 - 1;
        return (p, offset);
    }

    p.strategy.pipeline_level = div_ceil(p.strategy.pipeline_level.max(1), num);
    p.conv.stride = [1; CONV_DIMS];

    let mut strides = original.conv.stride;
    let mut dilation = original.conv.dilation;
    let mut common_divs = [1u64; CONV_DIMS];
    let mut has_gcd = false;
    for dim in 0..CONV_DIMS {
        let g = gcd(strides[dim], dilation[dim]);
        if g > 1 {
            has_gcd = true;
            strides[dim] /= g;
            dilation[dim] /= g;
            common_divs[dim] = g;
        }
    }
    if has_gcd {
        for dim in 0..CONV_DIMS {
            if common_divs[dim] != 1 {
                p.conv.dilation[dim] = dilation[dim];
                let td = dim + 1;
                p.x.strides[td] *= common_divs[dim];
                p.x.sizes[td] /= common_divs[dim];
            }
        }
    }

    // Mixed-radix decomposition of the sub-problem index into per-dim
    // filter bases.
    let mut rem = idx;
    let mut offset_within_gcd = [0u64; CONV_DIMS];
    for dim in (0..CONV_DIMS).rev() {
        let wd = dim + 2;
        offset_within_gcd[dim] = rem % common_divs[dim];
        p.w.bases[wd] = (rem / common_divs[dim]) % strides[dim];
        offset.w[wd] = (p.w.bases[wd] * p.w.strides[wd]) as i64;
        rem /= original.conv.stride[dim];
    }

    for dim in 0..CONV_DIMS {
        let td = dim + 1;
        let wd = dim + 2;
        let g = common_divs[dim] as i64;

        let mut padding = div_floor(original.conv.padding[dim], g);
        let mut padding_rem: i64 = 0;
        if has_gcd {
            padding_rem = original.conv.padding[dim] % g;
            if (offset_within_gcd[dim] as i64) < padding_rem {
                if padding_rem != 0 {
                    padding += 1;
                }
                padding_rem = (g - original.conv.padding[dim]) % g;
            } else {
                padding_rem = -padding_rem;
            }
        }

        // M = N + K0*D - (K0*D - P)/S: the sub-problem reads y shifted by
        // the filter base, writes x strided, with padding recomputed.
        let k0d_minus_p = p.w.bases[wd] as i64 * dilation[dim] as i64 - padding;
        p.conv.padding[dim] = -div_floor(k0d_minus_p, strides[dim] as i64);
        p.x.bases[td] = mod_neg(k0d_minus_p, strides[dim]);
        offset.x[td] = (p.x.bases[td] * p.x.strides[td]) as i64;
        // The gcd residue and original-padding remainder are not visible
        // in x.bases; fold them into the patching offset directly.
        offset.x[td] += (padding_rem + offset_within_gcd[dim] as i64) * original.x.strides[td] as i64;

        if p.x.bases[td] > 0
            && original.conv.stride[dim] == 2
            && original.x.sizes[td] % original.conv.stride[dim] != 0
            && original.strategy.dedx_dynamic_padding
        {
            // Expand by one row so both descriptors line up for dynamic
            // padding patching.
            offset.x[td] = -(original.x.strides[td] as i64);
            offset.y[td] = -(original.y.strides[td] as i64);
        }

        // Output written strided.
        let rem_x = (p.x.bases[td] * common_divs[dim]) as i64 + padding_rem + offset_within_gcd[dim] as i64;
        p.x.strides[td] *= strides[dim];
        p.x.sizes[td] /= strides[dim];
        p.x.bases[td] /= strides[dim];
        // Weights read strided.
        let rem_w = p.w.bases[wd] % strides[dim];
        p.w.strides[wd] *= strides[dim];
        p.w.sizes[wd] /= strides[dim];
        p.w.bases[wd] /= strides[dim];
        // Redistribute the division remainders to the first sub-problems.
        if rem_x >= 0 && (rem_x as u64) < original.x.sizes[td] % original.conv.stride[dim] {
            p.x.sizes[td] += 1;
        }
        if rem_w < original.w.sizes[wd] % strides[dim] {
            p.w.sizes[wd] += 1;
        }
    }

    if has_gcd {
        // A non-zero residue within the extracted divisor means this phase
        // never hits a weight; force the filter empty so the sub-problem
        // becomes a memset.
        for dim in 0..CONV_DIMS {
            if offset_within_gcd[dim] != 0 {
                p.w.sizes[dim + 2] = 0;
            }
        }
    }

    (p, offset)
}
