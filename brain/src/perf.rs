//! The cost model.
//!
//! Prices one fully-decided strategy (geometry plus walking pattern) in
//! engine cycles, output utilization and memory traffic. Everything here is
//! closed-form arithmetic over the geometry attributes and the iteration
//! recipe; no descriptor is ever built to estimate one.

use axion_descgen::Recipe;
use axion_hal::{Chip, ChipCaps, GeoAttr};
use axion_ir::helpers::{div_ceil, lcm};
use axion_ir::{LayerParams, MAX_CONV_DIMS, MAX_DIMS, Operand, WalkPattern};
use serde::{Deserialize, Serialize};
use snafu::ensure;
use tracing::debug;

use crate::error::{MissingGeometrySnafu, MissingPatternSnafu, Result};
use crate::solution::PerforationDim;

/// Tuning knobs of the strategy brain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knobs {
    /// Fold cache-line misalignment and input read bandwidth into the
    /// runtime estimate.
    pub alignment_penalty_en: bool,
    /// Upper bound on a flattened gemm tile, in output elements.
    pub max_tile_size: u64,
    /// Minimal common dimension worth slicing into partial outputs.
    pub min_cd: u64,
}

impl Default for Knobs {
    fn default() -> Self {
        Self { alignment_penalty_en: false, max_tile_size: 1 << 20, min_cd: 1024 }
    }
}

/// Strategy-selection engine for one chip generation.
///
/// Stateless apart from the chip constants and knobs; every estimate is a
/// pure function of the layer parameters handed in.
#[derive(Debug, Clone)]
pub struct Brain {
    chip: Chip,
    caps: ChipCaps,
    pub knobs: Knobs,
}

/// Expected memory traffic of one operand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryAttr {
    /// Tensor reads (or writes, for the output) issued by the whole chip.
    pub accesses_per_chip: f64,
    /// Accesses one dcore issues; perforation divides the split operand.
    pub accesses_per_dcore: f64,
    /// Read/write bandwidth the operand's ports can draw, bytes per cycle.
    pub access_bw: f64,
}

/// The cost model's verdict on one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfAttr {
    /// Cycles the execution units are busy.
    pub expected_compute_cycles: f64,
    /// Compute cycles, or the input read time when that dominates.
    pub expected_runtime_cycles: f64,
    pub expected_runtime_us: f64,
    pub expected_read_input_cycles: f64,
    /// Utilization of the strategy on the unsliced operation.
    pub max_utilization: f64,
    /// Utilization once the producer's slicing is accounted for.
    pub mme_utilization: f64,
    /// Times each input tensor is fetched end to end.
    pub fetch_nr_a: f64,
    pub fetch_nr_b: f64,
    pub unaligned_penalty_a: f64,
    pub unaligned_penalty_b: f64,
    pub activations_nr: u64,
    pub memory_a: MemoryAttr,
    pub memory_b: MemoryAttr,
    pub memory_c: MemoryAttr,
}

/// Geometry-step counts of one strategy over the output.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GeometrySteps {
    pub fcd: u64,
    pub sp: u64,
    pub batch: u64,
    /// Steps that starve an input port; fractional once misalignment
    /// penalties are folded in.
    pub constrained: f64,
}

// Tail-slice aspects for the sliced-utilization weighting.
const TAIL_WIDTH: u8 = 1;
const TAIL_HEIGHT: u8 = 2;
const TAIL_BATCH: u8 = 4;

impl Brain {
    pub fn new(chip: Chip) -> Self {
        Self::with_knobs(chip, Knobs::default())
    }

    pub fn with_knobs(chip: Chip, knobs: Knobs) -> Self {
        Self { chip, caps: chip.caps(), knobs }
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    pub(crate) fn caps(&self) -> &ChipCaps {
        &self.caps
    }

    /// Price `params` under its chosen geometry and pattern.
    ///
    /// `slice` is the tile the producer actually feeds the engine; when
    /// given, [`PerfAttr::mme_utilization`] reflects the slice grid
    /// including every tail, while `max_utilization` stays the unsliced
    /// bound.
    pub fn perf_attr(&self, params: &LayerParams, slice: Option<&LayerParams>) -> Result<PerfAttr> {
        ensure!(params.strategy.geometry.is_some(), MissingGeometrySnafu);
        let Some(pattern) = params.strategy.pattern else {
            return MissingPatternSnafu.fail();
        };
        let geo = GeoAttr::new(self.chip, params);
        let recipe = Recipe::new(&self.caps, &geo, params);

        let penalty_a = self.unaligned_penalty(params, Operand::A);
        let penalty_b = self.unaligned_penalty(params, Operand::B);
        let steps = self.geometry_steps(params, &geo, &recipe, penalty_a, penalty_b);
        let (fetch_a, fetch_b) = fetch_counts(params, pattern, &recipe, &steps);

        let read_a = read_input_cycles(params, &geo, Operand::A, fetch_a, penalty_a);
        let read_b = read_input_cycles(params, &geo, Operand::B, fetch_b, penalty_b);
        let read_cycles = if geo.port_constrained { read_a + read_b } else { read_a.max(read_b) };

        let compute = self.compute_cycles(params, &geo, &recipe, &steps);
        let runtime = if self.knobs.alignment_penalty_en { compute.max(read_cycles) } else { compute };

        let max_utilization = self.utilization_impl(params);
        let mme_utilization = match slice {
            Some(slice) => self.sliced_utilization(params, slice, &geo),
            None => max_utilization,
        };

        let perforation = self.perforation_dim(params, &geo);
        let attr = PerfAttr {
            expected_compute_cycles: compute,
            expected_runtime_cycles: runtime,
            expected_runtime_us: runtime / self.caps.clk_freq_mhz,
            expected_read_input_cycles: read_cycles,
            max_utilization,
            mme_utilization,
            fetch_nr_a: fetch_a,
            fetch_nr_b: fetch_b,
            unaligned_penalty_a: penalty_a,
            unaligned_penalty_b: penalty_b,
            activations_nr: recipe.iterations_nr() as u64,
            memory_a: self.memory_attr(params, &geo, &recipe, &steps, perforation, Operand::A, fetch_a),
            memory_b: self.memory_attr(params, &geo, &recipe, &steps, perforation, Operand::B, fetch_b),
            memory_c: self.memory_attr(params, &geo, &recipe, &steps, perforation, Operand::C, 1.0),
        };
        debug!(
            op = %params.op,
            geometry = %geo.geometry,
            pattern = %pattern,
            cycles = attr.expected_runtime_cycles,
            utilization = attr.mme_utilization,
            "priced strategy"
        );
        Ok(attr)
    }

    /// Expected EU-busy cycles: every geometry step pays at least the
    /// rollup latency, constrained steps pay the port-starvation factor on
    /// top of the common dimension.
    fn compute_cycles(&self, params: &LayerParams, geo: &GeoAttr, recipe: &Recipe, steps: &GeometrySteps) -> f64 {
        let effective_cd = div_ceil(params.cd_size(), geo.geometry_cd_concurrency()) as f64;
        let rollup = self.caps.rollup_latency as f64;

        let mut min_cd = effective_cd.max(rollup);
        let min_cd_constrained = (effective_cd * constrained_step_cost(geo)).max(rollup);
        if recipe.partial_reuse() {
            // Each partial rolls up separately; short partials serialize on
            // the rollup latency.
            let per_partial = div_ceil(params.cd_size(), recipe.partials_nr);
            if (per_partial as f64) < rollup {
                min_cd = recipe.partials_nr as f64 * rollup;
            }
        }

        let spatial = (steps.fcd * steps.sp) as f64;
        let mut regular = (spatial - steps.constrained).max(0.0) * steps.batch as f64;
        let constrained = steps.constrained * steps.batch as f64;
        if params.op.is_conv() {
            // Conv shapes hide part of the starvation under the filter walk.
            regular += steps.constrained;
        }
        regular * min_cd + constrained * min_cd_constrained
    }

    /// Geometry steps over the output, including the port-constrained share.
    pub(crate) fn geometry_steps(
        &self,
        params: &LayerParams,
        geo: &GeoAttr,
        recipe: &Recipe,
        penalty_a: f64,
        penalty_b: f64,
    ) -> GeometrySteps {
        let fcd = div_ceil(params.fcd_size(), geo.geometry_width());
        let sp = div_ceil(params.spatial_size(), geo.geometry_height());
        let batch = params.batch_size(geo.geometry_concurrency()).max(1);

        let mut constrained = 0.0;
        if geo.port_constrained {
            let raster = params.is_pattern_raster();
            let along_fcd = (raster && fcd != 1) || (!raster && sp == 1);
            // Re-walks of the split output re-incur the starved column/row.
            constrained = if along_fcd { sp } else { fcd } as f64 * recipe.partials_nr as f64;
        }
        if penalty_a > 1.0 && penalty_b > 1.0 {
            constrained += fcd.max(sp) as f64 * (penalty_a - 1.0).max(penalty_b - 1.0);
        } else {
            if penalty_a > 1.0 {
                constrained += sp as f64 * (penalty_a - 1.0);
            }
            if penalty_b > 1.0 {
                constrained += fcd as f64 * (penalty_b - 1.0);
            }
        }
        GeometrySteps { fcd, sp, batch, constrained }
    }

    /// Average slowdown of reading `operand` rows that recur misaligned
    /// against the cache line. 1.0 when aligned or when the penalty knob is
    /// off.
    pub(crate) fn unaligned_penalty(&self, params: &LayerParams, operand: Operand) -> f64 {
        if !self.knobs.alignment_penalty_en || params.op.is_dma() {
            return 1.0;
        }
        // One row per realignment period starts on a cache-line boundary;
        // every other row pays a doubled line fetch.
        let period = self.misalignment_period(params, operand);
        if period <= 1 {
            return 1.0;
        }
        (1.0 + (period as f64 - 1.0) * 2.0) / period as f64
    }

    /// Rows until `operand`'s row starts land back on a cache-line
    /// boundary. 1 means every row is aligned.
    pub(crate) fn misalignment_period(&self, params: &LayerParams, operand: Operand) -> u64 {
        let view = params.operand(operand);
        let cl = self.caps.cache_line_elements(view.dtype);
        let mut row_stride = view.sizes[0];
        if operand == Operand::A && params.op.is_conv() {
            row_stride *= params.conv.stride[0];
        }
        if cl == 0 || row_stride == 0 || row_stride % cl == 0 {
            return 1;
        }
        lcm(cl, row_stride) / row_stride
    }

    /// Utilization of the strategy on exactly the given shape: the weighted
    /// fraction of the output grid doing useful work.
    pub(crate) fn utilization_impl(&self, params: &LayerParams) -> f64 {
        let geo = GeoAttr::new(self.chip, params);
        let recipe = Recipe::new(&self.caps, &geo, params);
        let penalty_a = self.unaligned_penalty(params, Operand::A);
        let penalty_b = self.unaligned_penalty(params, Operand::B);
        let steps = self.geometry_steps(params, &geo, &recipe, penalty_a, penalty_b);
        let extra_cost = constrained_step_cost(&geo) - 1.0;

        let last_sp = last_step_fill(params.spatial_size(), geo.geometry_height());
        let last_fcd = last_step_fill(params.fcd_size(), geo.geometry_width());
        let last_batch = if geo.supports_concurrency {
            let extent = params.operand(Operand::C).sizes[geo.concurrent_dim];
            last_step_fill(extent, geo.geometry_concurrency())
        } else {
            1.0
        };

        let fcd = steps.fcd as f64;
        let sp = steps.sp as f64;
        let batch = steps.batch as f64;
        let full = (fcd - 1.0) * (sp - 1.0);
        let bottom_edge = last_sp * (fcd - 1.0);
        let right_edge = last_fcd * (sp - 1.0);
        let corner = last_sp * last_fcd;
        let single = (full + bottom_edge + right_edge + corner) / (fcd * sp + steps.constrained * extra_cost);
        (single * (batch - 1.0) + single * last_batch) / batch
    }

    /// Utilization over the producer's slice grid: full slices weighted
    /// against the width/height/batch tail slices.
    fn sliced_utilization(&self, params: &LayerParams, slice: &LayerParams, geo: &GeoAttr) -> f64 {
        let width_slices = div_ceil(params.fcd_size(), slice.fcd_size().max(1));
        let height_slices = div_ceil(params.spatial_size(), slice.spatial_size().max(1));
        let mut batch_slices = 1;
        if geo.supports_concurrency && !params.can_flatten() {
            let dim = geo.concurrent_dim;
            batch_slices = div_ceil(
                params.operand(Operand::C).sizes[dim],
                slice.operand(Operand::C).sizes[dim].max(1),
            );
        }

        let full = self.utilization_impl(slice);
        let height_tail = self.utilization_impl(&tail_slice(params, slice, geo, TAIL_HEIGHT));
        let width_tail = self.utilization_impl(&tail_slice(params, slice, geo, TAIL_WIDTH));
        let corner_tail = self.utilization_impl(&tail_slice(params, slice, geo, TAIL_WIDTH | TAIL_HEIGHT));

        let w = width_slices as f64;
        let h = height_slices as f64;
        let full_w = full * (w - 1.0) * (h - 1.0);
        let height_w = height_tail * (w - 1.0);
        let width_w = width_tail * (h - 1.0);

        if geo.supports_concurrency && batch_slices > 1 {
            let b = batch_slices as f64;
            let batch_tail = self.utilization_impl(&tail_slice(params, slice, geo, TAIL_BATCH));
            let height_batch = self.utilization_impl(&tail_slice(params, slice, geo, TAIL_HEIGHT | TAIL_BATCH));
            let width_batch = self.utilization_impl(&tail_slice(params, slice, geo, TAIL_WIDTH | TAIL_BATCH));
            let last_tail =
                self.utilization_impl(&tail_slice(params, slice, geo, TAIL_WIDTH | TAIL_HEIGHT | TAIL_BATCH));
            (full_w * (b - 1.0)
                + height_w * (b - 1.0)
                + width_w * (b - 1.0)
                + corner_tail * (b - 1.0)
                + batch_tail * (w - 1.0) * (h - 1.0)
                + height_batch * (w - 1.0)
                + width_batch * (h - 1.0)
                + last_tail)
                / (w * h * b)
        } else {
            (full_w + height_w + width_w + corner_tail) / (w * h)
        }
    }

    /// Expected memory traffic of one operand under this strategy.
    fn memory_attr(
        &self,
        params: &LayerParams,
        geo: &GeoAttr,
        recipe: &Recipe,
        steps: &GeometrySteps,
        perforation: Option<PerforationDim>,
        operand: Operand,
        fetch_nr: f64,
    ) -> MemoryAttr {
        let accesses_per_chip = match operand {
            Operand::A => fetch_nr * geo.fcd_mme_nr() as f64,
            Operand::B => fetch_nr * geo.spatial_mme_nr() as f64,
            Operand::C => recipe.iterations_nr() as f64,
        };
        let mut accesses_per_dcore = accesses_per_chip;
        if perforated_operand(params, perforation) == Some(operand) {
            accesses_per_dcore /= self.caps.dcore_nr as f64;
        }

        let mut access_bw = self.caps.single_port_bw * geo.ports_nr(operand) as f64;
        // Partial SB reuse serializes refetches behind the accumulators.
        let accum_steps = if recipe.partial_reuse() {
            self.caps.accums_nr * if geo.double_accums { 2 } else { 1 }
        } else {
            u64::MAX
        };
        match operand {
            Operand::A if recipe.reuse_a => access_bw /= steps.fcd.min(accum_steps) as f64,
            Operand::B if recipe.reuse_b => access_bw /= steps.sp.min(accum_steps) as f64,
            _ => {}
        }
        MemoryAttr { accesses_per_chip, accesses_per_dcore, access_bw }
    }
}

/// Relative cost of a port-constrained geometry step: how much longer the
/// starved input takes relative to a fully fed one. Transposed inputs pass
/// through the transpose engine and hide part of the stall.
pub(crate) fn constrained_step_cost(geo: &GeoAttr) -> f64 {
    if !geo.transpose_a && !geo.transpose_b {
        return 2.0;
    }
    let te_height = geo.te_height as f64;
    let mut cost_a = 2.0;
    let mut cost_b = 2.0;
    if geo.transpose_a {
        let sp_per_port = div_ceil(geo.geometry_height(), geo.interleaved_spatial_ports()) as f64;
        cost_a = 1.0 + sp_per_port / te_height;
    }
    if geo.transpose_b {
        cost_b = 1.0 + geo.geometry_width().min(geo.te_height) as f64 / te_height;
    }
    cost_a.min(cost_b)
}

/// How many times each input is fetched from memory end to end, as a
/// function of the walking pattern and the recipe's reuse decisions.
fn fetch_counts(params: &LayerParams, pattern: WalkPattern, recipe: &Recipe, steps: &GeometrySteps) -> (f64, f64) {
    if params.op.is_dma() {
        return (1.0, 0.0);
    }
    let gemm = params.op.is_gemm() || params.op.is_reduction_add();
    let partial = recipe.partial_reuse();
    let fcd_steps = steps.fcd as f64;
    let sp_steps = steps.sp as f64;
    let batch = steps.batch as f64;
    let fcd_splits = recipe.fcd_splits_nr() as f64;
    let sp_splits = recipe.sp_splits_nr() as f64;
    let conv_splits = recipe.non_spatial_nr() as f64;

    let (mut fetch_a, fetch_b) = match pattern {
        WalkPattern::Skf => (
            if recipe.reuse_a { if partial { fcd_splits } else { 1.0 } } else { fcd_steps },
            if recipe.reuse_b { 1.0 } else { sp_steps },
        ),
        WalkPattern::Ksf => (
            if recipe.reuse_a { 1.0 } else { fcd_steps },
            if recipe.reuse_b { if partial { sp_splits } else { 1.0 } } else { sp_steps },
        ),
        WalkPattern::Cfk | WalkPattern::Fck => (
            if recipe.reuse_a { if partial { fcd_splits } else { 1.0 } } else { fcd_steps },
            if recipe.reuse_b { 1.0 } else { sp_steps * if gemm { 1.0 } else { batch } },
        ),
        WalkPattern::Ckf if gemm => (fcd_steps, sp_steps),
        WalkPattern::Ckf => (
            if recipe.reuse_a { 1.0 } else { fcd_steps },
            if recipe.reuse_b { sp_steps } else { sp_steps * batch },
        ),
        WalkPattern::Fkc => (
            if recipe.reuse_a { 1.0 } else { fcd_steps },
            if recipe.reuse_b {
                if gemm {
                    if partial { sp_splits } else { 1.0 }
                } else {
                    (if partial { conv_splits } else { 1.0 }) * batch
                }
            } else {
                sp_steps
            },
        ),
        WalkPattern::Kcf | WalkPattern::Kfc => (
            if recipe.reuse_a { 1.0 } else { fcd_steps },
            if recipe.reuse_b {
                if gemm {
                    if partial { sp_splits } else { 1.0 }
                } else if partial {
                    conv_splits
                } else {
                    1.0
                }
            } else {
                sp_steps * if gemm { 1.0 } else { batch }
            },
        ),
    };
    if params.op.is_conv() {
        // Every filter tap re-reads the input window it covers.
        let w = &params.w;
        for dim in 0..MAX_CONV_DIMS - 1 {
            fetch_a *= div_ceil(w.sizes[dim + 2].max(1), params.conv.stride[dim].max(1)) as f64;
        }
    }
    (fetch_a, fetch_b)
}

/// Cycles the read pipes need to stream one input in, across all fetches.
fn read_input_cycles(params: &LayerParams, geo: &GeoAttr, operand: Operand, fetch_nr: f64, penalty: f64) -> f64 {
    let tensor_size: u64 = params.operand(operand).sizes.iter().product();
    let total = fetch_nr * tensor_size as f64;
    let span = match operand {
        Operand::A => geo.geometry_height(),
        _ => geo.geometry_width(),
    };
    let port_size = geo.port_size(operand) as f64;
    let ports = (span as f64 / port_size).max(1.0);
    total * penalty / ports / port_size
}

/// Fraction of the last geometry step along one axis doing useful work.
fn last_step_fill(extent: u64, step: u64) -> f64 {
    let step = step.max(1);
    let last = extent % step;
    let last = if last == 0 { step } else { last };
    last as f64 / step as f64
}

/// The producer operand that perforation splits across dcores, if any.
fn perforated_operand(params: &LayerParams, perforation: Option<PerforationDim>) -> Option<Operand> {
    let dim = perforation?;
    if params.op.is_gemm() {
        match dim {
            PerforationDim::Fcd => Some(Operand::A),
            PerforationDim::Spatial => Some(Operand::B),
            PerforationDim::Batch if params.can_flatten() => Some(Operand::B),
            _ => None,
        }
    } else if params.op.is_fwd_or_dedx() {
        match dim {
            PerforationDim::Fcd => Some(Operand::A),
            PerforationDim::Batch => Some(Operand::B),
            _ => None,
        }
    } else if params.op.is_dedw() {
        match dim {
            PerforationDim::Fcd => Some(Operand::A),
            PerforationDim::Spatial => Some(Operand::B),
            _ => None,
        }
    } else {
        None
    }
}

/// A slice clone whose chosen aspects are shrunk to the tail extent of the
/// full problem's slice grid.
fn tail_slice(params: &LayerParams, slice: &LayerParams, geo: &GeoAttr, aspects: u8) -> LayerParams {
    let mut tail = slice.clone();
    if aspects & TAIL_WIDTH != 0 {
        shrink_to_tail(params, &mut tail, 0);
    }
    if aspects & TAIL_HEIGHT != 0 {
        let dim = if params.op.is_fwd_or_dedx() { 1 + params.conv.spatial_dims_nr } else { 1 };
        shrink_to_tail(params, &mut tail, dim.min(MAX_DIMS - 1));
    }
    if aspects & TAIL_BATCH != 0 {
        shrink_to_tail(params, &mut tail, geo.concurrent_dim);
    }
    tail
}

fn shrink_to_tail(params: &LayerParams, tail: &mut LayerParams, dim: usize) {
    let full = params.operand(Operand::C).sizes[dim];
    let slice = tail.operand(Operand::C).sizes[dim].max(1);
    let last = full % slice;
    tail.operand_mut(Operand::C).sizes[dim] = if last == 0 { slice } else { last };
}
