//! Descriptor builder: turns decomposed sub-problems into activations.
//!
//! One activation holds the register image of every MME unit cooperating
//! on one recipe iteration. Chips differ in register extensions (cache
//! directives, dual gemm, EU tracing) but share the population logic, so
//! the per-chip builders delegate to a common routine and extend it.
//!
//! Multi-dcore execution compiles each dcore's command stream
//! independently: every dcore walks the full iteration space driving its
//! slice of the unit grid, dcores are padded to the same activation count
//! with null descriptors and only then are the per-dcore lists merged
//! into whole-workload activations.

use axion_hal::{Chip, ChipCaps, GeoAttr};
use axion_ir::helpers::div_ceil;
use axion_ir::{Geometry, LayerParams, MAX_DIMS, Operand, OperandRole, SignalingMode, TensorView, TraceMode};
use smallvec::SmallVec;
use snafu::ensure;
use tracing::debug;

use crate::descriptor::{
    AssociatedDims, DIM_NONE, Descriptor, MAX_CONV_LOOPS, PerfEvt, RateLimiter, SyncObjectVal,
};
use crate::error::{Result, StrategyOpMismatchSnafu, UnsupportedChipSnafu};
use crate::recipe::RecipeIteration;
use crate::subproblem::{AddressOffset, SubProblem, SubProblems, decompose};
use crate::validate::validate_params;

/// Everything the per-unit population needs beyond the sub-problem and
/// its recipe iteration.
#[derive(Debug, Clone, Copy)]
pub struct BuildCtx {
    /// Unit index within the cooperating geometry grid.
    pub unit: u64,
    pub dcore: usize,
    /// Signals every unit of this activation must fire.
    pub signal_nr: u16,
    /// First / last activation of this dcore's command stream.
    pub stream_first: bool,
    pub stream_last: bool,
}

/// One recipe iteration materialized: a descriptor per cooperating unit
/// plus the metadata downstream signaling arithmetic needs.
#[derive(Debug, Clone)]
pub struct Activation {
    pub descs: SmallVec<[Descriptor; 8]>,
    /// Signals fired by each unit of this activation.
    pub signal_nr: u16,
    pub is_last: bool,
    /// Store-rollup events this activation completes.
    pub rollups_nr: u64,
    /// Store-cast events this activation completes.
    pub tetrises_nr: u64,
    pub fcd_idx: usize,
    pub sp_idx: usize,
    pub non_spatial_idx: usize,
    pub address_offset: AddressOffset,
}

/// Per-chip register-image population.
pub trait DescriptorBuilder {
    fn chip(&self) -> Chip;

    /// Whether the chip can drive a second gemm from one descriptor.
    fn supports_dual_gemm(&self) -> bool {
        false
    }

    fn rate_limiter(&self) -> RateLimiter {
        RateLimiter { agu_a: 4, agu_b: 4, agu_out: 4, eu: 0 }
    }

    /// Populate one unit's register image for one recipe iteration.
    fn build(&self, sub: &SubProblem, geo: &GeoAttr, it: &RecipeIteration, ctx: &BuildCtx) -> Descriptor;
}

/// Select the builder for `chip`.
pub fn builder_for_chip(chip: Chip) -> Result<Box<dyn DescriptorBuilder>> {
    match chip {
        Chip::Gaudi2 => Ok(Box::new(Gaudi2Builder)),
        Chip::Gaudi3 => Ok(Box::new(Gaudi3Builder)),
        Chip::Gaudi => UnsupportedChipSnafu { chip }.fail(),
    }
}

pub struct Gaudi2Builder;

impl DescriptorBuilder for Gaudi2Builder {
    fn chip(&self) -> Chip {
        Chip::Gaudi2
    }

    fn build(&self, sub: &SubProblem, geo: &GeoAttr, it: &RecipeIteration, ctx: &BuildCtx) -> Descriptor {
        let mut desc = populate_unit(sub, geo, it, ctx);
        desc.rate_limiter = self.rate_limiter();
        // The output stream carries its coloring id in the AXI user bits.
        let mc_id = sub.params.memory_cfg.mc_id[2];
        desc.axi_user_data.first = mc_id;
        desc.axi_user_data.steady = mc_id;
        desc
    }
}

pub struct Gaudi3Builder;

impl DescriptorBuilder for Gaudi3Builder {
    fn chip(&self) -> Chip {
        Chip::Gaudi3
    }

    fn supports_dual_gemm(&self) -> bool {
        true
    }

    fn build(&self, sub: &SubProblem, geo: &GeoAttr, it: &RecipeIteration, ctx: &BuildCtx) -> Descriptor {
        let mut desc = populate_unit(sub, geo, it, ctx);
        desc.rate_limiter = self.rate_limiter();

        // Cache fabric directives exist only on this generation.
        let mem = &sub.params.memory_cfg;
        for (slot, cache) in [&mut desc.cache_a, &mut desc.cache_b, &mut desc.cache_out].into_iter().enumerate() {
            cache.directive = mem.cache_directive[slot];
            cache.class = mem.cache_class[slot];
            cache.mc_id = mem.mc_id[slot];
        }
        desc.axi_user_data.first = mem.mc_id[2];
        desc.axi_user_data.steady = mem.mc_id[2];

        // EU tracing: per-engine events on top of the activation events.
        if sub.params.tracing.trace_mode == TraceMode::Advanced {
            desc.perf_evt_in.inc_mask = true;
            desc.perf_evt_out.inc_mask = true;
        }
        desc
    }
}

/// The compiled form of one operation: its decomposition and the merged,
/// ordered activation stream.
#[derive(Debug, Clone)]
pub struct CompiledOp {
    pub chip: Chip,
    /// Caller-supplied parameters, untouched by decomposition.
    pub params: LayerParams,
    pub sub_problems: SubProblems,
    pub activations: Vec<Activation>,
    /// Post-padding activation count per dcore. All entries are equal.
    pub activations_per_dcore: Vec<usize>,
}

impl CompiledOp {
    /// Late-bind the operand buffer addresses, applying each activation's
    /// decomposition offsets on top.
    pub fn patch_tensor_addresses(&mut self, base_x: u64, base_w: u64, base_y: u64) {
        let op = self.params.op;
        let elem_a = self.params.operand(Operand::A).dtype.size_bytes() as i64;
        let elem_b = self.params.operand(Operand::B).dtype.size_bytes() as i64;
        let elem_c = self.params.operand(Operand::C).dtype.size_bytes() as i64;
        let base_of = |role: OperandRole| match role {
            OperandRole::X => base_x,
            OperandRole::W => base_w,
            OperandRole::Y => base_y,
        };
        for activation in &mut self.activations {
            let delta = |role: OperandRole, elem: i64| -> u64 {
                let elems: i64 = activation.address_offset.view(role).iter().sum();
                (base_of(role) as i64 + elems * elem) as u64
            };
            let a = delta(op.role_of(Operand::A), elem_a);
            let b = delta(op.role_of(Operand::B), elem_b);
            let c = delta(op.role_of(Operand::C), elem_c);
            for desc in &mut activation.descs {
                desc.base_addr_a = a;
                desc.base_addr_b = b;
                desc.base_addr_cout = c;
                desc.base_addr_cout1 = c;
            }
        }
    }

    /// Late-bind the sync-object addresses the completion signals target.
    pub fn patch_sync_object(&mut self, so0_addr: u32, so1_addr: u32) {
        for activation in &mut self.activations {
            for desc in &mut activation.descs {
                desc.sync_object.so0_addr = so0_addr;
                desc.sync_object.so1_addr = so1_addr;
            }
        }
    }

    /// Late-bind the profiling context id.
    pub fn patch_context_id(&mut self, ctx_id: u16) {
        for activation in &mut self.activations {
            for desc in &mut activation.descs {
                desc.wkld_id = u32::from(ctx_id);
                desc.perf_evt_in.value = ctx_id;
                desc.perf_evt_out.value = ctx_id;
            }
        }
    }

    /// Late-bind the per-operand memory-coloring ids.
    pub fn patch_mc_ids(&mut self, mc_id: [u16; 3]) {
        for activation in &mut self.activations {
            for desc in &mut activation.descs {
                desc.cache_a.mc_id = mc_id[0];
                desc.cache_b.mc_id = mc_id[1];
                desc.cache_out.mc_id = mc_id[2];
                desc.axi_user_data.first = mc_id[2];
                desc.axi_user_data.steady = mc_id[2];
            }
        }
    }

    pub fn total_signals(&self) -> u64 {
        self.activations.iter().map(|a| a.descs.iter().map(|d| u64::from(d.signal_nr())).sum::<u64>()).sum()
    }
}

/// Front door of the descriptor stage.
pub struct DescGenerator {
    chip: Chip,
    caps: ChipCaps,
    builder: Box<dyn DescriptorBuilder>,
}

impl DescGenerator {
    pub fn new(chip: Chip) -> Result<Self> {
        let builder = builder_for_chip(chip)?;
        Ok(Self { chip, caps: chip.caps(), builder })
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    /// Validate, decompose and compile `params` into its activation stream.
    ///
    /// The strategy must be fully decided (geometry and pattern chosen)
    /// before compilation.
    pub fn compile(&self, params: &LayerParams) -> Result<CompiledOp> {
        validate_params(params)?;
        ensure!(
            !params.strategy.dual_gemm || self.builder.supports_dual_gemm(),
            StrategyOpMismatchSnafu { field: "dual_gemm", op: params.op }
        );

        let mut sub_problems = decompose(self.chip, params)?;
        let mut per_dcore = self.generate_activations(&mut sub_problems);
        self.generate_null_descs(&sub_problems, &mut per_dcore);
        let activations_per_dcore: Vec<usize> = per_dcore.iter().map(Vec::len).collect();
        let activations = reorder_dcore_activations(per_dcore);

        debug!(
            op = %params.op,
            sub_problems = sub_problems.len(),
            activations = activations.len(),
            "compiled"
        );
        Ok(CompiledOp {
            chip: self.chip,
            params: params.clone(),
            sub_problems,
            activations,
            activations_per_dcore,
        })
    }

    /// Build each dcore's activation list over every sub-problem's recipe.
    ///
    /// The geometry spans the whole chip; every dcore walks the full
    /// iteration space and drives its contiguous slice of the unit grid,
    /// so the dcores jointly cover each tile. Perforated tensors shift per
    /// dcore through their `dcore_bases`, not through the walk.
    fn generate_activations(&self, sub_problems: &mut SubProblems) -> Vec<Vec<Activation>> {
        let dcore_nr = self.caps.dcore_nr as usize;
        let mut per_dcore = Vec::with_capacity(dcore_nr);

        for dcore in 0..dcore_nr {
            let mut work: Vec<(usize, RecipeIteration)> = Vec::new();
            for sub_idx in 0..sub_problems.len() {
                for it in sub_problems.get(sub_idx).recipe.iter() {
                    work.push((sub_idx, it));
                }
            }

            let mut activations = Vec::with_capacity(work.len());
            let total = work.len();
            for (pos, (sub_idx, it)) in work.into_iter().enumerate() {
                sub_problems.current = Some(sub_idx);
                let sub = sub_problems.get(sub_idx);
                let geo = GeoAttr::new(self.chip, &sub.params);
                let stream_first = pos == 0;
                let stream_last = pos + 1 == total;
                let signal_nr = signals_for_iteration(&sub.params, &it, stream_last);

                // Unit indices address the whole-chip grid; each dcore
                // owns the contiguous slice starting at its base.
                let units = (geo.mme_nr / dcore_nr as u64).max(1);
                let unit_base = dcore as u64 * units;
                let mut descs: SmallVec<[Descriptor; 8]> = SmallVec::with_capacity(units as usize);
                for unit in unit_base..unit_base + units {
                    let ctx = BuildCtx { unit, dcore, signal_nr, stream_first, stream_last };
                    descs.push(self.builder.build(sub, &geo, &it, &ctx));
                }
                assert!(
                    descs.iter().all(|d| d.signal_nr() == signal_nr),
                    "signal count diverged across units of {} activation {pos}",
                    sub.params.op
                );

                activations.push(Activation {
                    descs,
                    signal_nr,
                    is_last: stream_last,
                    rollups_nr: u64::from(it.is_last_partial),
                    tetrises_nr: u64::from(it.is_last_partial),
                    fcd_idx: it.fcd_idx,
                    sp_idx: it.sp_idx,
                    non_spatial_idx: it.non_spatial_idx,
                    address_offset: sub.address_offset,
                });
            }
            per_dcore.push(activations);
        }
        sub_problems.current = None;
        per_dcore
    }

    /// Pad every dcore to the global maximum activation count with
    /// null descriptors, carrying the residual signals needed so all
    /// dcores end at the same total signal count.
    fn generate_null_descs(&self, sub_problems: &SubProblems, per_dcore: &mut [Vec<Activation>]) {
        let max_len = per_dcore.iter().map(Vec::len).max().unwrap_or(0);
        let max_signals: u64 = per_dcore
            .iter()
            .map(|list| list.iter().map(|a| u64::from(a.signal_nr)).sum())
            .max()
            .unwrap_or(0);
        let last = sub_problems.get(sub_problems.len() - 1);
        let dtype = last.params.operand(Operand::A).dtype;
        let geo = GeoAttr::new(self.chip, &last.params);
        let units = (geo.mme_nr as usize / per_dcore.len()).max(1);

        for (dcore, list) in per_dcore.iter_mut().enumerate() {
            let mut residual: u64 = max_signals - list.iter().map(|a| u64::from(a.signal_nr)).sum::<u64>();
            if list.len() < max_len {
                debug!(dcore, pad = max_len - list.len(), residual, "padding dcore with null descriptors");
            }
            while list.len() < max_len {
                let signal_nr = residual.min(u64::from(u16::MAX)) as u16;
                residual -= u64::from(signal_nr);
                let descs: SmallVec<[Descriptor; 8]> =
                    (0..units).map(|_| Descriptor::null(dtype, signal_nr)).collect();
                if let Some(prev) = list.last_mut() {
                    prev.is_last = false;
                }
                list.push(Activation {
                    descs,
                    signal_nr,
                    is_last: true,
                    rollups_nr: 0,
                    tetrises_nr: 0,
                    fcd_idx: 0,
                    sp_idx: 0,
                    non_spatial_idx: 0,
                    address_offset: AddressOffset::default(),
                });
            }
        }
        let first = per_dcore.first().map_or(0, Vec::len);
        assert!(
            per_dcore.iter().all(|list| list.len() == first),
            "dcore activation counts diverged after null-descriptor padding"
        );
    }
}

/// Merge the per-dcore partial lists into whole-workload activations:
/// activation `i` of the result owns the descriptors every dcore executes
/// at position `i`.
fn reorder_dcore_activations(per_dcore: Vec<Vec<Activation>>) -> Vec<Activation> {
    let mut per_dcore = per_dcore;
    if per_dcore.len() == 1 {
        return per_dcore.pop().unwrap_or_default();
    }
    let len = per_dcore.first().map_or(0, Vec::len);
    assert!(per_dcore.iter().all(|list| list.len() == len), "dcore activation counts must be equal before merging");

    let mut merged = Vec::with_capacity(len);
    for i in (0..len).rev() {
        let mut parts: Vec<Activation> = per_dcore.iter_mut().map(|list| list.remove(i)).collect();
        let mut whole = parts.remove(0);
        for part in parts {
            whole.descs.extend(part.descs);
            whole.signal_nr += part.signal_nr;
            whole.rollups_nr += part.rollups_nr;
            whole.tetrises_nr += part.tetrises_nr;
            whole.is_last |= part.is_last;
        }
        merged.push(whole);
    }
    merged.reverse();
    merged
}

/// Per-unit signal count this iteration must fire under the requested
/// signaling mode. `stream_last` refers to this dcore's command stream.
fn signals_for_iteration(params: &LayerParams, it: &RecipeIteration, stream_last: bool) -> u16 {
    match params.controls.signaling_mode {
        SignalingMode::None => 0,
        SignalingMode::Once => u16::from(stream_last),
        SignalingMode::Desc => 1,
        SignalingMode::DescWithStore | SignalingMode::Chunk | SignalingMode::Output => u16::from(it.is_last_partial),
        SignalingMode::Amount => {
            if stream_last {
                params.controls.signal_amount.min(u64::from(u16::MAX)) as u16
            } else {
                0
            }
        }
        // Rejected by validation before compilation starts.
        SignalingMode::Partial => unreachable!("partial signaling reached the builder"),
    }
}

fn as_u32(v: u64) -> u32 {
    v.min(u64::from(u32::MAX)) as u32
}

fn as_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Chip-independent register population for one unit.
fn populate_unit(sub: &SubProblem, geo: &GeoAttr, it: &RecipeIteration, ctx: &BuildCtx) -> Descriptor {
    let p = &sub.params;
    let recipe = &sub.recipe;
    let a = p.operand(Operand::A);
    let b = p.operand(Operand::B);
    let c = p.operand(Operand::C);

    let mut desc = Descriptor::zeroed(a.dtype);
    desc.header.data_type_out = c.dtype;

    // The unit's slot in the cooperating grid and its share of the tile.
    let grid_fcd = geo.fcd_mme_nr();
    let unit_fcd = ctx.unit % grid_fcd;
    let unit_sp = ctx.unit / grid_fcd;
    let unit_width = geo.geometry_width() / grid_fcd;
    let unit_height = geo.geometry_height() / geo.spatial_mme_nr();

    let fcd = recipe.fcd_subviews[it.fcd_idx];
    let sp = recipe.sp_subviews[it.sp_idx];
    let unit_fcd_size =
        (fcd.size as i64 - (unit_fcd * unit_width) as i64).clamp(0, unit_width as i64) as u64;
    let unit_sp_size =
        (sp.size as i64 - (unit_sp * unit_height) as i64).clamp(0, unit_height as i64) as u64;

    // A unit whose share of this tile is empty still has to match its
    // siblings' signal count.
    if unit_fcd_size == 0 || unit_sp_size == 0 {
        let mut null = Descriptor::null(a.dtype, ctx.signal_nr);
        null.sync_object.slave_signal_en = p.controls.slave_signaling;
        return null;
    }

    if sub.memset {
        populate_memset(&mut desc, sub, ctx, unit_fcd_size, unit_sp_size);
        finish_signaling(&mut desc, p, ctx);
        populate_perf_events(&mut desc, p, ctx);
        return desc;
    }

    desc.header.trans_a = geo.transpose_a;
    desc.header.trans_b = geo.transpose_b;
    desc.header.lower_a = recipe.lowering;
    desc.header.accum_en = it.partial_idx > 0;
    desc.header.store_en = it.is_last_partial;
    desc.header.double_accums = geo.double_accums;
    desc.header.hx2 = matches!(geo.geometry, Geometry::TwoXh | Geometry::FourXh);
    desc.header.advance_a = p.op.is_conv();
    desc.header.advance_b = p.op.is_dedx_family();
    desc.header.advance_c = p.op.is_dedw();
    desc.header.store_color_set =
        if p.controls.use_same_color_set { 0 } else { (it.non_spatial_idx % 2) as u8 };

    desc.ctrl.bgemm = p.op.is_gemm();
    desc.ctrl.clip_fp_eu = p.controls.clipping_en;
    desc.ctrl.clip_fp_ap = p.controls.clipping_en;
    desc.ctrl.sb_a_cache_en = p.controls.sb_cache_en;
    desc.ctrl.sb_b_cache_en = p.controls.sb_cache_en;
    desc.ctrl.rounding_mode = p.controls.rounding_mode;
    desc.ctrl.relu_en = p.controls.relu_en;
    desc.ctrl.no_rollup = !it.is_last_partial;

    // Output tensor: the ROI is this unit's share of the current tile.
    populate_tensor(&mut desc.tensor_cout, c, ctx.dcore);
    desc.tensor_cout.roi_size[0] = as_i32((unit_fcd_size * c.strides[0]) as i64);
    desc.tensor_cout.roi_size[1] = as_i32((unit_sp_size * c.strides[1]) as i64);
    desc.tensor_cout.loop_stride[0] = as_i32(geo.geometry_width() as i64);
    desc.tensor_cout.loop_stride[1] = as_i32((geo.geometry_height() * c.strides[1]) as i64);

    // Operand A walks the spatial axis; its dense dim is the common dim.
    populate_tensor(&mut desc.tensor_a, a, ctx.dcore);
    desc.tensor_a.roi_size[1] = as_i32((unit_sp_size * a.strides[1]) as i64);
    desc.tensor_a.loop_stride[1] = as_i32((geo.geometry_height() * a.strides[1]) as i64);
    if p.op.is_conv() {
        for dim in 0..p.conv.spatial_dims_nr {
            let td = dim + 1;
            desc.tensor_a.loop_stride[td] = as_i32((p.conv.dilation[dim] * a.strides[td]) as i64);
        }
    }

    // Operand B walks the fcd axis.
    populate_tensor(&mut desc.tensor_b, b, ctx.dcore);
    desc.tensor_b.roi_size[0] = as_i32((unit_fcd_size * b.strides[0]) as i64);
    desc.tensor_b.loop_stride[0] = as_i32(geo.geometry_width() as i64);

    // AGU bases: tile base plus this unit's offset within the geometry.
    desc.agu_out.roi_base_offset[0] = (fcd.base + unit_fcd * unit_width) as i64;
    desc.agu_out.roi_base_offset[1] = ((sp.base + unit_sp * unit_height) * c.strides[1]) as i64;
    desc.agu_a.roi_base_offset[1] = ((sp.base + unit_sp * unit_height) * a.strides[1]) as i64;
    desc.agu_b.roi_base_offset[0] = (fcd.base + unit_fcd * unit_width) as i64;
    if it.batch_idx > 0 {
        let dim = geo.concurrent_dim;
        let step = it.batch_idx * geo.geometry_concurrency();
        desc.agu_out.roi_base_offset[dim] = (step * c.strides[dim]) as i64;
        if p.op.is_gemm() {
            desc.agu_a.roi_base_offset[dim] = (step * a.strides[dim]) as i64;
            desc.agu_b.roi_base_offset[dim] = (step * b.strides[dim]) as i64;
        }
    }

    desc.spatial_size_minus_1_a = as_u32(unit_sp_size - 1);
    desc.spatial_size_minus_1_cout = as_u32(unit_sp_size - 1);

    // Common dimension: each partial accumulation reads its own CD chunk.
    // A walks the CD on dim 0, B on dim 1.
    let cd = p.single_gemm_cd().max(1);
    let cd_chunk = div_ceil(cd, recipe.partials_nr.max(1));
    let cd_base = it.partial_idx * cd_chunk;
    let cd_size = (cd - cd_base.min(cd)).min(cd_chunk).max(1);
    desc.spatial_size_minus_1_b = as_u32(cd_size - 1);
    if it.partial_idx > 0 {
        desc.agu_a.roi_base_offset[0] = (cd_base * a.strides[0]) as i64;
        desc.agu_b.roi_base_offset[1] = (cd_base * b.strides[1]) as i64;
    }

    populate_conv_loops(&mut desc, sub, geo);

    desc.sb_repeat.repeat_a_mask = u8::from(it.reuse_a);
    desc.sb_repeat.repeat_b_mask = u8::from(it.reuse_b);

    desc.fp8_bias.a = p.controls.fp8_bias_in as u8;
    desc.fp8_bias.b = p.controls.fp8_bias_in2 as u8;
    desc.fp8_bias.out = p.controls.fp8_bias_out as u8;

    finish_signaling(&mut desc, p, ctx);
    populate_perf_events(&mut desc, p, ctx);
    desc.wkld_id = u32::from(p.tracing.ctx_id);
    desc
}

/// Static per-view fields shared by every operand: valid extents, spatial
/// strides and dcore-shifted start offsets.
fn populate_tensor(tensor: &mut crate::descriptor::TensorDesc, view: &TensorView, dcore: usize) {
    for dim in 0..MAX_DIMS {
        tensor.valid_elements[dim] = as_u32(view.sizes[dim] * view.strides[dim]);
        if dim < MAX_DIMS - 1 {
            let base = view.bases[dim + 1] + view.dcore_bases[dim + 1] * dcore as u64;
            tensor.roi_size[dim] = as_i32((view.sizes[dim + 1] * view.strides[dim + 1]) as i64);
            tensor.spatial_strides[dim] = as_u32(view.strides[dim + 1]);
            tensor.start_offset[dim] = as_i32((base * view.strides[dim + 1]) as i64);
        }
    }
    tensor.roi_size[0] = as_i32((view.sizes[0] * view.strides[0]) as i64);
}

/// Conv loop block and the outer (batch / filter) loop.
fn populate_conv_loops(desc: &mut Descriptor, sub: &SubProblem, geo: &GeoAttr) {
    let p = &sub.params;
    let w = p.view(OperandRole::W);

    if p.op.is_conv() {
        for dim in 0..p.conv.spatial_dims_nr.min(MAX_CONV_LOOPS) {
            desc.conv.kernel_size_minus_1[dim] = w.sizes[dim + 2].saturating_sub(1).min(u64::from(u8::MAX)) as u8;
            desc.conv.associated_dims[dim] = AssociatedDims {
                dim_a: (dim + 1) as u8,
                dim_b: (dim + 2) as u8,
                dim_out: DIM_NONE,
            };
        }
        let batch_dim = (MAX_DIMS - 1) as u8;
        desc.outer_loop.associated_dims = if p.op.is_dedw() {
            AssociatedDims { dim_a: batch_dim, dim_b: batch_dim, dim_out: DIM_NONE }
        } else {
            AssociatedDims { dim_a: batch_dim, dim_b: DIM_NONE, dim_out: batch_dim }
        };
    } else if geo.supports_concurrency {
        let dim = geo.concurrent_dim as u8;
        desc.outer_loop.associated_dims = AssociatedDims { dim_a: dim, dim_b: dim, dim_out: dim };
    }
    desc.outer_loop.size_minus_1 =
        sub.recipe.batch_steps.saturating_sub(1).min(u64::from(u8::MAX)) as u8;
}

/// A memset descriptor writes the padding value over its output share and
/// reads nothing: minimal input ROIs, store always on.
fn populate_memset(desc: &mut Descriptor, sub: &SubProblem, ctx: &BuildCtx, unit_fcd_size: u64, unit_sp_size: u64) {
    let p = &sub.params;
    let c = p.operand(Operand::C);

    desc.header.store_en = true;
    desc.ctrl.no_rollup = true;
    desc.tensor_a.valid_elements[0] = 1;
    desc.tensor_a.roi_size[0] = 1;
    desc.tensor_b.valid_elements[0] = 1;
    desc.tensor_b.roi_size[0] = 1;

    populate_tensor(&mut desc.tensor_cout, c, ctx.dcore);
    desc.tensor_cout.roi_size[0] = as_i32((unit_fcd_size * c.strides[0]) as i64);
    desc.tensor_cout.roi_size[1] = as_i32((unit_sp_size * c.strides[1]) as i64);
    desc.spatial_size_minus_1_cout = as_u32(unit_sp_size - 1);
}

fn finish_signaling(desc: &mut Descriptor, p: &LayerParams, ctx: &BuildCtx) {
    if ctx.signal_nr > 0 {
        desc.sync_object.signal_en0 = true;
        desc.sync_object.so0_val =
            SyncObjectVal { value: ctx.signal_nr, perf_en: p.tracing.trace_mode != TraceMode::None, op_add: true };
    }
    desc.sync_object.slave_signal_en = p.controls.slave_signaling;
}

fn populate_perf_events(desc: &mut Descriptor, p: &LayerParams, ctx: &BuildCtx) {
    let start_end = match p.tracing.trace_mode {
        TraceMode::None => return,
        TraceMode::LayerAct => u8::from(ctx.stream_first) | (u8::from(ctx.stream_last) << 1),
        TraceMode::Desc | TraceMode::Advanced => 0b11,
    };
    desc.perf_evt_in = PerfEvt {
        value: p.tracing.ctx_id,
        rst: true,
        inc_mask: false,
        start_end_mask: start_end,
        loop_mask: 0,
        operand: 0b11,
    };
    desc.perf_evt_out = PerfEvt { operand: 0b100, ..desc.perf_evt_in };
}
