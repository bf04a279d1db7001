//! Strategy selection: geometry, walking pattern and dedw concurrency.
//!
//! Every decision the caller left open is made here by enumerating the
//! chip's candidates and pricing each one with the cost model. The chosen
//! strategy is written back into the layer parameters; fields the caller
//! already forced are never overridden.

use axion_hal::{Chip, GeoAttr};
use axion_ir::helpers::div_ceil;
use axion_ir::{
    Geometry, LayerParams, MAX_CONV_DIMS, MAX_DIMS, Operand, ReductionOp, TensorView, Toggle, WalkPattern,
};
use snafu::ensure;
use tracing::debug;

use crate::error::{NoCandidateGeometrySnafu, Result};
use crate::perf::Brain;

impl Brain {
    /// Fill in every undecided strategy field of `params`.
    ///
    /// Dedw operations with an undecided concurrency toggle first race the
    /// concurrency modes against each other; everything else defaults to
    /// batch concurrency allowed, cd concurrency off. Then trivial output
    /// dimensions are squeezed out, a geometry and walking pattern are
    /// chosen, and bgemm flattening is applied when profitable.
    pub fn recommend_strategy(&self, params: &mut LayerParams) -> Result<()> {
        if params.op.is_dedw()
            && (params.strategy.cd_concurrency_en == Toggle::Undef
                || params.strategy.batch_concurrency_en == Toggle::Undef)
        {
            self.choose_concurrency(params)?;
        } else {
            if params.strategy.cd_concurrency_en == Toggle::Undef {
                params.strategy.cd_concurrency_en = Toggle::Off;
            }
            if params.strategy.batch_concurrency_en == Toggle::Undef {
                params.strategy.batch_concurrency_en = Toggle::On;
            }
        }
        self.recommend_geometry_and_pattern(params)
    }

    pub(crate) fn recommend_geometry_and_pattern(&self, params: &mut LayerParams) -> Result<()> {
        trivial_dims_reduction(params);
        if params.strategy.geometry.is_none() {
            self.choose_geometry(params)?;
        }
        if params.strategy.pattern.is_none() {
            self.choose_walking_pattern(params);
        }
        self.apply_tensor_flattening(params);
        Ok(())
    }

    /// Race the dedw concurrency modes: cd, batch, hybrid or none. The
    /// winning mode's fully-recommended parameters replace `params`.
    fn choose_concurrency(&self, params: &mut LayerParams) -> Result<()> {
        let base = params.clone();
        let cd = self.concurrency_candidate(&base, false, true)?;
        let batch = self.concurrency_candidate(&base, true, false)?;
        let hybrid = match (&cd, &batch) {
            (Some(_), Some(_)) => self.concurrency_candidate(&base, true, true)?,
            _ => None,
        };

        let accel = |c: &Option<(LayerParams, f64)>| c.as_ref().map_or(0.0, |(_, a)| *a);
        let (cd_accel, batch_accel, hybrid_accel) = (accel(&cd), accel(&batch), accel(&hybrid));
        debug!(cd_accel, batch_accel, hybrid_accel, "dedw concurrency race");

        let chosen = if batch_accel >= cd_accel && batch_accel >= hybrid_accel && batch_accel >= 1.0 {
            batch
        } else if hybrid_accel >= cd_accel && hybrid_accel >= 1.0 {
            hybrid
        } else if cd_accel >= 1.0 {
            cd
        } else {
            None
        };
        match chosen {
            Some((winner, _)) => *params = winner,
            None => {
                params.strategy.batch_concurrency_en = Toggle::Off;
                params.strategy.cd_concurrency_en = Toggle::Off;
            }
        }
        Ok(())
    }

    /// One fully-recommended concurrency mode and its acceleration over a
    /// plain spatial walk. `None` when the mode is forced off or cannot
    /// apply.
    fn concurrency_candidate(
        &self,
        base: &LayerParams,
        batch_en: bool,
        cd_en: bool,
    ) -> Result<Option<(LayerParams, f64)>> {
        if cd_en
            && (base.strategy.cd_concurrency_en == Toggle::Off
                || !base.operand(Operand::C).dtype.supports_reduction())
        {
            return Ok(None);
        }
        if batch_en && (base.strategy.batch_concurrency_en == Toggle::Off || dedw_convertible_to_gemm(base)) {
            return Ok(None);
        }

        let mut candidate = base.clone();
        candidate.strategy.batch_concurrency_en = if batch_en { Toggle::On } else { Toggle::Off };
        candidate.strategy.cd_concurrency_en = if cd_en { Toggle::On } else { Toggle::Off };
        if cd_en {
            // Partial sums from concurrent units meet through memory
            // reduction on store.
            candidate.memory_cfg.reduction_op = ReductionOp::Add;
        }
        self.recommend_geometry_and_pattern(&mut candidate)?;

        let geo = GeoAttr::new(self.chip(), &candidate);
        if cd_en {
            candidate.strategy.reduction_level = geo.geometry_cd_concurrency();
        }
        let mut accel = 1.0;
        if cd_en {
            accel *= self.cd_concurrency_acceleration(&candidate, &geo);
        }
        if batch_en {
            accel *= self.batch_concurrency_acceleration(&candidate, &geo);
        }
        Ok(Some((candidate, accel)))
    }

    fn cd_concurrency_acceleration(&self, params: &LayerParams, geo: &GeoAttr) -> f64 {
        let spatial_steps = spatial_step_count(params, geo) as f64;
        let mut accel = geo.geometry_cd_concurrency() as f64 / spatial_steps;
        // When A keeps recurring misaligned and the ports still interleave
        // the first spatial dim, every second fetch stalls.
        if self.misalignment_period(params, Operand::A) > 1 && geo.sp_interleaving_dim == 1 {
            accel /= 2.0;
        }
        accel
    }

    fn batch_concurrency_acceleration(&self, params: &LayerParams, geo: &GeoAttr) -> f64 {
        let concurrency = geo.geometry_concurrency();
        let filter = params.operand(Operand::C).sizes[geo.concurrent_dim];
        let spatial_steps = spatial_step_count(params, geo) as f64;
        filter as f64 / (div_ceil(filter, concurrency.max(1)) as f64 * spatial_steps)
    }

    /// Price every candidate geometry and keep the fastest. The walking
    /// pattern is re-chosen per candidate (unless forced), and flattening
    /// side effects are rolled back between candidates.
    pub(crate) fn choose_geometry(&self, params: &mut LayerParams) -> Result<()> {
        let candidates = self.geometries(params);
        ensure!(!candidates.is_empty(), NoCandidateGeometrySnafu);

        let original = params.clone();
        let pattern_unset = params.strategy.pattern.is_none();
        let mut best: Option<(Geometry, f64)> = None;
        for geometry in candidates {
            params.strategy.geometry = Some(geometry);
            if pattern_unset {
                self.choose_walking_pattern(params);
            }
            self.apply_tensor_flattening(params);
            let attr = self.perf_attr(params, None)?;
            debug!(geometry = %geometry, cycles = attr.expected_runtime_cycles, "candidate geometry");
            if best.is_none_or(|(_, cycles)| attr.expected_runtime_cycles < cycles) {
                best = Some((geometry, attr.expected_runtime_cycles));
            }
            if pattern_unset {
                params.strategy.pattern = None;
            }
            params.x = original.x.clone();
            params.w = original.w.clone();
            params.y = original.y.clone();
        }
        if let Some((geometry, _)) = best {
            params.strategy.geometry = Some(geometry);
        }
        Ok(())
    }

    /// Candidate geometries for this shape, per chip generation.
    pub(crate) fn geometries(&self, params: &LayerParams) -> Vec<Geometry> {
        let fcd = params.fcd_size();
        let sp = params.spatial_size();
        match self.chip() {
            Chip::Gaudi => vec![Geometry::FourXw, Geometry::TwoXw, Geometry::FourXh],
            Chip::Gaudi2 => vec![Geometry::TwoXh, Geometry::TwoXw, Geometry::FourXh, Geometry::FourXw],
            Chip::Gaudi3 => {
                let unit = 256;
                if params.op.is_gemm() && params.batch_size(1) >= self.caps().dcore_nr {
                    // Enough batch to feed every dcore: stay square-ish and
                    // let the batch dims perforate.
                    if fcd <= unit && sp <= unit {
                        return vec![Geometry::FourXh];
                    }
                    return vec![Geometry::FourXh, Geometry::FourXw];
                }
                let mut candidates = Vec::new();
                if fcd >= 2 * unit {
                    if sp >= 2 * unit {
                        candidates.push(Geometry::TwoXw);
                    }
                    if fcd >= 4 * unit {
                        candidates.push(Geometry::FourXw);
                    }
                }
                if sp >= 2 * unit {
                    if fcd > unit {
                        candidates.push(Geometry::TwoXh);
                    }
                    if sp >= 4 * unit {
                        candidates.push(Geometry::FourXh);
                    }
                }
                if candidates.is_empty() {
                    candidates.push(Geometry::TwoXh);
                }
                candidates
            }
        }
    }

    /// Candidate walking patterns under the already-chosen geometry.
    pub(crate) fn patterns(&self, params: &LayerParams) -> Vec<WalkPattern> {
        if params.op.is_dma() {
            return vec![WalkPattern::Fck];
        }
        let geo = GeoAttr::new(self.chip(), params);
        let fcd_steps = div_ceil(params.fcd_size(), geo.geometry_width());
        let sp_steps = div_ceil(params.spatial_size(), geo.geometry_height());

        let mut candidates = Vec::new();
        if params.op.is_fwd_or_dedx() {
            if fcd_steps > 1 {
                candidates.push(WalkPattern::Skf);
            }
            if sp_steps > 1 {
                candidates.push(WalkPattern::Ksf);
            }
            if candidates.is_empty() {
                candidates.push(WalkPattern::Skf);
            }
        } else {
            let down_first = if params.op.is_dedw() { WalkPattern::Kfc } else { WalkPattern::Fkc };
            if fcd_steps > 1 {
                candidates.push(WalkPattern::Fck);
            }
            if sp_steps > 1 {
                candidates.push(down_first);
            }
            if candidates.is_empty() {
                candidates.push(WalkPattern::Fck);
            }
        }
        candidates
    }

    /// Walk the bigger axis innermost so the reused operand stays resident.
    pub(crate) fn choose_walking_pattern(&self, params: &mut LayerParams) {
        if params.op.is_dma() {
            params.strategy.pattern = Some(WalkPattern::Fck);
            return;
        }
        let geo = GeoAttr::new(self.chip(), params);
        let fcd_steps = div_ceil(params.fcd_size(), geo.geometry_width());
        let sp_steps = div_ceil(params.spatial_size(), geo.geometry_height());

        let pattern = if params.op.is_fwd_or_dedx() {
            match geo.geometry {
                Geometry::FourXw => {
                    if sp_steps > 1 {
                        WalkPattern::Ksf
                    } else {
                        WalkPattern::Skf
                    }
                }
                _ => {
                    if fcd_steps > 1 {
                        WalkPattern::Skf
                    } else {
                        WalkPattern::Ksf
                    }
                }
            }
        } else {
            let down_first = if params.op.is_dedw() { WalkPattern::Kfc } else { WalkPattern::Fkc };
            match geo.geometry {
                Geometry::FourXw => {
                    if sp_steps > 1 {
                        down_first
                    } else {
                        WalkPattern::Fck
                    }
                }
                _ => {
                    if fcd_steps > 1 {
                        WalkPattern::Fck
                    } else {
                        down_first
                    }
                }
            }
        };
        params.strategy.pattern = Some(pattern);
    }
}

/// A dedw whose filter is pointwise and whose conv fields are trivial
/// computes the same thing as a plain gemm; batch concurrency over the
/// filter dims has nothing to win there.
fn dedw_convertible_to_gemm(params: &LayerParams) -> bool {
    params.op.is_dedw()
        && params.conv.is_trivial()
        && params.w.sizes[2] == 1
        && params.w.sizes[3] == 1
        && params.w.sizes[4] == 1
}

fn spatial_step_count(params: &LayerParams, geo: &GeoAttr) -> u64 {
    div_ceil(params.fcd_size(), geo.geometry_width()) * div_ceil(params.spatial_size(), geo.geometry_height())
}

/// Squeeze out trivial output dimensions so the walk and the geometry see
/// the smallest equivalent shape. A dimension is kept when any view has a
/// non-unit extent or non-zero base there, or (for conv) when its padding
/// or filter extent still matters.
pub fn trivial_dims_reduction(params: &mut LayerParams) {
    if params.op.is_dma() {
        return;
    }
    let bgemm = params.op.is_gemm() || params.op.is_reduction_add();

    let mut valid = [false; MAX_DIMS];
    valid[0] = true;
    if bgemm {
        valid[1] = true;
    }
    let first = if bgemm { 2 } else { 1 };
    for dim in first..MAX_DIMS {
        valid[dim] = if bgemm {
            params.x.sizes[dim] != 1
                || params.y.sizes[dim] != 1
                || params.w.sizes[dim] != 1
                || params.x.bases[dim] != 0
                || params.y.bases[dim] != 0
                || params.w.bases[dim] != 0
        } else {
            let conv_dim = dim - 1;
            let (padding, filter) = if conv_dim < MAX_CONV_DIMS - 1 {
                (params.conv.padding[conv_dim], params.w.sizes[dim + 1])
            } else {
                (0, 1)
            };
            params.x.sizes[dim] != 1
                || params.y.sizes[dim] != 1
                || params.x.bases[dim] != 0
                || params.y.bases[dim] != 0
                || padding != 0
                || filter != 1
        };
    }

    let mut shifted = 0;
    let mut prev: Option<usize> = None;
    for dim in 0..MAX_DIMS {
        if !valid[dim] {
            continue;
        }
        if let Some(p) = prev {
            let trivial = p + 1;
            let distance = dim - trivial;
            if distance > 0 {
                shift_dimensions(params, trivial - shifted, distance);
                shifted += distance;
            }
        }
        prev = Some(dim);
    }
}

/// Shift every dimension above `trivial_dim` down by `distance`, dropping
/// the trivial ones. Conv fields shift with their spatial dimension; the
/// vacated top dimensions become unit-sized.
fn shift_dimensions(params: &mut LayerParams, trivial_dim: usize, distance: usize) {
    let bgemm = params.op.is_gemm() || params.op.is_reduction_add();
    for _ in 0..distance {
        for dim in trivial_dim..MAX_DIMS - 1 {
            let weight_dim = if bgemm { dim } else { dim + 1 };
            shift_view_dim(&mut params.x, dim);
            shift_view_dim(&mut params.y, dim);
            if weight_dim < MAX_DIMS - 1 {
                shift_view_dim(&mut params.w, weight_dim);
            }
            if (1..MAX_CONV_DIMS - 1).contains(&dim) {
                params.conv.stride[dim - 1] = params.conv.stride[dim];
                params.conv.dilation[dim - 1] = params.conv.dilation[dim];
                params.conv.padding[dim - 1] = params.conv.padding[dim];
            }
        }
        reset_top_dim(&mut params.x);
        reset_top_dim(&mut params.y);
        reset_top_dim(&mut params.w);
        params.conv.stride[MAX_CONV_DIMS - 2] = 1;
        params.conv.dilation[MAX_CONV_DIMS - 2] = 1;
        params.conv.padding[MAX_CONV_DIMS - 2] = 0;
    }
}

fn shift_view_dim(view: &mut TensorView, dim: usize) {
    view.sizes[dim] = view.sizes[dim + 1];
    view.bases[dim] = view.bases[dim + 1];
    view.dcore_bases[dim] = view.dcore_bases[dim + 1];
    view.strides[dim] = view.strides[dim + 1];
}

fn reset_top_dim(view: &mut TensorView) {
    view.sizes[MAX_DIMS - 1] = 1;
    view.bases[MAX_DIMS - 1] = 0;
    view.dcore_bases[MAX_DIMS - 1] = 0;
}
