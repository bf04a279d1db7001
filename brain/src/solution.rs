//! Solution enumeration for slicing-aware callers.
//!
//! Instead of committing to one strategy, a graph compiler can ask for
//! every distinct (geometry, pattern, concurrency) combination together
//! with its price tag and scheduling requirements, then pick after slicing
//! decisions are known. Solutions that would execute identically are
//! deduplicated.

use axion_hal::GeoAttr;
use axion_ir::helpers::div_ceil;
use axion_ir::{DType, LayerParams, MAX_DIMS, Operand, Strategy, Toggle, WalkPattern};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::Result;
use crate::perf::{Brain, PerfAttr};

/// Output axis the dcores split between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerforationDim {
    Fcd,
    Spatial,
    Batch,
    /// Common-dimension perforation; partial results reduce through memory.
    Cd,
}

/// What the caller must arrange for a solution to be legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRequirements {
    /// The common dimension is sliced; partial outputs accumulate in
    /// memory.
    pub cd_sliced: bool,
    /// Stores go through the memory reduction unit.
    pub performs_reduction: bool,
    /// Partial accumulation needs an fp32 intermediate and a final cast.
    pub requires_cast: bool,
    /// The output must be zeroed before the first partial lands.
    pub requires_memset: bool,
    pub perforation: Option<PerforationDim>,
    /// Output dims whose slices are worth growing to regain utilization.
    pub utilization_inflation_dims: SmallVec<[usize; 4]>,
    /// Output dim whose slices are worth growing to relieve bandwidth.
    pub bw_inflation_dim: Option<usize>,
}

/// One priced strategy candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub strategy: Strategy,
    /// Slice-granularity multiples each output dim should be sliced at.
    pub multipliers: [u64; MAX_DIMS],
    pub perf: PerfAttr,
    pub requirements: SolutionRequirements,
}

/// Execution identity of a solution; two solutions with equal keys walk
/// the hardware identically.
#[derive(PartialEq)]
struct SolutionKey {
    width: u64,
    height: u64,
    concurrency: u64,
    multipliers: [u64; MAX_DIMS],
    pattern: Option<WalkPattern>,
    perforation: Option<PerforationDim>,
    cd_sliced: bool,
}

impl Brain {
    /// Enumerate every distinct solution for `params`.
    ///
    /// `granularity` is the caller's slicing granule per output dim; the
    /// returned multipliers are expressed in those units. Strategy fields
    /// the caller already forced constrain the enumeration, and solutions
    /// already returned in `prev` are not produced again.
    pub fn solutions(
        &self,
        params: &LayerParams,
        granularity: &[u64; MAX_DIMS],
        prev: &[Solution],
    ) -> Result<Vec<Solution>> {
        let mut work = params.clone();
        let geometries = match params.strategy.geometry {
            Some(geometry) => vec![geometry],
            None => self.geometries(params),
        };

        let mut solutions: Vec<Solution> = Vec::new();
        let mut keys: Vec<SolutionKey> = prev
            .iter()
            .map(|solution| {
                work.strategy = solution.strategy.clone();
                let geo = GeoAttr::new(self.chip(), &work);
                SolutionKey {
                    width: geo.geometry_width(),
                    height: geo.geometry_height(),
                    concurrency: geo.geometry_concurrency(),
                    multipliers: solution.multipliers,
                    pattern: solution.strategy.pattern,
                    perforation: solution.requirements.perforation,
                    cd_sliced: solution.requirements.cd_sliced,
                }
            })
            .collect();
        work.strategy = params.strategy.clone();
        for geometry in geometries {
            work.strategy.geometry = Some(geometry);
            let patterns = match params.strategy.pattern {
                Some(pattern) => vec![pattern],
                None => self.patterns(&work),
            };
            for pattern in patterns {
                work.strategy.pattern = Some(pattern);
                for (batch_en, cd_en) in self.optimizations(params) {
                    work.strategy.batch_concurrency_en = batch_en;
                    work.strategy.cd_concurrency_en = cd_en;
                    self.push_solution(&work, granularity, false, &mut solutions, &mut keys)?;
                    if params.cd_size() > self.knobs.min_cd
                        && params.operand(Operand::C).dtype.supports_reduction()
                    {
                        self.push_solution(&work, granularity, true, &mut solutions, &mut keys)?;
                    }
                }
            }
        }
        Ok(solutions)
    }

    /// Concurrency combinations worth enumerating: only dedw has modes to
    /// race.
    fn optimizations(&self, params: &LayerParams) -> Vec<(Toggle, Toggle)> {
        let mut modes = vec![(Toggle::Off, Toggle::Off)];
        if params.op.is_dedw() {
            modes.push((Toggle::On, Toggle::Off));
            if params.operand(Operand::C).dtype.supports_reduction() {
                modes.push((Toggle::Off, Toggle::On));
                modes.push((Toggle::On, Toggle::On));
            }
        }
        modes
    }

    fn push_solution(
        &self,
        params: &LayerParams,
        granularity: &[u64; MAX_DIMS],
        cd_sliced: bool,
        solutions: &mut Vec<Solution>,
        keys: &mut Vec<SolutionKey>,
    ) -> Result<()> {
        let geo = GeoAttr::new(self.chip(), params);
        let perf = self.perf_attr(params, None)?;
        let multipliers = solution_multipliers(params, &geo, granularity);
        let requirements = self.solution_requirements(params, &geo, cd_sliced);

        let key = SolutionKey {
            width: geo.geometry_width(),
            height: geo.geometry_height(),
            concurrency: geo.geometry_concurrency(),
            multipliers,
            pattern: params.strategy.pattern,
            perforation: requirements.perforation,
            cd_sliced,
        };
        if keys.contains(&key) {
            debug!(geometry = %geo.geometry, "duplicate solution filtered");
            return Ok(());
        }
        keys.push(key);
        solutions.push(Solution { strategy: params.strategy.clone(), multipliers, perf, requirements });
        Ok(())
    }

    fn solution_requirements(&self, params: &LayerParams, geo: &GeoAttr, cd_sliced: bool) -> SolutionRequirements {
        let nondeterministic_cdc = geo.geometry_cd_concurrency() != 1 && !params.strategy.is_deterministic;
        SolutionRequirements {
            cd_sliced,
            performs_reduction: cd_sliced || nondeterministic_cdc,
            requires_cast: cd_sliced
                && !matches!(params.operand(Operand::C).dtype, DType::Fp32 | DType::Fp32Ieee),
            requires_memset: nondeterministic_cdc,
            perforation: self.perforation_dim(params, geo),
            utilization_inflation_dims: utilization_inflation_dims(params),
            bw_inflation_dim: bw_inflation_dim(params, geo),
        }
    }

    /// Grow `slice`'s output along `dim` in `step`-element increments
    /// until the strategy's utilization on the slice reaches `target` or
    /// the slice covers the full extent. Only the output view grows; the
    /// caller re-derives the matching input slices. Returns whether the
    /// target was met.
    pub fn inflate_for_utilization(
        &self,
        params: &LayerParams,
        slice: &mut LayerParams,
        dim: usize,
        target: f64,
        step: u64,
    ) -> bool {
        let full = params.operand(Operand::C).sizes[dim];
        let step = step.max(1);
        loop {
            if self.utilization_impl(slice) >= target {
                return true;
            }
            let current = slice.operand(Operand::C).sizes[dim];
            if current >= full {
                return false;
            }
            slice.operand_mut(Operand::C).sizes[dim] = (current + step).min(full);
        }
    }

    /// The output axis dcores should split, if the shape feeds them all.
    pub(crate) fn perforation_dim(&self, params: &LayerParams, geo: &GeoAttr) -> Option<PerforationDim> {
        let dcores = self.caps().dcore_nr;
        if dcores <= 1 {
            return None;
        }
        if params.op.is_gemm() {
            if geo.fcd_mme_nr() >= dcores {
                return Some(PerforationDim::Fcd);
            }
            if geo.geometry_concurrency() >= dcores {
                let dim = geo.concurrent_dim;
                if dim >= 2 && params.operand(Operand::C).sizes[dim] >= 4 {
                    return Some(PerforationDim::Batch);
                }
                return None;
            }
            if geo.spatial_mme_nr() >= dcores {
                return Some(if params.can_flatten() { PerforationDim::Batch } else { PerforationDim::Spatial });
            }
            None
        } else if params.op.is_fwd_or_dedx() {
            Some(if geo.geometry_height() > geo.geometry_width() {
                PerforationDim::Batch
            } else {
                PerforationDim::Fcd
            })
        } else if params.op.is_dedw() {
            if geo.geometry_concurrency() == 1 && geo.geometry_cd_concurrency() == 1 {
                Some(if geo.geometry_height() >= geo.geometry_width() {
                    PerforationDim::Spatial
                } else {
                    PerforationDim::Fcd
                })
            } else if geo.geometry_cd_concurrency() >= dcores {
                Some(PerforationDim::Cd)
            } else {
                None
            }
        } else {
            None
        }
    }
}

/// Slice multiples per output dim, in granularity units: one geometry step
/// along fcd and spatial, one concurrency group along the batch dim, the
/// full extent elsewhere.
fn solution_multipliers(params: &LayerParams, geo: &GeoAttr, granularity: &[u64; MAX_DIMS]) -> [u64; MAX_DIMS] {
    let c = params.operand(Operand::C);
    let mut multipliers = [1u64; MAX_DIMS];
    for dim in 0..MAX_DIMS {
        let tile = if dim == 0 {
            geo.geometry_width().min(c.sizes[0])
        } else if dim == 1 {
            geo.geometry_height().min(c.sizes[1])
        } else if geo.supports_concurrency && dim == geo.concurrent_dim {
            geo.effective_batch_concurrency(params).min(c.sizes[dim])
        } else {
            c.sizes[dim]
        };
        multipliers[dim] = div_ceil(tile.max(1), granularity[dim].max(1));
    }
    multipliers
}

/// Output dims where a bigger slice directly recovers utilization.
fn utilization_inflation_dims(params: &LayerParams) -> SmallVec<[usize; 4]> {
    let mut dims = SmallVec::new();
    if params.op.is_gemm() || params.op.is_reduction_add() {
        if params.can_flatten() {
            dims.push(1);
            dims.push(2);
        }
    } else if params.op.is_fwd_or_dedx() {
        for spatial in 0..params.conv.spatial_dims_nr {
            dims.push(1 + spatial);
        }
        dims.push(1 + params.conv.spatial_dims_nr);
    }
    dims
}

/// The output dim whose slicing most starves the read pipes under this
/// walking pattern, if any.
fn bw_inflation_dim(params: &LayerParams, geo: &GeoAttr) -> Option<usize> {
    let pattern = params.strategy.pattern?;
    let fcd = params.fcd_size();
    let sp = params.spatial_size();
    match pattern {
        WalkPattern::Fck | WalkPattern::Skf if fcd > geo.geometry_width() => Some(0),
        WalkPattern::Kfc | WalkPattern::Fkc if sp > geo.geometry_height() => Some(1),
        WalkPattern::Ksf if sp > geo.geometry_height() => Some(1 + params.conv.spatial_dims_nr),
        _ => None,
    }
}
