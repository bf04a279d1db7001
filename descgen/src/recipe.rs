//! Iteration recipe: how one sub-problem is walked into descriptors.
//!
//! The recipe splits the output into fcd / spatial / non-spatial subviews
//! and enumerates their Cartesian product in a fixed, walk-pattern-defined
//! order. Each combination maps to exactly one activation. The non-spatial
//! axis folds the batch (or dedw filter) steps together with common-dim
//! partials: a partial accumulates into the same output tile as its
//! predecessor and only the last partial stores.

use axion_hal::{ChipCaps, GeoAttr};
use axion_ir::helpers::div_ceil;
use axion_ir::{LayerParams, Operand, SignalingMode};

/// One subview along a single split axis, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subview {
    pub base: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    /// Raster recipes walk fcd fastest; non-raster walk spatial fastest.
    pub raster: bool,
    pub lowering: bool,
    /// Output fcd subviews, chunks of at most one geometry width.
    pub fcd_subviews: Vec<Subview>,
    /// Output spatial subviews, chunks of at most one geometry height.
    pub sp_subviews: Vec<Subview>,
    /// Batch (bgemm) or filter (dedw) steps per output tile.
    pub batch_steps: u64,
    /// Common-dimension splits; each one is a partial accumulation.
    pub partials_nr: u64,
    /// Operand reuse across consecutive steps of the walk.
    pub reuse_a: bool,
    pub reuse_b: bool,
    /// Completion signals the caller expects per signaling chunk.
    pub signal_amount: u64,
}

impl Recipe {
    pub fn new(caps: &ChipCaps, geo: &GeoAttr, params: &LayerParams) -> Self {
        let raster = params.is_pattern_raster();
        let fcd_subviews = split_extent(params.fcd_size(), geo.geometry_width());
        let sp_subviews = split_extent(params.spatial_size(), geo.geometry_height());
        let batch_steps = params.batch_size(geo.geometry_concurrency()).max(1);

        // Partials: when SB reuse is on and the reused operand's common
        // dimension overflows the suspension buffer, the walk splits the
        // CD and accumulates across descriptors.
        let reuse_a = params.is_sb_reuse() && raster && fcd_subviews.len() > 1;
        let reuse_b = params.is_sb_reuse() && !raster && sp_subviews.len() > 1;
        let mut partials_nr = 1;
        if reuse_a || reuse_b {
            let dtype = params.operand(Operand::A).dtype;
            let align = caps.min_cd_alignment(dtype, params.op);
            let sb_elems = caps.sb_size_bytes / dtype.size_bytes();
            let max_fit = (sb_elems / align).max(1) * align;
            let cd = div_ceil(params.cd_size().max(1), geo.geometry_cd_concurrency());
            if cd > max_fit {
                partials_nr = div_ceil(cd, max_fit);
            }
        }

        let signal_amount = match params.controls.signaling_mode {
            SignalingMode::Amount => params.controls.signal_amount.max(1),
            _ => 1,
        };

        Self {
            raster,
            lowering: params.can_lower(),
            fcd_subviews,
            sp_subviews,
            batch_steps,
            partials_nr,
            reuse_a,
            reuse_b,
            signal_amount,
        }
    }

    /// A memset sub-problem writes its output region once: a single
    /// iteration, no reuse, no partials.
    pub fn memset(params: &LayerParams) -> Self {
        Self {
            raster: true,
            lowering: false,
            fcd_subviews: vec![Subview { base: 0, size: params.fcd_size() }],
            sp_subviews: vec![Subview { base: 0, size: params.spatial_size() }],
            batch_steps: 1,
            partials_nr: 1,
            reuse_a: false,
            reuse_b: false,
            signal_amount: 1,
        }
    }

    pub fn fcd_splits_nr(&self) -> u64 {
        self.fcd_subviews.len() as u64
    }

    pub fn sp_splits_nr(&self) -> u64 {
        self.sp_subviews.len() as u64
    }

    /// Non-spatial subviews: batch steps times common-dim partials.
    pub fn non_spatial_nr(&self) -> u64 {
        self.batch_steps * self.partials_nr
    }

    pub fn iterations_nr(&self) -> usize {
        (self.fcd_splits_nr() * self.sp_splits_nr() * self.non_spatial_nr()) as usize
    }

    /// Whether the reused operand is only partially resident in the SB.
    pub fn partial_reuse(&self) -> bool {
        self.partials_nr > 1 && (self.reuse_a || self.reuse_b)
    }

    pub fn iter(&self) -> RecipeIterator<'_> {
        RecipeIterator { recipe: self, pos: 0 }
    }
}

/// Chunk `extent` into subviews of at most `step` elements; the last
/// subview carries the remainder.
fn split_extent(extent: u64, step: u64) -> Vec<Subview> {
    let step = step.max(1);
    let n = div_ceil(extent.max(1), step);
    (0..n)
        .map(|i| {
            let base = i * step;
            Subview { base, size: (extent - base).min(step) }
        })
        .collect()
}

/// One enumerated recipe combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeIteration {
    pub fcd_idx: usize,
    pub sp_idx: usize,
    /// Flattened (batch, partial) index.
    pub non_spatial_idx: usize,
    pub batch_idx: u64,
    pub partial_idx: u64,
    /// SB reuse is live for this step (the previous step loaded the data).
    pub reuse_a: bool,
    pub reuse_b: bool,
    pub is_first: bool,
    pub is_last: bool,
    pub is_last_partial: bool,
}

/// Deterministic traversal of the recipe's iteration space.
///
/// Partials are innermost (an output tile accumulates to completion before
/// the walk moves on), then batch steps, then the fcd/spatial pair in the
/// order the walking pattern dictates.
pub struct RecipeIterator<'a> {
    recipe: &'a Recipe,
    pos: usize,
}

impl RecipeIterator<'_> {
    fn total(&self) -> usize {
        self.recipe.iterations_nr()
    }
}

impl Iterator for RecipeIterator<'_> {
    type Item = RecipeIteration;

    fn next(&mut self) -> Option<RecipeIteration> {
        if self.pos >= self.total() {
            return None;
        }
        let r = self.recipe;
        let ns_nr = r.non_spatial_nr() as usize;
        let fcd_nr = r.fcd_subviews.len();
        let sp_nr = r.sp_subviews.len();

        let ns = self.pos % ns_nr;
        let tile = self.pos / ns_nr;
        let (fcd_idx, sp_idx) = if r.raster {
            (tile % fcd_nr, tile / fcd_nr)
        } else {
            (tile / sp_nr, tile % sp_nr)
        };
        let partial_idx = (ns as u64) % r.partials_nr;
        let batch_idx = (ns as u64) / r.partials_nr;

        let iteration = RecipeIteration {
            fcd_idx,
            sp_idx,
            non_spatial_idx: ns,
            batch_idx,
            partial_idx,
            reuse_a: r.reuse_a && fcd_idx > 0,
            reuse_b: r.reuse_b && sp_idx > 0,
            is_first: self.pos == 0,
            is_last: self.pos + 1 == self.total(),
            is_last_partial: partial_idx + 1 == r.partials_nr,
        };
        self.pos += 1;
        Some(iteration)
    }
}
