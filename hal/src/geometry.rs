//! Geometry attributes: the effective tile shape of one descriptor.
//!
//! [`GeoAttr`] is computed from (chip, layer parameters) and nothing else.
//! It answers the questions the cost model and the descriptor generator
//! keep asking: how wide and tall is one geometry step, how many gemms run
//! concurrently and along which dimension, which operands pass through the
//! transpose engine, and whether the geometry starves its input ports.

use axion_ir::helpers::div_ceil;
use axion_ir::{DType, Geometry, LayerParams, Operand};

use crate::caps::{Chip, ChipCaps};

#[derive(Debug, Clone, PartialEq)]
pub struct GeoAttr {
    pub chip: Chip,
    pub caps: ChipCaps,
    pub geometry: Geometry,
    /// MME units cooperating on this operation.
    pub mme_nr: u64,
    /// MME units tiled along the output fcd / spatial axes.
    grid_fcd: u64,
    grid_spatial: u64,
    /// Tile contributed by a single MME unit.
    mme_width: u64,
    mme_height: u64,
    batch_concurrency: u64,
    cd_concurrency: u64,
    /// Output dimension the batch concurrency splits.
    pub concurrent_dim: usize,
    /// Spatial dimension along which operand-A ports interleave.
    pub sp_interleaving_dim: usize,
    pub port_constrained: bool,
    pub transpose_a: bool,
    pub transpose_b: bool,
    pub supports_concurrency: bool,
    pub double_accums: bool,
    pub te_height: u64,
    input_dtype: DType,
}

impl GeoAttr {
    /// Derive the geometry attributes for `params` on `chip`.
    ///
    /// The strategy's geometry must already be chosen; the brain sets it
    /// before ever asking for attributes.
    pub fn new(chip: Chip, params: &LayerParams) -> Self {
        let geometry = params
            .strategy
            .geometry
            .unwrap_or_else(|| panic!("geometry attributes requested before a geometry was chosen"));
        let caps = chip.caps();
        let mme_limit = match params.strategy.mme_limit {
            0 => caps.mme_nr,
            n => n.min(caps.mme_nr),
        };
        let (mut grid_fcd, mut grid_spatial, mme_width, mme_height) = unit_grid(chip, geometry, mme_limit);

        let supports_concurrency = (params.op.is_dedw() || params.op.is_gemm()) && !params.op.is_reduction_add();

        // CD concurrency folds the whole unit grid onto the common
        // dimension: every unit computes a partial sum of the same output
        // tile and the results meet through memory reduction.
        let out_dtype = params.operand(Operand::C).dtype;
        let cd_concurrency = if params.op.is_dedw()
            && params.strategy.cd_concurrency_en.is_on()
            && out_dtype.supports_reduction()
        {
            grid_fcd = 1;
            grid_spatial = 1;
            mme_limit
        } else {
            1
        };

        // Batch concurrency: while the geometry is wider or taller than the
        // problem needs, fold units onto independent batch gemms instead.
        let mut batch_concurrency = 1;
        if supports_concurrency && params.strategy.batch_concurrency_en.is_on() && cd_concurrency == 1 {
            let fcd = params.fcd_size();
            let sp = params.spatial_size();
            while grid_fcd > 1 && (grid_fcd / 2) * mme_width >= fcd {
                grid_fcd /= 2;
                batch_concurrency *= 2;
            }
            while grid_spatial > 1 && (grid_spatial / 2) * mme_height >= sp {
                grid_spatial /= 2;
                batch_concurrency *= 2;
            }
        }

        let concurrent_dim = concurrent_dim(params, batch_concurrency);
        let sp_interleaving_dim =
            if params.op.is_dedw() && cd_concurrency > 1 && params.strategy.recurring_misalignment_opt_en {
                2
            } else {
                1
            };

        let a_dtype = params.operand(Operand::A).dtype;
        // fp32 inputs are compute bound; halving their read bandwidth in
        // the tall/wide geometries costs nothing.
        let port_constrained = matches!(geometry, Geometry::FourXw | Geometry::FourXh)
            && !matches!(a_dtype, DType::Fp32 | DType::Fp32Ieee);

        let double_accums = chip == Chip::Gaudi2 && batch_concurrency > 1 && params.op.is_gemm();

        Self {
            chip,
            caps,
            geometry,
            mme_nr: mme_limit,
            grid_fcd,
            grid_spatial,
            mme_width,
            mme_height,
            batch_concurrency,
            cd_concurrency,
            concurrent_dim,
            sp_interleaving_dim,
            port_constrained,
            transpose_a: params.op.transposes_a(),
            transpose_b: params.op.transposes_b(),
            supports_concurrency,
            double_accums,
            te_height: caps.te_height,
            input_dtype: a_dtype,
        }
    }

    /// Output fcd extent covered by one geometry step, in elements.
    pub fn geometry_width(&self) -> u64 {
        self.grid_fcd * self.mme_width
    }

    /// Output spatial extent covered by one geometry step, in elements.
    pub fn geometry_height(&self) -> u64 {
        self.grid_spatial * self.mme_height
    }

    /// Gemms executed concurrently across the batch dimension.
    pub fn geometry_concurrency(&self) -> u64 {
        self.batch_concurrency
    }

    /// Partial-sum splits of the common dimension.
    pub fn geometry_cd_concurrency(&self) -> u64 {
        self.cd_concurrency
    }

    pub fn effective_batch_concurrency(&self, params: &LayerParams) -> u64 {
        if !self.supports_concurrency {
            return 1;
        }
        let batch = params.operand(Operand::C).sizes[self.concurrent_dim];
        self.batch_concurrency.min(batch.max(1))
    }

    /// MME units tiled along the output fcd axis.
    pub fn fcd_mme_nr(&self) -> u64 {
        self.grid_fcd
    }

    /// MME units tiled along the output spatial axis.
    pub fn spatial_mme_nr(&self) -> u64 {
        self.grid_spatial
    }

    pub fn transposed(&self, operand: Operand) -> bool {
        match operand {
            Operand::A => self.transpose_a,
            Operand::B => self.transpose_b,
            Operand::C => false,
        }
    }

    /// Elements one input/output port delivers per fetch. One-byte inputs
    /// pack a full cache line worth of elements into each port.
    pub fn port_size(&self, operand: Operand) -> u64 {
        let cl = self.caps.cache_line_bytes;
        let fp8 = self.input_dtype.is_fp8();
        match (operand, self.chip) {
            (Operand::A | Operand::B, Chip::Gaudi) => cl / 2,
            (Operand::A | Operand::B, Chip::Gaudi2) => {
                if fp8 {
                    cl
                } else {
                    cl / 2
                }
            }
            (Operand::A | Operand::B, Chip::Gaudi3) => {
                if fp8 {
                    cl * 2
                } else {
                    cl
                }
            }
            (Operand::C, Chip::Gaudi) => cl / 2,
            (Operand::C, Chip::Gaudi2) => cl,
            (Operand::C, Chip::Gaudi3) => cl * 2,
        }
    }

    /// Spatial read ports of operand A that interleave consecutive rows.
    pub fn interleaved_spatial_ports(&self) -> u64 {
        (self.geometry_height() / self.te_height).max(1)
    }

    /// Total read ports feeding `operand` across the whole geometry.
    pub fn ports_nr(&self, operand: Operand) -> u64 {
        match operand {
            Operand::A => (self.geometry_height() / self.port_size(Operand::A)).max(1),
            Operand::B => (self.geometry_width() / self.port_size(Operand::B)).max(1),
            Operand::C => (self.geometry_width() / self.port_size(Operand::C)).max(1),
        }
    }

}

/// (grid_fcd, grid_spatial, unit_width, unit_height) for one geometry.
fn unit_grid(chip: Chip, geometry: Geometry, mme_limit: u64) -> (u64, u64, u64, u64) {
    match chip {
        // Square units; the geometry only arranges them.
        Chip::Gaudi => square_grid(geometry, mme_limit, 64, 64),
        Chip::Gaudi3 => square_grid(geometry, mme_limit, 256, 256),
        // Gaudi2 units reconfigure internally per geometry: the two cores
        // of one unit stack horizontally in 4xw and vertically in 4xh.
        Chip::Gaudi2 => match geometry {
            Geometry::FourXw => (mme_limit, 1, 512, 128),
            Geometry::TwoXw => (mme_limit, 1, 256, 256),
            Geometry::TwoXh => (1, mme_limit, 256, 256),
            Geometry::FourXh => (1, mme_limit, 128, 512),
        },
    }
}

fn square_grid(geometry: Geometry, mme_limit: u64, w: u64, h: u64) -> (u64, u64, u64, u64) {
    match geometry {
        Geometry::FourXw => (mme_limit, 1, w, h),
        Geometry::TwoXw => ((mme_limit / 2).max(1), mme_limit.min(2), w, h),
        Geometry::TwoXh => (mme_limit.min(2), (mme_limit / 2).max(1), w, h),
        Geometry::FourXh => (1, mme_limit, w, h),
    }
}

/// Output dimension the batch concurrency splits.
fn concurrent_dim(params: &LayerParams, concurrency: u64) -> usize {
    if params.op.is_dma() {
        return 4;
    }
    if !params.op.is_gemm() {
        // dedw concurrency runs over filter dims; lowering folds the first
        // one into the common dimension.
        return if params.can_lower() { 3 } else { 2 };
    }
    // For bgemm pick the batch dim that leaves the fewest total batch
    // steps once split by `concurrency`.
    let c = params.operand(Operand::C);
    let first = if params.can_flatten() { 3 } else { 2 };
    let mut best_dim = first;
    let mut best_steps = u64::MAX;
    for dim in first..axion_ir::MAX_DIMS {
        let mut steps = div_ceil(c.sizes[dim], concurrency.max(1));
        for other in first..axion_ir::MAX_DIMS {
            if other != dim {
                steps *= c.sizes[other];
            }
        }
        if steps < best_steps {
            best_steps = steps;
            best_dim = dim;
        }
    }
    best_dim
}
