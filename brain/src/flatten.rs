//! Bgemm batch flattening.
//!
//! A broadcast-batch gemm whose batch stride is dense is the same
//! computation as one taller gemm. Folding batch elements into the spatial
//! dimension fills geometries the bare gemm height would leave half empty.

use axion_hal::GeoAttr;
use axion_ir::{LayerParams, OpType, TensorView};
use itertools::Itertools;
use tracing::debug;

use crate::perf::Brain;

impl Brain {
    /// Fold broadcast batch elements of a flattenable bgemm into the
    /// spatial dimension. Returns the flattening factor; 1 means the
    /// operation was left untouched.
    pub fn apply_tensor_flattening(&self, params: &mut LayerParams) -> u64 {
        if !params.strategy.flatten_en || !matches!(params.op, OpType::Ab | OpType::Abt) {
            return 1;
        }
        if !params.can_flatten() {
            return 1;
        }
        self.flatten_bgemm(params)
    }

    fn flatten_bgemm(&self, params: &mut LayerParams) -> u64 {
        let gemm_height = params.y.sizes[1];
        let batch_size = params.y.sizes[2];
        let geo = GeoAttr::new(self.chip(), params);

        if gemm_height > 0 && geo.geometry_height() % gemm_height == 0 {
            // The gemm tiles the geometry height exactly; no utilization
            // search needed, the recipe flattens on the fly.
            let ideal = geo.geometry_height() / gemm_height;
            if geo.port_constrained {
                return batch_size;
            }
            if ideal < batch_size {
                return ideal;
            }
        }

        // Ragged fit: try every batch divisor and keep the one with the
        // best utilization, smaller factors winning ties.
        let mut best_divisor = 1;
        let mut best_utilization = 0.0;
        let mut best_views: Option<(TensorView, TensorView)> = None;
        for divisor in divisors(batch_size) {
            let mut candidate = params.clone();
            candidate.strategy.flatten_en = false;
            for view in [&mut candidate.x, &mut candidate.y] {
                view.sizes[1] = gemm_height * divisor;
                view.sizes[2] = batch_size / divisor;
                view.dcore_bases[2] /= divisor;
                view.strides[2] = view.strides[1] * view.sizes[1];
            }
            let gemm_size = candidate.x.sizes[0].max(candidate.y.sizes[0]) * candidate.x.sizes[1];
            if gemm_size >= self.knobs.max_tile_size {
                continue;
            }
            let utilization = self.utilization_impl(&candidate);
            if utilization > best_utilization || (utilization == best_utilization && divisor < best_divisor) {
                best_divisor = divisor;
                best_utilization = utilization;
                best_views = Some((candidate.x, candidate.y));
            }
        }
        if let Some((x, y)) = best_views {
            params.x = x;
            params.y = y;
        }
        debug!(factor = best_divisor, utilization = best_utilization, "flattened bgemm batch");
        best_divisor
    }
}

fn divisors(n: u64) -> Vec<u64> {
    (1..=n.isqrt())
        .filter(|d| n % d == 0)
        .flat_map(|d| if d == n / d { vec![d] } else { vec![d, n / d] })
        .sorted_unstable()
        .collect()
}
