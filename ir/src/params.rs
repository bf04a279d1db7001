//! [`LayerParams`]: the complete description of one MME operation.
//!
//! This is the input to the whole pipeline. The caller fills in the operand
//! views and whichever strategy fields it wants to force; the brain decides
//! the rest; sub-problem construction then specializes working copies of it.

use serde::{Deserialize, Serialize};

use crate::conv::ConvParams;
use crate::controls::Controls;
use crate::error::{NonUnitFcdStrideSnafu, Result, SpatialDimsOutOfRangeSnafu, ZeroConvFieldSnafu, ZeroSizeSnafu};
use crate::helpers::div_ceil;
use crate::memory::{MemoryConfig, Tracing};
use crate::op::{Operand, OperandRole, OpType};
use crate::strategy::{Strategy, WalkPattern};
use crate::view::TensorView;

/// One logical tensor operation, as handed to the MME backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    pub op: OpType,
    pub x: TensorView,
    pub w: TensorView,
    pub y: TensorView,
    pub conv: ConvParams,
    pub strategy: Strategy,
    pub controls: Controls,
    pub memory_cfg: MemoryConfig,
    pub tracing: Tracing,
}

impl LayerParams {
    /// A gemm-shaped starting point: dense views, default knobs.
    pub fn new(op: OpType, x: TensorView, w: TensorView, y: TensorView) -> Self {
        Self {
            op,
            x,
            w,
            y,
            conv: ConvParams::default(),
            strategy: Strategy::default(),
            controls: Controls::default(),
            memory_cfg: MemoryConfig::default(),
            tracing: Tracing::default(),
        }
    }

    pub fn view(&self, role: OperandRole) -> &TensorView {
        match role {
            OperandRole::X => &self.x,
            OperandRole::W => &self.w,
            OperandRole::Y => &self.y,
        }
    }

    pub fn view_mut(&mut self, role: OperandRole) -> &mut TensorView {
        match role {
            OperandRole::X => &mut self.x,
            OperandRole::W => &mut self.w,
            OperandRole::Y => &mut self.y,
        }
    }

    /// The tensor playing engine role `operand` for this operation.
    pub fn operand(&self, operand: Operand) -> &TensorView {
        self.view(self.op.role_of(operand))
    }

    pub fn operand_mut(&mut self, operand: Operand) -> &mut TensorView {
        self.view_mut(self.op.role_of(operand))
    }

    /// Structural sanity of the views and conv fields. Operation-level
    /// legality is checked separately by descriptor-stage validation.
    pub fn verify(&self) -> Result<()> {
        for role in [OperandRole::X, OperandRole::W, OperandRole::Y] {
            let view = self.view(role);
            snafu::ensure!(view.strides[0] == 1, NonUnitFcdStrideSnafu { role, stride: view.strides[0] });
            for (dim, &size) in view.sizes.iter().enumerate() {
                snafu::ensure!(size > 0, ZeroSizeSnafu { role, dim });
            }
        }
        if self.op.is_conv() {
            let dims = self.conv.spatial_dims_nr;
            snafu::ensure!((1..=3).contains(&dims), SpatialDimsOutOfRangeSnafu { dims });
            for dim in 0..dims {
                snafu::ensure!(self.conv.stride[dim] > 0, ZeroConvFieldSnafu { field: "stride", dim });
                snafu::ensure!(self.conv.dilation[dim] > 0, ZeroConvFieldSnafu { field: "dilation", dim });
            }
        }
        Ok(())
    }

    /// Lowering folds the first filter dimension into the common dimension.
    /// Requires dense, dilation-free data.
    pub fn can_lower(&self) -> bool {
        if !self.strategy.lowering_en
            || !(self.op.is_dedw() || self.op == OpType::Fwd || self.op == OpType::TransposedDedx)
        {
            return false;
        }
        let a = self.operand(Operand::A);
        self.conv.dilation[0] == 1
            && a.strides[1] == self.w.sizes[1]
            && self.w.strides[2] == self.w.strides[1] * self.w.sizes[1]
    }

    /// Flattening folds a broadcast batch dimension of a bgemm into the
    /// spatial dimension. Requires the first batch dim of B broadcast and
    /// dense batch strides on A and C.
    pub fn can_flatten(&self) -> bool {
        if !self.strategy.flatten_en
            || self.strategy.dual_gemm
            || self.strategy.masked_bgemm
            || !matches!(self.op, OpType::Ab | OpType::Abt)
        {
            return false;
        }
        if self.w.sizes[2] != 1 || self.y.sizes[2] == 1 || self.y.sizes[2] != self.x.sizes[2] {
            return false;
        }
        self.x.strides[2] == self.x.strides[1] * self.x.sizes[1]
            && self.y.strides[2] == self.y.strides[1] * self.y.sizes[1]
    }

    /// Output fcd extent in elements.
    pub fn fcd_size(&self) -> u64 {
        self.operand(Operand::C).sizes[0]
    }

    /// Output spatial extent in elements.
    pub fn spatial_size(&self) -> u64 {
        let c = self.operand(Operand::C);
        if self.op.is_gemm() || self.op.is_reduction_add() {
            if self.can_flatten() { c.sizes[1] * c.sizes[2] } else { c.sizes[1] }
        } else if self.op.is_dedw() {
            if self.can_lower() { c.sizes[1] * c.sizes[2] } else { c.sizes[1] }
        } else {
            c.sizes[1..].iter().product()
        }
    }

    /// Batch extent, with the first batch dim shrunk by `concurrency`.
    pub fn batch_size(&self, concurrency: u64) -> u64 {
        if self.op.is_fwd_or_dedx() || self.op.is_reduction_add() {
            return 1;
        }
        let c = self.operand(Operand::C);
        if self.can_flatten() {
            c.sizes[3] * c.sizes[4]
        } else if self.can_lower() {
            div_ceil(c.sizes[3], concurrency) * c.sizes[4]
        } else {
            div_ceil(c.sizes[2], concurrency) * c.sizes[3] * c.sizes[4]
        }
    }

    /// Common dimension of a single gemm loop.
    pub fn single_gemm_cd(&self) -> u64 {
        match self.op {
            OpType::Fwd => {
                if self.can_lower() {
                    self.x.sizes[0] * self.w.sizes[2].min(self.x.sizes[1])
                } else {
                    self.x.sizes[0]
                }
            }
            OpType::TransposedDedx => {
                if self.can_lower() {
                    self.y.sizes[0] * self.w.sizes[2].min(self.y.sizes[1])
                } else {
                    self.y.sizes[0]
                }
            }
            OpType::Dedx => self.y.sizes[0],
            _ => self.cd_size(),
        }
    }

    /// Overall common dimension across all accumulated loops.
    pub fn cd_size(&self) -> u64 {
        match self.op {
            // CD = C * S * R * Q
            OpType::Fwd => self.x.sizes[0] * self.w.sizes[2] * self.w.sizes[3] * self.w.sizes[4],
            // CD = K * S * R * Q
            OpType::Dedx | OpType::TransposedDedx => {
                self.y.sizes[0] * self.w.sizes[2] * self.w.sizes[3] * self.w.sizes[4]
            }
            // CD = B * D * H * W
            OpType::Dedw => self.y.sizes[1] * self.y.sizes[2] * self.y.sizes[3] * self.y.sizes[4],
            OpType::Ab | OpType::Abt | OpType::ReductionAdd => self.x.sizes[0],
            OpType::Atb | OpType::Atbt => self.x.sizes[1],
            OpType::Memcpy | OpType::Transpose => 0,
        }
    }

    pub fn is_sb_reuse(&self) -> bool {
        self.strategy.sb_reuse && !self.op.is_dma()
    }

    pub fn is_pattern_raster(&self) -> bool {
        self.strategy.pattern.is_some_and(WalkPattern::is_raster)
    }

    pub fn is_deterministic_cd_concurrency(&self) -> bool {
        self.op.is_dedw() && self.strategy.is_deterministic && self.strategy.cd_concurrency_en.is_on()
    }

    /// Pick the family-appropriate pattern: `down_first` walks the spatial /
    /// non-fcd direction first.
    pub fn set_pattern(&mut self, down_first: bool) {
        let pattern = match self.op {
            OpType::Ab | OpType::Atb | OpType::Abt | OpType::Atbt | OpType::ReductionAdd => {
                if down_first { WalkPattern::Fkc } else { WalkPattern::Fck }
            }
            OpType::Dedw => {
                if down_first { WalkPattern::Kfc } else { WalkPattern::Fck }
            }
            OpType::Fwd | OpType::Dedx | OpType::TransposedDedx | OpType::Memcpy | OpType::Transpose => {
                if down_first { WalkPattern::Ksf } else { WalkPattern::Skf }
            }
        };
        self.strategy.pattern = Some(pattern);
    }
}
