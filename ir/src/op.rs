//! Operation kinds and operand-role mapping.
//!
//! The engine computes `C = A x B` for every operation; which caller tensor
//! (`x`, `w`, `y`) plays which engine role (`A`, `B`, `C`) depends on the
//! operation kind. Conv forward consumes `x` and `w` and produces `y`;
//! `dedx` swaps `x` and `y`; `dedw` produces `w`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// The logical tensor operation being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum OpType {
    /// Forward convolution.
    Fwd,
    /// Convolution gradient w.r.t. the input.
    Dedx,
    /// Dedx with a transposed weight layout (no stride unrolling support).
    TransposedDedx,
    /// Convolution gradient w.r.t. the weights.
    Dedw,
    /// Batched gemm, neither input transposed.
    Ab,
    /// Batched gemm, B transposed.
    Abt,
    /// Batched gemm, A transposed.
    Atb,
    /// Batched gemm, both inputs transposed.
    Atbt,
    /// Slice-wise reduction add of pre-computed partials.
    ReductionAdd,
    /// DMA copy through the engine.
    Memcpy,
    /// DMA transpose through the engine.
    Transpose,
}

/// Caller-visible operand name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum OperandRole {
    X,
    W,
    Y,
}

/// Engine-internal operand position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Operand {
    A,
    B,
    C,
}

impl OpType {
    pub const fn is_conv(self) -> bool {
        matches!(self, Self::Fwd | Self::Dedx | Self::TransposedDedx | Self::Dedw)
    }

    pub const fn is_gemm(self) -> bool {
        matches!(self, Self::Ab | Self::Abt | Self::Atb | Self::Atbt)
    }

    pub const fn is_dedx_family(self) -> bool {
        matches!(self, Self::Dedx | Self::TransposedDedx)
    }

    pub const fn is_fwd_or_dedx(self) -> bool {
        matches!(self, Self::Fwd | Self::Dedx | Self::TransposedDedx)
    }

    pub const fn is_dedw(self) -> bool {
        matches!(self, Self::Dedw)
    }

    pub const fn is_dma(self) -> bool {
        matches!(self, Self::Memcpy | Self::Transpose)
    }

    pub const fn is_reduction_add(self) -> bool {
        matches!(self, Self::ReductionAdd)
    }

    /// Whether input A is read transposed (common-dim-minor) by the engine.
    pub const fn transposes_a(self) -> bool {
        matches!(self, Self::Atb | Self::Atbt | Self::Dedw)
    }

    /// Whether input B is read transposed by the engine.
    pub const fn transposes_b(self) -> bool {
        matches!(self, Self::Abt | Self::Atbt | Self::Dedx)
    }

    /// Which caller tensor plays the given engine role for this operation.
    pub fn role_of(self, operand: Operand) -> OperandRole {
        match self {
            Self::Fwd
            | Self::Ab
            | Self::Atb
            | Self::Abt
            | Self::Atbt
            | Self::ReductionAdd
            | Self::Memcpy
            | Self::Transpose => match operand {
                Operand::A => OperandRole::X,
                Operand::B => OperandRole::W,
                Operand::C => OperandRole::Y,
            },
            Self::Dedx | Self::TransposedDedx => match operand {
                Operand::A => OperandRole::Y,
                Operand::B => OperandRole::W,
                Operand::C => OperandRole::X,
            },
            Self::Dedw => match operand {
                Operand::A => OperandRole::X,
                Operand::B => OperandRole::Y,
                Operand::C => OperandRole::W,
            },
        }
    }
}
