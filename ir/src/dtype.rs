//! MME element types.
//!
//! These are the numeric formats the engine can read and write. The set is
//! fixed by the hardware; classification helpers below drive validation and
//! descriptor flavor bits.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Element type of a tensor operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum DType {
    /// 8-bit float, 4 exponent / 3 mantissa bits ("fp8_143").
    Fp8e4m3,
    /// 8-bit float, 5 exponent / 2 mantissa bits ("fp8_152").
    Fp8e5m2,
    Fp16,
    /// Unsigned fp16 flavor (no sign bit, wider exponent range).
    Ufp16,
    Bf16,
    Fp32,
    /// fp32 with full IEEE accumulation (no fast-math truncation).
    Fp32Ieee,
    /// 19-bit tensor-float, stored as 32 bits.
    Tf32,
}

impl DType {
    /// Storage width of one element in bytes.
    pub const fn size_bytes(self) -> u64 {
        match self {
            Self::Fp8e4m3 | Self::Fp8e5m2 => 1,
            Self::Fp16 | Self::Ufp16 | Self::Bf16 => 2,
            Self::Fp32 | Self::Fp32Ieee | Self::Tf32 => 4,
        }
    }

    pub const fn is_fp8(self) -> bool {
        matches!(self, Self::Fp8e4m3 | Self::Fp8e5m2)
    }

    pub const fn is_fp16_family(self) -> bool {
        matches!(self, Self::Fp16 | Self::Ufp16)
    }

    /// Memory reduction (atomic read-modify-write on store) is supported for
    /// every output type except the fp8 flavors.
    pub const fn supports_reduction(self) -> bool {
        !self.is_fp8()
    }
}
