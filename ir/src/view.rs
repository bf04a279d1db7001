//! Tensor views.
//!
//! A view describes the window of a tensor one operand reads or writes:
//! per-dimension base coordinates, extents and element strides. The
//! descriptor base address points at the base coordinate; `dcore_bases`
//! carry the additional per-dcore offsets used by perforated execution.

use serde::{Deserialize, Serialize};

use crate::dtype::DType;

/// Maximum tensor rank the hardware addresses directly.
pub const MAX_DIMS: usize = 5;

/// One operand's window into a tensor, in elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorView {
    pub dtype: DType,
    /// View base coordinate in the tensor. The descriptor pointer addresses
    /// this coordinate.
    pub bases: [u64; MAX_DIMS],
    /// Extra per-dcore base offset, in elements of the matching dimension.
    pub dcore_bases: [u64; MAX_DIMS],
    /// View extent in elements. Unused upper dimensions are 1.
    pub sizes: [u64; MAX_DIMS],
    /// Element strides. `strides[0]` must always be 1.
    pub strides: [u64; MAX_DIMS],
}

impl TensorView {
    /// A dense view of the given sizes: strides are the running products.
    pub fn contiguous(dtype: DType, sizes: [u64; MAX_DIMS]) -> Self {
        let mut strides = [1u64; MAX_DIMS];
        for dim in 1..MAX_DIMS {
            strides[dim] = strides[dim - 1] * sizes[dim - 1];
        }
        Self { dtype, bases: [0; MAX_DIMS], dcore_bases: [0; MAX_DIMS], sizes, strides }
    }

    /// True when the view is a strided subview of a larger tensor rather
    /// than a dense window.
    pub fn is_strided(&self) -> bool {
        let mut dense = 1;
        for dim in 0..MAX_DIMS {
            if self.strides[dim] != dense {
                return true;
            }
            dense *= self.sizes[dim];
        }
        false
    }

    /// True when every outer stride is a multiple of `align` elements.
    pub fn strides_aligned_to(&self, align: u64) -> bool {
        self.strides[1..].iter().all(|s| s % align == 0)
    }

    /// Byte offset of `coords` relative to the view origin.
    pub fn byte_offset(&self, coords: &[u64; MAX_DIMS]) -> u64 {
        let elems: u64 = coords.iter().zip(&self.strides).map(|(c, s)| c * s).sum();
        elems * self.dtype.size_bytes()
    }
}
