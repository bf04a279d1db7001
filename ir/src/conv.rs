//! Convolution parameters.

use serde::{Deserialize, Serialize};

/// Maximum number of convolution dimensions (spatial dims + depth).
pub const MAX_CONV_DIMS: usize = 4;

/// Spatial convolution parameters, one entry per spatial dimension.
///
/// Defaults describe a pointwise convolution: unit stride and dilation,
/// zero padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvParams {
    pub stride: [u64; MAX_CONV_DIMS - 1],
    pub dilation: [u64; MAX_CONV_DIMS - 1],
    pub padding: [i64; MAX_CONV_DIMS - 1],
    /// Value fed to the engine for padded input elements.
    pub padding_value: f32,
    /// How many spatial dimensions are present (1D/2D/3D convolution).
    pub spatial_dims_nr: usize,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            stride: [1; MAX_CONV_DIMS - 1],
            dilation: [1; MAX_CONV_DIMS - 1],
            padding: [0; MAX_CONV_DIMS - 1],
            padding_value: 0.0,
            spatial_dims_nr: 3,
        }
    }
}

impl ConvParams {
    /// Product of strides over the spatial dimensions. This is the dedx
    /// stride-unrolling sub-problem count.
    pub fn stride_product(&self) -> u64 {
        self.stride.iter().product()
    }

    /// True when stride, dilation and padding are all trivial, i.e. the
    /// convolution degenerates to a gemm over the spatial extent.
    pub fn is_trivial(&self) -> bool {
        self.stride.iter().all(|&s| s == 1)
            && self.dilation.iter().all(|&d| d == 1)
            && self.padding.iter().all(|&p| p == 0)
    }
}
