use snafu::Snafu;

use crate::op::OperandRole;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structural-validity errors for caller-supplied parameters.
///
/// These cover malformed views and shapes; operation-level legality (data
/// type pairings, mode combinations) is checked by the descriptor stage.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The first-dimension stride must always be 1.
    #[snafu(display("operand {role} has non-unit fcd stride {stride}"))]
    NonUnitFcdStride { role: OperandRole, stride: u64 },

    /// Views must not contain zero-sized dimensions.
    #[snafu(display("operand {role} has zero size on dimension {dim}"))]
    ZeroSize { role: OperandRole, dim: usize },

    /// A convolution must have between 1 and 3 spatial dimensions.
    #[snafu(display("spatial dimension count {dims} is out of range [1, 3]"))]
    SpatialDimsOutOfRange { dims: usize },

    /// Convolution strides and dilations must be positive.
    #[snafu(display("convolution {field} is zero on spatial dimension {dim}"))]
    ZeroConvField { field: &'static str, dim: usize },
}
