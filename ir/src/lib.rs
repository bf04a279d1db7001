//! Operation data model for the Axion MME backend.
//!
//! This crate defines the parameter structures a caller hands to the MME
//! compilation pipeline and the enums shared by every later stage: element
//! types, tensor views, operation kinds, convolution parameters, strategy
//! hints and numeric controls.
//!
//! # Module Organization
//!
//! - [`dtype`] - Element types and their widths/classifications
//! - [`view`] - Tensor views (bases, sizes, strides per dimension)
//! - [`op`] - Operation kinds and operand-role mapping
//! - [`conv`] - Convolution parameters (stride/dilation/padding)
//! - [`strategy`] - Geometry, walking pattern and strategy hints
//! - [`controls`] - Rounding, signaling and numeric-flavor controls
//! - [`memory`] - Reduction and cache configuration, tracing
//! - [`params`] - [`LayerParams`]: the full description of one operation
//! - [`helpers`] - Shared integer arithmetic helpers
//! - [`error`] - Structural-validity errors

pub mod conv;
pub mod controls;
pub mod dtype;
pub mod error;
pub mod helpers;
pub mod memory;
pub mod op;
pub mod params;
pub mod strategy;
pub mod view;


pub use conv::{ConvParams, MAX_CONV_DIMS};
pub use controls::{Controls, InfNanMode, RoundingMode, SignalingMode};
pub use dtype::DType;
pub use error::{Error, Result};
pub use memory::{CacheClass, CacheDirective, MemoryConfig, ReductionOp, ReductionRm, TraceMode, Tracing};
pub use op::{Operand, OperandRole, OpType};
pub use params::LayerParams;
pub use strategy::{Geometry, Strategy, Toggle, WalkPattern};
pub use view::{MAX_DIMS, TensorView};
