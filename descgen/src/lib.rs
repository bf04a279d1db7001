//! Descriptor generation for the Axion MME backend.
//!
//! Compiles one validated operation into the register images the engine's
//! command processor consumes. The stage decomposes the operation into
//! sub-problems, derives each sub-problem's iteration recipe and walks it,
//! emitting one activation (one descriptor per cooperating unit) per
//! iteration, padded and merged across dcores.
//!
//! # Module Organization
//!
//! - [`validate`] - The pre-compilation parameter check
//! - [`subproblem`] - Sub-problem decomposition (dedx stride unrolling)
//! - [`misalign`] - Recurring-misalignment decomposition for fwd/tdedx
//! - [`recipe`] - Iteration recipe: split subviews and their walk order
//! - [`descriptor`] - The register-image records
//! - [`builder`] - Per-chip descriptor builders and the activation stream
//! - [`error`] - Validation-error taxonomy

pub mod builder;
pub mod descriptor;
pub mod error;
pub mod misalign;
pub mod recipe;
pub mod subproblem;
pub mod validate;

#[cfg(test)]
pub mod test;

pub use builder::{Activation, CompiledOp, DescGenerator, DescriptorBuilder, builder_for_chip};
pub use descriptor::Descriptor;
pub use error::{Error, Result};
pub use recipe::{Recipe, RecipeIteration};
pub use subproblem::{AddressOffset, SubProblem, SubProblems, decompose, sub_problem_size};
pub use validate::validate_params;
