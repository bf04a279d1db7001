//! Performance brain for the Axion MME backend.
//!
//! The strategy-selection stage: prices candidate execution strategies with
//! a closed-form cost model, fills in every strategy field the caller left
//! undecided and, for slicing-aware callers, enumerates the full set of
//! distinct solutions together with their scheduling requirements.
//!
//! # Module Organization
//!
//! - [`perf`] - The cost model: cycles, utilization, memory traffic
//! - [`choose`] - Geometry / pattern / dedw-concurrency selection
//! - [`flatten`] - Bgemm batch flattening
//! - [`solution`] - Solution enumeration and deduplication
//! - [`error`] - Selection-failure taxonomy

pub mod choose;
pub mod error;
pub mod flatten;
pub mod perf;
pub mod solution;


pub use choose::trivial_dims_reduction;
pub use error::{Error, Result};
pub use perf::{Brain, Knobs, MemoryAttr, PerfAttr};
pub use solution::{PerforationDim, Solution, SolutionRequirements};
