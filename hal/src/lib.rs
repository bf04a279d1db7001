//! Hardware description layer for the MME backend.
//!
//! Two read-only views of the target chip live here:
//! - [`ChipCaps`]: fixed per-chip constants (clock, cache line, rollup
//!   latency, unit counts). A total function of [`Chip`].
//! - [`GeoAttr`]: the geometry attributes derived from (chip, layer
//!   parameters): effective tile width/height, concurrency levels, port
//!   constraints and transpose/interleaving facts. A pure function of its
//!   inputs; the brain and the descriptor generator both call it and rely
//!   on identical answers for identical inputs.

pub mod caps;
pub mod geometry;


pub use caps::{Chip, ChipCaps};
pub use geometry::GeoAttr;
