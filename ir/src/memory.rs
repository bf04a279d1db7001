//! Memory reduction / cache configuration and trace settings.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Read-modify-write operation applied on store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ReductionOp {
    Add,
    Sub,
    Min,
    Max,
    /// max(value, 0) before accumulation.
    Max0,
    None,
}

/// Rounding mode applied by the memory reduction unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ReductionRm {
    HalfToNearestEven,
    ToZero,
    Up,
    Down,
}

/// Cache allocation directive per operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum CacheDirective {
    SkipCache,
    NoAllocate,
    HomeAllocate,
    DcoreAllocate,
    SharedAllocate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum CacheClass {
    Low,
    Normal,
    High,
}

/// Per-operand memory behavior: store reduction and cache directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub reduction_op: ReductionOp,
    pub reduction_rm: ReductionRm,
    /// Indexed by internal operand (A, B, C).
    pub cache_directive: [CacheDirective; 3],
    pub cache_class: [CacheClass; 3],
    /// Memory-coloring id per operand, patched late by the caller.
    pub mc_id: [u16; 3],
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            reduction_op: ReductionOp::None,
            reduction_rm: ReductionRm::Down,
            cache_directive: [CacheDirective::DcoreAllocate; 3],
            cache_class: [CacheClass::Normal; 3],
            mc_id: [0; 3],
        }
    }
}

impl MemoryConfig {
    pub fn reduction_en(&self) -> bool {
        self.reduction_op != ReductionOp::None
    }
}

/// Profiling-event granularity for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
pub enum TraceMode {
    #[default]
    None,
    /// Start event on the first descriptor, end event on the last.
    LayerAct,
    /// Start and end events on every descriptor.
    Desc,
    /// Events on start and finish of every engine.
    Advanced,
}

/// Trace configuration carried into descriptor perf-event fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tracing {
    pub trace_mode: TraceMode,
    pub ctx_id: u16,
}
