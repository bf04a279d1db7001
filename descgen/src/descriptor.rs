//! Hardware descriptor records.
//!
//! One [`Descriptor`] is the register image that configures a single MME
//! unit for one tile of work. Every field maps to a named register in the
//! engine's command-processor block; the builder computes values, it never
//! reinterprets the layout. Fields the engine reserves or that this
//! pipeline never drives are omitted from the model.

use axion_ir::{CacheClass, CacheDirective, DType, MAX_DIMS, RoundingMode};

/// Loops the conv/outer descriptor can associate a dimension with.
pub const MAX_CONV_LOOPS: usize = 4;

/// "No dimension" marker in an associated-dims entry.
pub const DIM_NONE: u8 = MAX_DIMS as u8;

/// Per-operand tensor addressing block. Index 0 is the fastest changing
/// dimension; sizes and offsets are stride-scaled element counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorDesc {
    /// Valid extent per dimension; reads beyond it return the padding value.
    pub valid_elements: [u32; MAX_DIMS],
    /// ROI base shift applied between walk iterations of the owning loop.
    pub loop_stride: [i32; MAX_DIMS],
    /// Extent of the region of interest this descriptor covers.
    pub roi_size: [i32; MAX_DIMS - 1],
    pub spatial_strides: [u32; MAX_DIMS - 1],
    pub start_offset: [i32; MAX_DIMS - 1],
}

/// Address-generator walk base, one per operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AguCoreDesc {
    pub roi_base_offset: [i64; MAX_DIMS],
}

/// Dimension triple advanced together by one conv/outer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociatedDims {
    pub dim_a: u8,
    pub dim_b: u8,
    pub dim_out: u8,
}

impl Default for AssociatedDims {
    fn default() -> Self {
        Self { dim_a: DIM_NONE, dim_b: DIM_NONE, dim_out: DIM_NONE }
    }
}

/// Convolution loop block: filter extents and the dimensions each filter
/// loop advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvDesc {
    pub kernel_size_minus_1: [u8; MAX_CONV_LOOPS],
    pub associated_dims: [AssociatedDims; MAX_CONV_LOOPS],
}

/// The outermost (batch / filter-step) loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OuterLoop {
    pub associated_dims: AssociatedDims,
    pub size_minus_1: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncObjectVal {
    pub value: u16,
    pub perf_en: bool,
    /// Atomically add `value` instead of overwriting the sync object.
    pub op_add: bool,
}

/// Sync-object signaling block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncObject {
    pub signal_mask0: u8,
    pub signal_en0: bool,
    pub signal_mask1: u8,
    pub signal_en1: bool,
    pub slave_signal_en: bool,
    pub so0_addr: u32,
    pub so0_val: SyncObjectVal,
    pub so1_addr: u32,
    pub so1_val: SyncObjectVal,
}

/// AXI user bits carrying the memory-coloring id of the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserData {
    pub first: u16,
    pub steady: u16,
    pub mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimiter {
    pub agu_a: u8,
    pub agu_b: u8,
    pub agu_out: u8,
    pub eu: u8,
}

/// Profiling-event trigger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerfEvt {
    pub value: u16,
    pub rst: bool,
    pub inc_mask: bool,
    /// Bit 0: fire on start; bit 1: fire on end.
    pub start_end_mask: u8,
    pub loop_mask: u8,
    pub operand: u8,
}

/// Store-buffer rewind configuration; drives operand replay between
/// consecutive descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SbRepeat {
    pub repeat_a_minus_1: u8,
    pub repeat_b_minus_1: u8,
    pub repeat_a_mask: u8,
    pub repeat_b_mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fp8Bias {
    pub a: u8,
    pub b: u8,
    pub out: u8,
}

/// Header flag block: static per-descriptor operation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub trans_a: bool,
    pub trans_b: bool,
    pub advance_a: bool,
    pub advance_b: bool,
    pub advance_c: bool,
    pub lower_a: bool,
    pub lower_b: bool,
    /// Accumulate into the EU accumulators instead of starting fresh.
    pub accum_en: bool,
    pub roll_accums: u8,
    /// Half-width, double-depth accumulator banking.
    pub double_accums: bool,
    pub store_en: bool,
    pub store_color_set: u8,
    /// Two-X-height EU stacking.
    pub hx2: bool,
    pub data_type_in: DType,
    pub data_type_out: DType,
}

/// EU and AP control block (routing-level flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCtrl {
    pub bgemm: bool,
    pub clip_fp_eu: bool,
    pub clip_fp_ap: bool,
    pub sb_a_cache_en: bool,
    pub sb_b_cache_en: bool,
    pub rounding_mode: RoundingMode,
    pub relu_en: bool,
    pub no_rollup: bool,
    /// The unit only signals; no data is read or written.
    pub null_desc: bool,
}

/// Cache behavior per operand stream. Only driven on chips whose fabric
/// honors directives; older generations leave it at the reset value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCtrl {
    pub directive: CacheDirective,
    pub class: CacheClass,
    pub mc_id: u16,
}

impl Default for CacheCtrl {
    fn default() -> Self {
        Self { directive: CacheDirective::SkipCache, class: CacheClass::Normal, mc_id: 0 }
    }
}

/// One MME unit's full register image for one tile of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub base_addr_a: u64,
    pub base_addr_b: u64,
    pub base_addr_cout: u64,
    /// Secondary output address (dual-gemm / duplicated store).
    pub base_addr_cout1: u64,

    pub header: Header,
    pub ctrl: EngineCtrl,

    pub tensor_a: TensorDesc,
    pub tensor_b: TensorDesc,
    pub tensor_cout: TensorDesc,

    pub agu_a: AguCoreDesc,
    pub agu_b: AguCoreDesc,
    pub agu_out: AguCoreDesc,

    pub spatial_size_minus_1_a: u32,
    pub spatial_size_minus_1_b: u32,
    pub spatial_size_minus_1_cout: u32,

    pub conv: ConvDesc,
    pub outer_loop: OuterLoop,
    /// Consecutive rollups ("tetrises") this descriptor executes.
    pub num_iterations_minus_1: u32,

    pub sync_object: SyncObject,
    pub sb_repeat: SbRepeat,
    pub fp8_bias: Fp8Bias,
    pub rate_limiter: RateLimiter,
    pub axi_user_data: UserData,
    pub perf_evt_in: PerfEvt,
    pub perf_evt_out: PerfEvt,

    pub cache_a: CacheCtrl,
    pub cache_b: CacheCtrl,
    pub cache_out: CacheCtrl,

    pub wkld_id: u32,
}

impl Descriptor {
    /// A descriptor that performs no work and only signals. The ROI is the
    /// minimal valid one so the AGUs pass address checks without issuing
    /// reads.
    pub fn null(dtype: DType, signal_nr: u16) -> Self {
        let mut desc = Self::zeroed(dtype);
        desc.ctrl.null_desc = true;
        desc.ctrl.no_rollup = true;
        desc.tensor_a.valid_elements[0] = 1;
        desc.tensor_b.valid_elements[0] = 1;
        desc.tensor_cout.valid_elements[0] = 1;
        desc.tensor_a.roi_size[0] = 1;
        desc.tensor_b.roi_size[0] = 1;
        desc.tensor_cout.roi_size[0] = 1;
        if signal_nr > 0 {
            desc.sync_object.signal_en0 = true;
            desc.sync_object.so0_val = SyncObjectVal { value: signal_nr, perf_en: false, op_add: true };
        }
        desc
    }

    /// All-fields-reset image; the builder fills it in.
    pub fn zeroed(dtype: DType) -> Self {
        Self {
            base_addr_a: 0,
            base_addr_b: 0,
            base_addr_cout: 0,
            base_addr_cout1: 0,
            header: Header {
                trans_a: false,
                trans_b: false,
                advance_a: false,
                advance_b: false,
                advance_c: false,
                lower_a: false,
                lower_b: false,
                accum_en: false,
                roll_accums: 0,
                double_accums: false,
                store_en: false,
                store_color_set: 0,
                hx2: false,
                data_type_in: dtype,
                data_type_out: dtype,
            },
            ctrl: EngineCtrl {
                bgemm: false,
                clip_fp_eu: false,
                clip_fp_ap: false,
                sb_a_cache_en: false,
                sb_b_cache_en: false,
                rounding_mode: RoundingMode::RoundToNearest,
                relu_en: false,
                no_rollup: false,
                null_desc: false,
            },
            tensor_a: TensorDesc::default(),
            tensor_b: TensorDesc::default(),
            tensor_cout: TensorDesc::default(),
            agu_a: AguCoreDesc::default(),
            agu_b: AguCoreDesc::default(),
            agu_out: AguCoreDesc::default(),
            spatial_size_minus_1_a: 0,
            spatial_size_minus_1_b: 0,
            spatial_size_minus_1_cout: 0,
            conv: ConvDesc::default(),
            outer_loop: OuterLoop::default(),
            num_iterations_minus_1: 0,
            sync_object: SyncObject::default(),
            sb_repeat: SbRepeat::default(),
            fp8_bias: Fp8Bias::default(),
            rate_limiter: RateLimiter::default(),
            axi_user_data: UserData::default(),
            perf_evt_in: PerfEvt::default(),
            perf_evt_out: PerfEvt::default(),
            cache_a: CacheCtrl::default(),
            cache_b: CacheCtrl::default(),
            cache_out: CacheCtrl::default(),
            wkld_id: 0,
        }
    }

    /// Signals this descriptor fires on completion.
    pub fn signal_nr(&self) -> u16 {
        let mut n = 0;
        if self.sync_object.signal_en0 {
            n += self.sync_object.so0_val.value;
        }
        if self.sync_object.signal_en1 {
            n += self.sync_object.so1_val.value;
        }
        n
    }
}
