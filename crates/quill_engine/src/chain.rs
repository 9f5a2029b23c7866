//! Per-chain execution scope.
//!
//! One `ChainScope` exists for exactly one top-level invocation chain:
//! its globals overlay, module cache, frame arena and object heap are
//! created together and dropped together, so nothing a chain mutates can
//! survive into the next one. The data-module cache and the PRNG
//! sequence are deliberately *not* here; they are the two process-wide
//! exceptions.

use quill_core::{FastHashMap, Value};
use smallvec::SmallVec;

use crate::frame::{FrameArena, FrameId};
use crate::gate::GlobalGate;
use crate::heap::Heap;

pub(crate) struct ChainScope {
    pub(crate) heap: Heap,
    pub(crate) globals: FastHashMap<String, Value>,
    pub(crate) loaded_modules: FastHashMap<String, Value>,
    pub(crate) require_stack: SmallVec<[String; 4]>,
    pub(crate) frames: FrameArena,
    /// The frame script code is currently running under. Confined to the
    /// chain scope; never process-wide.
    pub(crate) current_frame: Option<FrameId>,
    /// Wall clock sampled once on first read and held for the chain.
    pub(crate) held_time: Option<i64>,
    pub(crate) in_data_load: bool,
}

impl ChainScope {
    pub(crate) fn new(gate: &GlobalGate) -> Self {
        let mut heap = Heap::new();
        let globals = gate.build_globals(&mut heap);
        Self {
            heap,
            globals,
            loaded_modules: quill_core::fast_map_new(),
            require_stack: SmallVec::new(),
            frames: FrameArena::new(),
            current_frame: None,
            held_time: None,
            in_data_load: false,
        }
    }
}
