//! Invocation frames and cache-control propagation.
//!
//! Frames form a strict tree, arena-allocated per chain and addressed by
//! index so parent links carry no ownership. Cache-control metadata is
//! merged toward the root at write time: TTLs take the minimum, the
//! volatile flag is a monotonic OR and can never be cleared.

use indexmap::IndexMap;
use quill_core::{TableKey, Value};

/// Ordered frame argument bindings.
pub type FrameArgs = IndexMap<TableKey, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(pub(crate) u32);

pub(crate) struct FrameData {
    pub(crate) parent: Option<FrameId>,
    pub(crate) args: FrameArgs,
    ttl: Option<u64>,
    volatile: bool,
}

pub struct FrameArena {
    frames: Vec<FrameData>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn new_root(&mut self, args: FrameArgs) -> FrameId {
        self.push(None, args)
    }

    /// Argument bindings are copied in full; later mutation of the
    /// caller's structures cannot reach an in-flight frame.
    pub fn new_child(&mut self, parent: FrameId, args: FrameArgs) -> FrameId {
        self.push(Some(parent), args)
    }

    fn push(&mut self, parent: Option<FrameId>, args: FrameArgs) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(FrameData {
            parent,
            args,
            ttl: None,
            volatile: false,
        });
        id
    }

    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.frames[id.0 as usize].parent
    }

    pub fn arg(&self, id: FrameId, key: &TableKey) -> Value {
        self.frames[id.0 as usize]
            .args
            .get(key)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn args(&self, id: FrameId) -> &FrameArgs {
        &self.frames[id.0 as usize].args
    }

    /// Caps the TTL of `id` and every ancestor: minimum wins.
    pub fn report_ttl(&mut self, id: FrameId, ttl: u64) {
        let mut cursor = Some(id);
        while let Some(fid) = cursor {
            let frame = &mut self.frames[fid.0 as usize];
            frame.ttl = Some(frame.ttl.map_or(ttl, |t| t.min(ttl)));
            cursor = frame.parent;
        }
    }

    /// Marks `id` and every ancestor volatile. Irreversible.
    pub fn set_volatile(&mut self, id: FrameId) {
        let mut cursor = Some(id);
        while let Some(fid) = cursor {
            let frame = &mut self.frames[fid.0 as usize];
            frame.volatile = true;
            cursor = frame.parent;
        }
    }

    pub fn ttl(&self, id: FrameId) -> Option<u64> {
        self.frames[id.0 as usize].ttl
    }

    pub fn is_volatile(&self, id: FrameId) -> bool {
        self.frames[id.0 as usize].volatile
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}
