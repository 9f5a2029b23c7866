//! Quill invocation engine.
//!
//! Hosts untrusted, author-supplied script modules inside a document
//! rendering pipeline: a gated global environment, per-chain module
//! caching with a process-wide data-module cache, an invocation frame
//! tree that merges cache-control metadata toward its root, and a
//! deterministic PRNG/clock layer that keeps repeated renders of the
//! same input bit-identical.

#![allow(clippy::collapsible_if)]
#![allow(clippy::new_without_default)]

mod builtins;
mod chain;
pub mod clock;
pub mod collab;
pub mod context;
pub mod engine;
pub mod frame;
pub mod gate;
pub mod heap;
pub mod library;
mod modules;
pub mod prng;

pub use clock::{ClockParts, TimeTable};
pub use collab::{
    ContentSource, Expansion, MarkupExpander, NullContentSource, NullDispatcher, NullExpander,
    TagDispatcher,
};
pub use context::Context;
pub use engine::{Engine, Invocation, SharedState};
pub use frame::{FrameArgs, FrameId};
pub use gate::{BuiltinFn, GlobalGate};
pub use heap::{Chunk, ScriptFn, Snapshot};
pub use library::{HostValue, Library, LibraryFactory};
pub use quill_core::{Clock, EngineError, RngAlgorithm, TableKey, Value};
