//! Core types for the Quill invocation engine.
//!
//! This crate contains the fundamental types that are independent of the
//! engine itself:
//! - `Value` - Tagged script value crossing the host boundary
//! - `ObjId` - Handle to objects owned by a chain's heap
//! - `EngineError` - The error taxonomy surfaced to the host
//! - `Clock`/`RngAlgorithm` - System capability traits

pub mod capabilities;
pub mod error;
pub mod value;

pub use capabilities::{Capabilities, Clock, Lcg64, RngAlgorithm, SystemClock};
pub use error::EngineError;
pub use value::{FastHashMap, ObjId, TableKey, Value, fast_map_new, fast_map_with_capacity};
