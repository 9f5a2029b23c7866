//! Host-registered libraries.
//!
//! A library is a named table of host-implemented members that scripts
//! reach through `require`. The host object behind it lives for the
//! whole process (state captured by its functions persists across
//! chains), while the table materialized into each chain is fresh.
//! Deferred registrations are constructed on first `require` and never
//! otherwise.

use indexmap::IndexMap;
use quill_core::{EngineError, Value};

use crate::heap::{Heap, ScriptFn};

use std::rc::Rc;

/// A value owned by the host rather than by any chain's heap. Used for
/// library members and privileged builtin extensions; materialized into
/// a chain on demand.
#[derive(Clone)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Func(ScriptFn),
}

impl HostValue {
    pub fn func(
        f: impl Fn(&mut crate::context::Context<'_>, &[Value]) -> Result<Value, EngineError> + 'static,
    ) -> Self {
        HostValue::Func(Rc::new(f))
    }

    pub fn materialize(&self, heap: &mut Heap) -> Value {
        match self {
            HostValue::Nil => Value::Nil,
            HostValue::Bool(b) => Value::Bool(*b),
            HostValue::Number(n) => Value::Number(*n),
            HostValue::Str(s) => Value::str(s),
            HostValue::Func(f) => heap.alloc_function(f.clone()),
        }
    }
}

#[derive(Clone, Default)]
pub struct Library {
    pub members: IndexMap<String, HostValue>,
}

impl Library {
    pub fn new() -> Self {
        Self {
            members: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, member: HostValue) {
        self.members.insert(name.into(), member);
    }
}

/// Builds a library's member table. Construction may fail; a deferred
/// factory that is never required is never built at all.
pub trait LibraryFactory {
    fn build(&self) -> Result<Library, EngineError>;
}

impl<F> LibraryFactory for F
where
    F: Fn() -> Result<Library, EngineError>,
{
    fn build(&self) -> Result<Library, EngineError> {
        self()
    }
}

pub(crate) enum LibraryState {
    Unloaded(Box<dyn LibraryFactory>),
    Loaded(Library),
}
