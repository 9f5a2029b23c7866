//! Module loading: `require` and `load_data`.
//!
//! `require` is scoped to the chain: one load per chain, after which
//! every caller shares the same table reference. `load_data` is the
//! process-wide exception: the module executes at most once for the
//! process lifetime, its result is stored as a handle-free snapshot, and
//! every requester gets an independent materialization, so it never
//! appears in the ordinary cache and mutations never travel between
//! requesters.

use log::debug;
use quill_core::{EngineError, TableKey, Value};

use crate::context::Context;
use crate::engine::lock;
use crate::heap::{self, Table};
use crate::library::LibraryState;

impl Context<'_> {
    pub fn require(&mut self, id: &str) -> Result<Value, EngineError> {
        if let Some(v) = self.chain.loaded_modules.get(id) {
            return Ok(v.clone());
        }
        if let Some(v) = self.materialize_library(id)? {
            self.chain.loaded_modules.insert(id.to_string(), v.clone());
            return Ok(v);
        }
        if let Some(pos) = self.chain.require_stack.iter().position(|p| p == id) {
            let mut cycle: Vec<String> = self.chain.require_stack[pos..].to_vec();
            cycle.push(id.to_string());
            return Err(EngineError::CircularRequire { chain: cycle });
        }
        let Some(chunk) = self.host.content.resolve(id) else {
            return Err(EngineError::module_not_found(id));
        };
        debug!("loading module {id}");
        self.chain.require_stack.push(id.to_string());
        let result = chunk(self);
        self.chain.require_stack.pop();
        let value = result.map_err(|e| EngineError::module_load(id, &e))?;
        self.chain.loaded_modules.insert(id.to_string(), value.clone());
        Ok(value)
    }

    /// Whether `id` sits in the ordinary per-chain cache. Data-only
    /// modules never show up here.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.chain.loaded_modules.contains_key(id)
    }

    pub fn load_data(&mut self, id: &str) -> Result<Value, EngineError> {
        if self.chain.in_data_load {
            return Err(EngineError::script(
                "load_data is not available inside a data module",
            ));
        }
        let shared = self.shared;
        // The cache lock is held across a miss's execution; that is what
        // serializes "load exactly once" when chains run in parallel.
        let mut cache = lock(&shared.data_modules);
        if let Some(snap) = cache.get(id) {
            return Ok(heap::materialize(&mut self.chain.heap, snap));
        }
        let Some(chunk) = self.host.content.resolve(id) else {
            return Err(EngineError::module_not_found(id));
        };
        debug!("loading data module {id}");
        self.chain.in_data_load = true;
        // Data modules run under a bare frame: the invoking frame's
        // arguments must not leak into a result cached process-wide.
        let saved_frame = self.chain.current_frame.take();
        let result = chunk(self);
        self.chain.current_frame = saved_frame;
        self.chain.in_data_load = false;
        let value = result.map_err(|e| EngineError::module_load(id, &e))?;
        let snap = heap::snapshot(&self.chain.heap, &value)
            .map_err(|e| EngineError::module_load(id, &e))?;
        let out = heap::materialize(&mut self.chain.heap, &snap);
        cache.insert(id.to_string(), snap);
        Ok(out)
    }

    fn materialize_library(&mut self, id: &str) -> Result<Option<Value>, EngineError> {
        let members = {
            let mut libraries = self.host.libraries.borrow_mut();
            let Some(state) = libraries.get_mut(id) else {
                return Ok(None);
            };
            if let LibraryState::Unloaded(factory) = state {
                debug!("constructing deferred library {id}");
                let library = factory.build()?;
                *state = LibraryState::Loaded(library);
            }
            match state {
                LibraryState::Loaded(library) => library.members.clone(),
                LibraryState::Unloaded(_) => return Ok(None),
            }
        };
        let mut table = Table::new();
        for (name, member) in &members {
            let value = member.materialize(&mut self.chain.heap);
            table.entries.insert(TableKey::str(name), value);
        }
        let id = self.chain.heap.alloc(crate::heap::Object::Table(table));
        Ok(Some(Value::Table(id)))
    }
}
