//! The script-facing execution context.
//!
//! Every host function a script can reach receives a `Context`: it
//! bundles the chain scope being mutated with read-only access to the
//! engine's collaborators and to the two process-wide resources. The
//! active frame travels here, never in process-wide state.

use quill_core::{EngineError, ObjId, TableKey, Value};

use crate::chain::ChainScope;
use crate::clock;
use crate::collab::Expansion;
use crate::engine::{EngineHost, SharedState, lock};
use crate::frame::{FrameArgs, FrameId};
use crate::heap::{Object, ScriptFn};
use crate::prng;

pub struct Context<'a> {
    pub(crate) chain: &'a mut ChainScope,
    pub(crate) host: &'a EngineHost,
    pub(crate) shared: &'a SharedState,
}

impl Context<'_> {
    // ---- globals -------------------------------------------------------

    pub fn global(&self, name: &str) -> Value {
        self.chain.globals.get(name).cloned().unwrap_or(Value::Nil)
    }

    /// Rebinding an allow-listed name is an ordinary write; introducing a
    /// new top-level name is a sandbox violation and fails the chain.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<(), EngineError> {
        if !self.host.gate.is_allowed(name) {
            return Err(EngineError::SandboxViolation {
                name: name.to_string(),
            });
        }
        self.chain.globals.insert(name.to_string(), value);
        Ok(())
    }

    /// Every global name currently visible, sorted, for diffing against
    /// the documented allow-list.
    pub fn snapshot_globals(&self) -> Vec<String> {
        let mut names: Vec<String> = self.chain.globals.keys().cloned().collect();
        names.sort();
        names
    }

    // ---- tables and functions -----------------------------------------

    pub fn new_table(&mut self) -> Value {
        self.chain.heap.alloc_table()
    }

    pub fn new_function(&mut self, f: ScriptFn) -> Value {
        self.chain.heap.alloc_function(f)
    }

    pub fn table_get(&mut self, table: &Value, key: &TableKey) -> Result<Value, EngineError> {
        let Value::Table(id) = table else {
            return Err(EngineError::script(format!(
                "attempt to index a {} value",
                table.type_name()
            )));
        };
        let (value, ttl) = self.read_object(*id, key)?;
        if let Some(ttl) = ttl {
            self.report_ttl_current(ttl);
        }
        Ok(value)
    }

    fn read_object(
        &self,
        id: ObjId,
        key: &TableKey,
    ) -> Result<(Value, Option<u64>), EngineError> {
        match self.chain.heap.get(id) {
            Object::Table(t) => Ok((t.entries.get(key).cloned().unwrap_or(Value::Nil), None)),
            Object::Time(tt) => {
                let TableKey::Str(name) = key else {
                    return Ok((Value::Nil, None));
                };
                match tt.parts.field(name) {
                    Some(n) => {
                        let ttl = if tt.live { clock::field_ttl(name) } else { None };
                        Ok((Value::Number(n as f64), ttl))
                    }
                    None => Ok((Value::Nil, None)),
                }
            }
            Object::Function(_) => Err(EngineError::script("attempt to index a function value")),
        }
    }

    /// Writes to protected tables (builtin packages, time values) are
    /// dropped without effect; only the host may extend those.
    pub fn table_set(
        &mut self,
        table: &Value,
        key: TableKey,
        value: Value,
    ) -> Result<(), EngineError> {
        let Value::Table(id) = table else {
            return Err(EngineError::script(format!(
                "attempt to index a {} value",
                table.type_name()
            )));
        };
        match self.chain.heap.get_mut(*id) {
            Object::Table(t) => {
                if !t.protected {
                    if value.is_nil() {
                        t.entries.shift_remove(&key);
                    } else {
                        t.entries.insert(key, value);
                    }
                }
                Ok(())
            }
            Object::Time(_) => Ok(()),
            Object::Function(_) => Err(EngineError::script("attempt to index a function value")),
        }
    }

    pub fn call(&mut self, f: &Value, args: &[Value]) -> Result<Value, EngineError> {
        let func = match f {
            Value::Function(id) => self.chain.heap.function(*id),
            _ => None,
        };
        let Some(func) = func else {
            return Err(EngineError::script(format!(
                "attempt to call a {} value",
                f.type_name()
            )));
        };
        func(self, args)
    }

    // ---- frames --------------------------------------------------------

    pub fn current_frame(&self) -> Option<FrameId> {
        self.chain.current_frame
    }

    pub fn new_child(&mut self, parent: FrameId, args: FrameArgs) -> FrameId {
        self.chain.frames.new_child(parent, args)
    }

    pub fn frame_parent(&self, frame: FrameId) -> Option<FrameId> {
        self.chain.frames.parent(frame)
    }

    pub fn frame_arg(&self, frame: FrameId, key: &TableKey) -> Value {
        self.chain.frames.arg(frame, key)
    }

    pub fn frame_args(&self, frame: FrameId) -> &FrameArgs {
        self.chain.frames.args(frame)
    }

    pub fn get_ttl(&self, frame: FrameId) -> Option<u64> {
        self.chain.frames.ttl(frame)
    }

    pub fn report_ttl(&mut self, frame: FrameId, ttl: u64) {
        self.chain.frames.report_ttl(frame, ttl);
    }

    pub(crate) fn report_ttl_current(&mut self, ttl: u64) {
        if let Some(frame) = self.chain.current_frame {
            self.chain.frames.report_ttl(frame, ttl);
        }
    }

    pub fn set_volatile(&mut self, frame: FrameId) {
        self.chain.frames.set_volatile(frame);
    }

    pub fn is_volatile(&self, frame: FrameId) -> bool {
        self.chain.frames.is_volatile(frame)
    }

    // ---- expansion and dispatch ---------------------------------------

    pub fn expand(&mut self, frame: FrameId, content: &str) -> Result<String, EngineError> {
        let host = self.host;
        let expansion = host.expander.expand(content, frame, self)?;
        self.absorb(frame, &expansion);
        Ok(expansion.output)
    }

    /// Preprocesses raw markup. Routed through the same collaborator as
    /// `expand`; kept separate because callers distinguish the two.
    pub fn preprocess(&mut self, frame: FrameId, content: &str) -> Result<String, EngineError> {
        self.expand(frame, content)
    }

    pub fn expand_template(
        &mut self,
        frame: FrameId,
        title: &str,
        args: &FrameArgs,
    ) -> Result<String, EngineError> {
        let host = self.host;
        let expansion = host.expander.expand_template(title, args, frame, self)?;
        self.absorb(frame, &expansion);
        Ok(expansion.output)
    }

    pub fn call_parser_function(
        &mut self,
        frame: FrameId,
        name: &str,
        args: &FrameArgs,
    ) -> Result<String, EngineError> {
        let host = self.host;
        host.tags.call_function(name, args, frame, self)
    }

    pub fn extension_tag(
        &mut self,
        frame: FrameId,
        name: &str,
        content: &str,
        args: &FrameArgs,
    ) -> Result<String, EngineError> {
        let host = self.host;
        host.tags.call_tag(name, content, args, frame, self)
    }

    fn absorb(&mut self, frame: FrameId, expansion: &Expansion) {
        if let Some(ttl) = expansion.ttl {
            self.chain.frames.report_ttl(frame, ttl);
        }
        if expansion.volatile {
            self.chain.frames.set_volatile(frame);
        }
    }

    // ---- nondeterminism -----------------------------------------------

    /// One draw from the process-wide sequence, in [0, 1).
    pub fn random(&mut self) -> f64 {
        let mut sequence = lock(&self.shared.sequence);
        prng::unit_interval(sequence.next(self.host.caps.rng.as_ref()))
    }

    /// The chain's wall-clock sample; taken once, then held.
    pub fn now_secs(&mut self) -> i64 {
        match self.chain.held_time {
            Some(t) => t,
            None => {
                let t = self.host.caps.clock.unix_secs();
                self.chain.held_time = Some(t);
                t
            }
        }
    }

    // ---- invocation ----------------------------------------------------

    /// Nested invocation: shares this chain's scope (module cache,
    /// globals, heap) and does not reset the random sequence.
    pub fn invoke(
        &mut self,
        module: &str,
        function: &str,
        args: FrameArgs,
    ) -> Result<crate::engine::Invocation, EngineError> {
        crate::engine::run_invocation(self, module, function, args)
    }
}
