//! The engine: a warm, reusable host for invocation chains.
//!
//! An `Engine` owns the gate, the capabilities and the collaborator
//! seams. Each `invoke` builds a fresh chain scope over that shared,
//! immutable base, runs the entry point, and tears the scope down on
//! success and failure alike. The only state that survives a chain is the
//! `SharedState` pair (data-module cache, PRNG sequence), which may also
//! be shared between engines on different threads.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use log::debug;
use quill_core::{
    Capabilities, Clock, EngineError, FastHashMap, RngAlgorithm, TableKey, Value, fast_map_new,
};

use crate::chain::ChainScope;
use crate::collab::{ContentSource, MarkupExpander, NullContentSource, NullDispatcher, NullExpander, TagDispatcher};
use crate::context::Context;
use crate::frame::FrameArgs;
use crate::gate::GlobalGate;
use crate::heap::Snapshot;
use crate::library::{HostValue, LibraryFactory, LibraryState};
use crate::prng::{SequenceState, derive_seed};

/// Outcome of one invocation: the rendered output plus the cache-control
/// metadata merged up from the invocation's frame tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub output: String,
    pub ttl: Option<u64>,
    pub volatile: bool,
}

/// The two process-wide resources that deliberately outlive chain
/// scopes. Mutex-guarded so concurrent chains keep the load-exactly-once
/// and sequence-continuity invariants.
pub struct SharedState {
    pub(crate) data_modules: Mutex<FastHashMap<String, Snapshot>>,
    pub(crate) sequence: Mutex<SequenceState>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            data_modules: Mutex::new(fast_map_new()),
            sequence: Mutex::new(SequenceState::new()),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) struct EngineHost {
    pub(crate) gate: GlobalGate,
    pub(crate) caps: Capabilities,
    pub(crate) content: Box<dyn ContentSource>,
    pub(crate) expander: Box<dyn MarkupExpander>,
    pub(crate) tags: Box<dyn TagDispatcher>,
    pub(crate) libraries: RefCell<IndexMap<String, LibraryState>>,
}

pub struct Engine {
    host: EngineHost,
    shared: Arc<SharedState>,
    seed: u64,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_shared(Arc::new(SharedState::new()))
    }

    /// A warm engine over an existing process-wide state, for hosts that
    /// run one engine per worker thread.
    pub fn with_shared(shared: Arc<SharedState>) -> Self {
        Self {
            host: EngineHost {
                gate: GlobalGate::new(),
                caps: Capabilities::default(),
                content: Box::new(NullContentSource),
                expander: Box::new(NullExpander),
                tags: Box::new(NullDispatcher),
                libraries: RefCell::new(IndexMap::new()),
            },
            shared,
            seed: derive_seed(""),
        }
    }

    pub fn shared(&self) -> Arc<SharedState> {
        self.shared.clone()
    }

    pub fn set_content_source(&mut self, content: Box<dyn ContentSource>) {
        self.host.content = content;
    }

    pub fn set_expander(&mut self, expander: Box<dyn MarkupExpander>) {
        self.host.expander = expander;
    }

    pub fn set_tag_dispatcher(&mut self, tags: Box<dyn TagDispatcher>) {
        self.host.tags = tags;
    }

    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.host.caps.clock = clock;
    }

    pub fn set_rng_algorithm(&mut self, rng: Box<dyn RngAlgorithm>) {
        self.host.caps.rng = rng;
    }

    /// Fixes the PRNG seed from an input stable across re-renders of the
    /// same content (page identity, revision; never the wall clock).
    pub fn set_render_key(&mut self, key: &str) {
        self.seed = derive_seed(key);
    }

    /// Registers a host library under `name`. With `defer`, construction
    /// waits for the first `require`; a deferred library that is never
    /// required is never built.
    pub fn register_library(
        &mut self,
        name: &str,
        factory: Box<dyn LibraryFactory>,
        defer: bool,
    ) -> Result<(), EngineError> {
        let state = if defer {
            LibraryState::Unloaded(factory)
        } else {
            LibraryState::Loaded(factory.build()?)
        };
        self.host.libraries.borrow_mut().insert(name.to_string(), state);
        Ok(())
    }

    /// Privileged extension of a shared builtin package; visible to all
    /// chains started after this call.
    pub fn extend_builtin(
        &mut self,
        package: &str,
        name: &str,
        value: HostValue,
    ) -> Result<(), EngineError> {
        self.host.gate.extend(package, name, value)
    }

    /// The documented allow-list, for leak auditing.
    pub fn allowed_globals(&self) -> Vec<String> {
        self.host.gate.allowed_globals()
    }

    /// One top-level invocation chain: reseeds the random sequence,
    /// builds a fresh scope, runs `module.function` under a new root
    /// frame carrying `args`, and tears the scope down.
    pub fn invoke(
        &self,
        module: &str,
        function: &str,
        args: FrameArgs,
    ) -> Result<Invocation, EngineError> {
        debug!("begin chain: {module}.{function}");
        lock(&self.shared.sequence).reseed(self.seed);
        let mut chain = ChainScope::new(&self.host.gate);
        let mut ctx = Context {
            chain: &mut chain,
            host: &self.host,
            shared: &self.shared,
        };
        run_invocation(&mut ctx, module, function, args)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared by top-level and nested invocation: a nested call reuses the
/// caller's chain scope and, crucially, does not touch the sequence.
pub(crate) fn run_invocation(
    ctx: &mut Context<'_>,
    module: &str,
    function: &str,
    args: FrameArgs,
) -> Result<Invocation, EngineError> {
    let frame = ctx.chain.frames.new_root(args);
    let saved = ctx.chain.current_frame.take();
    ctx.chain.current_frame = Some(frame);
    let result = invoke_entry(ctx, module, function);
    ctx.chain.current_frame = saved;
    let value = result?;
    Ok(Invocation {
        output: value.to_display_string(),
        ttl: ctx.chain.frames.ttl(frame),
        volatile: ctx.chain.frames.is_volatile(frame),
    })
}

fn invoke_entry(
    ctx: &mut Context<'_>,
    module: &str,
    function: &str,
) -> Result<Value, EngineError> {
    let exports = ctx.require(module)?;
    let entry = ctx.table_get(&exports, &TableKey::str(function))?;
    if !matches!(entry, Value::Function(_)) {
        return Err(EngineError::script(format!(
            "module \"{module}\" does not export function \"{function}\""
        )));
    }
    ctx.call(&entry, &[])
}
