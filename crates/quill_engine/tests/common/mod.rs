//! Shared fixtures: a map-backed content source, a markup expander that
//! understands `{{#invoke:..}}` and `<count/>`, a tag dispatcher, and
//! mock capabilities.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

use quill_engine::{
    Chunk, Clock, ContentSource, Context, EngineError, Expansion, FrameArgs, FrameId,
    MarkupExpander, RngAlgorithm, TableKey, TagDispatcher, Value,
};
use regex::Regex;

pub struct ModuleMap {
    modules: HashMap<String, Chunk>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        id: &str,
        chunk: impl Fn(&mut Context<'_>) -> Result<Value, EngineError> + 'static,
    ) {
        self.modules.insert(id.to_string(), Rc::new(chunk));
    }
}

impl ContentSource for ModuleMap {
    fn resolve(&self, id: &str) -> Option<Chunk> {
        self.modules.get(id).cloned()
    }
}

fn invoke_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{#invoke:([^|}]+)\|([^|}]+?)(?:\|([^}]*))?\}\}").unwrap()
    })
}

/// Expander that replaces `{{#invoke:Module|func|arg}}` with a nested
/// invocation and `<count/>` with the `count` extension tag, merging the
/// cache-control metadata each replacement reports.
pub struct InvokeExpander;

impl MarkupExpander for InvokeExpander {
    fn expand(
        &self,
        content: &str,
        frame: FrameId,
        ctx: &mut Context<'_>,
    ) -> Result<Expansion, EngineError> {
        let mut ttl: Option<u64> = None;
        let mut volatile = false;
        let mut out = String::new();
        let mut last = 0;
        for caps in invoke_pattern().captures_iter(content) {
            let whole = caps.get(0).unwrap();
            out.push_str(&content[last..whole.start()]);
            let mut args = FrameArgs::new();
            if let Some(arg) = caps.get(3) {
                if !arg.as_str().is_empty() {
                    args.insert(TableKey::Int(1), Value::str(arg.as_str()));
                }
            }
            let nested = ctx.invoke(caps[1].trim(), caps[2].trim(), args)?;
            if let Some(t) = nested.ttl {
                ttl = Some(ttl.map_or(t, |cur| cur.min(t)));
            }
            volatile |= nested.volatile;
            out.push_str(&nested.output);
            last = whole.end();
        }
        out.push_str(&content[last..]);
        let out = if out.contains("<count/>") {
            let tag = ctx.extension_tag(frame, "count", "", &FrameArgs::new())?;
            out.replace("<count/>", &tag)
        } else {
            out
        };
        Ok(Expansion {
            output: out,
            ttl,
            volatile,
        })
    }

    fn expand_template(
        &self,
        title: &str,
        _args: &FrameArgs,
        frame: FrameId,
        ctx: &mut Context<'_>,
    ) -> Result<Expansion, EngineError> {
        // The only template the fixtures know about wraps the counter tag.
        if title == "VolatileTemplate" {
            let out = ctx.extension_tag(frame, "count", "", &FrameArgs::new())?;
            return Ok(Expansion::literal(out));
        }
        Err(EngineError::script(format!(
            "template \"{title}\" was not found"
        )))
    }
}

/// Parser functions and tags used by the tests: `urlencode` and the
/// volatile `count` tag.
pub struct TestDispatcher {
    count: Cell<u32>,
}

impl TestDispatcher {
    pub fn new() -> Self {
        Self {
            count: Cell::new(0),
        }
    }
}

impl TagDispatcher for TestDispatcher {
    fn call_function(
        &self,
        name: &str,
        args: &FrameArgs,
        _frame: FrameId,
        _ctx: &mut Context<'_>,
    ) -> Result<String, EngineError> {
        match name {
            "urlencode" => {
                let text = args
                    .get(&TableKey::Int(1))
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let wiki = args
                    .get(&TableKey::Int(2))
                    .and_then(|v| v.as_str().map(str::to_string))
                    .is_some_and(|m| m == "wiki");
                Ok(text.replace(' ', if wiki { "_" } else { "+" }))
            }
            _ => Err(EngineError::FunctionNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn call_tag(
        &self,
        name: &str,
        _content: &str,
        _args: &FrameArgs,
        frame: FrameId,
        ctx: &mut Context<'_>,
    ) -> Result<String, EngineError> {
        match name {
            "count" => {
                self.count.set(self.count.get() + 1);
                ctx.set_volatile(frame);
                Ok(self.count.get().to_string())
            }
            _ => Err(EngineError::script(format!(
                "unknown extension tag \"{name}\""
            ))),
        }
    }
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn unix_secs(&self) -> i64 {
        self.0
    }
}

/// Clock that advances one second per read, for pinning down the
/// held-per-chain sampling rule.
pub struct TickingClock {
    next: Cell<i64>,
}

impl TickingClock {
    pub fn starting_at(secs: i64) -> Self {
        Self {
            next: Cell::new(secs),
        }
    }
}

impl Clock for TickingClock {
    fn unix_secs(&self) -> i64 {
        let t = self.next.get();
        self.next.set(t + 1);
        t
    }
}

pub struct CountingRng;

impl RngAlgorithm for CountingRng {
    fn next_u64(&self, state: &mut u64) -> u64 {
        *state = state.wrapping_add(1);
        *state
    }
}

/// Engine wired to the fixture collaborators.
pub fn engine_with(modules: ModuleMap) -> quill_engine::Engine {
    let mut engine = quill_engine::Engine::new();
    engine.set_content_source(Box::new(modules));
    engine.set_expander(Box::new(InvokeExpander));
    engine.set_tag_dispatcher(Box::new(TestDispatcher::new()));
    engine
}

/// Single positional frame argument.
pub fn args1(value: &str) -> FrameArgs {
    let mut args = FrameArgs::new();
    args.insert(TableKey::Int(1), Value::str(value));
    args
}

/// Calls a function stored in one of the gated builtin packages, e.g.
/// `call_package(ctx, "os", "date", &[Value::str("%d")])`.
pub fn call_package(
    ctx: &mut Context<'_>,
    package: &str,
    name: &str,
    args: &[Value],
) -> Result<Value, EngineError> {
    let pkg = ctx.global(package);
    let f = ctx.table_get(&pkg, &TableKey::str(name))?;
    ctx.call(&f, args)
}
