//! Seams to the engine's external collaborators.
//!
//! The document parser, the markup expander and the parser-function
//! dispatcher all live outside this crate; the engine only sees them
//! through these traits. The `Null*` implementations are the defaults a
//! fresh engine starts with.

use quill_core::EngineError;

use crate::context::Context;
use crate::frame::{FrameArgs, FrameId};
use crate::heap::Chunk;

/// Result of a markup expansion, including any cache-control metadata
/// the collaborator observed while expanding.
pub struct Expansion {
    pub output: String,
    pub ttl: Option<u64>,
    pub volatile: bool,
}

impl Expansion {
    /// Expansion of content that carries no cache-control constraints.
    pub fn literal(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ttl: None,
            volatile: false,
        }
    }
}

/// Resolves a module identifier to its loaded chunk.
pub trait ContentSource {
    fn resolve(&self, id: &str) -> Option<Chunk>;
}

pub struct NullContentSource;

impl ContentSource for NullContentSource {
    fn resolve(&self, _id: &str) -> Option<Chunk> {
        None
    }
}

/// Expands markup on behalf of a frame. Implementations may recursively
/// invoke the engine through the context; such invocations belong to the
/// calling chain.
pub trait MarkupExpander {
    fn expand(
        &self,
        content: &str,
        frame: FrameId,
        ctx: &mut Context<'_>,
    ) -> Result<Expansion, EngineError>;

    fn expand_template(
        &self,
        title: &str,
        args: &FrameArgs,
        frame: FrameId,
        ctx: &mut Context<'_>,
    ) -> Result<Expansion, EngineError>;
}

pub struct NullExpander;

impl MarkupExpander for NullExpander {
    fn expand(
        &self,
        content: &str,
        _frame: FrameId,
        _ctx: &mut Context<'_>,
    ) -> Result<Expansion, EngineError> {
        Ok(Expansion::literal(content))
    }

    fn expand_template(
        &self,
        title: &str,
        _args: &FrameArgs,
        _frame: FrameId,
        _ctx: &mut Context<'_>,
    ) -> Result<Expansion, EngineError> {
        Err(EngineError::script(format!(
            "cannot expand template \"{title}\": no markup expander is configured"
        )))
    }
}

/// Dispatches parser functions and extension tags registered by the
/// host application.
pub trait TagDispatcher {
    fn call_function(
        &self,
        name: &str,
        args: &FrameArgs,
        frame: FrameId,
        ctx: &mut Context<'_>,
    ) -> Result<String, EngineError>;

    fn call_tag(
        &self,
        name: &str,
        content: &str,
        args: &FrameArgs,
        frame: FrameId,
        ctx: &mut Context<'_>,
    ) -> Result<String, EngineError>;
}

pub struct NullDispatcher;

impl TagDispatcher for NullDispatcher {
    fn call_function(
        &self,
        name: &str,
        _args: &FrameArgs,
        _frame: FrameId,
        _ctx: &mut Context<'_>,
    ) -> Result<String, EngineError> {
        Err(EngineError::FunctionNotFound {
            name: name.to_string(),
        })
    }

    fn call_tag(
        &self,
        name: &str,
        _content: &str,
        _args: &FrameArgs,
        _frame: FrameId,
        _ctx: &mut Context<'_>,
    ) -> Result<String, EngineError> {
        Err(EngineError::script(format!(
            "unknown extension tag \"{name}\""
        )))
    }
}
