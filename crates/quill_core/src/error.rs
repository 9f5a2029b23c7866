//! Error taxonomy surfaced to the host.
//!
//! Every variant is fatal to the top-level invocation chain that raised
//! it; the chain's scope is torn down and exactly one of these values is
//! returned to the external caller.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    /// The external content source could not resolve the identifier.
    #[error("module \"{id}\" was not found")]
    ModuleNotFound { id: String },

    /// The module body raised while executing; wraps the script error.
    #[error("error loading module \"{id}\": {message}")]
    ModuleLoad { id: String, message: String },

    /// Dispatch to an unknown external parser function. The message text
    /// is a contract surface observed by callers; do not reword it.
    #[error("callParserFunction: function \"{name}\" was not found.")]
    FunctionNotFound { name: String },

    /// A script attempted to bind a global name outside the allow-list.
    #[error("cannot create global \"{name}\": not on the sandbox allow-list")]
    SandboxViolation { name: String },

    /// A module transitively required itself while loading.
    #[error("circular require detected: {}", chain.join(" -> "))]
    CircularRequire { chain: Vec<String> },

    /// An error value raised by script code itself.
    #[error("{message}")]
    Script { message: String },
}

impl EngineError {
    pub fn script(message: impl Into<String>) -> Self {
        EngineError::Script {
            message: message.into(),
        }
    }

    pub fn module_not_found(id: impl Into<String>) -> Self {
        EngineError::ModuleNotFound { id: id.into() }
    }

    pub fn module_load(id: impl Into<String>, inner: &EngineError) -> Self {
        EngineError::ModuleLoad {
            id: id.into(),
            message: inner.to_string(),
        }
    }
}
