//! Global Environment Gate.
//!
//! The gate owns the allow-list of names visible to script code and
//! materializes a fresh globals mapping for every chain: top-level
//! builtin functions plus the builtin package tables. Package tables are
//! protected (script writes to them are dropped), but the host may
//! extend a package between chains, and the extension is then visible to
//! every subsequent chain in the process.

use indexmap::IndexMap;
use quill_core::{EngineError, FastHashMap, TableKey, Value, fast_map_new};

use crate::builtins;
use crate::context::Context;
use crate::heap::{Heap, Object, Table};
use crate::library::HostValue;

/// Statically-known builtin, same calling convention as any script
/// function.
pub type BuiltinFn = fn(&mut Context<'_>, &[Value]) -> Result<Value, EngineError>;

pub struct GlobalGate {
    top: IndexMap<String, HostValue>,
    packages: IndexMap<String, IndexMap<String, HostValue>>,
}

impl GlobalGate {
    pub fn new() -> Self {
        let mut gate = Self {
            top: IndexMap::new(),
            packages: IndexMap::new(),
        };
        builtins::install_base(&mut gate);
        gate
    }

    pub(crate) fn register_fn(&mut self, name: &str, f: BuiltinFn) {
        self.top.insert(name.to_string(), HostValue::func(f));
    }

    pub(crate) fn register_package(&mut self, name: &str) {
        self.packages.entry(name.to_string()).or_default();
    }

    pub(crate) fn package_fn(&mut self, package: &str, name: &str, f: BuiltinFn) {
        self.package_const(package, name, HostValue::func(f));
    }

    pub(crate) fn package_const(&mut self, package: &str, name: &str, value: HostValue) {
        self.packages
            .entry(package.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Privileged, host-initiated extension of a shared builtin package.
    /// Not an ordinary global write: scripts cannot do this, and scripts
    /// cannot undo it.
    pub fn extend(
        &mut self,
        package: &str,
        name: &str,
        value: HostValue,
    ) -> Result<(), EngineError> {
        match self.packages.get_mut(package) {
            Some(members) => {
                members.insert(name.to_string(), value);
                Ok(())
            }
            None => Err(EngineError::script(format!(
                "cannot extend unknown builtin package \"{package}\""
            ))),
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.top.contains_key(name) || self.packages.contains_key(name)
    }

    /// The documented allow-list, sorted, for diffing against
    /// `Context::snapshot_globals`.
    pub fn allowed_globals(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .top
            .keys()
            .chain(self.packages.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub(crate) fn build_globals(&self, heap: &mut Heap) -> FastHashMap<String, Value> {
        let mut globals = fast_map_new();
        for (name, member) in &self.top {
            globals.insert(name.clone(), member.materialize(heap));
        }
        for (name, members) in &self.packages {
            let mut table = Table::new();
            table.protected = true;
            for (key, member) in members {
                let value = member.materialize(heap);
                table.entries.insert(TableKey::str(key), value);
            }
            globals.insert(name.clone(), Value::Table(heap.alloc(Object::Table(table))));
        }
        globals
    }
}

impl Default for GlobalGate {
    fn default() -> Self {
        Self::new()
    }
}
