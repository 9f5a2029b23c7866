//! Per-chain object heap.
//!
//! Every table and function a chain creates lives here, and the whole
//! arena is dropped with the chain scope. Handles never outlive their
//! heap, which is what makes cross-chain aliasing impossible.

use indexmap::IndexMap;
use quill_core::{EngineError, ObjId, TableKey, Value};

use crate::clock::TimeTable;
use crate::context::Context;

use std::rc::Rc;

/// A script-callable host function.
pub type ScriptFn = Rc<dyn Fn(&mut Context<'_>, &[Value]) -> Result<Value, EngineError>>;

/// A loaded module body, ready to execute. Stands in for the embedded
/// interpreter's compiled chunk; executing it yields the module's single
/// exported value.
pub type Chunk = Rc<dyn Fn(&mut Context<'_>) -> Result<Value, EngineError>>;

pub enum Object {
    Table(Table),
    Function(ScriptFn),
    Time(TimeTable),
}

pub struct Table {
    pub entries: IndexMap<TableKey, Value>,
    /// Writes to protected tables (the gated builtin packages) are
    /// dropped silently; only the host may extend them.
    pub protected: bool,
}

impl Table {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            protected: false,
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    pub fn alloc(&mut self, object: Object) -> ObjId {
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn alloc_table(&mut self) -> Value {
        Value::Table(self.alloc(Object::Table(Table::new())))
    }

    pub fn alloc_function(&mut self, f: ScriptFn) -> Value {
        Value::Function(self.alloc(Object::Function(f)))
    }

    pub fn get(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub fn table(&self, id: ObjId) -> Option<&Table> {
        match self.get(id) {
            Object::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn table_mut(&mut self, id: ObjId) -> Option<&mut Table> {
        match self.get_mut(id) {
            Object::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn function(&self, id: ObjId) -> Option<ScriptFn> {
        match self.get(id) {
            Object::Function(f) => Some(f.clone()),
            _ => None,
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Heap-independent deep copy of a pure-data value, used as the storage
/// form of the process-wide data-module cache. Snapshots carry no
/// handles, so they can be rematerialized into any chain's heap.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Table(Vec<(TableKey, Snapshot)>),
}

pub fn snapshot(heap: &Heap, value: &Value) -> Result<Snapshot, EngineError> {
    let mut seen = Vec::new();
    snapshot_inner(heap, value, &mut seen)
}

fn snapshot_inner(
    heap: &Heap,
    value: &Value,
    seen: &mut Vec<ObjId>,
) -> Result<Snapshot, EngineError> {
    Ok(match value {
        Value::Nil => Snapshot::Nil,
        Value::Bool(b) => Snapshot::Bool(*b),
        Value::Number(n) => Snapshot::Number(*n),
        Value::Str(s) => Snapshot::Str(s.to_string()),
        Value::Function(_) => {
            return Err(EngineError::script(
                "data module returned a value containing a function",
            ));
        }
        Value::Table(id) => {
            if seen.contains(id) {
                return Err(EngineError::script(
                    "data module returned a self-referential table",
                ));
            }
            let Some(table) = heap.table(*id) else {
                return Err(EngineError::script(
                    "data module returned a value containing a time value",
                ));
            };
            seen.push(*id);
            let mut entries = Vec::with_capacity(table.entries.len());
            for (k, v) in &table.entries {
                entries.push((k.clone(), snapshot_inner(heap, v, seen)?));
            }
            seen.pop();
            Snapshot::Table(entries)
        }
    })
}

pub fn materialize(heap: &mut Heap, snapshot: &Snapshot) -> Value {
    match snapshot {
        Snapshot::Nil => Value::Nil,
        Snapshot::Bool(b) => Value::Bool(*b),
        Snapshot::Number(n) => Value::Number(*n),
        Snapshot::Str(s) => Value::str(s),
        Snapshot::Table(entries) => {
            let mut table = Table::new();
            for (k, v) in entries {
                let value = materialize(heap, v);
                table.entries.insert(k.clone(), value);
            }
            Value::Table(heap.alloc(Object::Table(table)))
        }
    }
}
