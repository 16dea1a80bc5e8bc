//! Heap object kinds and the id used to reference them from a [`Value`].

use ahash::RandomState;
use indexmap::IndexMap;

use crate::collections::{DArray, Table};
use crate::error::VmError;
use crate::gc::header::GcHeader;
use crate::strings::StringRef;
use crate::symtable::SymTable;
use crate::types::TypeId;
use crate::value::Value;

/// Index into a [`crate::gc::Pool`]. `Value`'s heap tag (`TABLE`/`ARRAY`/
/// `OBJECT`/`FUNC`) already says which payload kind to expect, so the id
/// itself carries no kind tag of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcId(u32);

impl GcId {
    pub fn to_u64(self) -> u64 {
        self.0 as u64
    }

    pub fn from_u64(bits: u64) -> Self {
        GcId(bits as u32)
    }
}

/// A struct-like object instance: a bag of named fields backing a
/// user-defined compound type.
#[derive(Debug, Clone)]
pub struct DObj {
    pub type_id: TypeId,
    pub fields: Vec<Value>,
}

impl DObj {
    pub fn new(type_id: TypeId, fields: Vec<Value>) -> Self {
        DObj { type_id, fields }
    }

    /// Field lookup by name is not implemented at this layer: resolving a
    /// member name to a field index requires the type descriptor the
    /// bytecode compiler already baked into the call site, which is
    /// outside this crate's surface. Always reports "not found".
    pub fn member(&self, _name: StringRef) -> Option<Value> {
        None
    }
}

pub type NativeFn = fn(&[Value]) -> Result<Vec<Value>, VmError>;

/// A compiled function's entry point within a runtime-owned chunk table.
#[derive(Debug, Clone, Copy)]
pub struct BytecodeFunc {
    pub chunk: usize,
    pub num_params: u16,
    pub num_locals: u16,
    pub num_varrets: u16,
}

/// A callable value: one of the four call-opcode shapes the VM dispatches
/// on (leaf, fixed-arity host call, variadic host call, bytecode).
#[derive(Debug, Clone, Copy)]
pub enum DFunc {
    /// No call-stack access, no nested calls: pure value-in, value-out.
    Leaf(NativeFn),
    CFixed(NativeFn, u8),
    CVariadic(NativeFn),
    Bytecode(BytecodeFunc),
}

/// The payload of a heap object, discriminated by which `Value` heap tag
/// refers to it.
#[derive(Debug, Clone)]
pub enum GcPayload {
    Table(Table),
    Array(DArray),
    Object(DObj),
    Func(DFunc),
    /// Not reachable through any `Value` tag — owned internally by the VM
    /// for closures/namespacing — but still a GC-managed heap object kind.
    SymTable(SymTable),
}

#[derive(Debug, Clone)]
pub struct GcObject {
    pub header: GcHeader,
    pub payload: GcPayload,
}

impl GcObject {
    pub fn new(pinned: bool, payload: GcPayload) -> Self {
        GcObject { header: GcHeader::new_allocated(pinned), payload }
    }
}

/// Owns every live heap object, addressed by [`GcId`].
#[derive(Debug)]
pub struct Pool {
    objects: IndexMap<u32, GcObject, RandomState>,
    free_list: Vec<u32>,
    next_id: u32,
}

impl Pool {
    pub fn new() -> Self {
        Pool {
            objects: IndexMap::with_hasher(RandomState::new()),
            free_list: Vec::new(),
            next_id: 0,
        }
    }

    pub fn alloc(&mut self, obj: GcObject) -> GcId {
        let id = self.free_list.pop().unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            id
        });
        self.objects.insert(id, obj);
        GcId(id)
    }

    pub fn get(&self, id: GcId) -> Option<&GcObject> {
        self.objects.get(&id.0)
    }

    pub fn get_mut(&mut self, id: GcId) -> Option<&mut GcObject> {
        self.objects.get_mut(&id.0)
    }

    pub fn free(&mut self, id: GcId) -> Option<GcObject> {
        let obj = self.objects.swap_remove(&id.0);
        if obj.is_some() {
            self.free_list.push(id.0);
        }
        obj
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = GcId> + '_ {
        self.objects.keys().map(|&k| GcId(k))
    }
}

impl Default for Pool {
    fn default() -> Self {
        Pool::new()
    }
}
