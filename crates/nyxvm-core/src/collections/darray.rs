//! Dynamically typed array: a single homogeneous element type chosen at
//! construction, packed tightly for primitive element types and falling
//! back to a plain `Value` array when the element type is `ANY` (or any
//! other type without a compact native representation).

use crate::collections::pod_array::PodArray;
use crate::strings::StringRef;
use crate::types::TypeId;
use crate::value::{Tag, Value};

#[derive(Debug, Clone)]
enum Storage {
    Any(PodArray<Value>),
    Uint(PodArray<u64>),
    Sint(PodArray<i64>),
    Float(PodArray<f64>),
    Bool(PodArray<bool>),
    Str(PodArray<StringRef>),
}

/// A dynamically typed, homogeneously element-typed growable array.
#[derive(Debug, Clone)]
pub struct DArray {
    storage: Storage,
    elem_type: TypeId,
}

fn storage_for(elem_type: TypeId) -> Storage {
    if elem_type.is_primitive() && !elem_type.has_option() && !elem_type.has_vec() {
        match Tag::from_u8(elem_type.base_id() as u8) {
            Tag::Uint => return Storage::Uint(PodArray::new()),
            Tag::Sint => return Storage::Sint(PodArray::new()),
            Tag::Float => return Storage::Float(PodArray::new()),
            Tag::Bool => return Storage::Bool(PodArray::new()),
            Tag::String | Tag::Error => return Storage::Str(PodArray::new()),
            _ => {}
        }
    }
    Storage::Any(PodArray::new())
}

impl DArray {
    pub fn new(elem_type: TypeId) -> Self {
        DArray { storage: storage_for(elem_type), elem_type }
    }

    pub fn elem_type(&self) -> TypeId {
        self.elem_type
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Any(a) => a.len(),
            Storage::Uint(a) => a.len(),
            Storage::Sint(a) => a.len(),
            Storage::Float(a) => a.len(),
            Storage::Bool(a) => a.len(),
            Storage::Str(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Any(a) => a.clear(),
            Storage::Uint(a) => a.clear(),
            Storage::Sint(a) => a.clear(),
            Storage::Float(a) => a.clear(),
            Storage::Bool(a) => a.clear(),
            Storage::Str(a) => a.clear(),
        }
    }

    /// Out-of-range reads return nil rather than panicking, matching the
    /// tolerant read semantics of the lookup/index operations this backs.
    pub fn dynamic_lookup(&self, idx: usize) -> Value {
        match &self.storage {
            Storage::Any(a) => a.get(idx).unwrap_or_default(),
            Storage::Uint(a) => a.get(idx).map(Value::uint).unwrap_or_default(),
            Storage::Sint(a) => a.get(idx).map(Value::sint).unwrap_or_default(),
            Storage::Float(a) => a.get(idx).map(Value::float).unwrap_or_default(),
            Storage::Bool(a) => a.get(idx).map(Value::bool_).unwrap_or_default(),
            Storage::Str(a) => a.get(idx).map(Value::string).unwrap_or_default(),
        }
    }

    pub fn dynamic_append(&mut self, v: Value) {
        match &mut self.storage {
            Storage::Any(a) => a.push(v),
            Storage::Uint(a) => a.push(v.as_uint().expect("uint element")),
            Storage::Sint(a) => a.push(v.as_sint().expect("sint element")),
            Storage::Float(a) => a.push(v.as_float().expect("float element")),
            Storage::Bool(a) => a.push(v.as_bool().expect("bool element")),
            Storage::Str(a) => a.push(v.as_string_ref().expect("string element")),
        }
    }

    /// Replace the value at `idx`, returning the previous value.
    pub fn dynamic_set(&mut self, idx: usize, v: Value) -> Value {
        match &mut self.storage {
            Storage::Any(a) => a.set(idx, v),
            Storage::Uint(a) => Value::uint(a.set(idx, v.as_uint().expect("uint element"))),
            Storage::Sint(a) => Value::sint(a.set(idx, v.as_sint().expect("sint element"))),
            Storage::Float(a) => Value::float(a.set(idx, v.as_float().expect("float element"))),
            Storage::Bool(a) => Value::bool_(a.set(idx, v.as_bool().expect("bool element"))),
            Storage::Str(a) => Value::string(a.set(idx, v.as_string_ref().expect("string element"))),
        }
    }

    /// Swap-remove `idx` with the last element; the caller is responsible
    /// for patching any external index that tracked the moved element.
    pub fn remove_at_and_move_last(&mut self, idx: usize) -> Value {
        match &mut self.storage {
            Storage::Any(a) => a.remove_and_move_last(idx),
            Storage::Uint(a) => Value::uint(a.remove_and_move_last(idx)),
            Storage::Sint(a) => Value::sint(a.remove_and_move_last(idx)),
            Storage::Float(a) => Value::float(a.remove_and_move_last(idx)),
            Storage::Bool(a) => Value::bool_(a.remove_and_move_last(idx)),
            Storage::Str(a) => Value::string(a.remove_and_move_last(idx)),
        }
    }

    pub fn pop_value(&mut self) -> Value {
        match &mut self.storage {
            Storage::Any(a) => a.pop().unwrap_or_default(),
            Storage::Uint(a) => a.pop().map(Value::uint).unwrap_or_default(),
            Storage::Sint(a) => a.pop().map(Value::sint).unwrap_or_default(),
            Storage::Float(a) => a.pop().map(Value::float).unwrap_or_default(),
            Storage::Bool(a) => a.pop().map(Value::bool_).unwrap_or_default(),
            Storage::Str(a) => a.pop().map(Value::string).unwrap_or_default(),
        }
    }

    /// Every element, as `Value`, for traversal (GC marking, iteration).
    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.dynamic_lookup(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_storage_round_trips() {
        let mut a = DArray::new(TypeId::new(Tag::Any as u32));
        a.dynamic_append(Value::sint(7));
        a.dynamic_append(Value::uint(9));
        assert_eq!(a.dynamic_lookup(0).as_sint(), Some(7));
        assert_eq!(a.dynamic_lookup(1).as_uint(), Some(9));
    }

    #[test]
    fn packed_uint_storage_round_trips() {
        let mut a = DArray::new(TypeId::new(Tag::Uint as u32));
        a.dynamic_append(Value::uint(1));
        a.dynamic_append(Value::uint(2));
        a.dynamic_append(Value::uint(3));
        let removed = a.remove_at_and_move_last(0);
        assert_eq!(removed.as_uint(), Some(1));
        assert_eq!(a.len(), 2);
        assert_eq!(a.dynamic_lookup(0).as_uint(), Some(3));
    }

    #[test]
    fn out_of_range_lookup_returns_nil() {
        let a = DArray::new(TypeId::new(Tag::Sint as u32));
        assert!(a.dynamic_lookup(0).is_nil());
    }
}
