//! Structural interning of compound types: two struct or function
//! declarations with the same shape intern to the same [`TypeId`].
//!
//! Members are sorted by type id before hashing (fields have no defined
//! order at the declaration site), then looked up in a canonical-key table;
//! a miss allocates a fresh id and stores the descriptor.

use ahash::AHashMap;

use crate::types::tdesc::{Member, TDesc};
use crate::types::TypeId;
use crate::value::Value;

/// First id available for interned compound types. Ids below this are the
/// sixteen primitive tags plus a few reserved slots for future primitives.
pub const FIRST_COMPOUND_ID: u32 = 32;

// (name ref, type id raw, default) triples, sorted. Two structs with the
// same fields but different defaults are structurally distinct types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StructKey(Vec<(u32, u32, Option<Value>)>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FuncKey(u32, u32); // (params raw, ret raw)

/// Owns every interned compound [`TDesc`] and the canonical-key tables used
/// to deduplicate structurally identical declarations.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    descs: Vec<TDesc>,
    structs: AHashMap<StructKey, TypeId>,
    funcs: AHashMap<FuncKey, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    fn alloc(&mut self, desc: TDesc) -> TypeId {
        let id = FIRST_COMPOUND_ID + self.descs.len() as u32;
        self.descs.push(desc);
        TypeId::new(id)
    }

    /// Intern a struct-like compound type from an unordered member list.
    /// Two calls with the same members (any order) return the same `TypeId`.
    pub fn mk_struct(&mut self, members: &[Member]) -> TypeId {
        let mut sorted: Vec<Member> = members.to_vec();
        sorted.sort_by_key(|m| (m.ty.raw(), m.name.0));

        let key = StructKey(sorted.iter().map(|m| (m.name.0, m.ty.raw(), m.default)).collect());
        if let Some(id) = self.structs.get(&key) {
            return *id;
        }

        let id = self.alloc(TDesc::Struct { members: sorted });
        self.structs.insert(key, id);
        id
    }

    /// Intern a function signature, composed from a params type and a
    /// return type (each typically itself a struct-like list, mirroring
    /// how the bytecode compiler encodes multi-value argument/return
    /// lists as a single compound type).
    pub fn mk_sub(&mut self, params: TypeId, ret: TypeId) -> TypeId {
        let key = FuncKey(params.raw(), ret.raw());
        if let Some(id) = self.funcs.get(&key) {
            return *id;
        }

        let id = self.alloc(TDesc::Function { params, ret });
        self.funcs.insert(key, id);
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&TDesc> {
        let base = id.base_id();
        if base < FIRST_COMPOUND_ID {
            return None;
        }
        self.descs.get((base - FIRST_COMPOUND_ID) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::StringRef;

    fn member(name: u32, ty: u32) -> Member {
        Member::new(StringRef(name), TypeId::new(ty))
    }

    #[test]
    fn struct_interning_is_order_independent() {
        let mut reg = TypeRegistry::new();
        let a = reg.mk_struct(&[member(1, 6), member(2, 8)]);
        let b = reg.mk_struct(&[member(2, 8), member(1, 6)]);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_structs_get_distinct_ids() {
        let mut reg = TypeRegistry::new();
        let a = reg.mk_struct(&[member(1, 6)]);
        let b = reg.mk_struct(&[member(1, 7)]);
        assert_ne!(a, b);
    }

    #[test]
    fn differing_member_defaults_are_structurally_distinct() {
        use crate::value::Value;

        let mut reg = TypeRegistry::new();
        let no_default = Member::new(StringRef(1), TypeId::new(6));
        let with_default = Member::with_default(StringRef(1), TypeId::new(6), Value::sint(42));

        let a = reg.mk_struct(&[no_default]);
        let b = reg.mk_struct(&[with_default]);
        assert_ne!(a, b, "a field's default value is part of its structural identity");

        let c = reg.mk_struct(&[with_default]);
        assert_eq!(b, c, "identical defaults re-intern to the same type");
    }

    #[test]
    fn function_signature_interning() {
        let mut reg = TypeRegistry::new();
        let params = reg.mk_struct(&[member(1, 6)]);
        let ret = TypeId::new(8);
        let f1 = reg.mk_sub(params, ret);
        let f2 = reg.mk_sub(params, ret);
        assert_eq!(f1, f2);
        assert!(reg.get(f1).unwrap().as_function().is_some());
    }
}
