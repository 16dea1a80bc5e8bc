//! Namespaced symbol table: identifier and overloaded-function bindings.
//!
//! Built on [`crate::collections::Table`], the same open-addressed
//! `Value`-keyed table every other GC-managed mapping in this crate uses.
//! The outer `SymTable` maps a namespace value to an index into its own
//! `tables` vector, one [`SimpleSymTable`] per namespace; each
//! `SimpleSymTable` is itself a `Table` keyed by a packed `(name, arg type)`
//! pair, where `arg type` is `0` for a plain identifier binding and the
//! interned parameter-list type for a function overload. A function lookup
//! that misses on the exact argument type falls back to the plain-identifier
//! slot, so a non-overloaded callable can still be found by name alone.
//!
//! `Table` only accepts `Value` keys, so the `(name, arg_type)` pair is
//! packed into a single opaque `Value` (`name` in the high 32 bits,
//! `arg_type` in the low 32) rather than used as a native Rust tuple key.

use crate::collections::Table;
use crate::strings::StringRef;
use crate::types::TypeId;
use crate::value::Value;

/// `0` means "no argument-type overload": a plain identifier binding.
const PLAIN: u32 = 0;

fn pack_key(name: StringRef, arg_type: u32) -> Value {
    Value::opaque(((name.0 as u64) << 32) | arg_type as u64)
}

/// Per-namespace bindings: identifiers and overloaded functions.
#[derive(Debug, Clone, Default)]
pub struct SimpleSymTable {
    entries: Table,
}

impl SimpleSymTable {
    pub fn new() -> Self {
        SimpleSymTable::default()
    }

    pub fn add_plain(&mut self, name: StringRef, val: Value) {
        self.entries.set(pack_key(name, PLAIN), val);
    }

    pub fn add_overload(&mut self, name: StringRef, arg_type: TypeId, val: Value) {
        debug_assert_ne!(arg_type.raw(), PLAIN, "an overload must have a non-zero argument type");
        self.entries.set(pack_key(name, arg_type.raw()), val);
    }

    pub fn lookup_ident(&self, name: StringRef) -> Option<Value> {
        let v = self.entries.get(pack_key(name, PLAIN));
        (!v.is_nil()).then_some(v)
    }

    /// Look up `name` for a call with argument type `arg_type`. Falls back
    /// to the plain-identifier slot if no exact overload matches.
    pub fn lookup_func(&self, name: StringRef, arg_type: TypeId) -> Option<Value> {
        let exact = self.entries.get(pack_key(name, arg_type.raw()));
        if !exact.is_nil() {
            return Some(exact);
        }
        let plain = self.entries.get(pack_key(name, PLAIN));
        (!plain.is_nil()).then_some(plain)
    }

    /// Every bound value, for GC marking.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.entries.len()).map(move |i| self.entries.entry_at(i).1)
    }
}

/// Outer, namespace-keyed symbol table.
#[derive(Debug, Clone, Default)]
pub struct SymTable {
    /// Namespace value -> opaque index into `tables`.
    namespaces: Table,
    tables: Vec<SimpleSymTable>,
}

impl SymTable {
    pub fn new() -> Self {
        SymTable::default()
    }

    fn namespace_index(&mut self, ns: Value) -> usize {
        let existing = self.namespaces.get(ns);
        if !existing.is_nil() {
            return existing.raw_payload() as usize;
        }
        let idx = self.tables.len();
        self.tables.push(SimpleSymTable::new());
        self.namespaces.set(ns, Value::opaque(idx as u64));
        idx
    }

    pub fn add_to_namespace(&mut self, ns: Value, name: StringRef, val: Value) {
        let idx = self.namespace_index(ns);
        self.tables[idx].add_plain(name, val);
    }

    pub fn add_overload_to_namespace(&mut self, ns: Value, name: StringRef, arg_type: TypeId, val: Value) {
        let idx = self.namespace_index(ns);
        self.tables[idx].add_overload(name, arg_type, val);
    }

    pub fn lookup_ident_in_namespace(&self, ns: Value, name: StringRef) -> Option<Value> {
        self.namespace(ns)?.lookup_ident(name)
    }

    pub fn lookup_func_in_namespace(&self, ns: Value, name: StringRef, arg_type: TypeId) -> Option<Value> {
        self.namespace(ns)?.lookup_func(name, arg_type)
    }

    pub fn namespace(&self, ns: Value) -> Option<&SimpleSymTable> {
        let idx_val = self.namespaces.get(ns);
        if idx_val.is_nil() {
            return None;
        }
        self.tables.get(idx_val.raw_payload() as usize)
    }

    /// Every namespace key plus every value bound anywhere, for GC marking.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.namespaces.len()).flat_map(move |i| {
            let (ns, idx_val) = self.namespaces.entry_at(i);
            let table = &self.tables[idx_val.raw_payload() as usize];
            std::iter::once(ns).chain(table.values())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifier_lookup() {
        let mut t = SimpleSymTable::new();
        t.add_plain(StringRef(5), Value::sint(42));
        assert_eq!(t.lookup_ident(StringRef(5)).unwrap().as_sint(), Some(42));
        assert!(t.lookup_ident(StringRef(6)).is_none());
    }

    #[test]
    fn overload_resolution_falls_back_to_plain() {
        let mut t = SimpleSymTable::new();
        let uint_uint = TypeId::new(200);
        t.add_overload(StringRef(1), uint_uint, Value::sint(1));
        t.add_plain(StringRef(1), Value::sint(2));

        assert_eq!(t.lookup_func(StringRef(1), uint_uint).unwrap().as_sint(), Some(1));
        assert_eq!(t.lookup_func(StringRef(1), TypeId::new(999)).unwrap().as_sint(), Some(2));
    }

    #[test]
    fn namespaced_bindings_are_isolated() {
        let mut st = SymTable::new();
        let ns_a = Value::string(StringRef(10));
        let ns_b = Value::string(StringRef(11));
        st.add_to_namespace(ns_a, StringRef(1), Value::sint(1));
        st.add_to_namespace(ns_b, StringRef(1), Value::sint(2));

        assert_eq!(st.lookup_ident_in_namespace(ns_a, StringRef(1)).unwrap().as_sint(), Some(1));
        assert_eq!(st.lookup_ident_in_namespace(ns_b, StringRef(1)).unwrap().as_sint(), Some(2));
    }

    #[test]
    fn values_yields_namespace_keys_and_every_bound_value() {
        let mut st = SymTable::new();
        let ns = Value::string(StringRef(20));
        st.add_to_namespace(ns, StringRef(1), Value::sint(11));
        st.add_overload_to_namespace(ns, StringRef(2), TypeId::new(30), Value::sint(22));

        let values: Vec<Value> = st.values().collect();
        assert!(values.contains(&ns));
        assert!(values.contains(&Value::sint(11)));
        assert!(values.contains(&Value::sint(22)));
    }
}
