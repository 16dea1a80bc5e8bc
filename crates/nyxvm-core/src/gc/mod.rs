//! Incremental tri-color mark-sweep collector over the heap [`Pool`].
//!
//! Five queues of object ids stand in for the reference implementation's
//! five intrusive linked lists (`normally_white`, `pinned`, `grey`,
//! `to_splice`, `dead`); a phase state machine (`Idle -> Premark -> Mark ->
//! Splice -> Idle`) drives the collector forward in caller-supplied budget
//! increments rather than to completion, so a host can interleave
//! collection with useful work. No color bit for white is ever stored:
//! an object is white simply by sitting in `normally_white`/`pinned`
//! outside of an active cycle.

mod header;
mod object;

pub use header::GcHeader;
pub use object::{BytecodeFunc, DFunc, DObj, GcId, GcObject, GcPayload, NativeFn, Pool};

use crate::collections::{DArray, Table};
use crate::strings::StringPool;
use crate::symtable::SymTable;
use crate::value::{Tag, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Premark,
    Mark,
    Splice,
}

/// Abstract step costs: one unit per marked pointer, ten per finalizer run
/// (finalizers are comparatively expensive — they may re-enter user code).
const COST_FINALIZER: u32 = 10;

/// How many dead objects `gc_step` frees per call, independent of the
/// caller's budget — freeing is cheap and bounding it avoids a single call
/// stalling on a very long dead list.
const FREE_PER_STEP: usize = 2;

pub struct Heap {
    pool: Pool,
    normally_white: Vec<GcId>,
    pinned: Vec<GcId>,
    grey: Vec<GcId>,
    to_splice: Vec<GcId>,
    dead: Vec<GcId>,
    phase: Phase,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            pool: Pool::new(),
            normally_white: Vec::new(),
            pinned: Vec::new(),
            grey: Vec::new(),
            to_splice: Vec::new(),
            dead: Vec::new(),
            phase: Phase::Idle,
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn get(&self, id: GcId) -> Option<&GcObject> {
        self.pool.get(id)
    }

    pub fn get_mut(&mut self, id: GcId) -> Option<&mut GcObject> {
        self.pool.get_mut(id)
    }

    /// Allocate a new heap object. Objects created mid-cycle land in the
    /// "new white" generation and are not visited again until the next
    /// cycle: they start implicitly reachable (unswept), never dead.
    pub fn alloc(&mut self, pinned: bool, payload: GcPayload) -> GcId {
        let obj = GcObject::new(pinned, payload);
        let id = self.pool.alloc(obj);
        if pinned {
            self.pinned.push(id);
        } else {
            self.normally_white.push(id);
        }
        id
    }

    /// Sticky-grey write barrier: enqueue `id` for traversal unless it is
    /// already grey or black this cycle. Call this whenever a reference to
    /// `id` is stored into an already-reachable object.
    pub fn make_grey(&mut self, id: GcId) {
        if let Some(obj) = self.pool.get_mut(id) {
            if obj.header.is_black() {
                return;
            }
            if obj.header.mark_grey() {
                self.grey.push(id);
            }
        }
    }

    fn mark_value(&mut self, strings: &mut StringPool, v: Value) {
        match v.tag() {
            Tag::Table | Tag::Array | Tag::Object | Tag::Func => {
                if let Some(id) = v.as_gc_id() {
                    self.make_grey(id);
                }
            }
            Tag::String | Tag::Error => {
                if let Some(r) = v.as_string_ref().or_else(|| v.as_error_ref()) {
                    strings.mark(r);
                }
            }
            // Compound/primitive types are structurally interned and
            // effectively immortal for the crate's lifetime; nothing to mark.
            _ => {}
        }
    }

    fn children_of(payload: &GcPayload) -> Vec<Value> {
        match payload {
            GcPayload::Table(t) => {
                let mut out = Vec::with_capacity(t.len() * 2);
                for i in 0..t.len() {
                    let (k, v) = t.entry_at(i);
                    out.push(k);
                    out.push(v);
                }
                out
            }
            GcPayload::Array(a) => a.values(),
            GcPayload::Object(o) => o.fields.clone(),
            GcPayload::Func(_) => Vec::new(),
            GcPayload::SymTable(s) => s.values().collect(),
        }
    }

    /// Run up to `budget` units of marking. Returns leftover budget (0 if
    /// the grey list was not emptied within budget).
    fn mark_step(&mut self, strings: &mut StringPool, mut budget: u32) -> u32 {
        while budget > 0 {
            let Some(id) = self.grey.pop() else { return budget };
            let children = match self.pool.get_mut(id) {
                Some(obj) => {
                    obj.header.clear_grey();
                    obj.header.set_black();
                    Heap::children_of(&obj.payload)
                }
                None => continue,
            };
            budget -= 1;
            for v in children {
                self.mark_value(strings, v);
            }
        }
        budget
    }

    /// Sort `to_splice` into newly-white (still reachable) and dead
    /// (unreached) objects, clearing mark bits on the survivors.
    fn splice_step(&mut self, mut budget: u32) -> u32 {
        while budget > 0 {
            let Some(id) = self.to_splice.pop() else { return budget };
            budget -= 1;
            let Some(obj) = self.pool.get_mut(id) else { continue };
            if obj.header.is_black() {
                obj.header.clear_mark_bits();
                if obj.header.is_pinned() {
                    self.pinned.push(id);
                } else {
                    self.normally_white.push(id);
                }
            } else {
                self.dead.push(id);
            }
        }
        budget
    }

    /// Free a bounded number of dead objects per call. An object marked
    /// with a pending finalizer is resurrected once (its finalizer bit is
    /// cleared so it cannot resurrect a second time) rather than freed;
    /// running an actual finalizer callback is outside this layer.
    fn free_some_dead(&mut self) {
        for _ in 0..FREE_PER_STEP {
            let Some(id) = self.dead.pop() else { return };
            let Some(obj) = self.pool.get_mut(id) else { continue };
            if obj.header.is_finalizer() {
                obj.header.set_finalizer(false);
                obj.header.clear_mark_bits();
                self.normally_white.push(id);
            } else {
                self.pool.free(id);
            }
        }
    }

    /// Drive the collector forward by `budget` abstract units, freeing a
    /// small bounded number of already-dead objects first regardless of
    /// phase.
    pub fn step(&mut self, strings: &mut StringPool, mut budget: u32) {
        self.free_some_dead();

        loop {
            match self.phase {
                Phase::Idle => {
                    self.phase = Phase::Premark;
                }
                Phase::Premark => {
                    debug_assert!(self.grey.is_empty());
                    debug_assert!(self.to_splice.is_empty());
                    self.to_splice = std::mem::take(&mut self.normally_white);
                    self.grey = std::mem::take(&mut self.pinned);
                    for &id in &self.grey {
                        if let Some(obj) = self.pool.get_mut(id) {
                            obj.header.mark_grey();
                            obj.header.set_black();
                        }
                    }
                    self.phase = Phase::Mark;
                }
                Phase::Mark => {
                    budget = self.mark_step(strings, budget);
                    if budget == 0 {
                        return;
                    }
                    self.phase = Phase::Splice;
                }
                Phase::Splice => {
                    budget = self.splice_step(budget);
                    if budget == 0 || !self.to_splice.is_empty() {
                        return;
                    }
                    self.phase = Phase::Idle;
                    return;
                }
            }
        }
    }

    pub fn live_objects(&self) -> usize {
        self.pool.len()
    }

    pub fn table(&self, id: GcId) -> Option<&Table> {
        match &self.pool.get(id)?.payload {
            GcPayload::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn table_mut(&mut self, id: GcId) -> Option<&mut Table> {
        match &mut self.pool.get_mut(id)?.payload {
            GcPayload::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn array(&self, id: GcId) -> Option<&DArray> {
        match &self.pool.get(id)?.payload {
            GcPayload::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn array_mut(&mut self, id: GcId) -> Option<&mut DArray> {
        match &mut self.pool.get_mut(id)?.payload {
            GcPayload::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn object(&self, id: GcId) -> Option<&DObj> {
        match &self.pool.get(id)?.payload {
            GcPayload::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn func(&self, id: GcId) -> Option<&DFunc> {
        match &self.pool.get(id)?.payload {
            GcPayload::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn symtable(&self, id: GcId) -> Option<&SymTable> {
        match &self.pool.get(id)?.payload {
            GcPayload::SymTable(s) => Some(s),
            _ => None,
        }
    }

    pub fn symtable_mut(&mut self, id: GcId) -> Option<&mut SymTable> {
        match &mut self.pool.get_mut(id)?.payload {
            GcPayload::SymTable(s) => Some(s),
            _ => None,
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreferenced_object_is_collected() {
        let mut heap = Heap::new();
        let mut strings = StringPool::new();
        let id = heap.alloc(false, GcPayload::Table(Table::new()));
        assert_eq!(heap.live_objects(), 1);

        // Full cycle: premark -> mark (nothing grey, nothing reachable from
        // a root) -> splice -> idle. Budget large enough to not stall.
        heap.step(&mut strings, 1000);
        heap.step(&mut strings, 1000);
        assert!(heap.get(id).is_none() || !heap.get(id).unwrap().header.is_black());
    }

    #[test]
    fn pinned_object_survives_a_cycle() {
        let mut heap = Heap::new();
        let mut strings = StringPool::new();
        let id = heap.alloc(true, GcPayload::Table(Table::new()));
        heap.step(&mut strings, 1000);
        heap.step(&mut strings, 1000);
        assert!(heap.get(id).is_some());
        assert!(heap.get(id).unwrap().header.is_pinned());
    }

    #[test]
    fn reachable_object_survives_via_make_grey() {
        let mut heap = Heap::new();
        let mut strings = StringPool::new();
        let root = heap.alloc(true, GcPayload::Table(Table::new()));
        let child = heap.alloc(false, GcPayload::Table(Table::new()));

        heap.table_mut(root).unwrap().set(Value::sint(1), Value::table(child));

        // Drive premark, then walk root's children manually the way the
        // mark phase would when reached from a pinned root.
        heap.step(&mut strings, 0); // advance Idle -> Premark only
        heap.make_grey(root);
        heap.make_grey(child);
        heap.step(&mut strings, 1000);
        heap.step(&mut strings, 1000);

        assert!(heap.get(child).is_some());
    }
}
