//! Deduplicating string pool: every distinct byte string interned through
//! this pool gets exactly one stable [`StringRef`] for the lifetime of the
//! slot. Short strings (<=14 bytes) live inline in the slot; longer strings
//! are a separate heap allocation with their hash cached so it is never
//! recomputed. Ref 0 is the null string, ref 1 the empty string; both are
//! sentinel slots that never go through dedup lookup.
//!
//! Open addressing, linear probing, no tombstones: an empty key slot always
//! ends a probe sequence, so dead entries are physically removed from the
//! key table during a resize rather than marked and skipped over.

use ahash::RandomState;

use crate::strings::StringRef;

const SHORT_CAP: usize = 14;
const INITIAL_KEYS: usize = 32;

#[derive(Debug, Clone)]
enum Slot {
    /// A freed entry. Its index (ref) is never reused.
    Dead,
    Short { len: u8, bytes: [u8; SHORT_CAP], marked: bool },
    Long { data: Box<[u8]>, hash: u32, marked: bool },
}

impl Slot {
    fn bytes(&self) -> &[u8] {
        match self {
            Slot::Dead => &[],
            Slot::Short { len, bytes, .. } => &bytes[..*len as usize],
            Slot::Long { data, .. } => data,
        }
    }

    fn is_marked(&self) -> bool {
        match self {
            Slot::Dead => false,
            Slot::Short { marked, .. } => *marked,
            Slot::Long { marked, .. } => *marked,
        }
    }

    fn set_marked(&mut self, on: bool) {
        match self {
            Slot::Dead => {}
            Slot::Short { marked, .. } => *marked = on,
            Slot::Long { marked, .. } => *marked = on,
        }
    }

    fn cached_hash(&self, hasher: &RandomState) -> u32 {
        match self {
            Slot::Dead => 0,
            Slot::Long { hash, .. } => *hash,
            Slot::Short { .. } => keyhash(hasher, self.bytes()),
        }
    }
}

fn keyhash(hasher: &RandomState, bytes: &[u8]) -> u32 {
    let h = hasher.hash_one(bytes) as u32;
    h ^ (bytes.len() as u32).rotate_right(12)
}

#[derive(Debug, Clone, Copy)]
struct KeySlot {
    hash: u32,
    ref_: u32,
}

impl KeySlot {
    const EMPTY: KeySlot = KeySlot { hash: 0, ref_: 0 };

    fn is_empty(&self) -> bool {
        self.ref_ < 2
    }
}

/// Deduplicating string/byte-string intern pool.
pub struct StringPool {
    hasher: RandomState,
    slots: Vec<Slot>,
    keys: Vec<KeySlot>,
    mask: u32,
    sweep_pos: usize,
    in_use: usize,
}

impl StringPool {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(32);
        slots.push(Slot::Dead); // ref 0: null
        slots.push(Slot::Short { len: 0, bytes: [0; SHORT_CAP], marked: true }); // ref 1: empty
        StringPool {
            hasher: RandomState::with_seeds(0x9e37_79b9, 0x7f4a_7c15, 0x1234_5678, 0x9abc_def0),
            slots,
            keys: vec![KeySlot::EMPTY; INITIAL_KEYS],
            mask: (INITIAL_KEYS - 1) as u32,
            sweep_pos: 2,
            in_use: 0,
        }
    }

    /// Number of live (non-dead) entries beyond the two sentinels.
    pub fn len(&self) -> usize {
        self.slots.len().saturating_sub(2)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn grow_keys_if_needed(&mut self) {
        if self.slots.len() as u32 + self.slots.len() as u32 / 4 >= self.mask {
            let new_len = (self.mask as usize + 1) * 2;
            self.resize_keys(new_len);
        }
    }

    fn resize_keys(&mut self, new_len: usize) {
        let new_mask = (new_len - 1) as u32;
        let mut new_keys = vec![KeySlot::EMPTY; new_len];
        for (idx, slot) in self.slots.iter().enumerate().skip(2) {
            if matches!(slot, Slot::Dead) {
                continue;
            }
            let h = slot.cached_hash(&self.hasher);
            let mut i = h;
            loop {
                i &= new_mask;
                if new_keys[i as usize].is_empty() {
                    new_keys[i as usize] = KeySlot { hash: h, ref_: idx as u32 };
                    break;
                }
                i = i.wrapping_add(1);
            }
        }
        self.keys = new_keys;
        self.mask = new_mask;
    }

    /// Find an existing dedup slot for `bytes`, or reserve an empty key slot
    /// for a new entry. Returns the key-table index.
    fn prep_key(&mut self, bytes: &[u8]) -> usize {
        self.grow_keys_if_needed();
        let h = keyhash(&self.hasher, bytes);
        let mut i = h;
        loop {
            i &= self.mask;
            let idx = i as usize;
            if self.keys[idx].is_empty() {
                self.keys[idx].hash = h;
                return idx;
            }
            if self.keys[idx].hash == h {
                let r = self.keys[idx].ref_ as usize;
                if self.slots[r].bytes() == bytes {
                    return idx;
                }
            }
            i = i.wrapping_add(1);
        }
    }

    fn alloc_slot(&mut self, bytes: &[u8]) -> Slot {
        if bytes.len() <= SHORT_CAP {
            let mut arr = [0u8; SHORT_CAP];
            arr[..bytes.len()].copy_from_slice(bytes);
            Slot::Short { len: bytes.len() as u8, bytes: arr, marked: true }
        } else {
            Slot::Long { data: bytes.to_vec().into_boxed_slice(), hash: keyhash(&self.hasher, bytes), marked: true }
        }
    }

    /// Intern a copy of `bytes`, returning its stable ref. Zero-length input
    /// returns ref 1 (the empty-string sentinel) without touching the table.
    pub fn put_copy(&mut self, bytes: &[u8]) -> StringRef {
        if bytes.is_empty() {
            return StringRef(1);
        }

        let key_idx = self.prep_key(bytes);
        if self.keys[key_idx].ref_ >= 2 {
            return StringRef(self.keys[key_idx].ref_);
        }

        let slot = self.alloc_slot(bytes);
        self.slots.push(slot);
        let r = (self.slots.len() - 1) as u32;
        self.keys[key_idx].ref_ = r;
        StringRef(r)
    }

    /// Intern `data` without copying when a long allocation is ultimately
    /// kept; a duplicate still drops `data` in favor of the existing entry.
    pub fn put_take_ownership(&mut self, data: Vec<u8>) -> StringRef {
        if data.is_empty() {
            return StringRef(1);
        }

        let key_idx = self.prep_key(&data);
        if self.keys[key_idx].ref_ >= 2 {
            return StringRef(self.keys[key_idx].ref_);
        }

        let slot = if data.len() <= SHORT_CAP {
            self.alloc_slot(&data)
        } else {
            let hash = keyhash(&self.hasher, &data);
            Slot::Long { data: data.into_boxed_slice(), hash, marked: true }
        };
        self.slots.push(slot);
        let r = (self.slots.len() - 1) as u32;
        self.keys[key_idx].ref_ = r;
        StringRef(r)
    }

    /// Borrow the bytes behind `r`. Refs 0 and 1 both return an empty slice.
    pub fn get(&self, r: StringRef) -> &[u8] {
        match self.slots.get(r.0 as usize) {
            Some(slot) => slot.bytes(),
            None => &[],
        }
    }

    /// Mark `r` reachable for this collection cycle. `r` must already have
    /// been swept at least once since the pool was created (no marking a
    /// dead slot back to life).
    pub fn mark(&mut self, r: StringRef) {
        if r.0 < 2 {
            return;
        }
        if let Some(slot) = self.slots.get_mut(r.0 as usize) {
            debug_assert!(!matches!(slot, Slot::Dead), "marking an already-swept slot");
            slot.set_marked(true);
        }
    }

    /// Sweep up to `step` units of work (one long-string free costs one
    /// unit; clearing a live mark is free). Returns `true` if the full pool
    /// was swept within budget, `false` if work remains for the next call.
    pub fn sweep_step(&mut self, mut step: u32) -> bool {
        let n = self.slots.len();
        let mut i = self.sweep_pos;
        let mut cleared = 0usize;
        while i < n {
            let was_long = matches!(self.slots[i], Slot::Long { .. });
            if self.slots[i].is_marked() {
                self.slots[i].set_marked(false);
                cleared += 1;
            } else if !matches!(self.slots[i], Slot::Dead) {
                self.slots[i] = Slot::Dead;
                if was_long {
                    step = step.saturating_sub(1);
                    if step == 0 {
                        i += 1;
                        break;
                    }
                }
            }
            i += 1;
        }
        self.sweep_pos = i;
        self.in_use += cleared;
        self.sweep_pos >= n
    }

    /// Finalize a sweep cycle. Dead slots are never reclaimed or moved — a
    /// ref stays valid for the lifetime of the pool, so live strings keep
    /// their index and the values array is left with holes. Only the key
    /// table, which holds no refs beyond live entries after a sweep, is
    /// shrunk when it has become sparse (<25% load).
    pub fn sweep_finish(&mut self) {
        let cap = self.mask as usize + 1;
        if self.in_use * 4 < cap {
            let new_len = (cap / 2).max(INITIAL_KEYS);
            self.resize_keys(new_len);
        }
        self.sweep_pos = 2;
        self.in_use = 0;
    }
}

impl Default for StringPool {
    fn default() -> Self {
        StringPool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_identical_bytes() {
        let mut pool = StringPool::new();
        let a = pool.put_copy(b"hello");
        let b = pool.put_copy(b"hello");
        assert_eq!(a, b);
        assert_eq!(pool.get(a), b"hello");
    }

    #[test]
    fn empty_and_null_refs_return_empty_slice() {
        let pool = StringPool::new();
        assert_eq!(pool.get(StringRef(0)), &[] as &[u8]);
        assert_eq!(pool.get(StringRef(1)), &[] as &[u8]);
    }

    #[test]
    fn short_vs_long_boundary() {
        let mut pool = StringPool::new();
        let short = pool.put_copy(&[b'a'; 14]);
        let long = pool.put_copy(&[b'b'; 15]);
        assert_eq!(pool.get(short).len(), 14);
        assert_eq!(pool.get(long).len(), 15);
    }

    #[test]
    fn put_take_ownership_dedups_against_put_copy() {
        let mut pool = StringPool::new();
        let a = pool.put_copy(b"needle in a haystack, long enough");
        let b = pool.put_take_ownership(b"needle in a haystack, long enough".to_vec());
        assert_eq!(a, b);
    }

    #[test]
    fn sweep_drops_unmarked_entries() {
        let mut pool = StringPool::new();
        let keep = pool.put_copy(b"kept");
        let drop_ref = pool.put_copy(b"dropped");
        pool.mark(keep);
        assert!(pool.sweep_step(u32::MAX));
        pool.sweep_finish();
        assert_eq!(pool.get(keep), b"kept");
        // `drop_ref`'s slot was swept away; re-interning the same bytes
        // allocates a fresh ref rather than resurrecting the old one.
        let re_interned = pool.put_copy(b"dropped");
        assert_ne!(re_interned.0, 0);
        let _ = drop_ref;
    }

    #[test]
    fn distinct_short_strings_get_distinct_refs() {
        let mut pool = StringPool::new();
        let a = pool.put_copy(b"foo");
        let b = pool.put_copy(b"bar");
        assert_ne!(a, b);
    }
}
