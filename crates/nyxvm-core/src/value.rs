//! 16-byte tagged [`Value`] — the universal runtime representation.
//!
//! A tag word plus a 64-bit payload, rather than a C-style union, since
//! heap references are pool indices (`GcId`) and not raw pointers.

use crate::gc::GcId;
use crate::strings::StringRef;
use crate::types::TypeId;

/// Closed set of primitive type tags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Poison = 0,
    Unk = 1,
    Type = 2,
    Any = 3,
    Nil = 4,
    Bool = 5,
    Sint = 6,
    Uint = 7,
    Float = 8,
    String = 9,
    Error = 10,
    Table = 11,
    Array = 12,
    Object = 13,
    Func = 14,
    Opaque = 15,
}

impl Tag {
    /// `Table`, `Array`, `Object`, `Func` denote heap objects reached via the
    /// payload's `GcId`. `Opaque` carries a raw host value, not a GC
    /// reference, despite sorting after them in the tag list.
    #[inline(always)]
    pub fn is_heap(self) -> bool {
        matches!(self, Tag::Table | Tag::Array | Tag::Object | Tag::Func)
    }

    #[inline(always)]
    pub fn from_u8(x: u8) -> Tag {
        debug_assert!(x <= Tag::Opaque as u8, "invalid primitive tag byte {x}");
        // SAFETY: caller-checked range above; repr(u8) enum with 0..=15 covered.
        unsafe { std::mem::transmute(x) }
    }
}

const OPTION_BIT: u32 = 1 << 8;
const VEC_BIT: u32 = 1 << 9;
const TAG_MASK: u32 = 0xff;

/// A runtime value: 16 bytes total (4-byte tag word padded to 8 by the
/// 8-byte-aligned `payload`).
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Value {
    tag: u32,
    payload: u64,
}

impl Value {
    #[inline(always)]
    fn new(tag: Tag, payload: u64) -> Self {
        Value {
            tag: tag as u32,
            payload,
        }
    }

    #[inline(always)]
    pub const fn nil() -> Self {
        Value {
            tag: Tag::Nil as u32,
            payload: 0,
        }
    }

    /// The tombstone marker distinct from real nil ("xnil").
    #[inline(always)]
    pub const fn xnil() -> Self {
        Value {
            tag: Tag::Nil as u32,
            payload: 1,
        }
    }

    #[inline(always)]
    pub fn is_xnil(&self) -> bool {
        self.tag() == Tag::Nil && self.payload == 1
    }

    #[inline(always)]
    pub const fn poison() -> Self {
        Value {
            tag: Tag::Poison as u32,
            payload: 0,
        }
    }

    #[inline(always)]
    pub fn bool_(b: bool) -> Self {
        Value::new(Tag::Bool, b as u64)
    }

    #[inline(always)]
    pub fn sint(v: i64) -> Self {
        Value::new(Tag::Sint, v as u64)
    }

    #[inline(always)]
    pub fn uint(v: u64) -> Self {
        Value::new(Tag::Uint, v)
    }

    #[inline(always)]
    pub fn float(v: f64) -> Self {
        Value::new(Tag::Float, v.to_bits())
    }

    #[inline(always)]
    pub fn string(r: StringRef) -> Self {
        Value::new(Tag::String, r.0 as u64)
    }

    /// An error value whose message is interned into the string pool.
    #[inline(always)]
    pub fn error(r: StringRef) -> Self {
        Value::new(Tag::Error, r.0 as u64)
    }

    #[inline(always)]
    pub fn type_(id: TypeId) -> Self {
        Value::new(Tag::Type, id.raw() as u64)
    }

    #[inline(always)]
    pub fn table(id: GcId) -> Self {
        Value::new(Tag::Table, id.to_u64())
    }

    #[inline(always)]
    pub fn array(id: GcId) -> Self {
        Value::new(Tag::Array, id.to_u64())
    }

    #[inline(always)]
    pub fn object(id: GcId) -> Self {
        Value::new(Tag::Object, id.to_u64())
    }

    #[inline(always)]
    pub fn func(id: GcId) -> Self {
        Value::new(Tag::Func, id.to_u64())
    }

    #[inline(always)]
    pub fn opaque(bits: u64) -> Self {
        Value::new(Tag::Opaque, bits)
    }

    #[inline(always)]
    pub fn tag(&self) -> Tag {
        Tag::from_u8((self.tag & TAG_MASK) as u8)
    }

    #[inline(always)]
    pub fn has_option(&self) -> bool {
        self.tag & OPTION_BIT != 0
    }

    #[inline(always)]
    pub fn has_vec(&self) -> bool {
        self.tag & VEC_BIT != 0
    }

    #[inline(always)]
    pub fn with_option(mut self, on: bool) -> Self {
        if on {
            self.tag |= OPTION_BIT;
        } else {
            self.tag &= !OPTION_BIT;
        }
        self
    }

    #[inline(always)]
    pub fn with_vec(mut self, on: bool) -> Self {
        if on {
            self.tag |= VEC_BIT;
        } else {
            self.tag &= !VEC_BIT;
        }
        self
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        self.tag() == Tag::Nil && self.payload == 0
    }

    /// No Lua-style truthiness coercion here: nyxvm only distinguishes nil from non-nil.
    #[inline(always)]
    pub fn is_heap(&self) -> bool {
        self.tag().is_heap()
    }

    #[inline(always)]
    pub fn as_bool(&self) -> Option<bool> {
        (self.tag() == Tag::Bool).then_some(self.payload != 0)
    }

    #[inline(always)]
    pub fn as_sint(&self) -> Option<i64> {
        (self.tag() == Tag::Sint).then_some(self.payload as i64)
    }

    #[inline(always)]
    pub fn as_uint(&self) -> Option<u64> {
        (self.tag() == Tag::Uint).then_some(self.payload)
    }

    #[inline(always)]
    pub fn as_float(&self) -> Option<f64> {
        (self.tag() == Tag::Float).then_some(f64::from_bits(self.payload))
    }

    #[inline(always)]
    pub fn as_string_ref(&self) -> Option<StringRef> {
        (self.tag() == Tag::String).then_some(StringRef(self.payload as u32))
    }

    #[inline(always)]
    pub fn as_error_ref(&self) -> Option<StringRef> {
        (self.tag() == Tag::Error).then_some(StringRef(self.payload as u32))
    }

    #[inline(always)]
    pub fn as_type_id(&self) -> Option<TypeId> {
        (self.tag() == Tag::Type).then_some(TypeId::from_raw(self.payload as u32))
    }

    #[inline(always)]
    pub fn as_gc_id(&self) -> Option<GcId> {
        self.is_heap().then_some(GcId::from_u64(self.payload))
    }

    #[inline(always)]
    pub fn raw_payload(&self) -> u64 {
        self.payload
    }

    /// Raw equality: same tag, same payload bits (NaN-sensitive for floats).
    #[inline(always)]
    pub fn raw_equal(&self, other: &Value) -> bool {
        if self.tag() == Tag::Float && other.tag() == Tag::Float {
            f64::from_bits(self.payload) == f64::from_bits(other.payload)
        } else {
            self.tag == other.tag && self.payload == other.payload
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::nil()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equal(other)
    }
}

// `raw_equal` compares bit patterns directly (even for floats), so it is
// reflexive and transitive over those bits — a sound basis for `Eq`/`Hash`
// even though float equality in general is not.
impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.tag.hash(state);
        self.payload.hash(state);
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tag() {
            Tag::Poison => write!(f, "<poison>"),
            Tag::Unk => write!(f, "<unk>"),
            Tag::Any => write!(f, "<any>"),
            Tag::Nil if self.payload == 1 => write!(f, "<xnil>"),
            Tag::Nil => write!(f, "nil"),
            Tag::Bool => write!(f, "{}", self.payload != 0),
            Tag::Sint => write!(f, "{}", itoa::Buffer::new().format(self.payload as i64)),
            Tag::Uint => write!(f, "{}", itoa::Buffer::new().format(self.payload)),
            Tag::Float => write!(f, "{}", f64::from_bits(self.payload)),
            Tag::String => write!(f, "string(#{})", self.payload),
            Tag::Error => write!(f, "error(#{})", self.payload),
            Tag::Type => write!(f, "type(#{})", self.payload),
            Tag::Table => write!(f, "table(#{})", self.payload),
            Tag::Array => write!(f, "array(#{})", self.payload),
            Tag::Object => write!(f, "object(#{})", self.payload),
            Tag::Func => write!(f, "func(#{})", self.payload),
            Tag::Opaque => write!(f, "opaque(0x{:x})", self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_16_bytes() {
        assert_eq!(std::mem::size_of::<Value>(), 16);
    }

    #[test]
    fn nil_payload_is_zero_xnil_is_one() {
        assert_eq!(Value::nil().payload, 0);
        assert!(!Value::nil().is_xnil());
        assert!(Value::xnil().is_xnil());
        assert_ne!(Value::nil(), Value::xnil());
    }

    #[test]
    fn sint_roundtrip() {
        let v = Value::sint(-42);
        assert_eq!(v.as_sint(), Some(-42));
        assert_eq!(v.as_uint(), None);
    }

    #[test]
    fn float_nan_raw_equal() {
        let a = Value::float(f64::NAN);
        let b = Value::float(f64::NAN);
        assert!(a.raw_equal(&b), "NaN bit patterns from to_bits() match");
    }

    #[test]
    fn option_vec_flags_independent_of_tag() {
        let v = Value::sint(7).with_option(true);
        assert!(v.has_option());
        assert!(!v.has_vec());
        assert_eq!(v.as_sint(), Some(7));
    }

    #[test]
    fn heap_tags_are_table_array_object_func() {
        assert!(Tag::Array.is_heap());
        assert!(Tag::Table.is_heap());
        assert!(Tag::Object.is_heap());
        assert!(Tag::Func.is_heap());
        assert!(!Tag::Opaque.is_heap());
        assert!(!Tag::String.is_heap());
    }
}
