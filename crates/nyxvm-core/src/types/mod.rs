//! Runtime type identifiers and the compound-type registry.

mod registry;
mod tdesc;

pub use registry::{TypeRegistry, FIRST_COMPOUND_ID};
pub use tdesc::{Member, TDesc};

const ID_MASK: u32 = 0x3fff_ffff;
const OPTION_BIT: u32 = 1 << 31;
const VEC_BIT: u32 = 1 << 30;

/// A 32-bit type identifier: a 30-bit base id plus `OPTION`/`VEC` modifier
/// bits. Ids `0..16` name the primitive tags one-to-one (see [`crate::value::Tag`]);
/// ids `>= `[`FIRST_COMPOUND_ID`] name interned struct/function descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    #[inline(always)]
    pub fn new(base_id: u32) -> Self {
        debug_assert!(base_id <= ID_MASK, "type id {base_id} overflows 30 bits");
        TypeId(base_id)
    }

    #[inline(always)]
    pub fn raw(&self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub fn from_raw(bits: u32) -> Self {
        TypeId(bits)
    }

    #[inline(always)]
    pub fn base_id(&self) -> u32 {
        self.0 & ID_MASK
    }

    #[inline(always)]
    pub fn has_option(&self) -> bool {
        self.0 & OPTION_BIT != 0
    }

    #[inline(always)]
    pub fn has_vec(&self) -> bool {
        self.0 & VEC_BIT != 0
    }

    #[inline(always)]
    pub fn with_option(self, on: bool) -> Self {
        TypeId(if on { self.0 | OPTION_BIT } else { self.0 & !OPTION_BIT })
    }

    #[inline(always)]
    pub fn with_vec(self, on: bool) -> Self {
        TypeId(if on { self.0 | VEC_BIT } else { self.0 & !VEC_BIT })
    }

    #[inline(always)]
    pub fn is_primitive(&self) -> bool {
        self.base_id() < FIRST_COMPOUND_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_bits_independent_of_base_id() {
        let t = TypeId::new(6).with_option(true).with_vec(true);
        assert_eq!(t.base_id(), 6);
        assert!(t.has_option());
        assert!(t.has_vec());
    }

    #[test]
    fn raw_roundtrips_through_value_payload() {
        let t = TypeId::new(100).with_vec(true);
        let back = TypeId::from_raw(t.raw());
        assert_eq!(t, back);
    }
}
