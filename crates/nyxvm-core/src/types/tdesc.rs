//! Compound type descriptors: structs and function signatures.

use crate::strings::StringRef;
use crate::types::TypeId;
use crate::value::Value;

/// One named field of a struct-like compound type: a name, a type, and an
/// optional default value used when a struct literal omits the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: StringRef,
    pub ty: TypeId,
    pub default: Option<Value>,
}

impl Member {
    pub fn new(name: StringRef, ty: TypeId) -> Self {
        Member { name, ty, default: None }
    }

    pub fn with_default(name: StringRef, ty: TypeId, default: Value) -> Self {
        Member { name, ty, default: Some(default) }
    }
}

/// A compound type: either an ordered set of named members (a struct-like
/// record) or a function signature (a parameter-list type paired with a
/// return-list type). Structs have no defined field order at the source
/// level; members are stored sorted by type id so that two structurally
/// identical declarations intern to the same `TypeId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TDesc {
    Struct { members: Vec<Member> },
    Function { params: TypeId, ret: TypeId },
}

impl TDesc {
    pub fn as_struct(&self) -> Option<&[Member]> {
        match self {
            TDesc::Struct { members } => Some(members),
            TDesc::Function { .. } => None,
        }
    }

    pub fn as_function(&self) -> Option<(TypeId, TypeId)> {
        match self {
            TDesc::Function { params, ret } => Some((*params, *ret)),
            TDesc::Struct { .. } => None,
        }
    }
}
