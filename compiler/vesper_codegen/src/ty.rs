//! Type descriptors: representation type plus logical (nominal) type.
//!
//! The IR's pointers are opaque, so once a value is materialized as
//! `ptr` the identity of the pointee is gone. The generator therefore
//! pairs every value with a [`TyDesc`]: the representation type the IR
//! actually uses, and — for pointers — the logical type of the pointee.
//! Propagating the logical half correctly is what makes property access,
//! method dispatch, and functor calls on plain-looking pointers work.

use vesper_ir::{Ty, Value};

/// The nominal type behind a pointer representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Logical {
    /// A string: pointer to bytes.
    Byte,
    /// An instance of the named class.
    Class(String),
}

/// Representation type plus optional logical type.
///
/// `logical` is only populated when `repr` is a pointer; scalar values
/// carry `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct TyDesc {
    pub repr: Ty,
    pub logical: Option<Logical>,
}

impl TyDesc {
    /// A scalar descriptor with no logical half.
    pub fn plain(repr: Ty) -> Self {
        TyDesc {
            repr,
            logical: None,
        }
    }

    /// A string value: opaque pointer whose pointee is bytes.
    pub fn string() -> Self {
        TyDesc {
            repr: Ty::Ptr,
            logical: Some(Logical::Byte),
        }
    }

    /// An instance of `class`: opaque pointer to the class struct.
    pub fn instance(class: &str) -> Self {
        TyDesc {
            repr: Ty::Ptr,
            logical: Some(Logical::Class(class.to_owned())),
        }
    }

    /// The class name, if the logical type is a class.
    pub fn class(&self) -> Option<&str> {
        match &self.logical {
            Some(Logical::Class(name)) => Some(name),
            _ => None,
        }
    }
}

/// A generated value paired with its descriptor — the unit every
/// generation step produces and consumes.
#[derive(Clone, Debug)]
pub struct TypedValue {
    pub value: Value,
    pub desc: TyDesc,
}

impl TypedValue {
    pub fn new(value: Value, desc: TyDesc) -> Self {
        TypedValue { value, desc }
    }

    /// The i32 zero sentinel for forms with no meaningful result
    /// (`while`, `class`, property setters).
    pub fn zero() -> Self {
        TypedValue {
            value: Value::ConstI32(0),
            desc: TyDesc::plain(Ty::I32),
        }
    }
}
