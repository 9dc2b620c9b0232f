//! IR types and function signatures.

use std::fmt;

use smallvec::SmallVec;

/// Identifier of a named struct type in a [`crate::Module`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructId(u32);

impl StructId {
    pub(crate) fn new(index: usize) -> Self {
        StructId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructId({})", self.0)
    }
}

/// A first-class IR type.
///
/// Pointers are opaque: a `Ptr` does not record its pointee. Code that
/// needs pointee identity tracks it out of band (the generator's logical
/// type descriptor).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Ty {
    /// 1-bit integer (booleans, comparison results).
    I1,
    /// 8-bit integer (string bytes).
    I8,
    /// 32-bit signed integer (the language's `number`).
    I32,
    /// Opaque pointer.
    Ptr,
    /// A named struct type.
    Struct(StructId),
    /// Fixed-length array, used for string constants.
    Array { elem: Box<Ty>, len: u32 },
}

impl Ty {
    pub fn is_ptr(&self) -> bool {
        matches!(self, Ty::Ptr)
    }
}

/// Integer binary operations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
}

impl BinOp {
    /// The LLVM mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
        }
    }
}

/// Signed integer comparison predicates.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Pred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl Pred {
    /// The LLVM `icmp` condition code.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Pred::Eq => "eq",
            Pred::Ne => "ne",
            Pred::Slt => "slt",
            Pred::Sle => "sle",
            Pred::Sgt => "sgt",
            Pred::Sge => "sge",
        }
    }
}

/// A function signature: fixed parameter types, return type, and whether
/// the function accepts further variadic arguments (`printf` does).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FnSig {
    pub params: SmallVec<[Ty; 4]>,
    pub ret: Ty,
    pub variadic: bool,
}

impl FnSig {
    pub fn new(params: Vec<Ty>, ret: Ty) -> Self {
        FnSig {
            params: SmallVec::from_vec(params),
            ret,
            variadic: false,
        }
    }

    pub fn variadic(params: Vec<Ty>, ret: Ty) -> Self {
        FnSig {
            params: SmallVec::from_vec(params),
            ret,
            variadic: true,
        }
    }
}
