//! IR for the Vesper compiler.
//!
//! A small LLVM-flavoured intermediate representation: a [`Module`] holds
//! named struct types, globals, and functions; functions hold basic blocks
//! of instructions ending in a terminator. The [`Builder`] mirrors the
//! `IRBuilder` discipline — it is positioned at the end of one block and
//! appends instructions there — so the code generator can build control
//! flow (branches, phi merges) by hand.
//!
//! The module prints as textual LLVM assembly via `Display`, and
//! [`verify`] performs structural checks (terminated blocks, call arity,
//! operand typing) whose findings are reported as warnings, never as
//! fatal errors.
//!
//! Values are lightweight copyable handles ([`Value`]); instruction
//! results refer into a per-function instruction arena, so a `Value` is
//! only meaningful inside the function that produced it.

mod builder;
mod module;
mod print;
mod types;
mod verify;

pub use builder::Builder;
pub use module::{
    Block, BlockId, Const, FuncId, Function, Global, GlobalId, Inst, InstData, InstId, Module,
    StructDef, Terminator, Value,
};
pub use types::{BinOp, FnSig, Pred, StructId, Ty};
pub use verify::{verify, VerifyIssue};
