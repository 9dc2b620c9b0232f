//! IR code generation for Vesper.
//!
//! Walks the expression tree produced by `vesper_reader` and lowers it to
//! a `vesper_ir` module: a `main` function for the top-level program,
//! one function per `def`/method, a struct type and a constant vtable
//! global per class, and declarations for the runtime externs
//! (`printf`, `GC_malloc`).
//!
//! The generator threads an explicit context everywhere instead of
//! ambient globals: the insertion cursor (current function + block) and
//! the [`CallContext`] (top level vs. inside a class body, which decides
//! static vs. virtual method dispatch). Scopes live in an arena indexed
//! by [`env::ScopeId`]; every generated value carries a
//! [`ty::TyDesc`] pairing its representation type with the logical
//! (nominal) type that opaque pointers would otherwise lose.
//!
//! All errors are fatal: generation stops at the first problem and the
//! error unwinds the whole compilation.
//!
//! Set `RUST_LOG=vesper_codegen=trace` to log every generation step.

mod classes;
mod control_flow;
mod env;
mod error;
mod functions;
mod generate;
mod objects;
mod ty;

#[cfg(test)]
mod tests;

pub use classes::{ClassBuilder, ClassInfo, ClassRegistry};
pub use env::{Binding, ScopeArena, ScopeId};
pub use error::CodegenError;
pub use generate::{compile_program, CallContext, Generator};
pub use ty::{Logical, TyDesc, TypedValue};
