//! Codegen tests, grouped by concern.
//!
//! The produced module is textual, so most tests compile a program and
//! assert on the printed IR; `compile_verified` additionally requires a
//! clean verifier run.

mod arithmetic_tests;
mod class_tests;
mod dispatch_tests;
mod scoping_tests;

use vesper_reader::parse_program;

use crate::{compile_program, CodegenError};

pub(crate) fn compile(source: &str) -> String {
    let program = parse_program(source).expect("parse failure");
    let module = compile_program(&program).expect("codegen failure");
    module.to_string()
}

pub(crate) fn compile_verified(source: &str) -> String {
    let program = parse_program(source).expect("parse failure");
    let module = compile_program(&program).expect("codegen failure");
    let issues = vesper_ir::verify(&module);
    assert!(issues.is_empty(), "verifier issues: {issues:#?}");
    module.to_string()
}

pub(crate) fn compile_err(source: &str) -> CodegenError {
    let program = parse_program(source).expect("parse failure");
    match compile_program(&program) {
        Ok(module) => panic!("expected a codegen error, got:\n{module}"),
        Err(err) => err,
    }
}
