use pretty_assertions::assert_eq;

use super::{compile_err, compile_verified};
use crate::CodegenError;

#[test]
fn toplevel_var_with_constant_init_becomes_a_global() {
    let ir = compile_verified(r#"(var x 42) (printf "%d\n" x)"#);
    assert!(ir.contains("@x = global i32 42, align 4"), "{ir}");
    assert!(ir.contains("load i32, ptr @x"), "{ir}");
}

#[test]
fn toplevel_var_with_computed_init_stores_from_main() {
    let ir = compile_verified(r#"(var x (+ 40 2)) (printf "%d\n" x)"#);
    assert!(ir.contains("@x = global i32 0, align 4"), "{ir}");
    assert!(ir.contains("store i32 %t0, ptr @x"), "{ir}");
}

#[test]
fn block_local_var_is_a_stack_slot() {
    let ir = compile_verified(r#"(begin (var x 1) (printf "%d\n" x))"#);
    assert!(ir.contains("%x = alloca i32"), "{ir}");
    assert!(ir.contains("store i32 1, ptr %x"), "{ir}");
    assert!(ir.contains("load i32, ptr %x"), "{ir}");
}

#[test]
fn names_do_not_leak_out_of_a_block() {
    let err = compile_err(
        r#"(begin (var y 1) y)
           (printf "%d" y)"#,
    );
    assert_eq!(err, CodegenError::UndefinedVariable("y".to_owned()));
}

#[test]
fn shadowing_reads_the_inner_binding_and_reverts() {
    let ir = compile_verified(
        r#"(var x 1)
           (begin
             (var x 2)
             (printf "%d\n" x))
           (printf "%d\n" x)"#,
    );
    // Outer x is a global, the shadow is a stack slot; the second
    // printf goes back to the global.
    assert!(ir.contains("@x = global i32 1"), "{ir}");
    assert!(ir.contains("%x = alloca i32"), "{ir}");
    let shadow_load = ir.find("load i32, ptr %x").expect("shadow load missing");
    let outer_load = ir.rfind("load i32, ptr @x").expect("outer load missing");
    assert!(shadow_load < outer_load, "{ir}");
}

#[test]
fn undefined_variable_is_fatal() {
    assert_eq!(
        compile_err(r#"(printf "%d" nope)"#),
        CodegenError::UndefinedVariable("nope".to_owned())
    );
}

#[test]
fn assignment_never_creates_a_binding() {
    assert_eq!(
        compile_err("(set ghost 1)"),
        CodegenError::UndefinedVariable("ghost".to_owned())
    );
}

#[test]
fn set_stores_into_the_existing_slot() {
    let ir = compile_verified(r#"(begin (var x 1) (set x 9) (printf "%d\n" x))"#);
    assert!(ir.contains("store i32 9, ptr %x"), "{ir}");
}

#[test]
fn typed_var_annotation_must_match_the_initializer() {
    let err = compile_err(r#"(var (x string) 5)"#);
    assert_eq!(
        err,
        CodegenError::MalformedForm {
            form: "var",
            reason: "initializer type does not match annotation for `x`".to_owned(),
        }
    );
}

#[test]
fn unknown_type_annotation_is_fatal() {
    assert_eq!(
        compile_err("(var (x widget) 5)"),
        CodegenError::UnknownTypeAnnotation("widget".to_owned())
    );
}

#[test]
fn version_global_is_seeded() {
    let ir = compile_verified(r#"(printf "%d\n" VERSION)"#);
    assert!(ir.contains("@VERSION = global i32 10, align 4"), "{ir}");
    assert!(ir.contains("load i32, ptr @VERSION"), "{ir}");
}

#[test]
fn string_vars_hold_pointers() {
    let ir = compile_verified(r#"(begin (var s "hi") (printf "%s\n" s))"#);
    assert!(ir.contains("%s = alloca ptr"), "{ir}");
    assert!(ir.contains("c\"hi\\00\""), "{ir}");
}
