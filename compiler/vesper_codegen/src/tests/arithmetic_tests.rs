use pretty_assertions::assert_eq;

use super::{compile, compile_err, compile_verified};
use crate::CodegenError;

#[test]
fn add_emits_signed_integer_add() {
    let ir = compile_verified(r#"(printf "%d\n" (+ 2 3))"#);
    assert!(ir.contains("add i32 2, 3"), "{ir}");
}

#[test]
fn all_arithmetic_ops_map_to_mnemonics() {
    let ir = compile(r#"(printf "%d" (+ 1 2) (- 3 4) (* 5 6) (/ 8 2))"#);
    assert!(ir.contains("add i32 1, 2"), "{ir}");
    assert!(ir.contains("sub i32 3, 4"), "{ir}");
    assert!(ir.contains("mul i32 5, 6"), "{ir}");
    assert!(ir.contains("sdiv i32 8, 2"), "{ir}");
}

#[test]
fn negative_operands_survive() {
    let ir = compile(r#"(printf "%d" (+ -7 0))"#);
    assert!(ir.contains("add i32 -7, 0"), "{ir}");
}

#[test]
fn comparisons_are_signed_and_produce_i1() {
    let ir = compile(
        r#"(var a 1)
           (var r (if (< a 2) 1 0))
           (printf "%d" r)"#,
    );
    assert!(ir.contains("icmp slt i32"), "{ir}");
    assert!(ir.contains("br i1"), "{ir}");
}

#[test]
fn every_comparison_op_has_a_predicate() {
    for (op, pred) in [
        ("==", "eq"),
        ("!=", "ne"),
        ("<", "slt"),
        ("<=", "sle"),
        (">", "sgt"),
        (">=", "sge"),
    ] {
        let ir = compile(&format!(r#"(var r (if ({op} 1 2) 1 0)) (printf "%d" r)"#));
        assert!(
            ir.contains(&format!("icmp {pred} i32 1, 2")),
            "`{op}` should lower to `icmp {pred}`:\n{ir}"
        );
    }
}

#[test]
fn arguments_generate_left_to_right() {
    // String constants intern in generation order, so the argument
    // order is visible in the constant pool.
    let ir = compile(r#"(printf "%s%s\n" "left" "right")"#);
    let left_at = ir.find("c\"left\\00\"").expect("left constant missing");
    let right_at = ir.find("c\"right\\00\"").expect("right constant missing");
    assert!(left_at < right_at, "{ir}");
}

#[test]
fn nested_arithmetic_threads_results() {
    let ir = compile_verified(r#"(printf "%d\n" (* (+ 1 2) (- 10 4)))"#);
    let add_at = ir.find("add i32 1, 2").expect("add missing");
    let sub_at = ir.find("sub i32 10, 4").expect("sub missing");
    let mul_at = ir.find("mul i32").expect("mul missing");
    assert!(add_at < mul_at && sub_at < mul_at, "{ir}");
}

#[test]
fn binary_operator_arity_is_checked() {
    assert_eq!(
        compile_err("(+ 1)"),
        CodegenError::MalformedForm {
            form: "binary operator",
            reason: "`+` expects two operands, got 1".to_owned(),
        }
    );
}

#[test]
fn booleans_are_i1_constants() {
    let ir = compile(r#"(var r (if true 1 0)) (printf "%d" r)"#);
    assert!(ir.contains("br i1 true"), "{ir}");
}
