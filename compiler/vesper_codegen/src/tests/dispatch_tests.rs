use pretty_assertions::assert_eq;

use super::{compile_err, compile_verified};
use crate::CodegenError;

const POINTS: &str = r#"
(class Point null
  (begin
    (var x 0)
    (var y 0)

    (def constructor (self x y)
      (begin
        (set (prop self x) x)
        (set (prop self y) y)))

    (def calc (self)
      (begin
        (+ (prop self x) (prop self y))))))

(class Point3D Point
  (begin
    (var z 0)

    (def constructor (self x y z)
      (begin
        (method (self Point) constructor x y)
        (set (prop self z) z)))

    (def calc (self)
      (begin
        (+ (method (self Point) calc) (prop self z))))))
"#;

#[test]
fn toplevel_method_calls_dispatch_through_the_vtable() {
    let ir = compile_verified(&format!(
        r#"{POINTS}
           (var p (new Point 10 20))
           (printf "%d\n" (method p calc))"#
    ));
    // Load the vtable pointer from slot 0, index the calc slot, load the
    // function pointer, call through it.
    assert!(
        ir.contains("%vtable_gep = getelementptr inbounds %Point, ptr %inst, i32 0, i32 0"),
        "{ir}"
    );
    assert!(ir.contains("%vtable1 = load ptr, ptr %vtable_gep"), "{ir}");
    assert!(
        ir.contains("%method = getelementptr inbounds %Point_vtable_type, ptr %vtable1, i32 0, i32 1"),
        "{ir}"
    );
    assert!(ir.contains("%method1 = load ptr, ptr %method"), "{ir}");
    assert!(ir.contains("call i32 %method1(ptr %inst)"), "{ir}");
}

#[test]
fn calls_inside_a_class_body_resolve_statically() {
    let ir = compile_verified(&format!(
        r#"{POINTS}
           (var p (new Point3D 10 20 30))"#
    ));
    // Point3D's constructor chains to the ancestor by name, no vtable.
    let ctor = ir
        .split("define i32 @Point3D_constructor")
        .nth(1)
        .expect("Point3D constructor missing");
    let ctor = ctor.split("\n}").next().expect("function body");
    assert!(ctor.contains("call i32 @Point_constructor(ptr"), "{ctor}");
    assert!(!ctor.contains("vtable_gep"), "{ctor}");
}

#[test]
fn ancestor_override_form_uses_the_ancestor_slot_layout() {
    let ir = compile_verified(&format!(
        r#"{POINTS}
           (var p (new Point3D 10 20 30))
           (printf "%d\n" (method (p Point) calc))"#
    ));
    // The lookup class is Point (slot layout), but the vtable loaded at
    // run time is whatever the instance carries — Point3D's.
    assert!(
        ir.contains("%vtable_gep = getelementptr inbounds %Point, ptr %inst, i32 0, i32 0"),
        "{ir}"
    );
    assert!(ir.contains("@Point3D_vtable = constant"), "{ir}");
}

#[test]
fn override_replaces_the_handle_but_not_the_slot() {
    let ir = compile_verified(&format!(
        r#"{POINTS}
           (var p (new Point3D 10 20 30))"#
    ));
    // Both vtables list [constructor, calc] in the same order; the
    // derived one points at the overriding implementations.
    assert!(
        ir.contains(
            "@Point_vtable = constant %Point_vtable_type { ptr @Point_constructor, ptr @Point_calc }"
        ),
        "{ir}"
    );
    assert!(
        ir.contains(
            "@Point3D_vtable = constant %Point3D_vtable_type { ptr @Point3D_constructor, ptr @Point3D_calc }"
        ),
        "{ir}"
    );
}

#[test]
fn inherited_methods_stay_callable_on_the_derived_class() {
    let ir = compile_verified(&format!(
        r#"{POINTS}
        (class Point4D Point3D
          (begin
            (var w 0)

            (def constructor (self x y z w)
              (begin
                (method (self Point3D) constructor x y z)
                (set (prop self w) w)))))

        (var p (new Point4D 1 2 3 4))
        (printf "%d\n" (method p calc))"#
    ));
    // Point4D inherits calc's slot and Point3D's implementation.
    assert!(
        ir.contains(
            "@Point4D_vtable = constant %Point4D_vtable_type { ptr @Point4D_constructor, ptr @Point3D_calc }"
        ),
        "{ir}"
    );
}

#[test]
fn unknown_method_is_fatal() {
    let err = compile_err(&format!(
        r"{POINTS}
          (var p (new Point 1 2))
          (method p teleport)"
    ));
    assert_eq!(
        err,
        CodegenError::MethodNotFound {
            class: "Point".to_owned(),
            method: "teleport".to_owned(),
        }
    );
}

#[test]
fn method_call_on_a_non_instance_is_fatal() {
    let err = compile_err(
        r"(var n 5)
          (method n calc)",
    );
    assert_eq!(err, CodegenError::NotAnInstance("n".to_owned()));
}

#[test]
fn declared_function_calls_are_direct() {
    let ir = compile_verified(
        r#"(def square (x) (* x x))
           (printf "%d\n" (square 6))"#,
    );
    assert!(ir.contains("define i32 @square(i32 %x)"), "{ir}");
    assert!(ir.contains("call i32 @square(i32 6)"), "{ir}");
}

#[test]
fn zero_arg_function_symbols_are_called() {
    let ir = compile_verified(
        r#"(def five () 5)
           (printf "%d\n" five)"#,
    );
    assert!(ir.contains("%five = call i32 @five()"), "{ir}");
}
