use pretty_assertions::assert_eq;

use super::{compile_err, compile_verified};
use crate::CodegenError;

const POINT: &str = r#"
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
"#;

#[test]
fn class_struct_reserves_slot_zero_for_the_vtable() {
    let ir = compile_verified(&format!("{POINT} (var p (new Point 10 20))"));
    assert_eq!(
        ir.lines()
            .find(|line| line.starts_with("%Point = type")),
        Some("%Point = type { ptr, i32, i32 }"),
    );
}

#[test]
fn vtable_global_lists_methods_in_declaration_order() {
    let ir = compile_verified(&format!("{POINT} (var p (new Point 10 20))"));
    assert!(ir.contains("%Point_vtable_type = type { ptr, ptr }"), "{ir}");
    assert!(
        ir.contains(
            "@Point_vtable = constant %Point_vtable_type { ptr @Point_constructor, ptr @Point_calc }, align 8"
        ),
        "{ir}"
    );
}

#[test]
fn methods_are_emitted_with_mangled_names() {
    let ir = compile_verified(&format!("{POINT} (var p (new Point 10 20))"));
    assert!(ir.contains("define i32 @Point_constructor(ptr %self, i32 %x, i32 %y)"), "{ir}");
    assert!(ir.contains("define i32 @Point_calc(ptr %self)"), "{ir}");
}

#[test]
fn construction_mallocs_installs_vtable_then_calls_the_constructor() {
    let ir = compile_verified(&format!("{POINT} (var p (new Point 10 20))"));
    // { ptr, i32, i32 } is 16 bytes under the C layout.
    let malloc_at = ir.find("call ptr @GC_malloc(i32 16)").expect("malloc missing");
    let vtable_store_at = ir
        .find("store ptr @Point_vtable, ptr %vtable")
        .expect("vtable store missing");
    let ctor_at = ir
        .find("call i32 @Point_constructor(ptr %inst, i32 10, i32 20)")
        .expect("constructor call missing");
    assert!(malloc_at < vtable_store_at && vtable_store_at < ctor_at, "{ir}");
}

#[test]
fn property_access_loads_through_field_indices() {
    let ir = compile_verified(&format!(
        r#"{POINT}
           (var p (new Point 10 20))
           (printf "%d %d\n" (prop p x) (prop p y))"#
    ));
    // x is field 1, y is field 2 (slot 0 is the vtable pointer).
    assert!(ir.contains("getelementptr inbounds %Point, ptr %inst, i32 0, i32 1"), "{ir}");
    assert!(ir.contains("getelementptr inbounds %Point, ptr %inst, i32 0, i32 2"), "{ir}");
}

#[test]
fn property_setter_stores_and_yields_zero() {
    let ir = compile_verified(&format!(
        r#"{POINT}
           (var p (new Point 10 20))
           (set (prop p x) 99)"#
    ));
    assert!(ir.contains("store i32 99, ptr %propPtr"), "{ir}");
}

#[test]
fn inherited_fields_keep_their_indices() {
    let ir = compile_verified(&format!(
        r#"{POINT}
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

        (var p (new Point3D 10 20 30))
        (printf "%d\n" (prop p z))"#
    ));
    assert!(
        ir.contains("%Point3D = type { ptr, i32, i32, i32 }"),
        "{ir}"
    );
    // z sits after the inherited x and y.
    assert!(
        ir.contains("getelementptr inbounds %Point3D, ptr %inst, i32 0, i32 3"),
        "{ir}"
    );
    // { ptr, i32, i32, i32 } is 20 bytes, padded to 24 for pointer alignment.
    assert!(ir.contains("call ptr @GC_malloc(i32 24)"), "{ir}");
}

#[test]
fn duplicate_field_is_fatal() {
    let err = compile_err(
        r"(class Broken null
            (begin
              (var x 0)
              (var x 1)))",
    );
    assert_eq!(
        err,
        CodegenError::DuplicateField {
            class: "Broken".to_owned(),
            field: "x".to_owned(),
        }
    );
}

#[test]
fn duplicate_inherited_field_is_fatal() {
    let err = compile_err(&format!(
        r"{POINT}
          (class Bad Point
            (begin
              (var x 0)))"
    ));
    assert_eq!(
        err,
        CodegenError::DuplicateField {
            class: "Bad".to_owned(),
            field: "x".to_owned(),
        }
    );
}

#[test]
fn method_first_parameter_must_be_self() {
    let err = compile_err(
        r"(class Bad null
            (begin
              (def go (x) (* x x))))",
    );
    assert!(
        matches!(err, CodegenError::MalformedForm { form: "def", .. }),
        "{err:?}"
    );
}

#[test]
fn unknown_parent_class_is_fatal() {
    let err = compile_err("(class Orphan Ghost (begin (var x 0)))");
    assert_eq!(err, CodegenError::ClassNotFound("Ghost".to_owned()));
}

#[test]
fn missing_constructor_is_fatal() {
    let err = compile_err(
        r"(class Bare null
            (begin
              (var x 0)))
          (var b (new Bare))",
    );
    assert_eq!(err, CodegenError::ConstructorNotFound("Bare".to_owned()));
}

#[test]
fn unknown_field_is_fatal() {
    let err = compile_err(&format!(
        r"{POINT}
          (var p (new Point 1 2))
          (prop p w)"
    ));
    assert_eq!(
        err,
        CodegenError::FieldNotFound {
            class: "Point".to_owned(),
            field: "w".to_owned(),
        }
    );
}

#[test]
fn class_valued_fields_keep_their_logical_type() {
    let ir = compile_verified(&format!(
        r#"{POINT}
        (class Holder null
          (begin
            (var (inner Point) 0)

            (def constructor (self (inner Point))
              (set (prop self inner) inner))

            (def total (self)
              (method (prop self inner) calc))))

        (var p (new Point 1 2))
        (var h (new Holder p))
        (printf "%d\n" (method h total))"#
    ));
    // The Point handle is stored into Holder's pointer field.
    assert!(ir.contains("%Holder = type { ptr, ptr }"), "{ir}");
    // Inside Holder, the loaded field dispatches statically to Point_calc.
    assert!(ir.contains("call i32 @Point_calc(ptr %inner"), "{ir}");
}
