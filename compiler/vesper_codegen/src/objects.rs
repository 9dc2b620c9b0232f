//! Classes, instances, properties, and method dispatch.

use tracing::trace;

use vesper_ir::{Builder, Const, FnSig, Ty, Value};
use vesper_reader::Expression;

use crate::classes::ClassBuilder;
use crate::env::{Binding, ScopeId};
use crate::error::CodegenError;
use crate::generate::{CallContext, Generator};
use crate::ty::{TyDesc, TypedValue};

impl Generator {
    /// `(class Name parent (begin body...))`.
    ///
    /// Two passes: a shallow scan registers every field and method
    /// prototype and materializes the vtable, then the body is walked
    /// again to generate the method bodies — constructors and methods
    /// may reference any field or sibling method, so the metadata must
    /// be complete before the first instruction of any body is emitted.
    pub(crate) fn gen_class(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() != 4 {
            return Err(CodegenError::malformed(
                "class",
                format!(
                    "expected `(class name parent body)`, got {} elements",
                    items.len()
                ),
            ));
        }
        let name = items[1]
            .as_symbol()
            .ok_or_else(|| CodegenError::malformed("class", "expected a class name"))?
            .to_owned();
        let parent_name = items[2]
            .as_symbol()
            .ok_or_else(|| CodegenError::malformed("class", "expected a parent class or `null`"))?
            .to_owned();
        let Expression::List(body_items) = &items[3] else {
            return Err(CodegenError::malformed("class", "class body must be a `begin` form"));
        };
        if !items[3].is_form("begin") {
            return Err(CodegenError::malformed("class", "class body must be a `begin` form"));
        }
        trace!("declaring class {} (parent {})", name, parent_name);

        let struct_id = self.module.opaque_struct(&name);
        let parent = if parent_name == "null" {
            None
        } else {
            Some(
                self.classes
                    .get(&parent_name)
                    .ok_or_else(|| CodegenError::ClassNotFound(parent_name.clone()))?,
            )
        };
        let mut builder = ClassBuilder::new(&name, struct_id, parent);

        // Pass 1: shallow scan. Fields extend the layout, defs register
        // prototypes (an override replaces the handle, never the slot).
        for form in &body_items[1..] {
            let Expression::List(parts) = form else {
                return Err(CodegenError::malformed(
                    "class",
                    format!("invalid class body element `{form}`"),
                ));
            };
            let head = parts.first().and_then(Expression::as_symbol).ok_or_else(|| {
                CodegenError::malformed("class", format!("invalid class body element `{form}`"))
            })?;
            match head {
                "var" => {
                    if parts.len() != 3 {
                        return Err(CodegenError::malformed(
                            "var",
                            format!("expected `(var name init)`, got {} elements", parts.len()),
                        ));
                    }
                    let field = Self::extract_var_name(&parts[1], "var")?;
                    let desc = self.field_desc_from(&parts[1], &parts[2])?;
                    builder.add_field(field, desc)?;
                }
                "def" => {
                    let method = parts
                        .get(1)
                        .and_then(Expression::as_symbol)
                        .ok_or_else(|| CodegenError::malformed("def", "expected a method name"))?;
                    let (ret_desc, _) = self.resolve_ret(parts)?;
                    let params = self.resolve_params(&parts[2], Some(&name))?;
                    if params.first().map(|(param, _)| param.as_str()) != Some("self") {
                        return Err(CodegenError::malformed(
                            "def",
                            format!("first parameter of method `{method}` must be `self`"),
                        ));
                    }
                    let emitted = format!("{name}_{method}");
                    let sig = FnSig::new(
                        params.iter().map(|(_, desc)| desc.repr.clone()).collect(),
                        ret_desc.repr.clone(),
                    );
                    let func = self.module.declare_function(&emitted, sig);
                    builder.register_method(method, func);
                    if let Some(logical) = ret_desc.logical {
                        self.fn_ret_logical.insert(emitted.clone(), logical);
                    }
                    self.scopes.define(
                        scope,
                        &emitted,
                        Binding::Direct {
                            value: Value::Func(func),
                            desc: TyDesc::plain(Ty::Ptr),
                        },
                    );
                }
                _ => {
                    return Err(CodegenError::malformed(
                        "class",
                        format!("invalid class body element `{form}`"),
                    ))
                }
            }
        }

        // Vtable: one `ptr` slot per method, a constant global holding
        // the handles in slot order.
        let vtable_struct = self.module.opaque_struct(&format!("{name}_vtable_type"));
        self.module
            .set_struct_body(vtable_struct, vec![Ty::Ptr; builder.method_names().len()]);
        let vtable_init = builder
            .vtable_handles()
            .into_iter()
            .map(Const::Func)
            .collect();
        let vtable_global = self.module.add_global(
            &format!("{name}_vtable"),
            Ty::Struct(vtable_struct),
            Const::Struct(vtable_init),
            true,
            Some(8),
        );

        // Class struct body: vtable pointer first, then the fields in
        // inheritance-then-declaration order.
        let mut struct_body = vec![Ty::Ptr];
        struct_body.extend(builder.field_layout());
        self.module.set_struct_body(struct_id, struct_body);

        self.classes.insert(builder.finalize(vtable_struct, vtable_global));

        // Pass 2: generate method bodies. Field `var` forms were fully
        // consumed by the scan. Errors abort the whole compilation, so
        // the context only needs resetting on the success path.
        self.call_ctx = CallContext::WithinClass(name);
        for form in &body_items[1..] {
            if form.is_form("def") {
                self.gen(form, scope)?;
            }
        }
        self.call_ctx = CallContext::TopLevel;
        Ok(TypedValue::zero())
    }

    /// A field's descriptor from its declaration: the annotation if
    /// present, otherwise inferred from the initializer's shape.
    fn field_desc_from(
        &self,
        name_decl: &Expression,
        init: &Expression,
    ) -> Result<TyDesc, CodegenError> {
        if let Expression::List(parts) = name_decl {
            let annotation = parts.get(1).and_then(Expression::as_symbol).ok_or_else(|| {
                CodegenError::malformed(
                    "var",
                    format!("invalid type annotation in `{name_decl}`"),
                )
            })?;
            return self.resolve_annotation(annotation);
        }
        Ok(match init {
            Expression::String(_) => TyDesc::string(),
            // Numbers, and anything computed, default to a number field.
            _ => TyDesc::plain(Ty::I32),
        })
    }

    /// `(new Class args...)` — allocate, install the vtable, call the
    /// constructor. `bind` names the instance when the construction
    /// comes from a `var` form.
    pub(crate) fn gen_new(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
        bind: Option<&str>,
    ) -> Result<TypedValue, CodegenError> {
        let class_name = items
            .get(1)
            .and_then(Expression::as_symbol)
            .ok_or_else(|| CodegenError::malformed("new", "expected a class name"))?
            .to_owned();
        let (struct_id, vtable_global) = {
            let info = self
                .classes
                .get(&class_name)
                .ok_or_else(|| CodegenError::ClassNotFound(class_name.clone()))?;
            (info.struct_id, info.vtable_global)
        };

        trace!("creating {} instance", class_name);
        let size = self.module.ty_size(&Ty::Struct(struct_id));
        let malloc = self.gc_malloc;
        let instance = self
            .bx()
            .call(malloc, &[Builder::const_i32(size as i32)], "inst");

        // Slot 0 gets the class vtable before the constructor runs.
        let vtable_slot = self.bx().struct_gep(struct_id, instance, 0, "vtable");
        self.bx().store(Value::Global(vtable_global), vtable_slot);

        let ctor = self
            .module
            .get_function(&format!("{class_name}_constructor"))
            .ok_or_else(|| CodegenError::ConstructorNotFound(class_name.clone()))?;

        let desc = TyDesc::instance(&class_name);
        if let Some(name) = bind {
            self.scopes.define(
                scope,
                name,
                Binding::Direct {
                    value: instance,
                    desc: desc.clone(),
                },
            );
        }

        let mut args = vec![instance];
        for item in &items[2..] {
            args.push(self.gen(item, scope)?.value);
        }
        self.bx().call(ctor, &args, "");
        Ok(TypedValue::new(instance, desc))
    }

    /// `(prop objExpr field)` getter.
    pub(crate) fn gen_prop_get(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        let (ptr, field_desc) = self.prop_addr(items, scope)?;
        let field = items[2].as_symbol().unwrap_or("prop");
        let value = self.bx().load(field_desc.repr.clone(), ptr, field);
        Ok(TypedValue::new(value, field_desc))
    }

    /// `(set (prop objExpr field) value)` setter; evaluates to the zero
    /// sentinel.
    pub(crate) fn gen_prop_set(
        &mut self,
        items: &[Expression],
        value: TypedValue,
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        let (ptr, _) = self.prop_addr(items, scope)?;
        self.bx().store(value.value, ptr);
        Ok(TypedValue::zero())
    }

    /// Shared address computation for getter and setter.
    fn prop_addr(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<(Value, TyDesc), CodegenError> {
        if items.len() != 3 {
            return Err(CodegenError::malformed(
                "prop",
                format!("expected `(prop object field)`, got {} elements", items.len()),
            ));
        }
        let field = items[2]
            .as_symbol()
            .ok_or_else(|| CodegenError::malformed("prop", "expected a field name"))?
            .to_owned();
        let object = self.gen(&items[1], scope)?;
        let class = object
            .desc
            .class()
            .ok_or_else(|| CodegenError::NotAnInstance(items[1].to_string()))?
            .to_owned();

        let (struct_id, index, field_desc) = {
            let info = self
                .classes
                .get(&class)
                .ok_or_else(|| CodegenError::ClassNotFound(class.clone()))?;
            match (info.field_index(&field), info.field_desc(&field)) {
                (Some(index), Some(desc)) => (info.struct_id, index, desc.clone()),
                _ => {
                    return Err(CodegenError::FieldNotFound {
                        class,
                        field,
                    })
                }
            }
        };
        let ptr = self.bx().struct_gep(struct_id, object.value, index, "propPtr");
        Ok((ptr, field_desc))
    }

    /// `(method instExpr name args...)`.
    pub(crate) fn gen_method(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() < 3 {
            return Err(CodegenError::malformed(
                "method",
                "expected `(method instance name args...)`",
            ));
        }
        let method = items[2]
            .as_symbol()
            .ok_or_else(|| CodegenError::malformed("method", "expected a method name"))?
            .to_owned();
        let (instance, lookup_class) = self.method_receiver(&items[1], scope)?;
        self.emit_method_call(instance, &lookup_class, &method, &items[3..], scope)
    }

    /// The receiver and the class used for slot lookup.
    ///
    /// `(method (inst Class) m ...)` forces an ancestor's slot layout;
    /// the implementation still comes from the instance's real vtable
    /// when dispatch is virtual.
    fn method_receiver(
        &mut self,
        expr: &Expression,
        scope: ScopeId,
    ) -> Result<(TypedValue, String), CodegenError> {
        if let Expression::List(parts) = expr {
            if parts.len() == 2 && parts[0].as_symbol().is_some() {
                if let Some(class) = parts[1].as_symbol() {
                    if self.classes.contains(class) {
                        let class = class.to_owned();
                        let instance = self.gen(&parts[0], scope)?;
                        return Ok((instance, class));
                    }
                }
            }
        }
        let instance = self.gen(expr, scope)?;
        let class = instance
            .desc
            .class()
            .ok_or_else(|| CodegenError::NotAnInstance(expr.to_string()))?
            .to_owned();
        Ok((instance, class))
    }

    /// Emit the actual call: static by name inside a class body, virtual
    /// through the instance's slot-0 vtable otherwise.
    pub(crate) fn emit_method_call(
        &mut self,
        instance: TypedValue,
        lookup_class: &str,
        method: &str,
        arg_exprs: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        let (struct_id, vtable_struct, index, handle) = {
            let info = self
                .classes
                .get(lookup_class)
                .ok_or_else(|| CodegenError::ClassNotFound(lookup_class.to_owned()))?;
            let missing = || CodegenError::MethodNotFound {
                class: lookup_class.to_owned(),
                method: method.to_owned(),
            };
            let index = info.method_index(method).ok_or_else(missing)?;
            let handle = info.method_handle(method).ok_or_else(missing)?;
            (info.struct_id, info.vtable_struct, index, handle)
        };
        let sig = self.module.func_sig(handle).clone();
        let handle_name = self.module.function(handle).name.clone();

        let mut args = vec![instance.value];
        for expr in arg_exprs {
            args.push(self.gen(expr, scope)?.value);
        }

        let value = if matches!(self.call_ctx, CallContext::WithinClass(_)) {
            // Static dispatch: the named implementation, vtable bypassed.
            self.bx().call(handle, &args, "")
        } else {
            let vtable_ptr = self
                .bx()
                .struct_gep(struct_id, instance.value, 0, "vtable_gep");
            let vtable = self.bx().load(Ty::Ptr, vtable_ptr, "vtable");
            let fn_slot = self.bx().struct_gep(vtable_struct, vtable, index, "method");
            let fn_ptr = self.bx().load(Ty::Ptr, fn_slot, "method");
            self.bx().call_indirect(fn_ptr, sig.clone(), &args, "")
        };
        Ok(TypedValue::new(value, self.ret_desc(&handle_name, sig.ret)))
    }

    /// `(name args...)` where `name` is not a special form: an ordinary
    /// call if a function with that name exists, otherwise functor
    /// dispatch through the binding's `__call__`.
    pub(crate) fn gen_call(
        &mut self,
        name: &str,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if let Some(func) = self.module.get_function(name) {
            let ret = self.module.func_sig(func).ret.clone();
            let mut args = Vec::with_capacity(items.len() - 1);
            for item in &items[1..] {
                args.push(self.gen(item, scope)?.value);
            }
            let value = self.bx().call(func, &args, "");
            return Ok(TypedValue::new(value, self.ret_desc(name, ret)));
        }

        let Some(binding) = self.scopes.lookup(scope, name) else {
            return Err(CodegenError::NotCallable(name.to_owned()));
        };
        let class = match binding {
            Binding::Slot { desc, .. } | Binding::Direct { desc, .. } => {
                desc.class().map(str::to_owned)
            }
        };
        let Some(class) = class else {
            return Err(CodegenError::NotCallable(name.to_owned()));
        };
        let has_call = self
            .classes
            .get(&class)
            .is_some_and(|info| info.method_index("__call__").is_some());
        if !has_call {
            return Err(CodegenError::NotCallable(name.to_owned()));
        }
        let instance = self.gen_symbol(name, scope)?;
        self.emit_method_call(instance, &class, "__call__", &items[1..], scope)
    }
}
