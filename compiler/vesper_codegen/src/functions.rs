//! Function definition: `(def name params [-> retType] body)`.

use tracing::trace;

use vesper_ir::{Builder, FnSig, Ty, Value};
use vesper_reader::Expression;

use crate::env::{Binding, ScopeId};
use crate::error::CodegenError;
use crate::generate::{CallContext, Cursor, Generator};
use crate::ty::{TyDesc, TypedValue};

impl Generator {
    /// Define a function or (inside a class body) complete a method
    /// prototype registered during the class scan.
    pub(crate) fn gen_def(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        let raw_name = items
            .get(1)
            .and_then(Expression::as_symbol)
            .ok_or_else(|| CodegenError::malformed("def", "expected a function name"))?;
        let (ret_desc, body_index) = self.resolve_ret(items)?;

        let current_class = match &self.call_ctx {
            CallContext::WithinClass(class) => Some(class.clone()),
            CallContext::TopLevel => None,
        };
        let emitted_name = match &current_class {
            Some(class) => format!("{class}_{raw_name}"),
            None => raw_name.to_owned(),
        };
        let params = self.resolve_params(&items[2], current_class.as_deref())?;

        let sig = FnSig::new(
            params.iter().map(|(_, desc)| desc.repr.clone()).collect(),
            ret_desc.repr.clone(),
        );
        let param_names = params.iter().map(|(name, _)| name.clone()).collect();
        let func = self.module.define_function(&emitted_name, sig, param_names);
        if let Some(logical) = ret_desc.logical {
            self.fn_ret_logical.insert(emitted_name.clone(), logical);
        }
        self.scopes.define(
            scope,
            &emitted_name,
            Binding::Direct {
                value: Value::Func(func),
                desc: TyDesc::plain(Ty::Ptr),
            },
        );

        // Save the insertion point; sibling and nested defs must find it
        // exactly as it was.
        let saved = self.cursor;
        let entry = Builder::new(&mut self.module, func).current_block();
        self.cursor = Cursor { func, block: entry };

        // The function scope is rooted at the declaring environment, not
        // at any call site. Parameters get stack slots so they behave
        // like ordinary locals.
        let fn_scope = self.scopes.push_child(scope);
        for (i, (name, desc)) in params.iter().enumerate() {
            let slot = self.bx().alloca(desc.repr.clone(), name);
            self.bx().store(Value::Param(i as u32), slot);
            self.scopes.define(
                fn_scope,
                name,
                Binding::Slot {
                    ptr: slot,
                    desc: desc.clone(),
                },
            );
        }

        let body = self.gen(&items[body_index], fn_scope)?;
        self.bx().ret(body.value);
        trace!("defined function {}", emitted_name);

        self.cursor = saved;
        Ok(TypedValue::new(
            Value::Func(func),
            TyDesc::plain(Ty::Ptr),
        ))
    }

    /// Parameter names and descriptors.
    ///
    /// `self` resolves to a pointer to the class currently being
    /// declared; an untyped parameter is a number; `(name type)` uses
    /// the annotation.
    pub(crate) fn resolve_params(
        &self,
        params_decl: &Expression,
        current_class: Option<&str>,
    ) -> Result<Vec<(String, TyDesc)>, CodegenError> {
        let Expression::List(params) = params_decl else {
            return Err(CodegenError::malformed(
                "def",
                format!("expected a parameter list, got `{params_decl}`"),
            ));
        };
        params
            .iter()
            .map(|decl| match decl {
                Expression::Symbol(name) if name == "self" => match current_class {
                    Some(class) => Ok(("self".to_owned(), TyDesc::instance(class))),
                    None => Err(CodegenError::malformed(
                        "def",
                        "`self` parameter outside a class body",
                    )),
                },
                Expression::Symbol(name) => Ok((name.clone(), TyDesc::plain(Ty::I32))),
                Expression::List(parts) if parts.len() == 2 => {
                    let name = parts[0].as_symbol().ok_or_else(|| {
                        CodegenError::malformed(
                            "def",
                            format!("invalid parameter declaration `{decl}`"),
                        )
                    })?;
                    let annotation = parts[1].as_symbol().ok_or_else(|| {
                        CodegenError::malformed(
                            "def",
                            format!("invalid parameter declaration `{decl}`"),
                        )
                    })?;
                    Ok((name.to_owned(), self.resolve_annotation(annotation)?))
                }
                other => Err(CodegenError::malformed(
                    "def",
                    format!("invalid parameter declaration `{other}`"),
                )),
            })
            .collect()
    }

    /// The return descriptor and the body's index: `(def name params
    /// body)` defaults to a number, `(def name params -> type body)`
    /// uses the annotation.
    pub(crate) fn resolve_ret(
        &self,
        items: &[Expression],
    ) -> Result<(TyDesc, usize), CodegenError> {
        match items.len() {
            4 => Ok((TyDesc::plain(Ty::I32), 3)),
            6 => {
                if !items[3].is_symbol("->") {
                    return Err(CodegenError::malformed(
                        "def",
                        "expected `->` before the return type",
                    ));
                }
                let annotation = items[4]
                    .as_symbol()
                    .ok_or_else(|| CodegenError::malformed("def", "invalid return type"))?;
                Ok((self.resolve_annotation(annotation)?, 5))
            }
            n => Err(CodegenError::malformed(
                "def",
                format!("expected 4 or 6 elements, got {n}"),
            )),
        }
    }
}
