//! The recursive code generator.
//!
//! `gen` dispatches on the expression's variant or leading symbol and
//! returns a [`TypedValue`] for every sub-expression. Generation state
//! that the original-style ambient globals would hold — current
//! function, insertion block, current class — is explicit here: a
//! [`Cursor`] plus a [`CallContext`], saved and restored by the forms
//! that change them (`def`, `class`).

use rustc_hash::FxHashMap;
use tracing::trace;

use vesper_ir::{BinOp, BlockId, Builder, Const, FnSig, FuncId, Module, Pred, Ty, Value};
use vesper_reader::Expression;

use crate::classes::ClassRegistry;
use crate::env::{Binding, ScopeArena, ScopeId};
use crate::error::CodegenError;
use crate::ty::{TyDesc, TypedValue};

/// Compile a program (normally the implicit top-level `(begin ...)`)
/// into an IR module.
pub fn compile_program(program: &Expression) -> Result<Module, CodegenError> {
    Generator::new().compile(program)
}

/// Whether generation is currently inside a class body.
///
/// Decides method-name mangling for `def` and static vs. virtual method
/// dispatch: inside a class, method calls resolve statically so a method
/// can reach a specific ancestor implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallContext {
    TopLevel,
    WithinClass(String),
}

/// The insertion point: current function and block.
#[derive(Clone, Copy)]
pub(crate) struct Cursor {
    pub(crate) func: FuncId,
    pub(crate) block: BlockId,
}

/// One compilation's worth of generation state.
pub struct Generator {
    pub(crate) module: Module,
    pub(crate) scopes: ScopeArena,
    pub(crate) classes: ClassRegistry,
    /// Logical return types (strings, instances) keyed by emitted
    /// function name; scalar-returning functions have no entry.
    pub(crate) fn_ret_logical: FxHashMap<String, crate::ty::Logical>,
    pub(crate) cursor: Cursor,
    pub(crate) call_ctx: CallContext,
    /// The scope of the program's own top level; a `var` bound here
    /// becomes a module global.
    pub(crate) toplevel_scope: ScopeId,
    pub(crate) printf: FuncId,
    pub(crate) gc_malloc: FuncId,
}

impl Generator {
    pub fn new() -> Self {
        let mut module = Module::new("vesper");
        module.set_target_triple("x86_64-unknown-linux-gnu");

        // Runtime externs the generator may call without definitions.
        let printf = module.declare_function("printf", FnSig::variadic(vec![Ty::Ptr], Ty::I32));
        let gc_malloc = module.declare_function("GC_malloc", FnSig::new(vec![Ty::I32], Ty::Ptr));

        let mut scopes = ScopeArena::new();
        let version = module.add_global("VERSION", Ty::I32, Const::I32(10), false, Some(4));
        scopes.define(
            scopes.root(),
            "VERSION",
            Binding::Slot {
                ptr: Value::Global(version),
                desc: TyDesc::plain(Ty::I32),
            },
        );
        let toplevel_scope = scopes.push_child(scopes.root());

        let main = module.define_function("main", FnSig::new(vec![], Ty::I32), vec![]);
        let entry = Builder::new(&mut module, main).current_block();

        Generator {
            module,
            scopes,
            classes: ClassRegistry::new(),
            fn_ret_logical: FxHashMap::default(),
            cursor: Cursor {
                func: main,
                block: entry,
            },
            call_ctx: CallContext::TopLevel,
            toplevel_scope,
            printf,
            gc_malloc,
        }
    }

    /// Generate the whole program into `main` and return the module.
    pub fn compile(mut self, program: &Expression) -> Result<Module, CodegenError> {
        let top = self.toplevel_scope;
        match program {
            Expression::List(items) if program.is_form("begin") => {
                for form in &items[1..] {
                    self.gen(form, top)?;
                }
            }
            other => {
                self.gen(other, top)?;
            }
        }
        self.bx().ret(Builder::const_i32(0));
        Ok(self.module)
    }

    /// A builder positioned at the current insertion point.
    pub(crate) fn bx(&mut self) -> Builder<'_> {
        Builder::at(&mut self.module, self.cursor.func, self.cursor.block)
    }

    /// Generate one expression in `scope`.
    pub(crate) fn gen(
        &mut self,
        exp: &Expression,
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        trace!("gen {}", exp);
        match exp {
            Expression::Number(n) => Ok(TypedValue::new(
                Builder::const_i32(*n as i32),
                TyDesc::plain(Ty::I32),
            )),
            Expression::String(text) => {
                let unescaped = text.replace("\\n", "\n");
                let value = self.bx().global_string(&unescaped);
                Ok(TypedValue::new(value, TyDesc::string()))
            }
            Expression::Symbol(name) => self.gen_symbol(name, scope),
            Expression::List(items) => {
                let head = items.first().ok_or(CodegenError::EmptyListForm)?;
                let Some(tag) = head.as_symbol() else {
                    return Err(CodegenError::NotCallable(head.to_string()));
                };
                match tag {
                    "printf" => self.gen_printf(items, scope),
                    "var" => self.gen_var(items, scope),
                    "begin" => self.gen_begin(items, scope),
                    "set" => self.gen_set(items, scope),
                    "+" | "-" | "*" | "/" => self.gen_arith(tag, items, scope),
                    "==" | "!=" | "<" | "<=" | ">" | ">=" => self.gen_compare(tag, items, scope),
                    "if" => self.gen_if(items, scope),
                    "while" => self.gen_while(items, scope),
                    "def" => self.gen_def(items, scope),
                    "class" => self.gen_class(items, scope),
                    "new" => self.gen_new(items, scope, None),
                    "prop" => self.gen_prop_get(items, scope),
                    "method" => self.gen_method(items, scope),
                    name => self.gen_call(name, items, scope),
                }
            }
        }
    }

    pub(crate) fn gen_symbol(
        &mut self,
        name: &str,
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if name == "true" || name == "false" {
            return Ok(TypedValue::new(
                Builder::const_bool(name == "true"),
                TyDesc::plain(Ty::I1),
            ));
        }

        // A symbol naming a zero-argument function calls it.
        if let Some(func) = self.module.get_function(name) {
            let sig = self.module.func_sig(func);
            if sig.params.is_empty() && !sig.variadic {
                let ret = sig.ret.clone();
                let value = self.bx().call(func, &[], name);
                return Ok(TypedValue::new(value, self.ret_desc(name, ret)));
            }
        }

        match self.scopes.lookup(scope, name) {
            Some(Binding::Slot { ptr, desc }) => {
                let (ptr, desc) = (*ptr, desc.clone());
                let value = self.bx().load(desc.repr.clone(), ptr, name);
                Ok(TypedValue::new(value, desc))
            }
            Some(Binding::Direct { value, desc }) => Ok(TypedValue::new(*value, desc.clone())),
            None => Err(CodegenError::UndefinedVariable(name.to_owned())),
        }
    }

    /// `(printf fmt args...)` — variadic call to the declared extern.
    fn gen_printf(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() < 2 {
            return Err(CodegenError::malformed("printf", "expected a format string"));
        }
        let mut args = Vec::with_capacity(items.len() - 1);
        for item in &items[1..] {
            args.push(self.gen(item, scope)?.value);
        }
        let printf = self.printf;
        let value = self.bx().call(printf, &args, "");
        Ok(TypedValue::new(value, TyDesc::plain(Ty::I32)))
    }

    /// `(var name init)` / `(var (name type) init)`.
    fn gen_var(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() != 3 {
            return Err(CodegenError::malformed(
                "var",
                format!("expected `(var name init)`, got {} elements", items.len()),
            ));
        }
        let name_decl = &items[1];
        let init_decl = &items[2];
        let name = Self::extract_var_name(name_decl, "var")?.to_owned();

        // Instance creation binds the raw instance pointer, no slot.
        if init_decl.is_form("new") {
            let Expression::List(new_items) = init_decl else {
                return Err(CodegenError::malformed("var", "invalid `new` initializer"));
            };
            return self.gen_new(new_items, scope, Some(&name));
        }

        let init = self.gen(init_decl, scope)?;

        let mut desc = match name_decl {
            Expression::List(parts) => {
                let annotation = parts.get(1).and_then(Expression::as_symbol).ok_or_else(|| {
                    CodegenError::malformed(
                        "var",
                        format!("invalid type annotation in `{name_decl}`"),
                    )
                })?;
                let annotated = self.resolve_annotation(annotation)?;
                if annotated.repr != init.desc.repr {
                    return Err(CodegenError::malformed(
                        "var",
                        format!("initializer type does not match annotation for `{name}`"),
                    ));
                }
                annotated
            }
            _ => init.desc.clone(),
        };
        // The initializer's logical type wins when it carries one.
        if init.desc.logical.is_some() {
            desc.logical = init.desc.logical.clone();
        }

        let ptr = if scope == self.toplevel_scope {
            self.declare_toplevel_global(&name, &desc, &init)
        } else {
            let slot = self.bx().alloca(desc.repr.clone(), &name);
            let value = init.value;
            self.bx().store(value, slot);
            slot
        };
        self.scopes.define(
            scope,
            &name,
            Binding::Slot {
                ptr,
                desc: desc.clone(),
            },
        );
        Ok(TypedValue::new(init.value, desc))
    }

    /// Top-level `var` bindings live in module globals. A constant
    /// number initializer becomes the global's initializer; anything
    /// else zero-initializes the global and stores from `main`.
    fn declare_toplevel_global(&mut self, name: &str, desc: &TyDesc, init: &TypedValue) -> Value {
        let global_name = self.unique_global_name(name);
        let id = if let Value::ConstI32(n) = init.value {
            self.module
                .add_global(&global_name, Ty::I32, Const::I32(n), false, Some(4))
        } else {
            let (ty, zero, align) = if desc.repr.is_ptr() {
                (Ty::Ptr, Const::Null, 8)
            } else {
                (desc.repr.clone(), Const::I32(0), 4)
            };
            let id = self
                .module
                .add_global(&global_name, ty, zero, false, Some(align));
            let value = init.value;
            self.bx().store(value, Value::Global(id));
            id
        };
        Value::Global(id)
    }

    fn unique_global_name(&self, name: &str) -> String {
        if self.module.get_global(name).is_none() {
            return name.to_owned();
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{name}.{n}");
            if self.module.get_global(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// `(begin expr...)` — child scope, result of the last expression.
    fn gen_begin(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() < 2 {
            return Err(CodegenError::malformed("begin", "empty block"));
        }
        let inner = self.scopes.push_child(scope);
        let mut last = TypedValue::zero();
        for item in &items[1..] {
            last = self.gen(item, inner)?;
        }
        Ok(last)
    }

    /// `(set target value)` — assignment never creates a binding.
    fn gen_set(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() != 3 {
            return Err(CodegenError::malformed(
                "set",
                format!("expected `(set target value)`, got {} elements", items.len()),
            ));
        }
        if items[1].is_form("prop") {
            let value = self.gen(&items[2], scope)?;
            let Expression::List(prop_items) = &items[1] else {
                return Err(CodegenError::malformed("set", "invalid property target"));
            };
            return self.gen_prop_set(prop_items, value, scope);
        }

        let name = Self::extract_var_name(&items[1], "set")?.to_owned();
        let value = self.gen(&items[2], scope)?;
        match self.scopes.lookup(scope, &name) {
            Some(Binding::Slot { ptr, .. }) => {
                let ptr = *ptr;
                let stored = value.value;
                self.bx().store(stored, ptr);
                Ok(value)
            }
            Some(Binding::Direct { .. }) => Err(CodegenError::malformed(
                "set",
                format!("`{name}` is not assignable"),
            )),
            None => Err(CodegenError::UndefinedVariable(name)),
        }
    }

    /// `(+ - * /)` — signed 32-bit integer arithmetic.
    fn gen_arith(
        &mut self,
        op: &str,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        let (lhs, rhs) = self.gen_operands(op, items, scope)?;
        let bin_op = match op {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            _ => BinOp::SDiv,
        };
        let value = self.bx().bin(bin_op, lhs.value, rhs.value, "");
        // The result's logical type follows the left operand.
        Ok(TypedValue::new(
            value,
            TyDesc {
                repr: Ty::I32,
                logical: lhs.desc.logical,
            },
        ))
    }

    /// `(== != < <= > >=)` — signed comparisons producing i1.
    fn gen_compare(
        &mut self,
        op: &str,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        let (lhs, rhs) = self.gen_operands(op, items, scope)?;
        let pred = match op {
            "==" => Pred::Eq,
            "!=" => Pred::Ne,
            "<" => Pred::Slt,
            "<=" => Pred::Sle,
            ">" => Pred::Sgt,
            _ => Pred::Sge,
        };
        let value = self.bx().icmp(pred, lhs.value, rhs.value, "");
        Ok(TypedValue::new(
            value,
            TyDesc {
                repr: Ty::I1,
                logical: lhs.desc.logical,
            },
        ))
    }

    fn gen_operands(
        &mut self,
        op: &str,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<(TypedValue, TypedValue), CodegenError> {
        if items.len() != 3 {
            return Err(CodegenError::malformed(
                "binary operator",
                format!("`{op}` expects two operands, got {}", items.len() - 1),
            ));
        }
        let lhs = self.gen(&items[1], scope)?;
        let rhs = self.gen(&items[2], scope)?;
        Ok((lhs, rhs))
    }

    // -- Shared helpers --

    /// The declared name out of `name` or `(name type)`.
    pub(crate) fn extract_var_name<'e>(
        decl: &'e Expression,
        form: &'static str,
    ) -> Result<&'e str, CodegenError> {
        match decl {
            Expression::Symbol(name) => Ok(name),
            Expression::List(items) => {
                items.first().and_then(Expression::as_symbol).ok_or_else(|| {
                    CodegenError::malformed(form, format!("invalid name declaration `{decl}`"))
                })
            }
            _ => Err(CodegenError::malformed(
                form,
                format!("invalid name declaration `{decl}`"),
            )),
        }
    }

    /// Resolve a type annotation: `number`, `string`, or a declared
    /// class name.
    pub(crate) fn resolve_annotation(&self, name: &str) -> Result<TyDesc, CodegenError> {
        match name {
            "number" => Ok(TyDesc::plain(Ty::I32)),
            "string" => Ok(TyDesc::string()),
            class if self.classes.contains(class) => Ok(TyDesc::instance(class)),
            other => Err(CodegenError::UnknownTypeAnnotation(other.to_owned())),
        }
    }

    /// Return descriptor of a call to `fn_name`.
    pub(crate) fn ret_desc(&self, fn_name: &str, ret: Ty) -> TyDesc {
        TyDesc {
            repr: ret,
            logical: self.fn_ret_logical.get(fn_name).cloned(),
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}
