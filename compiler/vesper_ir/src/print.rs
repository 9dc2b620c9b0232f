//! Textual LLVM-assembly printing for [`Module`].
//!
//! Register names are assigned at print time: instructions with a name
//! hint keep it (deduplicated with a numeric suffix), unnamed results
//! become `%tN` temporaries. Block labels were already uniquified when
//! the blocks were appended.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::module::{Const, Function, Inst, Module, Terminator, Value};
use crate::types::Ty;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        if let Some(triple) = &self.target_triple {
            writeln!(f, "target triple = \"{triple}\"")?;
        }

        if !self.structs.is_empty() {
            writeln!(f)?;
        }
        for def in &self.structs {
            match &def.body {
                Some(body) if body.is_empty() => writeln!(f, "%{} = type {{}}", def.name)?,
                Some(body) => {
                    let fields: Vec<String> = body.iter().map(|ty| self.ty_str(ty)).collect();
                    writeln!(f, "%{} = type {{ {} }}", def.name, fields.join(", "))?;
                }
                None => writeln!(f, "%{} = type opaque", def.name)?,
            }
        }

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            let linkage = if global.private {
                "private unnamed_addr "
            } else {
                ""
            };
            let kind = if global.constant { "constant" } else { "global" };
            write!(
                f,
                "@{} = {linkage}{kind} {} {}",
                global.name,
                self.ty_str(&global.ty),
                self.const_str(&global.init)
            )?;
            if let Some(align) = global.align {
                write!(f, ", align {align}")?;
            }
            writeln!(f)?;
        }

        for func in self.funcs.iter().filter(|func| func.is_declaration()) {
            let params: Vec<String> = func.sig.params.iter().map(|ty| self.ty_str(ty)).collect();
            let variadic = if func.sig.variadic {
                if params.is_empty() { "..." } else { ", ..." }
            } else {
                ""
            };
            writeln!(
                f,
                "\ndeclare {} @{}({}{variadic})",
                self.ty_str(&func.sig.ret),
                func.name,
                params.join(", ")
            )?;
        }

        for func in self.funcs.iter().filter(|func| !func.is_declaration()) {
            writeln!(f)?;
            self.print_function(f, func)?;
        }
        Ok(())
    }
}

impl Module {
    pub(crate) fn ty_str(&self, ty: &Ty) -> String {
        match ty {
            Ty::I1 => "i1".to_owned(),
            Ty::I8 => "i8".to_owned(),
            Ty::I32 => "i32".to_owned(),
            Ty::Ptr => "ptr".to_owned(),
            Ty::Struct(id) => format!("%{}", self.structs[id.index()].name),
            Ty::Array { elem, len } => format!("[{len} x {}]", self.ty_str(elem)),
        }
    }

    fn const_str(&self, value: &Const) -> String {
        match value {
            Const::I32(n) => n.to_string(),
            Const::Null => "null".to_owned(),
            Const::Func(id) => format!("@{}", self.funcs[id.index()].name),
            Const::Struct(items) if items.is_empty() => "zeroinitializer".to_owned(),
            Const::Struct(items) => {
                let fields: Vec<String> = items
                    .iter()
                    .map(|item| format!("{} {}", self.const_ty_str(item), self.const_str(item)))
                    .collect();
                format!("{{ {} }}", fields.join(", "))
            }
            Const::Bytes(bytes) => {
                let mut out = String::from("c\"");
                for &b in bytes {
                    if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
                        out.push(b as char);
                    } else {
                        out.push_str(&format!("\\{b:02X}"));
                    }
                }
                out.push('"');
                out
            }
        }
    }

    fn const_ty_str(&self, value: &Const) -> &'static str {
        match value {
            Const::I32(_) => "i32",
            Const::Null | Const::Func(_) => "ptr",
            // Nested aggregates don't occur in produced modules.
            Const::Struct(_) | Const::Bytes(_) => "ptr",
        }
    }

    fn print_function(&self, f: &mut fmt::Formatter<'_>, func: &Function) -> fmt::Result {
        let names = assign_names(func);

        let params: Vec<String> = func
            .sig
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("{} %{}", self.ty_str(ty), param_name(func, i)))
            .collect();
        writeln!(
            f,
            "define {} @{}({}) {{",
            self.ty_str(&func.sig.ret),
            func.name,
            params.join(", ")
        )?;

        for block in &func.blocks {
            if block.label != "entry" {
                writeln!(f, "\n{}:", block.label)?;
            } else {
                writeln!(f, "{}:", block.label)?;
            }
            for &inst_id in &block.insts {
                let data = func.inst(inst_id);
                let result = names[inst_id.index()]
                    .as_ref()
                    .map_or(String::new(), |name| format!("%{name} = "));
                match &data.kind {
                    Inst::Alloca { ty } => {
                        writeln!(f, "  {result}alloca {}", self.ty_str(ty))?;
                    }
                    Inst::Load { ty, ptr } => {
                        writeln!(
                            f,
                            "  {result}load {}, ptr {}",
                            self.ty_str(ty),
                            self.val_str(func, &names, *ptr)
                        )?;
                    }
                    Inst::Store { value, ptr } => {
                        writeln!(
                            f,
                            "  store {} {}, ptr {}",
                            self.ty_str(&func.value_ty(*value)),
                            self.val_str(func, &names, *value),
                            self.val_str(func, &names, *ptr)
                        )?;
                    }
                    Inst::StructGep {
                        struct_ty,
                        ptr,
                        index,
                    } => {
                        writeln!(
                            f,
                            "  {result}getelementptr inbounds %{}, ptr {}, i32 0, i32 {index}",
                            self.structs[struct_ty.index()].name,
                            self.val_str(func, &names, *ptr)
                        )?;
                    }
                    Inst::Bin { op, lhs, rhs } => {
                        writeln!(
                            f,
                            "  {result}{} i32 {}, {}",
                            op.mnemonic(),
                            self.val_str(func, &names, *lhs),
                            self.val_str(func, &names, *rhs)
                        )?;
                    }
                    Inst::Icmp { pred, lhs, rhs } => {
                        writeln!(
                            f,
                            "  {result}icmp {} {} {}, {}",
                            pred.mnemonic(),
                            self.ty_str(&func.value_ty(*lhs)),
                            self.val_str(func, &names, *lhs),
                            self.val_str(func, &names, *rhs)
                        )?;
                    }
                    Inst::Phi { ty, incomings } => {
                        let arms: Vec<String> = incomings
                            .iter()
                            .map(|(value, block)| {
                                format!(
                                    "[ {}, %{} ]",
                                    self.val_str(func, &names, *value),
                                    func.block(*block).label
                                )
                            })
                            .collect();
                        writeln!(f, "  {result}phi {} {}", self.ty_str(ty), arms.join(", "))?;
                    }
                    Inst::Call { callee, sig, args } => {
                        let callee_ty = if sig.variadic {
                            let fixed: Vec<String> =
                                sig.params.iter().map(|ty| self.ty_str(ty)).collect();
                            format!("{} ({}, ...)", self.ty_str(&sig.ret), fixed.join(", "))
                        } else {
                            self.ty_str(&sig.ret)
                        };
                        let arg_strs: Vec<String> = args
                            .iter()
                            .map(|&arg| {
                                format!(
                                    "{} {}",
                                    self.ty_str(&func.value_ty(arg)),
                                    self.val_str(func, &names, arg)
                                )
                            })
                            .collect();
                        writeln!(
                            f,
                            "  {result}call {callee_ty} {}({})",
                            self.val_str(func, &names, *callee),
                            arg_strs.join(", ")
                        )?;
                    }
                }
            }
            match &block.terminator {
                Some(Terminator::Br { dest }) => {
                    writeln!(f, "  br label %{}", func.block(*dest).label)?;
                }
                Some(Terminator::CondBr {
                    cond,
                    then_dest,
                    else_dest,
                }) => {
                    writeln!(
                        f,
                        "  br i1 {}, label %{}, label %{}",
                        self.val_str(func, &names, *cond),
                        func.block(*then_dest).label,
                        func.block(*else_dest).label
                    )?;
                }
                Some(Terminator::Ret { value }) => {
                    writeln!(
                        f,
                        "  ret {} {}",
                        self.ty_str(&func.value_ty(*value)),
                        self.val_str(func, &names, *value)
                    )?;
                }
                // Unterminated blocks are caught by the verifier; keep the
                // output well-formed enough to read.
                None => writeln!(f, "  ; <unterminated>")?,
            }
        }
        writeln!(f, "}}")
    }

    fn val_str(&self, func: &Function, names: &[Option<String>], value: Value) -> String {
        match value {
            Value::Inst(id) => match &names[id.index()] {
                Some(name) => format!("%{name}"),
                None => "%<void>".to_owned(),
            },
            Value::Param(i) => format!("%{}", param_name(func, i as usize)),
            Value::ConstI32(n) => n.to_string(),
            Value::ConstBool(b) => b.to_string(),
            Value::Global(id) => format!("@{}", self.globals[id.index()].name),
            Value::Func(id) => format!("@{}", self.funcs[id.index()].name),
            Value::NullPtr => "null".to_owned(),
        }
    }
}

fn param_name(func: &Function, index: usize) -> String {
    func.param_names
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("arg{index}"))
}

/// Assign printed register names: hints win (deduplicated against params
/// and earlier hints), everything else numbers off as `%tN`. Stores get
/// no name.
fn assign_names(func: &Function) -> Vec<Option<String>> {
    let mut names: Vec<Option<String>> = vec![None; func.insts.len()];
    let mut seen: FxHashMap<String, u32> = FxHashMap::default();
    for (i, _) in func.sig.params.iter().enumerate() {
        seen.insert(param_name(func, i), 1);
    }

    let mut temp = 0u32;
    for block in &func.blocks {
        for &inst_id in &block.insts {
            let data = func.inst(inst_id);
            if matches!(data.kind, Inst::Store { .. }) {
                continue;
            }
            let name = if data.name.is_empty() {
                let name = format!("t{temp}");
                temp += 1;
                name
            } else {
                let count = seen.entry(data.name.clone()).or_insert(0);
                let name = if *count == 0 {
                    data.name.clone()
                } else {
                    format!("{}{}", data.name, count)
                };
                *count += 1;
                name
            };
            names[inst_id.index()] = Some(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::builder::Builder;
    use crate::module::Module;
    use crate::types::{BinOp, FnSig, Ty};

    #[test]
    fn prints_a_minimal_function() {
        let mut module = Module::new("unit");
        let square = module.define_function(
            "square",
            FnSig::new(vec![Ty::I32], Ty::I32),
            vec!["x".to_owned()],
        );
        let mut bx = Builder::new(&mut module, square);
        let slot = bx.alloca(Ty::I32, "x");
        bx.store(crate::Value::Param(0), slot);
        let x = bx.load(Ty::I32, slot, "x");
        let sq = bx.bin(BinOp::Mul, x, x, "");
        bx.ret(sq);

        let expected = "\
; ModuleID = 'unit'

define i32 @square(i32 %x) {
entry:
  %x1 = alloca i32
  store i32 %x, ptr %x1
  %x2 = load i32, ptr %x1
  %t0 = mul i32 %x2, %x2
  ret i32 %t0
}
";
        assert_eq!(module.to_string(), expected);
    }

    #[test]
    fn prints_declarations_and_variadic_calls() {
        let mut module = Module::new("unit");
        let printf = module.declare_function("printf", FnSig::variadic(vec![Ty::Ptr], Ty::I32));
        let main = module.define_function("main", FnSig::new(vec![], Ty::I32), vec![]);
        let mut bx = Builder::new(&mut module, main);
        let fmt = bx.global_string("%d\n");
        bx.call(printf, &[fmt, Builder::const_i32(42)], "");
        bx.ret(Builder::const_i32(0));

        let printed = module.to_string();
        assert!(printed.contains("@.str = private unnamed_addr constant [4 x i8] c\"%d\\0A\\00\""));
        assert!(printed.contains("declare i32 @printf(ptr, ...)"));
        assert!(printed.contains("call i32 (ptr, ...) @printf(ptr @.str, i32 42)"));
    }

    #[test]
    fn prints_struct_types_and_geps() {
        let mut module = Module::new("unit");
        let point = module.opaque_struct("Point");
        module.set_struct_body(point, vec![Ty::Ptr, Ty::I32, Ty::I32]);
        let getter = module.define_function(
            "Point_x",
            FnSig::new(vec![Ty::Ptr], Ty::I32),
            vec!["self".to_owned()],
        );
        let mut bx = Builder::new(&mut module, getter);
        let field = bx.struct_gep(point, crate::Value::Param(0), 1, "prop");
        let value = bx.load(Ty::I32, field, "x");
        bx.ret(value);

        let printed = module.to_string();
        assert!(printed.contains("%Point = type { ptr, i32, i32 }"));
        assert!(printed.contains("%prop = getelementptr inbounds %Point, ptr %self, i32 0, i32 1"));
    }
}
