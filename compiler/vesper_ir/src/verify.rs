//! Structural verification.
//!
//! Verification never aborts anything: the driver reports each issue and
//! still emits the module (pass/warn-and-continue).

use thiserror::Error;

use crate::module::{Const, Inst, Module, Terminator, Value};
use crate::types::Ty;

/// A single verification finding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyIssue {
    #[error("function `{func}`: block `{block}` has no terminator")]
    UnterminatedBlock { func: String, block: String },

    #[error("function `{func}`: return type mismatch (returns {found}, signature says {expected})")]
    RetTypeMismatch {
        func: String,
        expected: String,
        found: String,
    },

    #[error("function `{func}`: call to `{callee}` passes {found} arguments, expected {expected}")]
    CallArity {
        func: String,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("function `{func}`: {inst} operand is not a pointer")]
    NonPointerOperand { func: String, inst: &'static str },

    #[error("function `{func}`: getelementptr index {index} out of range for `{strukt}`")]
    GepOutOfRange {
        func: String,
        strukt: String,
        index: u32,
    },

    #[error("function `{func}`: phi node has no incoming values")]
    EmptyPhi { func: String },

    #[error("function `{func}`: phi incoming value type differs from phi type")]
    PhiTypeMismatch { func: String },

    #[error("global `{global}`: initializer has {found} fields, struct type has {expected}")]
    GlobalInitArity {
        global: String,
        expected: usize,
        found: usize,
    },
}

/// Check every defined function and global initializer; collect findings.
pub fn verify(module: &Module) -> Vec<VerifyIssue> {
    let mut issues = Vec::new();

    for (_, func) in module.functions() {
        if func.is_declaration() {
            continue;
        }
        let fname = func.name.clone();

        for block in func.blocks() {
            if block.terminator.is_none() {
                issues.push(VerifyIssue::UnterminatedBlock {
                    func: fname.clone(),
                    block: block.label.clone(),
                });
            }
            for &inst_id in &block.insts {
                match &func.inst(inst_id).kind {
                    Inst::Load { ptr, .. } => {
                        check_ptr(&mut issues, func, *ptr, "load");
                    }
                    Inst::Store { ptr, .. } => {
                        check_ptr(&mut issues, func, *ptr, "store");
                    }
                    Inst::StructGep {
                        struct_ty,
                        ptr,
                        index,
                    } => {
                        check_ptr(&mut issues, func, *ptr, "getelementptr");
                        let def = module.struct_def(*struct_ty);
                        if let Some(body) = &def.body {
                            if *index as usize >= body.len() {
                                issues.push(VerifyIssue::GepOutOfRange {
                                    func: fname.clone(),
                                    strukt: def.name.clone(),
                                    index: *index,
                                });
                            }
                        }
                    }
                    Inst::Phi { ty, incomings } => {
                        if incomings.is_empty() {
                            issues.push(VerifyIssue::EmptyPhi {
                                func: fname.clone(),
                            });
                        }
                        if incomings
                            .iter()
                            .any(|(value, _)| func.value_ty(*value) != *ty)
                        {
                            issues.push(VerifyIssue::PhiTypeMismatch {
                                func: fname.clone(),
                            });
                        }
                    }
                    Inst::Call { callee, sig, args } => {
                        let arity_ok = if sig.variadic {
                            args.len() >= sig.params.len()
                        } else {
                            args.len() == sig.params.len()
                        };
                        if !arity_ok {
                            let callee_name = match callee {
                                Value::Func(id) => module.function(*id).name.clone(),
                                _ => "<indirect>".to_owned(),
                            };
                            issues.push(VerifyIssue::CallArity {
                                func: fname.clone(),
                                callee: callee_name,
                                expected: sig.params.len(),
                                found: args.len(),
                            });
                        }
                    }
                    Inst::Alloca { .. } | Inst::Bin { .. } | Inst::Icmp { .. } => {}
                }
            }
            if let Some(Terminator::Ret { value }) = &block.terminator {
                let found = func.value_ty(*value);
                if found != func.sig.ret {
                    issues.push(VerifyIssue::RetTypeMismatch {
                        func: fname.clone(),
                        expected: module.ty_str(&func.sig.ret),
                        found: module.ty_str(&found),
                    });
                }
            }
        }
    }

    for global in &module.globals {
        if let (Ty::Struct(id), Const::Struct(items)) = (&global.ty, &global.init) {
            if let Some(body) = &module.struct_def(*id).body {
                if body.len() != items.len() {
                    issues.push(VerifyIssue::GlobalInitArity {
                        global: global.name.clone(),
                        expected: body.len(),
                        found: items.len(),
                    });
                }
            }
        }
    }

    issues
}

fn check_ptr(
    issues: &mut Vec<VerifyIssue>,
    func: &crate::module::Function,
    value: Value,
    inst: &'static str,
) {
    if !func.value_ty(value).is_ptr() {
        issues.push(VerifyIssue::NonPointerOperand {
            func: func.name.clone(),
            inst,
        });
    }
}
