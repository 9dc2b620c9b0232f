//! Positioned instruction builder.
//!
//! Mirrors the `IRBuilder` discipline: a [`Builder`] is positioned at the
//! end of one basic block and every emission method appends there.
//! Repositioning (`position_at_end`) is explicit, so the code generator
//! controls block structure by hand.
//!
//! Terminator methods (`br`, `cond_br`, `ret`) are no-ops on a block that
//! already has a terminator; generation never needs to replace one.

use crate::module::{BlockId, FuncId, Inst, Module, Terminator, Value};
use crate::types::{BinOp, FnSig, Pred, StructId, Ty};

pub struct Builder<'m> {
    module: &'m mut Module,
    func: FuncId,
    block: BlockId,
}

impl<'m> Builder<'m> {
    /// Start building `func`: appends its entry block and positions there.
    pub fn new(module: &'m mut Module, func: FuncId) -> Self {
        let entry = module.function_mut(func).append_block("entry");
        Builder {
            module,
            func,
            block: entry,
        }
    }

    /// Position an existing function at an existing block.
    pub fn at(module: &'m mut Module, func: FuncId, block: BlockId) -> Self {
        Builder {
            module,
            func,
            block,
        }
    }

    pub fn func(&self) -> FuncId {
        self.func
    }

    pub fn current_block(&self) -> BlockId {
        self.block
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.block = block;
    }

    /// Append a new block to the current function (label uniquified).
    /// The insertion point does not move.
    pub fn append_block(&mut self, name: &str) -> BlockId {
        self.module.function_mut(self.func).append_block(name)
    }

    fn push(&mut self, kind: Inst, name: &str) -> Value {
        let id = self
            .module
            .function_mut(self.func)
            .push_inst(kind, name, self.block);
        Value::Inst(id)
    }

    // -- Constants --

    pub fn const_i32(n: i32) -> Value {
        Value::ConstI32(n)
    }

    pub fn const_bool(b: bool) -> Value {
        Value::ConstBool(b)
    }

    /// Intern a string constant and return a pointer to it.
    pub fn global_string(&mut self, text: &str) -> Value {
        Value::Global(self.module.global_string(text))
    }

    // -- Memory --

    /// Stack slot, grouped with the other allocas at the entry block top.
    pub fn alloca(&mut self, ty: Ty, name: &str) -> Value {
        let id = self.module.function_mut(self.func).push_entry_alloca(ty, name);
        Value::Inst(id)
    }

    pub fn load(&mut self, ty: Ty, ptr: Value, name: &str) -> Value {
        self.push(Inst::Load { ty, ptr }, name)
    }

    pub fn store(&mut self, value: Value, ptr: Value) {
        self.push(Inst::Store { value, ptr }, "");
    }

    pub fn struct_gep(&mut self, struct_ty: StructId, ptr: Value, index: u32, name: &str) -> Value {
        self.push(
            Inst::StructGep {
                struct_ty,
                ptr,
                index,
            },
            name,
        )
    }

    // -- Arithmetic / comparison --

    pub fn bin(&mut self, op: BinOp, lhs: Value, rhs: Value, name: &str) -> Value {
        self.push(Inst::Bin { op, lhs, rhs }, name)
    }

    pub fn icmp(&mut self, pred: Pred, lhs: Value, rhs: Value, name: &str) -> Value {
        self.push(Inst::Icmp { pred, lhs, rhs }, name)
    }

    // -- Calls --

    /// Direct call; the signature comes from the callee.
    pub fn call(&mut self, callee: FuncId, args: &[Value], name: &str) -> Value {
        let sig = self.module.func_sig(callee).clone();
        self.push(
            Inst::Call {
                callee: Value::Func(callee),
                sig,
                args: args.iter().copied().collect(),
            },
            name,
        )
    }

    /// Indirect call through a function pointer with an explicit signature.
    pub fn call_indirect(&mut self, callee: Value, sig: FnSig, args: &[Value], name: &str) -> Value {
        self.push(
            Inst::Call {
                callee,
                sig,
                args: args.iter().copied().collect(),
            },
            name,
        )
    }

    // -- Control flow --

    pub fn phi(&mut self, ty: Ty, incomings: &[(Value, BlockId)], name: &str) -> Value {
        self.push(
            Inst::Phi {
                ty,
                incomings: incomings.iter().copied().collect(),
            },
            name,
        )
    }

    pub fn br(&mut self, dest: BlockId) {
        self.terminate(Terminator::Br { dest });
    }

    pub fn cond_br(&mut self, cond: Value, then_dest: BlockId, else_dest: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_dest,
            else_dest,
        });
    }

    pub fn ret(&mut self, value: Value) {
        self.terminate(Terminator::Ret { value });
    }

    fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.module.function_mut(self.func).blocks[self.block.index()];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }
}
