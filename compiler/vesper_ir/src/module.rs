//! The IR module: struct types, globals, functions, blocks, instructions.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::types::{BinOp, FnSig, Pred, StructId, Ty};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                $name(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

id_type! {
    /// Identifier of a function (declared or defined) in a [`Module`].
    FuncId
}
id_type! {
    /// Identifier of a global variable in a [`Module`].
    GlobalId
}
id_type! {
    /// Identifier of a basic block, local to one [`Function`].
    BlockId
}
id_type! {
    /// Identifier of an instruction, local to one [`Function`].
    InstId
}

/// A value usable as an instruction operand.
///
/// Instruction and parameter values are only meaningful inside the
/// function that produced them; constants, globals, and function
/// references are module-wide.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Value {
    /// Result of an instruction.
    Inst(InstId),
    /// The n-th function parameter.
    Param(u32),
    /// 32-bit integer constant.
    ConstI32(i32),
    /// Boolean (i1) constant.
    ConstBool(bool),
    /// Address of a global variable.
    Global(GlobalId),
    /// Address of a function.
    Func(FuncId),
    /// The null pointer.
    NullPtr,
}

/// A constant initializer for a global variable.
#[derive(Clone, Debug)]
pub enum Const {
    I32(i32),
    Null,
    /// Address of a function (vtable slots).
    Func(FuncId),
    /// Constant struct, e.g. a vtable value.
    Struct(Vec<Const>),
    /// Raw bytes (string literals, NUL included).
    Bytes(Vec<u8>),
}

/// A module-level global variable.
#[derive(Clone, Debug)]
pub struct Global {
    pub name: String,
    pub ty: Ty,
    pub init: Const,
    pub constant: bool,
    pub align: Option<u32>,
    /// Private linkage + unnamed_addr (string literals).
    pub private: bool,
}

/// A named struct type. `body` is `None` while the type is opaque
/// (forward-declared, its fields not yet known).
#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    pub body: Option<Vec<Ty>>,
}

/// A single (non-terminator) instruction.
#[derive(Clone, Debug)]
pub enum Inst {
    /// Stack slot in the entry block.
    Alloca { ty: Ty },
    Load {
        ty: Ty,
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    /// Address of field `index` of a struct pointed to by `ptr`
    /// (`getelementptr inbounds`).
    StructGep {
        struct_ty: StructId,
        ptr: Value,
        index: u32,
    },
    Bin {
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Icmp {
        pred: Pred,
        lhs: Value,
        rhs: Value,
    },
    Phi {
        ty: Ty,
        incomings: SmallVec<[(Value, BlockId); 2]>,
    },
    /// Direct (callee = `Value::Func`) or indirect call through a
    /// function pointer. `sig` is the callee's signature either way.
    Call {
        callee: Value,
        sig: FnSig,
        args: SmallVec<[Value; 4]>,
    },
}

/// A block terminator.
#[derive(Clone, Debug)]
pub enum Terminator {
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Ret {
        value: Value,
    },
}

/// An instruction plus its printing name hint.
#[derive(Clone, Debug)]
pub struct InstData {
    pub kind: Inst,
    /// Name hint for the printed register; empty for a numbered temporary.
    pub name: String,
}

/// A basic block: a label, instructions in order, and (once built) a
/// terminator.
#[derive(Clone, Debug)]
pub struct Block {
    pub label: String,
    pub insts: Vec<InstId>,
    pub terminator: Option<Terminator>,
}

/// A function. With no blocks it is a declaration (`declare`); with
/// blocks it is a definition whose first block is the entry.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub sig: FnSig,
    pub param_names: Vec<String>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) insts: Vec<InstData>,
    /// Number of allocas grouped at the top of the entry block; new
    /// allocas are inserted at this position so locals stay together.
    pub(crate) entry_alloca_count: usize,
    /// Per-label counters so `append_block("then")` yields unique labels.
    pub(crate) label_counts: FxHashMap<String, u32>,
}

impl Function {
    fn new(name: String, sig: FnSig, param_names: Vec<String>) -> Self {
        Function {
            name,
            sig,
            param_names,
            blocks: Vec::new(),
            insts: Vec::new(),
            entry_alloca_count: 0,
            label_counts: FxHashMap::default(),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()]
    }

    pub(crate) fn append_block(&mut self, name: &str) -> BlockId {
        let count = self.label_counts.entry(name.to_owned()).or_insert(0);
        let label = if *count == 0 {
            name.to_owned()
        } else {
            format!("{name}{count}")
        };
        *count += 1;
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(Block {
            label,
            insts: Vec::new(),
            terminator: None,
        });
        id
    }

    pub(crate) fn push_inst(&mut self, kind: Inst, name: &str, block: BlockId) -> InstId {
        let id = InstId::new(self.insts.len());
        self.insts.push(InstData {
            kind,
            name: name.to_owned(),
        });
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// Insert an alloca at the top of the entry block, after any allocas
    /// already grouped there.
    pub(crate) fn push_entry_alloca(&mut self, ty: Ty, name: &str) -> InstId {
        let id = InstId::new(self.insts.len());
        self.insts.push(InstData {
            kind: Inst::Alloca { ty },
            name: name.to_owned(),
        });
        let at = self.entry_alloca_count;
        self.blocks[0].insts.insert(at, id);
        self.entry_alloca_count += 1;
        id
    }

    /// The type of a value as used inside this function.
    ///
    /// Panics on `Inst(Store)` — stores have no result and must not be
    /// used as operands; the builder API makes that unrepresentable.
    pub fn value_ty(&self, value: Value) -> Ty {
        match value {
            Value::Inst(id) => match &self.insts[id.index()].kind {
                Inst::Alloca { .. } | Inst::StructGep { .. } => Ty::Ptr,
                Inst::Load { ty, .. } | Inst::Phi { ty, .. } => ty.clone(),
                Inst::Bin { .. } => Ty::I32,
                Inst::Icmp { .. } => Ty::I1,
                Inst::Call { sig, .. } => sig.ret.clone(),
                Inst::Store { .. } => unreachable!("store result used as operand"),
            },
            Value::Param(i) => self.sig.params[i as usize].clone(),
            Value::ConstI32(_) => Ty::I32,
            Value::ConstBool(_) => Ty::I1,
            Value::Global(_) | Value::Func(_) | Value::NullPtr => Ty::Ptr,
        }
    }
}

/// One translation unit of IR.
pub struct Module {
    pub name: String,
    pub target_triple: Option<String>,
    pub(crate) structs: Vec<StructDef>,
    struct_ids: FxHashMap<String, StructId>,
    pub(crate) globals: Vec<Global>,
    global_ids: FxHashMap<String, GlobalId>,
    pub(crate) funcs: Vec<Function>,
    func_ids: FxHashMap<String, FuncId>,
    string_count: u32,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_owned(),
            target_triple: None,
            structs: Vec::new(),
            struct_ids: FxHashMap::default(),
            globals: Vec::new(),
            global_ids: FxHashMap::default(),
            funcs: Vec::new(),
            func_ids: FxHashMap::default(),
            string_count: 0,
        }
    }

    pub fn set_target_triple(&mut self, triple: &str) {
        self.target_triple = Some(triple.to_owned());
    }

    // -- Struct types --

    /// Get or create a named struct type; newly created types are opaque
    /// until [`Module::set_struct_body`] is called.
    pub fn opaque_struct(&mut self, name: &str) -> StructId {
        if let Some(&id) = self.struct_ids.get(name) {
            return id;
        }
        let id = StructId::new(self.structs.len());
        self.structs.push(StructDef {
            name: name.to_owned(),
            body: None,
        });
        self.struct_ids.insert(name.to_owned(), id);
        id
    }

    pub fn set_struct_body(&mut self, id: StructId, body: Vec<Ty>) {
        self.structs[id.index()].body = Some(body);
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.index()]
    }

    pub fn struct_by_name(&self, name: &str) -> Option<StructId> {
        self.struct_ids.get(name).copied()
    }

    // -- Functions --

    /// Declare a function (or return the existing one with this name).
    pub fn declare_function(&mut self, name: &str, sig: FnSig) -> FuncId {
        if let Some(&id) = self.func_ids.get(name) {
            return id;
        }
        let id = FuncId::new(self.funcs.len());
        self.funcs.push(Function::new(name.to_owned(), sig, Vec::new()));
        self.func_ids.insert(name.to_owned(), id);
        id
    }

    /// Create a function definition, or complete an existing declaration
    /// in place (prototypes registered during a class scan are later
    /// filled in when the method body is generated).
    pub fn define_function(&mut self, name: &str, sig: FnSig, param_names: Vec<String>) -> FuncId {
        if let Some(&id) = self.func_ids.get(name) {
            let func = &mut self.funcs[id.index()];
            func.sig = sig;
            func.param_names = param_names;
            return id;
        }
        let id = FuncId::new(self.funcs.len());
        self.funcs
            .push(Function::new(name.to_owned(), sig, param_names));
        self.func_ids.insert(name.to_owned(), id);
        id
    }

    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.func_ids.get(name).copied()
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.funcs[id.index()]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.index()]
    }

    pub fn func_sig(&self, id: FuncId) -> &FnSig {
        &self.funcs[id.index()].sig
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.funcs
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId::new(i), f))
    }

    // -- Globals --

    pub fn add_global(
        &mut self,
        name: &str,
        ty: Ty,
        init: Const,
        constant: bool,
        align: Option<u32>,
    ) -> GlobalId {
        let id = GlobalId::new(self.globals.len());
        self.globals.push(Global {
            name: name.to_owned(),
            ty,
            init,
            constant,
            align,
            private: false,
        });
        self.global_ids.insert(name.to_owned(), id);
        id
    }

    pub fn get_global(&self, name: &str) -> Option<GlobalId> {
        self.global_ids.get(name).copied()
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    /// Intern a NUL-terminated string constant and return its global.
    pub fn global_string(&mut self, text: &str) -> GlobalId {
        let name = if self.string_count == 0 {
            ".str".to_owned()
        } else {
            format!(".str.{}", self.string_count)
        };
        self.string_count += 1;

        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let len = bytes.len() as u32;
        let id = GlobalId::new(self.globals.len());
        self.globals.push(Global {
            name: name.clone(),
            ty: Ty::Array {
                elem: Box::new(Ty::I8),
                len,
            },
            init: Const::Bytes(bytes),
            constant: true,
            align: None,
            private: true,
        });
        self.global_ids.insert(name, id);
        id
    }

    // -- Layout --

    /// Allocation size of a type under a simple C-like x86-64 layout.
    ///
    /// Panics for opaque structs — callers only size class structs after
    /// their bodies are finalized.
    pub fn ty_size(&self, ty: &Ty) -> u32 {
        match ty {
            Ty::I1 | Ty::I8 => 1,
            Ty::I32 => 4,
            Ty::Ptr => 8,
            Ty::Array { elem, len } => self.ty_size(elem) * len,
            Ty::Struct(id) => {
                let body = self.structs[id.index()]
                    .body
                    .as_ref()
                    .unwrap_or_else(|| panic!("size of opaque struct {}", self.structs[id.index()].name));
                let mut size = 0u32;
                let mut max_align = 1u32;
                for field in body {
                    let align = self.ty_align(field);
                    max_align = max_align.max(align);
                    size = size.next_multiple_of(align);
                    size += self.ty_size(field);
                }
                size.next_multiple_of(max_align)
            }
        }
    }

    pub fn ty_align(&self, ty: &Ty) -> u32 {
        match ty {
            Ty::I1 | Ty::I8 => 1,
            Ty::I32 => 4,
            Ty::Ptr => 8,
            Ty::Array { elem, .. } => self.ty_align(elem),
            Ty::Struct(id) => self.structs[id.index()]
                .body
                .as_ref()
                .map_or(8, |body| {
                    body.iter().map(|f| self.ty_align(f)).max().unwrap_or(1)
                }),
        }
    }
}
