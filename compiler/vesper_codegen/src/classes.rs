//! Class registry and vtable layout.
//!
//! Classes are built in two phases. During the shallow scan of a class
//! body a mutable [`ClassBuilder`] accumulates fields and method
//! prototypes (inheriting the parent's lists first); once the vtable is
//! synthesized the builder is finalized into an immutable [`ClassInfo`]
//! and registered. Nothing mutates a class after its declaration
//! completes.
//!
//! Order is significant everywhere: `field_names` fixes the struct
//! layout (slot 0 is the vtable pointer, so field indices are 1-based)
//! and `method_names` fixes vtable slots (0-based). Re-registering an
//! existing method name replaces the handle only — the slot index is
//! stable, which is what keeps overriding methods layout-compatible
//! with their ancestors.

use rustc_hash::FxHashMap;

use vesper_ir::{FuncId, GlobalId, StructId, Ty};

use crate::error::CodegenError;
use crate::ty::TyDesc;

/// Immutable description of a declared class.
#[derive(Clone, Debug)]
pub struct ClassInfo {
    pub name: String,
    /// The class struct type: `[vtable ptr, field1, field2, ...]`.
    pub struct_id: StructId,
    /// The vtable struct type: one `ptr` per method.
    pub vtable_struct: StructId,
    /// The constant vtable global for this class.
    pub vtable_global: GlobalId,
    /// Parent class name; `None` for a root class.
    pub parent: Option<String>,
    /// Fields in layout order, inherited fields first.
    pub field_names: Vec<String>,
    pub field_types: FxHashMap<String, TyDesc>,
    /// Methods in vtable-slot order, first declaration (anywhere in the
    /// inheritance chain) wins the slot.
    pub method_names: Vec<String>,
    pub method_handles: FxHashMap<String, FuncId>,
}

impl ClassInfo {
    /// Struct index of `field`: 1-based because slot 0 holds the vtable
    /// pointer.
    pub fn field_index(&self, field: &str) -> Option<u32> {
        self.field_names
            .iter()
            .position(|name| name == field)
            .map(|i| i as u32 + 1)
    }

    pub fn field_desc(&self, field: &str) -> Option<&TyDesc> {
        self.field_types.get(field)
    }

    /// Vtable slot of `method` (0-based; the vtable has no reserved slot).
    pub fn method_index(&self, method: &str) -> Option<u32> {
        self.method_names
            .iter()
            .position(|name| name == method)
            .map(|i| i as u32)
    }

    pub fn method_handle(&self, method: &str) -> Option<FuncId> {
        self.method_handles.get(method).copied()
    }
}

/// Mutable class description used during the body scan.
pub struct ClassBuilder {
    name: String,
    struct_id: StructId,
    parent: Option<String>,
    field_names: Vec<String>,
    field_types: FxHashMap<String, TyDesc>,
    method_names: Vec<String>,
    method_handles: FxHashMap<String, FuncId>,
}

impl ClassBuilder {
    /// Start a class. With a parent, its field and method lists are
    /// copied verbatim before the child body is scanned, so inherited
    /// entries keep their indices.
    pub fn new(name: &str, struct_id: StructId, parent: Option<&ClassInfo>) -> Self {
        match parent {
            Some(info) => ClassBuilder {
                name: name.to_owned(),
                struct_id,
                parent: Some(info.name.clone()),
                field_names: info.field_names.clone(),
                field_types: info.field_types.clone(),
                method_names: info.method_names.clone(),
                method_handles: info.method_handles.clone(),
            },
            None => ClassBuilder {
                name: name.to_owned(),
                struct_id,
                parent: None,
                field_names: Vec::new(),
                field_types: FxHashMap::default(),
                method_names: Vec::new(),
                method_handles: FxHashMap::default(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn struct_id(&self) -> StructId {
        self.struct_id
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn field_desc(&self, field: &str) -> Option<&TyDesc> {
        self.field_types.get(field)
    }

    pub fn method_names(&self) -> &[String] {
        &self.method_names
    }

    pub fn method_handle(&self, method: &str) -> Option<FuncId> {
        self.method_handles.get(method).copied()
    }

    /// Field representation types in layout order (the vtable slot is
    /// not included).
    pub fn field_layout(&self) -> Vec<Ty> {
        self.field_names
            .iter()
            .filter_map(|field| self.field_types.get(field))
            .map(|desc| desc.repr.clone())
            .collect()
    }

    /// Method handles in vtable-slot order.
    pub fn vtable_handles(&self) -> Vec<FuncId> {
        self.method_names
            .iter()
            .filter_map(|method| self.method_handles.get(method))
            .copied()
            .collect()
    }

    /// Append a field; redeclaring a name (inherited ones included) is a
    /// hard error.
    pub fn add_field(&mut self, field: &str, desc: TyDesc) -> Result<(), CodegenError> {
        if self.field_types.contains_key(field) {
            return Err(CodegenError::DuplicateField {
                class: self.name.clone(),
                field: field.to_owned(),
            });
        }
        self.field_names.push(field.to_owned());
        self.field_types.insert(field.to_owned(), desc);
        Ok(())
    }

    /// Register a method prototype. A known name (an override) replaces
    /// the handle only; its vtable slot is unchanged.
    pub fn register_method(&mut self, method: &str, handle: FuncId) {
        if !self.method_handles.contains_key(method) {
            self.method_names.push(method.to_owned());
        }
        self.method_handles.insert(method.to_owned(), handle);
    }

    /// Freeze the builder once the vtable has been materialized.
    pub fn finalize(self, vtable_struct: StructId, vtable_global: GlobalId) -> ClassInfo {
        ClassInfo {
            name: self.name,
            struct_id: self.struct_id,
            vtable_struct,
            vtable_global,
            parent: self.parent,
            field_names: self.field_names,
            field_types: self.field_types,
            method_names: self.method_names,
            method_handles: self.method_handles,
        }
    }
}

/// All classes declared so far, keyed by name.
#[derive(Default)]
pub struct ClassRegistry {
    classes: FxHashMap<String, ClassInfo>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn insert(&mut self, info: ClassInfo) {
        self.classes.insert(info.name.clone(), info);
    }
}
