// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The program model consumed by the pointer analysis.
//!
//! A [`Program`] is built once (see [`builder::ProgramBuilder`] and [`loader`]) and is
//! immutable afterwards. The solver only ever holds a shared reference to it.

use std::collections::HashMap;
use std::fmt;

use rustc_index::IndexVec;

pub mod builder;
pub mod hierarchy;
pub mod loader;
pub mod stmt;

pub use self::builder::{IrError, ProgramBuilder};
pub use self::stmt::{CallKind, Stmt};

rustc_index::newtype_index! {
    /// The unique identifier for each class or interface type.
    #[orderable]
    #[debug_format = "TypeId({})"]
    pub struct TypeId {}
}

rustc_index::newtype_index! {
    /// The unique identifier for each field.
    #[orderable]
    #[debug_format = "FieldId({})"]
    pub struct FieldId {}
}

rustc_index::newtype_index! {
    /// The unique identifier for each method.
    #[orderable]
    #[debug_format = "MethodId({})"]
    pub struct MethodId {}
}

rustc_index::newtype_index! {
    /// The unique identifier for each local variable. Variables of different methods
    /// never share an id.
    #[orderable]
    #[debug_format = "VarId({})"]
    pub struct VarId {}
}

rustc_index::newtype_index! {
    /// The unique identifier for each allocation site.
    #[orderable]
    #[debug_format = "AllocSiteId({})"]
    pub struct AllocSiteId {}
}

rustc_index::newtype_index! {
    /// The unique identifier for each call site.
    #[orderable]
    #[debug_format = "CallSiteId({})"]
    pub struct CallSiteId {}
}

#[derive(Clone, Debug)]
pub struct Type {
    pub name: String,
    pub super_type: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub is_interface: bool,
    pub is_abstract: bool,
    /// Methods declared by this type, keyed by subsignature.
    pub methods: HashMap<String, MethodId>,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub declaring_type: TypeId,
    pub is_static: bool,
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    /// Name plus parameter descriptor, e.g. `hashCode()`. Dispatch matches on it.
    pub subsignature: String,
    pub declaring_type: TypeId,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_native: bool,
    /// Declared type of the returned reference, if any.
    pub return_type: Option<TypeId>,
    pub this_var: Option<VarId>,
    pub params: Vec<VarId>,
    /// Variables returned by `return` statements. Native methods get a synthetic one.
    pub return_vars: Vec<VarId>,
    pub vars: Vec<VarId>,
    pub stmts: Vec<Stmt>,
}

impl Method {
    #[inline]
    pub fn has_body(&self) -> bool {
        !self.is_abstract && !self.is_native
    }
}

#[derive(Clone, Debug)]
pub struct Var {
    pub name: String,
    pub method: MethodId,
}

#[derive(Clone, Debug)]
pub struct AllocSite {
    pub method: MethodId,
    pub ty: TypeId,
    /// Position of the allocation among the allocations of `method`.
    pub ordinal: usize,
}

/// Reference to the statically declared callee of a call site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub declaring_type: TypeId,
    pub subsignature: String,
}

#[derive(Clone, Debug)]
pub struct CallSite {
    pub container: MethodId,
    pub kind: CallKind,
    pub callee: MethodRef,
    pub receiver: Option<VarId>,
    pub args: Vec<VarId>,
    pub result: Option<VarId>,
    /// Position of the call among the call sites of `container`.
    pub ordinal: usize,
}

/// An immutable program.
#[derive(Debug, Default)]
pub struct Program {
    pub(crate) types: IndexVec<TypeId, Type>,
    pub(crate) fields: IndexVec<FieldId, Field>,
    pub(crate) methods: IndexVec<MethodId, Method>,
    pub(crate) vars: IndexVec<VarId, Var>,
    pub(crate) alloc_sites: IndexVec<AllocSiteId, AllocSite>,
    pub(crate) call_sites: IndexVec<CallSiteId, CallSite>,
    pub(crate) entry_methods: Vec<MethodId>,
    pub(crate) type_names: HashMap<String, TypeId>,
}

impl Program {
    #[inline]
    pub fn get_type(&self, id: TypeId) -> &Type {
        &self.types[id]
    }

    #[inline]
    pub fn get_field(&self, id: FieldId) -> &Field {
        &self.fields[id]
    }

    #[inline]
    pub fn get_method(&self, id: MethodId) -> &Method {
        &self.methods[id]
    }

    #[inline]
    pub fn get_var(&self, id: VarId) -> &Var {
        &self.vars[id]
    }

    #[inline]
    pub fn get_alloc_site(&self, id: AllocSiteId) -> &AllocSite {
        &self.alloc_sites[id]
    }

    #[inline]
    pub fn get_call_site(&self, id: CallSiteId) -> &CallSite {
        &self.call_sites[id]
    }

    pub fn entry_methods(&self) -> &[MethodId] {
        &self.entry_methods
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.type_names.get(name).copied()
    }

    /// Finds the method with the given subsignature declared exactly by `ty`.
    pub fn declared_method(&self, ty: TypeId, subsignature: &str) -> Option<MethodId> {
        self.types[ty].methods.get(subsignature).copied()
    }

    /// Looks up a method by its qualified name `Type.subsignature`.
    pub fn method_by_name(&self, qualified: &str) -> Option<MethodId> {
        let (ty, subsig) = split_qualified(qualified)?;
        self.declared_method(self.type_by_name(ty)?, subsig)
    }

    /// Looks up a variable of a method by name.
    pub fn var_by_name(&self, method: MethodId, name: &str) -> Option<VarId> {
        self.methods[method]
            .vars
            .iter()
            .copied()
            .find(|var| self.vars[*var].name == name)
    }

    /// Looks up a field by its qualified name `Type.field`, searching super types.
    pub fn field_by_name(&self, qualified: &str) -> Option<FieldId> {
        let (ty, name) = qualified.rsplit_once('.')?;
        let mut cur = self.type_by_name(ty);
        while let Some(ty) = cur {
            if let Some((id, _)) = self
                .fields
                .iter_enumerated()
                .find(|(_, f)| f.declaring_type == ty && f.name == name)
            {
                return Some(id);
            }
            cur = self.types[ty].super_type;
        }
        None
    }

    pub fn num_types(&self) -> usize {
        self.types.len()
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodId, &Method)> + '_ {
        self.methods.iter_enumerated()
    }

    pub fn call_sites(&self) -> impl Iterator<Item = (CallSiteId, &CallSite)> + '_ {
        self.call_sites.iter_enumerated()
    }

    /// `Type.subsignature`
    pub fn method_name(&self, id: MethodId) -> String {
        let method = &self.methods[id];
        format!(
            "{}.{}",
            self.types[method.declaring_type].name, method.subsignature
        )
    }

    /// `Type.subsignature/var`
    pub fn var_name(&self, id: VarId) -> String {
        let var = &self.vars[id];
        format!("{}/{}", self.method_name(var.method), var.name)
    }

    /// `Type.field`
    pub fn field_name(&self, id: FieldId) -> String {
        let field = &self.fields[id];
        format!("{}.{}", self.types[field.declaring_type].name, field.name)
    }

    /// `Type.subsignature@call<ordinal>`
    pub fn call_site_name(&self, id: CallSiteId) -> String {
        let cs = &self.call_sites[id];
        format!("{}@call{}", self.method_name(cs.container), cs.ordinal)
    }

    /// `Type.subsignature@new<ordinal>:AllocatedType`
    pub fn alloc_site_name(&self, id: AllocSiteId) -> String {
        let site = &self.alloc_sites[id];
        format!(
            "{}@new{}:{}",
            self.method_name(site.method),
            site.ordinal,
            self.types[site.ty].name
        )
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{}", self.declaring_type, self.subsignature)
    }
}

/// Splits `Type.name(args)` at the last `.` preceding the parameter list.
pub(crate) fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    let params_start = qualified.find('(').unwrap_or(qualified.len());
    let dot = qualified[..params_start].rfind('.')?;
    Some((&qualified[..dot], &qualified[dot + 1..]))
}
