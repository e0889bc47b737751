// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Loads a [`Program`] from its JSON description.
//!
//! ```json
//! {
//!   "types": [
//!     { "name": "Object", "methods": [ { "sig": "hashCode()", "native": true } ] },
//!     { "name": "A", "super": "Object",
//!       "fields": [ { "name": "f" } ],
//!       "methods": [
//!         { "sig": "main()", "static": true, "vars": ["a"],
//!           "body": [
//!             { "op": "new", "lhs": "a", "type": "A" },
//!             { "op": "invoke", "kind": "virtual", "callee": "Object.hashCode()", "recv": "a" }
//!           ] }
//!       ] }
//!   ],
//!   "entries": [ "A.main()" ]
//! }
//! ```
//!
//! Every name is resolved eagerly, so a program that loads is well formed.

use std::path::Path;

use log::*;
use serde::Deserialize;

use super::builder::{IrError, MethodFlags, ProgramBuilder};
use super::{split_qualified, CallKind, MethodId, MethodRef, Program, Stmt, VarId};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramDesc {
    pub types: Vec<TypeDesc>,
    #[serde(default)]
    pub entries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDesc {
    pub name: String,
    #[serde(default, rename = "super")]
    pub super_type: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub interface: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub fields: Vec<FieldDesc>,
    #[serde(default)]
    pub methods: Vec<MethodDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDesc {
    pub name: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDesc {
    pub sig: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub native: bool,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub vars: Vec<String>,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default)]
    pub body: Vec<StmtDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StmtDesc {
    New {
        lhs: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Copy {
        lhs: String,
        rhs: String,
    },
    Cast {
        lhs: String,
        rhs: String,
        #[serde(rename = "type")]
        ty: String,
    },
    LoadStatic {
        lhs: String,
        field: String,
    },
    StoreStatic {
        field: String,
        rhs: String,
    },
    Load {
        lhs: String,
        base: String,
        field: String,
    },
    Store {
        base: String,
        field: String,
        rhs: String,
    },
    LoadArray {
        lhs: String,
        base: String,
    },
    StoreArray {
        base: String,
        rhs: String,
    },
    Invoke {
        kind: CallKind,
        callee: String,
        #[serde(default)]
        recv: Option<String>,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        result: Option<String>,
    },
    Return {
        #[serde(default)]
        var: Option<String>,
    },
}

/// Reads and builds the program stored in the JSON file at `path`.
pub fn load_program(path: &Path) -> Result<Program, IrError> {
    info!("Loading program from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_program(&content)
}

pub fn parse_program(json: &str) -> Result<Program, IrError> {
    let desc: ProgramDesc = serde_json::from_str(json)?;
    desc.build()
}

pub fn program_from_value(value: serde_json::Value) -> Result<Program, IrError> {
    let desc: ProgramDesc = serde_json::from_value(value)?;
    desc.build()
}

impl ProgramDesc {
    pub fn build(&self) -> Result<Program, IrError> {
        let mut b = ProgramBuilder::new();

        // Types first so that super types and members may refer to any of them.
        for ty in &self.types {
            if ty.interface {
                b.add_interface(&ty.name)?;
            } else {
                b.add_type(&ty.name, None)?;
            }
        }
        for ty in &self.types {
            let id = resolve_type(&b, &ty.name)?;
            if let Some(super_type) = &ty.super_type {
                let super_id = resolve_type(&b, super_type)?;
                b.set_super_type(id, super_id);
            }
            for interface in &ty.interfaces {
                let interface_id = resolve_type(&b, interface)?;
                b.add_implemented_interface(id, interface_id);
            }
            if ty.is_abstract {
                b.set_abstract(id);
            }
            for field in &ty.fields {
                b.add_field(id, &field.name, field.is_static);
            }
        }

        let mut bodies = Vec::new();
        for ty in &self.types {
            let ty_id = resolve_type(&b, &ty.name)?;
            for method in &ty.methods {
                let flags = MethodFlags {
                    is_static: method.is_static,
                    is_abstract: method.is_abstract
                        || (ty.interface && !method.is_static && method.body.is_empty()),
                    is_native: method.native,
                };
                let id = b.add_method(ty_id, &method.sig, flags)?;
                for param in &method.params {
                    b.add_param(id, param)?;
                }
                for var in &method.vars {
                    b.add_var(id, var)?;
                }
                if let Some(ret) = &method.returns {
                    let ret_ty = resolve_type(&b, ret)?;
                    b.set_return_type(id, ret_ty);
                }
                bodies.push((id, method));
            }
        }

        for (id, method) in bodies {
            for stmt in &method.body {
                add_stmt(&mut b, id, stmt)?;
            }
        }

        for entry in &self.entries {
            let id = b
                .method_by_name(entry)
                .ok_or_else(|| IrError::UnknownMethod(entry.clone()))?;
            b.add_entry(id);
        }
        b.build()
    }
}

fn resolve_type(b: &ProgramBuilder, name: &str) -> Result<super::TypeId, IrError> {
    b.type_by_name(name)
        .ok_or_else(|| IrError::UnknownType(name.to_string()))
}

fn resolve_var(b: &ProgramBuilder, method: MethodId, name: &str) -> Result<VarId, IrError> {
    b.var_by_name(method, name).ok_or_else(|| IrError::UndeclaredVar {
        method: b.method_name(method),
        var: name.to_string(),
    })
}

fn resolve_field(b: &ProgramBuilder, name: &str) -> Result<super::FieldId, IrError> {
    b.field_by_name(name)
        .ok_or_else(|| IrError::UnknownField(name.to_string()))
}

fn add_stmt(b: &mut ProgramBuilder, m: MethodId, stmt: &StmtDesc) -> Result<(), IrError> {
    let stmt = match stmt {
        StmtDesc::New { lhs, ty } => {
            let lhs = resolve_var(b, m, lhs)?;
            let ty = resolve_type(b, ty)?;
            b.add_new(m, lhs, ty);
            return Ok(());
        }
        StmtDesc::Invoke {
            kind,
            callee,
            recv,
            args,
            result,
        } => {
            let (ty, subsignature) =
                split_qualified(callee).ok_or_else(|| IrError::UnknownMethod(callee.clone()))?;
            let callee = MethodRef {
                declaring_type: resolve_type(b, ty)?,
                subsignature: subsignature.to_string(),
            };
            let receiver = recv.as_deref().map(|r| resolve_var(b, m, r)).transpose()?;
            let args = args
                .iter()
                .map(|a| resolve_var(b, m, a))
                .collect::<Result<Vec<_>, _>>()?;
            let result = result.as_deref().map(|r| resolve_var(b, m, r)).transpose()?;
            b.add_call(m, *kind, callee, receiver, args, result);
            return Ok(());
        }
        StmtDesc::Copy { lhs, rhs } => Stmt::Copy {
            lhs: resolve_var(b, m, lhs)?,
            rhs: resolve_var(b, m, rhs)?,
        },
        StmtDesc::Cast { lhs, rhs, ty } => Stmt::Cast {
            lhs: resolve_var(b, m, lhs)?,
            rhs: resolve_var(b, m, rhs)?,
            ty: resolve_type(b, ty)?,
        },
        StmtDesc::LoadStatic { lhs, field } => Stmt::LoadStatic {
            lhs: resolve_var(b, m, lhs)?,
            field: resolve_field(b, field)?,
        },
        StmtDesc::StoreStatic { field, rhs } => Stmt::StoreStatic {
            field: resolve_field(b, field)?,
            rhs: resolve_var(b, m, rhs)?,
        },
        StmtDesc::Load { lhs, base, field } => Stmt::LoadField {
            lhs: resolve_var(b, m, lhs)?,
            base: resolve_var(b, m, base)?,
            field: resolve_field(b, field)?,
        },
        StmtDesc::Store { base, field, rhs } => Stmt::StoreField {
            base: resolve_var(b, m, base)?,
            field: resolve_field(b, field)?,
            rhs: resolve_var(b, m, rhs)?,
        },
        StmtDesc::LoadArray { lhs, base } => Stmt::LoadArray {
            lhs: resolve_var(b, m, lhs)?,
            base: resolve_var(b, m, base)?,
        },
        StmtDesc::StoreArray { base, rhs } => Stmt::StoreArray {
            base: resolve_var(b, m, base)?,
            rhs: resolve_var(b, m, rhs)?,
        },
        StmtDesc::Return { var } => {
            Stmt::Return(var.as_deref().map(|v| resolve_var(b, m, v)).transpose()?)
        }
    };
    b.add_stmt(m, stmt);
    Ok(())
}
