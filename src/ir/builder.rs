// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Incremental construction and validation of a [`Program`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::*;
use thiserror::Error;

use super::*;

/// Malformed program input. Reported before any fixpoint work begins.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("type `{0}` is declared more than once")]
    DuplicateType(String),
    #[error("method `{0}` is declared more than once")]
    DuplicateMethod(String),
    #[error("variable `{var}` is declared more than once in `{method}`")]
    DuplicateVar { method: String, var: String },
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("`{method}` references undeclared variable `{var}`")]
    UndeclaredVar { method: String, var: String },
    #[error("`{method}` references variable `{var}` of another method")]
    ForeignVar { method: String, var: String },
    #[error("`{method}` references an id out of range: {id}")]
    InvalidId { method: String, id: String },
    #[error("call `{call}`: {reason}")]
    MalformedCall { call: String, reason: &'static str },
    #[error("field `{field}` is accessed as {expected} field")]
    FieldKindMismatch { field: String, expected: &'static str },
    #[error("method `{0}` is abstract or native but has a body")]
    UnexpectedBody(String),
    #[error("method `{0}` is static and has no `this` variable")]
    NoThis(String),
    #[error("failed to read program: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse program: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, Default)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_native: bool,
}

/// Builds a [`Program`] through its ids. [`ProgramBuilder::build`] validates the
/// whole program and computes derived data such as return variables.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    var_names: HashMap<(MethodId, String), VarId>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, name: &str, super_type: Option<TypeId>) -> Result<TypeId, IrError> {
        self.new_type(name, super_type, false)
    }

    pub fn add_interface(&mut self, name: &str) -> Result<TypeId, IrError> {
        self.new_type(name, None, true)
    }

    fn new_type(
        &mut self,
        name: &str,
        super_type: Option<TypeId>,
        is_interface: bool,
    ) -> Result<TypeId, IrError> {
        let next = self.program.types.next_index();
        match self.program.type_names.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(IrError::DuplicateType(name.to_string())),
            Entry::Vacant(v) => {
                v.insert(next);
            }
        }
        Ok(self.program.types.push(Type {
            name: name.to_string(),
            super_type,
            interfaces: Vec::new(),
            is_interface,
            is_abstract: is_interface,
            methods: HashMap::new(),
        }))
    }

    pub fn set_super_type(&mut self, ty: TypeId, super_type: TypeId) {
        self.program.types[ty].super_type = Some(super_type);
    }

    pub fn set_abstract(&mut self, ty: TypeId) {
        self.program.types[ty].is_abstract = true;
    }

    pub fn add_implemented_interface(&mut self, ty: TypeId, interface: TypeId) {
        self.program.types[ty].interfaces.push(interface);
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.program.type_by_name(name)
    }

    pub fn add_field(&mut self, ty: TypeId, name: &str, is_static: bool) -> FieldId {
        self.program.fields.push(Field {
            name: name.to_string(),
            declaring_type: ty,
            is_static,
        })
    }

    pub fn field_by_name(&self, qualified: &str) -> Option<FieldId> {
        self.program.field_by_name(qualified)
    }

    /// Declares a method. Instance methods get a `this` variable.
    pub fn add_method(
        &mut self,
        ty: TypeId,
        subsignature: &str,
        flags: MethodFlags,
    ) -> Result<MethodId, IrError> {
        let name = subsignature
            .split_once('(')
            .map_or(subsignature, |(name, _)| name)
            .to_string();
        let id = self.program.methods.next_index();
        let declaring = &mut self.program.types[ty];
        if declaring.methods.contains_key(subsignature) {
            return Err(IrError::DuplicateMethod(format!(
                "{}.{}",
                declaring.name, subsignature
            )));
        }
        declaring.methods.insert(subsignature.to_string(), id);
        self.program.methods.push(Method {
            name,
            subsignature: subsignature.to_string(),
            declaring_type: ty,
            is_static: flags.is_static,
            is_abstract: flags.is_abstract,
            is_native: flags.is_native,
            return_type: None,
            this_var: None,
            params: Vec::new(),
            return_vars: Vec::new(),
            vars: Vec::new(),
            stmts: Vec::new(),
        });
        if !flags.is_static {
            let this = self.add_var(id, "this")?;
            self.program.methods[id].this_var = Some(this);
        }
        Ok(id)
    }

    pub fn method_by_name(&self, qualified: &str) -> Option<MethodId> {
        self.program.method_by_name(qualified)
    }

    pub fn method_name(&self, method: MethodId) -> String {
        self.program.method_name(method)
    }

    pub fn set_return_type(&mut self, method: MethodId, ty: TypeId) {
        self.program.methods[method].return_type = Some(ty);
    }

    pub fn add_var(&mut self, method: MethodId, name: &str) -> Result<VarId, IrError> {
        let id = self.program.vars.next_index();
        match self.var_names.entry((method, name.to_string())) {
            Entry::Occupied(_) => {
                return Err(IrError::DuplicateVar {
                    method: self.program.method_name(method),
                    var: name.to_string(),
                })
            }
            Entry::Vacant(v) => {
                v.insert(id);
            }
        }
        self.program.vars.push(Var {
            name: name.to_string(),
            method,
        });
        self.program.methods[method].vars.push(id);
        Ok(id)
    }

    pub fn add_param(&mut self, method: MethodId, name: &str) -> Result<VarId, IrError> {
        let var = self.add_var(method, name)?;
        self.program.methods[method].params.push(var);
        Ok(var)
    }

    pub fn this_var(&self, method: MethodId) -> Result<VarId, IrError> {
        self.program.methods[method]
            .this_var
            .ok_or_else(|| IrError::NoThis(self.program.method_name(method)))
    }

    pub fn var_by_name(&self, method: MethodId, name: &str) -> Option<VarId> {
        self.var_names.get(&(method, name.to_string())).copied()
    }

    /// Appends `lhs = new ty` to the method body.
    pub fn add_new(&mut self, method: MethodId, lhs: VarId, ty: TypeId) -> AllocSiteId {
        let ordinal = self
            .program
            .alloc_sites
            .iter()
            .filter(|site| site.method == method)
            .count();
        let site = self.program.alloc_sites.push(AllocSite { method, ty, ordinal });
        self.program.methods[method].stmts.push(Stmt::New { lhs, site });
        site
    }

    /// Appends a call statement to the method body.
    pub fn add_call(
        &mut self,
        method: MethodId,
        kind: CallKind,
        callee: MethodRef,
        receiver: Option<VarId>,
        args: Vec<VarId>,
        result: Option<VarId>,
    ) -> CallSiteId {
        let ordinal = self
            .program
            .call_sites
            .iter()
            .filter(|cs| cs.container == method)
            .count();
        let cs = self.program.call_sites.push(CallSite {
            container: method,
            kind,
            callee,
            receiver,
            args,
            result,
            ordinal,
        });
        self.program.methods[method].stmts.push(Stmt::Invoke(cs));
        cs
    }

    /// Appends any other statement to the method body.
    pub fn add_stmt(&mut self, method: MethodId, stmt: Stmt) {
        self.program.methods[method].stmts.push(stmt);
    }

    pub fn add_entry(&mut self, method: MethodId) {
        if !self.program.entry_methods.contains(&method) {
            self.program.entry_methods.push(method);
        }
    }

    /// Validates the program and freezes it.
    pub fn build(mut self) -> Result<Program, IrError> {
        let method_ids: Vec<MethodId> = self.program.methods.indices().collect();
        for method in method_ids {
            self.validate_method(method)?;
            self.collect_return_vars(method)?;
        }
        for entry in &self.program.entry_methods {
            if self.program.methods.get(*entry).is_none() {
                return Err(IrError::UnknownMethod(format!("{:?}", entry)));
            }
        }
        info!(
            "Built program: {} types, {} methods, {} call sites, {} allocation sites",
            self.program.types.len(),
            self.program.methods.len(),
            self.program.call_sites.len(),
            self.program.alloc_sites.len()
        );
        Ok(self.program)
    }

    fn collect_return_vars(&mut self, method: MethodId) -> Result<(), IrError> {
        let m = &self.program.methods[method];
        if m.is_native {
            if m.return_type.is_some() {
                let ret = self.add_var(method, "$ret")?;
                self.program.methods[method].return_vars.push(ret);
            }
            return Ok(());
        }
        let mut return_vars = Vec::new();
        for stmt in &m.stmts {
            if let Stmt::Return(Some(var)) = stmt {
                if !return_vars.contains(var) {
                    return_vars.push(*var);
                }
            }
        }
        self.program.methods[method].return_vars = return_vars;
        Ok(())
    }

    fn validate_method(&self, method: MethodId) -> Result<(), IrError> {
        let program = &self.program;
        let m = &program.methods[method];
        if !m.has_body() && !m.stmts.is_empty() {
            return Err(IrError::UnexpectedBody(program.method_name(method)));
        }
        for stmt in &m.stmts {
            for var in stmt.local_vars() {
                self.check_var(method, var)?;
            }
            match stmt {
                Stmt::New { site, .. } => match program.alloc_sites.get(*site) {
                    Some(alloc) if alloc.method == method => {}
                    _ => return Err(self.invalid_id(method, site)),
                },
                Stmt::Cast { ty, .. } => {
                    if program.types.get(*ty).is_none() {
                        return Err(self.invalid_id(method, ty));
                    }
                }
                Stmt::LoadStatic { field, .. } | Stmt::StoreStatic { field, .. } => {
                    self.check_field(method, *field, true)?
                }
                Stmt::LoadField { field, .. } | Stmt::StoreField { field, .. } => {
                    self.check_field(method, *field, false)?
                }
                Stmt::Invoke(cs) => self.check_call_site(method, *cs)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn check_var(&self, method: MethodId, var: VarId) -> Result<(), IrError> {
        match self.program.vars.get(var) {
            None => Err(IrError::UndeclaredVar {
                method: self.program.method_name(method),
                var: format!("{:?}", var),
            }),
            Some(v) if v.method != method => Err(IrError::ForeignVar {
                method: self.program.method_name(method),
                var: self.program.var_name(var),
            }),
            Some(_) => Ok(()),
        }
    }

    fn check_field(&self, method: MethodId, field: FieldId, is_static: bool) -> Result<(), IrError> {
        match self.program.fields.get(field) {
            None => Err(self.invalid_id(method, &field)),
            Some(f) if f.is_static != is_static => Err(IrError::FieldKindMismatch {
                field: self.program.field_name(field),
                expected: if is_static { "a static" } else { "an instance" },
            }),
            Some(_) => Ok(()),
        }
    }

    fn check_call_site(&self, method: MethodId, cs: CallSiteId) -> Result<(), IrError> {
        let program = &self.program;
        let Some(call) = program.call_sites.get(cs) else {
            return Err(self.invalid_id(method, &cs));
        };
        if call.container != method {
            return Err(self.invalid_id(method, &cs));
        }
        if program.types.get(call.callee.declaring_type).is_none() {
            return Err(self.invalid_id(method, &call.callee.declaring_type));
        }
        let malformed = |reason| IrError::MalformedCall {
            call: program.call_site_name(cs),
            reason,
        };
        match (call.kind.has_receiver(), call.receiver) {
            (true, None) => return Err(malformed("instance call without receiver")),
            (false, Some(_)) => return Err(malformed("receiver on a call without dispatch")),
            _ => {}
        }
        for var in call.receiver.iter().chain(&call.args).chain(&call.result) {
            self.check_var(method, *var)?;
        }
        Ok(())
    }

    fn invalid_id(&self, method: MethodId, id: &dyn std::fmt::Debug) -> IrError {
        IrError::InvalidId {
            method: self.program.method_name(method),
            id: format!("{:?}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_builder() -> (ProgramBuilder, TypeId, MethodId) {
        let mut b = ProgramBuilder::new();
        let object = b.add_type("Object", None).unwrap();
        let main = b
            .add_method(
                object,
                "main()",
                MethodFlags {
                    is_static: true,
                    ..Default::default()
                },
            )
            .unwrap();
        (b, object, main)
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let (mut b, object, main) = simple_builder();
        assert!(matches!(b.add_type("Object", None), Err(IrError::DuplicateType(_))));
        assert!(matches!(
            b.add_method(object, "main()", MethodFlags::default()),
            Err(IrError::DuplicateMethod(_))
        ));
        b.add_var(main, "x").unwrap();
        assert!(matches!(b.add_var(main, "x"), Err(IrError::DuplicateVar { .. })));
    }

    #[test]
    fn foreign_variable_is_malformed() {
        let (mut b, object, main) = simple_builder();
        let other = b.add_method(object, "other()", MethodFlags::default()).unwrap();
        let x = b.add_var(main, "x").unwrap();
        let y = b.add_var(other, "y").unwrap();
        b.add_stmt(main, Stmt::Copy { lhs: x, rhs: y });
        assert!(matches!(b.build(), Err(IrError::ForeignVar { .. })));
    }

    #[test]
    fn static_call_with_receiver_is_malformed() {
        let (mut b, object, main) = simple_builder();
        let x = b.add_var(main, "x").unwrap();
        b.add_call(
            main,
            CallKind::Static,
            MethodRef {
                declaring_type: object,
                subsignature: "main()".to_string(),
            },
            Some(x),
            vec![],
            None,
        );
        assert!(matches!(b.build(), Err(IrError::MalformedCall { .. })));
    }

    #[test]
    fn return_vars_are_collected() {
        let (mut b, object, main) = simple_builder();
        let x = b.add_var(main, "x").unwrap();
        b.add_new(main, x, object);
        b.add_stmt(main, Stmt::Return(Some(x)));
        b.add_stmt(main, Stmt::Return(Some(x)));
        let native = b
            .add_method(
                object,
                "clone()",
                MethodFlags {
                    is_native: true,
                    ..Default::default()
                },
            )
            .unwrap();
        b.set_return_type(native, object);
        let program = b.build().unwrap();
        assert_eq!(program.get_method(main).return_vars, vec![x]);
        assert_eq!(program.get_method(native).return_vars.len(), 1);
    }
}
