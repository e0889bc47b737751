// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Method resolution and subtyping.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::{CallKind, CallSiteId, MethodId, Program, TypeId};

/// Resolves the target of a call site. The solver never looks up methods by
/// itself, so tests can substitute a fake resolver.
pub trait DispatchResolver {
    /// Resolves the callee of `callsite`. `recv_type` is the type of the receiver
    /// object for calls that have one. Returns `None` if no applicable method exists.
    fn resolve_callee(&self, recv_type: Option<TypeId>, callsite: CallSiteId) -> Option<MethodId>;

    /// Returns true if `sub` is `sup` or one of its subtypes.
    fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool;
}

/// The default resolver, built from the type declarations of a [`Program`].
pub struct ClassHierarchy<'p> {
    program: &'p Program,
    dispatch_cache: RefCell<HashMap<(Option<TypeId>, CallSiteId), Option<MethodId>>>,
    subtype_cache: RefCell<HashMap<(TypeId, TypeId), bool>>,
}

impl<'p> ClassHierarchy<'p> {
    pub fn new(program: &'p Program) -> Self {
        ClassHierarchy {
            program,
            dispatch_cache: RefCell::new(HashMap::new()),
            subtype_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Virtual dispatch: the first concrete method with `subsignature` found on the
    /// superclass chain of `ty`, falling back to default methods of its interfaces.
    pub fn dispatch(&self, ty: TypeId, subsignature: &str) -> Option<MethodId> {
        let mut cur = Some(ty);
        while let Some(t) = cur {
            if let Some(m) = self.concrete_method(t, subsignature) {
                return Some(m);
            }
            cur = self.program.get_type(t).super_type;
        }
        self.default_method(ty, subsignature)
    }

    /// Looks a method up from `ty` upwards, accepting abstract declarations only
    /// when no concrete one exists.
    pub fn lookup(&self, ty: TypeId, subsignature: &str) -> Option<MethodId> {
        let mut cur = Some(ty);
        let mut declared = None;
        while let Some(t) = cur {
            if let Some(m) = self.program.declared_method(t, subsignature) {
                if !self.program.get_method(m).is_abstract {
                    return Some(m);
                }
                declared.get_or_insert(m);
            }
            cur = self.program.get_type(t).super_type;
        }
        self.default_method(ty, subsignature).or(declared)
    }

    fn concrete_method(&self, ty: TypeId, subsignature: &str) -> Option<MethodId> {
        self.program
            .declared_method(ty, subsignature)
            .filter(|m| !self.program.get_method(*m).is_abstract)
    }

    fn default_method(&self, ty: TypeId, subsignature: &str) -> Option<MethodId> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        let mut cur = Some(ty);
        while let Some(t) = cur {
            stack.extend(self.program.get_type(t).interfaces.iter().copied());
            cur = self.program.get_type(t).super_type;
        }
        while let Some(interface) = stack.pop() {
            if !visited.insert(interface) {
                continue;
            }
            if let Some(m) = self.concrete_method(interface, subsignature) {
                return Some(m);
            }
            stack.extend(self.program.get_type(interface).interfaces.iter().copied());
        }
        None
    }

    fn compute_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![sub];
        while let Some(t) = stack.pop() {
            if t == sup {
                return true;
            }
            if !visited.insert(t) {
                continue;
            }
            let ty = self.program.get_type(t);
            stack.extend(ty.super_type);
            stack.extend(ty.interfaces.iter().copied());
        }
        false
    }
}

impl<'p> DispatchResolver for ClassHierarchy<'p> {
    fn resolve_callee(&self, recv_type: Option<TypeId>, callsite: CallSiteId) -> Option<MethodId> {
        let key = (recv_type, callsite);
        if let Some(resolved) = self.dispatch_cache.borrow().get(&key) {
            return *resolved;
        }
        let cs = self.program.get_call_site(callsite);
        let declared = cs.callee.declaring_type;
        let subsig = cs.callee.subsignature.as_str();
        let resolved = match cs.kind {
            CallKind::Virtual | CallKind::Interface => {
                recv_type.and_then(|ty| self.dispatch(ty, subsig))
            }
            CallKind::Special | CallKind::Static => self
                .lookup(declared, subsig)
                .filter(|m| !self.program.get_method(*m).is_abstract),
            CallKind::Dynamic => self.program.declared_method(declared, subsig),
        };
        self.dispatch_cache.borrow_mut().insert(key, resolved);
        resolved
    }

    fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        if let Some(res) = self.subtype_cache.borrow().get(&(sub, sup)) {
            return *res;
        }
        let res = self.compute_subtype(sub, sup);
        self.subtype_cache.borrow_mut().insert((sub, sup), res);
        res
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ir::loader::program_from_value;

    fn hierarchy_program() -> Program {
        program_from_value(json!({
            "types": [
                { "name": "Object", "methods": [{ "sig": "hashCode()", "native": true }] },
                { "name": "I", "interface": true,
                  "methods": [{ "sig": "run()" }, { "sig": "dflt()", "body": [{ "op": "return" }] }] },
                { "name": "A", "super": "Object", "interfaces": ["I"],
                  "methods": [{ "sig": "run()", "body": [{ "op": "return" }] }] },
                { "name": "B", "super": "A",
                  "methods": [{ "sig": "hashCode()", "body": [{ "op": "return" }] }] },
                { "name": "Main", "super": "Object",
                  "methods": [{
                      "sig": "main()", "static": true, "vars": ["x"],
                      "body": [
                          { "op": "new", "lhs": "x", "type": "B" },
                          { "op": "invoke", "kind": "virtual", "callee": "Object.hashCode()", "recv": "x" },
                          { "op": "invoke", "kind": "interface", "callee": "I.run()", "recv": "x" },
                          { "op": "invoke", "kind": "interface", "callee": "I.dflt()", "recv": "x" }
                      ]
                  }] }
            ],
            "entries": ["Main.main()"]
        }))
        .unwrap()
    }

    #[test]
    fn virtual_dispatch_follows_the_receiver_type() {
        let program = hierarchy_program();
        let ch = ClassHierarchy::new(&program);
        let calls: Vec<_> = program.call_sites().map(|(id, _)| id).collect();
        let a = program.type_by_name("A").unwrap();
        let b = program.type_by_name("B").unwrap();

        let on_b = ch.resolve_callee(Some(b), calls[0]).unwrap();
        assert_eq!(program.method_name(on_b), "B.hashCode()");
        let on_a = ch.resolve_callee(Some(a), calls[0]).unwrap();
        assert_eq!(program.method_name(on_a), "Object.hashCode()");

        let run = ch.resolve_callee(Some(b), calls[1]).unwrap();
        assert_eq!(program.method_name(run), "A.run()");
        let dflt = ch.resolve_callee(Some(b), calls[2]).unwrap();
        assert_eq!(program.method_name(dflt), "I.dflt()");

        assert_eq!(ch.resolve_callee(None, calls[0]), None);
    }

    #[test]
    fn subtyping_covers_classes_and_interfaces() {
        let program = hierarchy_program();
        let ch = ClassHierarchy::new(&program);
        let ty = |name| program.type_by_name(name).unwrap();
        assert!(ch.is_subtype(ty("B"), ty("Object")));
        assert!(ch.is_subtype(ty("B"), ty("I")));
        assert!(!ch.is_subtype(ty("Main"), ty("I")));
        assert!(!ch.is_subtype(ty("A"), ty("B")));
    }
}
