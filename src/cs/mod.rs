// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Abstract objects and context-sensitive elements.
//!
//! Every element is interned: asking twice for the same (element, context) pair
//! returns the same id, and the id is what the pointer flow graph and the call
//! graph are keyed by.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use rustc_index::{Idx, IndexVec};

use crate::context::ContextId;
use crate::ir::{AllocSiteId, CallSiteId, MethodId, Program, TypeId, VarId};

rustc_index::newtype_index! {
    /// The unique identifier for each abstract object.
    #[orderable]
    #[debug_format = "ObjId({})"]
    pub struct ObjId {}
}

rustc_index::newtype_index! {
    #[orderable]
    #[debug_format = "CSVarId({})"]
    pub struct CSVarId {}
}

rustc_index::newtype_index! {
    #[orderable]
    #[debug_format = "CSObjId({})"]
    pub struct CSObjId {}
}

rustc_index::newtype_index! {
    #[orderable]
    #[debug_format = "CSMethodId({})"]
    pub struct CSMethodId {}
}

rustc_index::newtype_index! {
    #[orderable]
    #[debug_format = "CSCallSiteId({})"]
    pub struct CSCallSiteId {}
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjKind {
    /// The objects created by an allocation site.
    Alloc(AllocSiteId),
    /// An object synthesized outside of the program, e.g. the result of a
    /// native method. Mock objects are identified by their description and type.
    Mock(String),
}

/// An abstract heap object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Obj {
    pub kind: ObjKind,
    pub ty: TypeId,
    pub container_method: Option<MethodId>,
    /// Declaring type of the allocating method. Type-sensitive selectors use it.
    pub container_type: Option<TypeId>,
}

impl Obj {
    pub fn alloc_site(&self) -> Option<AllocSiteId> {
        match self.kind {
            ObjKind::Alloc(site) => Some(site),
            ObjKind::Mock(_) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSVar {
    pub cid: ContextId,
    pub var: VarId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSObj {
    /// The heap context.
    pub cid: ContextId,
    pub obj: ObjId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSMethod {
    pub cid: ContextId,
    pub method: MethodId,
}

/// A call site under the context of its containing method.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CSCallSite {
    pub cid: ContextId,
    pub callsite: CallSiteId,
}

/// Get-or-create arena: an element's id is its position in the arena.
pub struct Interner<I: Idx, T> {
    elems: IndexVec<I, T>,
    index_map: HashMap<T, I>,
}

impl<I: Idx, T> fmt::Debug for Interner<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interner({} elements)", self.elems.len())
    }
}

impl<I: Idx, T: Clone + Eq + Hash> Default for Interner<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Idx, T: Clone + Eq + Hash> Interner<I, T> {
    pub fn new() -> Self {
        Interner {
            elems: IndexVec::new(),
            index_map: HashMap::new(),
        }
    }

    /// Returns the id of `elem`, interning it first if necessary.
    pub fn intern(&mut self, elem: T) -> I {
        if let Some(id) = self.index_map.get(&elem) {
            return *id;
        }
        let id = self.elems.push(elem.clone());
        self.index_map.insert(elem, id);
        id
    }

    pub fn lookup(&self, elem: &T) -> Option<I> {
        self.index_map.get(elem).copied()
    }

    #[inline]
    pub fn get(&self, id: I) -> &T {
        &self.elems[id]
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn iter_enumerated(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.elems.iter_enumerated()
    }
}

/// Owns all abstract objects and context-sensitive elements of an analysis run.
#[derive(Debug, Default)]
pub struct CSManager {
    objs: Interner<ObjId, Obj>,
    cs_vars: Interner<CSVarId, CSVar>,
    cs_objs: Interner<CSObjId, CSObj>,
    cs_methods: Interner<CSMethodId, CSMethod>,
    cs_callsites: Interner<CSCallSiteId, CSCallSite>,
}

impl CSManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The abstract object of an allocation site.
    pub fn alloc_obj(&mut self, program: &Program, site: AllocSiteId) -> ObjId {
        let alloc = program.get_alloc_site(site);
        self.objs.intern(Obj {
            kind: ObjKind::Alloc(site),
            ty: alloc.ty,
            container_method: Some(alloc.method),
            container_type: Some(program.get_method(alloc.method).declaring_type),
        })
    }

    pub fn mock_obj(&mut self, desc: &str, ty: TypeId, container_method: Option<MethodId>) -> ObjId {
        self.objs.intern(Obj {
            kind: ObjKind::Mock(desc.to_string()),
            ty,
            container_method,
            container_type: None,
        })
    }

    #[inline]
    pub fn get_obj(&self, id: ObjId) -> &Obj {
        self.objs.get(id)
    }

    pub fn get_cs_var(&mut self, cid: ContextId, var: VarId) -> CSVarId {
        self.cs_vars.intern(CSVar { cid, var })
    }

    pub fn find_cs_var(&self, cid: ContextId, var: VarId) -> Option<CSVarId> {
        self.cs_vars.lookup(&CSVar { cid, var })
    }

    #[inline]
    pub fn cs_var(&self, id: CSVarId) -> CSVar {
        *self.cs_vars.get(id)
    }

    pub fn get_cs_obj(&mut self, cid: ContextId, obj: ObjId) -> CSObjId {
        self.cs_objs.intern(CSObj { cid, obj })
    }

    #[inline]
    pub fn cs_obj(&self, id: CSObjId) -> CSObj {
        *self.cs_objs.get(id)
    }

    pub fn get_cs_method(&mut self, cid: ContextId, method: MethodId) -> CSMethodId {
        self.cs_methods.intern(CSMethod { cid, method })
    }

    pub fn find_cs_method(&self, cid: ContextId, method: MethodId) -> Option<CSMethodId> {
        self.cs_methods.lookup(&CSMethod { cid, method })
    }

    #[inline]
    pub fn cs_method(&self, id: CSMethodId) -> CSMethod {
        *self.cs_methods.get(id)
    }

    pub fn get_cs_callsite(&mut self, cid: ContextId, callsite: CallSiteId) -> CSCallSiteId {
        self.cs_callsites.intern(CSCallSite { cid, callsite })
    }

    #[inline]
    pub fn cs_callsite(&self, id: CSCallSiteId) -> CSCallSite {
        *self.cs_callsites.get(id)
    }

    /// The context-sensitive method containing a context-sensitive call site.
    pub fn callsite_container(&mut self, program: &Program, id: CSCallSiteId) -> CSMethodId {
        let cs = self.cs_callsite(id);
        let container = program.get_call_site(cs.callsite).container;
        self.get_cs_method(cs.cid, container)
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }

    pub fn num_cs_vars(&self) -> usize {
        self.cs_vars.len()
    }

    pub fn num_cs_objs(&self) -> usize {
        self.cs_objs.len()
    }

    pub fn num_cs_methods(&self) -> usize {
        self.cs_methods.len()
    }

    pub fn objs(&self) -> impl Iterator<Item = (ObjId, &Obj)> + '_ {
        self.objs.iter_enumerated()
    }

    pub fn cs_vars(&self) -> impl Iterator<Item = (CSVarId, &CSVar)> + '_ {
        self.cs_vars.iter_enumerated()
    }

    pub fn cs_methods(&self) -> impl Iterator<Item = (CSMethodId, &CSMethod)> + '_ {
        self.cs_methods.iter_enumerated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_are_interned_by_element_and_context() {
        let mut csm = CSManager::new();
        let c0 = ContextId::EMPTY;
        let c1 = ContextId::from_u32(1);
        let v = VarId::from_u32(3);
        let a = csm.get_cs_var(c0, v);
        assert_eq!(csm.get_cs_var(c0, v), a);
        let b = csm.get_cs_var(c1, v);
        assert_ne!(a, b);
        assert_eq!(csm.find_cs_var(c1, v), Some(b));
        assert_eq!(csm.cs_var(b), CSVar { cid: c1, var: v });

        let m = MethodId::from_u32(0);
        assert_eq!(csm.get_cs_method(c1, m), csm.get_cs_method(c1, m));
        assert_eq!(csm.find_cs_method(c0, m), None);

        let cs = CallSiteId::from_u32(7);
        assert_eq!(csm.get_cs_callsite(c0, cs), csm.get_cs_callsite(c0, cs));
        assert_eq!(csm.num_cs_vars(), 2);
        assert_eq!(csm.num_cs_methods(), 1);
    }

    #[test]
    fn mock_objects_are_identified_by_description_and_type() {
        let mut csm = CSManager::new();
        let t0 = TypeId::from_u32(0);
        let t1 = TypeId::from_u32(1);
        let a = csm.mock_obj("native-result", t0, None);
        assert_eq!(csm.mock_obj("native-result", t0, None), a);
        assert_ne!(csm.mock_obj("native-result", t1, None), a);
        assert_eq!(csm.get_obj(a).alloc_site(), None);
        let o = csm.get_cs_obj(ContextId::EMPTY, a);
        assert_eq!(csm.get_cs_obj(ContextId::EMPTY, a), o);
        assert_eq!(csm.cs_obj(o).obj, a);
    }
}
