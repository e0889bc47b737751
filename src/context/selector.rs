// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Context selection policies.
//!
//! A selector is a pure function of its inputs: the same caller context, call
//! site, receiver and callee always produce the same context. The solver interns
//! the returned contexts, so node identity stays stable across the run.

use std::rc::Rc;

use super::{ContextElem, Ctx};
use crate::cs::{Obj, ObjId};
use crate::ir::{CallSiteId, MethodId};

pub trait ContextSelector {
    fn name(&self) -> String;

    fn empty_context(&self) -> Rc<Ctx> {
        Ctx::new_empty()
    }

    /// Context of the callee of a call without receiver object.
    fn select_context(&self, caller_ctx: &Rc<Ctx>, callsite: CallSiteId, callee: MethodId) -> Rc<Ctx>;

    /// Context of the callee of a call dispatched on the receiver object `recv`,
    /// allocated under heap context `recv_ctx`.
    fn select_instance_context(
        &self,
        caller_ctx: &Rc<Ctx>,
        callsite: CallSiteId,
        recv_ctx: &Rc<Ctx>,
        recv: (ObjId, &Obj),
        callee: MethodId,
    ) -> Rc<Ctx>;

    /// Heap context of an object allocated by `method` under `method_ctx`.
    fn select_heap_context(&self, method_ctx: &Rc<Ctx>, method: MethodId, obj: &Obj) -> Rc<Ctx>;
}

/// Analyzes every method under the empty context.
#[derive(Debug, Default)]
pub struct ContextInsensitive;

impl ContextSelector for ContextInsensitive {
    fn name(&self) -> String {
        "ci".to_string()
    }

    fn select_context(&self, _caller_ctx: &Rc<Ctx>, _callsite: CallSiteId, _callee: MethodId) -> Rc<Ctx> {
        self.empty_context()
    }

    fn select_instance_context(
        &self,
        _caller_ctx: &Rc<Ctx>,
        _callsite: CallSiteId,
        _recv_ctx: &Rc<Ctx>,
        _recv: (ObjId, &Obj),
        _callee: MethodId,
    ) -> Rc<Ctx> {
        self.empty_context()
    }

    fn select_heap_context(&self, _method_ctx: &Rc<Ctx>, _method: MethodId, _obj: &Obj) -> Rc<Ctx> {
        self.empty_context()
    }
}

/// Default heap context depth for a method context depth `k`.
pub fn default_heap_depth(k: usize) -> usize {
    k.saturating_sub(1)
}

#[derive(Debug)]
pub struct KCallSiteSensitive {
    /// Context length limit for methods
    k: usize,
    /// Context length limit for heap objects
    hk: usize,
}

impl KCallSiteSensitive {
    pub fn new(k: usize) -> Self {
        Self::with_heap_depth(k, default_heap_depth(k))
    }

    pub fn with_heap_depth(k: usize, hk: usize) -> Self {
        KCallSiteSensitive { k, hk }
    }
}

impl ContextSelector for KCallSiteSensitive {
    fn name(&self) -> String {
        format!("{}-call-site-sensitive", self.k)
    }

    fn select_context(&self, caller_ctx: &Rc<Ctx>, callsite: CallSiteId, _callee: MethodId) -> Rc<Ctx> {
        Ctx::new_k_limited_context(caller_ctx, ContextElem::CallSite(callsite), self.k)
    }

    fn select_instance_context(
        &self,
        caller_ctx: &Rc<Ctx>,
        callsite: CallSiteId,
        _recv_ctx: &Rc<Ctx>,
        _recv: (ObjId, &Obj),
        callee: MethodId,
    ) -> Rc<Ctx> {
        self.select_context(caller_ctx, callsite, callee)
    }

    fn select_heap_context(&self, method_ctx: &Rc<Ctx>, _method: MethodId, _obj: &Obj) -> Rc<Ctx> {
        Ctx::k_limited_context(method_ctx, self.hk)
    }
}

/// Object sensitivity: the context of an instance method is its receiver object
/// prefixed to the receiver's heap context.
#[derive(Debug)]
pub struct KObjectSensitive {
    k: usize,
    hk: usize,
}

impl KObjectSensitive {
    pub fn new(k: usize) -> Self {
        Self::with_heap_depth(k, default_heap_depth(k))
    }

    pub fn with_heap_depth(k: usize, hk: usize) -> Self {
        KObjectSensitive { k, hk }
    }
}

impl ContextSelector for KObjectSensitive {
    fn name(&self) -> String {
        format!("{}-object-sensitive", self.k)
    }

    fn select_context(&self, caller_ctx: &Rc<Ctx>, _callsite: CallSiteId, _callee: MethodId) -> Rc<Ctx> {
        caller_ctx.clone()
    }

    fn select_instance_context(
        &self,
        _caller_ctx: &Rc<Ctx>,
        _callsite: CallSiteId,
        recv_ctx: &Rc<Ctx>,
        recv: (ObjId, &Obj),
        _callee: MethodId,
    ) -> Rc<Ctx> {
        Ctx::new_k_limited_context(recv_ctx, ContextElem::Object(recv.0), self.k)
    }

    fn select_heap_context(&self, method_ctx: &Rc<Ctx>, _method: MethodId, _obj: &Obj) -> Rc<Ctx> {
        Ctx::k_limited_context(method_ctx, self.hk)
    }
}

/// Type sensitivity: like object sensitivity, with each receiver object replaced
/// by the type declaring the method that allocated it.
#[derive(Debug)]
pub struct KTypeSensitive {
    k: usize,
    hk: usize,
}

impl KTypeSensitive {
    pub fn new(k: usize) -> Self {
        Self::with_heap_depth(k, default_heap_depth(k))
    }

    pub fn with_heap_depth(k: usize, hk: usize) -> Self {
        KTypeSensitive { k, hk }
    }
}

impl ContextSelector for KTypeSensitive {
    fn name(&self) -> String {
        format!("{}-type-sensitive", self.k)
    }

    fn select_context(&self, caller_ctx: &Rc<Ctx>, _callsite: CallSiteId, _callee: MethodId) -> Rc<Ctx> {
        caller_ctx.clone()
    }

    fn select_instance_context(
        &self,
        _caller_ctx: &Rc<Ctx>,
        _callsite: CallSiteId,
        recv_ctx: &Rc<Ctx>,
        recv: (ObjId, &Obj),
        _callee: MethodId,
    ) -> Rc<Ctx> {
        let (_, obj) = recv;
        let ty = obj.container_type.unwrap_or(obj.ty);
        Ctx::new_k_limited_context(recv_ctx, ContextElem::Type(ty), self.k)
    }

    fn select_heap_context(&self, method_ctx: &Rc<Ctx>, _method: MethodId, _obj: &Obj) -> Rc<Ctx> {
        Ctx::k_limited_context(method_ctx, self.hk)
    }
}
