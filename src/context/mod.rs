// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::hash::Hash;
use std::rc::Rc;

use rustc_index::IndexVec;

use crate::cs::ObjId;
use crate::ir::{CallSiteId, TypeId};

pub mod selector;

pub use self::selector::{
    default_heap_depth, ContextInsensitive, ContextSelector, KCallSiteSensitive, KObjectSensitive,
    KTypeSensitive,
};

rustc_index::newtype_index! {
    /// The unique identifier for each context.
    #[orderable]
    #[debug_format = "ContextId({})"]
    pub struct ContextId {}
}

impl ContextId {
    /// The id of the empty context, interned first by every [`ContextCache`].
    pub const EMPTY: ContextId = ContextId::from_u32(0);
}

pub trait ContextElement: Clone + Eq + PartialEq + Debug + Hash {}

/// An immutable sequence of context elements, most recent first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Context<E: ContextElement> {
    pub(crate) context_elems: Vec<E>,
}

impl<E: ContextElement> Debug for Context<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.context_elems.fmt(f)
    }
}

impl<E: ContextElement> Context<E> {
    pub fn new_empty() -> Rc<Self> {
        Rc::new(Context {
            context_elems: Vec::new(),
        })
    }

    pub fn new(context_elems: Vec<E>) -> Rc<Self> {
        Rc::new(Context { context_elems })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.context_elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.context_elems.is_empty()
    }

    pub fn elems(&self) -> &[E] {
        &self.context_elems
    }

    /// Compose a new context from a given context and a new context element.
    /// Discard the last old context element if the length of context exceeds the depth limit
    pub fn new_k_limited_context(old_ctx: &Rc<Context<E>>, elem: E, k: usize) -> Rc<Self> {
        let mut elems = Vec::with_capacity(k);
        if k > 0 {
            elems.push(elem);
            if old_ctx.len() < k {
                elems.extend_from_slice(&old_ctx.context_elems[..])
            } else {
                elems.extend_from_slice(&old_ctx.context_elems[..k - 1])
            }
        }
        Rc::new(Context { context_elems: elems })
    }

    pub fn k_limited_context(ctx: &Rc<Context<E>>, k: usize) -> Rc<Self> {
        if ctx.len() <= k {
            ctx.clone()
        } else {
            let elems = ctx.context_elems[..k].to_vec();
            Rc::new(Context { context_elems: elems })
        }
    }
}

/// Elements the shipped selectors build contexts from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContextElem {
    CallSite(CallSiteId),
    Object(ObjId),
    Type(TypeId),
}

impl ContextElement for ContextElem {}

pub type Ctx = Context<ContextElem>;

/// Interns contexts so that structurally equal contexts share one [`ContextId`].
#[derive(Debug)]
pub struct ContextCache<E: ContextElement> {
    context_list: IndexVec<ContextId, Rc<Context<E>>>,
    context_to_index_map: HashMap<Rc<Context<E>>, ContextId>,
}

impl<E: ContextElement> Default for ContextCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ContextElement> ContextCache<E> {
    pub fn new() -> ContextCache<E> {
        let mut cache = ContextCache {
            context_list: IndexVec::new(),
            context_to_index_map: HashMap::new(),
        };
        let empty = cache.get_context_id(&Context::new_empty());
        debug_assert_eq!(empty, ContextId::EMPTY);
        cache
    }

    pub fn get_context_id(&mut self, context: &Rc<Context<E>>) -> ContextId {
        if let Some(id) = self.context_to_index_map.get(context) {
            *id
        } else {
            let id = self.context_list.push(context.clone());
            self.context_to_index_map.insert(context.clone(), id);
            id
        }
    }

    /// Returns the context interned as `id`.
    ///
    /// Panics if `id` was not produced by this cache.
    pub fn get_context(&self, id: ContextId) -> Rc<Context<E>> {
        self.context_list[id].clone()
    }

    pub fn len(&self) -> usize {
        self.context_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context_list.is_empty()
    }
}
