// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use super::{AllocSiteId, CallSiteId, FieldId, TypeId, VarId};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// The kind of a call site and of a call graph edge.
pub enum CallKind {
    /// Calls of static methods, resolved by the declared callee.
    Static,
    /// Constructor, private and super calls, resolved by the declared callee
    /// but still bound to each receiver object.
    Special,
    /// Calls resolved by dynamic dispatch on the receiver object's type.
    Virtual,
    /// Same as `Virtual`, through an interface method.
    Interface,
    /// Dynamically linked call sites, resolved by the declared callee.
    Dynamic,
}

impl CallKind {
    /// Returns true if calls of this kind are dispatched on a receiver object.
    #[inline]
    pub fn has_receiver(self) -> bool {
        matches!(self, CallKind::Special | CallKind::Virtual | CallKind::Interface)
    }
}

/// The pointer-relevant statements of a method body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `lhs = new T`
    New { lhs: VarId, site: AllocSiteId },
    /// `lhs = rhs`
    Copy { lhs: VarId, rhs: VarId },
    /// `lhs = (T) rhs`
    Cast { lhs: VarId, rhs: VarId, ty: TypeId },
    /// `lhs = T.f`
    LoadStatic { lhs: VarId, field: FieldId },
    /// `T.f = rhs`
    StoreStatic { field: FieldId, rhs: VarId },
    /// `lhs = base.f`
    LoadField { lhs: VarId, base: VarId, field: FieldId },
    /// `base.f = rhs`
    StoreField { base: VarId, field: FieldId, rhs: VarId },
    /// `lhs = base[*]`
    LoadArray { lhs: VarId, base: VarId },
    /// `base[*] = rhs`
    StoreArray { base: VarId, rhs: VarId },
    /// `[result =] [receiver.]m(args)`
    Invoke(CallSiteId),
    /// `return [var]`
    Return(Option<VarId>),
}

impl Stmt {
    /// Variables directly read or written by the statement. Call sites are
    /// checked separately as their operands live in the program's call site table.
    pub fn local_vars(&self) -> Vec<VarId> {
        match self {
            Stmt::New { lhs, .. } => vec![*lhs],
            Stmt::Copy { lhs, rhs } | Stmt::Cast { lhs, rhs, .. } => vec![*lhs, *rhs],
            Stmt::LoadStatic { lhs, .. } => vec![*lhs],
            Stmt::StoreStatic { rhs, .. } => vec![*rhs],
            Stmt::LoadField { lhs, base, .. } | Stmt::LoadArray { lhs, base } => vec![*lhs, *base],
            Stmt::StoreField { base, rhs, .. } | Stmt::StoreArray { base, rhs } => {
                vec![*base, *rhs]
            }
            Stmt::Invoke(_) => Vec::new(),
            Stmt::Return(var) => var.iter().copied().collect(),
        }
    }
}
