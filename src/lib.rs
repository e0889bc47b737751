// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! A context-sensitive pointer analysis for object-oriented programs.
//!
//! Points-to sets and the call graph are computed together by a worklist
//! [`Solver`](pta::Solver). Context sensitivity is chosen by a
//! [`ContextSelector`](context::ContextSelector) and the analysis is extended with
//! [`Plugin`](plugin::Plugin)s.

#![allow(
    clippy::single_match,
    clippy::needless_lifetimes,
    clippy::needless_return,
    clippy::len_zero
)]

pub mod context;
pub mod cs;
pub mod graph;
pub mod ir;
pub mod plugin;
pub mod pta;
pub mod pts_set;
pub mod util;
