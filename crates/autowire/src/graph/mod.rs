// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Graph building in two phases.
//!
//! Planning turns a requested key into a tree of [`ResolutionNode`]s: it picks bindings and
//! constructors, specializes open generics, applies decorator chains and detects cycles. Nothing
//! is constructed while planning. Activation then walks the plan bottom-up, going through the
//! lifetime caches and handing disposable instances to their owning scope.

mod activate;
mod node;
mod plan;

pub(crate) use activate::Activation;
pub use node::{NodeKind, PlannedArgument, ResolutionNode};
pub(crate) use plan::Planner;
