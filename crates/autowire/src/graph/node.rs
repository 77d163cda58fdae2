// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use crate::descriptor::{Activator, Disposer};
use crate::lifetime::SlotKey;
use crate::{BindingId, Lifetime, ServiceKey, TypeName, Value};

/// Role of a node within a binding's decorator chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The implementation of the binding itself.
    Implementation,
    /// A decorator wrapping the next node of the chain.
    Decorator,
}

/// One planned constructor argument.
#[derive(Clone, Debug)]
pub enum PlannedArgument {
    /// A dependency built from its own node.
    Service(Arc<ResolutionNode>),
    /// The instance a decorator wraps.
    Decoratee(Arc<ResolutionNode>),
    /// A supplied or defaulted value.
    Value {
        /// Parameter name.
        name: Arc<str>,
        /// The value passed to the constructor.
        value: Value,
    },
}

/// A planned construction step: which implementation is built for a key, with which constructor
/// and from which arguments.
///
/// Plans are produced without running any constructor, so a plan error never leaves partially
/// built instances behind. [`Container::explain`][crate::Container::explain] exposes the plan of a
/// key; its `Display` form is an indented tree.
///
/// ```text
/// Corp.IFoo => Corp.FooLogger [transient, decorator, constructor #0]
///   (decoratee) Corp.IFoo => Corp.Foo [transient, constructor #1]
///     Corp.IBar => Corp.Bar [singleton, cached, constructor #0]
///     region = "west"
/// ```
#[derive(Clone)]
pub struct ResolutionNode {
    pub(crate) key: ServiceKey,
    pub(crate) binding: BindingId,
    pub(crate) implementation: TypeName,
    pub(crate) kind: NodeKind,
    pub(crate) lifetime: Lifetime,
    pub(crate) constructor: usize,
    pub(crate) arguments: Vec<PlannedArgument>,
    pub(crate) slot: Option<SlotKey>,
    pub(crate) activator: Activator,
    pub(crate) disposer: Option<Disposer>,
}

impl ResolutionNode {
    /// The key the node is built for, carrying the name of the chosen binding.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// The binding that produced the node.
    #[must_use]
    pub fn binding(&self) -> BindingId {
        self.binding
    }

    /// The implementation type constructed by the node.
    #[must_use]
    pub fn implementation(&self) -> &TypeName {
        &self.implementation
    }

    /// Whether the node builds the binding's implementation or one of its decorators.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The lifetime of the binding.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Index of the selected constructor.
    #[must_use]
    pub fn constructor(&self) -> usize {
        self.constructor
    }

    /// The planned arguments, in parameter order.
    #[must_use]
    pub fn arguments(&self) -> &[PlannedArgument] {
        &self.arguments
    }

    /// Returns `true` if the node's instance goes through a lifetime cache.
    ///
    /// Only the outermost node of a decorator chain is cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.slot.is_some()
    }

    /// Returns `true` if instances built by the node are tracked for disposal.
    #[must_use]
    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    /// Child nodes, including the decoratee, in parameter order.
    pub fn dependencies(&self) -> impl Iterator<Item = &Self> {
        self.arguments.iter().filter_map(|argument| match argument {
            PlannedArgument::Service(node) | PlannedArgument::Decoratee(node) => Some(&**node),
            PlannedArgument::Value { .. } => None,
        })
    }

    /// Number of nodes in the tree rooted at this node.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.dependencies().map(Self::node_count).sum::<usize>()
    }

    /// Length of the longest chain from this node to a leaf.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.dependencies().map(Self::depth).max().unwrap_or(0)
    }

    fn write_tree(&self, f: &mut Formatter<'_>, indent: usize, label: &str) -> fmt::Result {
        write!(
            f,
            "{:indent$}{label}{} => {} [{}",
            "",
            self.key,
            self.implementation,
            self.lifetime,
            indent = indent * 2
        )?;

        if self.kind == NodeKind::Decorator {
            f.write_str(", decorator")?;
        }
        if self.is_cached() {
            f.write_str(", cached")?;
        }
        writeln!(f, ", constructor #{}]", self.constructor)?;

        for argument in &self.arguments {
            match argument {
                PlannedArgument::Service(node) => node.write_tree(f, indent + 1, "")?,
                PlannedArgument::Decoratee(node) => node.write_tree(f, indent + 1, "(decoratee) ")?,
                PlannedArgument::Value { name, value } => writeln!(f, "{:indent$}{name} = {value}", "", indent = (indent + 1) * 2)?,
            }
        }

        Ok(())
    }
}

impl Display for ResolutionNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0, "")
    }
}

impl Debug for ResolutionNode {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionNode")
            .field("key", &self.key)
            .field("binding", &self.binding)
            .field("implementation", &self.implementation)
            .field("kind", &self.kind)
            .field("lifetime", &self.lifetime)
            .field("constructor", &self.constructor)
            .field("arguments", &self.arguments)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
