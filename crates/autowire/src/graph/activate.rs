// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use tracing::{Level, event};

use crate::disposal::TrackedInstance;
use crate::graph::{PlannedArgument, ResolutionNode};
use crate::scope::ScopeState;
use crate::{Argument, Arguments, Instance, Lifetime, ResolveError};

/// Builds instances from a plan, bottom-up.
///
/// Singleton nodes and everything below them are owned by the root scope; other nodes are owned
/// by the scope the resolution was requested in. Disposables are tracked by their owner as soon as
/// they are constructed, so teardown follows construction order exactly.
pub(crate) struct Activation<'a> {
    root: &'a ScopeState,
    scope: &'a ScopeState,
}

impl<'a> Activation<'a> {
    pub(crate) fn new(root: &'a ScopeState, scope: &'a ScopeState) -> Self {
        Self { root, scope }
    }

    /// Builds the instance planned by `node`.
    ///
    /// Disposable transients created by a failing call are disposed before the error is returned.
    pub(crate) fn build(&self, node: &ResolutionNode) -> Result<Instance, ResolveError> {
        let mut created = Vec::new();
        let result = self.instantiate(node, false, &mut created);

        settle(&created, result)
    }

    /// Builds every node in order, as one unit: if any node fails, nothing created by the call is kept.
    pub(crate) fn build_all(&self, nodes: &[Arc<ResolutionNode>]) -> Result<Vec<Instance>, ResolveError> {
        let mut created = Vec::new();
        let result: Result<Vec<_>, _> = nodes
            .iter()
            .map(|node| self.instantiate(node, false, &mut created))
            .collect();

        settle(&created, result)
    }

    fn instantiate(&self, node: &ResolutionNode, in_singleton: bool, created: &mut Vec<Created<'a>>) -> Result<Instance, ResolveError> {
        let in_singleton = in_singleton || node.lifetime == Lifetime::Singleton;

        let Some(slot) = &node.slot else {
            return self.construct(node, in_singleton, created);
        };

        let owner = if in_singleton { self.root } else { self.scope };
        owner.cache.get_or_create(slot, || {
            let mut owned = Vec::new();
            let result = self.construct(node, in_singleton, &mut owned);
            settle(&owned, result)
        })
    }

    fn construct(&self, node: &ResolutionNode, in_singleton: bool, created: &mut Vec<Created<'a>>) -> Result<Instance, ResolveError> {
        let arguments = node
            .arguments
            .iter()
            .map(|argument| match argument {
                PlannedArgument::Service(child) | PlannedArgument::Decoratee(child) => {
                    self.instantiate(child, in_singleton, created).map(Argument::Service)
                }
                PlannedArgument::Value { value, .. } => Ok(Argument::Value(value.clone())),
            })
            .collect::<Result<Arguments, _>>()?;

        let value = (node.activator)(&arguments).map_err(|source| ResolveError::Activation {
            key: node.key.clone(),
            implementation: node.implementation.clone(),
            source,
        })?;

        let instance = Instance::from_shared(node.implementation.clone(), value);
        let owner = if in_singleton { self.root } else { self.scope };
        let scope = owner.id();

        event!(
            Level::TRACE,
            message = "instance constructed",
            key = %node.key,
            implementation = %node.implementation,
            lifetime = %node.lifetime,
            scope = %scope,
        );

        if let Some(disposer) = &node.disposer {
            owner.tracker.track(TrackedInstance {
                key: node.key.clone(),
                instance: instance.clone(),
                disposer: Arc::clone(disposer),
            });
            created.push(Created {
                owner,
                instance: instance.clone(),
            });
        }

        Ok(instance)
    }
}

/// A disposable constructed by the current call, already tracked by its owner.
struct Created<'a> {
    owner: &'a ScopeState,
    instance: Instance,
}

/// Keeps what a successful call created, or revokes and disposes it newest first on failure.
fn settle<T>(created: &[Created<'_>], result: Result<T, ResolveError>) -> Result<T, ResolveError> {
    if result.is_err() {
        for entry in created.iter().rev() {
            // Disposal failures are logged where they happen.
            let _failure = entry.owner.tracker.revoke(&entry.instance, entry.owner.id());
        }
    }

    result
}
