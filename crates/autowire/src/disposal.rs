// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{Level, event};

use crate::descriptor::Disposer;
use crate::{AggregatedDisposalError, DisposalFailure, DisposeError, Instance, ScopeId, ServiceKey};

/// Releases resources held by a component when its owning scope is torn down.
///
/// Implementations opt in through [`ImplementationDescriptor::disposable`][crate::ImplementationDescriptor::disposable]
/// or [`ImplementationDescriptor::disposable_as`][crate::ImplementationDescriptor::disposable_as].
/// `dispose` is called at most once per instance, after every instance created later in the same
/// scope has been disposed.
pub trait Dispose {
    /// Releases the resources held by `self`.
    fn dispose(&self) -> Result<(), DisposeError>;
}

impl<T: Dispose + ?Sized> Dispose for Arc<T> {
    fn dispose(&self) -> Result<(), DisposeError> {
        (**self).dispose()
    }
}

/// A disposable instance owned by a scope.
pub(crate) struct TrackedInstance {
    pub(crate) key: ServiceKey,
    pub(crate) instance: Instance,
    pub(crate) disposer: Disposer,
}

impl TrackedInstance {
    fn dispose(&self, scope: ScopeId, position: usize) -> Result<(), DisposalFailure> {
        (self.disposer)(&self.instance).map_err(|error| {
            event!(
                Level::WARN,
                message = "failed to dispose instance",
                scope = %scope,
                key = %self.key,
                implementation = %self.instance.implementation(),
                error = %error,
            );

            DisposalFailure {
                key: self.key.clone(),
                implementation: self.instance.implementation().clone(),
                position,
                error,
            }
        })
    }
}

impl Debug for TrackedInstance {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedInstance")
            .field("key", &self.key)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

/// Disposable instances of one scope, in creation order.
#[derive(Debug, Default)]
pub(crate) struct DisposalTracker {
    tracked: Mutex<Vec<TrackedInstance>>,
}

impl DisposalTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track(&self, instance: TrackedInstance) {
        self.tracked.lock().push(instance);
    }

    /// Stops tracking `instance` and disposes it right away.
    ///
    /// Returns `None` when the instance is not tracked here, for example because the scope was
    /// torn down in the meantime.
    pub(crate) fn revoke(&self, instance: &Instance, scope: ScopeId) -> Option<DisposalFailure> {
        let (position, tracked) = {
            let mut tracked = self.tracked.lock();
            let position = tracked.iter().rposition(|entry| entry.instance.ptr_eq(instance))?;
            (position, tracked.remove(position))
        };

        tracked.dispose(scope, position).err()
    }

    pub(crate) fn len(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Disposes every tracked instance, newest first.
    ///
    /// Teardown never stops early: every failure is recorded and reported together.
    pub(crate) fn dispose_all(&self, scope: ScopeId) -> Result<(), AggregatedDisposalError> {
        let tracked = std::mem::take(&mut *self.tracked.lock());
        let failures = dispose_in_reverse(&tracked, scope);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregatedDisposalError::new(scope, failures))
        }
    }
}

/// Disposes `instances` newest first and returns the failures in disposal order.
fn dispose_in_reverse(instances: &[TrackedInstance], scope: ScopeId) -> Vec<DisposalFailure> {
    instances
        .iter()
        .enumerate()
        .rev()
        .filter_map(|(position, tracked)| tracked.dispose(scope, position).err())
        .collect()
}
