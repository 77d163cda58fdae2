// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{Level, event};

use crate::disposal::DisposalTracker;
use crate::lifetime::LifetimeCache;
use crate::{AggregatedDisposalError, Container, Instance, ResolveError, ServiceKey};

/// Identity of a scope within its container.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// The root scope, which owns singletons.
    pub const ROOT: Self = Self(0);

    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns `true` for the root scope.
    #[must_use]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

impl Debug for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({self})")
    }
}

/// Instances and disposables owned by one scope.
pub(crate) struct ScopeState {
    id: ScopeId,
    pub(crate) cache: LifetimeCache,
    pub(crate) tracker: DisposalTracker,
    disposed: AtomicBool,
}

impl ScopeState {
    pub(crate) fn new(id: ScopeId) -> Self {
        Self {
            id,
            cache: LifetimeCache::new(),
            tracker: DisposalTracker::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> ScopeId {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Disposes every tracked instance and forgets the cached ones. Only the first call does any work.
    pub(crate) fn dispose(&self) -> Result<(), AggregatedDisposalError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        event!(
            Level::DEBUG,
            message = "disposing scope",
            scope = %self.id,
            tracked = self.tracker.len(),
            cached = self.cache.len(),
        );

        let result = self.tracker.dispose_all(self.id);
        self.cache.clear();
        result
    }
}

impl Debug for ScopeState {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeState")
            .field("id", &self.id)
            .field("cached", &self.cache.len())
            .field("tracked", &self.tracker.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A unit of work that owns its scoped instances and the disposable transients resolved in it.
///
/// Scopes are cheap to clone; clones share the same instances. A scope is not disposed when
/// dropped, call [`Scope::dispose`] (or [`Container::dispose_scope`]) to tear it down.
///
/// # Examples
///
/// ```
/// use autowire::{Container, ConstructorDescriptor, ImplementationDescriptor, Lifetime, TypeName};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let container = Container::new();
/// container.register(
///     TypeName::new("Web", "IRequestContext"),
///     ImplementationDescriptor::new(TypeName::new("Web", "RequestContext"))
///         .constructor(ConstructorDescriptor::new([], |_| Ok(()))),
///     Lifetime::Scoped,
/// )?;
///
/// let scope = container.create_scope();
/// let first = scope.resolve(TypeName::new("Web", "IRequestContext"))?;
/// let second = scope.resolve(TypeName::new("Web", "IRequestContext"))?;
/// assert!(first.ptr_eq(&second));
///
/// scope.dispose()?;
/// assert!(scope.resolve(TypeName::new("Web", "IRequestContext")).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Scope {
    container: Container,
    state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(container: Container, state: Arc<ScopeState>) -> Self {
        Self { container, state }
    }

    /// The scope's identity.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.state.id()
    }

    /// Resolves `key` within this scope.
    pub fn resolve(&self, key: impl Into<ServiceKey>) -> Result<Instance, ResolveError> {
        self.container.resolve_in(key, self)
    }

    /// Resolves every binding of `key` within this scope.
    pub fn resolve_all(&self, key: impl Into<ServiceKey>) -> Result<Vec<Instance>, ResolveError> {
        self.container.resolve_all_in(key, self)
    }

    /// Disposes the disposable instances owned by this scope, newest first.
    ///
    /// Later calls return `Ok(())` without doing anything; resolving from a disposed scope fails.
    pub fn dispose(&self) -> Result<(), AggregatedDisposalError> {
        self.state.dispose()
    }

    /// Returns `true` once the scope has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    pub(crate) fn state(&self) -> &Arc<ScopeState> {
        &self.state
    }
}
