// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{Level, event};

use crate::graph::{Activation, Planner, ResolutionNode};
use crate::registry::Registry;
use crate::scope::ScopeState;
use crate::{
    AggregatedDisposalError, BindingId, ContainerOptions, DecoratorDescriptor, Implementation, Instance, Lifetime,
    RegistrationError, ResolveError, Scope, ScopeId, ServiceKey, TypeName,
};

/// A dependency-injection container: the registry of bindings plus the root scope.
///
/// Containers are configured first and resolved afterwards. The first resolution (or an explicit
/// [`freeze`](Self::freeze)) freezes the registry; later registrations fail with
/// [`RegistrationError::RegistryFrozen`]. Resolution is synchronous and may run on many threads
/// at once. `Container` is a cheap handle; clones share the same registry and instances.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use autowire::{Container, ConstructorDescriptor, ImplementationDescriptor, Lifetime, Parameter, TypeName};
///
/// struct Bar;
/// struct Foo {
///     bar: Arc<Bar>,
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let container = Container::new();
///
/// container.register(
///     TypeName::new("Corp", "IFoo"),
///     ImplementationDescriptor::new(TypeName::new("Corp", "Foo")).constructor(ConstructorDescriptor::new(
///         [Parameter::service(TypeName::new("Corp", "IBar"))],
///         |args| Ok(Foo { bar: args.service::<Bar>(0)? }),
///     )),
///     Lifetime::Transient,
/// )?;
/// container.register(
///     TypeName::new("Corp", "IBar"),
///     ImplementationDescriptor::new(TypeName::new("Corp", "Bar"))
///         .constructor(ConstructorDescriptor::new([], |_| Ok(Bar))),
///     Lifetime::Singleton,
/// )?;
///
/// let foo = container.resolve(TypeName::new("Corp", "IFoo"))?;
/// assert!(foo.downcast::<Foo>().is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    options: ContainerOptions,
    staging: Mutex<Option<Registry>>,
    frozen: OnceCell<Arc<Registry>>,
    plans: RwLock<HashMap<ServiceKey, Arc<ResolutionNode>>>,
    root: Arc<ScopeState>,
    next_scope: AtomicU64,
}

impl Container {
    /// Creates an empty container with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    /// Creates an empty container with the given options.
    #[must_use]
    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                options,
                staging: Mutex::new(Some(Registry::default())),
                frozen: OnceCell::new(),
                plans: RwLock::new(HashMap::new()),
                root: Arc::new(ScopeState::new(ScopeId::ROOT)),
                next_scope: AtomicU64::new(1),
            }),
        }
    }

    /// The container's options.
    #[must_use]
    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Binds `key` to `implementation` with the given lifetime.
    ///
    /// Several bindings may share a key; they are resolved together by
    /// [`resolve_all`](Self::resolve_all), while [`resolve`](Self::resolve) needs them to be
    /// told apart by name.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen, the implementation declares no constructors, or an open
    /// generic implementation does not fit the key.
    pub fn register(
        &self,
        key: impl Into<ServiceKey>,
        implementation: impl Into<Implementation>,
        lifetime: Lifetime,
    ) -> Result<BindingId, RegistrationError> {
        let key = key.into();
        let mut staging = self.inner.staging.lock();
        let registry = staging
            .as_mut()
            .ok_or_else(|| RegistrationError::RegistryFrozen { key: key.clone() })?;

        registry.register(key, implementation.into(), lifetime)
    }

    /// Adds a decorator to the chain of `key`.
    ///
    /// A decorator registered on an unnamed key wraps every binding of the service; one registered
    /// on a named key wraps only that binding. Decorators apply in registration order, the first
    /// registered sits closest to the implementation.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen, the decorator wraps another interface, one of its
    /// constructors does not take exactly one wrapped instance, or it already decorates the key.
    pub fn register_decorator(&self, key: impl Into<ServiceKey>, decorator: DecoratorDescriptor) -> Result<(), RegistrationError> {
        let key = key.into();
        let mut staging = self.inner.staging.lock();
        let registry = staging
            .as_mut()
            .ok_or_else(|| RegistrationError::RegistryFrozen { key: key.clone() })?;

        registry.register_decorator(key, decorator)
    }

    /// Records that `ty` implements each type in `implements`, for generic constraints.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen.
    pub fn declare_type(&self, ty: TypeName, implements: impl IntoIterator<Item = TypeName>) -> Result<(), RegistrationError> {
        let mut staging = self.inner.staging.lock();
        let Some(registry) = staging.as_mut() else {
            return Err(RegistrationError::RegistryFrozen { key: ServiceKey::new(ty) });
        };

        registry.declare_type(ty, implements);
        Ok(())
    }

    /// Stops accepting registrations. Resolution freezes the registry implicitly.
    pub fn freeze(&self) {
        self.registry();
    }

    /// Returns `true` once the registry is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.get().is_some()
    }

    /// Resolves `key` against the root scope.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be planned (missing or ambiguous bindings, no satisfiable
    /// constructor, cycles, violated generic constraints) or a constructor reports an error.
    pub fn resolve(&self, key: impl Into<ServiceKey>) -> Result<Instance, ResolveError> {
        self.resolve_with(&key.into(), &self.inner.root)
    }

    /// Resolves `key` within `scope`.
    ///
    /// # Errors
    ///
    /// As [`resolve`](Self::resolve); additionally fails if the scope has been disposed.
    pub fn resolve_in(&self, key: impl Into<ServiceKey>, scope: &Scope) -> Result<Instance, ResolveError> {
        self.resolve_with(&key.into(), scope.state())
    }

    /// Resolves every binding of `key` against the root scope, in registration order.
    ///
    /// Returns an empty list when nothing is bound to the key.
    ///
    /// # Errors
    ///
    /// Fails if any of the bindings fails to resolve.
    pub fn resolve_all(&self, key: impl Into<ServiceKey>) -> Result<Vec<Instance>, ResolveError> {
        self.resolve_all_with(&key.into(), &self.inner.root)
    }

    pub(crate) fn resolve_all_in(&self, key: impl Into<ServiceKey>, scope: &Scope) -> Result<Vec<Instance>, ResolveError> {
        self.resolve_all_with(&key.into(), scope.state())
    }

    /// Plans `key` without constructing anything.
    ///
    /// # Errors
    ///
    /// Fails for the same planning errors as [`resolve`](Self::resolve).
    pub fn explain(&self, key: impl Into<ServiceKey>) -> Result<Arc<ResolutionNode>, ResolveError> {
        self.plan(&key.into())
    }

    /// Opens a new scope.
    #[must_use]
    pub fn create_scope(&self) -> Scope {
        let id = ScopeId::from_raw(self.inner.next_scope.fetch_add(1, Ordering::Relaxed));
        event!(Level::DEBUG, message = "scope created", scope = %id);

        Scope::new(self.clone(), Arc::new(ScopeState::new(id)))
    }

    /// Disposes `scope`; see [`Scope::dispose`].
    ///
    /// # Errors
    ///
    /// Returns every disposal failure of the scope, after all of its instances were disposed.
    pub fn dispose_scope(&self, scope: &Scope) -> Result<(), AggregatedDisposalError> {
        scope.dispose()
    }

    /// Disposes the root scope: singletons and everything resolved directly from the container.
    ///
    /// # Errors
    ///
    /// Returns every disposal failure, after all instances were disposed.
    pub fn dispose(&self) -> Result<(), AggregatedDisposalError> {
        self.inner.root.dispose()
    }

    fn registry(&self) -> &Arc<Registry> {
        self.inner.frozen.get_or_init(|| {
            let registry = self.inner.staging.lock().take().unwrap_or_default();

            event!(
                Level::INFO,
                message = "registry frozen",
                bindings = registry.binding_count(),
                decorators = registry.decorator_count(),
                declared_types = registry.types().len(),
            );

            Arc::new(registry)
        })
    }

    fn plan(&self, key: &ServiceKey) -> Result<Arc<ResolutionNode>, ResolveError> {
        if let Some(plan) = self.inner.plans.read().get(key) {
            return Ok(Arc::clone(plan));
        }

        let plan = Planner::new(self.registry(), &self.inner.options).plan(key)?;
        Ok(Arc::clone(self.inner.plans.write().entry(key.clone()).or_insert(plan)))
    }

    fn check_open(&self, key: &ServiceKey, scope: &ScopeState) -> Result<(), ResolveError> {
        for state in [scope, &*self.inner.root] {
            if state.is_disposed() {
                return Err(ResolveError::ScopeDisposed {
                    key: key.clone(),
                    scope: state.id(),
                });
            }
        }

        Ok(())
    }

    fn resolve_with(&self, key: &ServiceKey, scope: &ScopeState) -> Result<Instance, ResolveError> {
        event!(Level::DEBUG, message = "resolving", key = %key, scope = %scope.id());

        let result = self.check_open(key, scope).and_then(|()| {
            let plan = self.plan(key)?;
            Activation::new(&self.inner.root, scope).build(&plan)
        });

        if let Err(error) = &result {
            event!(Level::DEBUG, message = "resolution failed", key = %key, scope = %scope.id(), error = %error);
        }

        result
    }

    fn resolve_all_with(&self, key: &ServiceKey, scope: &ScopeState) -> Result<Vec<Instance>, ResolveError> {
        event!(Level::DEBUG, message = "resolving all", key = %key, scope = %scope.id());

        let result = self.check_open(key, scope).and_then(|()| {
            let plans = Planner::new(self.registry(), &self.inner.options).plan_all(key)?;
            Activation::new(&self.inner.root, scope).build_all(&plans)
        });

        if let Err(error) = &result {
            event!(Level::DEBUG, message = "resolution failed", key = %key, scope = %scope.id(), error = %error);
        }

        result
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Container {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("options", &self.inner.options)
            .field("frozen", &self.is_frozen())
            .field("root", &self.inner.root)
            .finish_non_exhaustive()
    }
}
