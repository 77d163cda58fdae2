// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::{ConstructorPolicy, TypeCatalog};

pub(crate) const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuration of a [`Container`][crate::Container].
///
/// The defaults select constructors greedily, build singleton subgraphs against the root scope
/// without rejecting scoped dependencies, and allow graphs up to 256 levels deep.
///
/// With the `serde` feature the options can be loaded from a host's configuration; the type
/// catalog is not part of the serialized form.
///
/// # Examples
///
/// ```
/// use autowire::{ConstructorPolicy, Container, ContainerOptions};
///
/// let options = ContainerOptions::new()
///     .constructor_policy(ConstructorPolicy::SmallestFirst)
///     .validate_scopes(true)
///     .max_depth(64);
///
/// assert_eq!(options.get_max_depth(), 64);
///
/// let container = Container::with_options(options);
/// # drop(container);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerOptions {
    constructor_policy: ConstructorPolicy,
    validate_scopes: bool,
    max_depth: usize,
    #[cfg_attr(feature = "serde", serde(skip))]
    type_catalog: Option<Arc<dyn TypeCatalog>>,
}

impl ContainerOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructor_policy: ConstructorPolicy::default(),
            validate_scopes: false,
            max_depth: DEFAULT_MAX_DEPTH,
            type_catalog: None,
        }
    }

    /// Sets how a constructor is chosen among several satisfiable ones.
    #[must_use]
    pub fn constructor_policy(mut self, policy: ConstructorPolicy) -> Self {
        self.constructor_policy = policy;
        self
    }

    /// Rejects singletons that depend, directly or transitively, on scoped services.
    ///
    /// When disabled, such dependencies are resolved against the root scope.
    #[must_use]
    pub fn validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    /// Sets the deepest dependency chain a single resolution may build.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Adds a catalog consulted for `implements` constraints of open generics, next to the
    /// relationships declared on the container.
    #[must_use]
    pub fn type_catalog(mut self, catalog: impl TypeCatalog + 'static) -> Self {
        self.type_catalog = Some(Arc::new(catalog));
        self
    }

    /// The configured constructor policy.
    #[must_use]
    pub fn get_constructor_policy(&self) -> ConstructorPolicy {
        self.constructor_policy
    }

    /// Whether scope validation is enabled.
    #[must_use]
    pub fn get_validate_scopes(&self) -> bool {
        self.validate_scopes
    }

    /// The maximum graph depth.
    #[must_use]
    pub fn get_max_depth(&self) -> usize {
        self.max_depth
    }

    pub(crate) fn get_type_catalog(&self) -> Option<&dyn TypeCatalog> {
        self.type_catalog.as_deref()
    }
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self::new()
    }
}
