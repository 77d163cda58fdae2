// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use thiserror::Error;

use crate::{ConstructorRejection, ResolutionPath, ScopeId, ServiceKey, TypeName};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A registration was rejected.
///
/// Registration errors are reported synchronously by the call that attempted the registration;
/// a rejected registration leaves the registry unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistrationError {
    /// The registry no longer accepts registrations because resolution has started.
    #[error("cannot register {key}: the registry is frozen once resolution has started")]
    RegistryFrozen {
        /// The key whose registration was rejected.
        key: ServiceKey,
    },

    /// A decorator declares a wrapped interface other than the service it was registered for.
    #[error("decorator {decorator} wraps {declared} but was registered for {key}")]
    DecoratorMismatch {
        /// The key the decorator was registered for.
        key: ServiceKey,
        /// The decorator implementation.
        decorator: TypeName,
        /// The interface the decorator declares to wrap.
        declared: TypeName,
    },

    /// The same decorator implementation would appear twice in one decorator chain.
    #[error("decorator {decorator} already takes part in the decorator chain of {key}")]
    DuplicateDecorator {
        /// The key the decorator was registered for.
        key: ServiceKey,
        /// The decorator implementation.
        decorator: TypeName,
    },

    /// A decorator constructor does not take exactly one parameter of the wrapped interface.
    #[error("constructor #{constructor} of decorator {decorator} takes {found} parameters of type {wraps}, expected exactly one")]
    InvalidDecorator {
        /// The decorator implementation.
        decorator: TypeName,
        /// The wrapped interface.
        wraps: TypeName,
        /// Index of the offending constructor.
        constructor: usize,
        /// Number of parameters of the wrapped interface.
        found: usize,
    },

    /// An implementation declares no constructors.
    #[error("implementation {implementation} registered for {key} declares no constructors")]
    NoConstructors {
        /// The key the implementation was registered for.
        key: ServiceKey,
        /// The implementation.
        implementation: TypeName,
    },

    /// An open generic implementation does not have as many type parameters as its service.
    #[error("open generic {implementation} has {expected} type parameters but {key} has {actual}")]
    GenericArityMismatch {
        /// The key the implementation was registered for.
        key: ServiceKey,
        /// The open generic implementation.
        implementation: TypeName,
        /// Type parameters declared by the implementation.
        expected: usize,
        /// Type parameters carried by the service key.
        actual: usize,
    },

    /// A constraint names a type parameter the open generic implementation does not declare.
    #[error("open generic {implementation} has no type parameter named `{parameter}`")]
    UnknownGenericParameter {
        /// The open generic implementation.
        implementation: TypeName,
        /// The unknown parameter name.
        parameter: Arc<str>,
    },
}

/// Resolution of a service failed.
///
/// A failed resolution aborts the whole graph build of the call; no partial graph is returned.
/// Every variant names the offending key and, where relevant, the active resolution path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// No binding exists for the requested key.
    #[error("no binding is registered for {key} (path: {path})")]
    NotRegistered {
        /// The requested key.
        key: ServiceKey,
        /// The resolution path leading to the request.
        path: ResolutionPath,
    },

    /// Several bindings match the requested key and none of them is the default.
    #[error("{key} is ambiguous: {} bindings match ({}) (path: {path})", count(.candidates), join(.candidates))]
    AmbiguousRegistration {
        /// The requested key.
        key: ServiceKey,
        /// Implementations of the matching bindings, in registration order.
        candidates: Vec<TypeName>,
        /// The resolution path leading to the request.
        path: ResolutionPath,
    },

    /// None of the constructors of the implementation can be satisfied.
    #[error("no constructor of {implementation} is resolvable for {key}: {} (path: {path})", join(.rejections))]
    NoResolvableConstructor {
        /// The requested key.
        key: ServiceKey,
        /// The implementation whose constructors were considered.
        implementation: TypeName,
        /// The first unresolvable parameter of each candidate constructor.
        rejections: Vec<ConstructorRejection>,
        /// The resolution path leading to the request.
        path: ResolutionPath,
    },

    /// The requested key is already being resolved further up the path.
    #[error("circular dependency detected: {path}")]
    CircularDependency {
        /// The key that closed the cycle.
        key: ServiceKey,
        /// The full path, starting at the outermost request and ending with the repeated key.
        path: ResolutionPath,
    },

    /// A type argument does not satisfy a constraint of an open generic implementation.
    #[error("{argument} does not satisfy constraint `{constraint}` of type parameter {parameter} of {implementation} while resolving {key} (path: {path})")]
    GenericConstraintViolation {
        /// The requested key.
        key: ServiceKey,
        /// The open generic implementation.
        implementation: TypeName,
        /// The constrained type parameter.
        parameter: Arc<str>,
        /// The offending type argument.
        argument: TypeName,
        /// Description of the violated constraint.
        constraint: String,
        /// The resolution path leading to the request.
        path: ResolutionPath,
    },

    /// An activator reported a failure while constructing an instance.
    #[error("failed to activate {implementation} for {key}")]
    Activation {
        /// The key being resolved.
        key: ServiceKey,
        /// The implementation whose activator failed.
        implementation: TypeName,
        /// The error reported by the activator.
        #[source]
        source: ActivationError,
    },

    /// A singleton depends on a scoped service and scope validation is enabled.
    #[error("singleton {singleton} depends on scoped service {scoped} (path: {path})")]
    ScopeViolation {
        /// The singleton that captures the scoped service.
        singleton: ServiceKey,
        /// The scoped service.
        scoped: ServiceKey,
        /// The resolution path leading to the scoped service.
        path: ResolutionPath,
    },

    /// The scope used for resolution has already been disposed.
    #[error("scope {scope} has been disposed, cannot resolve {key}")]
    ScopeDisposed {
        /// The requested key.
        key: ServiceKey,
        /// The disposed scope.
        scope: ScopeId,
    },

    /// The dependency graph is deeper than the configured limit.
    #[error("resolving {key} exceeds the maximum graph depth of {max_depth} (path: {path})")]
    DepthExceeded {
        /// The key that would exceed the limit.
        key: ServiceKey,
        /// The configured limit.
        max_depth: usize,
        /// The resolution path leading to the request.
        path: ResolutionPath,
    },
}

impl ResolveError {
    /// The key the failure is about.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        match self {
            Self::NotRegistered { key, .. }
            | Self::AmbiguousRegistration { key, .. }
            | Self::NoResolvableConstructor { key, .. }
            | Self::CircularDependency { key, .. }
            | Self::GenericConstraintViolation { key, .. }
            | Self::Activation { key, .. }
            | Self::ScopeDisposed { key, .. }
            | Self::DepthExceeded { key, .. } => key,
            Self::ScopeViolation { scoped, .. } => scoped,
        }
    }

    /// The active resolution path at the point of failure, if the failure happened while planning.
    #[must_use]
    pub fn path(&self) -> Option<&ResolutionPath> {
        match self {
            Self::NotRegistered { path, .. }
            | Self::AmbiguousRegistration { path, .. }
            | Self::NoResolvableConstructor { path, .. }
            | Self::CircularDependency { path, .. }
            | Self::GenericConstraintViolation { path, .. }
            | Self::ScopeViolation { path, .. }
            | Self::DepthExceeded { path, .. } => Some(path),
            Self::Activation { .. } | Self::ScopeDisposed { .. } => None,
        }
    }
}

/// Failure reported by an activator while constructing an instance.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActivationError {
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxError>,
}

impl ActivationError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with the given message, caused by another error.
    #[must_use]
    pub fn caused_by(message: impl Into<Cow<'static, str>>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure reported while disposing an instance.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DisposeError {
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxError>,
}

impl DisposeError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with the given message, caused by another error.
    #[must_use]
    pub fn caused_by(message: impl Into<Cow<'static, str>>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One instance that failed to dispose.
#[derive(Debug)]
pub struct DisposalFailure {
    pub(crate) key: ServiceKey,
    pub(crate) implementation: TypeName,
    pub(crate) position: usize,
    pub(crate) error: DisposeError,
}

impl DisposalFailure {
    /// The key the instance was resolved for.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// The implementation of the instance.
    #[must_use]
    pub fn implementation(&self) -> &TypeName {
        &self.implementation
    }

    /// Zero-based creation position of the instance within its scope.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The error reported by the disposer.
    #[must_use]
    pub fn error(&self) -> &DisposeError {
        &self.error
    }
}

impl Display for DisposalFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) #{}: {}", self.implementation, self.key, self.position, self.error)
    }
}

/// All disposal failures of one scope teardown.
///
/// Teardown always runs to completion; every instance that failed to dispose is listed here in
/// the order the disposals were attempted.
#[derive(Debug, Error)]
#[error("{} instance(s) failed to dispose in scope {scope}: {}", count(.failures), join(.failures))]
pub struct AggregatedDisposalError {
    scope: ScopeId,
    failures: Vec<DisposalFailure>,
}

impl AggregatedDisposalError {
    pub(crate) fn new(scope: ScopeId, failures: Vec<DisposalFailure>) -> Self {
        Self { scope, failures }
    }

    /// The scope whose teardown failed.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The individual failures, in disposal order.
    #[must_use]
    pub fn failures(&self) -> &[DisposalFailure] {
        &self.failures
    }
}

fn count<T>(items: &[T]) -> usize {
    items.len()
}

fn join<T: Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
