// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Dependency-resolution engine for composition roots.
//!
//! This crate builds object graphs from registrations: services bound to implementations with a
//! [`Lifetime`], decorator chains, open generic implementations, types with several constructors
//! and disposable components. It knows nothing about the registered types beyond their
//! constructor shapes, described by [`ImplementationDescriptor`]s whose activator closures do the
//! actual construction.
//!
//! # Resolution
//!
//! A [`Container`] resolves a [`ServiceKey`] in two phases:
//!
//! 1. **Planning.** The key is expanded into a tree of [`ResolutionNode`]s. Each step picks the
//!    single binding that answers the key, specializes open generics and checks their
//!    constraints, chooses a constructor according to the [`ConstructorPolicy`], and applies the
//!    decorators of the binding. Cycles are detected on the active path of the call and reported
//!    with the full path. [`Container::explain`] returns the plan without building anything.
//! 2. **Activation.** The plan is built bottom-up. Singleton and scoped instances go through the
//!    lifetime cache of their owning scope, which constructs each at most once even under
//!    concurrent first access. Disposable instances are handed to the owning scope.
//!
//! The registry freezes at the first resolution; registrations afterwards are rejected.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use autowire::{
//!     Container, ConstructorDescriptor, DecoratorDescriptor, ImplementationDescriptor, Lifetime, Parameter, TypeName,
//! };
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Plain;
//!
//! impl Greeter for Plain {
//!     fn greet(&self) -> String {
//!         "hello".to_owned()
//!     }
//! }
//!
//! struct Shouting(Arc<dyn Greeter>);
//!
//! impl Greeter for Shouting {
//!     fn greet(&self) -> String {
//!         self.0.greet().to_uppercase()
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let greeter = TypeName::new("Demo", "IGreeter");
//! let container = Container::new();
//!
//! container.register(
//!     greeter.clone(),
//!     ImplementationDescriptor::new(TypeName::new("Demo", "Plain"))
//!         .constructor(ConstructorDescriptor::new([], |_| Ok(Arc::new(Plain) as Arc<dyn Greeter>))),
//!     Lifetime::Singleton,
//! )?;
//! container.register_decorator(
//!     greeter.clone(),
//!     DecoratorDescriptor::new(
//!         greeter.clone(),
//!         ImplementationDescriptor::new(TypeName::new("Demo", "Shouting")).constructor(ConstructorDescriptor::new(
//!             [Parameter::service(greeter.clone())],
//!             |args| Ok(Arc::new(Shouting(args.interface::<dyn Greeter>(0)?)) as Arc<dyn Greeter>),
//!         )),
//!     ),
//! )?;
//!
//! let instance = container.resolve(greeter)?;
//! let greeting = instance.interface::<dyn Greeter>().map(|greeter| greeter.greet());
//! assert_eq!(greeting.as_deref(), Some("HELLO"));
//! # Ok(())
//! # }
//! ```
//!
//! # Scopes and disposal
//!
//! [`Container::create_scope`] opens a [`Scope`] that owns its scoped instances and the disposable
//! transients resolved in it. Singletons and everything they depend on belong to the root scope,
//! so a singleton never captures an instance of a shorter-lived scope; with
//! [`ContainerOptions::validate_scopes`] such a dependency is rejected instead. Disposing a scope
//! disposes its instances in reverse creation order and reports every failure together in an
//! [`AggregatedDisposalError`].
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: registry freeze at `INFO`, scope lifecycle and resolution
//! failures at `DEBUG`, instance construction at `TRACE` and disposal failures at `WARN`. No
//! subscriber is installed by the crate.

mod container;
mod cycle;
mod descriptor;
mod disposal;
mod error;
mod generic;
mod graph;
mod instance;
mod key;
mod lifetime;
mod options;
mod registry;
mod scope;
mod selector;
mod type_name;
mod value;

pub use container::Container;
pub use cycle::ResolutionPath;
pub use descriptor::{ConstructorDescriptor, DecoratorDescriptor, ImplementationDescriptor, Parameter};
pub use disposal::Dispose;
pub use error::{ActivationError, AggregatedDisposalError, DisposalFailure, DisposeError, RegistrationError, ResolveError};
pub use generic::{Constraint, DeclaredTypes, GenericImplementation, GenericParameter, TypeCatalog};
pub use graph::{NodeKind, PlannedArgument, ResolutionNode};
pub use instance::{Argument, Arguments, Instance};
pub use key::ServiceKey;
pub use lifetime::Lifetime;
pub use options::ContainerOptions;
pub use registry::{BindingId, Implementation};
pub use scope::{Scope, ScopeId};
pub use selector::{ConstructorPolicy, ConstructorRejection, Unsatisfied};
pub use type_name::{GenericDefinition, ParseTypeNameError, TypeName};
pub use value::{Value, ValueKind};
