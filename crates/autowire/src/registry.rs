// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use hashbrown::HashMap;

use crate::selector::ParameterLookup;
use crate::{
    DecoratorDescriptor, DeclaredTypes, GenericDefinition, GenericImplementation, ImplementationDescriptor, Lifetime,
    RegistrationError, ServiceKey, TypeName, Unsatisfied,
};

/// Identity of a registered binding, unique within its container.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl Display for BindingId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "binding #{}", self.0)
    }
}

impl Debug for BindingId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "BindingId({})", self.0)
    }
}

/// What a binding builds: a closed implementation or an open generic one.
#[derive(Clone, Debug)]
pub enum Implementation {
    /// An implementation with a fixed type.
    Closed(ImplementationDescriptor),
    /// An implementation template specialized per requested service type.
    Generic(GenericImplementation),
}

impl Implementation {
    /// The implementation type, or the template of an open generic implementation.
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        match self {
            Self::Closed(descriptor) => descriptor.type_name(),
            Self::Generic(generic) => generic.template(),
        }
    }
}

impl From<ImplementationDescriptor> for Implementation {
    fn from(descriptor: ImplementationDescriptor) -> Self {
        Self::Closed(descriptor)
    }
}

impl From<GenericImplementation> for Implementation {
    fn from(generic: GenericImplementation) -> Self {
        Self::Generic(generic)
    }
}

#[derive(Debug)]
pub(crate) struct Binding {
    pub(crate) id: BindingId,
    pub(crate) key: ServiceKey,
    pub(crate) implementation: Implementation,
    pub(crate) lifetime: Lifetime,
}

#[derive(Debug)]
struct DecoratorEntry {
    name: Option<Arc<str>>,
    descriptor: DecoratorDescriptor,
}

impl DecoratorEntry {
    /// Returns `true` if the entry wraps bindings registered under `name`.
    fn applies_to(&self, name: Option<&str>) -> bool {
        self.name.is_none() || self.name.as_deref() == name
    }
}

/// Every binding, decorator and declared type of a container.
///
/// Staged behind a lock while the container is configured, then frozen and shared read-only by
/// all resolutions.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    bindings: Vec<Binding>,
    closed: HashMap<TypeName, Vec<usize>>,
    open: HashMap<GenericDefinition, Vec<usize>>,
    decorators: HashMap<TypeName, Vec<DecoratorEntry>>,
    types: DeclaredTypes,
}

impl Registry {
    pub(crate) fn register(
        &mut self,
        key: ServiceKey,
        implementation: Implementation,
        lifetime: Lifetime,
    ) -> Result<BindingId, RegistrationError> {
        match &implementation {
            Implementation::Closed(descriptor) => {
                if descriptor.constructors().is_empty() {
                    return Err(RegistrationError::NoConstructors {
                        key,
                        implementation: descriptor.type_name().clone(),
                    });
                }
            }
            Implementation::Generic(generic) => {
                if let Some(parameter) = generic.unknown_parameter() {
                    return Err(RegistrationError::UnknownGenericParameter {
                        implementation: generic.template().clone(),
                        parameter: Arc::clone(parameter),
                    });
                }

                let actual = key.service().arity();
                if actual == 0 || generic.arity() != actual {
                    return Err(RegistrationError::GenericArityMismatch {
                        implementation: generic.template().clone(),
                        expected: generic.arity(),
                        actual,
                        key,
                    });
                }
            }
        }

        let index = self.bindings.len();
        let id = BindingId(index as u64);

        match &implementation {
            Implementation::Closed(_) => self.closed.entry(key.service().clone()).or_default().push(index),
            Implementation::Generic(_) => self.open.entry(key.service().definition()).or_default().push(index),
        }

        self.bindings.push(Binding {
            id,
            key,
            implementation,
            lifetime,
        });

        Ok(id)
    }

    pub(crate) fn register_decorator(&mut self, key: ServiceKey, descriptor: DecoratorDescriptor) -> Result<(), RegistrationError> {
        let decorator = descriptor.implementation().type_name();

        if descriptor.wraps() != key.service() {
            return Err(RegistrationError::DecoratorMismatch {
                decorator: decorator.clone(),
                declared: descriptor.wraps().clone(),
                key,
            });
        }

        let constructors = descriptor.implementation().constructors();
        if constructors.is_empty() {
            return Err(RegistrationError::NoConstructors {
                implementation: decorator.clone(),
                key,
            });
        }

        for (index, constructor) in constructors.iter().enumerate() {
            let found = descriptor.decoratee_count(constructor);
            if found != 1 {
                return Err(RegistrationError::InvalidDecorator {
                    decorator: decorator.clone(),
                    wraps: descriptor.wraps().clone(),
                    constructor: index,
                    found,
                });
            }
        }

        let entries = self.decorators.entry(key.service().clone()).or_default();
        let duplicate = entries.iter().any(|entry| {
            entry.descriptor.implementation().type_name() == decorator && (entry.applies_to(key.name()) || key.name().is_none())
        });

        if duplicate {
            return Err(RegistrationError::DuplicateDecorator {
                decorator: decorator.clone(),
                key,
            });
        }

        entries.push(DecoratorEntry {
            name: key.name().map(Arc::from),
            descriptor,
        });

        Ok(())
    }

    pub(crate) fn declare_type(&mut self, ty: TypeName, implements: impl IntoIterator<Item = TypeName>) {
        self.types.declare(ty, implements);
    }

    pub(crate) fn types(&self) -> &DeclaredTypes {
        &self.types
    }

    pub(crate) fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub(crate) fn decorator_count(&self) -> usize {
        self.decorators.values().map(Vec::len).sum()
    }

    /// Bindings that answer `key`, in registration order.
    ///
    /// Closed bindings of the exact service type win; open generic bindings of the same generic
    /// definition are consulted only when no closed binding matches. A named key matches only
    /// bindings registered under that name.
    pub(crate) fn bindings_for(&self, key: &ServiceKey) -> Vec<&Binding> {
        let closed = self.matching(self.closed.get(key.service()), key.name());
        if !closed.is_empty() || !key.service().is_generic() {
            return closed;
        }

        self.matching(self.open.get(&key.service().definition()), key.name())
    }

    fn matching<'a>(&'a self, indexes: Option<&'a Vec<usize>>, name: Option<&str>) -> Vec<&'a Binding> {
        indexes
            .into_iter()
            .flatten()
            .map(|&index| &self.bindings[index])
            .filter(|binding| name.is_none() || binding.key.name() == name)
            .collect()
    }

    /// The single binding that answers `key`.
    ///
    /// With several candidates, an unnamed request falls back to the only unnamed binding.
    pub(crate) fn select(&self, key: &ServiceKey) -> Result<&Binding, Unsatisfied> {
        let candidates = self.bindings_for(key);

        match candidates.as_slice() {
            [] => Err(Unsatisfied::NotRegistered),
            [only] => Ok(*only),
            _ => {
                let mut defaults = candidates.iter().filter(|binding| binding.key.name().is_none());

                match (defaults.next(), defaults.next()) {
                    (Some(default), None) if key.name().is_none() => Ok(*default),
                    _ => Err(Unsatisfied::Ambiguous {
                        candidates: candidates
                            .iter()
                            .map(|binding| binding.implementation.type_name().clone())
                            .collect(),
                    }),
                }
            }
        }
    }

    /// Decorators wrapping `binding` when it is resolved as `service`, innermost first.
    pub(crate) fn decorators_for<'a>(
        &'a self,
        service: &TypeName,
        binding: &'a Binding,
    ) -> impl Iterator<Item = &'a DecoratorDescriptor> + use<'a> {
        self.decorators
            .get(service)
            .into_iter()
            .flatten()
            .filter(move |entry| entry.applies_to(binding.key.name()))
            .map(|entry| &entry.descriptor)
    }
}

impl ParameterLookup for Registry {
    fn lookup(&self, key: &ServiceKey) -> Result<(), Unsatisfied> {
        self.select(key).map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstructorDescriptor, Parameter};

    fn foo_service() -> TypeName {
        TypeName::new("Corp", "IFoo")
    }

    fn implementation(name: &str) -> ImplementationDescriptor {
        ImplementationDescriptor::new(TypeName::new("Corp", name)).constructor(ConstructorDescriptor::new([], |_| Ok(())))
    }

    fn decorator(name: &str, wraps: TypeName) -> DecoratorDescriptor {
        let implementation = ImplementationDescriptor::new(TypeName::new("Corp", name))
            .constructor(ConstructorDescriptor::new([Parameter::service(wraps.clone())], |_| Ok(())));
        DecoratorDescriptor::new(wraps, implementation)
    }

    fn repository() -> GenericImplementation {
        let template: TypeName = "Corp.Repository<T>".parse().unwrap();
        GenericImplementation::new(template.clone(), move |args| {
            ImplementationDescriptor::new(template.with_args(args.iter().cloned()))
                .constructor(ConstructorDescriptor::new([], |_| Ok(())))
        })
    }

    #[test]
    fn single_binding_is_selected() {
        let mut registry = Registry::default();
        let id = registry
            .register(foo_service().into(), implementation("Foo").into(), Lifetime::Transient)
            .unwrap();

        let binding = registry.select(&ServiceKey::new(foo_service())).unwrap();

        assert_eq!(binding.id, id);
        assert_eq!(registry.binding_count(), 1);
    }

    #[test]
    fn two_unnamed_bindings_are_ambiguous() {
        let mut registry = Registry::default();
        registry.register(foo_service().into(), implementation("FooA").into(), Lifetime::Transient).unwrap();
        registry.register(foo_service().into(), implementation("FooB").into(), Lifetime::Transient).unwrap();

        assert_eq!(
            registry.select(&ServiceKey::new(foo_service())).unwrap_err(),
            Unsatisfied::Ambiguous {
                candidates: vec![TypeName::new("Corp", "FooA"), TypeName::new("Corp", "FooB")],
            }
        );
    }

    #[test]
    fn single_unnamed_binding_is_the_default() {
        let mut registry = Registry::default();
        registry
            .register(ServiceKey::named(foo_service(), "archive"), implementation("ArchiveFoo").into(), Lifetime::Transient)
            .unwrap();
        let default = registry.register(foo_service().into(), implementation("Foo").into(), Lifetime::Transient).unwrap();

        assert_eq!(registry.select(&ServiceKey::new(foo_service())).unwrap().id, default);
        assert_eq!(
            registry.select(&ServiceKey::named(foo_service(), "archive")).unwrap().implementation.type_name(),
            &TypeName::new("Corp", "ArchiveFoo")
        );
        assert_eq!(
            registry.select(&ServiceKey::named(foo_service(), "missing")).unwrap_err(),
            Unsatisfied::NotRegistered
        );
    }

    #[test]
    fn namespaces_never_merge() {
        let mut registry = Registry::default();
        registry
            .register(TypeName::new("Billing", "IOrganizationService").into(), implementation("Billing").into(), Lifetime::Singleton)
            .unwrap();

        assert_eq!(
            registry.select(&ServiceKey::new(TypeName::new("Identity", "IOrganizationService"))).unwrap_err(),
            Unsatisfied::NotRegistered
        );
    }

    #[test]
    fn closed_bindings_shadow_open_generics() {
        let mut registry = Registry::default();
        let open_key: TypeName = "Corp.IRepository<T>".parse().unwrap();
        let closed_key: TypeName = "Corp.IRepository<Corp.Org>".parse().unwrap();
        let open = registry.register(open_key.into(), repository().into(), Lifetime::Transient).unwrap();
        let closed = registry
            .register(closed_key.clone().into(), implementation("OrgRepository").into(), Lifetime::Transient)
            .unwrap();

        let user_key: ServiceKey = "Corp.IRepository<Corp.User>".parse().unwrap();

        assert_eq!(registry.select(&ServiceKey::new(closed_key)).unwrap().id, closed);
        assert_eq!(registry.select(&user_key).unwrap().id, open);
    }

    #[test]
    fn generic_registration_is_validated() {
        let mut registry = Registry::default();

        let arity = registry
            .register(foo_service().into(), repository().into(), Lifetime::Transient)
            .unwrap_err();
        let unknown = registry
            .register(
                "Corp.IRepository<T>".parse::<ServiceKey>().unwrap(),
                repository().constrain("TKey", crate::Constraint::implements(foo_service())).into(),
                Lifetime::Transient,
            )
            .unwrap_err();

        assert!(matches!(arity, RegistrationError::GenericArityMismatch { expected: 1, actual: 0, .. }));
        assert!(matches!(unknown, RegistrationError::UnknownGenericParameter { .. }));
        assert_eq!(registry.binding_count(), 0);
    }

    #[test]
    fn implementation_without_constructors_is_rejected() {
        let mut registry = Registry::default();
        let error = registry
            .register(
                foo_service().into(),
                ImplementationDescriptor::new(TypeName::new("Corp", "Foo")).into(),
                Lifetime::Transient,
            )
            .unwrap_err();

        assert!(matches!(error, RegistrationError::NoConstructors { .. }));
    }

    #[test]
    fn decorators_are_validated() {
        let mut registry = Registry::default();

        let mismatch = registry
            .register_decorator(foo_service().into(), decorator("BarLogger", TypeName::new("Corp", "IBar")))
            .unwrap_err();

        let no_decoratee = DecoratorDescriptor::new(foo_service(), implementation("Detached"));
        let invalid = registry.register_decorator(foo_service().into(), no_decoratee).unwrap_err();

        registry
            .register_decorator(foo_service().into(), decorator("FooLogger", foo_service()))
            .unwrap();
        let duplicate = registry
            .register_decorator(ServiceKey::named(foo_service(), "archive"), decorator("FooLogger", foo_service()))
            .unwrap_err();

        assert!(matches!(mismatch, RegistrationError::DecoratorMismatch { .. }));
        assert!(matches!(invalid, RegistrationError::InvalidDecorator { found: 0, .. }));
        assert!(matches!(duplicate, RegistrationError::DuplicateDecorator { .. }));
        assert_eq!(registry.decorator_count(), 1);
    }

    #[test]
    fn named_decorators_wrap_only_their_binding() {
        let mut registry = Registry::default();
        registry.register(foo_service().into(), implementation("Foo").into(), Lifetime::Transient).unwrap();
        registry
            .register(ServiceKey::named(foo_service(), "archive"), implementation("ArchiveFoo").into(), Lifetime::Transient)
            .unwrap();
        registry
            .register_decorator(foo_service().into(), decorator("FooLogger", foo_service()))
            .unwrap();
        registry
            .register_decorator(ServiceKey::named(foo_service(), "archive"), decorator("ArchiveAudit", foo_service()))
            .unwrap();

        let names = |key: ServiceKey| -> Vec<String> {
            let binding = registry.select(&key).unwrap();
            registry
                .decorators_for(&foo_service(), binding)
                .map(|decorator| decorator.implementation().type_name().to_string())
                .collect()
        };

        assert_eq!(names(foo_service().into()), ["Corp.FooLogger"]);
        assert_eq!(names(ServiceKey::named(foo_service(), "archive")), ["Corp.FooLogger", "Corp.ArchiveAudit"]);
    }
}
