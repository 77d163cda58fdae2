// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Open generic implementations, their constraints and the type catalog that checks them.

use std::collections::VecDeque;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::{ImplementationDescriptor, TypeName};

type Specializer = Arc<dyn Fn(&[TypeName]) -> ImplementationDescriptor + Send + Sync>;

type Predicate = Arc<dyn Fn(&TypeName) -> bool + Send + Sync>;

/// Answers capability questions about types for generic constraints.
///
/// A host plugs its own catalog into [`ContainerOptions::type_catalog`][crate::ContainerOptions::type_catalog]
/// when it knows more about its types than what was declared through
/// [`Container::declare_type`][crate::Container::declare_type].
pub trait TypeCatalog: Send + Sync + Debug {
    /// Returns `true` if `candidate` is, implements, or derives from `requirement`.
    fn satisfies(&self, candidate: &TypeName, requirement: &TypeName) -> bool;
}

/// Catalog of explicitly declared "implements" relationships.
///
/// Relationships are transitive: if `Org` implements `IEntity` and `IEntity` implements
/// `IIdentifiable`, then `Org` satisfies `IIdentifiable`. Every type satisfies itself.
#[derive(Clone, Debug, Default)]
pub struct DeclaredTypes {
    implements: HashMap<TypeName, Vec<TypeName>>,
}

impl DeclaredTypes {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `ty` implements every type in `implements`.
    pub fn declare(&mut self, ty: TypeName, implements: impl IntoIterator<Item = TypeName>) {
        self.implements.entry(ty).or_default().extend(implements);
    }

    /// Number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.implements.len()
    }

    /// Returns `true` if nothing was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.implements.is_empty()
    }
}

impl TypeCatalog for DeclaredTypes {
    fn satisfies(&self, candidate: &TypeName, requirement: &TypeName) -> bool {
        if candidate == requirement {
            return true;
        }

        let mut visited = HashSet::new();
        let mut pending = VecDeque::from([candidate]);

        while let Some(current) = pending.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            for parent in self.implements.get(current).into_iter().flatten() {
                if parent == requirement {
                    return true;
                }
                pending.push_back(parent);
            }
        }

        false
    }
}

/// A requirement a generic type argument must meet.
#[derive(Clone)]
pub enum Constraint {
    /// The argument must satisfy the given type according to the type catalog.
    Implements(TypeName),
    /// The argument must pass a custom predicate.
    Satisfies {
        /// Human-readable form of the requirement, used in diagnostics.
        description: Arc<str>,
        /// The check itself.
        predicate: Predicate,
    },
}

impl Constraint {
    /// Requires the argument to implement `requirement`.
    #[must_use]
    pub fn implements(requirement: TypeName) -> Self {
        Self::Implements(requirement)
    }

    /// Requires the argument to pass `predicate`.
    pub fn satisfies<F>(description: impl AsRef<str>, predicate: F) -> Self
    where
        F: Fn(&TypeName) -> bool + Send + Sync + 'static,
    {
        Self::Satisfies {
            description: Arc::from(description.as_ref()),
            predicate: Arc::new(predicate),
        }
    }

    pub(crate) fn accepts(&self, argument: &TypeName, catalogs: &[&dyn TypeCatalog]) -> bool {
        match self {
            Self::Implements(requirement) => catalogs.iter().any(|catalog| catalog.satisfies(argument, requirement)),
            Self::Satisfies { predicate, .. } => predicate(argument),
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implements(requirement) => write!(f, "implements {requirement}"),
            Self::Satisfies { description, .. } => f.write_str(description),
        }
    }
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Constraint({self})")
    }
}

/// A named type parameter of an open generic implementation.
#[derive(Clone, Debug)]
pub struct GenericParameter {
    name: Arc<str>,
    constraints: Vec<Constraint>,
}

impl GenericParameter {
    /// The parameter name, as written in the implementation template.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The constraints, in the order they were added.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

/// An implementation template with type parameters, specialized per requested service type.
///
/// The template's generic arguments name the type parameters, so `Corp.Data.Repository<T>`
/// declares one parameter called `T`. A request for `IRepository<Org>` hands `[Org]` to the
/// specializer, which returns the descriptor of the closed implementation.
///
/// # Examples
///
/// ```
/// use autowire::{Constraint, ConstructorDescriptor, GenericImplementation, ImplementationDescriptor, TypeName};
///
/// let repository: TypeName = "Corp.Data.Repository<T>".parse()?;
/// let generic = GenericImplementation::new(repository.clone(), move |args| {
///     ImplementationDescriptor::new(repository.with_args(args.iter().cloned()))
///         .constructor(ConstructorDescriptor::new([], |_| Ok(())))
/// })
/// .constrain("T", Constraint::implements(TypeName::new("Corp", "IEntity")));
///
/// assert_eq!(generic.arity(), 1);
/// assert_eq!(generic.parameters()[0].constraints().len(), 1);
/// # Ok::<(), autowire::ParseTypeNameError>(())
/// ```
#[derive(Clone)]
pub struct GenericImplementation {
    template: TypeName,
    parameters: Vec<GenericParameter>,
    unknown: Vec<Arc<str>>,
    specializer: Specializer,
}

impl GenericImplementation {
    /// Creates an open generic implementation from its template and specializer.
    pub fn new<F>(template: TypeName, specializer: F) -> Self
    where
        F: Fn(&[TypeName]) -> ImplementationDescriptor + Send + Sync + 'static,
    {
        let parameters = template
            .args()
            .iter()
            .map(|arg| GenericParameter {
                name: Arc::from(arg.name()),
                constraints: Vec::new(),
            })
            .collect();

        Self {
            template,
            parameters,
            unknown: Vec::new(),
            specializer: Arc::new(specializer),
        }
    }

    /// Adds a constraint to the type parameter called `parameter`.
    ///
    /// Naming a parameter the template does not declare makes the registration fail.
    #[must_use]
    pub fn constrain(mut self, parameter: &str, constraint: Constraint) -> Self {
        match self.parameters.iter_mut().find(|candidate| &*candidate.name == parameter) {
            Some(found) => found.constraints.push(constraint),
            None => self.unknown.push(Arc::from(parameter)),
        }
        self
    }

    /// The implementation template.
    #[must_use]
    pub fn template(&self) -> &TypeName {
        &self.template
    }

    /// The type parameters, in template order.
    #[must_use]
    pub fn parameters(&self) -> &[GenericParameter] {
        &self.parameters
    }

    /// Number of type parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// The first constraint target that names no type parameter.
    pub(crate) fn unknown_parameter(&self) -> Option<&Arc<str>> {
        self.unknown.first()
    }

    /// Checks every constraint against the requested type arguments.
    pub(crate) fn check(&self, args: &[TypeName], catalogs: &[&dyn TypeCatalog]) -> Result<(), ConstraintViolation> {
        for (parameter, argument) in self.parameters.iter().zip(args) {
            if let Some(violated) = parameter
                .constraints
                .iter()
                .find(|constraint| !constraint.accepts(argument, catalogs))
            {
                return Err(ConstraintViolation {
                    parameter: Arc::clone(&parameter.name),
                    argument: argument.clone(),
                    constraint: violated.to_string(),
                });
            }
        }

        Ok(())
    }

    pub(crate) fn specialize(&self, args: &[TypeName]) -> ImplementationDescriptor {
        (self.specializer)(args)
    }
}

impl Debug for GenericImplementation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericImplementation")
            .field("template", &self.template)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, PartialEq)]
pub(crate) struct ConstraintViolation {
    pub(crate) parameter: Arc<str>,
    pub(crate) argument: TypeName,
    pub(crate) constraint: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstructorDescriptor;

    fn entity() -> TypeName {
        TypeName::new("Corp", "IEntity")
    }

    fn repository() -> GenericImplementation {
        let template: TypeName = "Corp.Data.Repository<TEntity, TKey>".parse().unwrap();
        GenericImplementation::new(template.clone(), move |args| {
            ImplementationDescriptor::new(template.with_args(args.iter().cloned()))
                .constructor(ConstructorDescriptor::new([], |_| Ok(())))
        })
    }

    #[test]
    fn declared_relationships_are_transitive() {
        let mut types = DeclaredTypes::new();
        types.declare(TypeName::new("Corp", "Org"), [entity()]);
        types.declare(entity(), [TypeName::new("Corp", "IIdentifiable")]);

        assert!(types.satisfies(&TypeName::new("Corp", "Org"), &TypeName::new("Corp", "IIdentifiable")));
        assert!(types.satisfies(&entity(), &entity()));
        assert!(!types.satisfies(&entity(), &TypeName::new("Corp", "Org")));
    }

    #[test]
    fn declared_cycles_terminate() {
        let mut types = DeclaredTypes::new();
        types.declare(TypeName::new("Corp", "A"), [TypeName::new("Corp", "B")]);
        types.declare(TypeName::new("Corp", "B"), [TypeName::new("Corp", "A")]);

        assert!(!types.satisfies(&TypeName::new("Corp", "A"), &TypeName::new("Corp", "C")));
    }

    #[test]
    fn parameters_come_from_template() {
        let generic = repository();

        assert_eq!(generic.arity(), 2);
        assert_eq!(generic.parameters()[1].name(), "TKey");
    }

    #[test]
    fn unknown_constraint_target_is_remembered() {
        let generic = repository().constrain("TValue", Constraint::implements(entity()));

        assert_eq!(generic.unknown_parameter().map(|name| &**name), Some("TValue"));
    }

    #[test]
    fn check_reports_first_violation() {
        let mut types = DeclaredTypes::new();
        types.declare(TypeName::new("Corp", "Org"), [entity()]);

        let generic = repository()
            .constrain("TEntity", Constraint::implements(entity()))
            .constrain("TKey", Constraint::satisfies("is a System type", |arg| arg.namespace() == "System"));

        let ok = generic.check(&[TypeName::new("Corp", "Org"), TypeName::new("System", "Guid")], &[&types]);
        let violation = generic
            .check(&[TypeName::new("Corp", "Org"), TypeName::new("Corp", "Key")], &[&types])
            .unwrap_err();

        assert_eq!(ok, Ok(()));
        assert_eq!(&*violation.parameter, "TKey");
        assert_eq!(violation.argument, TypeName::new("Corp", "Key"));
        assert_eq!(violation.constraint, "is a System type");
    }

    #[test]
    fn specialize_closes_template() {
        let descriptor = repository().specialize(&[TypeName::new("Corp", "Org"), TypeName::new("System", "Guid")]);

        assert_eq!(descriptor.type_name().to_string(), "Corp.Data.Repository<Corp.Org, System.Guid>");
    }
}
