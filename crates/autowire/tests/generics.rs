// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for open generic bindings and their constraints.

use autowire::{
    Constraint, ConstructorDescriptor, Container, ContainerOptions, GenericImplementation, ImplementationDescriptor,
    Lifetime, RegistrationError, ResolveError, TypeCatalog, TypeName,
};

fn ty(name: &str) -> TypeName {
    TypeName::new("Corp", name)
}

fn parse(text: &str) -> TypeName {
    text.parse().unwrap()
}

/// `Corp.Repository<T>`, whose instances remember the closed type they were built for.
fn repository() -> GenericImplementation {
    let template = parse("Corp.Repository<T>");
    GenericImplementation::new(template.clone(), move |args| {
        let closed = template.with_args(args.iter().cloned());
        let label = closed.to_string();
        ImplementationDescriptor::new(closed).constructor(ConstructorDescriptor::new([], move |_| Ok(label.clone())))
    })
}

fn label(container: &Container, service: &str) -> String {
    container
        .resolve(parse(service))
        .unwrap()
        .downcast_ref::<String>()
        .unwrap()
        .clone()
}

#[test]
fn open_generic_is_specialized_per_request() {
    let container = Container::new();
    container.register(parse("Corp.IRepository<T>"), repository(), Lifetime::Transient).unwrap();

    assert_eq!(label(&container, "Corp.IRepository<Corp.Org>"), "Corp.Repository<Corp.Org>");
    assert_eq!(label(&container, "Corp.IRepository<Corp.User>"), "Corp.Repository<Corp.User>");
}

#[test]
fn closed_binding_wins_over_open_generic() {
    let container = Container::new();
    container.register(parse("Corp.IRepository<T>"), repository(), Lifetime::Transient).unwrap();
    container
        .register(
            parse("Corp.IRepository<Corp.Org>"),
            ImplementationDescriptor::new(ty("OrgRepository"))
                .constructor(ConstructorDescriptor::new([], |_| Ok("custom".to_owned()))),
            Lifetime::Transient,
        )
        .unwrap();

    assert_eq!(label(&container, "Corp.IRepository<Corp.Org>"), "custom");
    assert_eq!(label(&container, "Corp.IRepository<Corp.User>"), "Corp.Repository<Corp.User>");
}

#[test]
fn generic_singletons_are_cached_per_closed_type() {
    let container = Container::new();
    container.register(parse("Corp.IRepository<T>"), repository(), Lifetime::Singleton).unwrap();

    let org = container.resolve(parse("Corp.IRepository<Corp.Org>")).unwrap();
    let org_again = container.resolve(parse("Corp.IRepository<Corp.Org>")).unwrap();
    let user = container.resolve(parse("Corp.IRepository<Corp.User>")).unwrap();

    assert!(org.ptr_eq(&org_again));
    assert!(!org.ptr_eq(&user));
}

#[test]
fn declared_constraint_is_enforced() {
    let container = Container::new();
    container
        .register(
            parse("Corp.IRepository<T>"),
            repository().constrain("T", Constraint::implements(ty("IEntity"))),
            Lifetime::Transient,
        )
        .unwrap();
    container.declare_type(ty("Org"), [ty("IEntity")]).unwrap();

    assert_eq!(label(&container, "Corp.IRepository<Corp.Org>"), "Corp.Repository<Corp.Org>");

    let error = container.resolve(parse("Corp.IRepository<Corp.Invoice>")).unwrap_err();
    let ResolveError::GenericConstraintViolation {
        parameter,
        argument,
        constraint,
        ..
    } = &error
    else {
        panic!("unexpected error: {error}");
    };

    assert_eq!(&**parameter, "T");
    assert_eq!(argument, &ty("Invoice"));
    assert_eq!(constraint, "implements Corp.IEntity");
    assert_eq!(
        error.to_string(),
        "Corp.Invoice does not satisfy constraint `implements Corp.IEntity` of type parameter T of Corp.Repository<T> \
         while resolving Corp.IRepository<Corp.Invoice> (path: Corp.IRepository<Corp.Invoice>)"
    );
}

#[test]
fn predicate_constraint_is_enforced() {
    let container = Container::new();
    container
        .register(
            parse("Corp.IRepository<T>"),
            repository().constrain("T", Constraint::satisfies("is not generic", |arg| !arg.is_generic())),
            Lifetime::Transient,
        )
        .unwrap();

    assert!(container.resolve(parse("Corp.IRepository<Corp.Org>")).is_ok());
    assert!(matches!(
        container.resolve(parse("Corp.IRepository<Corp.List<Corp.Org>>")).unwrap_err(),
        ResolveError::GenericConstraintViolation { .. }
    ));
}

#[derive(Debug)]
struct EntitiesByConvention;

impl TypeCatalog for EntitiesByConvention {
    fn satisfies(&self, candidate: &TypeName, requirement: &TypeName) -> bool {
        requirement.name() == "IEntity" && candidate.namespace() == "Corp"
    }
}

#[test]
fn external_catalog_is_consulted() {
    let container = Container::with_options(ContainerOptions::new().type_catalog(EntitiesByConvention));
    container
        .register(
            parse("Corp.IRepository<T>"),
            repository().constrain("T", Constraint::implements(ty("IEntity"))),
            Lifetime::Transient,
        )
        .unwrap();

    assert!(container.resolve(parse("Corp.IRepository<Corp.Org>")).is_ok());
    assert!(container.resolve(parse("Corp.IRepository<External.Org>")).is_err());
}

#[test]
fn arity_mismatch_is_rejected() {
    let container = Container::new();

    let error = container
        .register(parse("Corp.IMap<K, V>"), repository(), Lifetime::Transient)
        .unwrap_err();

    assert!(matches!(error, RegistrationError::GenericArityMismatch { expected: 1, actual: 2, .. }));
    assert_eq!(
        error.to_string(),
        "open generic Corp.Repository<T> has 1 type parameters but Corp.IMap<K, V> has 2"
    );
}

#[test]
fn unknown_constraint_parameter_is_rejected() {
    let container = Container::new();

    let error = container
        .register(
            parse("Corp.IRepository<T>"),
            repository().constrain("TKey", Constraint::implements(ty("IEntity"))),
            Lifetime::Transient,
        )
        .unwrap_err();

    assert_eq!(error.to_string(), "open generic Corp.Repository<T> has no type parameter named `TKey`");
}
