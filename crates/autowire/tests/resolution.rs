// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for binding selection, constructor selection and graph construction.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use autowire::{
    ActivationError, ConstructorDescriptor, ConstructorPolicy, Container, ContainerOptions, ImplementationDescriptor,
    Lifetime, NodeKind, Parameter, ResolveError, ServiceKey, TypeName, Unsatisfied, ValueKind,
};

#[derive(Debug)]
struct Bar;

#[derive(Debug)]
struct Foo {
    bar: Arc<Bar>,
}

fn ty(name: &str) -> TypeName {
    TypeName::new("Corp", name)
}

fn bar() -> ImplementationDescriptor {
    ImplementationDescriptor::new(ty("Bar")).constructor(ConstructorDescriptor::new([], |_| Ok(Bar)))
}

fn foo() -> ImplementationDescriptor {
    ImplementationDescriptor::new(ty("Foo")).constructor(ConstructorDescriptor::new([Parameter::service(ty("IBar"))], |args| {
        Ok(Foo {
            bar: args.service::<Bar>(0)?,
        })
    }))
}

fn unit(name: &str) -> ImplementationDescriptor {
    ImplementationDescriptor::new(ty(name)).constructor(ConstructorDescriptor::new([], |_| Ok(())))
}

#[test]
fn resolves_dependency_graph() {
    let container = Container::new();
    container.register(ty("IFoo"), foo(), Lifetime::Transient).unwrap();
    container.register(ty("IBar"), bar(), Lifetime::Transient).unwrap();

    let instance = container.resolve(ty("IFoo")).unwrap();

    assert_eq!(instance.implementation(), &ty("Foo"));
    let foo = instance.downcast::<Foo>().unwrap();
    assert_eq!(format!("{:?}", foo.bar), "Bar");
}

#[test]
fn transients_get_fresh_subgraphs() {
    let container = Container::new();
    container.register(ty("IFoo"), foo(), Lifetime::Transient).unwrap();
    container.register(ty("IBar"), bar(), Lifetime::Transient).unwrap();

    let first = container.resolve(ty("IFoo")).unwrap().downcast::<Foo>().unwrap();
    let second = container.resolve(ty("IFoo")).unwrap().downcast::<Foo>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first.bar, &second.bar));
}

#[test]
fn singleton_dependencies_are_shared() {
    let container = Container::new();
    container.register(ty("IFoo"), foo(), Lifetime::Transient).unwrap();
    container.register(ty("IBar"), bar(), Lifetime::Singleton).unwrap();

    let first = container.resolve(ty("IFoo")).unwrap().downcast::<Foo>().unwrap();
    let second = container.resolve(ty("IFoo")).unwrap().downcast::<Foo>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.bar, &second.bar));
}

#[test]
fn missing_dependency_is_reported_with_rejection() {
    let container = Container::new();
    container.register(ty("IFoo"), foo(), Lifetime::Transient).unwrap();

    let error = container.resolve(ty("IFoo")).unwrap_err();

    let ResolveError::NoResolvableConstructor { rejections, .. } = &error else {
        panic!("unexpected error: {error}");
    };
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].reason(), &Unsatisfied::NotRegistered);
    assert_eq!(
        error.to_string(),
        "no constructor of Corp.Foo is resolvable for Corp.IFoo: constructor #0 parameter #0 (Corp.IBar): no binding is registered (path: Corp.IFoo)"
    );
}

#[test]
fn unregistered_key_is_not_registered() {
    let container = Container::new();

    let error = container.resolve(ty("IFoo")).unwrap_err();

    assert!(matches!(error, ResolveError::NotRegistered { .. }));
    assert_eq!(error.to_string(), "no binding is registered for Corp.IFoo (path: <root>)");
}

#[test]
fn two_unnamed_bindings_are_ambiguous() {
    let container = Container::new();
    container.register(ty("IFoo"), unit("FooA"), Lifetime::Transient).unwrap();
    container.register(ty("IFoo"), unit("FooB"), Lifetime::Transient).unwrap();

    let error = container.resolve(ty("IFoo")).unwrap_err();

    let ResolveError::AmbiguousRegistration { key, candidates, .. } = error else {
        panic!("expected an ambiguity");
    };
    assert_eq!(key, ServiceKey::new(ty("IFoo")));
    assert_eq!(candidates, [ty("FooA"), ty("FooB")]);
}

#[test]
fn names_tell_bindings_apart() {
    let container = Container::new();
    container.register(ServiceKey::named(ty("IFoo"), "a"), unit("FooA"), Lifetime::Transient).unwrap();
    container.register(ServiceKey::named(ty("IFoo"), "b"), unit("FooB"), Lifetime::Transient).unwrap();

    assert_eq!(container.resolve(ServiceKey::named(ty("IFoo"), "b")).unwrap().implementation(), &ty("FooB"));
    assert!(matches!(
        container.resolve(ty("IFoo")).unwrap_err(),
        ResolveError::AmbiguousRegistration { .. }
    ));
}

#[test]
fn unnamed_binding_is_the_default_among_named_ones() {
    let container = Container::new();
    container.register(ServiceKey::named(ty("IFoo"), "archive"), unit("ArchiveFoo"), Lifetime::Transient).unwrap();
    container.register(ty("IFoo"), unit("Foo"), Lifetime::Transient).unwrap();

    assert_eq!(container.resolve(ty("IFoo")).unwrap().implementation(), &ty("Foo"));
}

#[test]
fn same_simple_name_in_other_namespace_is_distinct() {
    let container = Container::new();
    container
        .register(TypeName::new("Billing", "IOrganizationService"), unit("BillingOrganizations"), Lifetime::Singleton)
        .unwrap();
    container
        .register(TypeName::new("Identity", "IOrganizationService"), unit("IdentityOrganizations"), Lifetime::Singleton)
        .unwrap();

    let billing = container.resolve(TypeName::new("Billing", "IOrganizationService")).unwrap();
    let identity = container.resolve(TypeName::new("Identity", "IOrganizationService")).unwrap();

    assert_eq!(billing.implementation(), &ty("BillingOrganizations"));
    assert_eq!(identity.implementation(), &ty("IdentityOrganizations"));
}

fn repository() -> ImplementationDescriptor {
    let constructor = |label: &'static str, parameters: Vec<Parameter>| {
        ConstructorDescriptor::new(parameters, move |_| Ok(label))
    };

    ImplementationDescriptor::new(ty("Repository"))
        .constructor(constructor("empty", vec![]))
        .constructor(constructor("with_bar", vec![Parameter::service(ty("IBar"))]).preferred())
        .constructor(constructor(
            "with_bar_and_missing",
            vec![Parameter::service(ty("IBar")), Parameter::service(ty("IMissing"))],
        ))
        .constructor(constructor(
            "with_bar_and_connection",
            vec![Parameter::service(ty("IBar")), Parameter::value("connection", ValueKind::String)],
        ))
        .supply("connection", "Server=db")
}

fn resolve_repository(policy: ConstructorPolicy) -> &'static str {
    let container = Container::with_options(ContainerOptions::new().constructor_policy(policy));
    container.register(ty("IRepository"), repository(), Lifetime::Transient).unwrap();
    container.register(ty("IBar"), bar(), Lifetime::Transient).unwrap();

    *container.resolve(ty("IRepository")).unwrap().downcast_ref::<&'static str>().unwrap()
}

#[test]
fn constructor_policies() {
    assert_eq!(resolve_repository(ConstructorPolicy::Greedy), "with_bar_and_connection");
    assert_eq!(resolve_repository(ConstructorPolicy::SmallestFirst), "empty");
    assert_eq!(resolve_repository(ConstructorPolicy::ExplicitAttribute), "with_bar");
}

#[test]
fn explain_shows_plan_without_constructing() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);

    let container = Container::new();
    container.register(ty("IFoo"), foo(), Lifetime::Transient).unwrap();
    container
        .register(
            ty("IBar"),
            ImplementationDescriptor::new(ty("Bar")).constructor(ConstructorDescriptor::new([], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bar)
            })),
            Lifetime::Singleton,
        )
        .unwrap();

    let plan = container.explain(ty("IFoo")).unwrap();

    assert_eq!(plan.kind(), NodeKind::Implementation);
    assert_eq!(plan.node_count(), 2);
    assert_eq!(plan.depth(), 2);
    assert_eq!(
        plan.to_string(),
        "Corp.IFoo => Corp.Foo [transient, constructor #0]\n  Corp.IBar => Corp.Bar [singleton, cached, constructor #0]\n"
    );
    assert_eq!(constructed.load(Ordering::SeqCst), 0);
}

#[test]
fn resolve_all_returns_every_binding_in_order() {
    let container = Container::new();
    container.register(ty("IPlugin"), unit("Audit"), Lifetime::Transient).unwrap();
    container.register(ServiceKey::named(ty("IPlugin"), "metrics"), unit("Metrics"), Lifetime::Singleton).unwrap();
    container.register(ty("IPlugin"), unit("Export"), Lifetime::Transient).unwrap();

    let plugins: Vec<_> = container
        .resolve_all(ty("IPlugin"))
        .unwrap()
        .iter()
        .map(|plugin| plugin.implementation().name().to_owned())
        .collect();

    assert_eq!(plugins, ["Audit", "Metrics", "Export"]);
    assert!(container.resolve_all(ty("INothing")).unwrap().is_empty());
}

#[test]
fn activation_failure_names_the_implementation() {
    let container = Container::new();
    container
        .register(
            ty("IStore"),
            ImplementationDescriptor::new(ty("Store")).constructor(ConstructorDescriptor::new(
                [Parameter::nullable("connection", ValueKind::String)],
                |args| match args.optional_string(0)? {
                    Some(connection) => Ok(connection),
                    None => Err(ActivationError::new("connection string is required")),
                },
            )),
            Lifetime::Transient,
        )
        .unwrap();

    let error = container.resolve(ty("IStore")).unwrap_err();

    assert!(matches!(&error, ResolveError::Activation { implementation, .. } if implementation == &ty("Store")));
    assert_eq!(
        std::error::Error::source(&error).map(ToString::to_string).as_deref(),
        Some("connection string is required")
    );
}

#[test]
fn integer_is_accepted_for_float_parameter() {
    let container = Container::new();
    container
        .register(
            ty("IRate"),
            ImplementationDescriptor::new(ty("Rate"))
                .constructor(ConstructorDescriptor::new(
                    [Parameter::value("ratio", ValueKind::Float)],
                    |args| args.float(0),
                ))
                .supply("ratio", 2),
            Lifetime::Transient,
        )
        .unwrap();

    let rate = container.resolve(ty("IRate")).unwrap();

    assert_eq!(rate.downcast_ref::<f64>(), Some(&2.0));
}

#[test]
fn failed_singleton_can_be_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let container = Container::new();
    container
        .register(
            ty("IClock"),
            ImplementationDescriptor::new(ty("Clock")).constructor(ConstructorDescriptor::new([], move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ActivationError::new("time source unavailable"))
                } else {
                    Ok(())
                }
            })),
            Lifetime::Singleton,
        )
        .unwrap();

    assert!(container.resolve(ty("IClock")).is_err());
    let first = container.resolve(ty("IClock")).unwrap();
    let second = container.resolve(ty("IClock")).unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn wide_graph_resolves_fully() {
    const LEAVES: usize = 200;

    let container = Container::new();
    let leaves: Vec<_> = (0..LEAVES).map(|index| ty(&format!("ILeaf{index}"))).collect();

    for (index, leaf) in leaves.iter().enumerate() {
        container
            .register(leaf.clone(), unit(&format!("Leaf{index}")), Lifetime::Transient)
            .unwrap();
    }
    container
        .register(
            ty("IRoot"),
            ImplementationDescriptor::new(ty("Root")).constructor(ConstructorDescriptor::new(
                leaves.iter().cloned().map(Parameter::service),
                |args| Ok(args.len()),
            )),
            Lifetime::Transient,
        )
        .unwrap();

    let root = container.resolve(ty("IRoot")).unwrap();

    assert_eq!(root.downcast_ref::<usize>(), Some(&LEAVES));
    assert_eq!(container.explain(ty("IRoot")).unwrap().node_count(), LEAVES + 1);
}
