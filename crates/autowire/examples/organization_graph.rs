// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wires a small organization directory:
//!
//! - two `IOrganizationService` interfaces that differ only by namespace
//! - a repository with several constructors, one of which needs a connection string
//! - a replicating decorator around the repository
//! - a per-request scope that disposes its unit of work

use std::error::Error;
use std::sync::Arc;

use autowire::{
    ConstructorDescriptor, Container, ContainerOptions, DecoratorDescriptor, Dispose, DisposeError, ImplementationDescriptor,
    Lifetime, Parameter, TypeName, ValueKind,
};
use tracing::Level;

trait OrganizationRepository: Send + Sync {
    fn find(&self, id: u32) -> String;
}

struct SqlRepository {
    connection: Arc<str>,
}

impl OrganizationRepository for SqlRepository {
    fn find(&self, id: u32) -> String {
        format!("org-{id}@{}", self.connection)
    }
}

struct Replicator {
    inner: Arc<dyn OrganizationRepository>,
}

impl OrganizationRepository for Replicator {
    fn find(&self, id: u32) -> String {
        format!("{} (replicated)", self.inner.find(id))
    }
}

struct UnitOfWork;

impl Dispose for UnitOfWork {
    fn dispose(&self) -> Result<(), DisposeError> {
        println!("unit of work committed");
        Ok(())
    }
}

struct BillingService {
    repository: Arc<dyn OrganizationRepository>,
}

struct IdentityService {
    repository: Arc<dyn OrganizationRepository>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let repository = TypeName::new("Directory.Data", "IOrganizationRepository");
    let billing = TypeName::new("Directory.Billing", "IOrganizationService");
    let identity = TypeName::new("Directory.Identity", "IOrganizationService");
    let unit_of_work = TypeName::new("Directory.Data", "IUnitOfWork");

    let container = Container::with_options(ContainerOptions::new().validate_scopes(true));

    // The greedy policy picks the constructor that takes the connection string.
    container.register(
        repository.clone(),
        ImplementationDescriptor::new(TypeName::new("Directory.Data", "SqlRepository"))
            .constructor(ConstructorDescriptor::new([], |_| {
                Ok(Arc::new(SqlRepository {
                    connection: Arc::from("in-memory"),
                }) as Arc<dyn OrganizationRepository>)
            }))
            .constructor(ConstructorDescriptor::new(
                [Parameter::value("connection", ValueKind::String)],
                |args| Ok(Arc::new(SqlRepository { connection: args.string(0)? }) as Arc<dyn OrganizationRepository>),
            ))
            .supply("connection", "sql://directory"),
        Lifetime::Singleton,
    )?;

    container.register_decorator(
        repository.clone(),
        DecoratorDescriptor::new(
            repository.clone(),
            ImplementationDescriptor::new(TypeName::new("Directory.Data", "Replicator")).constructor(
                ConstructorDescriptor::new([Parameter::service(repository.clone())], |args| {
                    Ok(Arc::new(Replicator {
                        inner: args.interface::<dyn OrganizationRepository>(0)?,
                    }) as Arc<dyn OrganizationRepository>)
                }),
            ),
        ),
    )?;

    container.register(
        unit_of_work.clone(),
        ImplementationDescriptor::new(TypeName::new("Directory.Data", "UnitOfWork"))
            .constructor(ConstructorDescriptor::new([], |_| Ok(UnitOfWork)))
            .disposable::<UnitOfWork>(),
        Lifetime::Scoped,
    )?;

    container.register(
        billing.clone(),
        ImplementationDescriptor::new(TypeName::new("Directory.Billing", "OrganizationService")).constructor(
            ConstructorDescriptor::new(
                [Parameter::service(repository.clone()), Parameter::service(unit_of_work)],
                |args| {
                    Ok(BillingService {
                        repository: args.interface::<dyn OrganizationRepository>(0)?,
                    })
                },
            ),
        ),
        Lifetime::Transient,
    )?;

    container.register(
        identity.clone(),
        ImplementationDescriptor::new(TypeName::new("Directory.Identity", "OrganizationService")).constructor(
            ConstructorDescriptor::new([Parameter::service(repository)], |args| {
                Ok(IdentityService {
                    repository: args.interface::<dyn OrganizationRepository>(0)?,
                })
            }),
        ),
        Lifetime::Singleton,
    )?;

    println!("{}", container.explain(billing.clone())?);

    let request = container.create_scope();
    let billing_service = request.resolve(billing)?;
    let identity_service = request.resolve(identity)?;

    if let (Some(billing), Some(identity)) = (
        billing_service.downcast::<BillingService>(),
        identity_service.downcast::<IdentityService>(),
    ) {
        println!("billing sees {}", billing.repository.find(7));
        println!("identity sees {}", identity.repository.find(7));
    }

    request.dispose()?;
    container.dispose()?;

    Ok(())
}
