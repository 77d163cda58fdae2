// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use crate::cycle::ActivePath;
use crate::descriptor::is_decoratee;
use crate::graph::{NodeKind, PlannedArgument, ResolutionNode};
use crate::lifetime::SlotKey;
use crate::registry::{Binding, Registry};
use crate::selector::{ConstructorRejection, select_constructor};
use crate::{
    ContainerOptions, ImplementationDescriptor, Implementation, Lifetime, Parameter, ResolveError, ServiceKey, TypeCatalog,
    TypeName, Unsatisfied,
};

/// Expands a requested key into a tree of [`ResolutionNode`]s without constructing anything.
///
/// A planner serves one resolve call: it owns the active path used for cycle detection and
/// tracks the outermost singleton being planned for scope validation.
pub(crate) struct Planner<'a> {
    registry: &'a Registry,
    options: &'a ContainerOptions,
    path: ActivePath,
    singleton: Option<ServiceKey>,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(registry: &'a Registry, options: &'a ContainerOptions) -> Self {
        Self {
            registry,
            options,
            path: ActivePath::new(),
            singleton: None,
        }
    }

    /// Plans the single binding that answers `key`.
    pub(crate) fn plan(&mut self, key: &ServiceKey) -> Result<Arc<ResolutionNode>, ResolveError> {
        let binding = self
            .registry
            .select(key)
            .map_err(|reason| self.lookup_error(key, reason))?;

        self.plan_binding(key, binding)
    }

    /// Plans every binding that answers `key`, in registration order.
    pub(crate) fn plan_all(&mut self, key: &ServiceKey) -> Result<Vec<Arc<ResolutionNode>>, ResolveError> {
        self.registry
            .bindings_for(key)
            .into_iter()
            .map(|binding| self.plan_binding(key, binding))
            .collect()
    }

    fn plan_binding(&mut self, requested: &ServiceKey, binding: &'a Binding) -> Result<Arc<ResolutionNode>, ResolveError> {
        // The path holds the binding's own key so that named and unnamed requests for the same
        // binding are recognized as the same node.
        let key = match binding.key.name() {
            Some(name) => requested.with_name(name),
            None => requested.unnamed(),
        };

        // Cycles are reported even when they close exactly at the depth limit.
        self.path.enter(&key)?;
        if self.path.depth() > self.options.get_max_depth() {
            self.path.leave();
            return Err(ResolveError::DepthExceeded {
                key,
                max_depth: self.options.get_max_depth(),
                path: self.path.snapshot(),
            });
        }

        let outer_singleton = self.singleton.clone();
        let result = self.plan_chain(&key, binding);
        self.singleton = outer_singleton;
        self.path.leave();

        result.map(Arc::new)
    }

    fn plan_chain(&mut self, key: &ServiceKey, binding: &'a Binding) -> Result<ResolutionNode, ResolveError> {
        match binding.lifetime {
            Lifetime::Scoped if self.options.get_validate_scopes() => {
                if let Some(singleton) = &self.singleton {
                    return Err(ResolveError::ScopeViolation {
                        singleton: singleton.clone(),
                        scoped: key.clone(),
                        path: self.path.snapshot(),
                    });
                }
            }
            Lifetime::Singleton if self.singleton.is_none() => self.singleton = Some(key.clone()),
            _ => {}
        }

        let implementation = self.specialize(key, binding)?;
        let mut node = self.plan_node(key, binding, &implementation, NodeKind::Implementation, None)?;

        for decorator in self.registry.decorators_for(key.service(), binding) {
            let decoratee = (decorator.wraps(), Arc::new(node));
            node = self.plan_node(key, binding, decorator.implementation(), NodeKind::Decorator, Some(decoratee))?;
        }

        if binding.lifetime != Lifetime::Transient {
            node.slot = Some(SlotKey {
                binding: binding.id,
                service: key.service().clone(),
            });
        }

        Ok(node)
    }

    fn specialize(&self, key: &ServiceKey, binding: &'a Binding) -> Result<Cow<'a, ImplementationDescriptor>, ResolveError> {
        let generic = match &binding.implementation {
            Implementation::Closed(descriptor) => return Ok(Cow::Borrowed(descriptor)),
            Implementation::Generic(generic) => generic,
        };

        let declared: &dyn TypeCatalog = self.registry.types();
        let catalogs: Vec<&dyn TypeCatalog> = std::iter::once(declared).chain(self.options.get_type_catalog()).collect();

        generic
            .check(key.service().args(), &catalogs)
            .map_err(|violation| ResolveError::GenericConstraintViolation {
                key: key.clone(),
                implementation: generic.template().clone(),
                parameter: violation.parameter,
                argument: violation.argument,
                constraint: violation.constraint,
                path: self.path.snapshot(),
            })?;

        Ok(Cow::Owned(generic.specialize(key.service().args())))
    }

    fn plan_node(
        &mut self,
        key: &ServiceKey,
        binding: &'a Binding,
        implementation: &ImplementationDescriptor,
        kind: NodeKind,
        decoratee: Option<(&TypeName, Arc<ResolutionNode>)>,
    ) -> Result<ResolutionNode, ResolveError> {
        let wraps = decoratee.as_ref().map(|(wraps, _)| *wraps);
        let index = select_constructor(self.options.get_constructor_policy(), implementation, wraps, self.registry).map_err(
            |rejections| ResolveError::NoResolvableConstructor {
                key: key.clone(),
                implementation: implementation.type_name().clone(),
                rejections,
                path: self.path.snapshot(),
            },
        )?;

        let constructor = &implementation.constructors()[index];
        let mut arguments = Vec::with_capacity(constructor.arity());

        for (position, parameter) in constructor.parameters().iter().enumerate() {
            let argument = match (parameter, &decoratee) {
                (Parameter::Service(_), Some((wraps, inner))) if is_decoratee(parameter, wraps) => {
                    PlannedArgument::Decoratee(Arc::clone(inner))
                }
                (Parameter::Service(dependency), _) => PlannedArgument::Service(self.plan(dependency)?),
                (Parameter::Value { name, kind, nullable }, _) => PlannedArgument::Value {
                    name: Arc::clone(name),
                    value: implementation.value_for(name, *kind, *nullable).map_err(|reason| {
                        ResolveError::NoResolvableConstructor {
                            key: key.clone(),
                            implementation: implementation.type_name().clone(),
                            rejections: vec![ConstructorRejection::new(index, position, parameter.clone(), reason)],
                            path: self.path.snapshot(),
                        }
                    })?,
                },
            };
            arguments.push(argument);
        }

        Ok(ResolutionNode {
            key: key.clone(),
            binding: binding.id,
            implementation: implementation.type_name().clone(),
            kind,
            lifetime: binding.lifetime,
            constructor: index,
            arguments,
            slot: None,
            activator: Arc::clone(constructor.activator()),
            disposer: implementation.disposer().cloned(),
        })
    }

    fn lookup_error(&self, key: &ServiceKey, reason: Unsatisfied) -> ResolveError {
        match reason {
            Unsatisfied::Ambiguous { candidates } => ResolveError::AmbiguousRegistration {
                key: key.clone(),
                candidates,
                path: self.path.snapshot(),
            },
            _ => ResolveError::NotRegistered {
                key: key.clone(),
                path: self.path.snapshot(),
            },
        }
    }
}
