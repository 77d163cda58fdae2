// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Flat constructor-shape descriptions of registrable types.
//!
//! The engine never reflects over real types. Each implementation is described by the
//! constructors it offers: the ordered parameters each constructor takes and an activator
//! closure that builds the object once the arguments are resolved.

use std::any::{Any, type_name};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use hashbrown::HashMap;

use crate::instance::SharedAny;
use crate::{ActivationError, Arguments, Dispose, DisposeError, Instance, ServiceKey, TypeName, Unsatisfied, Value, ValueKind};

pub(crate) type Activator = Arc<dyn Fn(&Arguments) -> Result<SharedAny, ActivationError> + Send + Sync>;

pub(crate) type Disposer = Arc<dyn Fn(&Instance) -> Result<(), DisposeError> + Send + Sync>;

/// One constructor parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    /// A dependency resolved from the registry.
    Service(ServiceKey),
    /// A primitive value supplied by the implementation descriptor.
    Value {
        /// Parameter name used to look up the supplied value.
        name: Arc<str>,
        /// Declared kind of the value.
        kind: ValueKind,
        /// Whether the parameter accepts [`Value::Null`], which is also its default.
        nullable: bool,
    },
}

impl Parameter {
    /// A dependency on the given service.
    pub fn service(key: impl Into<ServiceKey>) -> Self {
        Self::Service(key.into())
    }

    /// A required primitive value.
    pub fn value(name: impl AsRef<str>, kind: ValueKind) -> Self {
        Self::Value {
            name: Arc::from(name.as_ref()),
            kind,
            nullable: false,
        }
    }

    /// A nullable primitive value; defaults to [`Value::Null`] when nothing is supplied.
    pub fn nullable(name: impl AsRef<str>, kind: ValueKind) -> Self {
        Self::Value {
            name: Arc::from(name.as_ref()),
            kind,
            nullable: true,
        }
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(key) => write!(f, "{key}"),
            Self::Value { name, kind, nullable: false } => write!(f, "{name}: {kind}"),
            Self::Value { name, kind, nullable: true } => write!(f, "{name}: {kind}?"),
        }
    }
}

/// A constructor signature together with the activator that invokes it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use autowire::{ConstructorDescriptor, Parameter, TypeName, ValueKind};
///
/// struct Bar;
/// struct Foo {
///     bar: Arc<Bar>,
///     region: Arc<str>,
/// }
///
/// let constructor = ConstructorDescriptor::new(
///     [
///         Parameter::service(TypeName::new("Corp", "IBar")),
///         Parameter::value("region", ValueKind::String),
///     ],
///     |args| {
///         Ok(Foo {
///             bar: args.service::<Bar>(0)?,
///             region: args.string(1)?,
///         })
///     },
/// );
///
/// assert_eq!(constructor.arity(), 2);
/// ```
#[derive(Clone)]
pub struct ConstructorDescriptor {
    parameters: Vec<Parameter>,
    preferred: bool,
    activator: Activator,
}

impl ConstructorDescriptor {
    /// Creates a constructor taking `parameters`, built by `activator`.
    pub fn new<T, F>(parameters: impl IntoIterator<Item = Parameter>, activator: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> Result<T, ActivationError> + Send + Sync + 'static,
    {
        Self {
            parameters: parameters.into_iter().collect(),
            preferred: false,
            activator: Arc::new(move |args: &Arguments| activator(args).map(|value| Arc::new(value) as SharedAny)),
        }
    }

    /// Marks this constructor as the explicitly preferred one.
    ///
    /// Only [`ConstructorPolicy::ExplicitAttribute`][crate::ConstructorPolicy::ExplicitAttribute]
    /// honors the marker.
    #[must_use]
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    /// The parameters in positional order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Number of parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Returns `true` if the constructor carries the preferred marker.
    #[must_use]
    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub(crate) fn activator(&self) -> &Activator {
        &self.activator
    }
}

impl Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("parameters", &self.parameters)
            .field("preferred", &self.preferred)
            .finish_non_exhaustive()
    }
}

/// Describes a buildable implementation: its type, constructors, supplied values and disposal.
#[derive(Clone)]
pub struct ImplementationDescriptor {
    type_name: TypeName,
    constructors: Vec<ConstructorDescriptor>,
    values: HashMap<Arc<str>, Value>,
    disposer: Option<Disposer>,
}

impl ImplementationDescriptor {
    /// Creates a descriptor without constructors.
    #[must_use]
    pub fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            constructors: Vec::new(),
            values: HashMap::new(),
            disposer: None,
        }
    }

    /// Adds a constructor; constructors keep their declaration order.
    #[must_use]
    pub fn constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Supplies the value for the value parameter named `name`.
    #[must_use]
    pub fn supply(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.values.insert(Arc::from(name.as_ref()), value.into());
        self
    }

    /// Declares that instances are `T` (or `Arc<T>`) and are torn down through [`Dispose`].
    #[must_use]
    pub fn disposable<T: Dispose + Any + Send + Sync>(self) -> Self {
        self.dispose_with(|instance| {
            if let Some(value) = instance.downcast_ref::<T>() {
                return value.dispose();
            }

            instance
                .downcast_ref::<Arc<T>>()
                .ok_or_else(|| DisposeError::new(format!("instance of {} is not a {}", instance.implementation(), type_name::<T>())))?
                .dispose()
        })
    }

    /// Declares that instances are `Arc<I>` interface handles torn down through [`Dispose`].
    #[must_use]
    pub fn disposable_as<I: ?Sized + Dispose + Send + Sync + 'static>(self) -> Self {
        self.dispose_with(|instance| {
            instance
                .interface::<I>()
                .ok_or_else(|| DisposeError::new(format!("instance of {} is not an Arc<{}>", instance.implementation(), type_name::<I>())))?
                .dispose()
        })
    }

    /// Declares a custom teardown for instances.
    #[must_use]
    pub fn dispose_with<F>(mut self, disposer: F) -> Self
    where
        F: Fn(&Instance) -> Result<(), DisposeError> + Send + Sync + 'static,
    {
        self.disposer = Some(Arc::new(disposer));
        self
    }

    /// The implementation type.
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// The constructors, in declaration order.
    #[must_use]
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// The supplied value for `name`, if any.
    #[must_use]
    pub fn supplied(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns `true` if instances expose a disposal capability.
    #[must_use]
    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    pub(crate) fn disposer(&self) -> Option<&Disposer> {
        self.disposer.as_ref()
    }

    /// Resolves the value for a value parameter: the supplied value, or null when nullable.
    pub(crate) fn value_for(&self, name: &str, kind: ValueKind, nullable: bool) -> Result<Value, Unsatisfied> {
        let supplied = self.values.get(name).and_then(|value| value.kind().map(|actual| (value, actual)));

        match supplied {
            None if nullable => Ok(Value::Null),
            None => Err(Unsatisfied::MissingValue),
            Some((value, actual)) if actual == kind => Ok(value.clone()),
            Some((Value::Integer(value), _)) if kind == ValueKind::Float => Ok(Value::Float(widen(*value))),
            Some((_, actual)) => Err(Unsatisfied::ValueKindMismatch { expected: kind, actual }),
        }
    }
}

#[expect(clippy::cast_precision_loss, reason = "Integers are accepted where floats are expected")]
fn widen(value: i64) -> f64 {
    value as f64
}

impl Debug for ImplementationDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationDescriptor")
            .field("type_name", &self.type_name)
            .field("constructors", &self.constructors)
            .field("values", &self.values)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// An implementation that wraps another implementation of the same service.
///
/// Every constructor of the decorator takes exactly one parameter of the wrapped interface;
/// that parameter receives the instance being decorated.
#[derive(Clone, Debug)]
pub struct DecoratorDescriptor {
    wraps: TypeName,
    implementation: ImplementationDescriptor,
}

impl DecoratorDescriptor {
    /// Creates a decorator of `wraps` built from `implementation`.
    #[must_use]
    pub fn new(wraps: TypeName, implementation: ImplementationDescriptor) -> Self {
        Self { wraps, implementation }
    }

    /// The interface this decorator wraps.
    #[must_use]
    pub fn wraps(&self) -> &TypeName {
        &self.wraps
    }

    /// The decorator implementation.
    #[must_use]
    pub fn implementation(&self) -> &ImplementationDescriptor {
        &self.implementation
    }

    /// Number of parameters of `constructor` that receive the wrapped instance.
    pub(crate) fn decoratee_count(&self, constructor: &ConstructorDescriptor) -> usize {
        constructor
            .parameters()
            .iter()
            .filter(|parameter| is_decoratee(parameter, &self.wraps))
            .count()
    }
}

/// Returns `true` if `parameter` receives the instance wrapped by a decorator of `wraps`.
pub(crate) fn is_decoratee(parameter: &Parameter, wraps: &TypeName) -> bool {
    matches!(parameter, Parameter::Service(key) if key.service() == wraps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ImplementationDescriptor {
        ImplementationDescriptor::new(TypeName::new("Corp", "Store"))
            .supply("connection", "Server=db")
            .supply("retries", 3)
    }

    #[test]
    fn supplied_values_are_checked_against_kind() {
        let descriptor = descriptor();

        assert_eq!(
            descriptor.value_for("connection", ValueKind::String, false),
            Ok(Value::from("Server=db"))
        );
        assert_eq!(
            descriptor.value_for("retries", ValueKind::String, false),
            Err(Unsatisfied::ValueKindMismatch {
                expected: ValueKind::String,
                actual: ValueKind::Integer,
            })
        );
    }

    #[test]
    fn integers_widen_to_floats() {
        let descriptor = descriptor().supply("ratio", 2);

        assert_eq!(descriptor.value_for("ratio", ValueKind::Float, false), Ok(Value::Float(2.0)));
        assert_eq!(
            descriptor.value_for("ratio", ValueKind::Bool, false),
            Err(Unsatisfied::ValueKindMismatch {
                expected: ValueKind::Bool,
                actual: ValueKind::Integer,
            })
        );
    }

    #[test]
    fn missing_values_default_only_when_nullable() {
        let descriptor = descriptor();

        assert_eq!(descriptor.value_for("timeout", ValueKind::Integer, true), Ok(Value::Null));
        assert_eq!(
            descriptor.value_for("timeout", ValueKind::Integer, false),
            Err(Unsatisfied::MissingValue)
        );
    }

    #[test]
    fn decoratee_parameters_match_wrapped_service_only() {
        let wraps = TypeName::new("Corp", "IStore");
        let constructor = ConstructorDescriptor::new(
            [
                Parameter::service(wraps.clone()),
                Parameter::service(TypeName::new("Corp", "ILog")),
                Parameter::value("name", ValueKind::String),
            ],
            |_| Ok(()),
        );
        let decorator = DecoratorDescriptor::new(
            wraps,
            ImplementationDescriptor::new(TypeName::new("Corp", "StoreReplicator")).constructor(constructor.clone()),
        );

        assert_eq!(decorator.decoratee_count(&constructor), 1);
    }

    #[test]
    fn parameter_display() {
        assert_eq!(Parameter::service(TypeName::new("Corp", "IBar")).to_string(), "Corp.IBar");
        assert_eq!(Parameter::nullable("limit", ValueKind::Integer).to_string(), "limit: integer?");
    }
}
