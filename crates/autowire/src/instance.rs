// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::{Any, type_name};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::{ActivationError, TypeName, Value};

pub(crate) type SharedAny = Arc<dyn Any + Send + Sync>;

/// An object produced by the container.
///
/// Instances are cheap to clone; clones refer to the same object. Services consumed through an
/// interface are produced as `Arc<dyn Trait>` values and read back with [`Instance::interface`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use autowire::{Instance, TypeName};
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
///
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         42
///     }
/// }
///
/// let clock: Arc<dyn Clock> = Arc::new(FixedClock);
/// let instance = Instance::new(TypeName::new("Time", "FixedClock"), clock);
///
/// assert_eq!(instance.interface::<dyn Clock>().map(|clock| clock.now()), Some(42));
/// ```
#[derive(Clone)]
pub struct Instance {
    implementation: TypeName,
    value: SharedAny,
}

impl Instance {
    /// Wraps a value produced for the given implementation type.
    pub fn new<T: Any + Send + Sync>(implementation: TypeName, value: T) -> Self {
        Self {
            implementation,
            value: Arc::new(value),
        }
    }

    pub(crate) fn from_shared(implementation: TypeName, value: SharedAny) -> Self {
        Self { implementation, value }
    }

    /// The implementation type that produced this instance.
    #[must_use]
    pub fn implementation(&self) -> &TypeName {
        &self.implementation
    }

    /// Returns a shared handle to the value if it is a `T`.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Returns a reference to the value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns the interface handle if the value was produced as an `Arc<I>`.
    #[must_use]
    pub fn interface<I: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<I>> {
        self.value.downcast_ref::<Arc<I>>().map(Arc::clone)
    }

    /// Returns `true` if both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
    }
}

impl Debug for Instance {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("implementation", &self.implementation)
            .field("address", &Arc::as_ptr(&self.value).cast::<()>())
            .finish()
    }
}

/// One positional constructor argument.
#[derive(Clone, Debug)]
pub enum Argument {
    /// A resolved service, or the wrapped instance for a decorator.
    Service(Instance),
    /// A supplied primitive value.
    Value(Value),
}

/// Positional arguments handed to an activator.
///
/// The order matches the parameter order of the selected constructor.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    items: Vec<Argument>,
}

impl Arguments {
    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` for a parameterless constructor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The raw argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.items.get(index)
    }

    /// The service instance at `index`.
    pub fn instance(&self, index: usize) -> Result<&Instance, ActivationError> {
        match self.items.get(index) {
            Some(Argument::Service(instance)) => Ok(instance),
            Some(Argument::Value(_)) => Err(ActivationError::new(format!("argument #{index} is a value, not a service"))),
            None => Err(missing(index, self.items.len())),
        }
    }

    /// The service at `index`, downcast to its concrete type.
    pub fn service<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ActivationError> {
        let instance = self.instance(index)?;
        instance.downcast::<T>().ok_or_else(|| mismatch(index, instance, type_name::<T>()))
    }

    /// The service at `index` as an interface handle.
    pub fn interface<I: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<I>, ActivationError> {
        let instance = self.instance(index)?;
        instance
            .interface::<I>()
            .ok_or_else(|| mismatch(index, instance, type_name::<Arc<I>>()))
    }

    /// The value at `index`.
    pub fn value(&self, index: usize) -> Result<&Value, ActivationError> {
        match self.items.get(index) {
            Some(Argument::Value(value)) => Ok(value),
            Some(Argument::Service(_)) => Err(ActivationError::new(format!("argument #{index} is a service, not a value"))),
            None => Err(missing(index, self.items.len())),
        }
    }

    /// The string value at `index`.
    pub fn string(&self, index: usize) -> Result<Arc<str>, ActivationError> {
        self.optional_string(index)?
            .ok_or_else(|| ActivationError::new(format!("argument #{index} is null")))
    }

    /// The string value at `index`, or `None` for a null value.
    pub fn optional_string(&self, index: usize) -> Result<Option<Arc<str>>, ActivationError> {
        match self.value(index)? {
            Value::String(text) => Ok(Some(Arc::clone(text))),
            Value::Null => Ok(None),
            other => Err(value_mismatch(index, other, "string")),
        }
    }

    /// The integer value at `index`.
    pub fn integer(&self, index: usize) -> Result<i64, ActivationError> {
        self.optional_integer(index)?
            .ok_or_else(|| ActivationError::new(format!("argument #{index} is null")))
    }

    /// The integer value at `index`, or `None` for a null value.
    pub fn optional_integer(&self, index: usize) -> Result<Option<i64>, ActivationError> {
        match self.value(index)? {
            Value::Integer(value) => Ok(Some(*value)),
            Value::Null => Ok(None),
            other => Err(value_mismatch(index, other, "integer")),
        }
    }

    /// The float value at `index`.
    pub fn float(&self, index: usize) -> Result<f64, ActivationError> {
        let value = self.value(index)?;
        value.as_float().ok_or_else(|| value_mismatch(index, value, "float"))
    }

    /// The boolean value at `index`.
    pub fn boolean(&self, index: usize) -> Result<bool, ActivationError> {
        let value = self.value(index)?;
        value.as_bool().ok_or_else(|| value_mismatch(index, value, "bool"))
    }
}

impl FromIterator<Argument> for Arguments {
    fn from_iter<I: IntoIterator<Item = Argument>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

fn missing(index: usize, len: usize) -> ActivationError {
    ActivationError::new(format!("argument #{index} requested but the constructor received {len}"))
}

fn mismatch(index: usize, instance: &Instance, expected: &str) -> ActivationError {
    ActivationError::new(format!(
        "argument #{index} produced by {} is not a {expected}",
        instance.implementation()
    ))
}

fn value_mismatch(index: usize, value: &Value, expected: &str) -> ActivationError {
    ActivationError::new(format!("argument #{index} is {value}, expected a {expected}"))
}
