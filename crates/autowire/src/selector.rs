// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};

use crate::descriptor::is_decoratee;
use crate::{ImplementationDescriptor, Parameter, ServiceKey, TypeName, ValueKind};

/// Strategy for choosing one constructor when an implementation declares several.
///
/// Only constructors whose parameters are all satisfiable take part in the choice. A service
/// parameter is satisfiable when exactly one binding answers it, a value parameter when a value of
/// the declared kind is supplied or the parameter is nullable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum ConstructorPolicy {
    /// The satisfiable constructor with the most parameters; ties go to the first declared.
    #[default]
    Greedy,
    /// The first constructor marked [`preferred`][crate::ConstructorDescriptor::preferred].
    ///
    /// Falls back to [`Greedy`][Self::Greedy] when no constructor is marked.
    ExplicitAttribute,
    /// The satisfiable constructor with the fewest parameters; ties go to the first declared.
    SmallestFirst,
}

impl Display for ConstructorPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greedy => "greedy",
            Self::ExplicitAttribute => "explicit_attribute",
            Self::SmallestFirst => "smallest_first",
        })
    }
}

/// Why a constructor parameter cannot be satisfied.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Unsatisfied {
    /// No binding answers the service parameter.
    NotRegistered,
    /// Several bindings answer the service parameter and none of them is the default.
    Ambiguous {
        /// Implementations of the competing bindings.
        candidates: Vec<TypeName>,
    },
    /// No value is supplied for a non-nullable value parameter.
    MissingValue,
    /// The supplied value has another kind than the parameter declares.
    ValueKindMismatch {
        /// Declared kind.
        expected: ValueKind,
        /// Kind of the supplied value.
        actual: ValueKind,
    },
}

impl Display for Unsatisfied {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered => f.write_str("no binding is registered"),
            Self::Ambiguous { candidates } => write!(f, "{} bindings match", candidates.len()),
            Self::MissingValue => f.write_str("no value is supplied"),
            Self::ValueKindMismatch { expected, actual } => write!(f, "expected a {expected} value, got a {actual}"),
        }
    }
}

/// The first unsatisfiable parameter of a rejected constructor.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstructorRejection {
    constructor: usize,
    parameter: usize,
    description: Parameter,
    reason: Unsatisfied,
}

impl ConstructorRejection {
    pub(crate) fn new(constructor: usize, parameter: usize, description: Parameter, reason: Unsatisfied) -> Self {
        Self {
            constructor,
            parameter,
            description,
            reason,
        }
    }

    /// Index of the rejected constructor in declaration order.
    #[must_use]
    pub fn constructor(&self) -> usize {
        self.constructor
    }

    /// Position of the unsatisfiable parameter.
    #[must_use]
    pub fn parameter(&self) -> usize {
        self.parameter
    }

    /// The unsatisfiable parameter.
    #[must_use]
    pub fn description(&self) -> &Parameter {
        &self.description
    }

    /// Why the parameter cannot be satisfied.
    #[must_use]
    pub fn reason(&self) -> &Unsatisfied {
        &self.reason
    }
}

impl Display for ConstructorRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "constructor #{} parameter #{} ({}): {}",
            self.constructor, self.parameter, self.description, self.reason
        )
    }
}

/// Shallow view of the registry used to judge service parameters.
pub(crate) trait ParameterLookup {
    fn lookup(&self, key: &ServiceKey) -> Result<(), Unsatisfied>;
}

/// Picks the constructor of `implementation` to invoke, or explains why none qualifies.
///
/// When `decoratee` is set, parameters of that service receive the decorated instance and are
/// always satisfiable.
pub(crate) fn select_constructor(
    policy: ConstructorPolicy,
    implementation: &ImplementationDescriptor,
    decoratee: Option<&TypeName>,
    lookup: &impl ParameterLookup,
) -> Result<usize, Vec<ConstructorRejection>> {
    let constructors = implementation.constructors();

    if policy == ConstructorPolicy::ExplicitAttribute
        && let Some(index) = constructors.iter().position(|constructor| constructor.is_preferred())
    {
        return match first_unsatisfied(implementation, index, decoratee, lookup) {
            Some(rejection) => Err(vec![rejection]),
            None => Ok(index),
        };
    }

    let mut rejections = Vec::new();
    let mut chosen: Option<usize> = None;

    for index in 0..constructors.len() {
        if let Some(rejection) = first_unsatisfied(implementation, index, decoratee, lookup) {
            rejections.push(rejection);
            continue;
        }

        let arity = constructors[index].arity();
        let better = chosen.is_none_or(|current| {
            let current = constructors[current].arity();
            match policy {
                ConstructorPolicy::SmallestFirst => arity < current,
                ConstructorPolicy::Greedy | ConstructorPolicy::ExplicitAttribute => arity > current,
            }
        });

        if better {
            chosen = Some(index);
        }
    }

    chosen.ok_or(rejections)
}

fn first_unsatisfied(
    implementation: &ImplementationDescriptor,
    index: usize,
    decoratee: Option<&TypeName>,
    lookup: &impl ParameterLookup,
) -> Option<ConstructorRejection> {
    let parameters = implementation.constructors()[index].parameters();

    parameters.iter().enumerate().find_map(|(position, parameter)| {
        let outcome = match parameter {
            Parameter::Service(_) if decoratee.is_some_and(|wraps| is_decoratee(parameter, wraps)) => Ok(()),
            Parameter::Service(key) => lookup.lookup(key),
            Parameter::Value { name, kind, nullable } => implementation.value_for(name, *kind, *nullable).map(drop),
        };

        outcome
            .err()
            .map(|reason| ConstructorRejection::new(index, position, parameter.clone(), reason))
    })
}
