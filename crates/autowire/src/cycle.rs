// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug, Display, Formatter};

use hashbrown::HashSet;

use crate::{ResolveError, ServiceKey};

/// Ordered chain of keys being resolved, outermost request first.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolutionPath(Vec<ServiceKey>);

impl ResolutionPath {
    /// The keys of the path, outermost first.
    #[must_use]
    pub fn keys(&self) -> &[ServiceKey] {
        &self.0
    }

    /// Number of keys on the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the path of a top-level request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ResolutionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some((first, rest)) = self.0.split_first() else {
            return f.write_str("<root>");
        };

        write!(f, "{first}")?;
        for key in rest {
            write!(f, " -> {key}")?;
        }

        Ok(())
    }
}

impl Debug for ResolutionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ResolutionPath({self})")
    }
}

/// Keys currently under construction within one resolve call.
///
/// The stack keeps the order for diagnostics; the set answers membership in constant time.
#[derive(Debug, Default)]
pub(crate) struct ActivePath {
    stack: Vec<ServiceKey>,
    active: HashSet<ServiceKey>,
}

impl ActivePath {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn snapshot(&self) -> ResolutionPath {
        ResolutionPath(self.stack.clone())
    }

    /// Pushes `key`, failing if it is already active.
    pub(crate) fn enter(&mut self, key: &ServiceKey) -> Result<(), ResolveError> {
        if self.active.contains(key) {
            let mut path = self.stack.clone();
            path.push(key.clone());

            return Err(ResolveError::CircularDependency {
                key: key.clone(),
                path: ResolutionPath(path),
            });
        }

        self.active.insert(key.clone());
        self.stack.push(key.clone());
        Ok(())
    }

    /// Pops the innermost key.
    pub(crate) fn leave(&mut self) {
        if let Some(key) = self.stack.pop() {
            self.active.remove(&key);
        }
    }
}
