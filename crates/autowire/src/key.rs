// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use crate::{ParseTypeNameError, TypeName};

/// Identity of a requested capability: a service type plus an optional registration name.
///
/// The name disambiguates several bindings of the same service. An unnamed key asks for the
/// default binding of the service, a named key asks for exactly that registration.
///
/// # Examples
///
/// ```
/// use autowire::{ServiceKey, TypeName};
///
/// let default = ServiceKey::new(TypeName::new("Corp.Users", "IUserService"));
/// let reseller = default.with_name("reseller");
///
/// assert_ne!(default, reseller);
/// assert_eq!(reseller.to_string(), "Corp.Users.IUserService#reseller");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    service: TypeName,
    name: Option<Arc<str>>,
}

impl ServiceKey {
    /// Creates an unnamed key for the given service type.
    #[must_use]
    pub fn new(service: TypeName) -> Self {
        Self { service, name: None }
    }

    /// Creates a key for a named registration of the given service type.
    #[must_use]
    pub fn named(service: TypeName, name: impl AsRef<str>) -> Self {
        Self {
            service,
            name: Some(Arc::from(name.as_ref())),
        }
    }

    /// Returns a copy of this key with the given registration name.
    #[must_use]
    pub fn with_name(&self, name: impl AsRef<str>) -> Self {
        Self::named(self.service.clone(), name)
    }

    /// Returns a copy of this key without a registration name.
    #[must_use]
    pub fn unnamed(&self) -> Self {
        Self::new(self.service.clone())
    }

    /// The requested service type.
    #[must_use]
    pub fn service(&self) -> &TypeName {
        &self.service
    }

    /// The registration name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn with_service(&self, service: TypeName) -> Self {
        Self {
            service,
            name: self.name.clone(),
        }
    }
}

impl From<TypeName> for ServiceKey {
    fn from(service: TypeName) -> Self {
        Self::new(service)
    }
}

impl FromStr for ServiceKey {
    type Err = ParseTypeNameError;

    /// Parses `Namespace.Service<Args>` or `Namespace.Service<Args>#name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((service, name)) = s.rsplit_once('#') else {
            return Ok(Self::new(s.parse()?));
        };

        let service = service.parse()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseTypeNameError::new(s, s.len(), "expected a registration name after `#`"));
        }

        Ok(Self::named(service, name))
    }
}

impl Display for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}#{name}", self.service),
            None => write!(f, "{}", self.service),
        }
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({self})")
    }
}
