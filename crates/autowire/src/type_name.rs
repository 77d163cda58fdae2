// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Qualified identity of a type: namespace, simple name and generic arguments.
///
/// Two type names are equal only if all three parts are equal, so `Billing.IOrganizationService`
/// and `Identity.IOrganizationService` are distinct services even though their simple names match.
///
/// The textual form is `Namespace.Sub.Name<Arg1, Arg2>`, where each argument is itself a type name.
/// The last dot-separated segment is the simple name, everything before it is the namespace.
///
/// # Examples
///
/// ```
/// use autowire::TypeName;
///
/// let repository: TypeName = "Corp.Data.IRepository<Corp.Orgs.Organization, Corp.Users.User>".parse()?;
///
/// assert_eq!(repository.namespace(), "Corp.Data");
/// assert_eq!(repository.name(), "IRepository");
/// assert_eq!(repository.arity(), 2);
/// assert_eq!(repository.args()[1], TypeName::new("Corp.Users", "User"));
/// # Ok::<(), autowire::ParseTypeNameError>(())
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    namespace: Arc<str>,
    name: Arc<str>,
    args: Arc<[Self]>,
}

impl TypeName {
    /// Creates a non-generic type name.
    #[must_use]
    pub fn new(namespace: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            namespace: Arc::from(namespace.as_ref()),
            name: Arc::from(name.as_ref()),
            args: Arc::from([]),
        }
    }

    /// Returns a copy of this type name carrying the given generic arguments.
    #[must_use]
    pub fn with_args(&self, args: impl IntoIterator<Item = Self>) -> Self {
        Self {
            namespace: Arc::clone(&self.namespace),
            name: Arc::clone(&self.name),
            args: args.into_iter().collect(),
        }
    }

    /// The dot-separated namespace; empty for types declared at the root.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The simple name without namespace or generic arguments.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The generic arguments, in declaration order.
    #[must_use]
    pub fn args(&self) -> &[Self] {
        &self.args
    }

    /// Number of generic arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` if the type carries generic arguments.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }

    /// The generic definition this type is an instance of.
    #[must_use]
    pub fn definition(&self) -> GenericDefinition {
        GenericDefinition {
            namespace: Arc::clone(&self.namespace),
            name: Arc::clone(&self.name),
            arity: self.args.len(),
        }
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}.", self.namespace)?;
        }
        f.write_str(&self.name)?;

        if let Some((first, rest)) = self.args.split_first() {
            write!(f, "<{first}")?;
            for arg in rest {
                write!(f, ", {arg}")?;
            }
            f.write_str(">")?;
        }

        Ok(())
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({self})")
    }
}

impl FromStr for TypeName {
    type Err = ParseTypeNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            input: s,
            position: 0,
            depth: 0,
        };
        let parsed = parser.type_name()?;
        parser.skip_whitespace();

        if parser.position != s.len() {
            return Err(parser.error("unexpected trailing input"));
        }

        Ok(parsed)
    }
}

/// Identity of an open generic type: namespace, simple name and number of type parameters.
///
/// Open generic bindings are looked up by definition, so `IRepository<A, B>` and
/// `IRepository<C, D>` share the definition `IRepository<,>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericDefinition {
    namespace: Arc<str>,
    name: Arc<str>,
    arity: usize,
}

impl GenericDefinition {
    /// Number of type parameters of the definition.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl Display for GenericDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}.", self.namespace)?;
        }
        f.write_str(&self.name)?;

        if self.arity > 0 {
            write!(f, "<{}>", ",".repeat(self.arity - 1))?;
        }

        Ok(())
    }
}

/// Error returned when a string is not a valid [`TypeName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type name `{input}` at offset {position}: {reason}")]
pub struct ParseTypeNameError {
    input: String,
    position: usize,
    reason: &'static str,
}

impl ParseTypeNameError {
    pub(crate) fn new(input: &str, position: usize, reason: &'static str) -> Self {
        Self {
            input: input.to_owned(),
            position,
            reason,
        }
    }

    /// Byte offset in the input where parsing failed.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Deepest generic argument nesting accepted by the parser.
const MAX_NESTING: usize = 64;

struct Parser<'a> {
    input: &'a str,
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.position += c.len_utf8();
        }
    }

    fn error(&self, reason: &'static str) -> ParseTypeNameError {
        ParseTypeNameError::new(self.input, self.position, reason)
    }

    fn type_name(&mut self) -> Result<TypeName, ParseTypeNameError> {
        self.skip_whitespace();

        let mut segments = vec![self.identifier()?];
        while self.peek() == Some('.') {
            self.position += 1;
            segments.push(self.identifier()?);
        }

        self.skip_whitespace();
        let mut args = Vec::new();
        if self.peek() == Some('<') {
            if self.depth == MAX_NESTING {
                return Err(self.error("generic arguments are nested too deeply"));
            }

            self.position += 1;
            self.depth += 1;
            loop {
                args.push(self.type_name()?);
                self.skip_whitespace();
                match self.peek() {
                    Some(',') => self.position += 1,
                    Some('>') => {
                        self.position += 1;
                        break;
                    }
                    _ => return Err(self.error("expected `,` or `>`")),
                }
            }
            self.depth -= 1;
        }

        let (name, namespace) = segments.split_last().ok_or_else(|| self.error("expected an identifier"))?;

        Ok(TypeName {
            namespace: Arc::from(namespace.join(".")),
            name: Arc::from(*name),
            args: Arc::from(args),
        })
    }

    fn identifier(&mut self) -> Result<&'a str, ParseTypeNameError> {
        let input = self.input;
        let start = self.position;

        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.position += c.len_utf8(),
            _ => return Err(self.error("expected an identifier")),
        }

        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            self.position += c.len_utf8();
        }

        Ok(&input[start..self.position])
    }
}
