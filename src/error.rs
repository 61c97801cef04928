//! Error types for resource operations.
//!
//! [`ResourceError`] is the condition taxonomy returned by every pipeline operation.
//! Transport layers map it to their own status codes, [`ResourceError::status_code`]
//! gives the HTTP mapping. Field level validation problems are collected in
//! [`FieldErrors`], while topology problems are reported at build time as
//! [`BuildError`] and at compile time as [`CompileError`].

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Classified failure outcome of a resource operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    /// The requested item does not exist
    #[error("Not Found")]
    NotFound,

    /// The operation is not allowed for the caller
    #[error("Forbidden")]
    Forbidden,

    /// The stored item changed since the caller read it
    #[error("Conflict")]
    Conflict,

    /// A conditional request token did not match the stored item
    #[error("Precondition Failed")]
    PreconditionFailed,

    /// The resource configuration does not permit the requested mode
    #[error("Invalid Method")]
    InvalidMethod,

    /// The document failed validation
    #[error("{message}")]
    ValidationFailed { message: String, issues: FieldErrors },

    /// The storage backend lacks the requested capability
    #[error("Not Implemented")]
    NotImplemented,

    /// The resource has no storage handler bound
    #[error("No Storage Defined")]
    NoStorage,

    /// The request context was cancelled
    #[error("Client Closed Request")]
    Canceled,

    /// The request context deadline expired
    #[error("Deadline Exceeded")]
    DeadlineExceeded,

    /// Unclassified underlying failure
    #[error("{message}")]
    Unknown { message: String },
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

impl ResourceError {
    /// Wrap an unclassified error, keeping its message.
    pub fn unknown(error: impl fmt::Display) -> Self {
        Self::Unknown {
            message: error.to_string(),
        }
    }

    /// Create a validation failure carrying per-field issues.
    pub fn validation(message: impl Into<String>, issues: FieldErrors) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            issues,
        }
    }

    /// Create a validation failure with a single issue on `field`.
    pub fn invalid_field(
        message: impl Into<String>,
        field: impl Into<String>,
        issue: impl Into<String>,
    ) -> Self {
        let mut issues = FieldErrors::new();
        issues.add(field, issue);
        Self::validation(message, issues)
    }

    /// HTTP status code a transport should use for this condition.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Forbidden => 403,
            Self::Conflict => 409,
            Self::PreconditionFailed => 412,
            Self::InvalidMethod => 405,
            Self::ValidationFailed { .. } => 422,
            Self::NotImplemented | Self::NoStorage => 501,
            Self::Canceled => 499,
            Self::DeadlineExceeded => 504,
            Self::Unknown { .. } => 520,
        }
    }

    /// Field issues attached to a validation failure.
    pub fn issues(&self) -> Option<&FieldErrors> {
        match self {
            Self::ValidationFailed { issues, .. } => Some(issues),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(error: serde_json::Error) -> Self {
        Self::unknown(error)
    }
}

/// A single validation problem reported by a field validator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// Plain message such as `not an integer`
    #[error("{0}")]
    Invalid(String),

    /// Errors of a nested object, keyed by nested field name
    #[error("{0}")]
    Nested(FieldErrors),
}

impl FieldError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Invalid(message) => serializer.serialize_str(message),
            Self::Nested(errors) => errors.serialize(serializer),
        }
    }
}

/// Validation errors grouped by field name.
///
/// Fields are kept sorted so reports are deterministic.
///
/// ```
/// use resource_layer::error::FieldErrors;
///
/// let mut errors = FieldErrors::new();
/// errors.add("test", "not a string");
/// errors.add("count", "not an integer");
/// assert_eq!(
///     errors.to_string(),
///     "count is [not an integer], test is [not a string]"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(BTreeMap<String, Vec<FieldError>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a plain message for `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(field, FieldError::invalid(message));
    }

    /// Record an error for `field`, keeping earlier errors on the same field.
    pub fn push(&mut self, field: impl Into<String>, error: FieldError) {
        self.0.entry(field.into()).or_default().push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[FieldError]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<FieldError>)> {
        self.0.iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, errors)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field} is [")?;
            for (j, error) in errors.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{error}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, errors) in &self.0 {
            map.serialize_entry(field, errors)?;
        }
        map.end()
    }
}

/// Errors raised while compiling a schema or resource graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// A reference points at a resource path nobody bound
    #[error("can't find resource '{path}'")]
    UnresolvedReference { path: String },

    /// A field validator failed to compile
    #[error("{field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<CompileError>,
    },

    /// An object validator was declared without a schema
    #[error("no schema defined")]
    MissingSchema,

    /// A resource schema failed to compile
    #[error("{path}: schema compilation error: {source}")]
    Resource {
        path: String,
        #[source]
        source: Box<CompileError>,
    },

    /// Any other validator specific failure
    #[error("{0}")]
    Invalid(String),
}

impl CompileError {
    pub(crate) fn in_field(field: impl Into<String>, source: CompileError) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn in_resource(path: impl Into<String>, source: CompileError) -> Self {
        Self::Resource {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Errors raised while building the resource topology.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("cannot bind '{name}' on '{parent}': already bound as a resource, alias or command")]
    AlreadyBound { name: String, parent: String },

    #[error("cannot bind '{name}' as sub-resource: field '{field}' does not exist in its schema")]
    MissingParentField { name: String, field: String },

    #[error("invalid command name '{name}' on '{resource}': must match [A-Za-z0-9_-]+")]
    InvalidCommandName { name: String, resource: String },
}
