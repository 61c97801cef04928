//! Schema definitions, field validators and document validation.
//!
//! # Key Types
//!
//! - [`Schema`] - named set of [`Field`] definitions
//! - [`FieldValidator`] - capability implemented by every value validator
//! - [`Reference`] - validator resolving ids of another resource at compile time
//! - [`Object`] / [`Array`] - composite validators
//!
//! # Examples
//!
//! ```rust
//! use resource_layer::resource::RequestContext;
//! use resource_layer::schema::{Field, Integer, Schema, Text};
//! use serde_json::json;
//!
//! let schema = Schema::default()
//!     .field("name", Field::new(Text::default()))
//!     .field("count", Field::new(Integer::default()));
//!
//! let payload = json!({"name": "x", "count": "y"});
//! let ctx = RequestContext::default();
//! let (changes, base) = schema.prepare(&ctx, payload.as_object().unwrap(), None, false);
//! let errors = schema.validate(&changes, &base).unwrap_err();
//! assert_eq!(errors.to_string(), "count is [not an integer]");
//! ```

pub mod fields;
pub mod leaf;
pub mod object;
pub mod reference;
pub mod types;
pub mod validation;
pub mod validator;


pub use fields::{created_field, id_field, updated_field};
pub use leaf::{Boolean, Boundaries, Integer, Null, Text, Time};
pub use object::{Array, Dict, Object};
pub use reference::{Connection, Reference};
pub use types::{Change, Changes, Field, FieldHook, Param, Params, Schema, changes_from};
pub use validator::{FieldValidator, IdentifierSet, NoReferences, ReferenceChecker, ReferenceTarget};
