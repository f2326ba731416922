//! Form model shared by every wizard step.
//!
//! - `key_path`   : dotted key paths with non-mutating get/set/remove on JSON values
//! - `merge`      : recursive merge used for layering defaults, templates and edits
//! - `field`      : field kinds + per-field rules
//! - `schema`     : ordered field collection, produces validation maps
//! - `state`      : `FormContext`, the mutable editing state of one step
//! - `validation` : `ValidationErrors` and the reusable rule library

pub mod errors;
pub mod field;
pub mod key_path;
pub mod merge;
pub mod schema;
pub mod state;
pub mod validation;

pub use errors::FormError;
pub use field::{FormField, FormFieldKind, Requirement};
pub use key_path::KeyPath;
pub use merge::MergeFrom;
pub use schema::FormSchema;
pub use state::{FormContext, TemplatePolicy};
pub use validation::ValidationErrors;
