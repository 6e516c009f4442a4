//! Message transformation for the podAI bridge.
//!
//! A [`MessageTransformer`] turns a [`podai_types::CanonicalMessage`] into the
//! JSON shape a platform expects: outbound field mappings first, then the
//! platform's ordered custom rules. Each rule pairs a [`Condition`] with the
//! name of a function in the [`TransformRegistry`].

mod condition;
mod error;
mod functions;
mod transformer;

pub use condition::{evaluate_condition, CompareOp, Condition, ConditionError};
pub use error::TransformError;
pub use functions::{TransformContext, TransformFn, TransformRegistry};
pub use transformer::{MessageTransformer, TransformOutput, CANONICAL_FORMAT};
