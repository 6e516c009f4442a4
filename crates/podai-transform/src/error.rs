use crate::condition::ConditionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid condition `{expr}`: {source}")]
    Condition {
        expr: String,
        #[source]
        source: ConditionError,
    },
    #[error("unknown transform function: {0}")]
    UnknownFunction(String),
    #[error("transform function `{name}` failed: {reason}")]
    Function { name: String, reason: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
