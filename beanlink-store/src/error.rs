//! Error types for the model store.

use beanlink_types::ModelId;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No model with this id.
    #[error("model not found: {0}")]
    ModelNotFound(ModelId),

    /// A model with this id already exists.
    #[error("duplicate model: {0}")]
    DuplicateModel(ModelId),

    /// The model has no attribute with this name.
    #[error("attribute {attribute} not found on model {model}")]
    AttributeNotFound { model: ModelId, attribute: String },
}
