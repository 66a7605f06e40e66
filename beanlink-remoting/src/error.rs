//! Error types for the remoting layer.

use beanlink_store::StoreError;
use beanlink_types::ModelId;
use thiserror::Error;

/// Result type for remoting operations.
pub type RemotingResult<T> = Result<T, RemotingError>;

/// Errors that can occur in remoting operations.
#[derive(Debug, Error)]
pub enum RemotingError {
    /// The bean (or identifier) is not registered in the bean repository.
    #[error("bean is not managed: {0}")]
    NotManaged(String),

    /// The bean or its identifier is already registered.
    #[error("bean is already managed as {0}")]
    AlreadyManaged(ModelId),

    /// The bean could not be instantiated or wired.
    #[error("cannot create bean of class {class}: {reason}")]
    Construction { class: String, reason: String },

    /// The class schema is malformed.
    #[error("invalid schema for class {class}: {reason}")]
    InvalidSchema { class: String, reason: String },

    /// No class of this name has been described.
    #[error("unknown class {0}")]
    UnknownClass(String),

    /// The class declares no slot with this name.
    #[error("class {class} has no slot named {name}")]
    UnknownAttribute { class: String, name: String },

    /// A slot was bound with a Rust type that does not match its declaration.
    #[error("slot {class}.{name} is declared as {declared} but was bound as {requested}")]
    KindMismatch {
        class: String,
        name: String,
        declared: String,
        requested: String,
    },

    /// A value does not match the converter's type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A wire value has the right shape but cannot be decoded.
    #[error("invalid wire value for {expected}: {value}")]
    InvalidWireValue { expected: String, value: String },

    /// A list index is outside the list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The property or list is not bound to a model.
    #[error("slot is not bound to a model")]
    Unbound,

    /// The owning context has been torn down.
    #[error("remoting context closed")]
    Closed,

    /// Malformed list change record.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl RemotingError {
    pub(crate) fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        RemotingError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn invalid_wire(expected: impl ToString, value: impl ToString) -> Self {
        RemotingError::InvalidWireValue {
            expected: expected.to_string(),
            value: value.to_string(),
        }
    }
}
