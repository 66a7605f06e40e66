//! Core type definitions for beanlink.
//!
//! This crate defines the fundamental types shared by the model store and the
//! remoting engine:
//! - Model identifiers ([`ModelId`]), the sole cross-process identity token
//! - Domain values carried by bean properties ([`Value`], [`ValueType`])
//! - The primitive attribute representation stored in models ([`WireValue`])
//!
//! Nothing in here knows about beans, repositories or transports.

mod ids;
mod period;
mod value;
mod wire;

pub use ids::ModelId;
pub use period::Period;
pub use value::{BeanHandle, FieldType, Value, ValueType};
pub use wire::WireValue;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("unknown field type code: {0}")]
    UnknownFieldType(i64),
}
