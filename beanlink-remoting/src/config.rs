//! Configuration for a remoting context.

use crate::error::RemotingResult;
use serde::{Deserialize, Serialize};

/// Which end of the connection this process is.
///
/// The side decides which list record kinds are emitted and which are
/// listened for; the two sides always use opposite families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Owns the application logic; emits `*_FROM_SERVER` records.
    #[default]
    Controller,
    /// Mirrors the controller's beans for display; emits `*_FROM_CLIENT` records.
    Presentation,
}

impl Side {
    /// The other end of the connection.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Controller => Side::Presentation,
            Side::Presentation => Side::Controller,
        }
    }
}

/// Configuration for a [`RemotingContext`](crate::RemotingContext).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemotingConfig {
    /// Label used in log output.
    pub name: String,
    /// This process's end of the connection.
    pub side: Side,
    /// Whether class-metadata models are published on first use of a class.
    pub publish_class_models: bool,
}

impl Default for RemotingConfig {
    fn default() -> Self {
        Self {
            name: "beanlink".to_string(),
            side: Side::Controller,
            publish_class_models: true,
        }
    }
}

impl RemotingConfig {
    /// Default configuration for the controller side.
    pub fn controller() -> Self {
        Self::default()
    }

    /// Default configuration for the presentation side.
    pub fn presentation() -> Self {
        Self {
            side: Side::Presentation,
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> RemotingResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
