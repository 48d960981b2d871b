//! Custom error types for the snapshot agent
//!
//! Provides structured error handling with context for different failure scenarios.

use std::fmt;

/// Main error type for the snapshot agent
#[derive(Debug)]
pub enum ShutterError {
    /// Configuration-related errors
    Config(ConfigError),

    /// Instance discovery errors (fatal to the run)
    Discovery(DiscoveryError),

    /// Cloud operation errors (scoped to one instance)
    Operation(OperationError),

    /// Other errors with context
    Other(String),
}

/// Configuration error variants
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration file
    LoadFailed { path: String, reason: String },

    /// Invalid configuration value
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    MissingRequired { field: String },

    /// Configuration parsing error
    ParseError { reason: String },
}

/// Discovery error variants
#[derive(Debug)]
pub enum DiscoveryError {
    /// Failed to enumerate instances in a region
    ListFailed { region: String, reason: String },
}

/// Cloud operation error variants
#[derive(Debug)]
pub enum OperationError {
    /// No attached volume matched the configured selector
    VolumeNotFound { instance: String, selector: String },

    /// A provider API call failed
    RequestFailed {
        region: String,
        operation: String,
        reason: String,
    },

    /// A snapshot entered the error state
    SnapshotErrored { snapshot_id: String },

    /// Waiting on a snapshot exceeded its bound
    Timeout {
        snapshot_id: String,
        waited_seconds: u64,
    },
}

impl fmt::Display for ShutterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutterError::Config(e) => write!(f, "Configuration error: {}", e),
            ShutterError::Discovery(e) => write!(f, "Discovery error: {}", e),
            ShutterError::Operation(e) => write!(f, "Operation error: {}", e),
            ShutterError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingRequired { field } => {
                write!(f, "Missing required field: {}", field)
            }
            ConfigError::ParseError { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }
        }
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::ListFailed { region, reason } => {
                write!(f, "Failed to list instances in {}: {}", region, reason)
            }
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::VolumeNotFound { instance, selector } => {
                write!(
                    f,
                    "No volume matching '{}' attached to instance {}",
                    selector, instance
                )
            }
            OperationError::RequestFailed {
                region,
                operation,
                reason,
            } => {
                write!(f, "{} failed in {}: {}", operation, region, reason)
            }
            OperationError::SnapshotErrored { snapshot_id } => {
                write!(f, "Snapshot {} entered error state", snapshot_id)
            }
            OperationError::Timeout {
                snapshot_id,
                waited_seconds,
            } => {
                write!(
                    f,
                    "Timed out after {}s waiting on snapshot {}",
                    waited_seconds, snapshot_id
                )
            }
        }
    }
}

impl std::error::Error for ShutterError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for DiscoveryError {}
impl std::error::Error for OperationError {}

impl From<ConfigError> for ShutterError {
    fn from(err: ConfigError) -> Self {
        ShutterError::Config(err)
    }
}

impl From<DiscoveryError> for ShutterError {
    fn from(err: DiscoveryError) -> Self {
        ShutterError::Discovery(err)
    }
}

impl From<OperationError> for ShutterError {
    fn from(err: OperationError) -> Self {
        ShutterError::Operation(err)
    }
}

impl From<anyhow::Error> for ShutterError {
    fn from(err: anyhow::Error) -> Self {
        ShutterError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShutterError>;
