//! # Engine Errors
//!
//! Error types for the Cajal scene and property layers.

use thiserror::Error;

/// Property system error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    #[error("Property not found: {0}")]
    NotFound(String),

    #[error("Property '{name}' is {stored:?}, cannot store {incoming:?}")]
    TypeMismatch {
        name: String,
        stored: crate::any::PropertyType,
        incoming: crate::any::PropertyType,
    },

    #[error("No converter registered for {from:?} -> {to:?}")]
    NoConverter {
        from: crate::any::PropertyType,
        to: crate::any::PropertyType,
    },

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Invalid enum value: {0}")]
    InvalidEnumValue(String),

    #[error("Property '{0}' is read-only")]
    ReadOnly(String),
}

/// Result type for property operations.
pub type PropertyResult<T> = Result<T, PropertyError>;

/// Scene and model error types.
#[derive(Error, Debug)]
pub enum SceneError {
    // ========================================================================
    // Model Errors
    // ========================================================================

    #[error("Model is empty")]
    EmptyModel,

    #[error("Model not found: {0}")]
    ModelNotFound(u64),

    #[error("Instance not found: model {model_id}, instance {instance_id}")]
    InstanceNotFound { model_id: u64, instance_id: u64 },

    #[error("Clip plane not found: {0}")]
    ClipPlaneNotFound(u64),

    // ========================================================================
    // Loader Errors
    // ========================================================================

    #[error("No loader registered for '{0}'")]
    NoLoader(String),

    #[error("Load failed: {0}")]
    LoadFailed(String),

    // ========================================================================
    // Backend Errors
    // ========================================================================

    #[error("Backend commit failed: {0}")]
    CommitFailed(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Binary scene cache error types.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Unsupported cache version {found}, expected {expected}")]
    VersionMismatch { found: u64, expected: u64 },

    #[error("Cache file is truncated or corrupt: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid UTF-8 in cache string")]
    InvalidString,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
