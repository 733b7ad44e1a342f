//! Error Types
//!
//! This module defines the error types used throughout the engine core.
//!
//! # Overview
//!
//! The main error type [`CinderError`] covers all failure modes including:
//! - GPU initialization failures
//! - Resource creation and validation errors
//! - Shader lookup and compilation errors
//! - Background load failures
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, CinderError>`.
//!
//! Fatal conditions (device creation, shader lookup during required init)
//! abort the calling subsystem's initialization. Recoverable conditions
//! (a single texture failing validation) are logged by the caller, which
//! substitutes absence: skip the draw or fall back to a default resource.

use thiserror::Error;

/// The main error type for the engine core.
#[derive(Error, Debug)]
pub enum CinderError {
    // ========================================================================
    // GPU & Device Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The surface is not supported by the selected adapter.
    #[error("Surface configuration failed: {0}")]
    SurfaceConfigFailed(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A texture or buffer description failed validation.
    #[error("Invalid resource description: {0}")]
    InvalidDescriptor(String),

    /// CPU-side payload data does not match its description.
    #[error("Invalid resource data: {0}")]
    InvalidData(String),

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// The named shader does not exist in the shader library.
    #[error("Shader not found: {stage:?} '{name}'")]
    ShaderNotFound {
        /// Pipeline stage the shader was requested for
        stage: crate::gfx::ShaderStage,
        /// Symbolic shader name
        name: String,
    },

    /// Shader module compilation reported a diagnostic.
    #[error("Shader compile error in '{name}': {diagnostic}")]
    ShaderCompileFailed {
        /// Symbolic shader name
        name: String,
        /// Compiler diagnostic string
        diagnostic: String,
    },

    // ========================================================================
    // Draw Submission Errors
    // ========================================================================
    /// A drawable was submitted before its GPU buffers were built.
    #[error("Draw state violation: {0}")]
    DrawStateViolation(String),

    // ========================================================================
    // Background Load Errors
    // ========================================================================
    /// A background decode task failed.
    #[error("Background load of '{name}' failed: {reason}")]
    LoadFailed {
        /// Logical resource name
        name: String,
        /// Failure description from the decoder
        reason: String,
    },
}

/// Alias for `Result<T, CinderError>`.
pub type Result<T> = std::result::Result<T, CinderError>;
