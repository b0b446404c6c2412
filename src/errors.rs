// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the conversion and preview pipeline

use thiserror::Error;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures the pipeline can report.
///
/// Geometry, stride and format errors are caller-recoverable and are raised
/// before any resource is created. Device exhaustion and kernel preparation
/// failures are fatal for the session: the pipeline cannot produce output and
/// reports upward. Submission failures are carried on the completion handle
/// of the submitted work, so callers distinguish "completed" from "errored"
/// instead of assuming success.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Zero width or height
    #[error("invalid geometry: {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    /// Row stride is zero or smaller than the minimum for the declared width
    #[error("invalid stride {stride} for width {width} at {bytes_per_pixel} bytes per pixel")]
    InvalidStride {
        stride: u32,
        width: u32,
        bytes_per_pixel: u32,
    },

    /// Texture format channel count does not match the plane byte layout
    #[error("unsupported format {format:?} for a plane with {bytes_per_pixel} bytes per pixel")]
    UnsupportedFormat {
        format: wgpu::TextureFormat,
        bytes_per_pixel: u32,
    },

    /// Plane or texture dimensions do not agree
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// Device, texture or buffer allocation failed
    #[error("device resources exhausted: {0}")]
    DeviceResourceExhausted(String),

    /// Compiled kernel program missing or malformed; a deployment defect
    #[error("kernel preparation failed: {0}")]
    KernelPreparationFailed(String),

    /// The device reported an error status for a submitted unit of work
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
}
