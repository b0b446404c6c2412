// SPDX-License-Identifier: GPL-3.0-only

//! nv12-preview - packed RGBA to biplanar 4:2:0 with a GPU reconstruction
//! preview
//!
//! The crate converts one packed interleaved RGBA image into a two-plane
//! subsampled luma/chroma buffer, uploads the planes as GPU textures,
//! reconstructs a full-color image with a compute kernel, and composites the
//! reconstruction next to the two raw planes for visual comparison.
//!
//! # Architecture
//!
//! - [`color`]: forward/inverse BT.709 full-range color matrices
//! - [`convert`]: CPU packed → biplanar conversion with 4:2:0 subsampling
//! - [`upload`]: plane → texture uploads with layout validation
//! - [`reconstruct`]: the compute kernel and its dispatch plumbing
//! - [`compositor`]: the fixed three-region display pass
//! - [`pipeline`]: single-owner orchestration of one conversion cycle
//! - [`gpu`]: device context and submission tracking
//!
//! The demo binary loads a still image, runs the cycle headlessly and saves
//! the composite; file I/O stays outside the core modules.

pub mod color;
pub mod compositor;
pub mod convert;
pub mod errors;
pub mod gpu;
pub mod pipeline;
pub mod reconstruct;
pub mod upload;

// Re-export commonly used types
pub use color::{ColorMatrix, InverseColorMatrix};
pub use compositor::{CompositeFrame, Compositor, Region, layout_regions};
pub use convert::{PackedImage, PlanarBuffer, PlaneView, convert};
pub use errors::{PipelineError, PipelineResult};
pub use gpu::{GpuContext, SubmittedWork, read_texture_rgba, submit_tracked};
pub use pipeline::PreviewPipeline;
pub use reconstruct::{ReconstructionKernel, WORKGROUP_SIZE, dispatch_extent};
pub use upload::upload_plane;
