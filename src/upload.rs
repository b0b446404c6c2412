// SPDX-License-Identifier: GPL-3.0-only

//! Plane → texture uploads
//!
//! Each plane of a [`PlanarBuffer`](crate::convert::PlanarBuffer) becomes one
//! GPU texture: `R8Unorm` for luma, `Rg8Unorm` for interleaved chroma. The
//! copy honors the plane's row stride, so trailing padding bytes are never
//! sampled and the texture's byte layout matches the source plane row for
//! row. All validation happens before any resource is created: either a
//! fully populated texture is returned or an error with nothing allocated.

use crate::convert::PlaneView;
use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::GpuContext;
use tracing::debug;

/// Bytes per pixel a format stores, for the formats the pipeline uploads.
fn format_bytes_per_pixel(format: wgpu::TextureFormat) -> Option<u32> {
    match format {
        wgpu::TextureFormat::R8Unorm => Some(1),
        wgpu::TextureFormat::Rg8Unorm => Some(2),
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Bgra8Unorm => Some(4),
        _ => None,
    }
}

/// Check a plane against the requested texture format before any device work.
fn validate_plane(plane: &PlaneView<'_>, format: wgpu::TextureFormat) -> PipelineResult<()> {
    if plane.width == 0 || plane.height == 0 {
        return Err(PipelineError::SizeMismatch(format!(
            "plane is {}x{}",
            plane.width, plane.height
        )));
    }
    match format_bytes_per_pixel(format) {
        Some(bpp) if bpp == plane.bytes_per_pixel => {}
        _ => {
            return Err(PipelineError::UnsupportedFormat {
                format,
                bytes_per_pixel: plane.bytes_per_pixel,
            });
        }
    }
    let row_bytes = plane.width * plane.bytes_per_pixel;
    // Widen before multiplying so an adversarial stride cannot wrap the
    // required length down past the buffer size.
    let required =
        plane.stride as u64 * (plane.height as u64 - 1) + row_bytes as u64;
    if plane.stride < row_bytes || (plane.data.len() as u64) < required {
        return Err(PipelineError::InvalidStride {
            stride: plane.stride,
            width: plane.width,
            bytes_per_pixel: plane.bytes_per_pixel,
        });
    }
    Ok(())
}

/// Upload one plane as a sampled texture.
///
/// Fails with `SizeMismatch` for zero dimensions, `UnsupportedFormat` when
/// the format's channel count does not match the plane's byte layout, and
/// `InvalidStride` when the stride is below `width * bytes_per_pixel` or the
/// plane buffer is shorter than its rows declare.
pub fn upload_plane(
    gpu: &GpuContext,
    plane: &PlaneView<'_>,
    format: wgpu::TextureFormat,
    label: &'static str,
) -> PipelineResult<wgpu::Texture> {
    validate_plane(plane, format)?;

    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: plane.width,
            height: plane.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        plane.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(plane.stride),
            rows_per_image: Some(plane.height),
        },
        wgpu::Extent3d {
            width: plane.width,
            height: plane.height,
            depth_or_array_layers: 1,
        },
    );

    debug!(
        label,
        width = plane.width,
        height = plane.height,
        stride = plane.stride,
        ?format,
        "uploaded plane texture"
    );

    Ok(texture)
}
