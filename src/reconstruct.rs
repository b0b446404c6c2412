// SPDX-License-Identifier: GPL-3.0-only

//! GPU-parallel reconstruction of RGBA from the luma/chroma textures
//!
//! A compute shader runs one invocation per destination pixel, loads luma at
//! the full-resolution coordinate and chroma at the halved coordinate
//! (nearest upsampling), applies the inverse color matrix and writes a fully
//! opaque RGBA texel. Dispatch uses 16x16 workgroups; partial groups at the
//! right/bottom edge bounds-check inside the shader.
//!
//! Dispatch submission is asynchronous: it returns a [`SubmittedWork`] handle
//! and the output texture's contents are valid only once that handle (or a
//! later submission on the same queue) confirms completion.

use crate::color::ColorMatrix;
use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::{self, GpuContext, SubmittedWork};
use std::sync::Arc;
use tracing::{debug, info};

/// Workgroup edge length used by the kernel, one invocation per pixel.
pub const WORKGROUP_SIZE: u32 = 16;

/// Number of workgroups needed to cover `pixels` along one axis.
#[inline]
pub fn dispatch_extent(pixels: u32) -> u32 {
    pixels.div_ceil(WORKGROUP_SIZE)
}

/// Uniform block consumed by the kernel (must match `reconstruct.wgsl`).
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    inv: [[f32; 4]; 3],
    /// x: luma bias, y: chroma bias, both pre-scaled to unorm
    bias: [f32; 4],
    width: u32,
    height: u32,
    _pad: [u32; 2],
}

/// Compute pipeline performing the inverse color transform per pixel.
pub struct ReconstructionKernel {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    params: KernelParams,
    output: Option<wgpu::Texture>,
    cached_width: u32,
    cached_height: u32,
}

impl ReconstructionKernel {
    /// Build the compute pipeline for the given forward matrix.
    ///
    /// A malformed kernel program is a deployment defect, surfaced as
    /// `KernelPreparationFailed`; callers treat it as fatal for the session.
    pub async fn new(gpu: &GpuContext, matrix: &ColorMatrix) -> PipelineResult<Self> {
        info!("preparing reconstruction kernel");
        let device = &gpu.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("reconstruct_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("reconstruct.wgsl").into()),
        });

        // Bindings: tex_luma, tex_chroma, output, params
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("reconstruct_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("reconstruct_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("reconstruct_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = device.pop_error_scope().await {
            return Err(PipelineError::KernelPreparationFailed(err.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reconstruct_uniform_buffer"),
            size: std::mem::size_of::<KernelParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let inverse = matrix.inverse();
        let row = |r: [f32; 3]| [r[0], r[1], r[2], 0.0];
        let params = KernelParams {
            inv: [
                row(inverse.coeffs[0]),
                row(inverse.coeffs[1]),
                row(inverse.coeffs[2]),
            ],
            bias: [inverse.luma_bias / 255.0, inverse.chroma_bias / 255.0, 0.0, 0.0],
            width: 0,
            height: 0,
            _pad: [0; 2],
        };

        Ok(Self {
            device: device.clone(),
            queue: gpu.queue.clone(),
            pipeline,
            bind_group_layout,
            uniform_buffer,
            params,
            output: None,
            cached_width: 0,
            cached_height: 0,
        })
    }

    fn ensure_output(&mut self, width: u32, height: u32) -> wgpu::Texture {
        if self.cached_width == width && self.cached_height == height {
            if let Some(texture) = &self.output {
                return texture.clone();
            }
        }
        debug!(width, height, "allocating reconstruction output texture");
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("reconstruct_output_rgba"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        self.output = Some(texture.clone());
        self.cached_width = width;
        self.cached_height = height;
        texture
    }

    /// Enqueue the reconstruction for one pair of plane textures.
    ///
    /// Returns the destination texture and the submission handle; the
    /// texture's contents are valid only after the handle reports completion
    /// (or a later submission on this queue orders after it).
    pub fn dispatch(
        &mut self,
        luma: &wgpu::Texture,
        chroma: &wgpu::Texture,
    ) -> PipelineResult<(wgpu::Texture, SubmittedWork)> {
        let (width, height) = (luma.width(), luma.height());
        if chroma.width() != width.div_ceil(2) || chroma.height() != height.div_ceil(2) {
            return Err(PipelineError::SizeMismatch(format!(
                "chroma texture {}x{} does not pair with luma {}x{}",
                chroma.width(),
                chroma.height(),
                width,
                height
            )));
        }

        let output = self.ensure_output(width, height);

        self.params.width = width;
        self.params.height = height;
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.params));

        let luma_view = luma.create_view(&wgpu::TextureViewDescriptor::default());
        let chroma_view = chroma.create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("reconstruct_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&luma_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&chroma_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("reconstruct_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("reconstruct_compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, Some(&bind_group), &[]);
            pass.dispatch_workgroups(dispatch_extent(width), dispatch_extent(height), 1);
        }

        debug!(
            width,
            height,
            groups_x = dispatch_extent(width),
            groups_y = dispatch_extent(height),
            "dispatched reconstruction kernel"
        );

        let work = gpu::submit_tracked(&self.device, &self.queue, encoder, "reconstruct");
        Ok((output, work))
    }
}
