// SPDX-License-Identifier: GPL-3.0-only

//! GPU device setup and submission tracking
//!
//! The device, queue and adapter information live in a single-owner
//! [`GpuContext`] that is passed to each pipeline component; the crate
//! creates no process-wide GPU state.
//!
//! Work submitted through [`submit_tracked`] returns a [`SubmittedWork`]
//! handle without waiting for the GPU; the handle's [`wait`] confirms the
//! unit of work completed and surfaces any error the device reported for it.
//!
//! [`wait`]: SubmittedWork::wait

use crate::errors::{PipelineError, PipelineResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Owned handles to one GPU device and its command queue.
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    pub backend: wgpu::Backend,
}

impl GpuContext {
    /// Create a device and queue on the best available adapter.
    pub async fn new() -> PipelineResult<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| {
                PipelineError::DeviceResourceExhausted(format!("no suitable GPU adapter: {e}"))
            })?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU adapter selected"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("nv12_preview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| {
                PipelineError::DeviceResourceExhausted(format!("failed to create device: {e}"))
            })?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name: adapter_info.name,
            backend: adapter_info.backend,
        })
    }
}

/// Handle to one submitted unit of GPU work.
///
/// The texture contents a submission produces are valid only after [`wait`]
/// returns `Ok`. Dropping the handle without waiting is allowed when a later
/// submission on the same queue establishes the ordering instead.
///
/// [`wait`]: SubmittedWork::wait
pub struct SubmittedWork {
    device: Arc<wgpu::Device>,
    label: &'static str,
    validation: Option<wgpu::Error>,
    out_of_memory: Option<wgpu::Error>,
    done: futures::channel::oneshot::Receiver<()>,
}

impl SubmittedWork {
    /// Block until the device signals the work finished, then report its
    /// completion status.
    pub fn wait(self) -> PipelineResult<()> {
        if let Some(err) = self.out_of_memory {
            return Err(PipelineError::DeviceResourceExhausted(format!(
                "{}: {err}",
                self.label
            )));
        }
        if let Some(err) = self.validation {
            return Err(PipelineError::SubmissionFailed(format!(
                "{}: {err}",
                self.label
            )));
        }

        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| PipelineError::SubmissionFailed(format!("{}: {e}", self.label)))?;

        // The completion callback fires during the poll above.
        pollster::block_on(self.done).map_err(|_| {
            PipelineError::SubmissionFailed(format!("{}: completion signal dropped", self.label))
        })?;
        debug!(label = self.label, "submitted work completed");
        Ok(())
    }
}

/// Submit an encoded command buffer and return its completion handle.
///
/// The device reports validation and out-of-memory errors for a submission
/// when it is enqueued; those are captured through error scopes here and
/// surfaced by [`SubmittedWork::wait`] together with the completion signal.
pub fn submit_tracked(
    device: &Arc<wgpu::Device>,
    queue: &wgpu::Queue,
    encoder: wgpu::CommandEncoder,
    label: &'static str,
) -> SubmittedWork {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    queue.submit(std::iter::once(encoder.finish()));

    let (sender, receiver) = futures::channel::oneshot::channel();
    queue.on_submitted_work_done(move || {
        let _ = sender.send(());
    });

    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    SubmittedWork {
        device: device.clone(),
        label,
        validation,
        out_of_memory,
        done: receiver,
    }
}

/// Read an RGBA texture back into CPU memory through a staging buffer.
///
/// Expensive; used for exports and tests, never on the render path. The copy
/// pads rows to the 256-byte alignment wgpu requires and strips the padding
/// while assembling the result.
pub async fn read_texture_rgba(
    gpu: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> PipelineResult<Vec<u8>> {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = (width * 4).div_ceil(align) * align;

    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("nv12_preview_readback_staging"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("nv12_preview_readback_encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    gpu.device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| PipelineError::SubmissionFailed(format!("readback: {e}")))?;

    receiver
        .await
        .map_err(|_| PipelineError::SubmissionFailed("readback mapping dropped".into()))?
        .map_err(|e| PipelineError::SubmissionFailed(format!("failed to map staging: {e:?}")))?;

    let data = slice.get_mapped_range();
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    if padded_bytes_per_row == width * 4 {
        out.extend_from_slice(&data[..(width * height * 4) as usize]);
    } else {
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            out.extend_from_slice(&data[start..start + (width * 4) as usize]);
        }
    }
    drop(data);
    staging.unmap();

    Ok(out)
}
