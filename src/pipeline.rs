// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline: packed image → planes → textures → reconstruction →
//! composite
//!
//! [`PreviewPipeline`] owns every GPU resource the conversion cycle creates.
//! Construction performs the one-shot work (CPU conversion, plane uploads,
//! kernel dispatch) and waits for the kernel's completion signal, so by the
//! time `new` returns the reconstructed texture is confirmed valid and any
//! number of composite passes may sample it. Re-running the cycle for a new
//! source image means building a new pipeline; textures are never mutated in
//! place across cycles.

use crate::color::ColorMatrix;
use crate::compositor::{CompositeFrame, Compositor};
use crate::convert::{self, PackedImage, PlanarBuffer};
use crate::errors::PipelineResult;
use crate::gpu::{self, GpuContext};
use crate::reconstruct::ReconstructionKernel;
use crate::upload;
use tracing::info;

/// Owns the conversion products and the GPU passes that display them.
pub struct PreviewPipeline {
    gpu: GpuContext,
    planes: PlanarBuffer,
    luma_texture: wgpu::Texture,
    chroma_texture: wgpu::Texture,
    reconstructed: wgpu::Texture,
    compositor: Compositor,
}

impl PreviewPipeline {
    /// Convert `packed`, upload the planes, and reconstruct on the GPU.
    ///
    /// `target_format` is the pixel format of the surface the composite will
    /// later target.
    pub async fn new(
        gpu: GpuContext,
        packed: &PackedImage<'_>,
        matrix: &ColorMatrix,
        target_format: wgpu::TextureFormat,
    ) -> PipelineResult<Self> {
        let planes = convert::convert(packed, matrix)?;

        let luma_texture = upload::upload_plane(
            &gpu,
            &planes.luma_view(),
            wgpu::TextureFormat::R8Unorm,
            "luma_plane",
        )?;
        let chroma_texture = upload::upload_plane(
            &gpu,
            &planes.chroma_view(),
            wgpu::TextureFormat::Rg8Unorm,
            "chroma_plane",
        )?;

        let mut kernel = ReconstructionKernel::new(&gpu, matrix).await?;
        // Single-shot pipeline: confirm the reconstruction completed before
        // anything is allowed to sample it.
        let (reconstructed, work) = kernel.dispatch(&luma_texture, &chroma_texture)?;
        work.wait()?;

        let compositor = Compositor::new(&gpu, target_format);

        info!(
            width = packed.width,
            height = packed.height,
            adapter = %gpu.adapter_name,
            "preview pipeline ready"
        );

        Ok(Self {
            gpu,
            planes,
            luma_texture,
            chroma_texture,
            reconstructed,
            compositor,
        })
    }

    /// The CPU-side planes, for export by a persistence collaborator.
    pub fn planes(&self) -> &PlanarBuffer {
        &self.planes
    }

    /// Composite the reconstruction and both planes into `target`, waiting
    /// for the submission to complete so the caller may present the surface.
    ///
    /// On failure no frame should be shown; the error names the failing
    /// stage. Resizing the destination only changes `surface_size`.
    pub fn render(
        &self,
        target: &wgpu::TextureView,
        surface_size: (u32, u32),
    ) -> PipelineResult<()> {
        let reconstructed = self
            .reconstructed
            .create_view(&wgpu::TextureViewDescriptor::default());
        let luma = self
            .luma_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let chroma = self
            .chroma_texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let frame = CompositeFrame {
            reconstructed: &reconstructed,
            luma: &luma,
            chroma: &chroma,
        };
        self.compositor.render(&frame, target, surface_size)?.wait()
    }

    /// Read the reconstructed RGBA image back to CPU memory.
    pub async fn reconstructed_rgba(&self) -> PipelineResult<Vec<u8>> {
        gpu::read_texture_rgba(
            &self.gpu,
            &self.reconstructed,
            self.planes.width(),
            self.planes.height(),
        )
        .await
    }
}
