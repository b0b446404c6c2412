// SPDX-License-Identifier: GPL-3.0-only

//! Three-region composite of the reconstruction and the raw planes
//!
//! The layout is a fixed asymmetric tiling: the reconstructed image in a
//! top-center slot starting at a quarter of the surface width, the luma
//! plane bottom-left and the chroma plane bottom-right, every region half
//! the surface in each dimension. Each region gets a full-surface quad
//! clipped to its viewport, so the texture stretches to fill the region
//! rather than letterboxing. The remaining top corners show the white clear
//! color.
//!
//! Frame composition is transactional: `render` returns the submission
//! handle and callers present the surface only after the handle reports
//! success; on error the frame is dropped and a diagnostic logged.

use crate::errors::PipelineResult;
use crate::gpu::{self, GpuContext, SubmittedWork};
use std::sync::Arc;
use tracing::debug;

/// One rectangular viewport region in whole output-surface pixels. The same
/// coordinates drive both the viewport and the scissor rect, so the two can
/// never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Whether the two rectangles share any area.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Compute the three display regions for a surface of the given size.
///
/// Order matches the textures the compositor draws: reconstruction
/// (top-center), luma (bottom-left), chroma (bottom-right). Recomputed on
/// every render, so a surface resize only changes the size passed in. Odd
/// surface dimensions round the half sizes down, leaving the spare row or
/// column to the cleared background.
pub fn layout_regions(surface_width: u32, surface_height: u32) -> [Region; 3] {
    let (w, h) = (surface_width / 2, surface_height / 2);
    [
        Region {
            x: surface_width / 4,
            y: 0,
            width: w,
            height: h,
        },
        Region {
            x: 0,
            y: h,
            width: w,
            height: h,
        },
        Region {
            x: w,
            y: h,
            width: w,
            height: h,
        },
    ]
}

/// The three texture views one composite draws, in region order.
pub struct CompositeFrame<'a> {
    pub reconstructed: &'a wgpu::TextureView,
    pub luma: &'a wgpu::TextureView,
    pub chroma: &'a wgpu::TextureView,
}

/// Render pipeline drawing one textured quad per region.
pub struct Compositor {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl Compositor {
    /// Build the quad pipeline for the given destination surface format.
    pub fn new(gpu: &GpuContext, target_format: wgpu::TextureFormat) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("composite.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("composite_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("composite_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("composite_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device: device.clone(),
            queue: gpu.queue.clone(),
            pipeline,
            bind_group_layout,
            sampler,
        }
    }

    fn bind_texture(&self, view: &wgpu::TextureView) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Draw the three regions into `target` and submit.
    ///
    /// The textures sampled here must have been produced by work already
    /// submitted on this queue; the same-queue submission order makes the
    /// kernel's writes visible before these draws sample them.
    pub fn render(
        &self,
        frame: &CompositeFrame<'_>,
        target: &wgpu::TextureView,
        surface_size: (u32, u32),
    ) -> PipelineResult<SubmittedWork> {
        let regions = layout_regions(surface_size.0, surface_size.1);
        let bind_groups = [
            self.bind_texture(frame.reconstructed),
            self.bind_texture(frame.luma),
            self.bind_texture(frame.chroma),
        ];

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composite_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            for (region, bind_group) in regions.iter().zip(bind_groups.iter()) {
                pass.set_viewport(
                    region.x as f32,
                    region.y as f32,
                    region.width as f32,
                    region.height as f32,
                    0.0,
                    1.0,
                );
                pass.set_scissor_rect(region.x, region.y, region.width, region.height);
                pass.set_bind_group(0, Some(bind_group), &[]);
                pass.draw(0..6, 0..1);
            }
        }

        debug!(
            width = surface_size.0,
            height = surface_size.1,
            "submitted composite pass"
        );

        Ok(gpu::submit_tracked(
            &self.device,
            &self.queue,
            encoder,
            "composite",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_are_equal_sized_and_disjoint() {
        for (sw, sh) in [(1280u32, 720u32), (640, 640), (802, 602), (801, 601)] {
            let regions = layout_regions(sw, sh);
            for region in &regions {
                assert_eq!(region.width, sw / 2);
                assert_eq!(region.height, sh / 2);
            }
            for i in 0..3 {
                for j in (i + 1)..3 {
                    assert!(
                        !regions[i].overlaps(&regions[j]),
                        "regions {i} and {j} overlap on {sw}x{sh}"
                    );
                }
            }
        }
    }

    #[test]
    fn regions_stay_inside_the_surface() {
        for (sw, sh) in [(1920u32, 1080u32), (803, 599)] {
            for region in layout_regions(sw, sh) {
                assert!(region.x + region.width <= sw);
                assert!(region.y + region.height <= sh);
            }
        }
    }

    #[test]
    fn fixed_slots_match_the_layout() {
        let [top, left, right] = layout_regions(800, 600);
        assert_eq!((top.x, top.y), (200, 0));
        assert_eq!((left.x, left.y), (0, 300));
        assert_eq!((right.x, right.y), (400, 300));
    }

    #[test]
    fn bottom_row_tiles_the_bottom_half() {
        let [_, left, right] = layout_regions(1000, 500);
        assert_eq!(left.x + left.width, right.x);
        assert_eq!(right.x + right.width, 1000);
        assert_eq!(left.y + left.height, 500);
    }

    #[test]
    fn odd_surface_sizes_keep_whole_pixel_slots() {
        // sw / 4 is no longer a whole pixel at 802; the layout must floor it
        // so the clipped area matches the viewport exactly.
        let [top, left, right] = layout_regions(802, 601);
        assert_eq!((top.x, top.y), (200, 0));
        assert_eq!((top.width, top.height), (401, 300));
        assert_eq!(left.x + left.width, right.x);
        // The spare column and row past the halves stay uncovered.
        assert!(right.x + right.width <= 802);
        assert!(left.y + left.height <= 601);
    }
}
