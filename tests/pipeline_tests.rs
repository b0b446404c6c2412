// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline tests
//!
//! GPU-dependent tests skip gracefully when no adapter is available (CI
//! machines without a GPU), mirroring how the CPU-only properties are still
//! always checked.

use nv12_preview::color::ColorMatrix;
use nv12_preview::convert::{self, PackedImage};
use nv12_preview::gpu::{self, GpuContext};
use nv12_preview::pipeline::PreviewPipeline;

fn solid_image(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 4) as usize];
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
    data
}

fn acquire_gpu() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::new()) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            println!("Skipping test (no GPU): {}", e);
            None
        }
    }
}

#[test]
fn solid_red_640_end_to_end() {
    let Some(context) = acquire_gpu() else { return };

    let data = solid_image(640, 640, [255, 0, 0, 255]);
    let packed = PackedImage {
        width: 640,
        height: 640,
        stride: 640 * 4,
        data: &data,
    };
    let matrix = ColorMatrix::bt709_full();

    // CPU-side plane checks run first, without the GPU.
    let planes = convert::convert(&packed, &matrix).unwrap();
    assert_eq!(planes.chroma_dimensions(), (320, 320));
    let luma = planes.luma_view();
    let luma_value = luma.data[0];
    for row in 0..640usize {
        let start = row * luma.stride as usize;
        assert!(
            luma.data[start..start + 640].iter().all(|&b| b == luma_value),
            "luma row {} not constant",
            row
        );
    }
    let chroma = planes.chroma_view();
    let pair = (chroma.data[0], chroma.data[1]);
    for row in 0..320usize {
        let start = row * chroma.stride as usize;
        for cell in chroma.data[start..start + 640].chunks_exact(2) {
            assert_eq!((cell[0], cell[1]), pair, "chroma row {} not constant", row);
        }
    }

    let pipeline = pollster::block_on(PreviewPipeline::new(
        context,
        &packed,
        &matrix,
        wgpu::TextureFormat::Rgba8Unorm,
    ))
    .unwrap();

    // Reconstruction must reproduce the original red within a few levels.
    let rgba = pollster::block_on(pipeline.reconstructed_rgba()).unwrap();
    assert_eq!(rgba.len(), 640 * 640 * 4);
    for px in rgba.chunks_exact(4) {
        assert!(px[0] as i32 >= 250, "red channel off: {:?}", px);
        assert!(px[1] <= 4 && px[2] <= 4, "color bleed: {:?}", px);
        assert_eq!(px[3], 255);
    }
}

#[test]
fn composite_shows_three_regions_on_white() {
    let Some(context) = acquire_gpu() else { return };

    let data = solid_image(64, 64, [255, 0, 0, 255]);
    let packed = PackedImage {
        width: 64,
        height: 64,
        stride: 64 * 4,
        data: &data,
    };
    let pipeline = pollster::block_on(PreviewPipeline::new(
        context.clone(),
        &packed,
        &ColorMatrix::bt709_full(),
        wgpu::TextureFormat::Rgba8Unorm,
    ))
    .unwrap();

    let (sw, sh) = (512u32, 512u32);
    let target = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test_composite_target"),
        size: wgpu::Extent3d {
            width: sw,
            height: sh,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    pipeline.render(&view, (sw, sh)).unwrap();

    let frame = pollster::block_on(gpu::read_texture_rgba(&context, &target, sw, sh)).unwrap();
    let px = |x: u32, y: u32| {
        let i = ((y * sw + x) * 4) as usize;
        [frame[i], frame[i + 1], frame[i + 2]]
    };

    // Region centers: reconstruction is red, luma is dark red-ish (one
    // channel), chroma carries the biased Cb/Cr pair in its two channels.
    let recon = px(sw / 2, sh / 4);
    assert!(recon[0] >= 250 && recon[1] <= 4 && recon[2] <= 4, "{:?}", recon);
    let luma = px(sw / 4, 3 * sh / 4);
    assert!(luma[0] > 40 && luma[0] < 70 && luma[1] == 0, "{:?}", luma);
    let chroma = px(3 * sw / 4, 3 * sh / 4);
    assert!(chroma[0] < 110 && chroma[1] >= 250, "{:?}", chroma);

    // Top corners stay the white clear color.
    assert_eq!(px(4, 4), [255, 255, 255]);
    assert_eq!(px(sw - 4, 4), [255, 255, 255]);
}

#[test]
fn degenerate_one_pixel_image_survives_the_gpu_path() {
    let Some(context) = acquire_gpu() else { return };

    let data = solid_image(1, 1, [0, 255, 0, 255]);
    let packed = PackedImage {
        width: 1,
        height: 1,
        stride: 4,
        data: &data,
    };
    let pipeline = pollster::block_on(PreviewPipeline::new(
        context,
        &packed,
        &ColorMatrix::bt709_full(),
        wgpu::TextureFormat::Rgba8Unorm,
    ))
    .unwrap();

    assert_eq!(pipeline.planes().chroma_dimensions(), (1, 1));
    let rgba = pollster::block_on(pipeline.reconstructed_rgba()).unwrap();
    assert_eq!(rgba.len(), 4);
    assert!(rgba[1] as i32 >= 250, "green channel off: {:?}", rgba);
}

#[test]
fn odd_dimensions_round_trip_within_tolerance() {
    let Some(context) = acquire_gpu() else { return };

    let data = solid_image(33, 17, [200, 40, 90, 255]);
    let packed = PackedImage {
        width: 33,
        height: 17,
        stride: 33 * 4,
        data: &data,
    };
    let pipeline = pollster::block_on(PreviewPipeline::new(
        context,
        &packed,
        &ColorMatrix::bt709_full(),
        wgpu::TextureFormat::Rgba8Unorm,
    ))
    .unwrap();

    assert_eq!(pipeline.planes().chroma_dimensions(), (17, 9));
    let rgba = pollster::block_on(pipeline.reconstructed_rgba()).unwrap();
    assert_eq!(rgba.len(), 33 * 17 * 4);
    for px in rgba.chunks_exact(4) {
        assert!((px[0] as i32 - 200).abs() <= 3, "{:?}", px);
        assert!((px[1] as i32 - 40).abs() <= 3, "{:?}", px);
        assert!((px[2] as i32 - 90).abs() <= 3, "{:?}", px);
    }
}
