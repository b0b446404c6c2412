// SPDX-License-Identifier: GPL-3.0-only

//! Headless demo: load a still image, run the conversion/reconstruction
//! cycle, and save the three-region composite. Image file I/O lives here,
//! outside the core pipeline.

use anyhow::Context;
use clap::Parser;
use nv12_preview::color::ColorMatrix;
use nv12_preview::convert::PackedImage;
use nv12_preview::gpu::{self, GpuContext};
use nv12_preview::pipeline::PreviewPipeline;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "nv12-preview")]
#[command(about = "Convert an image to biplanar 4:2:0 and preview the GPU reconstruction")]
#[command(version)]
struct Cli {
    /// Input image (PNG or JPEG)
    input: PathBuf,

    /// Composite output path
    #[arg(short, long, default_value = "composite.png")]
    output: PathBuf,

    /// Directory to export the raw luma/chroma planes into
    #[arg(long)]
    export_planes: Option<PathBuf>,

    /// Output surface width
    #[arg(long, default_value = "1280")]
    surface_width: u32,

    /// Output surface height
    #[arg(long, default_value = "720")]
    surface_height: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    pollster::block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let source = image::open(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?
        .to_rgba8();
    let (width, height) = source.dimensions();
    info!(width, height, input = %cli.input.display(), "loaded source image");

    let packed = PackedImage {
        width,
        height,
        stride: width * 4,
        data: source.as_raw(),
    };

    let context = GpuContext::new().await?;
    let target_format = wgpu::TextureFormat::Rgba8Unorm;
    let pipeline =
        PreviewPipeline::new(context.clone(), &packed, &ColorMatrix::bt709_full(), target_format)
            .await?;

    if let Some(dir) = &cli.export_planes {
        export_planes(&pipeline, dir)?;
    }

    // Offscreen destination surface; a windowed host would hand us its
    // swapchain texture view and size instead.
    let target = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("composite_target"),
        size: wgpu::Extent3d {
            width: cli.surface_width,
            height: cli.surface_height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: target_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

    pipeline.render(&target_view, (cli.surface_width, cli.surface_height))?;

    let composite =
        gpu::read_texture_rgba(&context, &target, cli.surface_width, cli.surface_height).await?;
    image::RgbaImage::from_raw(cli.surface_width, cli.surface_height, composite)
        .context("composite buffer has unexpected size")?
        .save(&cli.output)
        .with_context(|| format!("failed to save {}", cli.output.display()))?;
    info!(output = %cli.output.display(), "saved composite");

    Ok(())
}

/// Save the raw planes as standalone raster files: luma as 8-bit gray,
/// chroma as two-channel gray+alpha.
fn export_planes(pipeline: &PreviewPipeline, dir: &PathBuf) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let planes = pipeline.planes();

    let luma = planes.luma_view();
    let mut luma_tight = Vec::with_capacity((luma.width * luma.height) as usize);
    for row in 0..luma.height as usize {
        let start = row * luma.stride as usize;
        luma_tight.extend_from_slice(&luma.data[start..start + luma.width as usize]);
    }
    image::GrayImage::from_raw(luma.width, luma.height, luma_tight)
        .context("luma buffer has unexpected size")?
        .save(dir.join("luma.png"))?;

    let chroma = planes.chroma_view();
    let mut chroma_tight = Vec::with_capacity((chroma.width * chroma.height * 2) as usize);
    for row in 0..chroma.height as usize {
        let start = row * chroma.stride as usize;
        chroma_tight
            .extend_from_slice(&chroma.data[start..start + (chroma.width * 2) as usize]);
    }
    image::GrayAlphaImage::from_raw(chroma.width, chroma.height, chroma_tight)
        .context("chroma buffer has unexpected size")?
        .save(dir.join("chroma.png"))?;

    info!(dir = %dir.display(), "exported luma and chroma planes");
    Ok(())
}
