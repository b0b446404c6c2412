// SPDX-License-Identifier: GPL-3.0-only

//! Packed RGBA → biplanar 4:2:0 conversion on the CPU
//!
//! Produces an NV12-style layout: a full-resolution luma plane (1 byte per
//! pixel) and a half-resolution interleaved CbCr plane (2 bytes per cell).
//! Chroma subsampling averages each 2x2 block of per-pixel chroma values;
//! odd right/bottom edges are handled by replicating the last column/row, so
//! the conversion never reads out of bounds and a solid-color input yields a
//! perfectly flat output.
//!
//! Both planes share a single row stride, rounded up to [`ROW_ALIGNMENT`]
//! bytes. That mirrors the layout the downstream texture uploads were built
//! for, but consumers must read the stride from the plane view rather than
//! assume the two are equal.

use crate::color::ColorMatrix;
use crate::errors::{PipelineError, PipelineResult};
use tracing::debug;

/// Row alignment, in bytes, applied to both output planes.
pub const ROW_ALIGNMENT: usize = 16;

/// A packed interleaved image: 4 bytes per pixel, RGBA channel order,
/// premultiplied alpha. Read-only input to the converter.
#[derive(Debug, Clone, Copy)]
pub struct PackedImage<'a> {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes, at least `width * 4`
    pub stride: u32,
    pub data: &'a [u8],
}

/// A view over one plane of a [`PlanarBuffer`], in the shape the texture
/// uploader (and any external persistence collaborator) consumes.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes; trailing padding is never sampled
    pub stride: u32,
    pub bytes_per_pixel: u32,
    pub data: &'a [u8],
}

/// Owned luma + chroma planes produced by [`convert`]. Immutable once built.
#[derive(Debug, Clone)]
pub struct PlanarBuffer {
    width: u32,
    height: u32,
    chroma_width: u32,
    chroma_height: u32,
    stride: u32,
    luma: Vec<u8>,
    chroma: Vec<u8>,
}

impl PlanarBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Chroma plane dimensions, always the ceiling of half the luma dimensions.
    pub fn chroma_dimensions(&self) -> (u32, u32) {
        (self.chroma_width, self.chroma_height)
    }

    pub fn luma_view(&self) -> PlaneView<'_> {
        PlaneView {
            width: self.width,
            height: self.height,
            stride: self.stride,
            bytes_per_pixel: 1,
            data: &self.luma,
        }
    }

    pub fn chroma_view(&self) -> PlaneView<'_> {
        PlaneView {
            width: self.chroma_width,
            height: self.chroma_height,
            stride: self.stride,
            bytes_per_pixel: 2,
            data: &self.chroma,
        }
    }
}

fn aligned_stride(row_bytes: usize) -> usize {
    (row_bytes + ROW_ALIGNMENT - 1) & !(ROW_ALIGNMENT - 1)
}

/// Convert a packed RGBA image into a biplanar luma/chroma buffer.
///
/// Fails with `InvalidGeometry` for zero dimensions and `InvalidStride` when
/// the input stride is below `width * 4` or the buffer is shorter than the
/// rows it declares. The input is never mutated.
pub fn convert(packed: &PackedImage<'_>, matrix: &ColorMatrix) -> PipelineResult<PlanarBuffer> {
    let (width, height) = (packed.width as usize, packed.height as usize);
    if packed.width == 0 || packed.height == 0 {
        return Err(PipelineError::InvalidGeometry {
            width: packed.width,
            height: packed.height,
        });
    }
    let src_stride = packed.stride as usize;
    if src_stride < width * 4 {
        return Err(PipelineError::InvalidStride {
            stride: packed.stride,
            width: packed.width,
            bytes_per_pixel: 4,
        });
    }
    if packed.data.len() < src_stride * (height - 1) + width * 4 {
        return Err(PipelineError::InvalidStride {
            stride: packed.stride,
            width: packed.width,
            bytes_per_pixel: 4,
        });
    }

    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);
    // One stride for both planes. The luma row is `width` bytes, the chroma
    // row `2 * chroma_width`; the aligned luma stride always covers both.
    let stride = aligned_stride(width);
    debug_assert!(stride >= 2 * chroma_width);

    let pixel = |x: usize, y: usize| -> [f32; 3] {
        let p = &packed.data[y * src_stride + x * 4..];
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };

    let mut luma = vec![0u8; stride * height];
    for y in 0..height {
        let row = &mut luma[y * stride..y * stride + width];
        for (x, out) in row.iter_mut().enumerate() {
            *out = matrix.luma(pixel(x, y)).round() as u8;
        }
    }

    // Average the four per-pixel chroma values of each 2x2 block. The edge
    // clamp replicates the last row/column, so replicated samples count
    // toward the average and a flat image stays flat.
    let mut chroma = vec![0u8; stride * chroma_height];
    for cy in 0..chroma_height {
        for cx in 0..chroma_width {
            let mut sum = [0.0_f32; 2];
            for dy in 0..2 {
                for dx in 0..2 {
                    let sx = (2 * cx + dx).min(width - 1);
                    let sy = (2 * cy + dy).min(height - 1);
                    let [cb, cr] = matrix.chroma(pixel(sx, sy));
                    sum[0] += cb;
                    sum[1] += cr;
                }
            }
            let base = cy * stride + cx * 2;
            chroma[base] = matrix.clamp_chroma(sum[0] / 4.0).round() as u8;
            chroma[base + 1] = matrix.clamp_chroma(sum[1] / 4.0).round() as u8;
        }
    }

    debug!(
        width,
        height, chroma_width, chroma_height, stride, "converted packed image to biplanar 4:2:0"
    );

    Ok(PlanarBuffer {
        width: packed.width,
        height: packed.height,
        chroma_width: chroma_width as u32,
        chroma_height: chroma_height as u32,
        stride: stride as u32,
        luma,
        chroma,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut data = vec![0u8; (width * height * 4) as usize];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        data
    }

    fn packed(width: u32, height: u32, data: &[u8]) -> PackedImage<'_> {
        PackedImage {
            width,
            height,
            stride: width * 4,
            data,
        }
    }

    #[test]
    fn rejects_zero_dimensions() {
        let data = solid(2, 2, [0, 0, 0, 255]);
        let matrix = ColorMatrix::bt709_full();
        let err = convert(&packed(0, 2, &data), &matrix).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGeometry { .. }));
        let err = convert(&packed(2, 0, &data), &matrix).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGeometry { .. }));
    }

    #[test]
    fn rejects_undersized_stride() {
        let data = solid(4, 4, [0, 0, 0, 255]);
        let image = PackedImage {
            width: 4,
            height: 4,
            stride: 8,
            data: &data,
        };
        let err = convert(&image, &ColorMatrix::bt709_full()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidStride { .. }));
    }

    #[test]
    fn rejects_short_buffer() {
        let data = solid(4, 3, [0, 0, 0, 255]);
        let image = PackedImage {
            width: 4,
            height: 4,
            stride: 16,
            data: &data,
        };
        let err = convert(&image, &ColorMatrix::bt709_full()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidStride { .. }));
    }

    #[test]
    fn chroma_dimensions_are_ceil_half() {
        let matrix = ColorMatrix::bt709_full();
        for (w, h, cw, ch) in [(2, 2, 1, 1), (3, 3, 2, 2), (5, 4, 3, 2), (640, 640, 320, 320)] {
            let data = solid(w, h, [10, 20, 30, 255]);
            let planes = convert(&packed(w, h, &data), &matrix).unwrap();
            assert_eq!(planes.chroma_dimensions(), (cw, ch), "{}x{}", w, h);
        }
    }

    #[test]
    fn degenerate_row_and_column_images() {
        let matrix = ColorMatrix::bt709_full();
        for (w, h) in [(1, 1), (1, 7), (7, 1)] {
            let data = solid(w, h, [200, 40, 90, 255]);
            let planes = convert(&packed(w, h, &data), &matrix).unwrap();
            let expected = (w.div_ceil(2), h.div_ceil(2));
            assert_eq!(planes.chroma_dimensions(), expected);
        }
        let data = solid(1, 1, [200, 40, 90, 255]);
        let planes = convert(&packed(1, 1, &data), &matrix).unwrap();
        assert_eq!(planes.chroma_dimensions(), (1, 1));
    }

    #[test]
    fn solid_color_is_flat_even_with_odd_dimensions() {
        let matrix = ColorMatrix::bt709_full();
        let data = solid(5, 3, [255, 0, 0, 255]);
        let planes = convert(&packed(5, 3, &data), &matrix).unwrap();

        let luma = planes.luma_view();
        let first = luma.data[0];
        for y in 0..3usize {
            for x in 0..5usize {
                assert_eq!(luma.data[y * luma.stride as usize + x], first);
            }
        }

        let chroma = planes.chroma_view();
        let (cb, cr) = (chroma.data[0], chroma.data[1]);
        for cy in 0..2usize {
            for cx in 0..3usize {
                let base = cy * chroma.stride as usize + cx * 2;
                assert_eq!((chroma.data[base], chroma.data[base + 1]), (cb, cr));
            }
        }
    }

    #[test]
    fn solid_red_matches_bt709_values() {
        let matrix = ColorMatrix::bt709_full();
        let data = solid(4, 4, [255, 0, 0, 255]);
        let planes = convert(&packed(4, 4, &data), &matrix).unwrap();
        // Y' = 0.2126 * 255 ≈ 54, Cb ≈ 99, Cr = 255 for pure red, full range
        assert_eq!(planes.luma_view().data[0], 54);
        assert_eq!(planes.chroma_view().data[0], 99);
        assert_eq!(planes.chroma_view().data[1], 255);
    }

    #[test]
    fn chroma_averages_the_block() {
        let matrix = ColorMatrix::bt709_full();
        // Left column red, right column blue; the single chroma cell must be
        // the average of the four per-pixel values, not one corner.
        let mut data = Vec::new();
        for _ in 0..2 {
            data.extend_from_slice(&[255, 0, 0, 255]);
            data.extend_from_slice(&[0, 0, 255, 255]);
        }
        let planes = convert(&packed(2, 2, &data), &matrix).unwrap();

        let red_c = matrix.chroma([255.0, 0.0, 0.0]);
        let blue_c = matrix.chroma([0.0, 0.0, 255.0]);
        let want_cb = matrix.clamp_chroma((red_c[0] + blue_c[0]) / 2.0).round() as u8;
        let want_cr = matrix.clamp_chroma((red_c[1] + blue_c[1]) / 2.0).round() as u8;
        assert_eq!(planes.chroma_view().data[0], want_cb);
        assert_eq!(planes.chroma_view().data[1], want_cr);
    }

    #[test]
    fn accepts_padded_input_stride() {
        let matrix = ColorMatrix::bt709_full();
        let width = 3u32;
        let stride = 32u32;
        let mut data = vec![0u8; (stride * 2) as usize];
        for y in 0..2usize {
            for x in 0..3usize {
                data[y * 32 + x * 4..y * 32 + x * 4 + 4].copy_from_slice(&[0, 255, 0, 255]);
            }
        }
        let image = PackedImage {
            width,
            height: 2,
            stride,
            data: &data,
        };
        let planes = convert(&image, &matrix).unwrap();
        // Green's luma, flat across the plane despite the input padding
        let luma = planes.luma_view();
        assert_eq!(luma.data[0], 182);
        assert_eq!(luma.data[luma.stride as usize + 2], 182);
    }
}
