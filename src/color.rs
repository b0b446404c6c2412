// SPDX-License-Identifier: GPL-3.0-only

//! Forward and inverse color matrices for packed RGB ↔ luma/chroma conversion
//!
//! The fixed matrix is BT.709 with a full 8-bit range (luma bias 0, chroma
//! bias 128, both channels clamped to 0..255). The inverse transform used by
//! the reconstruction kernel is derived algebraically from the forward
//! coefficients, so the two are consistent by construction.

/// Coefficients and range parameters for the packed-RGB → luma/chroma
/// transform. Pure data; the converter and the kernel both consume it.
#[derive(Debug, Clone, Copy)]
pub struct ColorMatrix {
    /// Rows map [R, G, B] to [Y', Cb, Cr] before bias
    pub coeffs: [[f32; 3]; 3],
    pub luma_bias: f32,
    pub chroma_bias: f32,
    /// Clamp range for the luma channel, inclusive
    pub luma_range: [f32; 2],
    /// Clamp range for both chroma channels, inclusive
    pub chroma_range: [f32; 2],
}

/// The algebraic inverse of a [`ColorMatrix`], mapping biased luma/chroma
/// back to packed RGB.
#[derive(Debug, Clone, Copy)]
pub struct InverseColorMatrix {
    /// Rows map [Y' - luma_bias, Cb - chroma_bias, Cr - chroma_bias] to [R, G, B]
    pub coeffs: [[f32; 3]; 3],
    pub luma_bias: f32,
    pub chroma_bias: f32,
}

impl ColorMatrix {
    /// BT.709 coefficients, full 8-bit range.
    pub fn bt709_full() -> Self {
        let (kr, kg, kb) = (0.2126_f32, 0.7152_f32, 0.0722_f32);
        // Cb = (B - Y') / (2 (1 - Kb)), Cr = (R - Y') / (2 (1 - Kr))
        let cb_den = 2.0 * (1.0 - kb);
        let cr_den = 2.0 * (1.0 - kr);
        Self {
            coeffs: [
                [kr, kg, kb],
                [-kr / cb_den, -kg / cb_den, 0.5],
                [0.5, -kg / cr_den, -kb / cr_den],
            ],
            luma_bias: 0.0,
            chroma_bias: 128.0,
            luma_range: [0.0, 255.0],
            chroma_range: [0.0, 255.0],
        }
    }

    /// Biased, clamped luma for one pixel (0..255 domain).
    #[inline]
    pub fn luma(&self, rgb: [f32; 3]) -> f32 {
        let row = self.coeffs[0];
        let y = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2] + self.luma_bias;
        y.clamp(self.luma_range[0], self.luma_range[1])
    }

    /// Unbiased chroma pair for one pixel. The converter averages these over
    /// a 2x2 block before applying the bias and clamp.
    #[inline]
    pub fn chroma(&self, rgb: [f32; 3]) -> [f32; 2] {
        let cb = self.coeffs[1];
        let cr = self.coeffs[2];
        [
            cb[0] * rgb[0] + cb[1] * rgb[1] + cb[2] * rgb[2],
            cr[0] * rgb[0] + cr[1] * rgb[1] + cr[2] * rgb[2],
        ]
    }

    /// Bias then clamp a chroma value.
    #[inline]
    pub fn clamp_chroma(&self, c: f32) -> f32 {
        (c + self.chroma_bias).clamp(self.chroma_range[0], self.chroma_range[1])
    }

    /// Derive the inverse transform from the forward coefficients
    /// (adjugate over determinant of the 3x3 matrix).
    pub fn inverse(&self) -> InverseColorMatrix {
        let m = &self.coeffs;
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        let d = 1.0 / det;
        let coeffs = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * d,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * d,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * d,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * d,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * d,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * d,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * d,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * d,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * d,
            ],
        ];
        InverseColorMatrix {
            coeffs,
            luma_bias: self.luma_bias,
            chroma_bias: self.chroma_bias,
        }
    }
}

impl InverseColorMatrix {
    /// Reconstruct one RGB pixel from biased luma/chroma (0..255 domain).
    /// Mirrors the arithmetic the compute kernel performs per invocation.
    #[inline]
    pub fn apply(&self, ycc: [f32; 3]) -> [f32; 3] {
        let v = [
            ycc[0] - self.luma_bias,
            ycc[1] - self.chroma_bias,
            ycc[2] - self.chroma_bias,
        ];
        let mut rgb = [0.0_f32; 3];
        for (out, row) in rgb.iter_mut().zip(self.coeffs.iter()) {
            *out = (row[0] * v[0] + row[1] * v[1] + row[2] * v[2]).clamp(0.0, 255.0);
        }
        rgb
    }
}
