use glam::{Vec2, Vec4};
use ndarray::Array2;

use crate::field::TexelFormat;

/// A four-channel float texture with linear filtering and clamp-to-edge addressing.
///
/// Texels are indexed `(x, y)` with `y = 0` the bottom row. Both formats are stored at full `f32`
/// precision.
#[derive(Debug, Clone)]
pub struct Texture {
    data: Array2<Vec4>,
    format: TexelFormat,
}

impl Texture {
    pub fn new(width: usize, height: usize, format: TexelFormat) -> Self {
        Self {
            data: Array2::from_elem((width, height), Vec4::ZERO),
            format,
        }
    }

    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[inline]
    pub fn format(&self) -> TexelFormat {
        self.format
    }

    #[inline]
    pub fn data(&self) -> &Array2<Vec4> {
        &self.data
    }

    pub fn replace(&mut self, data: Array2<Vec4>) {
        debug_assert_eq!(data.dim(), self.data.dim());
        self.data = data;
    }

    /// Texel at integer coordinates, clamped to the edge.
    #[inline]
    pub fn fetch(&self, x: isize, y: isize) -> Vec4 {
        let (w, h) = self.data.dim();
        let x = x.clamp(0, w as isize - 1) as usize;
        let y = y.clamp(0, h as isize - 1) as usize;

        self.data[(x, y)]
    }

    /// Bilinear sample at normalized coordinates, where texel `(i, j)` has its center at
    /// `((i + 0.5) / width, (j + 0.5) / height)`.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let (w, h) = self.data.dim();
        let st = uv * Vec2::new(w as f32, h as f32) - 0.5;
        let base = st.floor();
        let t = st - base;

        let x0 = base.x as isize;
        let y0 = base.y as isize;

        let v00 = self.fetch(x0, y0);
        let v10 = self.fetch(x0 + 1, y0);
        let v01 = self.fetch(x0, y0 + 1);
        let v11 = self.fetch(x0 + 1, y0 + 1);

        v00.lerp(v10, t.x).lerp(v01.lerp(v11, t.x), t.y)
    }
}
