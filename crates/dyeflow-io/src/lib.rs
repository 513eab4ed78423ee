use dyeflow_fluids::{backend::Backend, Scene};
use glam::Vec4;
use ndarray::Array2;

pub mod as_bytes;
pub mod decode;
pub mod encode;

pub(crate) const META_FILE: &str = "_meta";

/// Something that presents frames which can be recorded.
pub trait FrameSource {
    fn frame_size(&self) -> (u32, u32);

    /// The presented pixels, indexed `(x, y)` with `y = 0` the bottom row.
    fn frame_pixels(&self) -> Array2<Vec4>;
}

impl<B: Backend> FrameSource for Scene<B> {
    fn frame_size(&self) -> (u32, u32) {
        self.backend().surface_size()
    }

    fn frame_pixels(&self) -> Array2<Vec4> {
        self.backend().read_surface()
    }
}

/// File name of `frame`, zero-padded to the width of the last frame number.
pub(crate) fn frame_file_name(frame: u64, num_frames: u64) -> String {
    let max_digits = num_frames.saturating_sub(1).checked_ilog10().unwrap_or(0) + 1;
    format!("{frame:0width$}.ppm", width = max_digits as usize)
}
