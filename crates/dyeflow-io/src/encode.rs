use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use glam::Vec4;
use log::{debug, info};
use thiserror::Error;

use crate::{as_bytes::AsBytes, frame_file_name, FrameSource, META_FILE};

/// Writes presented frames into a directory: a `_meta` file and one binary PPM per frame.
pub struct FrameSequenceEncoder {
    /// The directory the frames are written into.
    path: PathBuf,
    num_frames: u64,
    fps: u32,
    current_frame: u64,
}

impl FrameSequenceEncoder {
    pub fn new(path: PathBuf, num_frames: u64, fps: u32) -> Result<FrameSequenceEncoder, EncodingError> {
        std::fs::create_dir_all(&path)?;
        info!("recording {num_frames} frames to {}", path.display());

        Ok(Self {
            path,
            num_frames,
            fps,
            current_frame: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.current_frame
    }

    pub fn encode_metadata<S: FrameSource>(&mut self, source: &S) -> Result<(), EncodingError> {
        let (width, height) = source.frame_size();
        let mut writer = BufWriter::new(File::create(self.path.join(META_FILE))?);

        writer.write_all(&self.fps.to_bytes())?;
        writer.write_all(&self.num_frames.to_bytes())?;
        writer.write_all(&width.to_bytes())?;
        writer.write_all(&height.to_bytes())?;
        writer.flush()?;

        Ok(())
    }

    pub fn encode_frame<S: FrameSource>(&mut self, source: &S) -> Result<(), EncodingError> {
        if self.current_frame >= self.num_frames {
            return Err(EncodingError::TooManyFrames(self.num_frames));
        }

        let path = self.path.join(frame_file_name(self.current_frame, self.num_frames));
        let mut writer = BufWriter::new(File::create(&path)?);

        let pixels = source.frame_pixels();
        let (width, height) = pixels.dim();
        write!(writer, "P6\n{width} {height}\n255\n")?;

        // Rows are stored top-down; row 0 of the surface is the bottom.
        let mut row = Vec::with_capacity(width * 3);
        for y in (0..height).rev() {
            row.clear();
            for x in 0..width {
                row.extend_from_slice(&to_rgb8(pixels[(x, y)]));
            }
            writer.write_all(&row)?;
        }
        writer.flush()?;

        debug!("wrote {}", path.display());
        self.current_frame += 1;

        Ok(())
    }
}

/// Clamped 8-bit RGB of a surface texel.
pub fn to_rgb8(color: Vec4) -> [u8; 3] {
    let c = color.truncate().clamp(glam::Vec3::ZERO, glam::Vec3::ONE) * 255.0;
    [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8]
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("the sequence is already complete ({0} frames)")]
    TooManyFrames(u64),
}
