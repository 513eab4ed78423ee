use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::PathBuf,
};

use thiserror::Error;

use crate::{as_bytes::AsBytes, frame_file_name, META_FILE};

pub struct FrameSequenceDecoder {
    /// The directory the recorded frames reside in.
    path: PathBuf,
    num_frames: u64,
    current_frame: u64,
}

impl FrameSequenceDecoder {
    pub fn new(path: PathBuf) -> FrameSequenceDecoder {
        Self {
            path,
            num_frames: 0,
            current_frame: 0,
        }
    }

    fn read_value<const N: usize, T: AsBytes<N>, R: Read>(reader: &mut R) -> Result<T, DecodingError> {
        let mut bytes = [0; N];
        reader.read_exact(&mut bytes)?;

        Ok(T::from_bytes(bytes))
    }

    pub fn decode_metadata(&mut self) -> Result<FrameMetadata, DecodingError> {
        let mut reader = BufReader::new(File::open(self.path.join(META_FILE))?);

        let fps = Self::read_value::<4, u32, _>(&mut reader)?;
        let num_frames = Self::read_value::<8, u64, _>(&mut reader)?;
        let width = Self::read_value::<4, u32, _>(&mut reader)?;
        let height = Self::read_value::<4, u32, _>(&mut reader)?;

        self.num_frames = num_frames;

        Ok(FrameMetadata {
            fps,
            num_frames,
            width,
            height,
        })
    }

    /// Reads the next frame, or `None` once every frame has been read.
    pub fn decode_frame(&mut self) -> Result<Option<FrameData>, DecodingError> {
        if self.current_frame >= self.num_frames {
            return Ok(None);
        }

        let path = self.path.join(frame_file_name(self.current_frame, self.num_frames));
        let mut reader = BufReader::new(File::open(path)?);

        let magic = read_token(&mut reader)?;
        if magic != "P6" {
            return Err(DecodingError::Format(format!("expected P6, found `{magic}`")));
        }

        let width = parse_number(&read_token(&mut reader)?)?;
        let height = parse_number(&read_token(&mut reader)?)?;
        let max = parse_number(&read_token(&mut reader)?)?;
        if max != 255 {
            return Err(DecodingError::Format(format!("unsupported maximum value {max}")));
        }

        let len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| DecodingError::Format(format!("frame size {width}x{height} is too large")))?;

        // Only the bytes present are buffered; a short file is malformed.
        let mut rgb = Vec::new();
        reader.by_ref().take(len as u64).read_to_end(&mut rgb)?;
        if rgb.len() != len {
            return Err(DecodingError::Format(format!(
                "expected {len} bytes of pixel data, found {}",
                rgb.len()
            )));
        }

        self.current_frame += 1;

        Ok(Some(FrameData { width, height, rgb }))
    }

    pub fn reset(&mut self) {
        self.current_frame = 0;
    }
}

/// Reads one whitespace-delimited header token, consuming the single whitespace byte after it.
fn read_token<R: BufRead>(reader: &mut R) -> Result<String, DecodingError> {
    let mut token = String::new();
    let mut byte = [0; 1];

    loop {
        reader.read_exact(&mut byte)?;
        if byte[0].is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            return Ok(token);
        }
        token.push(byte[0] as char);
    }
}

fn parse_number(token: &str) -> Result<usize, DecodingError> {
    token
        .parse()
        .map_err(|_| DecodingError::Format(format!("expected a number, found `{token}`")))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameMetadata {
    pub fps: u32,
    pub num_frames: u64,
    pub width: u32,
    pub height: u32,
}

/// One decoded frame, rows top-down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameData {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

impl FrameData {
    /// The pixel in column `x` of row `row`, counted from the top.
    pub fn pixel(&self, x: usize, row: usize) -> [u8; 3] {
        let i = (row * self.width + x) * 3;
        [self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]]
    }
}

#[derive(Debug, Error)]
pub enum DecodingError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Format(String),
}
