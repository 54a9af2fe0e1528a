//! Frame buffers exchanged between pipeline nodes.
//!
//! A [`FrameBuffer`] is the only data shape that crosses the plugin boundary:
//! tightly packed 8-bit pixels, row-major, top-to-bottom, with 1 (gray),
//! 3 (RGB) or 4 (RGBA) interleaved channels.

use crate::error::{Error, Result};
use std::fmt;

/// Upper bound on the byte size of any frame accepted by the pipeline.
pub const MAX_FRAME_BYTES: usize = 1 << 30;

/// Channel counts a frame may carry.
pub const SUPPORTED_CHANNELS: [u8; 3] = [1, 3, 4];

/// Check whether a channel count is supported.
#[inline]
pub fn is_supported_channels(channels: u8) -> bool {
    SUPPORTED_CHANNELS.contains(&channels)
}

/// Byte length of a packed frame with the given shape, or `None` on overflow.
#[inline]
pub fn packed_len(width: u32, height: u32, channels: u8) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels as usize)
}

/// Describes how a buffer's shape breaks the frame invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeViolation {
    /// What the invariant requires.
    pub expected: String,
    /// What was found.
    pub actual: String,
}

impl fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

impl ShapeViolation {
    fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Check a declared shape against the frame invariants and return its packed length.
pub fn check_dimensions(
    width: u32,
    height: u32,
    channels: u8,
) -> std::result::Result<usize, ShapeViolation> {
    if width == 0 || height == 0 {
        return Err(ShapeViolation::new(
            "non-zero width and height",
            format!("{width}x{height}"),
        ));
    }
    if !is_supported_channels(channels) {
        return Err(ShapeViolation::new(
            "channels in {1, 3, 4}",
            format!("{channels} channels"),
        ));
    }
    match packed_len(width, height, channels) {
        Some(len) if len <= MAX_FRAME_BYTES => Ok(len),
        _ => Err(ShapeViolation::new(
            format!("at most {MAX_FRAME_BYTES} bytes"),
            format!("{width}x{height}x{channels}"),
        )),
    }
}

/// An owned, packed 8-bit pixel buffer.
///
/// Frames are replaced between nodes, never edited in place, so a frame
/// handed to a node is never observed changing underneath it.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Interleaved channels per pixel.
    pub channels: u8,
}

impl FrameBuffer {
    /// Create a frame, checking the buffer invariants.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self> {
        let frame = Self {
            data,
            width,
            height,
            channels,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Create a zero-filled frame.
    pub fn zeroed(width: u32, height: u32, channels: u8) -> Result<Self> {
        let len = check_dimensions(width, height, channels)
            .map_err(|v| Error::InvalidFrame(v.to_string()))?;
        Ok(Self {
            data: vec![0u8; len],
            width,
            height,
            channels,
        })
    }

    /// Check the buffer invariants, reporting the violation if any.
    pub fn check_shape(&self) -> std::result::Result<(), ShapeViolation> {
        let expected = check_dimensions(self.width, self.height, self.channels)?;
        if self.data.len() != expected {
            return Err(ShapeViolation::new(
                format!(
                    "{expected} bytes for {}x{}x{}",
                    self.width, self.height, self.channels
                ),
                format!("{} bytes", self.data.len()),
            ));
        }
        Ok(())
    }

    /// Check the buffer invariants.
    pub fn validate(&self) -> Result<()> {
        self.check_shape()
            .map_err(|v| Error::InvalidFrame(v.to_string()))
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Total byte length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame holds no pixel data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a row of pixels.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("len", &self.data.len())
            .finish()
    }
}
