//! Image codecs at the HTTP boundary.
//!
//! # Supported Formats
//!
//! | Format | Crate | Decode | Encode |
//! |--------|-------|--------|--------|
//! | PNG | `png` | Yes | Yes |
//! | JPEG | `zune-jpeg` | Yes | No |
//!
//! Decoded frames are always 8-bit with 1, 3 or 4 channels. Palette images
//! are expanded, 16-bit samples are stripped and gray+alpha is widened to RGBA.

use crate::error::{Error, Result};
use crate::frame::FrameBuffer;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Container format of an encoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG/JFIF.
    Jpeg,
}

impl ImageFormat {
    /// Detect the format from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }
}

/// Decode a PNG or JPEG image into a frame.
pub fn decode_image(bytes: &[u8]) -> Result<FrameBuffer> {
    let frame = match ImageFormat::sniff(bytes) {
        Some(ImageFormat::Png) => png_codec::decode(bytes)?,
        Some(ImageFormat::Jpeg) => jpeg_codec::decode(bytes)?,
        None => return Err(Error::Codec("unsupported image format".to_string())),
    };
    tracing::debug!(
        width = frame.width,
        height = frame.height,
        channels = frame.channels,
        "decoded image"
    );
    Ok(frame)
}

/// Encode a frame as an 8-bit PNG.
pub fn encode_png(frame: &FrameBuffer) -> Result<Vec<u8>> {
    png_codec::encode(frame)
}

mod png_codec {
    use super::*;

    pub(super) fn decode(bytes: &[u8]) -> Result<FrameBuffer> {
        let mut decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder
            .read_info()
            .map_err(|e| Error::Codec(format!("PNG header decode failed: {e}")))?;

        let mut pixels = vec![0u8; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut pixels)
            .map_err(|e| Error::Codec(format!("PNG decode failed: {e}")))?;
        pixels.truncate(info.buffer_size());

        let (data, channels) = match info.color_type {
            png::ColorType::Grayscale => (pixels, 1),
            png::ColorType::Rgb => (pixels, 3),
            png::ColorType::Rgba => (pixels, 4),
            png::ColorType::GrayscaleAlpha => (widen_gray_alpha(&pixels), 4),
            png::ColorType::Indexed => {
                return Err(Error::Codec("PNG palette was not expanded".to_string()));
            }
        };

        FrameBuffer::new(data, info.width, info.height, channels)
            .map_err(|e| Error::Codec(format!("PNG produced an unusable frame: {e}")))
    }

    fn widen_gray_alpha(pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(pixels.len() * 2);
        for pair in pixels.chunks_exact(2) {
            out.extend_from_slice(&[pair[0], pair[0], pair[0], pair[1]]);
        }
        out
    }

    pub(super) fn encode(frame: &FrameBuffer) -> Result<Vec<u8>> {
        frame
            .check_shape()
            .map_err(|v| Error::Codec(format!("cannot encode frame: {v}")))?;

        let color = match frame.channels {
            1 => png::ColorType::Grayscale,
            3 => png::ColorType::Rgb,
            4 => png::ColorType::Rgba,
            other => return Err(Error::Codec(format!("cannot encode {other} channels"))),
        };

        let mut output = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut output, frame.width, frame.height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder
                .write_header()
                .map_err(|e| Error::Codec(format!("PNG header write failed: {e}")))?;
            writer
                .write_image_data(&frame.data)
                .map_err(|e| Error::Codec(format!("PNG encode failed: {e}")))?;
        }
        Ok(output)
    }
}

mod jpeg_codec {
    use super::*;
    use zune_jpeg::JpegDecoder;

    pub(super) fn decode(bytes: &[u8]) -> Result<FrameBuffer> {
        let mut decoder = JpegDecoder::new(bytes);
        decoder
            .decode_headers()
            .map_err(|e| Error::Codec(format!("JPEG header decode failed: {e:?}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| Error::Codec("failed to get JPEG info".to_string()))?;
        let width = u32::from(info.width);
        let height = u32::from(info.height);

        let pixels = decoder
            .decode()
            .map_err(|e| Error::Codec(format!("JPEG decode failed: {e:?}")))?;

        // The decoder picks the output colour space; derive channels from the output.
        let area = width as usize * height as usize;
        if area == 0 || pixels.len() % area != 0 {
            return Err(Error::Codec(format!(
                "JPEG output of {} bytes does not fit {width}x{height}",
                pixels.len()
            )));
        }
        let channels = u8::try_from(pixels.len() / area)
            .map_err(|_| Error::Codec("JPEG output has too many channels".to_string()))?;

        FrameBuffer::new(pixels, width, height, channels)
            .map_err(|e| Error::Codec(format!("JPEG produced an unusable frame: {e}")))
    }
}
