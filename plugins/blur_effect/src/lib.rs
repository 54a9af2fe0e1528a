//! Box blur plugin.
//!
//! `blur_amount` (default `5`) is the kernel radius in pixels, capped at
//! [`MAX_RADIUS`]. A radius of `0` leaves the frame unchanged.

use visionflow::frame::FrameBuffer;
use visionflow::graph::NodeParams;

/// Largest accepted radius.
pub const MAX_RADIUS: usize = 64;

const DEFAULT_RADIUS: u64 = 5;

/// One separable pass along rows (`horizontal`) or columns.
fn blur_pass(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    radius: usize,
    horizontal: bool,
) -> Vec<u8> {
    let mut dst = vec![0u8; src.len()];
    let (outer, inner) = if horizontal { (height, width) } else { (width, height) };
    let index = |o: usize, i: usize| {
        if horizontal {
            (o * width + i) * channels
        } else {
            (i * width + o) * channels
        }
    };

    let window = (2 * radius + 1) as u32;
    for o in 0..outer {
        for c in 0..channels {
            for i in 0..inner {
                let lo = i as isize - radius as isize;
                let hi = i as isize + radius as isize;
                let sum: u32 = (lo..=hi)
                    .map(|k| {
                        let k = k.clamp(0, inner as isize - 1) as usize;
                        src[index(o, k) + c] as u32
                    })
                    .sum();
                dst[index(o, i) + c] = ((sum + window / 2) / window) as u8;
            }
        }
    }
    dst
}

/// Blur `frame` with a separable box kernel.
pub fn blur(frame: &FrameBuffer, params: &NodeParams) -> Option<FrameBuffer> {
    let radius = params
        .get("blur_amount")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_RADIUS)
        .min(MAX_RADIUS as u64) as usize;
    if radius == 0 {
        return None;
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let channels = frame.channels as usize;

    let rows = blur_pass(&frame.data, width, height, channels, radius, true);
    let data = blur_pass(&rows, width, height, channels, radius, false);
    Some(FrameBuffer {
        data,
        width: frame.width,
        height: frame.height,
        channels: frame.channels,
    })
}

visionflow::export_frame_processor!(blur);

#[cfg(test)]
mod tests {
    use super::*;

    fn params(amount: u64) -> NodeParams {
        let mut params = NodeParams::new();
        params.insert("blur_amount".into(), amount.into());
        params
    }

    #[test]
    fn test_zero_radius_passes_through() {
        let frame = FrameBuffer::zeroed(4, 4, 3).unwrap();
        assert!(blur(&frame, &params(0)).is_none());
    }

    #[test]
    fn test_uniform_frame_unchanged() {
        let mut frame = FrameBuffer::zeroed(6, 5, 4).unwrap();
        frame.data.fill(93);
        let out = blur(&frame, &params(2)).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_impulse_spreads() {
        let mut frame = FrameBuffer::zeroed(9, 9, 1).unwrap();
        frame.data[4 * 9 + 4] = 255;
        let out = blur(&frame, &params(1)).unwrap();
        // 255 / 3 per pass, rounded.
        assert_eq!(out.row(4)[4], 28);
        assert_eq!(out.row(3)[3], 28);
        assert_eq!(out.row(4)[6], 0);
        assert!(out.data.iter().map(|&b| b as u32).sum::<u32>() > 0);
    }

    #[test]
    fn test_default_radius_keeps_shape() {
        let data = (0..=255u8).cycle().take(16 * 8 * 3).collect();
        let frame = FrameBuffer::new(data, 16, 8, 3).unwrap();
        let out = blur(&frame, &NodeParams::new()).unwrap();
        assert_eq!((out.width, out.height, out.channels), (16, 8, 3));
        assert_eq!(out.data.len(), frame.data.len());
    }

    #[test]
    fn test_exported_abi_passthrough() {
        let frame = FrameBuffer::zeroed(3, 3, 1).unwrap();
        let params = std::ffi::CString::new(r#"{"blur_amount":0}"#).unwrap();
        // SAFETY: `frame.data` covers 3x3x1 bytes and `params` is NUL-terminated.
        let result = unsafe { processFrame(frame.data.as_ptr(), 3, 3, 1, params.as_ptr()) };
        assert!(!result.has_data());
    }
}
