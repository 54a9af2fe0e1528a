//! Sobel edge detection plugin.
//!
//! Parameters:
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `ksize` | `3` | `1` for a central difference, `3` for the 3x3 Sobel kernel |
//! | `scale` | `1.0` | Multiplier applied to the gradient magnitude |
//!
//! The output keeps the input shape: the gradient magnitude of the luma
//! plane is written to every colour channel and alpha is copied through.

use visionflow::frame::FrameBuffer;
use visionflow::graph::NodeParams;

/// Rec. 601 luma of one pixel.
fn luma(px: &[u8]) -> i32 {
    match px.len() {
        1 | 2 => px[0] as i32,
        _ => (77 * px[0] as i32 + 150 * px[1] as i32 + 29 * px[2] as i32) >> 8,
    }
}

fn luma_plane(frame: &FrameBuffer) -> Vec<i32> {
    frame
        .data
        .chunks_exact(frame.channels as usize)
        .map(luma)
        .collect()
}

/// Compute the edge image of `frame`.
pub fn sobel(frame: &FrameBuffer, params: &NodeParams) -> Option<FrameBuffer> {
    let ksize = params.get("ksize").and_then(|v| v.as_u64()).unwrap_or(3);
    let scale = params.get("scale").and_then(|v| v.as_f64()).unwrap_or(1.0);

    let width = frame.width as i64;
    let height = frame.height as i64;
    let channels = frame.channels as usize;
    let gray = luma_plane(frame);

    let at = |x: i64, y: i64| -> i32 {
        let x = x.clamp(0, width - 1);
        let y = y.clamp(0, height - 1);
        gray[(y * width + x) as usize]
    };

    let mut out = frame.clone();
    for y in 0..height {
        for x in 0..width {
            let (gx, gy) = if ksize == 1 {
                (at(x + 1, y) - at(x - 1, y), at(x, y + 1) - at(x, y - 1))
            } else {
                let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
                let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
                (gx, gy)
            };

            let magnitude = ((gx.abs() + gy.abs()) as f64 * scale).clamp(0.0, 255.0) as u8;
            let offset = (y * width + x) as usize * channels;
            let colour = if channels == 4 { 3 } else { channels };
            out.data[offset..offset + colour].fill(magnitude);
        }
    }
    Some(out)
}

visionflow::export_frame_processor!(sobel);
