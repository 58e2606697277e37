//! Frame-to-tensor conversion shared by the ONNX backends.

use crate::shared::frame::Frame;

/// Rectangle of the source frame to sample, in pixels. May extend past the
/// frame; samples outside the frame read as black.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SampleRect {
    pub fn full_frame(frame: &Frame) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: frame.width() as f64,
            height: frame.height() as f64,
        }
    }
}

/// Value range the model expects for pixel intensities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelRange {
    /// [0, 1]
    Unit,
    /// [-1, 1]
    Symmetric,
}

impl PixelRange {
    fn map(self, value: u8) -> f32 {
        let unit = value as f32 / 255.0;
        match self {
            PixelRange::Unit => unit,
            PixelRange::Symmetric => unit * 2.0 - 1.0,
        }
    }
}

/// Nearest-neighbor resample of `rect` to `size x size`, NCHW float32.
pub fn sample_nchw(
    frame: &Frame,
    rect: SampleRect,
    size: u32,
    range: PixelRange,
) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_w = frame.width() as i64;
    let src_h = frame.height() as i64;
    let s = size as usize;
    let black = range.map(0);

    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, s, s), black);

    for y in 0..s {
        let src_y = (rect.y + (y as f64 + 0.5) * rect.height / s as f64).floor() as i64;
        if src_y < 0 || src_y >= src_h {
            continue;
        }
        for x in 0..s {
            let src_x = (rect.x + (x as f64 + 0.5) * rect.width / s as f64).floor() as i64;
            if src_x < 0 || src_x >= src_w {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, y, x]] = range.map(src[[src_y as usize, src_x as usize, c]]);
            }
        }
    }

    tensor
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, value: u8) -> Frame {
        Frame::new(vec![value; (w * h * 3) as usize], w, h, 3, 0)
    }

    #[test]
    fn test_sample_shape() {
        let frame = solid(200, 100, 128);
        let tensor = sample_nchw(&frame, SampleRect::full_frame(&frame), 128, PixelRange::Unit);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_unit_range() {
        let frame = solid(50, 50, 255);
        let tensor = sample_nchw(&frame, SampleRect::full_frame(&frame), 16, PixelRange::Unit);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_symmetric_range() {
        let frame = solid(50, 50, 0);
        let tensor = sample_nchw(
            &frame,
            SampleRect::full_frame(&frame),
            16,
            PixelRange::Symmetric,
        );
        assert!((tensor[[0, 2, 5, 5]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_frame_samples_are_black() {
        let frame = solid(10, 10, 255);
        // Left half of the rect lies outside the frame.
        let rect = SampleRect {
            x: -10.0,
            y: 0.0,
            width: 20.0,
            height: 10.0,
        };
        let tensor = sample_nchw(&frame, rect, 4, PixelRange::Unit);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert_eq!(tensor[[0, 0, 0, 3]], 1.0);
    }

    #[test]
    fn test_sample_preserves_channel_order() {
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&[255, 0, 51]);
        }
        let frame = Frame::new(data, 2, 2, 3, 0);
        let tensor = sample_nchw(&frame, SampleRect::full_frame(&frame), 2, PixelRange::Unit);
        assert_eq!(tensor[[0, 0, 1, 1]], 1.0);
        assert_eq!(tensor[[0, 1, 1, 1]], 0.0);
        assert!((tensor[[0, 2, 1, 1]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
    }
}
