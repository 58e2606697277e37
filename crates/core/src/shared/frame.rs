use image::RgbImage;
use ndarray::{ArrayView3, ArrayViewMut3, Axis};

/// A single captured frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens at the capture and render boundaries;
/// everything in between treats the buffer as packed RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of this frame in the capture session, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Mirrors the frame around its vertical axis (selfie view).
    pub fn flip_horizontal(&mut self) {
        let mut view = self.as_ndarray_mut();
        for mut row in view.axis_iter_mut(Axis(0)) {
            let width = row.len_of(Axis(0));
            for col in 0..width / 2 {
                for c in 0..row.len_of(Axis(1)) {
                    row.swap([col, c], [width - 1 - col, c]);
                }
            }
        }
    }

    /// Writes `color` to the pixel at (`x`, `y`). Out-of-frame writes are
    /// ignored so drawing code can clip implicitly.
    pub fn put_pixel(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let channels = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        let n = channels.min(3);
        self.data[offset..offset + n].copy_from_slice(&color[..n]);
    }

    /// Lends the pixel buffer to `draw` as an `RgbImage` and takes it back.
    ///
    /// Returns `None` without calling `draw` unless the frame is packed RGB.
    pub fn with_rgb_image<R>(&mut self, draw: impl FnOnce(&mut RgbImage) -> R) -> Option<R> {
        let (w, h, c) = self.shape();
        if c != 3 || self.data.len() != w * h * c {
            return None;
        }
        let mut img = RgbImage::from_raw(self.width, self.height, std::mem::take(&mut self.data))?;
        let result = draw(&mut img);
        self.data = img.into_raw();
        Some(result)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        let data = vec![0u8; 10];
        Frame::new(data, 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 3, 0);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]);
    }

    #[test]
    fn test_flip_horizontal_swaps_columns() {
        // 3x1 frame: red, green, blue
        let data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255];
        let mut frame = Frame::new(data, 3, 1, 3, 0);
        frame.flip_horizontal();
        assert_eq!(frame.data(), &[0, 0, 255, 0, 255, 0, 255, 0, 0]);
    }

    #[test]
    fn test_flip_horizontal_twice_is_identity() {
        let data: Vec<u8> = (0..4 * 3 * 3).map(|v| v as u8).collect();
        let mut frame = Frame::new(data.clone(), 4, 3, 3, 0);
        frame.flip_horizontal();
        assert_ne!(frame.data(), &data[..]);
        frame.flip_horizontal();
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_put_pixel_writes_rgb() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        frame.put_pixel(1, 1, [10, 20, 30]);
        assert_eq!(frame.as_ndarray()[[1, 1, 0]], 10);
        assert_eq!(frame.as_ndarray()[[1, 1, 1]], 20);
        assert_eq!(frame.as_ndarray()[[1, 1, 2]], 30);
    }

    #[test]
    fn test_with_rgb_image_writes_through() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        let dims = frame.with_rgb_image(|img| {
            img.put_pixel(1, 0, image::Rgb([7, 8, 9]));
            img.dimensions()
        });
        assert_eq!(dims, Some((2, 2)));
        assert_eq!(&frame.data()[3..6], &[7, 8, 9]);
        assert_eq!(frame.data().len(), 12);
    }

    #[test]
    fn test_with_rgb_image_skips_non_rgb_frames() {
        let mut frame = Frame::new(vec![0u8; 16], 2, 2, 4, 0);
        assert!(frame.with_rgb_image(|_| ()).is_none());
        assert_eq!(frame.data().len(), 16);
    }

    #[test]
    fn test_put_pixel_out_of_bounds_is_ignored() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        frame.put_pixel(-1, 0, [255; 3]);
        frame.put_pixel(0, 2, [255; 3]);
        frame.put_pixel(2, 0, [255; 3]);
        assert!(frame.data().iter().all(|&b| b == 0));
    }
}
