//! Off-screen raster the captured frame and overlays are drawn into.
//!
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

pub struct Canvas {
    image: RgbImage,
    blank: bool,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// Zero-sized, blank canvas.
    pub fn new() -> Self {
        Self {
            image: RgbImage::new(0, 0),
            blank: true,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Whether nothing has been drawn since the last clear or resize.
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    /// Change the size; like any raster resize this drops the content.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.image = RgbImage::new(width, height);
        self.blank = true;
    }

    /// Wipe the content, keeping the size.
    pub fn clear(&mut self) {
        self.image.pixels_mut().for_each(|px| *px = Rgb([0, 0, 0]));
        self.blank = true;
    }

    /// Draw `frame` over the whole canvas, scaling it if the sizes differ.
    pub fn draw_image(&mut self, frame: &RgbImage) {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 || frame.width() == 0 || frame.height() == 0 {
            return;
        }

        if frame.dimensions() == (width, height) {
            self.image.copy_from_slice(frame.as_raw());
        } else {
            self.image = imageops::resize(frame, width, height, imageops::FilterType::Triangle);
        }
        self.blank = false;
    }

    /// Draw a filled circle centered on `(x, y)`.
    pub fn fill_circle(&mut self, x: f32, y: f32, radius: i32, color: Rgb<u8>) {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        draw_filled_circle_mut(
            &mut self.image,
            (x.round() as i32, y.round() as i32),
            radius,
            color,
        );
        self.blank = false;
    }
}
