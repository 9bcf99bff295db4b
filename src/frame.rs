//! Packed raster frames handed to detector backends.
//!
//! The codec decodes uploads into RGB. Detector runtimes disagree on channel
//! order, so a backend declares the order it consumes and the detection
//! adapter packs a `Frame` in that order before inference. Backends only ever
//! see a read-only `Frame`; they cannot mutate the decoded upload.

use image::RgbImage;

/// Byte order of the three colour channels in a packed pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    #[default]
    Bgr,
}

/// Interleaved 8-bit, 3-channel frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
}

impl Frame {
    /// Pack a decoded RGB image into the requested channel order.
    pub fn from_rgb(image: &RgbImage, order: ChannelOrder) -> Self {
        let (width, height) = image.dimensions();
        let data = match order {
            ChannelOrder::Rgb => image.as_raw().clone(),
            ChannelOrder::Bgr => {
                let mut data = Vec::with_capacity(image.as_raw().len());
                for px in image.as_raw().chunks_exact(3) {
                    data.extend_from_slice(&[px[2], px[1], px[0]]);
                }
                data
            }
        };
        Self {
            data,
            width,
            height,
            order,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (x, y) in the frame's own channel order.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Pixel at (x, y) as RGB regardless of the packed order.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let [a, b, c] = self.pixel(x, y);
        match self.order {
            ChannelOrder::Rgb => [a, b, c],
            ChannelOrder::Bgr => [c, b, a],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn bgr_packing_swaps_red_and_blue() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 20, 30]));
        img.put_pixel(1, 0, Rgb([200, 100, 0]));

        let frame = Frame::from_rgb(&img, ChannelOrder::Bgr);
        assert_eq!(frame.pixels(), &[30, 20, 10, 0, 100, 200]);
        assert_eq!(frame.rgb_at(1, 0), [200, 100, 0]);
    }

    #[test]
    fn rgb_packing_is_identity() {
        let mut img = RgbImage::new(1, 2);
        img.put_pixel(0, 1, Rgb([1, 2, 3]));

        let frame = Frame::from_rgb(&img, ChannelOrder::Rgb);
        assert_eq!(frame.pixel(0, 1), [1, 2, 3]);
        assert_eq!(frame.rgb_at(0, 1), [1, 2, 3]);
        assert_eq!(img.get_pixel(0, 1), &Rgb([1, 2, 3]));
    }
}
