//! Image codec: decode uploads, encode rendered artifacts, draw boxes.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::BoundingBox;

/// Box colour used for rendered detections.
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Box outline thickness in pixels.
pub const BOX_THICKNESS: u32 = 2;

/// An upload decoded into RGB, remembering the container format.
pub struct DecodedImage {
    pub image: RgbImage,
    pub format: ImageFormat,
}

impl DecodedImage {
    /// File extension for artifacts written in this image's format.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

pub fn decode(bytes: &[u8]) -> Result<DecodedImage> {
    if bytes.is_empty() {
        return Err(anyhow!("empty upload"));
    }
    let format = image::guess_format(bytes).context("unrecognized image container")?;
    let image = image::load_from_memory_with_format(bytes, format)
        .with_context(|| format!("decode {:?} image", format))?;
    Ok(DecodedImage {
        image: image.into_rgb8(),
        format,
    })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), format)
        .with_context(|| format!("encode {:?} image", format))?;
    Ok(buf)
}

/// Draw a hollow box with the given outline thickness, clipped to the image.
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
        return;
    }
    let x_min = bbox.x1.clamp(0, w - 1);
    let y_min = bbox.y1.clamp(0, h - 1);
    let x_max = bbox.x2.clamp(0, w);
    let y_max = bbox.y2.clamp(0, h);
    let rw = (x_max - x_min).max(1) as u32;
    let rh = (y_max - y_min).max(1) as u32;

    draw_hollow_rect_mut(image, Rect::at(x_min, y_min).of_size(rw, rh), color);
    for t in 1..(thickness as i32).min(rw as i32 / 2).min(rh as i32 / 2) {
        let inner_w = rw.saturating_sub(2 * t as u32).max(1);
        let inner_h = rh.saturating_sub(2 * t as u32).max(1);
        draw_hollow_rect_mut(
            image,
            Rect::at(x_min + t, y_min + t).of_size(inner_w, inner_h),
            color,
        );
    }
}
