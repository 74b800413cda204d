//! Rendered page images handed to the pipeline by a rasterizer.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer};

/// Layout of the bytes in a [`PageImage`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A rendered page: raw pixels plus the dimensions and resolution it was
/// rendered at.
///
/// The declared `width`/`height` are authoritative for geometry even when the
/// buffer turns out to be unusable, so layout fallbacks can still cover the
/// full page.
#[derive(Debug, Clone)]
pub struct PageImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    dpi: u32,
    format: PixelFormat,
}

impl PageImage {
    /// Wrap a raw pixel buffer. The buffer is not validated here.
    pub fn from_raw(pixels: Vec<u8>, width: u32, height: u32, dpi: u32, format: PixelFormat) -> Self {
        Self {
            pixels,
            width,
            height,
            dpi,
            format,
        }
    }

    pub fn from_dynamic(image: DynamicImage, dpi: u32) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::from_raw(rgb.into_raw(), width, height, dpi, PixelFormat::Rgb8)
    }

    /// Decode an encoded image (PNG, JPEG, ...) from memory.
    pub fn decode(bytes: &[u8], dpi: u32) -> Result<Self, image::ImageError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(image, dpi))
    }

    /// Load an image file from disk.
    pub fn open(path: &Path, dpi: u32) -> Result<Self, image::ImageError> {
        let image = image::open(path)?;
        Ok(Self::from_dynamic(image, dpi))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Whether the buffer length matches the declared geometry.
    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len()
                == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Grayscale view of the page, `None` when the buffer is unusable.
    pub fn to_gray(&self) -> Option<GrayImage> {
        self.to_dynamic().map(|img| img.to_luma8())
    }

    /// Convert into an `image` crate value, `None` when the buffer is unusable.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        if !self.is_consistent() {
            return None;
        }
        let pixels = self.pixels.clone();
        match self.format {
            PixelFormat::Gray8 => ImageBuffer::from_raw(self.width, self.height, pixels)
                .map(DynamicImage::ImageLuma8),
            PixelFormat::Rgb8 => ImageBuffer::from_raw(self.width, self.height, pixels)
                .map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => ImageBuffer::from_raw(self.width, self.height, pixels)
                .map(DynamicImage::ImageRgba8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_buffer_is_inconsistent() {
        let page = PageImage::from_raw(vec![0; 10], 900, 1400, 150, PixelFormat::Rgb8);
        assert!(!page.is_consistent());
        assert!(page.to_gray().is_none());
        assert_eq!(page.width(), 900);
    }

    #[test]
    fn test_gray_buffer_round_trips_dimensions() {
        let page = PageImage::from_raw(vec![255; 40 * 30], 40, 30, 72, PixelFormat::Gray8);
        let gray = page.to_gray().unwrap();
        assert_eq!(gray.dimensions(), (40, 30));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(PageImage::decode(b"not an image", 150).is_err());
    }
}
