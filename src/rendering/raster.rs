//! Raster images: SVG materialization, colour inversion and PNG output.

use crate::core::error::{RenderError, RenderResult};
use base64::{Engine as _, engine::general_purpose};
use image::{Rgba, RgbaImage};
use resvg::{tiny_skia, usvg};

/// Prefix of the data URLs produced by [`encode_png_data_url`].
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// An RGBA8 raster with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    /// Wraps raw RGBA8 pixel data. Fails if the buffer does not match the size.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        let actual = data.len();
        RgbaImage::from_raw(width, height, data)
            .map(|pixels| Self { pixels })
            .ok_or_else(|| {
                RenderError::Materialize(format!(
                    "pixel buffer of {} bytes does not match {}x{} (expected {})",
                    actual, width, height, expected
                ))
            })
    }

    /// A raster filled with one colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba(rgba)),
        }
    }

    fn from_pixmap(pixmap: &tiny_skia::Pixmap) -> Self {
        let mut pixels = RgbaImage::new(pixmap.width(), pixmap.height());
        for (dst, src) in pixels.pixels_mut().zip(pixmap.pixels()) {
            let color = src.demultiply();
            *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
        }
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Returns the pixel at (x, y), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width() && y < self.height()).then(|| self.pixels.get_pixel(x, y).0)
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Inverts the R, G and B channels of every pixel, keeping alpha.
    pub fn invert_colors(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            pixel.0 = [255 - r, 255 - g, 255 - b, a];
        }
    }

    /// Encodes the raster as PNG.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width(), self.height());
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder
                .write_header()
                .map_err(|e| RenderError::Encode(format!("PNG write header error: {}", e)))?;
            writer
                .write_image_data(self.as_raw())
                .map_err(|e| RenderError::Encode(format!("PNG write data error: {}", e)))?;
        }
        Ok(png_data)
    }

    /// Encodes the raster as a base64 PNG data URL.
    pub fn to_png_data_url(&self) -> RenderResult<String> {
        Ok(encode_png_data_url(&self.to_png()?))
    }
}

/// Wraps PNG bytes in a data URL.
pub fn encode_png_data_url(png_data: &[u8]) -> String {
    format!(
        "{}{}",
        PNG_DATA_URL_PREFIX,
        general_purpose::STANDARD.encode(png_data)
    )
}

/// Rasterizes an SVG document at `scale` device pixels per SVG unit.
///
/// This is CPU bound; async callers run it on a blocking thread.
pub fn materialize_svg(svg_data: &[u8], scale: f32) -> RenderResult<RasterImage> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RenderError::Materialize(format!("invalid raster scale {}", scale)));
    }

    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(svg_data, &options)
        .map_err(|e| RenderError::Materialize(format!("Failed to parse SVG: {}", e)))?;

    let size = tree.size();
    let width = (size.width() * scale).ceil().max(1.0) as u32;
    let height = (size.height() * scale).ceil().max(1.0) as u32;

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        RenderError::Materialize(format!("Failed to allocate {}x{} canvas", width, height))
    })?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    Ok(RasterImage::from_pixmap(&pixmap))
}
