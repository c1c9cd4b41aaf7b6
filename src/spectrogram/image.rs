use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};

/// 8-bit RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Colour-mapped spectrogram
///
/// Column `x` is analysis frame `x`; row 0 is the highest displayed bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramImage {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
    /// Hash of the parameters that produced this image
    params_key: u64,
}

impl SpectrogramImage {
    /// Black image of the given size
    pub fn new(width: usize, height: usize, params_key: u64) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::default(); width * height],
            params_key,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn params_key(&self) -> u64 {
        self.params_key
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Set a pixel; out-of-bounds writes are ignored
    pub fn set(&mut self, x: usize, y: usize, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Row-major pixels, top row first
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Packed RGB bytes, row-major
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for px in &self.pixels {
            bytes.extend_from_slice(&[px.r, px.g, px.b]);
        }
        bytes
    }

    /// Write the image as an 8-bit RGB PNG
    pub fn write_png(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create PNG file: {}", path.display()))?;
        let w = BufWriter::new(file);

        let mut encoder = png::Encoder::new(w, self.width as u32, self.height as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Default);

        let mut writer = encoder
            .write_header()
            .context("Failed to write PNG header")?;
        writer
            .write_image_data(&self.to_rgb_bytes())
            .context("Failed to write PNG image data")?;

        log::info!(
            "Exported {}x{} spectrogram to {}",
            self.width,
            self.height,
            path.display()
        );
        Ok(())
    }
}
