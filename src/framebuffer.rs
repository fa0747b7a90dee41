use anyhow::{Error, Result};
use bytemuck::{Pod, Zeroable};
use std::path::Path;

use crate::color::{colors, Rgba};

#[derive(Copy, Clone, Pod, Zeroable)]
#[repr(C)]
struct Pixel {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl From<Rgba> for Pixel {
    fn from(c: Rgba) -> Pixel {
        Pixel {
            r: (c.r * 255.0).round() as u8,
            g: (c.g * 255.0).round() as u8,
            b: (c.b * 255.0).round() as u8,
            a: (c.a * 255.0).round() as u8,
        }
    }
}

/// Accumulates per-sample frames into a running mean and encodes it to
/// 8-bit RGBA. After `k` samples every pixel holds the arithmetic mean of
/// the `k` frames it has seen.
pub struct Framebuffer {
    acc: Vec<Rgba>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Framebuffer {
        Framebuffer {
            acc: vec![colors::TRANSPARENT; (width * height) as usize],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.acc
    }

    /// Folds the frame of sample `sample_index` (counted from 0) into the
    /// running mean
    pub fn accumulate(&mut self, sample_index: u32, frame: &[Rgba]) {
        debug_assert_eq!(frame.len(), self.acc.len());
        let s = f64::from(sample_index);
        for (acc, sample) in self.acc.iter_mut().zip(frame) {
            *acc = (*acc * s + *sample) / (s + 1.0);
        }
    }

    pub fn clear(&mut self) {
        self.acc.fill(colors::TRANSPARENT);
    }

    /// Encodes the accumulator as packed RGBA bytes, row-major with the
    /// origin at the top left
    pub fn to_bytes(&self) -> Vec<u8> {
        let pixels: Vec<Pixel> = self.acc.iter().map(|c| Pixel::from(*c)).collect();
        bytemuck::cast_slice(&pixels).to_vec()
    }

    /// Saves the accumulator as an image whose format is derived from the
    /// file extension
    pub fn save_img<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        image::save_buffer(
            path,
            &self.to_bytes(),
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )
        .map_err(Error::msg)
    }
}
