//! The framebuffer and its image encoders.
//!
//! Pixels are four-component sRGB+alpha floats stored in scanlines from
//! bottom to top (ready for direct GPU upload). The buffer starts out as
//! a checkerboard so aborted or unfinished regions are recognizable at a
//! glance. Encoders convert to each format's own orientation and
//! encoding at the boundary.

use std::io::Write;
use std::path::Path;

use glam::{Vec3, Vec4};

use crate::color::srgb_to_lrgb;
use crate::config::TILE_SIZE;
use crate::error::SpectraError;

/// A rectangular sub-region of the framebuffer, at most
/// `TILE_SIZE × TILE_SIZE` pixels.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    /// Pixel index of the tile's origin.
    pub pos: [usize; 2],
    /// Width and height in pixels.
    pub res: [usize; 2],
}

/// Two-dimensional array of sRGB+alpha pixels, scanlines bottom to top.
pub struct Framebuffer {
    /// Width and height in pixels.
    pub res: [usize; 2],
    pixels: Vec<Vec4>,
}

impl Framebuffer {
    /// Allocate the buffer pre-filled with a tile-sized checkerboard.
    pub fn new(res: [usize; 2]) -> Self {
        let mut pixels = vec![Vec4::ZERO; res[0] * res[1]];
        for j in 0..res[1] {
            for i in 0..res[0] {
                let shade = if ((i / TILE_SIZE) ^ (j / TILE_SIZE)) % 2 == 0 {
                    0.7
                } else {
                    0.3
                };
                pixels[j * res[0] + i] = Vec4::new(shade, shade, shade, 1.0);
            }
        }
        Self { res, pixels }
    }

    /// Read the pixel at (`i`, `j`); row 0 is the bottom scanline.
    pub fn pixel(&self, i: usize, j: usize) -> Vec4 {
        self.pixels[j * self.res[0] + i]
    }

    /// Write the pixel at (`i`, `j`).
    pub fn set_pixel(&mut self, i: usize, j: usize, value: Vec4) {
        self.pixels[j * self.res[0] + i] = value;
    }

    /// Save the image; the encoder is chosen by the path's extension
    /// (`.csv`, `.hdr`, `.pfm`, anything else is PNG).
    ///
    /// # Errors
    ///
    /// I/O and encoding failures surface as [`SpectraError`].
    pub fn save(&self, path: &Path) -> Result<(), SpectraError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => self.save_csv(path),
            Some("hdr") => self.save_hdr(path),
            Some("pfm") => self.save_pfm(path),
            _ => self.save_png(path),
        }
    }

    fn lrgb_at(&self, i: usize, j: usize) -> Vec3 {
        let srgba = self.pixel(i, j);
        srgb_to_lrgb(Vec3::new(srgba.x, srgba.y, srgba.z))
    }

    /// Linear RGB triples, one image row per CSV row, in storage
    /// (bottom-to-top) order.
    fn save_csv(&self, path: &Path) -> Result<(), SpectraError> {
        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        for j in 0..self.res[1] {
            for i in 0..self.res[0] {
                let lrgb = self.lrgb_at(i, j);
                if i > 0 {
                    write!(out, ",")?;
                }
                write!(out, "{},{},{}", lrgb.x, lrgb.y, lrgb.z)?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Radiance RGBE. The `-Y +X` resolution line means rows run top to
    /// bottom in the file, so the storage order flips.
    fn save_hdr(&self, path: &Path) -> Result<(), SpectraError> {
        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        write!(
            out,
            "#?RADIANCE\nFORMAT=32-bit_rle_rgbe\nEXPOSURE=1.0\nSOFTWARE=spectra\n\n-Y {} +X {}\n",
            self.res[1], self.res[0]
        )?;

        for j in 0..self.res[1] {
            for i in 0..self.res[0] {
                let lrgb = self.lrgb_at(i, self.res[1] - 1 - j);

                let v = lrgb.x.max(lrgb.y).max(lrgb.z);
                if v < 1.0e-32 {
                    out.write_all(&[0u8; 4])?;
                } else {
                    let (mantissa, exp) = frexp(v);
                    let scale = mantissa * 256.0 / v;
                    let rgb = lrgb * scale;
                    let bytes = [
                        (rgb.x.round() as i64).clamp(0, 255) as u8,
                        (rgb.y.round() as i64).clamp(0, 255) as u8,
                        (rgb.z.round() as i64).clamp(0, 255) as u8,
                        (exp + 128) as u8,
                    ];
                    out.write_all(&bytes)?;
                }
            }
        }
        out.flush()?;
        Ok(())
    }

    /// PFM with a positive scale (big-endian floats). Rows run bottom to
    /// top in the file, matching storage order directly.
    fn save_pfm(&self, path: &Path) -> Result<(), SpectraError> {
        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        write!(out, "PF\n{} {}\n1.0\n", self.res[0], self.res[1])?;

        for j in 0..self.res[1] {
            for i in 0..self.res[0] {
                let lrgb = self.lrgb_at(i, j);
                out.write_all(&lrgb.x.to_be_bytes())?;
                out.write_all(&lrgb.y.to_be_bytes())?;
                out.write_all(&lrgb.z.to_be_bytes())?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// 8-bit RGBA PNG, scanlines top to bottom.
    fn save_png(&self, path: &Path) -> Result<(), SpectraError> {
        let mut bytes = Vec::with_capacity(self.res[0] * self.res[1] * 4);
        for j in 0..self.res[1] {
            for i in 0..self.res[0] {
                // Vertical flip into the PNG's top-to-bottom order
                let srgba = self.pixel(i, self.res[1] - 1 - j);
                let clipped = (srgba * 255.0).clamp(Vec4::ZERO, Vec4::splat(255.0));
                bytes.push(clipped.x.round() as u8);
                bytes.push(clipped.y.round() as u8);
                bytes.push(clipped.z.round() as u8);
                bytes.push(clipped.w.round() as u8);
            }
        }

        let img = image::RgbaImage::from_raw(self.res[0] as u32, self.res[1] as u32, bytes)
            .ok_or_else(|| SpectraError::ImageEncode("buffer size mismatch".to_owned()))?;
        img.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Split a positive finite float into mantissa in [0.5, 1) and exponent,
/// with `x = mantissa · 2^exp`.
fn frexp(x: f32) -> (f32, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 23) & 0xFF) as i32;
    if biased == 0 {
        // Subnormal: renormalize first
        let (m, e) = frexp(x * 2f32.powi(64));
        return (m, e - 64);
    }
    let exp = biased - 126;
    let mantissa = f32::from_bits((bits & 0x807F_FFFF) | (126 << 23));
    (mantissa, exp)
}
