//! Sampled spectra and hero-wavelength arithmetic.
//!
//! A [`Spectrum`] is a piecewise-linear function of wavelength, stored as
//! evenly spaced samples over a closed interval and identically zero
//! outside it. The path tracer never carries whole spectra along a path;
//! it carries [`HeroSample`]s, fixed-size vectors holding the spectrum
//! evaluated at the hero wavelength and its evenly spaced companions.

use std::ops::{Add, Mul};
use std::path::Path;

use glam::Vec4;

use crate::config::{LAMBDA_MAX, LAMBDA_MIN, LAMBDA_STEP, SAMPLE_WAVELENGTHS};
use crate::error::SpectraError;

/// Wavelength in nanometers.
pub type Nm = f32;

/// A spectrum sampled at the hero wavelength `lambda_0` and its
/// companions `lambda_0 + k * LAMBDA_STEP`. Slot 0 is always the hero.
///
/// All light-transport arithmetic is componentwise over the slots, so the
/// sample behaves algebraically exactly like a color triple with one
/// extra channel.
pub type HeroSample = Vec4;

// `HeroSample` is a Vec4; the slot count is not independently tunable.
const _: () = assert!(SAMPLE_WAVELENGTHS == 4);

/// Spectral radiance, W·sr⁻¹·m⁻²·nm⁻¹.
pub type SpectralRadiance = Spectrum;
/// Spectral radiant flux, W·nm⁻¹.
pub type SpectralRadiantFlux = Spectrum;
/// Dimensionless spectral reflectance in [0, 1].
pub type SpectralReflectance = Spectrum;
/// Per-steradian spectral quantity (a BSDF value), sr⁻¹.
pub type SpectralRecipSr = Spectrum;
/// A spectrum with no particular radiometric unit attached.
pub type SpectrumUnspecified = Spectrum;

/// How a spectrum is reconstructed between its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconstruction {
    /// Piecewise-constant: the closest sample wins.
    Nearest,
    /// Piecewise-linear interpolation of the two flanking samples.
    Linear,
}

/// A function of wavelength stored as evenly spaced samples.
///
/// Invariants: at least two samples, `low < high`, stride
/// `(high - low) / (n - 1)`, zero outside `[low, high]`.
#[derive(Debug, Clone)]
pub struct Spectrum {
    data: Vec<f32>,
    low: Nm,
    high: Nm,
    delta: Nm,
    delta_recip: f32,
    reconstruction: Reconstruction,
}

impl Spectrum {
    /// Spectrum from samples spanning `[low, high]` with linear
    /// reconstruction.
    ///
    /// # Errors
    ///
    /// [`SpectraError::InvalidSpectrum`] when fewer than two samples are
    /// given.
    pub fn new(data: Vec<f32>, low: Nm, high: Nm) -> Result<Self, SpectraError> {
        Self::with_reconstruction(data, low, high, Reconstruction::Linear)
    }

    /// Spectrum from samples with an explicit reconstruction mode.
    ///
    /// # Errors
    ///
    /// [`SpectraError::InvalidSpectrum`] when fewer than two samples are
    /// given.
    pub fn with_reconstruction(
        data: Vec<f32>,
        low: Nm,
        high: Nm,
        reconstruction: Reconstruction,
    ) -> Result<Self, SpectraError> {
        if data.len() < 2 {
            return Err(SpectraError::InvalidSpectrum(data.len()));
        }
        let numer = high - low;
        let denom = (data.len() - 1) as f32;
        Ok(Self {
            data,
            low,
            high,
            delta: numer / denom,
            delta_recip: denom / numer,
            reconstruction,
        })
    }

    /// Constant spectrum over the full sampled window.
    pub fn constant(value: f32) -> Self {
        // Two samples always satisfy the constructor invariant.
        Self {
            data: vec![value; 2],
            low: LAMBDA_MIN,
            high: LAMBDA_MAX,
            delta: LAMBDA_MAX - LAMBDA_MIN,
            delta_recip: 1.0 / (LAMBDA_MAX - LAMBDA_MIN),
            reconstruction: Reconstruction::Linear,
        }
    }

    /// Low edge of the support in nanometers.
    pub fn low(&self) -> Nm {
        self.low
    }

    /// High edge of the support in nanometers.
    pub fn high(&self) -> Nm {
        self.high
    }

    /// Stride between samples in nanometers.
    pub fn delta(&self) -> Nm {
        self.delta
    }

    /// The raw sample values.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    fn sample_nearest(&self, lambda: Nm) -> f32 {
        let i = ((lambda - self.low) * self.delta_recip).round() as i64;
        if i >= 0 && (i as usize) < self.data.len() {
            self.data[i as usize]
        } else {
            0.0
        }
    }

    fn sample_linear(&self, lambda: Nm) -> f32 {
        let i = (lambda - self.low) * self.delta_recip;
        let i0f = i.floor();
        let frac = i - i0f;
        let i0 = i0f as i64;
        let i1 = i0 + 1;

        let val0 = if i0 >= 0 && (i0 as usize) < self.data.len() {
            self.data[i0 as usize]
        } else {
            0.0
        };
        let val1 = if i1 >= 0 && (i1 as usize) < self.data.len() {
            self.data[i1 as usize]
        } else {
            0.0
        };

        val0 * (1.0 - frac) + val1 * frac
    }

    /// Reconstruct the spectrum at an arbitrary wavelength. Zero outside
    /// `[low, high]`.
    pub fn sample(&self, lambda: Nm) -> f32 {
        match self.reconstruction {
            Reconstruction::Nearest => self.sample_nearest(lambda),
            Reconstruction::Linear => self.sample_linear(lambda),
        }
    }

    /// Take a hero sample at hero wavelength `lambda_0`: slot `k` holds
    /// the reconstruction at `lambda_0 + k * LAMBDA_STEP`.
    pub fn hero_sample(&self, lambda_0: Nm) -> HeroSample {
        let mut result = HeroSample::ZERO;
        for k in 0..SAMPLE_WAVELENGTHS {
            result[k] = self.sample(lambda_0 + k as f32 * LAMBDA_STEP);
        }
        result
    }

    /// Riemann-sum integral of the spectrum over its support. Exact for
    /// both nearest and linear reconstruction.
    pub fn integrate(spec: &Spectrum) -> f32 {
        let sum: f32 = spec.data.iter().sum();
        sum * spec.delta
    }

    /// Inner product `∫ spec0(λ)·spec1(λ) dλ` by the trapezoidal rule
    /// over the union of both sample grids, expanded outward by one step
    /// on each side so the zero tails are captured.
    ///
    /// Touching every sample point of both operands makes the result
    /// independent of whether the operands reconstruct as nearest or
    /// linear.
    pub fn integrate_product(spec0: &Spectrum, spec1: &Spectrum) -> f32 {
        let low = (spec0.low - spec0.delta).max(spec1.low - spec1.delta);
        let high = (spec0.high + spec0.delta).min(spec1.high + spec1.delta);

        let mut sample_pts: Vec<Nm> = Vec::new();
        let mut add_sample_points = |spec: &Spectrum| {
            let mut sample = spec.low - spec.delta;
            while sample < low {
                sample += spec.delta;
            }
            while sample <= high {
                sample_pts.push(sample);
                sample += spec.delta;
            }
        };
        add_sample_points(spec0);
        add_sample_points(spec1);

        sample_pts.sort_by(|a, b| a.total_cmp(b));
        sample_pts.dedup();

        let mut result = 0.0;
        for pair in sample_pts.windows(2) {
            let (lambda_low, lambda_high) = (pair[0], pair[1]);
            debug_assert!(lambda_high > lambda_low);

            let val_low =
                spec0.sample_linear(lambda_low) * spec1.sample_linear(lambda_low);
            let val_high =
                spec0.sample_linear(lambda_high) * spec1.sample_linear(lambda_high);

            result += 0.5 * (val_low + val_high) * (lambda_high - lambda_low);
        }

        result
    }

    /// Intersection support and alignment check shared by the binary
    /// operators. Panics on misaligned grids; only same-stride spectra
    /// whose endpoints differ by whole steps are supported.
    fn aligned_intersection(&self, other: &Spectrum) -> (Nm, Nm) {
        let low = self.low.max(other.low);
        let high = self.high.min(other.high);

        assert!(
            self.delta == other.delta
                && (self.low - low) % self.delta == 0.0
                && (other.low - low) % other.delta == 0.0
                && (self.high - high) % self.delta == 0.0
                && (other.high - high) % other.delta == 0.0,
            "misaligned spectral grids: [{}, {}] @ {} vs [{}, {}] @ {}",
            self.low,
            self.high,
            self.delta,
            other.low,
            other.high,
            other.delta,
        );

        (low, high)
    }

    fn zip_with(&self, other: &Spectrum, f: impl Fn(f32, f32) -> f32) -> Spectrum {
        let (low, high) = self.aligned_intersection(other);

        let n = ((high - low) / self.delta) as usize + 1;
        let mut data = Vec::with_capacity(n);
        for i in 0..n {
            let lambda = low + self.delta * i as f32;
            data.push(f(self.sample_nearest(lambda), other.sample_nearest(lambda)));
        }

        Spectrum {
            data,
            low,
            high,
            delta: self.delta,
            delta_recip: self.delta_recip,
            reconstruction: self.reconstruction,
        }
    }
}

impl Mul<f32> for &Spectrum {
    type Output = Spectrum;

    fn mul(self, sc: f32) -> Spectrum {
        let mut result = self.clone();
        for v in &mut result.data {
            *v *= sc;
        }
        result
    }
}

impl Mul<&Spectrum> for &Spectrum {
    type Output = Spectrum;

    /// Pointwise product over the intersection of both supports. Panics
    /// on misaligned grids.
    fn mul(self, other: &Spectrum) -> Spectrum {
        self.zip_with(other, |a, b| a * b)
    }
}

impl Add<&Spectrum> for &Spectrum {
    type Output = Spectrum;

    /// Pointwise sum over the intersection of both supports. Panics on
    /// misaligned grids.
    fn add(self, other: &Spectrum) -> Spectrum {
        self.zip_with(other, |a, b| a + b)
    }
}

/// Load columns of comma-separated floats from a CSV file. Each column of
/// the file becomes one flat vector of samples.
///
/// # Errors
///
/// [`SpectraError::FileOpen`] when the file cannot be read and
/// [`SpectraError::BadCsv`] on non-numeric cells or ragged columns.
pub fn load_spectral_data(csv_path: &Path) -> Result<Vec<Vec<f32>>, SpectraError> {
    let text = std::fs::read_to_string(csv_path)
        .map_err(|e| SpectraError::FileOpen(csv_path.to_path_buf(), e))?;

    let mut data: Vec<Vec<f32>> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        for (i, cell) in line.split(',').enumerate() {
            let value: f32 = cell.trim().parse().map_err(|_| {
                SpectraError::BadCsv(
                    csv_path.to_path_buf(),
                    format!("expected number on line {}, got \"{cell}\"", line_no + 1),
                )
            })?;
            if i == data.len() {
                data.push(Vec::new());
            }
            data[i].push(value);
        }
    }

    for col in data.iter().skip(1) {
        if col.len() != data[0].len() {
            return Err(SpectraError::BadCsv(
                csv_path.to_path_buf(),
                "data dimension mismatch".to_owned(),
            ));
        }
    }

    Ok(data)
}
