//! Offline spectral path tracer with hero-wavelength sampling.
//!
//! Light transport is simulated along sampled wavelengths rather than
//! three color channels; each camera sample carries a hero wavelength
//! and its fixed-stride companions, and reduces to CIE XYZ through the
//! standard observer before pixel averaging. Artist-authored sRGB data
//! (textures and constants) joins the same integrator through an
//! on-the-fly reflectance upsampling basis.
//!
//! # Key entry points
//!
//! - [`renderer::Renderer`] - tile-parallel render driver
//! - [`scene::builtin`] - the hard-coded scenes
//! - [`color::ColorData`] - observer, D65, and conversion matrices,
//!   loaded once and passed by reference
//! - [`spectrum::Spectrum`] - piecewise-linear spectra and their
//!   integration rules
//!
//! Compile-time switches (hero count, path depth, tile size, observer,
//! explicit light sampling, flat-field correction) live in [`config`];
//! the `rgb` cargo feature swaps the whole transport over to plain
//! linear RGB.

pub mod color;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod geometry;
pub mod material;
pub mod renderer;
pub mod scene;
pub mod spectrum;
pub mod util;

pub use error::SpectraError;
