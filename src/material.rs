//! Materials and reflectance textures.
//!
//! The material set is closed (Lambertian, perfect mirror), so materials
//! are a tagged variant owned by the scene's arena; primitives refer to
//! them by [`MaterialId`]. Albedo is either a constant or an sRGB
//! texture whose texels are upsampled to spectral reflectance on demand.

use std::path::Path;

use glam::{Vec2, Vec3};

use crate::color::{srgb_to_lrgb, ColorData, LinRgb};
use crate::error::SpectraError;
use crate::util::sampling::{get_rotated_to, rand_coshemi, PathRng};

#[cfg(not(feature = "rgb"))]
use crate::spectrum::{HeroSample, Nm, SpectralRadiance, SpectralReflectance, Spectrum};

/// Arena index of a material inside the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialId(pub usize);

/// The quantity carried along a light path: a hero-wavelength sample in
/// the spectral build, a linear-RGB triple in the `rgb` build.
#[cfg(not(feature = "rgb"))]
pub type RadianceSample = HeroSample;
/// The quantity carried along a light path.
#[cfg(feature = "rgb")]
pub type RadianceSample = LinRgb;

/// Per-path shading context handed into every material evaluation.
#[derive(Clone, Copy)]
pub struct ShadeCtx<'a> {
    /// Loaded color tables for on-the-fly sRGB upsampling.
    pub colors: &'a ColorData,
    /// Hero wavelength of the current path.
    #[cfg(not(feature = "rgb"))]
    pub lambda_0: Nm,
}

/// Texture of reflectance data stored as gamma-encoded RGB bytes,
/// scanlines top to bottom. Texels can be sampled as spectral
/// reflectance on the fly through the upsampling basis.
pub struct ReflectanceTexture {
    /// Width and height in texels.
    pub res: [usize; 2],
    data: Vec<u8>,
}

impl ReflectanceTexture {
    /// Decode an 8-bit RGB PNG from disk.
    ///
    /// # Errors
    ///
    /// [`SpectraError::BadTexture`] when the file is missing or not
    /// decodable.
    pub fn load(path: &Path) -> Result<Self, SpectraError> {
        let img = image::open(path)
            .map_err(|e| SpectraError::BadTexture(path.to_path_buf(), e.to_string()))?;
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        Ok(Self {
            res: [w as usize, h as usize],
            data: rgb.into_raw(),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_raw(res: [usize; 2], data: Vec<u8>) -> Self {
        assert_eq!(data.len(), res[0] * res[1] * 3);
        Self { res, data }
    }

    /// Linear RGB of the texel at index (`i`, `j`). Scanlines run top to
    /// bottom.
    pub fn texel(&self, i: usize, j: usize) -> LinRgb {
        let base = (j * self.res[0] + i) * 3;
        let srgb = Vec3::new(
            f32::from(self.data[base]),
            f32::from(self.data[base + 1]),
            f32::from(self.data[base + 2]),
        ) * (1.0 / 255.0);
        srgb_to_lrgb(srgb)
    }

    /// Nearest-neighbor sample at an ST coordinate in [0,1]². ST has its
    /// origin at the bottom-left, so the row index flips against the
    /// top-to-bottom storage.
    pub fn sample(&self, st: Vec2) -> LinRgb {
        let uv = st * Vec2::new(self.res[0] as f32, self.res[1] as f32);
        let index = Vec2::new(uv.x, self.res[1] as f32 - uv.y);

        let i = (index.x.floor() as i64).clamp(0, self.res[0] as i64 - 1);
        let j = (index.y.floor() as i64).clamp(0, self.res[1] as i64 - 1);

        self.texel(i as usize, j as usize)
    }
}

/// The closed set of BSDF shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Ideal diffuse reflector.
    Lambertian,
    /// Perfect specular mirror (a Dirac delta BSDF).
    Mirror,
}

/// Albedo of a material: a constant or a texture lookup.
pub enum Albedo {
    /// Constant reflectance over the surface.
    #[cfg(not(feature = "rgb"))]
    Constant(SpectralReflectance),
    /// Constant reflectance over the surface.
    #[cfg(feature = "rgb")]
    Constant(LinRgb),
    /// Reflectance keyed by an sRGB texture.
    Texture(ReflectanceTexture),
}

/// Result of importance-sampling a BSDF at a hit point.
pub struct BsdfSample {
    /// Sampled incoming direction.
    pub w_i: Vec3,
    /// Probability density of choosing `w_i`; `+∞` marks a delta BSDF,
    /// where `f_s` stands for the delta's weight instead of a density.
    pub pdf: f32,
    /// BSDF value along the sampled direction.
    pub f_s: RadianceSample,
}

/// A scene material: emission plus an albedo interpreted per
/// [`MaterialKind`].
pub struct Material {
    /// Which BSDF shape the albedo feeds.
    pub kind: MaterialKind,
    /// Emitted spectral radiance. Zero for non-lights.
    #[cfg(not(feature = "rgb"))]
    pub emission: SpectralRadiance,
    /// Emitted radiance. Zero for non-lights.
    #[cfg(feature = "rgb")]
    pub emission: LinRgb,
    /// Surface reflectance.
    pub albedo: Albedo,
}

impl Material {
    /// Lambertian material with zero emission and unit reflectance.
    pub fn lambertian() -> Self {
        Self {
            kind: MaterialKind::Lambertian,
            #[cfg(not(feature = "rgb"))]
            emission: Spectrum::constant(0.0),
            #[cfg(feature = "rgb")]
            emission: LinRgb::ZERO,
            #[cfg(not(feature = "rgb"))]
            albedo: Albedo::Constant(Spectrum::constant(1.0)),
            #[cfg(feature = "rgb")]
            albedo: Albedo::Constant(LinRgb::ONE),
        }
    }

    /// Lambertian material whose reflectance comes from an sRGB texture.
    pub fn lambertian_texture(texture: ReflectanceTexture) -> Self {
        Self {
            albedo: Albedo::Texture(texture),
            ..Self::lambertian()
        }
    }

    /// Mirror material with zero emission and unit reflectance.
    pub fn mirror() -> Self {
        Self {
            kind: MaterialKind::Mirror,
            ..Self::lambertian()
        }
    }

    /// Whether the emission carries any power.
    #[cfg(not(feature = "rgb"))]
    pub fn is_emissive(&self) -> bool {
        Spectrum::integrate(&self.emission) > 0.0
    }

    /// Whether the emission carries any power.
    #[cfg(feature = "rgb")]
    pub fn is_emissive(&self) -> bool {
        self.emission.x > 0.0 || self.emission.y > 0.0 || self.emission.z > 0.0
    }

    /// Emitted radiance toward the viewer. Emission is uniform over the
    /// surface, so the ST coordinate is unused today.
    #[cfg(not(feature = "rgb"))]
    pub fn emitted(&self, ctx: &ShadeCtx<'_>, _st: Vec2) -> RadianceSample {
        self.emission.hero_sample(ctx.lambda_0)
    }

    /// Emitted radiance toward the viewer.
    #[cfg(feature = "rgb")]
    pub fn emitted(&self, _ctx: &ShadeCtx<'_>, _st: Vec2) -> RadianceSample {
        self.emission
    }

    #[cfg(not(feature = "rgb"))]
    fn albedo_at(&self, ctx: &ShadeCtx<'_>, st: Vec2) -> RadianceSample {
        match &self.albedo {
            Albedo::Constant(reflectance) => reflectance.hero_sample(ctx.lambda_0),
            Albedo::Texture(texture) => {
                ctx.colors.lrgb_to_specrefl(texture.sample(st), ctx.lambda_0)
            }
        }
    }

    #[cfg(feature = "rgb")]
    fn albedo_at(&self, _ctx: &ShadeCtx<'_>, st: Vec2) -> RadianceSample {
        match &self.albedo {
            Albedo::Constant(reflectance) => *reflectance,
            Albedo::Texture(texture) => texture.sample(st),
        }
    }

    /// BSDF value for a concrete pair of directions, used by explicit
    /// light sampling. A finite-support direction sample can never hit a
    /// Dirac delta, so a mirror evaluates to zero.
    pub fn evaluate_bsdf(
        &self,
        ctx: &ShadeCtx<'_>,
        st: Vec2,
        _w_o: Vec3,
        _n: Vec3,
        _w_i: Vec3,
    ) -> RadianceSample {
        match self.kind {
            MaterialKind::Lambertian => {
                self.albedo_at(ctx, st) / std::f32::consts::PI
            }
            MaterialKind::Mirror => RadianceSample::ZERO,
        }
    }

    /// Importance-sample the BSDF: draw an incoming direction, its PDF,
    /// and the BSDF value along it.
    pub fn interact_bsdf(
        &self,
        ctx: &ShadeCtx<'_>,
        rng: &mut PathRng,
        st: Vec2,
        w_o: Vec3,
        n: Vec3,
    ) -> BsdfSample {
        match self.kind {
            MaterialKind::Lambertian => {
                // Importance-sample the geometry term
                let (local, pdf) = rand_coshemi(rng);
                let w_i = get_rotated_to(local, n);
                BsdfSample {
                    w_i,
                    pdf,
                    f_s: self.albedo_at(ctx, st) / std::f32::consts::PI,
                }
            }
            MaterialKind::Mirror => {
                // The value stands for the weight of a Dirac delta.
                BsdfSample {
                    w_i: 2.0 * n.dot(w_o) * n - w_o,
                    pdf: f32::INFINITY,
                    f_s: self.albedo_at(ctx, st),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn checker_texture() -> ReflectanceTexture {
        // 2x2, top row red then green, bottom row blue then white
        ReflectanceTexture::from_raw(
            [2, 2],
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
        )
    }

    #[test]
    fn test_texture_row_flip() {
        let tex = checker_texture();
        // ST origin is bottom-left; the top-left texel sits at high T.
        let top_left = tex.sample(Vec2::new(0.25, 0.75));
        assert_relative_eq!(top_left.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(top_left.y, 0.0, epsilon = 1e-6);

        let bottom_left = tex.sample(Vec2::new(0.25, 0.25));
        assert_relative_eq!(bottom_left.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(bottom_left.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_texture_clamps_out_of_range() {
        let tex = checker_texture();
        // Off the edge on every side still lands on a border texel.
        let v = tex.sample(Vec2::new(-0.5, 2.0));
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-6);
        let v = tex.sample(Vec2::new(2.0, -1.0));
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_texture_gamma_decoded() {
        let tex = ReflectanceTexture::from_raw([1, 1], vec![128, 128, 128]);
        let v = tex.sample(Vec2::new(0.5, 0.5));
        // 128/255 sRGB decodes to about 0.2158 linear
        assert_relative_eq!(v.x, 0.2158, epsilon = 1e-3);
    }

    #[cfg(not(feature = "rgb"))]
    mod spectral {
        use super::super::*;
        use crate::spectrum::Spectrum;
        use crate::util::sampling::rng_for_worker;
        use approx::assert_relative_eq;
        use std::path::Path;

        fn colors() -> ColorData {
            let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
            ColorData::load(&dir).expect("color data should load")
        }

        #[test]
        fn test_default_material_is_not_emissive() {
            assert!(!Material::lambertian().is_emissive());
            assert!(!Material::mirror().is_emissive());

            let mut light = Material::lambertian();
            light.emission = Spectrum::constant(1.0);
            assert!(light.is_emissive());
        }

        #[test]
        fn test_lambertian_bsdf_is_albedo_over_pi() {
            let c = colors();
            let ctx = ShadeCtx {
                colors: &c,
                lambda_0: 500.0,
            };
            let mut mtl = Material::lambertian();
            mtl.albedo = Albedo::Constant(Spectrum::constant(0.5));

            let f_s = mtl.evaluate_bsdf(&ctx, Vec2::ZERO, Vec3::Y, Vec3::Y, Vec3::Y);
            for k in 0..4 {
                assert_relative_eq!(
                    f_s[k],
                    0.5 / std::f32::consts::PI,
                    epsilon = 1e-6
                );
            }
        }

        #[test]
        fn test_mirror_evaluates_to_zero() {
            let c = colors();
            let ctx = ShadeCtx {
                colors: &c,
                lambda_0: 500.0,
            };
            let mtl = Material::mirror();
            let f_s = mtl.evaluate_bsdf(&ctx, Vec2::ZERO, Vec3::Y, Vec3::Y, Vec3::Y);
            assert_eq!(f_s, RadianceSample::ZERO);
        }

        #[test]
        fn test_mirror_interaction_reflects() {
            let c = colors();
            let ctx = ShadeCtx {
                colors: &c,
                lambda_0: 550.0,
            };
            let mtl = Material::mirror();
            let mut rng = rng_for_worker(0);

            let n = Vec3::Y;
            let w_o = Vec3::new(1.0, 1.0, 0.0).normalize();
            let sample = mtl.interact_bsdf(&ctx, &mut rng, Vec2::ZERO, w_o, n);

            assert!(sample.pdf.is_infinite());
            let expected = Vec3::new(-1.0, 1.0, 0.0).normalize();
            assert_relative_eq!(sample.w_i.x, expected.x, epsilon = 1e-6);
            assert_relative_eq!(sample.w_i.y, expected.y, epsilon = 1e-6);
            assert_relative_eq!(sample.w_i.z, expected.z, epsilon = 1e-6);
        }

        #[test]
        fn test_lambertian_interaction_stays_above_surface() {
            let c = colors();
            let ctx = ShadeCtx {
                colors: &c,
                lambda_0: 600.0,
            };
            let mtl = Material::lambertian();
            let mut rng = rng_for_worker(5);

            let n = Vec3::new(0.0, 0.0, 1.0);
            for _ in 0..1000 {
                let sample =
                    mtl.interact_bsdf(&ctx, &mut rng, Vec2::ZERO, Vec3::Z, n);
                assert!(sample.w_i.dot(n) > 0.0);
                assert!(sample.pdf.is_finite());
                assert_relative_eq!(
                    sample.pdf,
                    sample.w_i.dot(n) / std::f32::consts::PI,
                    epsilon = 1e-5
                );
            }
        }
    }
}
