//! The recursive radiance estimator and the per-pixel sampling loop.

use glam::{DVec2, DVec4, Vec4};
use rand::Rng as _;

use crate::config::{EXPLICIT_LIGHT_SAMPLING, FLAT_FIELD_CORRECTION, MAX_DEPTH};
use crate::color::ColorData;
use crate::geometry::Ray;
use crate::material::{RadianceSample, ShadeCtx};
use crate::scene::Scene;
use crate::util::sampling::PathRng;

#[cfg(not(feature = "rgb"))]
use crate::color::CieXyz;
#[cfg(not(feature = "rgb"))]
use crate::config::{LAMBDA_MIN, LAMBDA_STEP};
#[cfg(feature = "rgb")]
use crate::color::{lrgb_to_srgb, LinRgb};

/// What one camera sample reduces to before pixel averaging: CIE XYZ in
/// the spectral build, linear RGB otherwise.
#[cfg(not(feature = "rgb"))]
type SampleEstimate = CieXyz;
/// What one camera sample reduces to before pixel averaging.
#[cfg(feature = "rgb")]
type SampleEstimate = LinRgb;

/// Recursive radiance estimate along `ray`.
///
/// `last_was_delta` tracks whether the previous bounce was a delta BSDF
/// (or the eye): under explicit light sampling, emission is added only
/// then, since a finite-PDF bounce already estimated it through its
/// light sample. `ignore` excludes the primitive the ray just left, in
/// place of an epsilon offset.
pub(crate) fn radiance(
    scene: &Scene,
    ctx: &ShadeCtx<'_>,
    rng: &mut PathRng,
    ray: &Ray,
    last_was_delta: bool,
    depth: u32,
    ignore: Option<usize>,
) -> RadianceSample {
    let mut radiance_acc = RadianceSample::ZERO;

    let Some(hitrec) = scene.intersect(ray, ignore) else {
        return radiance_acc;
    };
    let prim = &scene.primitives[hitrec.prim];
    let material = &scene.materials[prim.material.0];

    // Emission. With explicit light sampling it only counts when the
    // previous bounce could not have importance-sampled this light.
    if !EXPLICIT_LIGHT_SAMPLING || last_was_delta {
        radiance_acc += material.emitted(ctx, hitrec.st);
    }

    if depth + 1 >= MAX_DEPTH {
        return radiance_acc;
    }

    let hit_pos = ray.at(hitrec.dist);
    let w_o = -ray.dir;

    // Direct lighting
    if EXPLICIT_LIGHT_SAMPLING {
        let (shad_dir, light_idx, shad_pdf) =
            scene.sample_toward_light(rng, hit_pos);

        let n_dot_l = shad_dir.dot(hitrec.normal);
        if n_dot_l > 0.0 {
            // Shadow ray, excluding ourselves against self-intersection
            let ray_shad = Ray {
                orig: hit_pos,
                dir: shad_dir,
            };
            let shad_hit = scene.intersect(&ray_shad, Some(hitrec.prim));

            if shad_hit.is_some_and(|h| h.prim == light_idx) {
                // Nothing between us and the light we aimed for
                let light_mtl =
                    &scene.materials[scene.primitives[light_idx].material.0];
                let emitted = light_mtl.emitted(ctx, hitrec.st);
                let f_s =
                    material.evaluate_bsdf(ctx, hitrec.st, w_o, hitrec.normal, shad_dir);
                radiance_acc += emitted * n_dot_l * f_s / shad_pdf;
            }
        }
    }

    // Indirect lighting
    let bsdf = material.interact_bsdf(ctx, rng, hitrec.st, w_o, hitrec.normal);
    if bsdf.f_s.dot(bsdf.f_s) > 0.0 {
        let (n_dot_l, pdf) = if bsdf.pdf.is_finite() {
            let n_dot_l = bsdf.w_i.dot(hitrec.normal);
            if n_dot_l <= 0.0 {
                return radiance_acc;
            }
            (n_dot_l, bsdf.pdf)
        } else {
            // Delta BSDF: the cosine and the density cancel; using one
            // for both sidesteps the division by infinity.
            (1.0, 1.0)
        };

        let ray_next = Ray {
            orig: hit_pos,
            dir: bsdf.w_i,
        };
        let next = radiance(
            scene,
            ctx,
            rng,
            &ray_next,
            !bsdf.pdf.is_finite(),
            depth + 1,
            Some(hitrec.prim),
        );
        radiance_acc += next * n_dot_l * bsdf.f_s / pdf;
    }

    radiance_acc
}

/// One camera sample through pixel (`i`, `j`).
fn render_sample(
    scene: &Scene,
    colors: &ColorData,
    rng: &mut PathRng,
    i: usize,
    j: usize,
) -> SampleEstimate {
    let res = scene.camera.res;

    // Jittered position inside the pixel
    let u: f32 = rng.random();
    let v: f32 = rng.random();
    let st = DVec2::new(
        (i as f64 + f64::from(u)) / res[0] as f64,
        (j as f64 + f64::from(v)) / res[1] as f64,
    );
    let ndc = st * 2.0 - DVec2::ONE;

    // Pinhole camera ray. The unprojection and normalization stay in
    // double precision; in single precision the quantized directions
    // alias into visible stair-stepping.
    let point = scene.camera.matr_pv_inv * DVec4::new(ndc.x, ndc.y, 0.0, 1.0);
    let point = point / point.w;
    let camera_ray_dir = (point.truncate() - scene.camera.pos.as_dvec3())
        .normalize()
        .as_vec3();
    debug_assert!(camera_ray_dir.is_finite());

    // Hero wavelength: drawn from the first band, the rest of the slots
    // implied at fixed strides above it.
    #[cfg(not(feature = "rgb"))]
    let ctx = ShadeCtx {
        colors,
        lambda_0: LAMBDA_MIN + rng.random::<f32>() * LAMBDA_STEP,
    };
    #[cfg(feature = "rgb")]
    let ctx = ShadeCtx { colors };

    let ray = Ray {
        orig: scene.camera.pos,
        dir: camera_ray_dir,
    };
    let rad_est = radiance(scene, &ctx, rng, &ray, true, 0, None);

    // Radiance to flux at the pixel. A flat-fielded sensor cancels the
    // view-angle cosine itself.
    let flux_est = if FLAT_FIELD_CORRECTION {
        rad_est
    } else {
        rad_est * camera_ray_dir.dot(scene.camera.dir)
    };

    #[cfg(not(feature = "rgb"))]
    return colors.spec_radflux_hero_to_xyz(flux_est, ctx.lambda_0);
    #[cfg(feature = "rgb")]
    return flux_est;
}

/// All samples for pixel (`i`, `j`), reconstructed to an sRGB+alpha
/// framebuffer value.
///
/// Samples accumulate into a double-precision estimate (scaled down to
/// keep magnitudes moderate, unscaled at the division by the sample
/// count) rather than into a spectrum, which would cost memory and
/// quantization for nothing the conversion can't do per sample.
pub(crate) fn render_pixel(
    scene: &Scene,
    colors: &ColorData,
    rng: &mut PathRng,
    i: usize,
    j: usize,
    spp: usize,
) -> Vec4 {
    const WORKING_SCALE: f64 = 1.0e-3;

    let mut acc = DVec4::ZERO;
    for _ in 0..spp {
        let est = render_sample(scene, colors, rng, i, j);
        acc += DVec4::new(
            f64::from(est.x) * WORKING_SCALE,
            f64::from(est.y) * WORKING_SCALE,
            f64::from(est.z) * WORKING_SCALE,
            WORKING_SCALE,
        );
    }
    let avg = (acc / (spp as f64 * WORKING_SCALE)).as_vec4();

    #[cfg(not(feature = "rgb"))]
    let srgb = colors.xyz_to_srgb(avg.truncate());
    #[cfg(feature = "rgb")]
    let srgb = lrgb_to_srgb(avg.truncate());

    Vec4::new(srgb.x, srgb.y, srgb.z, avg.w)
}

#[cfg(all(test, not(feature = "rgb")))]
mod tests {
    use super::*;
    use crate::material::{Albedo, Material};
    use crate::scene::Scene;
    use crate::spectrum::{HeroSample, Spectrum};
    use crate::util::sampling::rng_for_worker;
    use approx::assert_relative_eq;
    use glam::{Vec2, Vec3};
    use std::path::Path;

    fn colors() -> ColorData {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        ColorData::load(&dir).expect("color data should load")
    }

    fn quad_corners(center: Vec3, half: f32, facing: Vec3) -> [crate::geometry::Vertex; 4] {
        // Axis-aligned square facing along +z or -z
        let s = half;
        let z = center.z;
        let mk = |x: f32, y: f32| {
            crate::geometry::Vertex::new(Vec3::new(x, y, z), Vec2::ZERO)
        };
        if facing.z < 0.0 {
            [
                mk(center.x - s, center.y - s),
                mk(center.x - s, center.y + s),
                mk(center.x + s, center.y + s),
                mk(center.x + s, center.y - s),
            ]
        } else {
            [
                mk(center.x - s, center.y - s),
                mk(center.x + s, center.y - s),
                mk(center.x + s, center.y + s),
                mk(center.x - s, center.y + s),
            ]
        }
    }

    /// A light panel straight ahead of the origin and a mirror behind
    /// it, everything on the z axis.
    fn mirror_scene() -> Scene {
        let mut scene = Scene::empty([8, 8]);

        let mut light = Material::lambertian();
        light.emission = Spectrum::constant(1.0);
        light.albedo = Albedo::Constant(Spectrum::constant(0.0));
        let light = scene.add_material("light", light);

        let mirror = scene.add_material("mirror", Material::mirror());

        // Light at z = -10 facing +z, mirror at z = 0 facing -z.
        scene.push_quad(light, quad_corners(Vec3::new(0.0, 0.0, -10.0), 20.0, Vec3::Z));
        scene.push_quad(
            mirror,
            quad_corners(Vec3::new(0.0, 0.0, 0.0), 20.0, Vec3::NEG_Z),
        );

        scene.finish();
        scene
    }

    #[test]
    fn test_emission_gating_under_light_sampling() {
        let scene = mirror_scene();
        let c = colors();
        let ctx = ShadeCtx {
            colors: &c,
            lambda_0: 550.0,
        };
        let mut rng = rng_for_worker(0);

        // Straight at the light, no depth left for anything else.
        let ray = Ray {
            orig: Vec3::ZERO,
            dir: Vec3::NEG_Z,
        };
        let lit = radiance(&scene, &ctx, &mut rng, &ray, true, MAX_DEPTH - 1, None);
        for k in 0..4 {
            assert_relative_eq!(lit[k], 1.0, epsilon = 1e-6);
        }

        if EXPLICIT_LIGHT_SAMPLING {
            // A non-delta previous bounce already counted this light.
            let gated =
                radiance(&scene, &ctx, &mut rng, &ray, false, MAX_DEPTH - 1, None);
            assert_eq!(gated, HeroSample::ZERO);
        }
    }

    #[test]
    fn test_mirror_carries_emission_through() {
        // Camera ray bounces off the mirror straight back into the
        // light; the delta bounce neither gates the emission nor costs
        // a cosine.
        let scene = mirror_scene();
        let c = colors();
        let ctx = ShadeCtx {
            colors: &c,
            lambda_0: 500.0,
        };
        let mut rng = rng_for_worker(1);

        let ray = Ray {
            orig: Vec3::new(0.0, 0.0, -5.0),
            dir: Vec3::Z,
        };
        let rad = radiance(&scene, &ctx, &mut rng, &ray, true, 0, None);
        for k in 0..4 {
            assert_relative_eq!(rad[k], 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_miss_returns_zero() {
        let scene = mirror_scene();
        let c = colors();
        let ctx = ShadeCtx {
            colors: &c,
            lambda_0: 500.0,
        };
        let mut rng = rng_for_worker(2);

        let ray = Ray {
            orig: Vec3::new(100.0, 0.0, 0.0),
            dir: Vec3::X,
        };
        let rad = radiance(&scene, &ctx, &mut rng, &ray, true, 0, None);
        assert_eq!(rad, HeroSample::ZERO);
    }

    #[test]
    fn test_direct_lighting_estimates_cosine_integral() {
        // A Lambertian floor patch under a large uniform light panel.
        // With the panel covering the whole upper hemisphere the
        // estimator converges to E·ρ (the furnace value): the cosine
        // and the 1/π of the BSDF integrate away exactly.
        let mut scene = Scene::empty([8, 8]);

        let mut light = Material::lambertian();
        light.emission = Spectrum::constant(1.0);
        light.albedo = Albedo::Constant(Spectrum::constant(0.0));
        let light = scene.add_material("light", light);

        let mut floor_mtl = Material::lambertian();
        floor_mtl.albedo = Albedo::Constant(Spectrum::constant(0.6));
        let floor = scene.add_material("floor", floor_mtl);

        // A panel far wider than its height above the floor, so it
        // covers essentially the whole cosine-weighted hemisphere.
        let s = 1000.0;
        let h = 10.0;
        let mk = |x: f32, y: f32, z: f32| {
            crate::geometry::Vertex::new(Vec3::new(x, y, z), Vec2::ZERO)
        };
        scene.push_quad(light, [mk(-s, h, -s), mk(s, h, -s), mk(s, h, s), mk(-s, h, s)]);
        scene.push_quad(
            floor,
            [mk(-1.0, 0.0, 1.0), mk(1.0, 0.0, 1.0), mk(1.0, 0.0, -1.0), mk(-1.0, 0.0, -1.0)],
        );
        scene.finish();

        let c = colors();
        let ctx = ShadeCtx {
            colors: &c,
            lambda_0: 560.0,
        };
        let mut rng = rng_for_worker(3);

        let ray = Ray {
            orig: Vec3::new(0.0, 5.0, 0.0),
            dir: Vec3::NEG_Y,
        };

        // Depth allows the hit plus its direct-light sample only, so
        // the estimate is the single-bounce term.
        let n = 20_000;
        let mut mean = 0.0f64;
        for _ in 0..n {
            let rad = radiance(&scene, &ctx, &mut rng, &ray, true, MAX_DEPTH - 2, None);
            mean += f64::from(rad[0]);
        }
        mean /= f64::from(n);

        if EXPLICIT_LIGHT_SAMPLING {
            // Ceiling panel at y = s over x,z in [-s, s] subtends just
            // about the full hemisphere from the origin; the analytic
            // single-bounce value is within a percent of E·ρ.
            assert_relative_eq!(mean, 0.6, max_relative = 0.05);
        }
    }
}
