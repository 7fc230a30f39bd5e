//! Random direction samplers for the path tracer.
//!
//! All samplers draw from a caller-owned [`PathRng`]. Workers never share
//! a generator; each one derives its own seed from its worker index so
//! neighboring threads get decorrelated streams.

use std::hash::{Hash, Hasher};

use glam::{DVec3, Vec3};
use rand::{Rng, SeedableRng};

use crate::config::EPS;
use crate::util::spherical_tri::SphericalTriangle;

/// The per-worker generator: PCG-32, 16 bytes of state.
pub type PathRng = rand_pcg::Pcg32;

/// Build the RNG for a zero-based worker index.
///
/// The index is hashed with a mixing constant so that adjacent workers
/// land far apart in seed space. The generator's state must not be all
/// zero, so a zero digest is replaced by one.
pub fn rng_for_worker(index: usize) -> PathRng {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    (index as u64 ^ 0x9E37_79B9_7F4A_7C15).hash(&mut hasher);
    let mut seed = hasher.finish();
    if seed == 0 {
        seed = 1;
    }
    PathRng::seed_from_u64(seed)
}

/// Build an orthonormal basis around a unit vector without branches.
/// See Duff et al., "Building an Orthonormal Basis, Revisited" (JCGT
/// 2017).
pub fn get_basis(basis_y: Vec3) -> (Vec3, Vec3) {
    let sign = 1.0f32.copysign(basis_y.z);

    let a = -1.0 / (sign + basis_y.z);
    let b = basis_y.x * basis_y.y * a;

    let basis_x = Vec3::new(
        1.0 + sign * basis_y.x * basis_y.x * a,
        sign * b,
        -sign * basis_y.x,
    );
    let basis_z = Vec3::new(b, sign + basis_y.y * basis_y.y * a, -basis_y.y);

    (basis_x, basis_z)
}

/// Re-express a direction sampled around +Y in the frame whose Y axis is
/// `normal`.
pub fn get_rotated_to(dir: Vec3, normal: Vec3) -> Vec3 {
    let (basis_x, basis_z) = get_basis(normal);
    dir.x * basis_x + dir.y * normal + dir.z * basis_z
}

/// Uniform direction on the unit sphere. Returns the direction and its
/// PDF, `1 / 4π`.
pub fn rand_sphere(rng: &mut PathRng) -> (Vec3, f32) {
    let pdf = (1.0 / (4.0 * std::f64::consts::PI)) as f32;

    // Pick a random z-coordinate, then a random point on that circle.
    // This works out to be evenly sampled.
    let z = 2.0 * rng.random::<f32>() - 1.0;
    debug_assert!((-1.0..=1.0).contains(&z));
    let radius_circle = (1.0 - z * z).sqrt();

    let angle = rng.random::<f32>() * (2.0 * std::f32::consts::PI);
    let (s, c) = angle.sin_cos();

    (Vec3::new(radius_circle * c, radius_circle * s, z), pdf)
}

/// Cosine-weighted direction on the +Y hemisphere. Returns the direction
/// and its PDF, `cos θ / π`. Directions grazing the horizon closer than
/// `EPS` are rejected and redrawn.
pub fn rand_coshemi(rng: &mut PathRng) -> (Vec3, f32) {
    loop {
        let angle = rng.random::<f32>() * (2.0 * std::f32::consts::PI);
        let (s, c) = angle.sin_cos();

        let radius_sq = rng.random::<f32>();
        let radius = radius_sq.sqrt();

        let result = Vec3::new(radius * c, (1.0 - radius_sq).sqrt(), radius * s);
        let cos_theta = result.y;
        if cos_theta > EPS {
            return (result, cos_theta * (1.0 / std::f32::consts::PI));
        }
    }
}

/// Uniform direction toward a sphere of radius `sph_radius` whose center
/// sits at `vec_to_sph_cen` relative to the sampling point. Returns the
/// direction and its PDF, `1 / (2π (1 - cos θ_max))` with
/// `θ_max = arcsin(R / d)`. From inside the sphere every direction hits,
/// so the whole sphere is sampled.
///
/// Needs at least double precision internally.
pub fn rand_toward_sphere(
    rng: &mut PathRng,
    vec_to_sph_cen: Vec3,
    sph_radius: f32,
) -> (Vec3, f32) {
    let l = vec_to_sph_cen.as_dvec3().length();
    if l < f64::from(sph_radius) {
        return rand_sphere(rng);
    }

    let l_recip = 1.0 / l;

    // Sample a slightly smaller sphere than the one given so the chosen
    // direction really does hit the real sphere.
    let radius2 = f64::from(sph_radius) * 0.99999;

    let opp_over_hyp = radius2 * l_recip;
    debug_assert!(opp_over_hyp > 0.0 && opp_over_hyp < 1.0);

    // cos(arcsin(x)) = sqrt(1 - x²); the spherical-cap area 2πrh with
    // r = 1 and h = 1 - cos θ is the solid angle being sampled.
    let cos_theta = (1.0 - opp_over_hyp * opp_over_hyp).sqrt();
    let area = (2.0 * std::f64::consts::PI) * (1.0 - cos_theta);

    let pdf = (1.0 / area) as f32;

    let y = rng.random::<f64>() * (1.0 - cos_theta) + cos_theta;
    debug_assert!(y >= cos_theta && y <= 1.0);
    let phi = rng.random::<f64>() * (2.0 * std::f64::consts::PI);
    let radius = (1.0 - y * y).sqrt();

    let (s, c) = phi.sin_cos();
    let result = DVec3::new(radius * c, y, radius * s).as_vec3();
    let result = get_rotated_to(result, vec_to_sph_cen * (l_recip as f32));

    (result, pdf)
}

/// Uniform direction over a spherical triangle, after Arvo, "Stratified
/// Sampling of Spherical Triangles" (SIGGRAPH 1995).
///
/// A degenerate triangle yields a NaN direction, caught by the debug
/// assertion.
pub fn rand_toward_spherical_tri(rng: &mut PathRng, tri: &SphericalTriangle) -> Vec3 {
    let r0: f32 = rng.random();
    let r1: f32 = rng.random();

    let sin_alpha = tri.alpha.sin();
    debug_assert!(sin_alpha >= 0.0);

    let mut q = if sin_alpha > 0.0 {
        // Sub-triangle with area proportional to r0; solve for the
        // cosine of the arc spanning its apex.
        let random_area = r0 * tri.surface_area;
        let angle = random_area - tri.alpha;
        let s = angle.sin();
        let t = angle.cos();
        let u = t - tri.cos_alpha;
        let v = s + sin_alpha * tri.cos_c;
        ((v * t - u * s) * tri.cos_alpha - v) / ((v * s + u * t) * sin_alpha)
    } else {
        // Flat vertex angle: the desired cosine comes from
        // interpolating the side angle linearly.
        (tri.b * r0).cos()
    };
    q = q.clamp(-1.0, 1.0);

    let c_hat = q * tri.a_vert
        + (1.0 - q * q).sqrt() * orthonormal_part(tri.c_vert, tri.a_vert);

    let mut z = 1.0 - r1 * (1.0 - c_hat.dot(tri.b_vert));
    z = z.clamp(-1.0, 1.0);

    let result =
        z * tri.b_vert + (1.0 - z * z).sqrt() * orthonormal_part(c_hat, tri.b_vert);
    debug_assert!(
        !result.x.is_nan() && !result.y.is_nan() && !result.z.is_nan()
    );
    result
}

/// Normalized component of `x` orthogonal to the unit vector `y`; zero
/// when `x` and `y` are parallel.
fn orthonormal_part(x: Vec3, y: Vec3) -> Vec3 {
    let dir = x - x.dot(y) * y;
    let lensq = dir.dot(dir);
    if lensq == 0.0 {
        Vec3::ZERO
    } else {
        dir / lensq.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_worker_rngs_are_decorrelated() {
        let mut a = rng_for_worker(0);
        let mut b = rng_for_worker(1);
        let va: Vec<u32> = (0..8).map(|_| a.random()).collect();
        let vb: Vec<u32> = (0..8).map(|_| b.random()).collect();
        assert_ne!(va, vb);

        // Same index, same stream.
        let mut c = rng_for_worker(0);
        let vc: Vec<u32> = (0..8).map(|_| c.random()).collect();
        assert_eq!(va, vc);
    }

    #[test]
    fn test_basis_is_orthonormal() {
        for n in [
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::new(0.3, -0.5, 0.8).normalize(),
            Vec3::new(-0.9, 0.1, 0.1).normalize(),
        ] {
            let (x, z) = get_basis(n);
            assert_relative_eq!(x.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(z.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(x.dot(n), 0.0, epsilon = 1e-5);
            assert_relative_eq!(z.dot(n), 0.0, epsilon = 1e-5);
            assert_relative_eq!(x.dot(z), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sphere_sampler_is_unit_and_uniformish() {
        let mut rng = rng_for_worker(7);
        let mut mean = DVec3::ZERO;
        let n = 100_000;
        for _ in 0..n {
            let (dir, pdf) = rand_sphere(&mut rng);
            assert_relative_eq!(dir.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(pdf, 1.0 / (4.0 * std::f32::consts::PI));
            mean += dir.as_dvec3();
        }
        mean /= f64::from(n);
        // Uniform on the sphere: zero mean, component std 1/sqrt(3n).
        let bound = 4.0 / (3.0 * f64::from(n)).sqrt();
        assert!(mean.length() < 2.0 * bound, "mean drifted: {mean}");
    }

    #[test]
    fn test_coshemi_pdf_and_orientation() {
        let mut rng = rng_for_worker(3);
        for _ in 0..10_000 {
            let (dir, pdf) = rand_coshemi(&mut rng);
            assert!(dir.y > 0.0);
            assert_relative_eq!(dir.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(pdf, dir.y / std::f32::consts::PI, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_cone_sampler_stays_inside_cone() {
        let mut rng = rng_for_worker(11);
        let center = Vec3::new(0.0, 0.0, 10.0);
        let radius = 2.0;
        let cos_max = (1.0 - (radius / 10.0f32).powi(2)).sqrt();
        let expected_pdf =
            1.0 / (2.0 * std::f32::consts::PI * (1.0 - cos_max));
        for _ in 0..10_000 {
            let (dir, pdf) = rand_toward_sphere(&mut rng, center, radius);
            assert!(dir.dot(center.normalize()) >= cos_max - 1e-4);
            assert_relative_eq!(pdf, expected_pdf, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_cone_sampler_inside_sphere_samples_everywhere() {
        let mut rng = rng_for_worker(13);
        let (_, pdf) = rand_toward_sphere(&mut rng, Vec3::new(0.1, 0.0, 0.0), 5.0);
        assert_relative_eq!(pdf, 1.0 / (4.0 * std::f32::consts::PI));
    }

    #[test]
    fn test_arvo_octant_sample_mean() {
        // One-eighth sphere spanned by the coordinate axes, area π/2.
        // The analytic mean of a uniform sample is (1/2, 1/2, 1/2) with
        // per-component variance 1/3 - 1/4 = 1/12.
        let tri = SphericalTriangle::new(Vec3::X, Vec3::Y, Vec3::Z);
        let mut rng = rng_for_worker(1);
        let n = 1_000_000;
        let mut mean = DVec3::ZERO;
        for _ in 0..n {
            let dir = rand_toward_spherical_tri(&mut rng, &tri);
            assert!(dir.x >= -1e-5 && dir.y >= -1e-5 && dir.z >= -1e-5);
            assert_relative_eq!(dir.length(), 1.0, epsilon = 1e-4);
            mean += dir.as_dvec3();
        }
        mean /= f64::from(n);

        let sigma = (1.0f64 / 12.0 / f64::from(n)).sqrt();
        for i in 0..3 {
            assert!(
                (mean[i] - 0.5).abs() < 4.0 * sigma,
                "component {i} mean {} strayed past 4 sigma",
                mean[i]
            );
        }
    }
}
