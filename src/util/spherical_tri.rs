//! Spherical triangles: the projection of a triangle onto the unit
//! sphere around a shading point. Their surface area equals the solid
//! angle the triangle subtends, which is what makes them the right tool
//! for sampling directions toward area lights.

use glam::Vec3;

/// Largest `f32` strictly less than π. `acos` can land exactly on π (or
/// fractionally above it) for inputs at -1, which would make the sines
/// below negative.
const PI_UNDER: f32 = f32::from_bits(0x4049_0FDA);

/// A triangle on the unit sphere, with every derived quantity the Arvo
/// sampler needs precomputed.
///
/// Degenerate triangles (two or more coincident or antipodal vertices)
/// produce NaN vertex angles; the caller's assertion on the sampled
/// direction is the intended failure path.
pub struct SphericalTriangle {
    /// First vertex (unit vector).
    pub a_vert: Vec3,
    /// Second vertex (unit vector).
    pub b_vert: Vec3,
    /// Third vertex (unit vector).
    pub c_vert: Vec3,

    /// Side lengths on the sphere surface; equal to the angles the sides
    /// subtend from the center.
    pub a: f32,
    /// Side length opposite `b_vert`.
    pub b: f32,
    /// Side length opposite `c_vert`.
    pub c: f32,

    /// Sine of the side lengths.
    pub sin_a: f32,
    /// Sine of side `b`.
    pub sin_b: f32,
    /// Sine of side `c`.
    pub sin_c: f32,
    /// Cosine of the side lengths.
    pub cos_a: f32,
    /// Cosine of side `b`.
    pub cos_b: f32,
    /// Cosine of side `c`.
    pub cos_c: f32,

    /// Vertex angle at `a_vert`.
    pub alpha: f32,
    /// Vertex angle at `b_vert`.
    pub beta: f32,
    /// Vertex angle at `c_vert`.
    pub gamma: f32,
    /// Cosine of the vertex angles.
    pub cos_alpha: f32,
    /// Cosine of `beta`.
    pub cos_beta: f32,
    /// Cosine of `gamma`.
    pub cos_gamma: f32,

    /// Area on the sphere surface: the spherical excess
    /// `alpha + beta + gamma - π`, also the subtended solid angle.
    pub surface_area: f32,
}

impl SphericalTriangle {
    /// Build the spherical triangle through three unit vectors.
    pub fn new(a_vert: Vec3, b_vert: Vec3, c_vert: Vec3) -> Self {
        let cos_a = b_vert.dot(c_vert).clamp(-1.0, 1.0);
        let cos_b = a_vert.dot(c_vert).clamp(-1.0, 1.0);
        let cos_c = a_vert.dot(b_vert).clamp(-1.0, 1.0);

        // acos lands in [0, π] in theory but can stray just outside in
        // practice, making the sines negative.
        let a = cos_a.acos().clamp(0.0, PI_UNDER);
        let b = cos_b.acos().clamp(0.0, PI_UNDER);
        let c = cos_c.acos().clamp(0.0, PI_UNDER);

        let sin_a = a.sin();
        let sin_b = b.sin();
        let sin_c = c.sin();
        debug_assert!(sin_a >= 0.0 && sin_b >= 0.0 && sin_c >= 0.0);

        // The vertex angles follow from the spherical law of cosines.
        // The numerators are theoretically in [-1, 1] after division but
        // may fall outside; clamp after dividing. The calculation must
        // hold up when any combination of the vertices is close to
        // coincident or collinear.
        let numer0 = cos_a - cos_b * cos_c;
        let numer1 = cos_b - cos_c * cos_a;
        let numer2 = cos_c - cos_a * cos_b;
        let denom0 = sin_b * sin_c;
        let denom1 = sin_c * sin_a;
        let denom2 = sin_a * sin_b;
        debug_assert!(denom0 >= 0.0 && denom1 >= 0.0 && denom2 >= 0.0);

        let mut tri = Self {
            a_vert,
            b_vert,
            c_vert,
            a,
            b,
            c,
            sin_a,
            sin_b,
            sin_c,
            cos_a,
            cos_b,
            cos_c,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            cos_alpha: 0.0,
            cos_beta: 0.0,
            cos_gamma: 0.0,
            surface_area: 0.0,
        };

        if denom0 > 0.0 && denom1 > 0.0 && denom2 > 0.0 {
            tri.cos_alpha = (numer0 / denom0).clamp(-1.0, 1.0);
            tri.cos_beta = (numer1 / denom1).clamp(-1.0, 1.0);
            tri.cos_gamma = (numer2 / denom2).clamp(-1.0, 1.0);
            tri.alpha = tri.cos_alpha.acos().clamp(0.0, PI_UNDER);
            tri.beta = tri.cos_beta.acos().clamp(0.0, PI_UNDER);
            tri.gamma = tri.cos_gamma.acos().clamp(0.0, PI_UNDER);

            tri.surface_area =
                (tri.alpha + tri.beta + tri.gamma - std::f32::consts::PI).max(0.0);
        } else {
            // At least one side collapsed to 0 or π. When exactly one
            // sine vanished the remaining two vertex angles are right
            // angles; when two or more vanished (or every value is in a
            // sensible domain and noise still zeroed a denominator) the
            // angles become NaN for the caller to catch.
            tri.surface_area = 0.0;

            let half_pi = std::f32::consts::FRAC_PI_2;
            match (sin_a > 0.0, sin_b > 0.0, sin_c > 0.0) {
                // Only `c` is 0 or π.
                (true, true, false) => {
                    tri.cos_alpha = 1.0;
                    tri.cos_beta = 1.0;
                    tri.alpha = half_pi;
                    tri.beta = half_pi;
                    tri.cos_gamma = (numer2 / denom2).clamp(-1.0, 1.0);
                    tri.gamma = tri.cos_gamma.acos();
                }
                // Only `b` is 0 or π.
                (true, false, true) => {
                    tri.cos_alpha = 1.0;
                    tri.cos_gamma = 1.0;
                    tri.alpha = half_pi;
                    tri.gamma = half_pi;
                    tri.cos_beta = (numer1 / denom1).clamp(-1.0, 1.0);
                    tri.beta = tri.cos_beta.acos();
                }
                // Only `a` is 0 or π.
                (false, true, true) => {
                    tri.cos_beta = 1.0;
                    tri.cos_gamma = 1.0;
                    tri.beta = half_pi;
                    tri.gamma = half_pi;
                    tri.cos_alpha = (numer0 / denom0).clamp(-1.0, 1.0);
                    tri.alpha = tri.cos_alpha.acos();
                }
                _ => {
                    tri.cos_alpha = f32::NAN;
                    tri.cos_beta = f32::NAN;
                    tri.cos_gamma = f32::NAN;
                    tri.alpha = f32::NAN;
                    tri.beta = f32::NAN;
                    tri.gamma = f32::NAN;
                }
            }
        }

        tri
    }

    /// Whether the construction collapsed into NaN angles.
    pub fn is_degenerate(&self) -> bool {
        self.alpha.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_octant_has_three_right_angles() {
        let tri = SphericalTriangle::new(Vec3::X, Vec3::Y, Vec3::Z);
        assert_relative_eq!(tri.alpha, std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(tri.beta, std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(tri.gamma, std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(
            tri.surface_area,
            std::f32::consts::FRAC_PI_2,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_small_triangle_area_approaches_planar() {
        // A tiny spherical triangle is nearly flat; its spherical excess
        // approaches the planar area of the projected points.
        let e = 0.1;
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(1.0, e, 0.0).normalize();
        let c = Vec3::new(1.0, 0.0, e).normalize();
        let tri = SphericalTriangle::new(a, b, c);
        assert_relative_eq!(tri.surface_area, 0.5 * e * e, max_relative = 2e-2);
    }

    #[test]
    fn test_degenerate_triangle_yields_nan_angles() {
        let tri = SphericalTriangle::new(Vec3::X, Vec3::X, Vec3::X);
        assert!(tri.is_degenerate());
        assert_eq!(tri.surface_area, 0.0);
    }
}
