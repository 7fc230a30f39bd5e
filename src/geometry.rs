//! Geometric primitives and the watertight ray-triangle kernel.
//!
//! The primitive set is closed and small (triangle, quadrilateral), so
//! primitives are tagged variants rather than trait objects: the
//! integrator branches on a discriminant instead of chasing a vtable on
//! the hot path. Primitives reference their material by arena index.

use glam::{Vec2, Vec3};

use crate::config::EPS;
use crate::material::MaterialId;
use crate::util::sampling::{rand_toward_spherical_tri, PathRng};
use crate::util::spherical_tri::SphericalTriangle;

/// A ray with origin and unit direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Ray origin in world space.
    pub orig: Vec3,
    /// Unit direction.
    pub dir: Vec3,
}

impl Ray {
    /// Point at parameter `dist` along the ray.
    pub fn at(&self, dist: f32) -> Vec3 {
        self.orig + dist * self.dir
    }
}

/// Result of intersecting a ray against the scene.
#[derive(Debug, Clone, Copy)]
pub struct HitRecord {
    /// Index of the hit primitive in the scene's primitive arena.
    pub prim: usize,
    /// Shading normal at the hit.
    pub normal: Vec3,
    /// Interpolated ST texture coordinate.
    pub st: Vec2,
    /// Distance along the ray; starts at +∞ and shrinks as closer
    /// primitives are found.
    pub dist: f32,
}

impl HitRecord {
    /// A record no primitive has been written into yet.
    pub fn miss() -> Self {
        Self {
            prim: usize::MAX,
            normal: Vec3::ZERO,
            st: Vec2::ZERO,
            dist: f32::INFINITY,
        }
    }
}

/// A vertex: world-space position plus ST texture coordinate in [0,1]².
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    /// Position in world space.
    pub pos: Vec3,
    /// ST texture coordinate.
    pub st: Vec2,
}

impl Vertex {
    /// Convenience constructor.
    pub fn new(pos: Vec3, st: Vec2) -> Self {
        Self { pos, st }
    }
}

/// Bounding sphere of a primitive: vertex centroid plus the maximum
/// distance from it. Not the minimal sphere, but close enough for cone
/// sampling.
#[derive(Debug, Clone, Copy)]
pub struct SphereBound {
    /// Sphere center.
    pub center: Vec3,
    /// Sphere radius.
    pub radius: f32,
}

/// A triangle with a precomputed unit geometric normal.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// The three vertices.
    pub verts: [Vertex; 3],
    /// Unit normal from the winding of the vertices.
    pub normal: Vec3,
}

impl Triangle {
    /// Triangle through three vertices; the normal follows the winding.
    pub fn new(vert0: Vertex, vert1: Vertex, vert2: Vertex) -> Self {
        let normal = (vert1.pos - vert0.pos)
            .cross(vert2.pos - vert0.pos)
            .normalize();
        Self {
            verts: [vert0, vert1, vert2],
            normal,
        }
    }

    /// Watertight ray-triangle intersection after Woop, Benthin, and
    /// Wald (JCGT 2013). Updates `hitrec` and returns true when this
    /// triangle is closer than whatever the record already holds.
    ///
    /// When a scaled barycentric coordinate comes out exactly zero the
    /// cross product is recomputed in double precision, so a ray passing
    /// exactly through a shared edge classifies consistently on both
    /// adjacent triangles.
    pub fn intersect(&self, ray: &Ray, hitrec: &mut HitRecord) -> bool {
        // Dimension where the ray direction is maximal
        let abs_dir = ray.dir.abs();
        let (mut kx, mut ky, kz) = if abs_dir.x > abs_dir.y {
            if abs_dir.x > abs_dir.z {
                (1, 2, 0)
            } else {
                (0, 1, 2)
            }
        } else if abs_dir.y > abs_dir.z {
            (2, 0, 1)
        } else {
            (0, 1, 2)
        };
        if ray.dir[kz] < 0.0 {
            std::mem::swap(&mut kx, &mut ky); // winding order
        }

        // Shear constants
        let sx = ray.dir[kx] / ray.dir[kz];
        let sy = ray.dir[ky] / ray.dir[kz];
        let sz = 1.0 / ray.dir[kz];

        // Vertices relative to the ray origin
        let a = self.verts[0].pos - ray.orig;
        let b = self.verts[1].pos - ray.orig;
        let c = self.verts[2].pos - ray.orig;

        // Shear and scale
        let abc_kx = Vec3::new(a[kx], b[kx], c[kx]);
        let abc_ky = Vec3::new(a[ky], b[ky], c[ky]);
        let abc_kz = Vec3::new(a[kz], b[kz], c[kz]);
        let abc_x = abc_kx - sx * abc_kz;
        let abc_y = abc_ky - sy * abc_kz;

        // Scaled barycentric coordinates and edge tests
        let mut uvw = abc_y.cross(abc_x);
        if uvw.x != 0.0 && uvw.y != 0.0 && uvw.z != 0.0 {
            if (uvw.x < 0.0 || uvw.y < 0.0 || uvw.z < 0.0)
                && (uvw.x > 0.0 || uvw.y > 0.0 || uvw.z > 0.0)
            {
                return false;
            }
        } else {
            let uvw_d = abc_y.as_dvec3().cross(abc_x.as_dvec3());
            if (uvw_d.x < 0.0 || uvw_d.y < 0.0 || uvw_d.z < 0.0)
                && (uvw_d.x > 0.0 || uvw_d.y > 0.0 || uvw_d.z > 0.0)
            {
                return false;
            }
            uvw = uvw_d.as_vec3();
        }

        // Determinant
        let det = uvw.x + uvw.y + uvw.z;
        if det.abs() <= EPS {
            return false;
        }

        // Scaled z-coordinates give the scaled hit distance
        let abc_z = sz * abc_kz;
        let t = uvw.dot(abc_z);

        // Signs of `det` and `t` must match, or the hit is behind the ray
        if ((det.to_bits() ^ t.to_bits()) & 0x8000_0000) != 0 {
            return false;
        }

        // Normalize
        let det_recip = 1.0 / det;
        let dist = t * det_recip;
        debug_assert!(!dist.is_nan());
        if dist >= EPS && dist < hitrec.dist {
            let bary = uvw * det_recip;
            hitrec.normal = self.normal;
            hitrec.st = bary.x * self.verts[0].st
                + bary.y * self.verts[1].st
                + bary.z * self.verts[2].st;
            hitrec.dist = dist;
            return true;
        }

        false
    }

    /// Random direction from `from` toward the triangle. The triangle is
    /// projected onto the unit sphere around `from` (the space of all
    /// directions a ray could go) and sampled uniformly there. The PDF is
    /// the reciprocal of the subtended solid angle.
    pub fn sample_toward(&self, rng: &mut PathRng, from: Vec3) -> (Vec3, f32) {
        let tri = SphericalTriangle::new(
            (self.verts[0].pos - from).normalize(),
            (self.verts[1].pos - from).normalize(),
            (self.verts[2].pos - from).normalize(),
        );
        let dir = rand_toward_spherical_tri(rng, &tri);
        (dir, 1.0 / tri.surface_area)
    }

    /// Bounding sphere centered on the centroid. Not optimal, but not
    /// terrible.
    pub fn bound(&self) -> SphereBound {
        let centroid =
            (self.verts[0].pos + self.verts[1].pos + self.verts[2].pos) * (1.0 / 3.0);
        let mut max_dist = 0.0f32;
        for v in &self.verts {
            max_dist = max_dist.max((v.pos - centroid).length());
        }
        SphereBound {
            center: centroid,
            radius: max_dist,
        }
    }
}

/// The closed set of primitive shapes.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// A single triangle.
    Tri(Triangle),
    /// A planar quadrilateral stored as two triangles sharing a
    /// diagonal. Coplanarity is assumed: at most one of the two
    /// triangles can produce the closer hit.
    Quad(Triangle, Triangle),
}

/// A scene primitive: a shape plus its material and a cached flag for
/// whether that material emits.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    /// The geometry.
    pub shape: Shape,
    /// Arena index of the material.
    pub material: MaterialId,
    /// Whether the material's emission integrates to anything. Computed
    /// once at scene build.
    pub is_light: bool,
}

impl Primitive {
    /// Triangle primitive.
    pub fn tri(
        material: MaterialId,
        is_light: bool,
        vert0: Vertex,
        vert1: Vertex,
        vert2: Vertex,
    ) -> Self {
        Self {
            shape: Shape::Tri(Triangle::new(vert0, vert1, vert2)),
            material,
            is_light,
        }
    }

    /// Quadrilateral primitive from four corners in winding order.
    pub fn quad(
        material: MaterialId,
        is_light: bool,
        vert00: Vertex,
        vert10: Vertex,
        vert11: Vertex,
        vert01: Vertex,
    ) -> Self {
        Self {
            shape: Shape::Quad(
                Triangle::new(vert00, vert10, vert11),
                Triangle::new(vert00, vert11, vert01),
            ),
            material,
            is_light,
        }
    }

    /// Intersect the primitive, updating `hitrec` on a closer hit.
    pub fn intersect(&self, ray: &Ray, hitrec: &mut HitRecord) -> bool {
        match &self.shape {
            Shape::Tri(tri) => tri.intersect(ray, hitrec),
            // Coplanar, so whichever triangle hits first is the hit.
            Shape::Quad(tri0, tri1) => {
                tri0.intersect(ray, hitrec) || tri1.intersect(ray, hitrec)
            }
        }
    }

    /// Random direction from `from` toward this primitive with its PDF.
    /// A quad picks one of its triangles with probability 1/2.
    pub fn sample_toward(&self, rng: &mut PathRng, from: Vec3) -> (Vec3, f32) {
        use rand::Rng as _;
        match &self.shape {
            Shape::Tri(tri) => tri.sample_toward(rng, from),
            Shape::Quad(tri0, tri1) => {
                let tri = if rng.random::<f32>() <= 0.5 { tri0 } else { tri1 };
                let (dir, pdf) = tri.sample_toward(rng, from);
                (dir, pdf * 0.5)
            }
        }
    }

    /// Bounding sphere of the primitive.
    pub fn bound(&self) -> SphereBound {
        match &self.shape {
            Shape::Tri(tri) => tri.bound(),
            Shape::Quad(tri0, tri1) => {
                let centroid = (tri0.verts[0].pos
                    + tri0.verts[1].pos
                    + tri0.verts[2].pos
                    + tri1.verts[2].pos)
                    * 0.25;
                let max_dist = [
                    tri0.verts[0].pos,
                    tri0.verts[1].pos,
                    tri0.verts[2].pos,
                    tri1.verts[2].pos,
                ]
                .iter()
                .map(|p| (*p - centroid).length())
                .fold(0.0f32, f32::max);
                SphereBound {
                    center: centroid,
                    radius: max_dist,
                }
            }
        }
    }
}
