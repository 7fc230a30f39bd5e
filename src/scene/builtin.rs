//! The hard-coded scenes.
//!
//! Geometry for the Cornell box follows the published measurement data
//! (Cornell University Program of Computer Graphics). The two sRGB
//! scenes exist to exercise the texture upsampling path.

use std::path::Path;

use glam::{Vec2, Vec3};
use log::warn;

use crate::color::ColorData;
use crate::config::EXPLICIT_LIGHT_SAMPLING;
use crate::error::SpectraError;
use crate::geometry::Vertex;
use crate::material::{Albedo, Material, MaterialId, ReflectanceTexture};
use crate::scene::Scene;

#[cfg(feature = "rgb")]
use crate::color::LinRgb;
#[cfg(not(feature = "rgb"))]
use crate::spectrum::{load_spectral_data, Spectrum};

fn vert(pos: Vec3, st: Vec2) -> Vertex {
    Vertex::new(pos, st)
}

/// Build one of the built-in scenes by name.
///
/// # Errors
///
/// [`SpectraError::UnknownScene`] for a name outside the closed set;
/// data-file errors propagate from the loaders.
pub fn build(
    name: &str,
    res: [usize; 2],
    colors: &ColorData,
    data_dir: &Path,
) -> Result<Scene, SpectraError> {
    match name {
        "cornell" => build_cornell(res, colors, data_dir),
        "cornell-srgb" => build_cornell_srgb(res, colors, data_dir),
        "plane-srgb" => build_plane_srgb(res, colors, data_dir),
        other => Err(SpectraError::UnknownScene(other.to_owned())),
    }
}

fn build_cornell(
    res: [usize; 2],
    colors: &ColorData,
    data_dir: &Path,
) -> Result<Scene, SpectraError> {
    if !EXPLICIT_LIGHT_SAMPLING {
        warn!("the cornell scene converges much faster with explicit light sampling");
    }
    let _ = colors;

    let mut scene = Scene::empty(res);
    scene.camera.pos = Vec3::new(278.0, 273.0, -800.0);
    scene.camera.dir = Vec3::new(0.0, 0.0, 1.0).normalize();
    scene.camera.up = Vec3::new(0.0, 1.0, 0.0);
    scene.camera.fov = 39.0;

    #[cfg(not(feature = "rgb"))]
    let (white_back, white_blocks, white_floorceil, green, red) = {
        let csv = data_dir.join("scenes/cornell/white-green-red.csv");
        let data = load_spectral_data(&csv)?;
        if data.len() != 3 {
            return Err(SpectraError::BadCsv(
                csv,
                format!("expected 3 reflectance columns, found {}", data.len()),
            ));
        }

        let mut white = Material::lambertian();
        white.albedo = Albedo::Constant(Spectrum::new(data[0].clone(), 400.0, 700.0)?);
        let mut green_mtl = Material::lambertian();
        green_mtl.albedo = Albedo::Constant(Spectrum::new(data[1].clone(), 400.0, 700.0)?);
        let mut red_mtl = Material::lambertian();
        red_mtl.albedo = Albedo::Constant(Spectrum::new(data[2].clone(), 400.0, 700.0)?);

        let mut white_blocks = Material::lambertian();
        white_blocks.albedo =
            Albedo::Constant(Spectrum::new(data[0].clone(), 400.0, 700.0)?);
        let mut white_floorceil = Material::lambertian();
        white_floorceil.albedo =
            Albedo::Constant(Spectrum::new(data[0].clone(), 400.0, 700.0)?);

        (white, white_blocks, white_floorceil, green_mtl, red_mtl)
    };
    #[cfg(feature = "rgb")]
    let (white_back, white_blocks, white_floorceil, green, red) = {
        let mut white = Material::lambertian();
        white.albedo = Albedo::Constant(LinRgb::ONE);
        let mut white_blocks = Material::lambertian();
        white_blocks.albedo = Albedo::Constant(LinRgb::ONE);
        let mut white_floorceil = Material::lambertian();
        white_floorceil.albedo = Albedo::Constant(LinRgb::ONE);
        let mut green_mtl = Material::lambertian();
        green_mtl.albedo = Albedo::Constant(LinRgb::new(0.0, 1.0, 0.0));
        let mut red_mtl = Material::lambertian();
        red_mtl.albedo = Albedo::Constant(LinRgb::new(1.0, 0.0, 0.0));
        (white, white_blocks, white_floorceil, green_mtl, red_mtl)
    };

    let light = {
        let mut light = Material::lambertian();
        #[cfg(not(feature = "rgb"))]
        {
            let csv = data_dir.join("scenes/cornell/light.csv");
            let data = load_spectral_data(&csv)?;
            if data.len() != 1 {
                return Err(SpectraError::BadCsv(
                    csv,
                    format!("expected 1 emission column, found {}", data.len()),
                ));
            }
            light.emission = &Spectrum::new(data[0].clone(), 400.0, 700.0)? * 200.0;
            light.albedo = Albedo::Constant(Spectrum::constant(0.78));
        }
        #[cfg(feature = "rgb")]
        {
            light.emission = LinRgb::ONE * 200.0;
            light.albedo = Albedo::Constant(LinRgb::splat(0.78));
        }
        light
    };

    let white_back = scene.add_material("white-back", white_back);
    let white_blocks = scene.add_material("white-blocks", white_blocks);
    let white_floorceil = scene.add_material("white-floorceil", white_floorceil);
    let green = scene.add_material("green", green);
    let red = scene.add_material("red", red);
    let light = scene.add_material("light", light);

    push_cornell_geometry(
        &mut scene,
        white_back,
        white_blocks,
        white_floorceil,
        green,
        red,
        light,
    );

    scene.finish();
    Ok(scene)
}

#[allow(clippy::too_many_lines)]
fn push_cornell_geometry(
    scene: &mut Scene,
    white_back: MaterialId,
    white_blocks: MaterialId,
    white_floorceil: MaterialId,
    green: MaterialId,
    red: MaterialId,
    light: MaterialId,
) {
    let st0 = Vec2::new(0.0, 0.0);

    // Floor
    scene.push_quad(
        white_floorceil,
        [
            vert(Vec3::new(552.8, 0.0, 0.0), Vec2::new(1.0, 0.0)),
            vert(Vec3::new(0.0, 0.0, 0.0), Vec2::new(0.0, 0.0)),
            vert(Vec3::new(0.0, 0.0, 559.2), Vec2::new(0.0, 1.0)),
            vert(Vec3::new(549.6, 0.0, 559.2), Vec2::new(1.0, 1.0)),
        ],
    );

    // The ceiling has an actual hole cut for the light:
    //
    //     A-------B    Left <-----+
    //     | E---F |               |
    //     | |   | |               |
    //     | G---H |               v
    //     C-------D             Front
    //
    // Keeping the light out of the ceiling plane's interior cuts
    // variance under explicit light sampling considerably, since rays
    // can't land on ceiling behind the light and sample the enormous
    // solid angle toward it.
    let a = Vec3::new(0.0, 548.8, 559.2);
    let b = Vec3::new(556.0, 548.8, 559.2);
    let c = Vec3::new(0.0, 548.8, 0.0);
    let d = Vec3::new(556.0, 548.8, 0.0);
    let e = Vec3::new(213.0, 548.8, 332.0);
    let f = Vec3::new(343.0, 548.8, 332.0);
    let g = Vec3::new(213.0, 548.8, 227.0);
    let h = Vec3::new(343.0, 548.8, 227.0);

    // Light (H, F, E, G)
    scene.push_quad(
        light,
        [
            vert(h, Vec2::new(1.0, 0.0)),
            vert(f, Vec2::new(1.0, 1.0)),
            vert(e, Vec2::new(0.0, 1.0)),
            vert(g, Vec2::new(0.0, 0.0)),
        ],
    );

    // Ceiling pieces around the hole
    scene.push_quad(
        white_floorceil,
        [vert(d, st0), vert(b, st0), vert(f, st0), vert(h, st0)],
    );
    scene.push_quad(
        white_floorceil,
        [vert(b, st0), vert(a, st0), vert(e, st0), vert(f, st0)],
    );
    scene.push_quad(
        white_floorceil,
        [vert(a, st0), vert(c, st0), vert(g, st0), vert(e, st0)],
    );
    scene.push_quad(
        white_floorceil,
        [vert(c, st0), vert(d, st0), vert(h, st0), vert(g, st0)],
    );

    // Back wall
    scene.push_quad(
        white_back,
        [
            vert(Vec3::new(549.6, 0.0, 559.2), Vec2::new(0.0, 0.0)),
            vert(Vec3::new(0.0, 0.0, 559.2), Vec2::new(1.0, 0.0)),
            vert(Vec3::new(0.0, 548.8, 559.2), Vec2::new(1.0, 1.0)),
            vert(Vec3::new(556.0, 548.8, 559.2), Vec2::new(0.0, 1.0)),
        ],
    );

    // Right wall (green)
    scene.push_quad(
        green,
        [
            vert(Vec3::new(0.0, 0.0, 559.2), Vec2::new(1.0, 0.0)),
            vert(Vec3::new(0.0, 0.0, 0.0), Vec2::new(0.0, 0.0)),
            vert(Vec3::new(0.0, 548.8, 0.0), Vec2::new(0.0, 1.0)),
            vert(Vec3::new(0.0, 548.8, 559.2), Vec2::new(1.0, 1.0)),
        ],
    );

    // Left wall (red)
    scene.push_quad(
        red,
        [
            vert(Vec3::new(552.8, 0.0, 0.0), Vec2::new(0.0, 0.0)),
            vert(Vec3::new(549.6, 0.0, 559.2), Vec2::new(1.0, 0.0)),
            vert(Vec3::new(556.0, 548.8, 559.2), Vec2::new(1.0, 1.0)),
            vert(Vec3::new(556.0, 548.8, 0.0), Vec2::new(0.0, 1.0)),
        ],
    );

    // Short block
    for corners in [
        [
            Vec3::new(130.0, 165.0, 65.0),
            Vec3::new(82.0, 165.0, 225.0),
            Vec3::new(240.0, 165.0, 272.0),
            Vec3::new(290.0, 165.0, 114.0),
        ],
        [
            Vec3::new(290.0, 0.0, 114.0),
            Vec3::new(290.0, 165.0, 114.0),
            Vec3::new(240.0, 165.0, 272.0),
            Vec3::new(240.0, 0.0, 272.0),
        ],
        [
            Vec3::new(130.0, 0.0, 65.0),
            Vec3::new(130.0, 165.0, 65.0),
            Vec3::new(290.0, 165.0, 114.0),
            Vec3::new(290.0, 0.0, 114.0),
        ],
        [
            Vec3::new(82.0, 0.0, 225.0),
            Vec3::new(82.0, 165.0, 225.0),
            Vec3::new(130.0, 165.0, 65.0),
            Vec3::new(130.0, 0.0, 65.0),
        ],
        [
            Vec3::new(240.0, 0.0, 272.0),
            Vec3::new(240.0, 165.0, 272.0),
            Vec3::new(82.0, 165.0, 225.0),
            Vec3::new(82.0, 0.0, 225.0),
        ],
    ] {
        scene.push_quad(
            white_blocks,
            [
                vert(corners[0], st0),
                vert(corners[1], st0),
                vert(corners[2], st0),
                vert(corners[3], st0),
            ],
        );
    }

    // Tall block
    for corners in [
        [
            Vec3::new(423.0, 330.0, 247.0),
            Vec3::new(265.0, 330.0, 296.0),
            Vec3::new(314.0, 330.0, 456.0),
            Vec3::new(472.0, 330.0, 406.0),
        ],
        [
            Vec3::new(423.0, 0.0, 247.0),
            Vec3::new(423.0, 330.0, 247.0),
            Vec3::new(472.0, 330.0, 406.0),
            Vec3::new(472.0, 0.0, 406.0),
        ],
        [
            Vec3::new(472.0, 0.0, 406.0),
            Vec3::new(472.0, 330.0, 406.0),
            Vec3::new(314.0, 330.0, 456.0),
            Vec3::new(314.0, 0.0, 456.0),
        ],
        [
            Vec3::new(314.0, 0.0, 456.0),
            Vec3::new(314.0, 330.0, 456.0),
            Vec3::new(265.0, 330.0, 296.0),
            Vec3::new(265.0, 0.0, 296.0),
        ],
        [
            Vec3::new(265.0, 0.0, 296.0),
            Vec3::new(265.0, 330.0, 296.0),
            Vec3::new(423.0, 330.0, 247.0),
            Vec3::new(423.0, 0.0, 247.0),
        ],
    ] {
        scene.push_quad(
            white_blocks,
            [
                vert(corners[0], st0),
                vert(corners[1], st0),
                vert(corners[2], st0),
                vert(corners[3], st0),
            ],
        );
    }
}

fn build_cornell_srgb(
    res: [usize; 2],
    colors: &ColorData,
    data_dir: &Path,
) -> Result<Scene, SpectraError> {
    let mut scene = build_cornell(res, colors, data_dir)?;

    let light_scale = 30.0;
    let texture = ReflectanceTexture::load(&data_dir.join("scenes/test-pattern-64.png"))?;
    let tex = scene.add_material("srgb", Material::lambertian_texture(texture));
    let white1 = scene.add_material("white1", Material::lambertian());

    // Re-point the box onto the texture and plain white so the sRGB
    // upsampling path carries the image.
    let back = scene.material_names["white-back"];
    let blocks = scene.material_names["white-blocks"];
    let floorceil = scene.material_names["white-floorceil"];
    let green = scene.material_names["green"];
    let red = scene.material_names["red"];
    for prim in &mut scene.primitives {
        if prim.material == back || prim.material == red {
            prim.material = tex;
        } else if prim.material == blocks
            || prim.material == floorceil
            || prim.material == green
        {
            prim.material = white1;
        }
    }

    let light = scene.material_names["light"];
    #[cfg(not(feature = "rgb"))]
    {
        scene.materials[light.0].emission = &colors.d65_rad * light_scale;
    }
    #[cfg(feature = "rgb")]
    {
        scene.materials[light.0].emission = LinRgb::ONE * light_scale;
    }

    Ok(scene)
}

fn build_plane_srgb(
    res: [usize; 2],
    colors: &ColorData,
    data_dir: &Path,
) -> Result<Scene, SpectraError> {
    if EXPLICIT_LIGHT_SAMPLING {
        warn!("the plane scene converges much faster without explicit light sampling");
    }
    let _ = colors;

    let mut scene = Scene::empty(res);
    scene.camera.pos = Vec3::new(0.0, 0.0, 5.0);
    scene.camera.dir = (Vec3::ZERO - scene.camera.pos).normalize();
    scene.camera.up = Vec3::new(0.0, 1.0, 0.0);
    // Frame the unit plane exactly.
    scene.camera.fov = (2.0 * 1.0f32.atan2(scene.camera.pos.z)).to_degrees();

    let light = {
        let mut light = Material::lambertian();
        #[cfg(not(feature = "rgb"))]
        {
            light.albedo = Albedo::Constant(Spectrum::constant(0.0));
            light.emission = colors.d65_rad.clone();
        }
        #[cfg(feature = "rgb")]
        {
            light.albedo = Albedo::Constant(LinRgb::ZERO);
            light.emission = LinRgb::ONE;
        }
        light
    };
    let light = scene.add_material("light", light);

    let texture = ReflectanceTexture::load(&data_dir.join("scenes/test-pattern-64.png"))?;
    let tex = scene.add_material("tex", Material::lambertian_texture(texture));

    // The textured plane
    scene.push_quad(
        tex,
        [
            vert(Vec3::new(-1.0, -1.0, 0.0), Vec2::new(0.0, 0.0)),
            vert(Vec3::new(1.0, -1.0, 0.0), Vec2::new(1.0, 0.0)),
            vert(Vec3::new(1.0, 1.0, 0.0), Vec2::new(1.0, 1.0)),
            vert(Vec3::new(-1.0, 1.0, 0.0), Vec2::new(0.0, 1.0)),
        ],
    );

    // A box of lights surrounding the scene: a white furnace
    let st0 = Vec2::new(0.0, 0.0);
    let size = 10.0;
    for corners in [
        [
            Vec3::new(-size, -size, size),
            Vec3::new(-size, -size, -size),
            Vec3::new(-size, size, -size),
            Vec3::new(-size, size, size),
        ],
        [
            Vec3::new(size, -size, -size),
            Vec3::new(size, -size, size),
            Vec3::new(size, size, size),
            Vec3::new(size, size, -size),
        ],
        [
            Vec3::new(-size, -size, size),
            Vec3::new(size, -size, size),
            Vec3::new(size, -size, -size),
            Vec3::new(-size, -size, -size),
        ],
        [
            Vec3::new(size, size, size),
            Vec3::new(-size, size, size),
            Vec3::new(-size, size, -size),
            Vec3::new(size, size, -size),
        ],
        [
            Vec3::new(-size, -size, -size),
            Vec3::new(size, -size, -size),
            Vec3::new(size, size, -size),
            Vec3::new(-size, size, -size),
        ],
        [
            Vec3::new(size, -size, size),
            Vec3::new(-size, -size, size),
            Vec3::new(-size, size, size),
            Vec3::new(size, size, size),
        ],
    ] {
        scene.push_quad(
            light,
            [
                vert(corners[0], st0),
                vert(corners[1], st0),
                vert(corners[2], st0),
                vert(corners[3], st0),
            ],
        );
    }

    scene.finish();
    Ok(scene)
}
