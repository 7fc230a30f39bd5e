//! CLI binary for the spectra renderer.

use std::path::{Path, PathBuf};

use spectra::renderer::{RenderOptions, Renderer};
use spectra::color::ColorData;
use spectra::SpectraError;

fn print_usage() {
    println!(
        "spectra: a simple spectral renderer\n\
         Required arguments:\n\
         \x20 --scene=<name> / -s=<name>\n\
         \x20       Render the given built-in scene\n\
         \x20       (valid scenes: \"cornell\", \"cornell-srgb\", \"plane-srgb\").\n\
         \x20 --width=<width> / -w=<width>\n\
         \x20       Set the width of the render.\n\
         \x20 --height=<height> / -h=<height>\n\
         \x20       Set the height of the render.\n\
         \x20 --samples=<samples> / -spp=<samples>\n\
         \x20       Set the number of samples per pixel.\n\
         \x20 --output=<output-image-path> / -o=<output-image-path>\n\
         \x20       Set the path to the output image (.csv, .hdr, .pfm, else PNG).\n\
         Optional arguments:\n\
         \x20 --window\n\
         \x20       Open a window displaying the ongoing render."
    );
}

/// Pull `name`/`shortname` out of the argument list. `--flag=value`
/// forms return the value; a bare `--flag` returns the flag name
/// itself.
fn take_arg(args: &mut Vec<String>, name: &str, shortname: &str) -> Option<String> {
    let pos = args.iter().position(|arg| {
        if let Some((key, _)) = arg.split_once('=') {
            key == name || (!shortname.is_empty() && key == shortname)
        } else {
            arg == name || (!shortname.is_empty() && arg == shortname)
        }
    })?;
    let arg = args.remove(pos);
    match arg.split_once('=') {
        Some((_, value)) => Some(value.to_owned()),
        None => Some(name.to_owned()),
    }
}

fn take_arg_required(
    args: &mut Vec<String>,
    name: &str,
    shortname: &str,
) -> Result<String, SpectraError> {
    take_arg(args, name, shortname).ok_or_else(|| {
        SpectraError::BadArgs(format!(
            "required argument `{name}`{} not found",
            if shortname.is_empty() {
                String::new()
            } else {
                format!("/`{shortname}`")
            }
        ))
    })
}

fn parse_positive(value: &str, what: &str) -> Result<usize, SpectraError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SpectraError::BadArgs(format!("invalid {what} \"{value}\""))),
    }
}

fn parse_arguments(mut args: Vec<String>) -> Result<RenderOptions, SpectraError> {
    let scene_name = take_arg_required(&mut args, "--scene", "-s")?;
    match scene_name.as_str() {
        "cornell" | "cornell-srgb" | "plane-srgb" => {}
        other => return Err(SpectraError::UnknownScene(other.to_owned())),
    }

    let width = take_arg_required(&mut args, "--width", "-w")?;
    let height = take_arg_required(&mut args, "--height", "-h")?;
    let res = [
        parse_positive(&width, "width")?,
        parse_positive(&height, "height")?,
    ];

    let spp = parse_positive(
        &take_arg_required(&mut args, "--samples", "-spp")?,
        "number of samples",
    )?;

    let output_path = PathBuf::from(take_arg_required(&mut args, "--output", "-o")?);

    let open_window = match take_arg(&mut args, "--window", "") {
        Some(value) if value == "--window" => true,
        Some(_) => {
            return Err(SpectraError::BadArgs(
                "`--window` does not take a value".to_owned(),
            ))
        }
        None => false,
    };

    if args.len() > 1 {
        log::warn!("ignoring extraneous argument(s):");
        for arg in &args[1..] {
            log::warn!("  \"{arg}\"");
        }
    }

    Ok(RenderOptions {
        scene_name,
        res,
        spp,
        output_path,
        open_window,
        threads: 0,
    })
}

fn run(options: RenderOptions) -> Result<(), SpectraError> {
    let data_dir = Path::new("data");

    let colors = ColorData::load(data_dir)?;
    let renderer = Renderer::new(options, colors, data_dir)?;
    renderer.render()
}

fn main() {
    env_logger::init();

    let options = match parse_arguments(std::env::args().collect()) {
        Ok(options) => options,
        Err(SpectraError::UnknownScene(name)) => {
            log::error!("{}", SpectraError::UnknownScene(name));
            std::process::exit(-3);
        }
        Err(e) => {
            log::error!("{e}");
            print_usage();
            std::process::exit(-1);
        }
    };

    if options.open_window {
        log::warn!("this build has no preview window support; rendering headless");
    }

    if let Err(e) = run(options) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
