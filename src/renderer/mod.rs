//! The renderer: tile scheduling, worker threads, and progress output.
//!
//! The framebuffer is cut into fixed-size tiles that worker threads pop
//! from a shared list; each worker owns its RNG and renders a whole tile
//! between lock acquisitions. The last worker to leave is responsible
//! for whatever is left: clearing aborted tiles, the final progress
//! line, and writing the image.

mod integrator;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use glam::Vec4;
use log::info;

use crate::color::ColorData;
use crate::config::TILE_SIZE;
use crate::error::SpectraError;
use crate::framebuffer::{Framebuffer, Tile};
use crate::scene::{builtin, Scene};
use crate::util::sampling::rng_for_worker;

/// Runtime options for one render.
#[derive(Debug)]
pub struct RenderOptions {
    /// Name of the built-in scene.
    pub scene_name: String,
    /// Output resolution in pixels.
    pub res: [usize; 2],
    /// Samples per pixel.
    pub spp: usize,
    /// Where to write the image; the extension picks the format.
    pub output_path: PathBuf,
    /// Whether a live preview window was requested.
    pub open_window: bool,
    /// Worker thread count; 0 means one per hardware context.
    pub threads: usize,
}

/// Tile list and progress-print bookkeeping, all behind one mutex.
struct TileQueue {
    tiles: Vec<Tile>,
    num_tiles_start: usize,
    time_last_print: Option<Instant>,
}

/// State shared by the worker threads for the duration of one render.
struct RenderShared {
    queue: Mutex<TileQueue>,
    framebuffer: Mutex<Framebuffer>,
    num_rendering: AtomicU32,
    time_start: Instant,
    save_result: Mutex<Option<Result<(), SpectraError>>>,
}

/// A renderer bound to one scene and one set of options.
pub struct Renderer {
    options: RenderOptions,
    scene: Scene,
    colors: ColorData,
    render_continue: AtomicBool,
}

impl Renderer {
    /// Build the named scene and prepare to render it.
    ///
    /// # Errors
    ///
    /// Scene-name and data-file failures propagate out.
    pub fn new(
        options: RenderOptions,
        colors: ColorData,
        data_dir: &std::path::Path,
    ) -> Result<Self, SpectraError> {
        let scene = builtin::build(&options.scene_name, options.res, &colors, data_dir)?;
        Ok(Self {
            options,
            scene,
            colors,
            render_continue: AtomicBool::new(true),
        })
    }

    /// Ask the workers to stop at the next tile boundary. Callable from
    /// another thread while [`Renderer::render`] runs.
    pub fn stop(&self) {
        self.render_continue.store(false, Ordering::Relaxed);
    }

    /// Render the scene and write the output image. Blocks until all
    /// workers have exited.
    ///
    /// # Errors
    ///
    /// I/O failures from the final image write.
    pub fn render(&self) -> Result<(), SpectraError> {
        let res = self.options.res;

        // Cut the framebuffer into tiles, then reverse the list so that
        // popping from the back starts work at the bottom of the image.
        let mut tiles = Vec::new();
        let mut j = 0;
        while j < res[1] {
            let mut i = 0;
            while i < res[0] {
                tiles.push(Tile {
                    pos: [i, j],
                    res: [TILE_SIZE.min(res[0] - i), TILE_SIZE.min(res[1] - j)],
                });
                i += TILE_SIZE;
            }
            j += TILE_SIZE;
        }
        tiles.reverse();

        let shared = RenderShared {
            queue: Mutex::new(TileQueue {
                num_tiles_start: tiles.len(),
                tiles,
                time_last_print: None,
            }),
            framebuffer: Mutex::new(Framebuffer::new(res)),
            num_rendering: AtomicU32::new(0),
            time_start: Instant::now(),
            save_result: Mutex::new(None),
        };

        self.render_continue.store(true, Ordering::Relaxed);

        let num_threads = if self.options.threads > 0 {
            self.options.threads
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        };
        info!(
            "rendering {}x{} at {} spp on {num_threads} thread(s)",
            res[0], res[1], self.options.spp
        );

        std::thread::scope(|scope| {
            for index in 0..num_threads {
                let shared = &shared;
                let _ = scope.spawn(move || self.thread_work(index, shared));
            }
        });

        match shared.save_result.into_inner() {
            Ok(Some(result)) => result,
            _ => Ok(()),
        }
    }

    /// Body of one worker thread.
    fn thread_work(&self, index: usize, shared: &RenderShared) {
        let _ = shared.num_rendering.fetch_add(1, Ordering::SeqCst);

        // The generator must be thread-local data: sharing one behind a
        // lock would serialize the workers, and sharing one without a
        // lock would corrupt its state.
        let mut rng = rng_for_worker(index);

        while self.render_continue.load(Ordering::Relaxed) {
            // Pull the next unrendered tile, printing progress (inside
            // the lock, at most once per 10 ms) while we hold the queue.
            let tile = {
                let mut queue = shared
                    .queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);

                let Some(tile) = queue.tiles.pop() else {
                    drop(queue);
                    self.render_continue.store(false, Ordering::Relaxed);
                    break;
                };

                let now = Instant::now();
                let due = queue.time_last_print.map_or(true, |last| {
                    now.duration_since(last).as_secs_f32() > 0.01
                });
                if due {
                    print_progress(
                        queue.num_tiles_start,
                        queue.tiles.len() + 1,
                        shared.time_start,
                    );
                    queue.time_last_print = Some(now);
                }

                tile
            };

            // Render every pixel of the tile into a local buffer, then
            // blit it; the framebuffer lock is held only for the copy.
            let mut local = vec![Vec4::ZERO; tile.res[0] * tile.res[1]];
            for tj in 0..tile.res[1] {
                for ti in 0..tile.res[0] {
                    local[tj * tile.res[0] + ti] = integrator::render_pixel(
                        &self.scene,
                        &self.colors,
                        &mut rng,
                        tile.pos[0] + ti,
                        tile.pos[1] + tj,
                        self.options.spp,
                    );
                }
            }
            {
                let mut framebuffer = shared
                    .framebuffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                for tj in 0..tile.res[1] {
                    for ti in 0..tile.res[0] {
                        framebuffer.set_pixel(
                            tile.pos[0] + ti,
                            tile.pos[1] + tj,
                            local[tj * tile.res[0] + ti],
                        );
                    }
                }
            }
        }

        // Last worker out: nothing else can touch the image anymore, so
        // clear any aborted tiles, close out the progress line, and
        // save.
        let prev = shared.num_rendering.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0);
        if prev == 1 {
            shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .tiles
                .clear();

            print_progress(
                shared
                    .queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .num_tiles_start,
                0,
                shared.time_start,
            );

            let framebuffer = shared
                .framebuffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let result = framebuffer.save(&self.options.output_path);
            if let Err(e) = &result {
                log::error!("could not save image: {e}");
            }
            *shared
                .save_result
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(result);
        }
    }
}

/// Seconds rendered so far as "[D days + ]HH:MM:SS.mmm".
fn pretty_time(mut secs: f64) -> String {
    let days = (secs / 86400.0).floor();
    secs -= 86400.0 * days;
    let hours = (secs / 3600.0).floor();
    secs -= 3600.0 * hours;
    let mins = (secs / 60.0).floor();
    secs -= 60.0 * mins;

    let mut out = String::new();
    if days > 0.0 {
        out.push_str(&format!("{} days + ", days as i64));
    }
    out.push_str(&format!(
        "{:02}:{:02}:{:06.3}",
        hours as i64, mins as i64, secs
    ));
    out
}

/// One carriage-return progress line: fraction of tiles consumed plus a
/// linear extrapolation of the time remaining.
fn print_progress(num_tiles_start: usize, tiles_remaining: usize, time_start: Instant) {
    let time_since_start = time_start.elapsed().as_secs_f64();
    let part = (num_tiles_start - tiles_remaining) as f64 / num_tiles_start as f64;

    if part < 1.0 {
        if part > 0.0 {
            let expected_total = time_since_start / part;
            let expected_remaining = expected_total - time_since_start;
            print!(
                "\rRender {:.2}% (ETA {})           ",
                part * 100.0,
                pretty_time(expected_remaining)
            );
        } else {
            print!("\rRender started                               ");
        }
    } else {
        println!(
            "\rRender completed in {} seconds             ",
            pretty_time(time_since_start)
        );
    }
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_time_formats() {
        assert_eq!(pretty_time(0.0), "00:00:00.000");
        assert_eq!(pretty_time(61.5), "00:01:01.500");
        assert_eq!(pretty_time(3600.0 + 2.0 * 60.0 + 3.25), "01:02:03.250");
        assert_eq!(pretty_time(86400.0 + 3661.0), "1 days + 01:01:01.000");
    }

    #[cfg(not(feature = "rgb"))]
    #[test]
    fn test_tiny_render_fills_framebuffer() {
        use std::path::Path;

        let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let colors = ColorData::load(&data_dir).expect("color data");
        let out = std::env::temp_dir().join("spectra-test-tiny.png");

        let renderer = Renderer::new(
            RenderOptions {
                scene_name: "cornell".to_owned(),
                res: [8, 8],
                spp: 1,
                output_path: out.clone(),
                open_window: false,
                threads: 2,
            },
            colors,
            &data_dir,
        )
        .expect("renderer");
        renderer.render().expect("render");

        let img = image::open(&out).expect("decode").to_rgba8();
        assert_eq!(img.dimensions(), (8, 8));
        // Every pixel was rendered: full alpha everywhere.
        for p in img.pixels() {
            assert_eq!(p.0[3], 255);
        }
        std::fs::remove_file(&out).unwrap();
    }
}
