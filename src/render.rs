use anyhow::{anyhow, Error, Result};
use configparser::ini::Ini;
use indicatif::ProgressBar;
use log::{debug, error, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::camera::Camera;
use crate::color::{colors, Rgba};
use crate::constants::{
    DEFAULT_HEIGHT, DEFAULT_MAX_DEPTH, DEFAULT_MAX_SAMPLES, DEFAULT_SS_FACTOR, DEFAULT_WIDTH,
    WORK_UNITS,
};
use crate::framebuffer::Framebuffer;
use crate::raytracer::{cast_ray, Ray};
use crate::scene::Scene;

#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Whether to trace a supersampled grid and resolve it down
    pub ss_antialias: bool,
    /// Linear supersampling factor when antialiasing is on
    pub ss_factor: u32,
    pub max_samples: u32,
    pub max_depth: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            ss_antialias: false,
            ss_factor: DEFAULT_SS_FACTOR,
            max_samples: DEFAULT_MAX_SAMPLES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RenderConfig {
    /// The supersampling factor actually applied to the grid
    pub fn factor(&self) -> u32 {
        if self.ss_antialias {
            self.ss_factor.max(1)
        } else {
            1
        }
    }

    pub(crate) fn from_ini(config: &Ini) -> Result<RenderConfig> {
        let defaults = RenderConfig::default();
        Ok(RenderConfig {
            width: get_uint_default(config, "width", defaults.width)?,
            height: get_uint_default(config, "height", defaults.height)?,
            ss_antialias: config
                .getbool("render", "supersample")
                .map_err(|s| anyhow!(s))?
                .unwrap_or(defaults.ss_antialias),
            ss_factor: get_uint_default(config, "ss_factor", defaults.ss_factor)?,
            max_samples: get_uint_default(config, "samples", defaults.max_samples)?,
            max_depth: get_uint_default(config, "max_depth", defaults.max_depth)?,
        })
    }
}

fn get_uint_default(config: &Ini, key: &str, default: u32) -> Result<u32> {
    Ok(config
        .getuint("render", key)
        .map_err(|s| anyhow!(s))?
        .map(|v| v as u32)
        .unwrap_or(default))
}

/// One pixel of tracing work: grid coordinates, the primary ray, and the
/// color the task fills in.
#[derive(Debug, Clone, Copy)]
struct RayJob {
    i: u32,
    j: u32,
    ray: Ray,
    color: Rgba,
}

/// Owns the frame buffers and the sampling loop. Tasks only ever see an
/// immutable scene snapshot; every buffer write happens here, on the
/// controller thread.
pub struct Renderer {
    config: RenderConfig,
    framebuffer: Framebuffer,
    quit: Arc<AtomicBool>,
    rng: SmallRng,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Renderer {
        Renderer::with_rng(config, SmallRng::from_entropy())
    }

    /// Renderer with a deterministic jitter sequence
    pub fn with_seed(config: RenderConfig, seed: u64) -> Renderer {
        Renderer::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: RenderConfig, rng: SmallRng) -> Renderer {
        Renderer {
            config,
            framebuffer: Framebuffer::new(config.width, config.height),
            quit: Arc::new(AtomicBool::new(false)),
            rng,
        }
    }

    /// Shared flag that requests cancellation at the next sample boundary
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Runs up to `max_samples` progressive samples, writing the refined
    /// image to `path` after each one. Returns the number of samples
    /// completed, which falls short of the maximum only when cancelled.
    pub fn render<P: AsRef<Path>>(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        path: P,
    ) -> Result<u32> {
        let config = self.config;
        let factor = config.factor();
        let (ws, hs) = (config.width * factor, config.height * factor);

        let subpixels = if factor > 1 {
            Some(Poisson::new(f64::from(factor) / 2.0).map_err(Error::msg)?)
        } else {
            None
        };

        self.framebuffer.clear();
        let mut supersample = vec![colors::TRANSPARENT; (ws * hs) as usize];
        let mut resolved = vec![colors::TRANSPARENT; (config.width * config.height) as usize];

        let saved_lights = scene.lights.clone();
        let progress = ProgressBar::new(u64::from(config.max_samples));

        info!(
            "rendering {}x{} ({}x{} supersampled), up to {} samples",
            config.width, config.height, ws, hs, config.max_samples
        );

        let mut samples_done = 0;
        for sample in 0..config.max_samples {
            if self.quit.swap(false, Ordering::SeqCst) {
                info!("cancelled after {} samples", samples_done);
                break;
            }

            let jobs = generate_jobs(camera, ws, hs);
            let unit_len = (jobs.len() + WORK_UNITS - 1) / WORK_UNITS;

            // the scene is frozen for the duration of the sample; tasks
            // share it read-only and hand their units back for reduction
            let frozen: &Scene = scene;
            let units: Vec<Vec<RayJob>> = jobs
                .par_chunks(unit_len.max(1))
                .map(|unit| {
                    debug!("work unit size {}", unit.len());
                    unit.iter()
                        .map(|job| RayJob {
                            color: cast_ray(frozen, &job.ray, 0, config.max_depth),
                            ..*job
                        })
                        .collect()
                })
                .collect();

            for job in units.into_iter().flatten() {
                supersample[(job.j * ws + job.i) as usize] = job.color;
            }

            match &subpixels {
                Some(poisson) => self.resolve_subpixels(&supersample, &mut resolved, poisson),
                None => resolved.copy_from_slice(&supersample),
            }

            self.framebuffer.accumulate(sample, &resolved);

            if let Err(err) = self.framebuffer.save_img(&path) {
                error!("failed to write {}: {:#}", path.as_ref().display(), err);
            }

            samples_done += 1;
            progress.inc(1);

            if sample + 1 < config.max_samples {
                scene.jitter_lights(&mut self.rng)?;
            }
        }

        scene.lights = saved_lights;
        progress.finish_and_clear();
        info!("render done, {} samples", samples_done);

        Ok(samples_done)
    }

    /// Collapses the supersampled grid into the output resolution by
    /// averaging Poisson-jittered subpixel picks from each subcell
    fn resolve_subpixels(
        &mut self,
        supersample: &[Rgba],
        resolved: &mut [Rgba],
        poisson: &Poisson<f64>,
    ) {
        let factor = self.config.factor();
        let (width, height) = (self.config.width, self.config.height);
        let ws = width * factor;
        let picks = (factor * 4) as usize;

        for j in 0..height {
            for i in 0..width {
                let mut sum = colors::TRANSPARENT;
                for _ in 0..picks {
                    let dx = (poisson.sample(&mut self.rng) as u32).min(factor - 1);
                    let dy = (poisson.sample(&mut self.rng) as u32).min(factor - 1);
                    sum = sum + supersample[((j * factor + dy) * ws + i * factor + dx) as usize];
                }
                resolved[(j * width + i) as usize] = sum / picks as f64;
            }
        }
    }
}

fn generate_jobs(camera: &Camera, width: u32, height: u32) -> Vec<RayJob> {
    let mut jobs = Vec::with_capacity((width * height) as usize);
    for j in 0..height {
        for i in 0..width {
            // degenerate unprojections simply stay transparent
            if let Some(ray) = camera.pixel_ray(i, j, width, height) {
                jobs.push(RayJob {
                    i,
                    j,
                    ray,
                    color: colors::TRANSPARENT,
                });
            }
        }
    }
    jobs
}

/// A render running on a background worker thread.
pub struct RenderHandle {
    worker: JoinHandle<Result<u32>>,
    quit: Arc<AtomicBool>,
}

impl RenderHandle {
    /// Asks the renderer to stop at the next sample boundary; the sample in
    /// flight always completes
    pub fn request_cancel(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    /// Blocks until the render ends and reports how many samples it did
    pub fn wait(self) -> Result<u32> {
        self.worker
            .join()
            .map_err(|_| anyhow!("render worker panicked"))?
    }

    /// Leaves the worker running unsupervised
    pub fn detach(self) {}
}

/// Runs a full render on a background thread, returning a handle for
/// cancellation and completion.
pub fn spawn<P: Into<PathBuf>>(
    config: RenderConfig,
    mut scene: Scene,
    camera: Camera,
    path: P,
) -> RenderHandle {
    let mut renderer = Renderer::new(config);
    let quit = renderer.cancel_flag();
    let path = path.into();
    let worker = thread::spawn(move || renderer.render(&mut scene, &camera, path));
    RenderHandle { worker, quit }
}
