use anyhow::Result;
use clap::Parser;

use raytracer::camera::Camera;
use raytracer::constants::{DEFAULT_ASPECT, DEFAULT_IMAGE};
use raytracer::render::{RenderConfig, Renderer};
use raytracer::scene::Scene;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let (mut scene, mut config) = match &args.scene {
        Some(path) => Scene::read_config(path)?,
        None => (Scene::cornell()?, RenderConfig::default()),
    };

    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if args.supersample {
        config.ss_antialias = true;
    }
    if let Some(ss_factor) = args.ss_factor {
        config.ss_factor = ss_factor;
    }
    if let Some(samples) = args.samples {
        config.max_samples = samples;
    }
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }

    let camera = Camera::from_scene(&scene, DEFAULT_ASPECT)?;

    let mut renderer = match args.seed {
        Some(seed) => Renderer::with_seed(config, seed),
        None => Renderer::new(config),
    };

    let samples = renderer.render(&mut scene, &camera, &args.image)?;
    println!("{}: {} samples", args.image, samples);

    Ok(())
}

/// Whitted ray tracer that progressively refines a supersampled render of
/// the scene.
#[derive(Parser, Debug)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Path to image output (image format is determined by file extension)
    #[clap(default_value = DEFAULT_IMAGE)]
    image: String,

    /// Path to the scene's config file; a built-in demo scene is used when
    /// absent
    #[clap(short, long)]
    scene: Option<String>,

    #[clap(long)]
    width: Option<u32>,

    #[clap(long)]
    height: Option<u32>,

    /// Trace a supersampled grid and resolve it down with jittered picks
    #[clap(long)]
    supersample: bool,

    /// Linear supersampling factor
    #[clap(long)]
    ss_factor: Option<u32>,

    /// Number of progressive samples to accumulate
    #[clap(long)]
    samples: Option<u32>,

    /// Maximum recursion depth for reflection and transmission rays
    #[clap(long)]
    max_depth: Option<u32>,

    /// Seed for light jitter and subpixel picks, random when absent
    #[clap(long)]
    seed: Option<u64>,
}
