use anyhow::{anyhow, Context, Error, Result};
use configparser::ini::Ini;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::path::Path;

use crate::color::{colors, Rgba};
use crate::constants::{AMBIENT_IOR, LIGHT_JITTER_SIGMA, ROOT_TOLERANCE, TOLERANCE};
use crate::mat::Mat4;
use crate::raytracer::Ray;
use crate::render::RenderConfig;
use crate::shapes::{Material, Plane, Primitive, Sphere, TargetMask, Traceable};
use crate::vec::{Vec3, Vec4};

/// A point or directional light. The `w` component of the position picks
/// the kind: `0` means directional (shining from infinity toward `-xyz`),
/// `1` positional.
#[derive(Debug, Clone)]
pub struct Light {
    pub position: Vec4,
    pub ambient_color: Rgba,
    pub diffuse_color: Rgba,
    pub specular_color: Rgba,
}

impl Default for Light {
    fn default() -> Self {
        Light {
            position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            ambient_color: colors::WHITE,
            diffuse_color: Rgba::new(0.01, 0.01, 0.01, 1.0),
            specular_color: colors::WHITE,
        }
    }
}

impl Light {
    pub fn is_directional(&self) -> bool {
        self.position.w.abs() < TOLERANCE
    }
}

/// Nearest scene-wide intersection: ray parameter, world-space point and
/// unit normal, and the index of the primitive that was hit.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    pub t: f64,
    pub point: Vec4,
    pub normal: Vec3,
    pub index: usize,
}

pub struct Scene {
    pub primitives: Vec<Primitive>,
    pub lights: Vec<Light>,
    /// Camera-to-world transform; light positions are given relative to the
    /// camera and carried into the world through it
    pub camera_modelview: Mat4,
    pub ambient_ior: f64,
}

impl Default for Scene {
    fn default() -> Self {
        Scene::new()
    }
}

impl Scene {
    pub fn new() -> Scene {
        Scene {
            primitives: Vec::new(),
            lights: Vec::new(),
            camera_modelview: Mat4::identity(),
            ambient_ior: AMBIENT_IOR,
        }
    }

    pub fn n_lights(&self) -> usize {
        self.lights.len()
    }

    pub fn nearest(&self, ray: &Ray) -> Option<Intersection> {
        self.nearest_except(ray, None)
    }

    /// Closest hit over all ray-tracer-visible primitives, optionally
    /// skipping one of them (secondary rays skip their originating surface)
    pub fn nearest_except(&self, ray: &Ray, skip: Option<usize>) -> Option<Intersection> {
        let mut tmin = f64::INFINITY;
        let mut intersection = None;

        for (index, object) in self.primitives.iter().enumerate() {
            if Some(index) == skip || !object.target().contains(TargetMask::RAY_TRACER) {
                continue;
            }
            if let Some(hit) = object.intersect(ray) {
                if hit.t < tmin {
                    tmin = hit.t;
                    intersection = Some(Intersection {
                        t: hit.t,
                        point: ray.at(hit.t),
                        normal: hit.normal,
                        index,
                    });
                }
            }
        }

        intersection
    }

    /// Whether anything blocks the ray before `limit`, excluding the
    /// primitive at `skip`. Used for shadow tests, so the first blocker
    /// short-circuits the scan.
    pub fn occluded(&self, ray: &Ray, limit: f64, skip: usize) -> bool {
        self.primitives.iter().enumerate().any(|(index, object)| {
            if index == skip || !object.target().contains(TargetMask::RAY_TRACER) {
                return false;
            }
            let t = object.intersect_t(ray);
            (ROOT_TOLERANCE..limit).contains(&t)
        })
    }

    /// Perturbs every light position by a per-axis Gaussian, preserving the
    /// positional/directional flag in `w`
    pub fn jitter_lights(&mut self, rng: &mut impl Rng) -> Result<()> {
        let jitter = Normal::new(0.0, LIGHT_JITTER_SIGMA).map_err(Error::msg)?;
        for light in &mut self.lights {
            light.position.x += jitter.sample(rng);
            light.position.y += jitter.sample(rng);
            light.position.z += jitter.sample(rng);
        }
        Ok(())
    }

    /// Reads a scene and its render settings from an `.ini` config file.
    pub fn read_config<P: AsRef<Path>>(path: P) -> Result<(Scene, RenderConfig)> {
        let mut config = Ini::new();
        // '#' stays available for hex colors
        config.set_comment_symbols(&[';', '"']);
        config.load(path).map_err(|s| anyhow!(s))?;
        Scene::from_ini(&config)
    }

    fn from_ini(config: &Ini) -> Result<(Scene, RenderConfig)> {
        let mut scene = Scene::new();

        let position = get_vec3_default(config, "camera", "position", Vec3::new(0.0, 0.0, 0.0))?;
        scene.camera_modelview = match get_vec3_opt(config, "camera", "look_at")? {
            Some(look_at) => {
                let up = get_vec3_default(config, "camera", "up", Vec3::new(0.0, 1.0, 0.0))?;
                Mat4::look_at(position, look_at, up)
                    .inverse()
                    .context("camera position and look_at coincide")?
            }
            None => Mat4::translate(position),
        };

        for section in section_prefix(config, "sphere") {
            let center = get_vec3_fails(config, &section, "center")?;
            let radius = get_float_default(config, &section, "radius", 1.0)?;
            let model = Mat4::translate(center) * Mat4::scale(Vec3::new(radius, radius, radius));
            let mut sphere = Sphere::new(get_material(config, &section)?, model)?;
            sphere.surface_mut().target = get_target(config, &section)?;
            scene.primitives.push(Primitive::Sphere(sphere));
        }

        for section in section_prefix(config, "plane") {
            let point = get_vec3_fails(config, &section, "point")?;
            let normal = get_vec3_fails(config, &section, "normal")?;
            let model = Mat4::translate(point) * Mat4::align_z(normal);
            let mut plane = Plane::new(get_material(config, &section)?, model)?;
            plane.surface_mut().target = get_target(config, &section)?;
            scene.primitives.push(Primitive::Plane(plane));
        }

        for section in section_prefix(config, "light") {
            let position = get_vec3_fails(config, &section, "position")?;
            let w = get_float_default(config, &section, "w", 1.0)?;
            let defaults = Light::default();
            scene.lights.push(Light {
                position: Vec4::new(
                    position.x,
                    position.y,
                    position.z,
                    if w.abs() < TOLERANCE { 0.0 } else { 1.0 },
                ),
                ambient_color: get_color_default(config, &section, "ambient", defaults.ambient_color)?,
                diffuse_color: get_color_default(config, &section, "diffuse", defaults.diffuse_color)?,
                specular_color: get_color_default(
                    config,
                    &section,
                    "specular",
                    defaults.specular_color,
                )?,
            });
        }

        let render = RenderConfig::from_ini(config)?;

        Ok((scene, render))
    }

    /// The built-in demo scene: a box of colored walls around a mirror
    /// sphere and a glass sphere, lit from above.
    pub fn cornell() -> Result<Scene> {
        let mut scene = Scene::new();
        scene.camera_modelview = Mat4::translate(Vec3::new(0.0, 0.0, 4.0));

        let wall = |color: Rgba| Material {
            color,
            ambient: color,
            k_ambient: 0.4,
            k_diffuse: 0.9,
            k_specular: 0.0,
            ..Material::default()
        };

        let plane = |point: Vec3, normal: Vec3, color: Rgba| -> Result<Primitive> {
            let model = Mat4::translate(point) * Mat4::align_z(normal);
            Ok(Primitive::Plane(Plane::new(wall(color), model)?))
        };

        scene.primitives = vec![
            plane(
                Vec3::new(0.0, 0.0, -4.0),
                Vec3::new(0.0, 0.0, 1.0),
                Rgba::grey(0.85),
            )?,
            plane(
                Vec3::new(-3.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Rgba::new(0.9, 0.1, 0.1, 1.0),
            )?,
            plane(
                Vec3::new(3.0, 0.0, 0.0),
                Vec3::new(-1.0, 0.0, 0.0),
                Rgba::new(0.1, 0.9, 0.1, 1.0),
            )?,
            plane(
                Vec3::new(0.0, -2.5, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Rgba::grey(0.8),
            )?,
            plane(
                Vec3::new(0.0, 2.5, 0.0),
                Vec3::new(0.0, -1.0, 0.0),
                Rgba::grey(0.8),
            )?,
            Primitive::Sphere(Sphere::new(
                Material {
                    color: colors::WHITE,
                    ambient: colors::BLACK,
                    k_diffuse: 0.0,
                    k_specular: 0.3,
                    k_reflective: 1.0,
                    shininess: 120.0,
                    ..Material::default()
                },
                Mat4::translate(Vec3::new(-1.1, -1.5, -2.2)),
            )?),
            Primitive::Sphere(Sphere::new(
                Material {
                    color: colors::WHITE,
                    ambient: colors::BLACK,
                    k_diffuse: 1.0,
                    k_specular: 0.2,
                    k_transmittance: 0.95,
                    shininess: 80.0,
                    ior: 1.5,
                    ..Material::default()
                },
                Mat4::translate(Vec3::new(1.2, -1.6, -1.2))
                    * Mat4::scale(Vec3::new(0.9, 0.9, 0.9)),
            )?),
        ];

        scene.lights = vec![
            Light {
                position: Vec4::new(0.0, 2.2, -5.0, 1.0),
                ambient_color: Rgba::grey(0.25),
                diffuse_color: Rgba::grey(0.85),
                specular_color: colors::WHITE,
            },
            Light {
                position: Vec4::new(-0.4, -0.8, -0.5, 0.0),
                ambient_color: colors::TRANSPARENT,
                diffuse_color: Rgba::grey(0.2),
                specular_color: Rgba::grey(0.3),
            },
        ];

        Ok(scene)
    }
}

fn section_prefix(config: &Ini, prefix: &str) -> Vec<String> {
    config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(prefix))
        .collect()
}

fn get_target(config: &Ini, section: &str) -> Result<TargetMask> {
    Ok(match config.get(section, "target").as_deref() {
        None | Some("all") => TargetMask::ALL,
        Some("raytracer") => TargetMask::RAY_TRACER,
        Some("preview") => TargetMask::PREVIEW,
        Some(other) => {
            return Err(anyhow!(
                "Unknown target '{}' in section {}; expected all, raytracer or preview",
                other,
                section
            ))
        }
    })
}

fn get_material(config: &Ini, section: &str) -> Result<Material> {
    let defaults = Material::default();
    let color = get_color_default(config, section, "color", defaults.color)?;
    Ok(Material {
        color,
        // ambient tint falls back to the surface color
        ambient: get_color_default(config, section, "ambient", color)?,
        specular: get_color_default(config, section, "specular", defaults.specular)?,
        k_ambient: get_float_default(config, section, "k_a", defaults.k_ambient)?.max(0.0),
        k_diffuse: get_float_default(config, section, "k_d", defaults.k_diffuse)?.max(0.0),
        k_specular: get_float_default(config, section, "k_s", defaults.k_specular)?.max(0.0),
        k_reflective: get_float_default(config, section, "k_reflective", defaults.k_reflective)?
            .max(0.0),
        k_transmittance: get_float_default(
            config,
            section,
            "k_transmittance",
            defaults.k_transmittance,
        )?
        .max(0.0),
        shininess: get_float_default(config, section, "shininess", defaults.shininess)?.max(0.0),
        ior: get_float_default(config, section, "ior", defaults.ior)?.max(1.0),
    })
}

pub(crate) fn get_float_default(
    config: &Ini,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64> {
    Ok(config
        .getfloat(section, key)
        .map_err(|s| anyhow!(s))?
        .unwrap_or(default))
}

fn get_float_fails(config: &Ini, section: &str, key: &str) -> Result<f64> {
    config
        .getfloat(section, key)
        .map_err(|s| anyhow!(s))?
        .ok_or_else(|| anyhow!("Missing attribute '{}' for {} in config file", key, section))
}

fn get_color_default(config: &Ini, section: &str, key: &str, default: Rgba) -> Result<Rgba> {
    match config.get(section, key) {
        Some(hex) => Rgba::from_hex(&hex),
        None => Ok(default),
    }
}

fn get_vec3_fails(config: &Ini, section: &str, key: &str) -> Result<Vec3> {
    get_vec3_opt(config, section, key)?.ok_or_else(|| {
        anyhow!(
            "Missing vector attribute '{}' in section {} of config file",
            key,
            section
        )
    })
}

fn get_vec3_default(config: &Ini, section: &str, key: &str, default: Vec3) -> Result<Vec3> {
    Ok(get_vec3_opt(config, section, key)?.unwrap_or(default))
}

fn get_vec3_opt(config: &Ini, section: &str, key: &str) -> Result<Option<Vec3>> {
    let vec_string = match config.get(section, key) {
        Some(s) => s,
        None => return Ok(None),
    };

    let trimmed = vec_string
        .trim()
        .trim_start_matches(&['(', '['][..])
        .trim_end_matches(&[')', ']'][..]);

    let floats: Vec<f64> = trimmed
        .split(',')
        .map(|s| s.trim().parse::<f64>().map_err(Error::msg))
        .collect::<Result<Vec<f64>>>()
        .context(format!(
            "In vector attribute '{}' in section {} the vector's elements aren't valid floating point numbers",
            key, section
        ))?;

    if floats.len() != 3 {
        return Err(anyhow!(
            "In vector attribute '{}' in section {} the vector supplied should be 3-dimensional and it's currently {}-dimensional",
            key,
            section,
            floats.len()
        ));
    }

    Ok(Some(Vec3::new(floats[0], floats[1], floats[2])))
}
