use itertools::multiunzip;

use crate::color::{colors, Rgba};
use crate::constants::{SURFACE_OFFSET, TOLERANCE};
use crate::scene::{Intersection, Light, Scene};
use crate::shapes::Traceable;
use crate::vec::{nearly_equal, reflect, refract, Vec3, Vec4};

/// A ray in homogeneous coordinates: `start.w` is 1, `dir.w` is 0.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub start: Vec4,
    pub dir: Vec4,
}

impl Ray {
    pub fn new(start: Vec4, dir: Vec4) -> Ray {
        Ray { start, dir }
    }

    pub fn at(&self, t: f64) -> Vec4 {
        self.start + t * self.dir
    }
}

/// Direction toward a light from `point`, plus the length of the shadow
/// segment: the distance to a positional light, unbounded for a
/// directional one
fn light_vector(scene: &Scene, light: &Light, point: Vec3) -> (Vec3, f64) {
    if light.is_directional() {
        ((-light.position.xyz()).normalize(), f64::INFINITY)
    } else {
        let world = (scene.camera_modelview * light.position).xyz();
        let to_light = world - point;
        (to_light.normalize(), to_light.norm())
    }
}

/// Phong local illumination at a hit point, plus the contributions already
/// gathered by the reflection and transmission subrays. Returns an
/// unclamped color; the caller clamps.
pub fn shade(scene: &Scene, hit: &Intersection, reflect_color: Rgba, refract_color: Rgba) -> Rgba {
    let mtl = scene.primitives[hit.index].material();
    let normal = hit.normal.normalize();
    let point = hit.point.xyz();

    let eye_pos = (scene.camera_modelview * Vec4::new(0.0, 0.0, 0.0, 1.0)).xyz();
    let eye = (eye_pos - point).normalize();

    // Shadow tests and light geometry get reused across the components, so
    // run them once per light up front
    let (l_dirs, kds, blocked): (Vec<Vec3>, Vec<f64>, Vec<bool>) =
        multiunzip(scene.lights.iter().map(|light| {
            let (l_dir, dist) = light_vector(scene, light, point);
            let shadow_ray = Ray::new(hit.point, Vec4::dir(l_dir));
            (
                l_dir,
                l_dir.dot(normal).max(0.0),
                scene.occluded(&shadow_ray, dist, hit.index),
            )
        }));

    let mut color = colors::BLACK;
    for (i, light) in scene.lights.iter().enumerate() {
        let ambient = mtl.ambient * light.ambient_color * mtl.k_ambient;

        let kd = kds[i];
        if blocked[i] || kd <= 0.0 {
            color = color + ambient;
            continue;
        }

        let diffuse = light.diffuse_color * mtl.color * (mtl.k_diffuse * kd);

        let reflect_dir = (-reflect(l_dirs[i], normal)).normalize();
        let spec_angle = reflect_dir.dot(eye).max(0.0);
        let ks = spec_angle.powf(mtl.shininess);

        let mut specular = (reflect_color * mtl.specular * mtl.k_reflective
            + light.specular_color * mtl.specular * (ks * mtl.k_specular))
            .clamp();
        if nearly_equal(kd, 0.0, TOLERANCE) {
            // shadow terminator guard
            specular = colors::TRANSPARENT;
        }

        let refraction = refract_color * (mtl.k_diffuse * mtl.k_transmittance);

        color = color + ambient + diffuse + specular + refraction;
    }

    color
}

/// Recursively traces a ray against the scene. Rays that miss everything,
/// and recursion past `max_depth`, contribute transparent black.
pub fn cast_ray(scene: &Scene, ray: &Ray, depth: u32, max_depth: u32) -> Rgba {
    if depth > max_depth {
        return colors::TRANSPARENT;
    }

    let hit = match scene.nearest(ray) {
        Some(hit) => hit,
        None => return colors::TRANSPARENT,
    };

    let mtl = scene.primitives[hit.index].material();
    let normal = hit.normal;
    let dir = ray.dir.xyz().normalize();

    let reflect_dir = (-reflect(dir, normal)).normalize();

    let reflect_color = if mtl.k_reflective > 0.0 || mtl.k_specular > 0.0 {
        let reflected = Ray::new(hit.point, Vec4::dir(reflect_dir));
        cast_ray(scene, &reflected, depth + 1, max_depth)
    } else {
        colors::TRANSPARENT
    };

    let refract_color = if mtl.k_transmittance > TOLERANCE {
        let entering = dir.dot(normal) < 0.0;
        let (eta, facing) = if entering {
            (scene.ambient_ior / mtl.ior, normal)
        } else {
            (mtl.ior / scene.ambient_ior, -normal)
        };

        let refracted = refract(dir, facing, eta);
        // past the critical angle the transmitted direction is imaginary
        // and the reflection direction substitutes for it
        let out_dir = if refracted.is_nan() {
            reflect_dir
        } else {
            refracted
        };

        let start = hit.point + Vec4::dir(dir) * SURFACE_OFFSET;
        let transmitted = Ray::new(start, Vec4::dir(out_dir));
        cast_ray(scene, &transmitted, depth + 1, max_depth)
    } else {
        colors::TRANSPARENT
    };

    shade(scene, &hit, reflect_color, refract_color).clamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::Mat4;
    use crate::shapes::{Material, Plane, Primitive, Sphere};

    fn ray(start: Vec3, dir: Vec3) -> Ray {
        Ray::new(Vec4::point(start), Vec4::dir(dir))
    }

    fn floor_scene() -> Scene {
        let mut scene = Scene::new();
        scene.primitives.push(Primitive::Plane(
            Plane::new(
                Material {
                    ambient: Rgba::new(0.1, 0.1, 0.1, 1.0),
                    k_specular: 0.0,
                    ..Material::default()
                },
                Mat4::align_z(Vec3::new(0.0, 1.0, 0.0)),
            )
            .unwrap(),
        ));
        scene.primitives.push(Primitive::Sphere(
            Sphere::new(
                Material::default(),
                Mat4::translate(Vec3::new(0.0, 2.0, 0.0)) * Mat4::scale(Vec3::new(0.5, 0.5, 0.5)),
            )
            .unwrap(),
        ));
        scene.lights.push(Light {
            position: Vec4::new(0.0, 4.0, 0.0, 1.0),
            ambient_color: Rgba::grey(0.5),
            diffuse_color: Rgba::grey(0.8),
            specular_color: colors::WHITE,
        });
        scene
    }

    fn floor_hit(point: Vec3) -> Intersection {
        Intersection {
            t: 1.0,
            point: Vec4::point(point),
            normal: Vec3::new(0.0, 1.0, 0.0),
            index: 0,
        }
    }

    #[test]
    fn occluded_point_gets_only_ambient() {
        let scene = floor_scene();

        // directly under the blocking sphere
        let hit = floor_hit(Vec3::new(0.0, 0.0, 0.0));
        let shadowed = shade(&scene, &hit, colors::TRANSPARENT, colors::TRANSPARENT);
        let ambient = scene.primitives[0].material().ambient
            * scene.lights[0].ambient_color
            * scene.primitives[0].material().k_ambient;
        assert!((shadowed.r - ambient.r).abs() < 1e-6);
        assert!((shadowed.g - ambient.g).abs() < 1e-6);
        assert!((shadowed.b - ambient.b).abs() < 1e-6);

        // off to the side the same light contributes diffuse as well
        let hit = floor_hit(Vec3::new(3.0, 0.0, 0.0));
        let lit = shade(&scene, &hit, colors::TRANSPARENT, colors::TRANSPARENT);
        assert!(lit.r > ambient.r + 0.1);
    }

    #[test]
    fn miss_and_depth_cutoff_are_transparent_black() {
        let empty = Scene::new();
        let r = ray(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(cast_ray(&empty, &r, 0, 5), colors::TRANSPARENT);

        let scene = floor_scene();
        let down = ray(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(cast_ray(&scene, &down, 6, 5), colors::TRANSPARENT);
        assert_ne!(cast_ray(&scene, &down, 5, 5), colors::TRANSPARENT);
    }

    #[test]
    fn cast_ray_output_is_clamped_and_finite() {
        let mut scene = floor_scene();
        // make the sphere a glass ball so transmission and the critical
        // angle fallback both run
        scene.primitives[1].surface_mut().material = Material {
            k_transmittance: 1.0,
            k_specular: 0.0,
            ior: 1.5,
            ..Material::default()
        };

        for x in -8..=8 {
            let origin = Vec3::new(x as f64 / 8.0, 2.0, 3.0);
            let r = ray(origin, Vec3::new(0.0, 0.0, -1.0));
            let c = cast_ray(&scene, &r, 0, 4);
            for channel in [c.r, c.g, c.b, c.a] {
                assert!(channel.is_finite());
                assert!((0.0..=1.0).contains(&channel));
            }
        }
    }

    #[test]
    fn directional_light_matches_distant_positional() {
        let scene = floor_scene();
        let point = Vec3::new(2.0, 0.0, 1.0);

        let directional = Light {
            position: Vec4::new(0.0, -1.0, 0.0, 0.0),
            ..Light::default()
        };
        let positional = Light {
            position: Vec4::new(0.0, 1e9, 0.0, 1.0),
            ..Light::default()
        };

        let (dir_l, dir_dist) = light_vector(&scene, &directional, point);
        let (pos_l, pos_dist) = light_vector(&scene, &positional, point);
        assert!((dir_l - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-9);
        assert!((dir_l - pos_l).norm() < 1e-8);
        assert!(dir_dist.is_infinite());
        assert!(pos_dist.is_finite());
    }
}
