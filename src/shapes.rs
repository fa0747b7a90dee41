use anyhow::{Context, Result};
use enum_dispatch::enum_dispatch;
use std::ops;

use crate::color::{colors, Rgba};
use crate::constants::{DEFAULT_IOR, DEFAULT_SHININESS, ROOT_TOLERANCE, TOLERANCE};
use crate::mat::Mat4;
use crate::raytracer::Ray;
use crate::vec::{nearly_equal, Vec3, Vec4};

/// Bitmask selecting which renderers consume a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMask(u8);

#[allow(dead_code)]
impl TargetMask {
    pub const NONE: TargetMask = TargetMask(0);
    pub const RAY_TRACER: TargetMask = TargetMask(1);
    pub const PREVIEW: TargetMask = TargetMask(1 << 1);
    pub const ALL: TargetMask = TargetMask(1 | 1 << 1);

    pub fn contains(self, other: TargetMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for TargetMask {
    type Output = TargetMask;
    fn bitor(self, other: TargetMask) -> Self::Output {
        TargetMask(self.0 | other.0)
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub color: Rgba,
    pub ambient: Rgba,
    pub specular: Rgba,
    pub k_ambient: f64,
    pub k_diffuse: f64,
    pub k_specular: f64,
    pub k_reflective: f64,
    pub k_transmittance: f64,
    /// Phong exponent
    pub shininess: f64,
    /// Index of refraction, at least 1
    pub ior: f64,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            color: colors::WHITE,
            ambient: colors::WHITE,
            specular: colors::WHITE,
            k_ambient: 1.0,
            k_diffuse: 1.0,
            k_specular: 1.0,
            k_reflective: 0.0,
            k_transmittance: 0.0,
            shininess: DEFAULT_SHININESS,
            ior: DEFAULT_IOR,
        }
    }
}

/// Intersection record for a single primitive. `t` is the ray parameter,
/// `normal` a unit normal in world space.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f64,
    pub normal: Vec3,
}

/// The state every primitive carries: its material, render-target mask and
/// model transform together with the matrices derived from it.
#[derive(Debug, Clone)]
pub struct SurfaceData {
    pub material: Material,
    pub target: TargetMask,
    /// Opaque handle to a preview mesh resource; never read by ray tracing
    /// code.
    pub preview_mesh: Option<usize>,
    model: Mat4,
    model_inv: Mat4,
    normal_mat: Mat4,
}

impl SurfaceData {
    pub fn new(material: Material, model: Mat4) -> Result<SurfaceData> {
        let mut data = SurfaceData {
            material,
            target: TargetMask::ALL,
            preview_mesh: None,
            model: Mat4::identity(),
            model_inv: Mat4::identity(),
            normal_mat: Mat4::identity(),
        };
        data.set_model(model)?;
        Ok(data)
    }

    pub fn model(&self) -> &Mat4 {
        &self.model
    }

    pub fn model_inv(&self) -> &Mat4 {
        &self.model_inv
    }

    pub fn normal_mat(&self) -> &Mat4 {
        &self.normal_mat
    }

    /// Replaces the model transform and recomputes the derived matrices, so
    /// they are never stale when the next intersection runs
    pub fn set_model(&mut self, model: Mat4) -> Result<()> {
        let model_inv = model
            .inverse()
            .context("model transform is singular and cannot be inverted")?;
        self.model = model;
        self.normal_mat = model_inv.transpose();
        self.model_inv = model_inv;
        Ok(())
    }
}

/// Smallest ray parameter with `|start + t dir - center| = radius`, ignoring
/// roots closer than `ROOT_TOLERANCE` so a ray leaving a surface does not
/// re-detect it
pub fn ray_sphere(ray: &Ray, center: Vec3, radius: f64) -> Option<f64> {
    let oc = ray.start.xyz() - center;
    let dir = ray.dir.xyz();

    let a = dir.dot(dir);
    let b = 2.0 * oc.dot(dir);
    let c = oc.dot(oc) - radius * radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    let t1 = (-b - root) / (2.0 * a);
    let t2 = (-b + root) / (2.0 * a);
    if t1 >= ROOT_TOLERANCE {
        Some(t1)
    } else if t2 >= ROOT_TOLERANCE {
        Some(t2)
    } else {
        None
    }
}

/// Intersection of a ray (already in the plane's local frame) with the
/// `z = 0` plane. Grazing rays are rejected, as are hits closer than
/// `ROOT_TOLERANCE` so a ray bouncing off the plane does not re-detect it.
pub fn ray_plane(ray_local: &Ray) -> Option<f64> {
    let denominator = ray_local.dir.z;
    if denominator.abs() < ROOT_TOLERANCE {
        return None;
    }
    let t = -ray_local.start.z / denominator;
    if t < ROOT_TOLERANCE {
        None
    } else {
        Some(t)
    }
}

#[enum_dispatch]
pub trait Traceable {
    fn surface(&self) -> &SurfaceData;
    fn surface_mut(&mut self) -> &mut SurfaceData;

    fn intersect(&self, ray: &Ray) -> Option<Hit>;
    fn on_surface(&self, point: Vec3) -> bool;
    fn inside(&self, point: Vec3) -> bool;

    /// Unit world-space normal at a point on the surface
    fn surface_normal(&self, point: Vec3) -> Vec3;

    /// Intersection distance only; negative when there is no hit
    fn intersect_t(&self, ray: &Ray) -> f64 {
        self.intersect(ray).map_or(-1.0, |hit| hit.t)
    }

    /// Whether a ray originates within the primitive or exits through it
    fn inside_ray(&self, ray: &Ray) -> bool {
        if self.inside(ray.start.xyz()) {
            true
        } else {
            ray.dir.xyz().dot(self.surface_normal(ray.start.xyz())) > 0.0
        }
    }

    fn material(&self) -> &Material {
        &self.surface().material
    }

    fn target(&self) -> TargetMask {
        self.surface().target
    }

    fn set_model(&mut self, model: Mat4) -> Result<()> {
        self.surface_mut().set_model(model)
    }
}

/// A sphere of radius 1 centered on the local origin; size and placement
/// come from the model transform.
#[derive(Debug, Clone)]
pub struct Sphere {
    data: SurfaceData,
}

impl Sphere {
    pub fn new(material: Material, model: Mat4) -> Result<Sphere> {
        Ok(Sphere {
            data: SurfaceData::new(material, model)?,
        })
    }
}

impl Traceable for Sphere {
    fn surface(&self) -> &SurfaceData {
        &self.data
    }

    fn surface_mut(&mut self) -> &mut SurfaceData {
        &mut self.data
    }

    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let model = self.data.model();
        let world_origin = *model * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let world_radius = (*model * Vec4::new(0.0, 0.0, 1.0, 0.0)).norm();

        let t = ray_sphere(ray, world_origin.xyz(), world_radius)?;
        Some(Hit {
            t,
            normal: self.surface_normal(ray.at(t).xyz()),
        })
    }

    fn on_surface(&self, point: Vec3) -> bool {
        let local = (*self.data.model_inv() * Vec4::point(point)).xyz();
        nearly_equal(local.norm(), 1.0, TOLERANCE)
    }

    fn inside(&self, point: Vec3) -> bool {
        let local = (*self.data.model_inv() * Vec4::point(point)).xyz();
        local.norm() < 1.0
    }

    fn surface_normal(&self, point: Vec3) -> Vec3 {
        let local = *self.data.model_inv() * Vec4::point(point);
        (*self.data.normal_mat() * local).xyz().normalize()
    }
}

/// The infinite `z = 0` plane in its local frame, oriented and placed by
/// the model transform.
#[derive(Debug, Clone)]
pub struct Plane {
    data: SurfaceData,
}

impl Plane {
    pub fn new(material: Material, model: Mat4) -> Result<Plane> {
        Ok(Plane {
            data: SurfaceData::new(material, model)?,
        })
    }

    fn plane_normal(&self) -> Vec3 {
        (*self.data.normal_mat() * Vec4::new(0.0, 0.0, 1.0, 0.0))
            .xyz()
            .normalize()
    }
}

impl Traceable for Plane {
    fn surface(&self) -> &SurfaceData {
        &self.data
    }

    fn surface_mut(&mut self) -> &mut SurfaceData {
        &mut self.data
    }

    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let inv = self.data.model_inv();
        let local = Ray {
            start: *inv * ray.start,
            dir: *inv * ray.dir,
        };

        let t = ray_plane(&local)?;
        Some(Hit {
            t,
            normal: self.plane_normal(),
        })
    }

    fn on_surface(&self, point: Vec3) -> bool {
        let local = (*self.data.model_inv() * Vec4::point(point)).xyz();
        nearly_equal(local.z, 0.0, TOLERANCE)
    }

    fn inside(&self, point: Vec3) -> bool {
        let local = (*self.data.model_inv() * Vec4::point(point)).xyz();
        local.z < 0.0
    }

    fn surface_normal(&self, _point: Vec3) -> Vec3 {
        self.plane_normal()
    }
}

#[enum_dispatch(Traceable)]
#[derive(Debug, Clone)]
pub enum Primitive {
    Sphere,
    Plane,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(start: Vec3, dir: Vec3) -> Ray {
        Ray {
            start: Vec4::point(start),
            dir: Vec4::dir(dir),
        }
    }

    #[test]
    fn sphere_head_on() {
        let sphere = Sphere::new(Material::default(), Mat4::identity()).unwrap();
        let hit = sphere
            .intersect(&ray(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0)))
            .unwrap();
        assert!((hit.t - 4.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn sphere_scaled_and_translated() {
        let model =
            Mat4::translate(Vec3::new(0.0, 0.0, -3.0)) * Mat4::scale(Vec3::new(2.0, 2.0, 2.0));
        let sphere = Sphere::new(Material::default(), model).unwrap();
        let hit = sphere
            .intersect(&ray(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0)))
            .unwrap();
        assert!((hit.t - 1.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn sphere_miss_reports_negative_t() {
        let sphere = Sphere::new(Material::default(), Mat4::identity()).unwrap();
        let t = sphere.intersect_t(&ray(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 1.0, 0.0)));
        assert!(t < 0.0);
    }

    #[test]
    fn ray_leaving_surface_does_not_self_intersect() {
        let sphere = Sphere::new(Material::default(), Mat4::identity()).unwrap();
        let r = ray(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(sphere.intersect(&r).is_none());
    }

    #[test]
    fn plane_head_on_and_grazing() {
        let plane = Plane::new(Material::default(), Mat4::identity()).unwrap();
        let hit = plane
            .intersect(&ray(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0)))
            .unwrap();
        assert!((hit.t - 5.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-9);

        let grazing = ray(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(plane.intersect(&grazing).is_none());

        let behind = ray(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(plane.intersect(&behind).is_none());
    }

    #[test]
    fn plane_as_floor() {
        let model =
            Mat4::translate(Vec3::new(0.0, -2.0, 0.0)) * Mat4::align_z(Vec3::new(0.0, 1.0, 0.0));
        let floor = Plane::new(Material::default(), model).unwrap();
        let hit = floor
            .intersect(&ray(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0)))
            .unwrap();
        assert!((hit.t - 5.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn containment_queries() {
        let sphere =
            Sphere::new(Material::default(), Mat4::scale(Vec3::new(2.0, 2.0, 2.0))).unwrap();
        assert!(sphere.inside(Vec3::new(0.0, 0.0, 1.0)));
        assert!(!sphere.inside(Vec3::new(0.0, 0.0, 3.0)));
        assert!(sphere.on_surface(Vec3::new(0.0, 0.0, 2.0)));

        let plane = Plane::new(Material::default(), Mat4::identity()).unwrap();
        assert!(plane.inside(Vec3::new(0.0, 0.0, -1.0)));
        assert!(!plane.inside(Vec3::new(0.0, 0.0, 1.0)));
        assert!(plane.on_surface(Vec3::new(5.0, 5.0, 0.0)));
    }

    #[test]
    fn inside_ray_default() {
        let sphere = Primitive::from(Sphere::new(Material::default(), Mat4::identity()).unwrap());
        // starting inside
        assert!(sphere.inside_ray(&ray(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0))));
        // on the surface, exiting
        assert!(sphere.inside_ray(&ray(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0))));
        // outside, pointing at the sphere
        assert!(!sphere.inside_ray(&ray(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0))));
    }

    #[test]
    fn set_model_refreshes_derived_matrices() {
        let mut sphere = Sphere::new(Material::default(), Mat4::identity()).unwrap();
        sphere
            .set_model(Mat4::translate(Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();
        let hit = sphere
            .intersect(&ray(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        assert!((hit.t - 4.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::new(0.0, -1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn target_mask() {
        assert!(TargetMask::ALL.contains(TargetMask::RAY_TRACER));
        assert!(!TargetMask::PREVIEW.contains(TargetMask::RAY_TRACER));
        assert_eq!(TargetMask::RAY_TRACER | TargetMask::PREVIEW, TargetMask::ALL);
    }
}
