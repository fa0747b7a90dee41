use anyhow::{Context, Result};

use crate::constants::{DEFAULT_FAR, DEFAULT_FOV_Y, DEFAULT_NEAR, TOLERANCE};
use crate::mat::Mat4;
use crate::raytracer::Ray;
use crate::scene::Scene;
use crate::vec::{nearly_equal, Vec3, Vec4};

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Maps a window-space point (`win.z` of 0 is the near plane, 1 the far
/// plane) back to world space through the given view and projection.
/// `None` when the combined matrix is singular or the point unprojects to
/// infinity.
pub fn unproject(win: Vec3, view: &Mat4, proj: &Mat4, viewport: &Viewport) -> Option<Vec3> {
    let inverse = (*proj * *view).inverse()?;
    unproject_with(win, &inverse, viewport)
}

fn unproject_with(win: Vec3, inverse: &Mat4, viewport: &Viewport) -> Option<Vec3> {
    let ndc = Vec4::new(
        2.0 * (win.x - viewport.x) / viewport.w - 1.0,
        2.0 * (win.y - viewport.y) / viewport.h - 1.0,
        2.0 * win.z - 1.0,
        1.0,
    );
    let world = *inverse * ndc;
    if nearly_equal(world.w, 0.0, TOLERANCE) {
        None
    } else {
        Some(world.xyz() / world.w)
    }
}

/// Generates world-space rays for pixel coordinates by unprojecting each
/// pixel at the near and the far plane.
///
/// Only the aspect ratio of the preview viewport shapes the rays; the pixel
/// grid being traced can have any resolution.
#[derive(Debug, Clone)]
pub struct Camera {
    view: Mat4,
    proj: Mat4,
    aspect: f64,
    inv_viewproj: Mat4,
}

impl Camera {
    pub fn new(view: Mat4, proj: Mat4, aspect: f64) -> Result<Camera> {
        let inv_viewproj = (proj * view)
            .inverse()
            .context("view-projection matrix is singular")?;
        Ok(Camera {
            view,
            proj,
            aspect,
            inv_viewproj,
        })
    }

    /// Camera matching the scene's camera transform, with the default
    /// perspective projection
    pub fn from_scene(scene: &Scene, aspect: f64) -> Result<Camera> {
        let view = scene
            .camera_modelview
            .inverse()
            .context("camera modelview is singular")?;
        let proj = Mat4::perspective(DEFAULT_FOV_Y, aspect, DEFAULT_NEAR, DEFAULT_FAR);
        Camera::new(view, proj, aspect)
    }

    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    pub fn proj(&self) -> &Mat4 {
        &self.proj
    }

    /// World-space ray through pixel `(x, y)` of a `width` by `height`
    /// grid. `y` runs top-down as in the output image and is flipped to the
    /// bottom-up window convention before unprojecting.
    pub fn pixel_ray(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Ray> {
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            w: f64::from(width),
            h: f64::from(width) / self.aspect,
        };

        let win_x = f64::from(x) + 0.5;
        let win_y = f64::from(height - 1 - y) + 0.5;

        let near = unproject_with(Vec3::new(win_x, win_y, 0.0), &self.inv_viewproj, &viewport)?;
        let far = unproject_with(Vec3::new(win_x, win_y, 1.0), &self.inv_viewproj, &viewport)?;

        Some(Ray {
            start: Vec4::point(near),
            dir: Vec4::dir((far - near).normalize()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        Camera::new(
            Mat4::identity(),
            Mat4::perspective(DEFAULT_FOV_Y, 1.0, DEFAULT_NEAR, DEFAULT_FAR),
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn unproject_inverts_projection() {
        let view = Mat4::look_at(
            Vec3::new(0.0, 1.0, 5.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let proj = Mat4::perspective(60.0, 1.5, 0.1, 100.0);
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            w: 300.0,
            h: 200.0,
        };

        let world = Vec3::new(0.3, -0.2, 1.0);
        let clip = proj * view * Vec4::point(world);
        let ndc = clip.xyz() / clip.w;
        let win = Vec3::new(
            (ndc.x + 1.0) / 2.0 * viewport.w + viewport.x,
            (ndc.y + 1.0) / 2.0 * viewport.h + viewport.y,
            (ndc.z + 1.0) / 2.0,
        );

        let back = unproject(win, &view, &proj, &viewport).unwrap();
        assert!((back - world).norm() < 1e-9);
    }

    #[test]
    fn center_pixel_looks_down_negative_z() {
        let camera = test_camera();
        let ray = camera.pixel_ray(4, 4, 9, 9).unwrap();
        assert_eq!(ray.start.w, 1.0);
        assert_eq!(ray.dir.w, 0.0);
        assert!((ray.dir.xyz() - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-9);
        // origin sits on the near plane
        assert!((ray.start.z + DEFAULT_NEAR).abs() < 1e-9);
    }

    #[test]
    fn image_y_axis_points_down() {
        let camera = test_camera();
        let top = camera.pixel_ray(4, 0, 9, 9).unwrap();
        let bottom = camera.pixel_ray(4, 8, 9, 9).unwrap();
        assert!(top.dir.y > 0.0);
        assert!(bottom.dir.y < 0.0);
    }

    #[test]
    fn rays_are_normalized() {
        let camera = test_camera();
        for (x, y) in [(0, 0), (3, 7), (8, 8)] {
            let ray = camera.pixel_ray(x, y, 9, 9).unwrap();
            assert!((ray.dir.xyz().norm() - 1.0).abs() < 1e-12);
        }
    }
}
