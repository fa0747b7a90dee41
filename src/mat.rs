use std::ops;

use crate::constants::TOLERANCE;
use crate::vec::{Vec3, Vec4};

/// A 4x4 matrix stored row-major, multiplying column vectors (`M * v`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f64; 4]; 4]);

impl Default for Mat4 {
    fn default() -> Self {
        Mat4::identity()
    }
}

impl ops::Mul for Mat4 {
    type Output = Mat4;
    fn mul(self, other: Mat4) -> Self::Output {
        let mut result = [[0.0; 4]; 4];
        for (i, row) in result.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.0[i][k] * other.0[k][j]).sum();
            }
        }
        Mat4(result)
    }
}

impl ops::Mul<Vec4> for Mat4 {
    type Output = Vec4;
    fn mul(self, v: Vec4) -> Self::Output {
        let row = |i: usize| {
            self.0[i][0] * v.x + self.0[i][1] * v.y + self.0[i][2] * v.z + self.0[i][3] * v.w
        };
        Vec4::new(row(0), row(1), row(2), row(3))
    }
}

impl Mat4 {
    pub fn identity() -> Mat4 {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Mat4(m)
    }

    pub fn transpose(&self) -> Mat4 {
        let mut result = [[0.0; 4]; 4];
        for (i, row) in result.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.0[j][i];
            }
        }
        Mat4(result)
    }

    /// Inverse by cofactor expansion; `None` when the matrix is singular
    pub fn inverse(&self) -> Option<Mat4> {
        let m: Vec<f64> = self.0.iter().flatten().copied().collect();
        let mut inv = [0.0f64; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14]
            + m[13] * m[6] * m[11]
            - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14]
            - m[12] * m[6] * m[11]
            + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13]
            + m[12] * m[5] * m[11]
            - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13]
            - m[12] * m[5] * m[10]
            + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14]
            - m[13] * m[2] * m[11]
            + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14]
            + m[12] * m[2] * m[11]
            - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13]
            - m[12] * m[1] * m[11]
            + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13]
            + m[12] * m[1] * m[10]
            - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14]
            + m[13] * m[2] * m[7]
            - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14]
            - m[12] * m[2] * m[7]
            + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13]
            + m[12] * m[1] * m[7]
            - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13]
            - m[12] * m[1] * m[6]
            + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10]
            - m[9] * m[2] * m[7]
            + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10]
            + m[8] * m[2] * m[7]
            - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9]
            - m[8] * m[1] * m[7]
            + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9]
            + m[8] * m[1] * m[6]
            - m[8] * m[2] * m[5];

        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        // a NaN determinant (degenerate input) must also land here
        if !(det.abs() >= f64::MIN_POSITIVE) {
            return None;
        }

        let mut result = [[0.0; 4]; 4];
        for (i, row) in result.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = inv[i * 4 + j] / det;
            }
        }
        Some(Mat4(result))
    }

    pub fn translate(v: Vec3) -> Mat4 {
        let mut m = Mat4::identity();
        m.0[0][3] = v.x;
        m.0[1][3] = v.y;
        m.0[2][3] = v.z;
        m
    }

    pub fn scale(v: Vec3) -> Mat4 {
        let mut m = Mat4::identity();
        m.0[0][0] = v.x;
        m.0[1][1] = v.y;
        m.0[2][2] = v.z;
        m
    }

    /// The angle is in radians
    pub fn rotate_x(angle: f64) -> Mat4 {
        let (s, c) = angle.sin_cos();
        Mat4([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, c, -s, 0.0],
            [0.0, s, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// The angle is in radians
    pub fn rotate_y(angle: f64) -> Mat4 {
        let (s, c) = angle.sin_cos();
        Mat4([
            [c, 0.0, s, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-s, 0.0, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// The angle is in radians
    pub fn rotate_z(angle: f64) -> Mat4 {
        let (s, c) = angle.sin_cos();
        Mat4([
            [c, -s, 0.0, 0.0],
            [s, c, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Rotation carrying the local `+z` axis onto `axis` (Rodrigues form)
    pub fn align_z(axis: Vec3) -> Mat4 {
        let a = Vec3::new(0.0, 0.0, 1.0);
        let b = axis.normalize();
        let c = a.dot(b);

        if (c + 1.0).abs() < TOLERANCE {
            // antiparallel, flip around x
            return Mat4::rotate_x(std::f64::consts::PI);
        }

        let v = a.cross(b);
        let k = 1.0 / (1.0 + c);

        Mat4([
            [
                1.0 + k * (-v.y * v.y - v.z * v.z),
                -v.z + k * v.x * v.y,
                v.y + k * v.x * v.z,
                0.0,
            ],
            [
                v.z + k * v.x * v.y,
                1.0 + k * (-v.x * v.x - v.z * v.z),
                -v.x + k * v.y * v.z,
                0.0,
            ],
            [
                -v.y + k * v.x * v.z,
                v.x + k * v.y * v.z,
                1.0 + k * (-v.x * v.x - v.y * v.y),
                0.0,
            ],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Right-handed perspective projection; `fov_y` is in degrees
    pub fn perspective(fov_y: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
        let f = 1.0 / (fov_y.to_radians() / 2.0).tan();
        Mat4([
            [f / aspect, 0.0, 0.0, 0.0],
            [0.0, f, 0.0, 0.0],
            [
                0.0,
                0.0,
                (far + near) / (near - far),
                2.0 * far * near / (near - far),
            ],
            [0.0, 0.0, -1.0, 0.0],
        ])
    }

    /// World-to-camera view matrix for a camera at `eye` looking at `center`
    pub fn look_at(eye: Vec3, center: Vec3, up: Vec3) -> Mat4 {
        let f = (center - eye).normalize();
        let s = f.cross(up.normalize()).normalize();
        let u = s.cross(f);
        Mat4([
            [s.x, s.y, s.z, -s.dot(eye)],
            [u.x, u.y, u.z, -u.dot(eye)],
            [-f.x, -f.y, -f.z, f.dot(eye)],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        for i in 0..4 {
            for j in 0..4 {
                assert!(
                    (a.0[i][j] - b.0[i][j]).abs() < 1e-9,
                    "mismatch at ({}, {}): {:?} vs {:?}",
                    i,
                    j,
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn inverse_roundtrip() {
        let m = Mat4::translate(Vec3::new(1.0, -2.0, 3.0))
            * Mat4::rotate_y(0.7)
            * Mat4::scale(Vec3::new(2.0, 2.0, 2.0));
        let inv = m.inverse().unwrap();
        assert_mat_eq(m * inv, Mat4::identity());
        assert_mat_eq(inv * m, Mat4::identity());
    }

    #[test]
    fn singular_has_no_inverse() {
        let m = Mat4::scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(m.inverse().is_none());
    }

    #[test]
    fn transforms_act_on_points_and_directions() {
        let t = Mat4::translate(Vec3::new(5.0, 0.0, 0.0));
        let p = t * Vec4::point(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(p.xyz(), Vec3::new(6.0, 1.0, 1.0));
        // directions ignore translation
        let d = t * Vec4::dir(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(d.xyz(), Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn align_z_carries_z_onto_axis() {
        for axis in [
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
        ] {
            let m = Mat4::align_z(axis);
            let z = (m * Vec4::dir(Vec3::new(0.0, 0.0, 1.0))).xyz();
            let axis = axis.normalize();
            assert!((z - axis).norm() < 1e-9, "{:?} != {:?}", z, axis);
        }
    }

    #[test]
    fn look_at_maps_eye_to_origin() {
        let eye = Vec3::new(0.0, 0.0, 3.0);
        let view = Mat4::look_at(eye, Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let p = view * Vec4::point(eye);
        assert!(p.xyz().norm() < 1e-9);
        // the target ends up on the -z axis in camera space
        let c = view * Vec4::point(Vec3::new(0.0, 0.0, 0.0));
        assert!((c.xyz() - Vec3::new(0.0, 0.0, -3.0)).norm() < 1e-9);
    }
}
