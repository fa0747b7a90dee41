//! A Whitted-style recursive ray tracer with progressive refinement: camera
//! rays are traced against analytic primitives, shaded with Phong lighting,
//! shadow, reflection and transmission rays, then supersampled frames are
//! averaged into the output image one sample at a time.

pub mod camera;
pub mod color;
pub mod constants;
pub mod framebuffer;
pub mod mat;
pub mod raytracer;
pub mod render;
pub mod scene;
pub mod shapes;
pub mod vec;
