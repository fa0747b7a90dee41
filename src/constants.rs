/// Tolerance with which floating point near-equality is carried out
pub const TOLERANCE: f64 = 1e-7;

/// Smallest intersection distance accepted as a hit, so a ray starting on a
/// surface does not re-detect it
pub const ROOT_TOLERANCE: f64 = 1e-7;

/// Distance transmitted rays are advanced along their direction to escape
/// the surface they originate on
pub const SURFACE_OFFSET: f64 = 1e-3;

/// Index of refraction of the medium between objects (air)
pub const AMBIENT_IOR: f64 = 1.000293;

/// Standard deviation of the per-axis Gaussian light jitter applied between
/// samples
pub const LIGHT_JITTER_SIGMA: f64 = 0.1;

/// Number of work units a supersample grid is split into
pub const WORK_UNITS: usize = 20;

/// Default values for materials
pub const DEFAULT_SHININESS: f64 = 10.0;
pub const DEFAULT_IOR: f64 = 1.53;

/// Default render configuration
pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_SS_FACTOR: u32 = 2;
pub const DEFAULT_MAX_SAMPLES: u32 = 100;

/// max number of recursive calls due to reflection and transmission
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// Default camera projection
pub const DEFAULT_FOV_Y: f64 = 45.0;
pub const DEFAULT_NEAR: f64 = 0.1;
pub const DEFAULT_FAR: f64 = 100.0;

/// Aspect ratio of the preview viewport, used to shape offline rays
pub const DEFAULT_ASPECT: f64 = 16.0 / 9.0;

/// Default values for args
pub const DEFAULT_IMAGE: &str = "output.png";
