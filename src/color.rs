use std::iter::Sum;
use std::ops;

/// An RGBA color with `f32` components. Arithmetic is componentwise and
/// unclamped; accumulation buffers rely on the operators being exact means,
/// so clamping only happens through [`Rgba::clamp`] at the points the
/// shading pipeline calls for it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

#[allow(dead_code)]
pub mod colors {
    use super::Rgba;

    pub const TRANSPARENT: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    pub const BLACK: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Rgba = Rgba {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
}

macro_rules! rgba_op_rgba {
    ($($path:ident)::+, $fn:ident) => {
        impl $($path)::+ for Rgba {
            type Output = Self;
            fn $fn(self, other: Self) -> Self::Output {
                Rgba {
                    r: self.r.$fn(other.r),
                    g: self.g.$fn(other.g),
                    b: self.b.$fn(other.b),
                    a: self.a.$fn(other.a),
                }
            }
        }
    };
}

rgba_op_rgba!(ops::Add, add);
rgba_op_rgba!(ops::Sub, sub);
rgba_op_rgba!(ops::Mul, mul);

impl ops::Mul<f64> for Rgba {
    type Output = Rgba;
    fn mul(self, other: f64) -> Self::Output {
        Rgba {
            r: (f64::from(self.r) * other) as f32,
            g: (f64::from(self.g) * other) as f32,
            b: (f64::from(self.b) * other) as f32,
            a: (f64::from(self.a) * other) as f32,
        }
    }
}

impl ops::Mul<Rgba> for f64 {
    type Output = Rgba;
    fn mul(self, other: Rgba) -> Self::Output {
        other * self
    }
}

impl ops::Div<f64> for Rgba {
    type Output = Rgba;
    fn div(self, other: f64) -> Self::Output {
        self * (1.0 / other)
    }
}

impl Sum<Self> for Rgba {
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = Self>,
    {
        iter.fold(colors::TRANSPARENT, |acc, c| acc + c)
    }
}

impl Rgba {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Rgba {
        Rgba { r, g, b, a }
    }

    /// Grey color with all three channels set to `v` and full alpha
    pub fn grey(v: f32) -> Rgba {
        Rgba::new(v, v, v, 1.0)
    }

    /// Componentwise clamp into `[0, 1]`
    pub fn clamp(self) -> Rgba {
        Rgba {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }

    pub fn from_hex(hex: &str) -> anyhow::Result<Rgba> {
        if !is_hex_format(hex) {
            return Err(anyhow::anyhow!(
                "from_hex() called on a string not formatted as #RRGGBB or #RRGGBBAA: '{}'",
                hex
            ));
        }
        let channel = |range| -> anyhow::Result<f32> {
            Ok(u8::from_str_radix(&hex[range], 16)? as f32 / 255.0)
        };
        let a = if hex.len() == 9 { channel(7..=8)? } else { 1.0 };
        Ok(Rgba {
            r: channel(1..=2)?,
            g: channel(3..=4)?,
            b: channel(5..=6)?,
            a,
        })
    }
}

fn is_hex_format(hex: &str) -> bool {
    hex.starts_with('#')
        && (hex.len() == 7 || hex.len() == 9)
        && hex[1..].chars().all(|d| d.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_is_unclamped() {
        let c = Rgba::new(0.8, 0.8, 0.8, 1.0) + Rgba::new(0.8, 0.0, 0.0, 1.0);
        assert_eq!(c.r, 1.6);
        assert_eq!(c.a, 2.0);
        assert_eq!(c.clamp(), Rgba::new(1.0, 0.8, 0.8, 1.0));
    }

    #[test]
    fn scalar_ops() {
        let c = Rgba::new(0.5, 0.25, 1.0, 1.0) * 2.0;
        assert_eq!(c, Rgba::new(1.0, 0.5, 2.0, 2.0));
        assert_eq!(c / 2.0, Rgba::new(0.5, 0.25, 1.0, 1.0));
    }

    #[test]
    fn hex_parsing() {
        let c = Rgba::from_hex("#FF0000").unwrap();
        assert_eq!(c, Rgba::new(1.0, 0.0, 0.0, 1.0));
        let c = Rgba::from_hex("#00FF0080").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
        assert!(Rgba::from_hex("bad").is_err());
        assert!(Rgba::from_hex("#12345").is_err());
    }

    #[test]
    fn sum_starts_transparent() {
        let total: Rgba = [Rgba::new(0.25, 0.0, 0.0, 1.0); 4].into_iter().sum();
        assert_eq!(total, Rgba::new(1.0, 0.0, 0.0, 4.0));
    }
}
