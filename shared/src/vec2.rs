/// 2D vector utilities for the marble board.
/// Board space: x grows right, y grows down, units are pixels.

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../static/marblegame/generated/")]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Shorthand constructor
pub fn vec2(x: f64, y: f64) -> Vec2 {
    Vec2::new(x, y)
}

/// Dot product
pub fn dot(a: Vec2, b: Vec2) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Vector length
pub fn length(v: Vec2) -> f64 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Euclidean distance between two points
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    length(sub(a, b))
}

/// Normalize vector to unit length.
/// Degenerate input maps to +x so callers always get a usable direction.
pub fn normalize(v: Vec2) -> Vec2 {
    let len = length(v);
    if len < 1e-10 {
        return Vec2::new(1.0, 0.0);
    }
    Vec2::new(v.x / len, v.y / len)
}

/// Scale vector by scalar
pub fn scale(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(v.x * s, v.y * s)
}

/// Add two vectors
pub fn add(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x + b.x, a.y + b.y)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x - b.x, a.y - b.y)
}

/// Counter-clockwise perpendicular
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Clamp a point into the rectangle [0, width] x [0, height].
pub fn clamp_to_rect(p: Vec2, width: f64, height: f64) -> Vec2 {
    Vec2::new(p.x.clamp(0.0, width), p.y.clamp(0.0, height))
}

/// Cap the length of v at max_len, keeping its direction.
pub fn cap_length(v: Vec2, max_len: f64) -> Vec2 {
    let len = length(v);
    if len > max_len {
        scale(normalize(v), max_len)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec2_close(actual: Vec2, expected: Vec2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-9 && (actual.y - expected.y).abs() < 1e-9,
            "Expected {:?} to be close to {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn dot_orthogonal_is_zero() {
        assert_eq!(dot(vec2(1.0, 0.0), vec2(0.0, 1.0)), 0.0);
    }

    #[test]
    fn dot_antiparallel_is_negative() {
        assert_eq!(dot(vec2(2.0, 0.0), vec2(-3.0, 0.0)), -6.0);
    }

    #[test]
    fn length_of_3_4_is_5() {
        assert_eq!(length(vec2(3.0, 4.0)), 5.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = vec2(1.0, 2.0);
        let b = vec2(4.0, 6.0);
        assert_eq!(distance(a, b), 5.0);
        assert_eq!(distance(b, a), 5.0);
    }

    #[test]
    fn normalize_returns_unit_vector() {
        let v = normalize(vec2(3.0, 4.0));
        assert!((length(v) - 1.0).abs() < 1e-12);
        assert_vec2_close(v, vec2(0.6, 0.8));
    }

    #[test]
    fn normalize_zero_returns_unit() {
        let v = normalize(Vec2::ZERO);
        assert_eq!(length(v), 1.0);
    }

    #[test]
    fn perp_is_orthogonal() {
        let v = vec2(0.3, -1.7);
        assert_eq!(dot(v, perp(v)), 0.0);
    }

    #[test]
    fn clamp_to_rect_pins_each_axis() {
        assert_vec2_close(clamp_to_rect(vec2(-5.0, 700.0), 600.0, 480.0), vec2(0.0, 480.0));
        assert_vec2_close(clamp_to_rect(vec2(650.0, -1.0), 600.0, 480.0), vec2(600.0, 0.0));
        assert_vec2_close(clamp_to_rect(vec2(10.0, 20.0), 600.0, 480.0), vec2(10.0, 20.0));
    }

    #[test]
    fn cap_length_keeps_short_vectors() {
        assert_vec2_close(cap_length(vec2(3.0, 4.0), 10.0), vec2(3.0, 4.0));
    }

    #[test]
    fn cap_length_shortens_long_vectors() {
        let capped = cap_length(vec2(30.0, 40.0), 10.0);
        assert!((length(capped) - 10.0).abs() < 1e-9);
        assert_vec2_close(capped, vec2(6.0, 8.0));
    }

    #[test]
    fn serializes_as_xy_object() {
        let json = serde_json::to_string(&vec2(1.5, -2.0)).unwrap();
        assert_eq!(json, r#"{"x":1.5,"y":-2.0}"#);
    }
}
