/// Unit quaternion used for the cosmetic rolling rotation of marbles.
/// Serialized as `[x, y, z, w]`, which is what the browser overlay expects.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Rotation of `angle` radians around a unit `axis`.
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> Self {
        let half = angle * 0.5;
        let s = half.sin();
        Self {
            x: axis[0] * s,
            y: axis[1] * s,
            z: axis[2] * s,
            w: half.cos(),
        }
    }

    /// Hamilton product `self * rhs` (apply `rhs` first, then `self`).
    pub fn mul(self, rhs: Quat) -> Quat {
        let a = self;
        let b = rhs;
        Quat {
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y + a.y * b.w + a.z * b.x - a.x * b.z,
            z: a.w * b.z + a.z * b.w + a.x * b.y - a.y * b.x,
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        }
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Quat::IDENTITY
    }
}

impl From<[f64; 4]> for Quat {
    fn from(v: [f64; 4]) -> Self {
        Quat {
            x: v[0],
            y: v[1],
            z: v[2],
            w: v[3],
        }
    }
}

impl From<Quat> for [f64; 4] {
    fn from(q: Quat) -> Self {
        [q.x, q.y, q.z, q.w]
    }
}

/// Rotation a ball of `radius` picks up from rolling one step with velocity (vx, vy).
///
/// Rolling without slipping: the spin axis lies in the board plane,
/// perpendicular to the velocity, and the angle grows with speed / radius.
/// A resting ball gets the identity.
pub fn rolling_rotation(vx: f64, vy: f64, radius: f64) -> Quat {
    let speed = (vx * vx + vy * vy).sqrt();
    if speed == 0.0 {
        return Quat::IDENTITY;
    }
    let axis = [-vy / speed, vx / speed, 0.0];
    let theta = speed / radius / 10.0;
    Quat::from_axis_angle(axis, theta)
}
