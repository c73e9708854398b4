//! Vector helpers and easing curves used by the integrator and transitions.

use nalgebra::Vector3;

use super::constants::EPSILON;

pub type Vec3 = Vector3<f32>;

/// Component of `v` along `dir` (dir is normalized here).
pub fn extract_dot_vector(v: &Vec3, dir: &Vec3) -> Vec3 {
    match normalized(dir) {
        Some(d) => d * v.dot(&d),
        None => Vec3::zeros(),
    }
}

/// `v` with its component along `dir` removed.
pub fn remove_dot_vector(v: &Vec3, dir: &Vec3) -> Vec3 {
    v - extract_dot_vector(v, dir)
}

pub fn project_on_plane(v: &Vec3, plane_normal: &Vec3) -> Vec3 {
    remove_dot_vector(v, plane_normal)
}

/// Projection of `v` onto `onto` (zero when `onto` is degenerate).
pub fn project(v: &Vec3, onto: &Vec3) -> Vec3 {
    extract_dot_vector(v, onto)
}

pub fn normalized(v: &Vec3) -> Option<Vec3> {
    let len = v.norm();
    if len > EPSILON {
        Some(v / len)
    } else {
        None
    }
}

/// Normalized or zero.
pub fn normalize_or_zero(v: &Vec3) -> Vec3 {
    normalized(v).unwrap_or_else(Vec3::zeros)
}

pub fn clamp_magnitude(v: &Vec3, max: f32) -> Vec3 {
    let len = v.norm();
    if len > max && len > EPSILON {
        v * (max / len)
    } else {
        *v
    }
}

/// Angle between two vectors in degrees. Degenerate input yields 0.
pub fn angle_deg(a: &Vec3, b: &Vec3) -> f32 {
    let denom = a.norm() * b.norm();
    if denom <= EPSILON {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Moves `current` toward `target` by at most `max_delta`.
pub fn move_towards(current: &Vec3, target: &Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let dist = delta.norm();
    if dist <= max_delta || dist <= EPSILON {
        *target
    } else {
        current + delta / dist * max_delta
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn lerp_vec(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

/// Symmetric quadratic S-curve; ease_in_out(0.5) == 0.5.
pub fn ease_in_out(x: f32) -> f32 {
    if x < 0.5 {
        let s = x * 2.0;
        0.5 * s * s
    } else {
        let inv = 1.0 - (x - 0.5) * 2.0;
        0.5 * (1.0 - inv * inv) + 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_in_out_is_symmetric() {
        assert_eq!(ease_in_out(0.0), 0.0);
        assert!((ease_in_out(0.5) - 0.5).abs() < 1e-6);
        assert!((ease_in_out(1.0) - 1.0).abs() < 1e-6);
        for i in 0..=10 {
            let x = i as f32 / 10.0;
            let mirrored = 1.0 - ease_in_out(1.0 - x);
            assert!((ease_in_out(x) - mirrored).abs() < 1e-5, "x={}", x);
        }
    }

    #[test]
    fn test_remove_dot_strips_axis() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let r = remove_dot_vector(&v, &Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(r, Vec3::new(1.0, 0.0, 3.0));
    }

    #[test]
    fn test_move_towards_stops_at_target() {
        let v = move_towards(&Vec3::new(1.0, 0.0, 0.0), &Vec3::zeros(), 5.0);
        assert_eq!(v, Vec3::zeros());
        let v = move_towards(&Vec3::new(10.0, 0.0, 0.0), &Vec3::zeros(), 2.0);
        assert!((v.x - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_between_up_and_slope() {
        let up = Vec3::y();
        let tilt = 85.0_f32.to_radians();
        let normal = Vec3::new(tilt.sin(), tilt.cos(), 0.0);
        assert!((angle_deg(&normal, &up) - 85.0).abs() < 1e-3);
    }

    #[test]
    fn test_clamp_magnitude_keeps_direction() {
        let v = clamp_magnitude(&Vec3::new(3.0, 0.0, 4.0), 1.0);
        assert!((v.norm() - 1.0).abs() < 1e-6);
        assert!((v.x - 0.6).abs() < 1e-6);
    }
}
