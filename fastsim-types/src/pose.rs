//! Rigid-body pose math
//!
//! Poses are a translation plus a unit quaternion. Composition follows the
//! usual frame convention: `a.compose(&b)` is `b` expressed in the frame
//! that `a` is expressed in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Three-component vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn scale(&self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn lerp(&self, other: &Vec3, s: f64) -> Vec3 {
        *self + (*other - *self).scale(s)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Unit quaternion rotation (`w` is the scalar part)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation from roll (about x), pitch (about y) and yaw (about z), applied in that order
    pub fn from_rpy(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();

        Quaternion {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }

    /// Inverse of [`Quaternion::from_rpy`]
    pub fn rpy(&self) -> (f64, f64, f64) {
        let roll = (2.0 * (self.w * self.x + self.y * self.z))
            .atan2(1.0 - 2.0 * (self.x * self.x + self.y * self.y));
        let pitch = (2.0 * (self.w * self.y - self.z * self.x)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (self.w * self.z + self.x * self.y))
            .atan2(1.0 - 2.0 * (self.y * self.y + self.z * self.z));
        (roll, pitch, yaw)
    }

    pub fn dot(&self, other: &Quaternion) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn normalized(&self) -> Quaternion {
        let norm = self.dot(self).sqrt();
        if norm == 0.0 {
            return Quaternion::IDENTITY;
        }
        Quaternion::new(self.w / norm, self.x / norm, self.y / norm, self.z / norm)
    }

    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v).scale(2.0);
        *v + t.scale(self.w) + u.cross(&t)
    }

    /// Spherical interpolation along the shorter arc
    pub fn slerp(&self, other: &Quaternion, s: f64) -> Quaternion {
        let mut end = *other;
        let mut cos_theta = self.dot(other);
        if cos_theta < 0.0 {
            end = Quaternion::new(-end.w, -end.x, -end.y, -end.z);
            cos_theta = -cos_theta;
        }

        if cos_theta > 0.9995 {
            return Quaternion::new(
                self.w + (end.w - self.w) * s,
                self.x + (end.x - self.x) * s,
                self.y + (end.y - self.y) * s,
                self.z + (end.z - self.z) * s,
            )
            .normalized();
        }

        let theta = cos_theta.acos();
        let sin_theta = theta.sin();
        let a = ((1.0 - s) * theta).sin() / sin_theta;
        let b = (s * theta).sin() / sin_theta;
        Quaternion::new(
            a * self.w + b * end.w,
            a * self.x + b * end.x,
            a * self.y + b * end.y,
            a * self.z + b * end.z,
        )
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

/// Rigid transform: rotation followed by translation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Pose3D {
    pub const IDENTITY: Pose3D = Pose3D {
        translation: Vec3::ZERO,
        rotation: Quaternion::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation: rotation.normalized(),
        }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(Vec3::new(x, y, z), Quaternion::from_rpy(roll, pitch, yaw))
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vec3::new(x, y, z), Quaternion::IDENTITY)
    }

    /// `other` (expressed in the frame this pose describes) re-expressed in this pose's parent frame
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            translation: self.rotation.rotate(&other.translation) + self.translation,
            rotation: (self.rotation * other.rotation).normalized(),
        }
    }

    pub fn inverse(&self) -> Pose3D {
        let rotation = self.rotation.conjugate();
        Pose3D {
            translation: -rotation.rotate(&self.translation),
            rotation,
        }
    }

    pub fn rpy(&self) -> (f64, f64, f64) {
        self.rotation.rpy()
    }

    /// `(x, y, z, roll, pitch, yaw)`
    pub fn to_xyz_rpy(&self) -> [f64; 6] {
        let (roll, pitch, yaw) = self.rpy();
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            roll,
            pitch,
            yaw,
        ]
    }

    /// Interpolate between two poses (`s` in `[0, 1]`)
    pub fn interpolate(&self, other: &Pose3D, s: f64) -> Pose3D {
        Pose3D {
            translation: self.translation.lerp(&other.translation, s),
            rotation: self.rotation.slerp(&other.rotation, s),
        }
    }

    /// Equality up to `eps` in translation and rotation (sign of the quaternion ignored)
    pub fn approx_eq(&self, other: &Pose3D, eps: f64) -> bool {
        (self.translation - other.translation).length() <= eps
            && 1.0 - self.rotation.dot(&other.rotation).abs() <= eps
    }
}

impl Mul for Pose3D {
    type Output = Pose3D;

    fn mul(self, rhs: Pose3D) -> Pose3D {
        self.compose(&rhs)
    }
}

impl fmt::Display for Pose3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z, roll, pitch, yaw] = self.to_xyz_rpy();
        write!(
            f,
            "[{x:.3} {y:.3} {z:.3} | {roll:.3} {pitch:.3} {yaw:.3}]"
        )
    }
}

/// Declarative pose as written in world files
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl From<PoseConfig> for Pose3D {
    fn from(cfg: PoseConfig) -> Self {
        Pose3D::from_xyz_rpy(cfg.x, cfg.y, cfg.z, cfg.roll, cfg.pitch, cfg.yaw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_rpy_roundtrip() {
        let q = Quaternion::from_rpy(0.1, -0.4, 2.0);
        let (roll, pitch, yaw) = q.rpy();
        assert!((roll - 0.1).abs() < EPS);
        assert!((pitch + 0.4).abs() < EPS);
        assert!((yaw - 2.0).abs() < EPS);
    }

    #[test]
    fn test_yaw_rotates_x_onto_y() {
        let q = Quaternion::from_rpy(0.0, 0.0, FRAC_PI_2);
        let v = q.rotate(&Vec3::new(1.0, 0.0, 0.0));
        assert!((v - Vec3::new(0.0, 1.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_compose_chain() {
        // Parent turned 90 degrees, child one meter ahead of it
        let parent = Pose3D::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let child = Pose3D::from_translation(1.0, 0.0, 0.0);
        let world = parent * child;
        assert!(world.approx_eq(&Pose3D::from_xyz_rpy(1.0, 1.0, 0.0, 0.0, 0.0, FRAC_PI_2), EPS));
    }

    #[test]
    fn test_inverse_cancels() {
        let p = Pose3D::from_xyz_rpy(0.3, -2.0, 1.5, 0.2, 0.1, -1.2);
        assert!((p * p.inverse()).approx_eq(&Pose3D::identity(), EPS));
        assert!((p.inverse() * p).approx_eq(&Pose3D::identity(), EPS));
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Pose3D::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let b = Pose3D::from_xyz_rpy(2.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let mid = a.interpolate(&b, 0.5);
        assert!(mid.approx_eq(&Pose3D::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, 0.5), 1e-6));
    }

    #[test]
    fn test_pose_config_defaults() {
        let cfg: PoseConfig = PoseConfig { x: 1.0, ..Default::default() };
        let pose: Pose3D = cfg.into();
        assert_eq!(pose.to_xyz_rpy(), [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
