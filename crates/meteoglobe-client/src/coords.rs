//! Geographic to scene-space coordinate conversion.
//!
//! The globe is a unit-ish sphere at the origin; everything that needs a 3D
//! point on or above it (surface markers, border lines, fly-to camera
//! destinations) goes through the same conversion so they stay aligned.

use bevy::prelude::*;
use glam::DVec3;

/// A geographic position in degrees.
///
/// Latitude in [-90, 90], longitude in [-180, 180]. Stored as-is and
/// converted to Cartesian points on demand, since the radius differs per use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Project onto a sphere of the given radius.
    ///
    /// Equirectangular-to-sphere mapping: the prime meridian faces -X and
    /// latitude 90 maps to +Y. Computed in f64 and narrowed at the end, so a
    /// given (lat, lon, radius) triple always produces the same bits.
    pub fn to_cartesian(self, radius: f64) -> Vec3 {
        let phi = (90.0 - self.lat).to_radians();
        let theta = (self.lon + 180.0).to_radians();
        DVec3::new(
            -(radius * phi.sin() * theta.cos()),
            radius * phi.cos(),
            radius * phi.sin() * theta.sin(),
        )
        .as_vec3()
    }
}

impl From<meteoglobe::GeoPoint> for GeoCoordinate {
    fn from(point: meteoglobe::GeoPoint) -> Self {
        Self::new(point.lat, point.lon)
    }
}
