//! Simulated pedestrian for driving rounds without real GPS hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

/// Meters of latitude per degree, close enough for short strolls
const M_PER_DEG_LAT: f64 = 111_320.0;

/// Walking pace in meters per step
const STEP_M: f64 = 1.4;

/// How far from the base coordinate a walker may spawn
const SCATTER_M: f64 = 40.0;

/// A random stroll around a base coordinate.
///
/// Each step moves one pace in a slowly drifting heading, so consecutive
/// positions look like someone wandering a park rather than teleporting.
pub struct Walker {
    lat: f64,
    lon: f64,
    heading: f64,
    rng: StdRng,
}

impl Walker {
    /// Spawn at a random point within [`SCATTER_M`] of the base coordinate
    pub fn around(lat: f64, lon: f64) -> Self {
        Self::around_with_rng(lat, lon, StdRng::from_entropy())
    }

    pub fn around_with_rng(lat: f64, lon: f64, mut rng: StdRng) -> Self {
        let bearing = rng.gen_range(0.0..TAU);
        let distance = rng.gen_range(0.0..SCATTER_M);
        let heading = rng.gen_range(0.0..TAU);
        let (lat, lon) = offset(lat, lon, bearing, distance);
        Self {
            lat,
            lon,
            heading,
            rng,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// Advance one pace and return the new position
    pub fn step(&mut self) -> (f64, f64) {
        self.heading += self.rng.gen_range(-0.4..0.4);
        let (lat, lon) = offset(self.lat, self.lon, self.heading, STEP_M);
        self.lat = lat;
        self.lon = lon;
        (lat, lon)
    }
}

/// Flat-earth offset; fine for the tens of meters a demo covers
fn offset(lat: f64, lon: f64, bearing: f64, distance_m: f64) -> (f64, f64) {
    let dlat = bearing.cos() * distance_m / M_PER_DEG_LAT;
    let dlon = bearing.sin() * distance_m / (M_PER_DEG_LAT * lat.to_radians().cos());
    (lat + dlat, lon + dlon)
}
