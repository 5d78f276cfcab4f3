//! Coordinates, great-circle distance and the per-player position table.
//!
//! Uses the Haversine formula for distances on Earth's surface.

use crate::domain::Timestamp;
use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed proximity threshold at which a seeker catches a runner, in meters
pub const CATCH_RADIUS_M: f64 = 5.0;

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another coordinate, in meters
    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        let a = Point::new(self.lon, self.lat);
        let b = Point::new(other.lon, other.lat);
        a.haversine_distance(&b)
    }
}

/// One position report for one player. Most-recent-by-timestamp wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub player_id: Uuid,
    pub coordinate: Coordinate,
    pub timestamp: Timestamp,
}

impl PositionSample {
    pub fn new(player_id: Uuid, coordinate: Coordinate, timestamp: Timestamp) -> Self {
        Self {
            player_id,
            coordinate,
            timestamp,
        }
    }
}

/// Latest known position per player. No history is retained.
#[derive(Debug, Default, Clone)]
pub struct PositionTable {
    samples: HashMap<Uuid, PositionSample>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a sample, keeping the latest per player.
    ///
    /// Best-effort delivery may reorder or duplicate samples; anything not
    /// strictly newer than the stored sample is dropped. Returns whether the
    /// table changed.
    pub fn apply(&mut self, sample: PositionSample) -> bool {
        match self.samples.get(&sample.player_id) {
            Some(existing) if sample.timestamp <= existing.timestamp => false,
            _ => {
                self.samples.insert(sample.player_id, sample);
                true
            }
        }
    }

    pub fn get(&self, player_id: &Uuid) -> Option<&PositionSample> {
        self.samples.get(player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &PositionSample)> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::offset_east;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_between_known_points() {
        // Munich Marienplatz to Munich Odeonsplatz, roughly 700m
        let a = Coordinate::new(48.1374, 11.5755);
        let b = Coordinate::new(48.1427, 11.5770);
        let d = a.distance_m(&b);
        assert!(d > 550.0 && d < 750.0, "unexpected distance {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Coordinate::new(48.0, 11.0);
        let b = offset_east(a, 42.0);
        assert_relative_eq!(a.distance_m(&b), b.distance_m(&a), epsilon = 1e-9);
    }

    #[test]
    fn test_offset_round_trip() {
        let origin = Coordinate::new(48.0, 11.0);
        let moved = offset_east(origin, 5.0);
        assert_relative_eq!(origin.distance_m(&moved), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_distance() {
        let a = Coordinate::new(48.0, 11.0);
        assert_relative_eq!(a.distance_m(&a), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_table_keeps_latest_sample() {
        let mut table = PositionTable::new();
        let id = Uuid::new_v4();
        let a = Coordinate::new(48.0, 11.0);
        let b = Coordinate::new(48.1, 11.1);

        assert!(table.apply(PositionSample::new(id, a, Timestamp::from_millis(100))));
        assert!(table.apply(PositionSample::new(id, b, Timestamp::from_millis(200))));
        assert_eq!(table.get(&id).unwrap().coordinate, b);
    }

    #[test]
    fn test_table_ignores_stale_sample() {
        let mut table = PositionTable::new();
        let id = Uuid::new_v4();
        let a = Coordinate::new(48.0, 11.0);
        let b = Coordinate::new(48.1, 11.1);

        table.apply(PositionSample::new(id, a, Timestamp::from_millis(200)));

        // Older sample arriving out of order is dropped
        assert!(!table.apply(PositionSample::new(id, b, Timestamp::from_millis(100))));
        // So is an exact duplicate
        assert!(!table.apply(PositionSample::new(id, b, Timestamp::from_millis(200))));
        assert_eq!(table.get(&id).unwrap().coordinate, a);
    }

    #[test]
    fn test_table_tracks_players_independently() {
        let mut table = PositionTable::new();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let c = Coordinate::new(48.0, 11.0);

        table.apply(PositionSample::new(p1, c, Timestamp::from_millis(100)));
        table.apply(PositionSample::new(p2, c, Timestamp::from_millis(50)));

        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut table = PositionTable::new();
        table.apply(PositionSample::new(
            Uuid::new_v4(),
            Coordinate::new(48.0, 11.0),
            Timestamp::from_millis(1),
        ));
        table.clear();
        assert!(table.is_empty());
    }
}
