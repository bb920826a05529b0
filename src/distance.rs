//! Station distance oracle.
//!
//! Shortest-path distances from every output station to every waypoint are
//! computed once by the routing layer and consumed here as a lookup table.
//! The oracle is constructed once and shared by reference with every
//! strategy; it is never global state.
//!
//! The table can be persisted as plain text, one tab-separated
//! `(station_waypoint, waypoint, distance)` triple per line, and reloaded
//! wholesale at startup.
//!
//! When an entry is missing the oracle falls back to grid Manhattan
//! distance plus a fixed penalty for waypoints on a different tier.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read, Write};

use tracing::warn;

use crate::models::WaypointId;

/// Grid coordinates of a waypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
    /// Warehouse tier (floor). Distances across tiers are penalized.
    pub tier: u32,
}

/// Precomputed station-to-waypoint shortest distances with a Manhattan
/// fallback.
#[derive(Debug, Clone, Default)]
pub struct DistanceOracle {
    table: BTreeMap<WaypointId, BTreeMap<WaypointId, f64>>,
    coords: BTreeMap<WaypointId, GridPoint>,
    wrong_tier_penalty: f64,
}

impl DistanceOracle {
    /// Creates an empty oracle with the given wrong-tier penalty.
    pub fn new(wrong_tier_penalty: f64) -> Self {
        Self {
            table: BTreeMap::new(),
            coords: BTreeMap::new(),
            wrong_tier_penalty,
        }
    }

    /// Registers grid coordinates for a waypoint (used by the fallback).
    pub fn with_coord(mut self, waypoint: WaypointId, x: f64, y: f64, tier: u32) -> Self {
        self.coords.insert(waypoint, GridPoint { x, y, tier });
        self
    }

    /// Records an exact shortest-path distance.
    pub fn with_distance(mut self, station_wp: WaypointId, waypoint: WaypointId, d: f64) -> Self {
        self.insert(station_wp, waypoint, d);
        self
    }

    /// Records an exact shortest-path distance.
    pub fn insert(&mut self, station_wp: WaypointId, waypoint: WaypointId, d: f64) {
        self.table.entry(station_wp).or_default().insert(waypoint, d);
    }

    /// Shortest-path distance from a station waypoint to any waypoint.
    ///
    /// Falls back to [`DistanceOracle::manhattan`] when the pair was never
    /// recorded.
    pub fn distance(&self, station_wp: WaypointId, waypoint: WaypointId) -> f64 {
        if let Some(d) = self.table.get(&station_wp).and_then(|row| row.get(&waypoint)) {
            return *d;
        }
        warn!(%station_wp, %waypoint, "distance entry missing, using manhattan fallback");
        self.manhattan(station_wp, waypoint)
    }

    /// Grid Manhattan distance between two waypoints, plus the wrong-tier
    /// penalty when they lie on different tiers. Unknown coordinates are
    /// treated as maximally distant (penalty value).
    pub fn manhattan(&self, a: WaypointId, b: WaypointId) -> f64 {
        match (self.coords.get(&a), self.coords.get(&b)) {
            (Some(pa), Some(pb)) => {
                let base = (pa.x - pb.x).abs() + (pa.y - pb.y).abs();
                if pa.tier == pb.tier {
                    base
                } else {
                    base + self.wrong_tier_penalty
                }
            }
            _ => self.wrong_tier_penalty,
        }
    }

    /// Writes the exact-distance table, one tab-separated triple per line.
    pub fn save<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (station_wp, row) in &self.table {
            for (waypoint, d) in row {
                writeln!(writer, "{}\t{}\t{}", station_wp.0, waypoint.0, d)?;
            }
        }
        Ok(())
    }

    /// Loads tab-separated triples into the table, merging with existing
    /// entries. Malformed lines are an error.
    pub fn load<R: Read>(&mut self, reader: R) -> io::Result<()> {
        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let parsed = (|| {
                let station: u32 = fields.next()?.trim().parse().ok()?;
                let waypoint: u32 = fields.next()?.trim().parse().ok()?;
                let d: f64 = fields.next()?.trim().parse().ok()?;
                Some((station, waypoint, d))
            })();
            match parsed {
                Some((station, waypoint, d)) => {
                    self.insert(WaypointId(station), WaypointId(waypoint), d);
                }
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("malformed distance line {}: {line:?}", lineno + 1),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> DistanceOracle {
        DistanceOracle::new(100.0)
            .with_coord(WaypointId(1), 0.0, 0.0, 0)
            .with_coord(WaypointId(2), 3.0, 4.0, 0)
            .with_coord(WaypointId(3), 1.0, 1.0, 1)
            .with_distance(WaypointId(1), WaypointId(2), 9.5)
    }

    #[test]
    fn test_exact_lookup() {
        assert_eq!(oracle().distance(WaypointId(1), WaypointId(2)), 9.5);
    }

    #[test]
    fn test_missing_entry_falls_back_to_manhattan() {
        let o = oracle();
        // No recorded entry for (2, 1); coords give |3| + |4| = 7.
        assert_eq!(o.distance(WaypointId(2), WaypointId(1)), 7.0);
    }

    #[test]
    fn test_wrong_tier_penalty() {
        let o = oracle();
        assert_eq!(o.manhattan(WaypointId(1), WaypointId(3)), 2.0 + 100.0);
    }

    #[test]
    fn test_unknown_coords_use_penalty() {
        let o = oracle();
        assert_eq!(o.manhattan(WaypointId(1), WaypointId(42)), 100.0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let o = oracle();
        let mut buf = Vec::new();
        o.save(&mut buf).unwrap();

        let mut reloaded = DistanceOracle::new(100.0);
        reloaded.load(buf.as_slice()).unwrap();
        assert_eq!(reloaded.distance(WaypointId(1), WaypointId(2)), 9.5);
    }

    #[test]
    fn test_load_rejects_malformed_line() {
        let mut o = DistanceOracle::new(0.0);
        let err = o.load("1\tnot-a-number\t3.0\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
