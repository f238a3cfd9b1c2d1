//! Roadside sensors which bin vehicles into fixed-length segments.

use crate::config::Config;
use crate::Vehicle;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::sync::Arc;

/// Metres per kilometre.
const M_PER_KM: f64 = 1000.0;

/// The state of every sensor segment at one instant.
///
/// Snapshots are never modified after they are published; each update
/// replaces the road's snapshot as a whole.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SensorSnapshot {
    /// Vehicle density per segment in veh/km.
    pub densities: Vec<f64>,
    /// Mean vehicle speed per segment in m/s. Empty segments report the free-flow speed.
    pub mean_speeds: Vec<f64>,
    /// Number of vehicles per segment.
    pub occupancy: Vec<u32>,
}

impl SensorSnapshot {
    /// A snapshot of an empty road.
    pub fn empty(num_segments: usize, free_speed: f64) -> Self {
        Self {
            densities: vec![0.0; num_segments],
            mean_speeds: vec![free_speed; num_segments],
            occupancy: vec![0; num_segments],
        }
    }

    /// The number of segments.
    pub fn num_segments(&self) -> usize {
        self.occupancy.len()
    }

    /// The mean density over all segments in veh/km.
    pub fn mean_density(&self) -> f64 {
        if self.densities.is_empty() {
            return 0.0;
        }
        self.densities.iter().sum::<f64>() / self.densities.len() as f64
    }
}

/// The sensors along one road.
#[derive(Clone, Debug)]
pub struct SensorNetwork {
    /// The length of each segment in m.
    segment_len: f64,
    /// The number of segments.
    num_segments: usize,
    /// The speed reported for empty segments in m/s.
    free_speed: f64,
    /// The most recently published snapshot.
    snapshot: Arc<SensorSnapshot>,
}

impl SensorNetwork {
    /// Creates a sensor network covering the configured road.
    pub fn new(config: &Config) -> Self {
        let num_segments = config.road.num_segments();
        let free_speed = config.vehicle.max_speed;
        Self {
            segment_len: config.road.sensor_spacing,
            num_segments,
            free_speed,
            snapshot: Arc::new(SensorSnapshot::empty(num_segments, free_speed)),
        }
    }

    /// The length of each segment in m.
    pub fn segment_len(&self) -> f64 {
        self.segment_len
    }

    /// The number of segments.
    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    /// The speed reported for empty segments in m/s.
    pub fn free_speed(&self) -> f64 {
        self.free_speed
    }

    /// The index of the segment containing `pos`, if it is on the road.
    pub fn segment_of(&self, pos: f64) -> Option<usize> {
        segment_index(pos, self.segment_len, self.num_segments)
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<SensorSnapshot> {
        self.snapshot.clone()
    }

    /// Re-reads every segment from the given vehicles and publishes a new snapshot.
    pub fn update<'a>(&mut self, vehicles: impl IntoIterator<Item = &'a Vehicle>) {
        let n = self.num_segments;
        let mut counts = vec![0u32; n];
        let mut speed_sums = vec![0.0; n];

        for vehicle in vehicles {
            if let Some(idx) = self.segment_of(vehicle.pos()) {
                counts[idx] += 1;
                speed_sums[idx] += vehicle.vel();
            }
        }

        let segment_km = self.segment_len / M_PER_KM;
        let densities = counts.iter().map(|&c| c as f64 / segment_km).collect();
        let mean_speeds = counts
            .iter()
            .zip(&speed_sums)
            .map(|(&c, &sum)| if c > 0 { sum / c as f64 } else { self.free_speed })
            .collect();

        self.snapshot = Arc::new(SensorSnapshot {
            densities,
            mean_speeds,
            occupancy: counts,
        });
    }
}

/// Maps a position onto a segment index, discarding positions off either end.
pub(crate) fn segment_index(pos: f64, segment_len: f64, num_segments: usize) -> Option<usize> {
    let idx = (pos / segment_len).floor();
    if idx >= 0.0 && idx < num_segments as f64 {
        Some(idx as usize)
    } else {
        None
    }
}
