//! Repeated independent runs for statistical comparison of the twin roads.

use crate::config::Config;
use crate::road::Metrics;
use crate::simulation::TwinSimulation;
use itertools::{Itertools, MinMaxResult};
use log::info;
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::Serialize;

/// The relative improvement of the WaveBreaker road over the Chaos road.
/// Positive values mean WaveBreaker did better.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Comparison {
    /// CO2 saving in percent.
    pub co2_gain_pct: f64,
    /// Fuel saving in percent.
    pub fuel_gain_pct: f64,
    /// Travel time saving in percent.
    pub time_gain_pct: f64,
    /// The number of vehicles which entered the Chaos road.
    pub vehicle_count: usize,
}

impl Comparison {
    /// Compares two sets of road metrics.
    pub fn between(chaos: &Metrics, wavebreaker: &Metrics) -> Self {
        Self {
            co2_gain_pct: gain(chaos.total_co2_kg, wavebreaker.total_co2_kg),
            fuel_gain_pct: gain(chaos.total_fuel_liters, wavebreaker.total_fuel_liters),
            time_gain_pct: gain(chaos.avg_travel_time, wavebreaker.avg_travel_time),
            vehicle_count: chaos.vehicle_count,
        }
    }
}

/// The relative reduction from `baseline` to `value` in percent, or 0 without a baseline.
fn gain(baseline: f64, value: f64) -> f64 {
    if baseline > 0.0 {
        (baseline - value) / baseline * 100.0
    } else {
        0.0
    }
}

/// Summary statistics of one gain over an ensemble.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GainStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl GainStats {
    fn from_values(values: impl Iterator<Item = f64> + Clone) -> Self {
        let count = values.clone().count();
        if count == 0 {
            return Self::default();
        }
        let mean = values.clone().sum::<f64>() / count as f64;
        let (min, max) = match values.minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => (0.0, 0.0),
            MinMaxResult::OneElement(x) => (x, x),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        Self { mean, min, max }
    }
}

/// Summary statistics of an ensemble.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ComparisonStats {
    pub runs: usize,
    pub co2: GainStats,
    pub fuel: GainStats,
    pub time: GainStats,
}

impl ComparisonStats {
    /// Summarises the results of an ensemble.
    pub fn from_runs(runs: &[Comparison]) -> Self {
        Self {
            runs: runs.len(),
            co2: GainStats::from_values(runs.iter().map(|c| c.co2_gain_pct)),
            fuel: GainStats::from_values(runs.iter().map(|c| c.fuel_gain_pct)),
            time: GainStats::from_values(runs.iter().map(|c| c.time_gain_pct)),
        }
    }
}

/// Runs one complete simulation with its own random stream.
pub fn run_single(config: &Config, penetration_rate: f64, seed: u64, duration: f64) -> Comparison {
    let mut sim = TwinSimulation::new(config, seed);
    sim.set_penetration_rate(penetration_rate);
    sim.run_until(duration);
    sim.comparison()
}

/// Runs one simulation per seed on the rayon thread pool and returns the
/// comparisons in seed order. No state is shared between runs.
pub fn run_ensemble(
    config: &Config,
    penetration_rate: f64,
    seeds: &[u64],
    duration: f64,
) -> Vec<Comparison> {
    info!(
        "Running {} simulations of {:.0} s at {:.0}% connected on {} workers",
        seeds.len(),
        duration,
        penetration_rate * 100.0,
        rayon::current_num_threads()
    );
    seeds
        .par_iter()
        .map(|&seed| run_single(config, penetration_rate, seed, duration))
        .collect()
}
