pub use config::Config;
pub use controller::{Controller, ControllerState};
pub use ensemble::{run_ensemble, run_single, Comparison, ComparisonStats, GainStats};
pub use generator::{IncidentEvent, TrafficGenerator};
pub use road::{Metrics, Road, Scenario, TrajectorySample};
pub use sensor::{SensorNetwork, SensorSnapshot};
pub use simulation::TwinSimulation;
pub use vehicle::Vehicle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
mod controller;
mod ensemble;
mod generator;
mod road;
mod sensor;
mod simulation;
mod vehicle;

/// Unique ID of a [Vehicle]. Twin vehicles on the two roads share an ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleId(pub u64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
