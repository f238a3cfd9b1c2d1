//! Simulation parameters.
//!
//! A [Config] is built once before a simulation starts and passed by reference
//! into every component's constructor. Each component copies the parameters it
//! needs, so nothing refers back to a shared global.

use anyhow::ensure;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Converts a speed in km/h to m/s.
pub fn kmh(speed: f64) -> f64 {
    speed / 3.6
}

/// The complete set of simulation parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Config {
    pub physics: PhysicsParams,
    pub vehicle: VehicleSpecs,
    pub road: RoadSpecs,
    pub controller: ControllerParams,
    pub sim: SimSettings,
    pub incident: IncidentParams,
}

/// Car following and emissions parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PhysicsParams {
    /// The free-flow speed drivers aim for, in m/s.
    pub desired_speed: f64,
    /// The desired time gap to the vehicle ahead, in s.
    pub time_headway: f64,
    /// The minimum bumper-to-bumper spacing, in m.
    pub min_spacing: f64,
    /// The maximum acceleration, in m/s^2.
    pub max_accel: f64,
    /// The comfortable deceleration, a positive number in m/s^2.
    pub comfort_decel: f64,
    /// The exponent of the free-road acceleration term.
    pub accel_exponent: f64,
    /// CO2 emitted while idle, in g/s.
    pub co2_idle_emission: f64,
    /// CO2 emitted per unit of speed, in g/m.
    pub co2_speed_factor: f64,
    /// CO2 emitted per unit of positive power demand.
    pub co2_accel_factor: f64,
    /// Extra multiplier on the acceleration emissions term.
    pub accel_boost_factor: f64,
    /// Litres of fuel per kg of CO2.
    pub fuel_conversion_factor: f64,
    /// The range the human variability multiplier is drawn from.
    pub variability: (f64, f64),
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            desired_speed: kmh(130.0),
            time_headway: 3.0,
            min_spacing: 3.0,
            max_accel: 2.0,
            comfort_decel: 3.0,
            accel_exponent: 4.0,
            co2_idle_emission: 0.8,
            co2_speed_factor: 0.05,
            co2_accel_factor: 1.5,
            accel_boost_factor: 1.0,
            fuel_conversion_factor: 1.0 / 2.3,
            variability: (0.9, 1.1),
        }
    }
}

/// Vehicle geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct VehicleSpecs {
    /// The vehicle length in m.
    pub length: f64,
    /// The vehicle width in m. Only used by renderers.
    pub width: f64,
    /// The speed reported by sensors for an empty segment, in m/s.
    pub max_speed: f64,
}

impl Default for VehicleSpecs {
    fn default() -> Self {
        Self {
            length: 5.0,
            width: 2.0,
            max_speed: kmh(180.0),
        }
    }
}

/// Corridor geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RoadSpecs {
    /// The corridor length in km.
    pub length_km: f64,
    /// The length of one sensor segment in m.
    pub sensor_spacing: f64,
    /// Vehicles further ahead than this are not followed, in m.
    pub leader_range: f64,
}

impl Default for RoadSpecs {
    fn default() -> Self {
        Self {
            length_km: 50.0,
            sensor_spacing: 1000.0,
            leader_range: 1000.0,
        }
    }
}

impl RoadSpecs {
    /// The corridor length in m.
    pub fn length_m(&self) -> f64 {
        self.length_km * 1000.0
    }

    /// The number of whole sensor segments along the corridor.
    pub fn num_segments(&self) -> usize {
        (self.length_m() / self.sensor_spacing) as usize
    }
}

/// Tuning of the speed smoothing controller.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ControllerParams {
    /// How long the glide towards the queue tail lasts, in s.
    pub preshot_duration: f64,
    /// Segments slower than this are part of a jam, in m/s.
    pub jam_threshold: f64,
    /// Segments faster than this are flowing freely, in m/s.
    pub free_flow_threshold: f64,
    /// The lowest speed ever ordered, in m/s.
    pub min_speed: f64,
    /// The highest speed ordered upstream of a jam, in m/s.
    pub max_speed: f64,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            preshot_duration: 400.0,
            jam_threshold: kmh(20.0),
            free_flow_threshold: kmh(60.0),
            min_speed: kmh(25.0),
            max_speed: kmh(80.0),
        }
    }
}

/// Stepping and demand.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SimSettings {
    /// The fixed simulation time step in s.
    pub dt: f64,
    /// The arrival rate at the corridor entry in veh/h.
    pub nominal_flow: f64,
    /// The fraction of WaveBreaker-side vehicles which are connected.
    pub penetration_rate: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            dt: 0.25,
            nominal_flow: 600.0,
            penetration_rate: 0.2,
        }
    }
}

/// The injected incident.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct IncidentParams {
    /// The simulation time after which the incident may trigger, in s.
    pub trigger_time: f64,
    /// The incident position in km.
    pub position_km: f64,
    /// How long the lane stays blocked, in s.
    pub duration: f64,
    /// Emissions multiplier applied on the uncontrolled road once it has been hit.
    pub penalty_factor: f64,
    /// Whether clearing the incident also clears the emissions penalty.
    pub release_penalty_on_clear: bool,
    /// Vehicles slower than this when the incident clears are released, in m/s.
    pub release_speed: f64,
}

impl Default for IncidentParams {
    fn default() -> Self {
        Self {
            trigger_time: 1200.0,
            position_km: 30.0,
            duration: 400.0,
            penalty_factor: 1.45,
            release_penalty_on_clear: false,
            release_speed: 1.0,
        }
    }
}

impl IncidentParams {
    /// The incident position in m.
    pub fn position_m(&self) -> f64 {
        self.position_km * 1000.0
    }
}

impl Config {
    /// Checks that the parameters describe a simulation that can run.
    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.physics;
        ensure!(p.desired_speed > 0.0, "desired speed must be positive");
        ensure!(
            p.max_accel > 0.0 && p.comfort_decel > 0.0,
            "acceleration and deceleration must be positive"
        );
        ensure!(
            0.0 < p.variability.0 && p.variability.0 <= p.variability.1,
            "variability range {:?} is invalid",
            p.variability
        );
        ensure!(self.vehicle.length > 0.0, "vehicle length must be positive");

        let r = &self.road;
        ensure!(r.length_km > 0.0, "road length must be positive");
        ensure!(
            r.sensor_spacing > 0.0 && r.sensor_spacing <= r.length_m(),
            "sensor spacing {} m does not fit a {} m road",
            r.sensor_spacing,
            r.length_m()
        );

        let c = &self.controller;
        ensure!(c.preshot_duration > 0.0, "preshot duration must be positive");
        ensure!(
            0.0 < c.min_speed && c.min_speed <= c.max_speed,
            "controller speed clamp [{}, {}] is invalid",
            c.min_speed,
            c.max_speed
        );

        let s = &self.sim;
        ensure!(s.dt > 0.0, "time step must be positive");
        ensure!(s.nominal_flow > 0.0, "nominal flow must be positive");
        ensure!(
            (0.0..=1.0).contains(&s.penetration_rate),
            "penetration rate {} is not in [0, 1]",
            s.penetration_rate
        );

        let i = &self.incident;
        ensure!(
            (0.0..=r.length_m()).contains(&i.position_m()),
            "incident at km {} is off the road",
            i.position_km
        );
        ensure!(i.duration >= 0.0, "incident duration must not be negative");
        ensure!(i.penalty_factor >= 1.0, "penalty factor must be at least 1");
        Ok(())
    }

    /// Parses and validates a configuration from JSON. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.road.num_segments(), 50);
        assert_approx_eq!(config.incident.position_m(), 30_000.0);
        assert_approx_eq!(config.physics.desired_speed, 36.111111111);
    }

    #[test]
    fn rejects_inverted_clamp() {
        let mut config = Config::default();
        config.controller.min_speed = kmh(90.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_penetration_out_of_range() {
        let mut config = Config::default();
        config.sim.penetration_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "sim": { "nominal_flow": 1200.0 } }"#).unwrap();
        assert_approx_eq!(config.sim.nominal_flow, 1200.0);
        assert_approx_eq!(config.sim.dt, 0.25);
        assert_eq!(config.road, RoadSpecs::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_must_be_valid() {
        assert!(Config::from_json(r#"{ "road": { "length_km": -1.0 } }"#).is_err());
    }
}
