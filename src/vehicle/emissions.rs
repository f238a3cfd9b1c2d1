use crate::config::PhysicsParams;

/// Grams per kilogram.
const G_PER_KG: f64 = 1000.0;

/// A parametric CO2 and fuel proxy.
#[derive(Clone, Copy, Debug)]
pub struct EmissionModel {
    idle: f64,
    speed_factor: f64,
    accel_factor: f64,
    boost: f64,
    fuel_per_kg: f64,
}

impl EmissionModel {
    pub fn new(physics: &PhysicsParams) -> Self {
        Self {
            idle: physics.co2_idle_emission,
            speed_factor: physics.co2_speed_factor,
            accel_factor: physics.co2_accel_factor,
            boost: physics.accel_boost_factor,
            fuel_per_kg: physics.fuel_conversion_factor,
        }
    }

    /// The CO2 emitted over one step, in kg.
    ///
    /// # Parameters
    /// * `vel` - The velocity at the end of the step in m/s
    /// * `acc` - The acceleration over the step in m/s^2
    /// * `dt` - The step length in s
    /// * `factor` - An external multiplier on the emission rate
    pub fn co2(&self, vel: f64, acc: f64, dt: f64, factor: f64) -> f64 {
        let power = f64::max(acc * vel, 0.0);
        let rate = self.idle + self.speed_factor * vel + self.accel_factor * power * self.boost;
        f64::max(rate * factor * dt, 0.0) / G_PER_KG
    }

    /// The fuel burnt for the given CO2 mass, in litres.
    pub fn fuel(&self, co2: f64) -> f64 {
        co2 * self.fuel_per_kg
    }
}
