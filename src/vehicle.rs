use self::acceleration::{AccelerationModel, ModelParams};
use self::emissions::EmissionModel;
use crate::config::Config;
use crate::VehicleId;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

mod acceleration;
mod emissions;

/// A simulated vehicle travelling along the corridor.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID, shared with its twin on the other road.
    id: VehicleId,
    /// The vehicle's length in m.
    length: f64,
    /// Whether the vehicle obeys controller orders.
    connected: bool,
    /// The human variability multiplier drawn at creation.
    variability: f64,
    /// The acceleration model.
    acc_model: AccelerationModel,
    /// The emissions model.
    emissions: EmissionModel,
    /// The longitudinal position along the corridor, in m.
    pos: f64,
    /// The velocity in m/s.
    vel: f64,
    /// The acceleration applied during the last step, in m/s^2.
    acc: f64,
    /// The speed the driver would choose on an empty road, in m/s.
    desired_speed: f64,
    /// The speed the vehicle is currently trying to reach, in m/s.
    target_speed: f64,
    /// Whether the vehicle has broken down; stalled vehicles ignore orders.
    stalled: bool,
    /// CO2 emitted during the last step, in kg.
    co2_instant: f64,
    /// CO2 emitted since entering the corridor, in kg.
    co2_total: f64,
    /// Fuel burnt during the last step, in l.
    fuel_instant: f64,
    /// Fuel burnt since entering the corridor, in l.
    fuel_total: f64,
    /// The distance travelled since entering the corridor, in m.
    distance: f64,
    /// The simulation time at which the vehicle entered its road, in s.
    entry_time: f64,
}

impl Vehicle {
    /// Creates a vehicle, drawing a human variability multiplier from the
    /// configured range unless the vehicle is connected.
    pub fn new(
        id: VehicleId,
        pos: f64,
        vel: f64,
        connected: bool,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Self {
        let variability = if connected {
            1.0
        } else {
            let (low, high) = config.physics.variability;
            Uniform::new_inclusive(low, high).sample(rng)
        };
        Self::with_variability(id, pos, vel, connected, variability, config)
    }

    /// Creates a vehicle with the given variability multiplier.
    /// Connected vehicles always use a multiplier of 1.
    pub fn with_variability(
        id: VehicleId,
        pos: f64,
        vel: f64,
        connected: bool,
        variability: f64,
        config: &Config,
    ) -> Self {
        let physics = &config.physics;
        let variability = if connected { 1.0 } else { variability };
        let desired_speed = physics.desired_speed * variability;
        Self {
            id,
            length: config.vehicle.length,
            connected,
            variability,
            acc_model: AccelerationModel::new(&ModelParams {
                time_headway: physics.time_headway * variability,
                max_acceleration: physics.max_accel / variability,
                comf_deceleration: physics.comfort_decel * variability,
                min_spacing: physics.min_spacing,
                exponent: physics.accel_exponent,
            }),
            emissions: EmissionModel::new(physics),
            pos,
            vel: f64::max(vel, 0.0),
            acc: 0.0,
            desired_speed,
            target_speed: desired_speed,
            stalled: false,
            co2_instant: 0.0,
            co2_total: 0.0,
            fuel_instant: 0.0,
            fuel_total: 0.0,
            distance: 0.0,
            entry_time: 0.0,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Whether the vehicle receives controller orders.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The human variability multiplier; exactly 1 for connected vehicles.
    pub fn variability(&self) -> f64 {
        self.variability
    }

    /// The longitudinal position of the front of the vehicle in m.
    pub fn pos(&self) -> f64 {
        self.pos
    }

    /// The vehicle's velocity in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The acceleration applied during the last step, in m/s^2.
    pub fn acc(&self) -> f64 {
        self.acc
    }

    /// The free-flow speed of this driver in m/s.
    pub fn desired_speed(&self) -> f64 {
        self.desired_speed
    }

    /// The speed the vehicle is currently aiming for in m/s.
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// The desired time headway in s.
    pub fn time_headway(&self) -> f64 {
        self.acc_model.headway()
    }

    /// The maximum acceleration in m/s^2.
    pub fn max_acc(&self) -> f64 {
        self.acc_model.max_acc()
    }

    /// The comfortable deceleration in m/s^2.
    pub fn comf_dec(&self) -> f64 {
        self.acc_model.comf_dec()
    }

    /// CO2 emitted during the last step, in kg.
    pub fn co2_instant(&self) -> f64 {
        self.co2_instant
    }

    /// Total CO2 emitted, in kg.
    pub fn co2_total(&self) -> f64 {
        self.co2_total
    }

    /// Fuel burnt during the last step, in l.
    pub fn fuel_instant(&self) -> f64 {
        self.fuel_instant
    }

    /// Total fuel burnt, in l.
    pub fn fuel_total(&self) -> f64 {
        self.fuel_total
    }

    /// The distance travelled in m.
    pub fn distance_travelled(&self) -> f64 {
        self.distance
    }

    /// The time the vehicle entered its road, in s.
    pub fn entry_time(&self) -> f64 {
        self.entry_time
    }

    /// Whether the vehicle has broken down and is blocking the road.
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Applies a speed order from the controller. Vehicles which are not
    /// connected ignore the order and fall back to their own desired speed.
    /// A stalled vehicle keeps its zero target until it is released.
    pub fn set_wavebreaker_order(&mut self, speed_limit: f64) {
        if self.stalled {
            return;
        }
        self.target_speed = if self.connected {
            speed_limit
        } else {
            self.desired_speed
        };
    }

    /// Advances the vehicle by one time step.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    /// * `leader` - The vehicle directly ahead, if it is close enough to matter
    /// * `emission_factor` - A multiplier on this step's emission rate
    pub fn update_dynamics(&mut self, dt: f64, leader: Option<&Vehicle>, emission_factor: f64) {
        let mut acc = self.acc_model.free_road(self.vel, self.target_speed);
        if let Some(leader) = leader {
            let net_dist = leader.pos - self.pos - self.length;
            acc += self.acc_model.interaction(net_dist, self.vel, leader.vel);
        }

        // Semi-implicit Euler: the new velocity drives the position update
        let mut vel = self.vel + acc * dt;
        if vel < 0.0 {
            vel = 0.0;
            acc = 0.0;
        }
        // Hard braking must not roll the vehicle backwards
        let step = f64::max(vel * dt + 0.5 * acc * dt * dt, 0.0);
        self.vel = vel;
        self.acc = acc;
        self.pos += step;
        self.distance += step;

        self.co2_instant = self.emissions.co2(vel, acc, dt, emission_factor);
        self.co2_total += self.co2_instant;
        self.fuel_instant = self.emissions.fuel(self.co2_instant);
        self.fuel_total += self.fuel_instant;
    }

    /// Records the time at which the vehicle entered a road.
    pub(crate) fn set_entry_time(&mut self, time: f64) {
        self.entry_time = time;
    }

    /// Stops the vehicle dead at `pos` and keeps it there.
    pub(crate) fn freeze_at(&mut self, pos: f64) {
        self.stalled = true;
        self.vel = 0.0;
        self.acc = 0.0;
        self.target_speed = 0.0;
        self.pos = pos;
    }

    /// Lets the vehicle drive at its own desired speed again.
    pub(crate) fn release(&mut self) {
        self.stalled = false;
        self.target_speed = self.desired_speed;
    }
}
