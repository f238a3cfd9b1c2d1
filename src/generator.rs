//! Demand and incident injection shared by the twin roads.

use crate::config::Config;
use crate::road::Road;
use crate::{Vehicle, VehicleId};
use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A change in the incident state, raised by the [TrafficGenerator] and
/// delivered to both roads and the controller between ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IncidentEvent {
    /// A vehicle has stalled and blocks the lane.
    Started {
        /// The stalled vehicle, present on both roads.
        victim: VehicleId,
        /// Where the vehicle stalled, in m.
        position: f64,
        /// When the lane is expected to clear, in s.
        end_time: f64,
    },
    /// The stalled vehicle has been cleared.
    Cleared,
}

/// Spawns twin vehicles into both roads and schedules the incident.
#[derive(Clone, Debug)]
pub struct TrafficGenerator {
    /// The parameters new vehicles are created with.
    config: Config,
    /// The ID of the most recently spawned pair.
    last_id: u64,
    /// The fraction of WaveBreaker-side vehicles which are connected.
    penetration_rate: f64,
    /// The time of the next arrival in s.
    next_spawn: f64,
    /// The gap between arrivals in s.
    spawn_interval: f64,
    /// Whether the incident has already happened.
    triggered: bool,
    /// Whether the lane is currently blocked.
    active: bool,
    /// When the incident started, in s.
    crash_start: f64,
    /// The stalled vehicle, once the incident has happened.
    victim: Option<VehicleId>,
    /// The random stream used for driver variability and connectivity.
    rng: ChaCha8Rng,
}

impl TrafficGenerator {
    /// Creates a generator whose random draws are fully determined by `seed`.
    pub fn new(config: &Config, seed: u64) -> Self {
        Self {
            config: *config,
            last_id: 0,
            penetration_rate: if config.sim.penetration_rate.is_nan() {
                0.0
            } else {
                config.sim.penetration_rate.clamp(0.0, 1.0)
            },
            next_spawn: 0.0,
            spawn_interval: 3600.0 / config.sim.nominal_flow,
            triggered: false,
            active: false,
            crash_start: 0.0,
            victim: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Sets the fraction of WaveBreaker-side vehicles which are connected.
    /// Rates outside [0, 1] are clamped; a NaN rate is ignored.
    pub fn set_penetration_rate(&mut self, rate: f64) {
        if rate.is_nan() {
            warn!("Ignoring NaN connected vehicle share");
            return;
        }
        self.penetration_rate = rate.clamp(0.0, 1.0);
        info!(
            "Connected vehicle share set to {:.0}%",
            self.penetration_rate * 100.0
        );
    }

    /// The fraction of WaveBreaker-side vehicles which are connected.
    pub fn penetration_rate(&self) -> f64 {
        self.penetration_rate
    }

    /// The number of vehicle pairs spawned so far.
    pub fn spawned(&self) -> u64 {
        self.last_id
    }

    /// Whether the incident has happened.
    pub fn incident_triggered(&self) -> bool {
        self.triggered
    }

    /// Whether the lane is currently blocked.
    pub fn incident_active(&self) -> bool {
        self.active
    }

    /// The stalled vehicle, once the incident has happened.
    pub fn victim(&self) -> Option<VehicleId> {
        self.victim
    }

    /// Spawns due arrivals and advances the incident schedule, using the
    /// Chaos road's clock. Returns the incident event raised by this call, if any.
    pub fn update(&mut self, chaos: &mut Road, wavebreaker: &mut Road) -> Option<IncidentEvent> {
        let now = chaos.time();

        if now >= self.next_spawn {
            self.spawn_twins(chaos, wavebreaker);
            self.next_spawn = now + self.spawn_interval;
        }

        let incident = self.config.incident;
        if !self.triggered && now >= incident.trigger_time {
            let position = incident.position_m();
            let victim = chaos.vehicles().iter().find(|v| v.pos() >= position)?.id();
            self.triggered = true;
            self.active = true;
            self.crash_start = now;
            self.victim = Some(victim);
            warn!(
                "Impact at T={:.1}s at km {}: vehicle {} stalled",
                now, incident.position_km, victim
            );
            return Some(IncidentEvent::Started {
                victim,
                position,
                end_time: now + incident.duration,
            });
        }

        if self.active && now >= self.crash_start + incident.duration {
            self.active = false;
            info!("Road cleared at T={:.1}s", now);
            return Some(IncidentEvent::Cleared);
        }

        None
    }

    /// Spawns one vehicle into each road. Both share an ID and initial state;
    /// only the WaveBreaker-side twin may be connected.
    fn spawn_twins(&mut self, chaos: &mut Road, wavebreaker: &mut Road) {
        self.last_id += 1;
        let id = VehicleId(self.last_id);
        let vel = self.config.physics.desired_speed;

        let human = Vehicle::new(id, 0.0, vel, false, &self.config, &mut self.rng);
        chaos.add_vehicle(human);

        let connected = self.rng.gen_bool(self.penetration_rate);
        let twin = Vehicle::new(id, 0.0, vel, connected, &self.config, &mut self.rng);
        wavebreaker.add_vehicle(twin);
    }
}
