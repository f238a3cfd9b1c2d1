use crate::config::Config;
use crate::controller::Controller;
use crate::ensemble::Comparison;
use crate::generator::{IncidentEvent, TrafficGenerator};
use crate::road::{Road, Scenario};

/// A pair of roads simulated in lockstep: one with human drivers only, and
/// one where connected vehicles follow the WaveBreaker controller.
#[derive(Clone, Debug)]
pub struct TwinSimulation {
    /// The time step in s.
    dt: f64,
    /// The road without any control.
    chaos: Road,
    /// The road with connected vehicles.
    wavebreaker: Road,
    /// Spawns vehicles into both roads and injects the incident.
    generator: TrafficGenerator,
    /// The controller attached to the WaveBreaker road.
    controller: Controller,
}

impl TwinSimulation {
    /// Creates a new simulation. All randomness is drawn from a stream seeded with `seed`.
    pub fn new(config: &Config, seed: u64) -> Self {
        Self {
            dt: config.sim.dt,
            chaos: Road::new(Scenario::Chaos, config),
            wavebreaker: Road::new(Scenario::WaveBreaker, config),
            generator: TrafficGenerator::new(config, seed),
            controller: Controller::new(config, true),
        }
    }

    /// Sets the fraction of WaveBreaker-side vehicles which are connected.
    pub fn set_penetration_rate(&mut self, rate: f64) {
        self.generator.set_penetration_rate(rate);
    }

    /// Advances both roads by one time step.
    pub fn step(&mut self) {
        if let Some(event) = self.generator.update(&mut self.chaos, &mut self.wavebreaker) {
            self.dispatch_incident(&event);
        }

        self.chaos.update(self.dt);
        self.wavebreaker.update(self.dt);

        let snapshot = self.wavebreaker.snapshot();
        let now = self.wavebreaker.time();
        self.controller
            .process(&snapshot, self.wavebreaker.vehicles_mut(), now);
    }

    /// Steps the simulation until its clock reaches `time` seconds.
    pub fn run_until(&mut self, time: f64) {
        while self.time() < time {
            self.step();
        }
    }

    /// The simulation time in s.
    pub fn time(&self) -> f64 {
        self.chaos.time()
    }

    /// The time step in s.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// The road without any control.
    pub fn chaos(&self) -> &Road {
        &self.chaos
    }

    /// The road with connected vehicles.
    pub fn wavebreaker(&self) -> &Road {
        &self.wavebreaker
    }

    /// The traffic generator.
    pub fn generator(&self) -> &TrafficGenerator {
        &self.generator
    }

    /// The WaveBreaker controller.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Compares the current metrics of the two roads.
    pub fn comparison(&self) -> Comparison {
        Comparison::between(&self.chaos.metrics(), &self.wavebreaker.metrics())
    }

    /// Delivers an incident event to both roads and the controller.
    fn dispatch_incident(&mut self, event: &IncidentEvent) {
        self.chaos.apply_incident(event);
        self.wavebreaker.apply_incident(event);
        match *event {
            IncidentEvent::Started {
                position, end_time, ..
            } => self.controller.set_incident_state(true, end_time, position),
            IncidentEvent::Cleared => self.controller.set_incident_state(false, 0.0, 0.0),
        }
    }
}
