use crate::config::Config;
use crate::generator::IncidentEvent;
use crate::sensor::{SensorNetwork, SensorSnapshot};
use crate::{Vehicle, VehicleId};
use log::{debug, trace};
#[cfg(feature = "serde")]
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// Which of the twin scenarios a road simulates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Scenario {
    /// Human drivers only. Incidents leave an emissions penalty behind.
    Chaos,
    /// Some vehicles follow the controller's orders.
    WaveBreaker,
}

/// Aggregate statistics of a road.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Metrics {
    /// CO2 emitted by finished and active vehicles, in kg.
    pub total_co2_kg: f64,
    /// Fuel burnt by finished and active vehicles, in l.
    pub total_fuel_liters: f64,
    /// The mean travel time of finished vehicles in s, or 0 if none have finished.
    pub avg_travel_time: f64,
    /// The mean density over all sensor segments in veh/km.
    pub avg_density: f64,
    /// The number of vehicles which have entered the road.
    pub vehicle_count: usize,
}

/// One row of a time-space recording.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TrajectorySample {
    pub id: VehicleId,
    pub time: f64,
    pub pos_km: f64,
    pub speed_kmh: f64,
    pub connected: bool,
}

/// A single-lane corridor and the vehicles on it.
#[derive(Clone, Debug)]
pub struct Road {
    /// The scenario simulated on this road.
    scenario: Scenario,
    /// The corridor length in m.
    length: f64,
    /// Vehicles further ahead than this are not followed, in m.
    leader_range: f64,
    /// The emissions multiplier applied while the penalty is latched.
    penalty_factor: f64,
    /// Whether a cleared incident also clears the penalty.
    release_penalty_on_clear: bool,
    /// Vehicles slower than this are released when an incident clears, in m/s.
    release_speed: f64,
    /// The active vehicles, ordered front to back after each update.
    vehicles: Vec<Vehicle>,
    /// The roadside sensors.
    sensors: SensorNetwork,
    /// The simulation time in s.
    time: f64,
    /// The number of updates performed.
    frame: usize,
    /// Whether the emissions penalty is latched.
    penalty_active: bool,
    /// The number of vehicles which have left the road.
    finished: usize,
    /// CO2 emitted by vehicles which have left the road, in kg.
    finished_co2: f64,
    /// Fuel burnt by vehicles which have left the road, in l.
    finished_fuel: f64,
    /// The travel time of every vehicle which has left the road, in s.
    travel_times: Vec<f64>,
}

impl Road {
    /// Creates an empty road.
    pub fn new(scenario: Scenario, config: &Config) -> Self {
        Self {
            scenario,
            length: config.road.length_m(),
            leader_range: config.road.leader_range,
            penalty_factor: config.incident.penalty_factor,
            release_penalty_on_clear: config.incident.release_penalty_on_clear,
            release_speed: config.incident.release_speed,
            vehicles: vec![],
            sensors: SensorNetwork::new(config),
            time: 0.0,
            frame: 0,
            penalty_active: false,
            finished: 0,
            finished_co2: 0.0,
            finished_fuel: 0.0,
            travel_times: vec![],
        }
    }

    /// The scenario simulated on this road.
    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// The simulation time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The number of updates performed.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The corridor length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The vehicles currently on the road.
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Mutable access to the vehicles, for issuing controller orders.
    pub fn vehicles_mut(&mut self) -> &mut [Vehicle] {
        &mut self.vehicles
    }

    /// Gets the vehicle with the given ID, if it is still on the road.
    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id() == id)
    }

    /// The roadside sensors.
    pub fn sensors(&self) -> &SensorNetwork {
        &self.sensors
    }

    /// The latest sensor snapshot.
    pub fn snapshot(&self) -> Arc<SensorSnapshot> {
        self.sensors.snapshot()
    }

    /// Whether the emissions penalty is latched.
    pub fn penalty_active(&self) -> bool {
        self.penalty_active
    }

    /// Latches the emissions penalty. It stays set until [Self::clear_penalty] is called.
    pub fn latch_penalty(&mut self) {
        self.penalty_active = true;
    }

    /// Clears the emissions penalty.
    pub fn clear_penalty(&mut self) {
        self.penalty_active = false;
    }

    /// The travel time of every vehicle which has left the road, in s.
    pub fn finished_travel_times(&self) -> &[f64] {
        &self.travel_times
    }

    /// The number of vehicles which have left the road.
    pub fn finished_count(&self) -> usize {
        self.finished
    }

    /// Adds a vehicle to the road, stamping its entry time.
    pub fn add_vehicle(&mut self, mut vehicle: Vehicle) {
        vehicle.set_entry_time(self.time);
        self.vehicles.push(vehicle);
    }

    /// Applies the effects of an incident event to this road's vehicles.
    pub fn apply_incident(&mut self, event: &IncidentEvent) {
        match *event {
            IncidentEvent::Started {
                victim, position, ..
            } => {
                if let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id() == victim) {
                    vehicle.freeze_at(position);
                }
                if self.scenario == Scenario::Chaos {
                    self.latch_penalty();
                }
            }
            IncidentEvent::Cleared => {
                for vehicle in &mut self.vehicles {
                    if vehicle.vel() < self.release_speed {
                        vehicle.release();
                    }
                }
                if self.release_penalty_on_clear {
                    self.clear_penalty();
                }
            }
        }
    }

    /// Advances the road by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        self.time += dt;
        self.frame += 1;

        self.vehicles
            .sort_by(|a, b| b.pos().partial_cmp(&a.pos()).unwrap_or(Ordering::Equal));

        let factor = if self.penalty_active {
            self.penalty_factor
        } else {
            1.0
        };

        // Vehicles are updated front to back, so each follows its leader's new state
        let range = self.leader_range;
        for idx in 0..self.vehicles.len() {
            let (ahead, rest) = self.vehicles.split_at_mut(idx);
            let vehicle = &mut rest[0];
            let leader = ahead
                .last()
                .filter(|leader| leader.pos() - vehicle.pos() < range);
            vehicle.update_dynamics(dt, leader, factor);
        }

        self.retire_vehicles();
        self.sensors.update(&self.vehicles);
        trace!(
            "{:?} T={:.2}s: {} vehicles",
            self.scenario,
            self.time,
            self.vehicles.len()
        );
    }

    /// Removes vehicles which have driven past the end of the road,
    /// rolling their totals into the road's statistics.
    fn retire_vehicles(&mut self) {
        let length = self.length;
        let mut exited = vec![];
        self.vehicles.retain(|vehicle| {
            let keep = vehicle.pos() < length;
            if !keep {
                exited.push((vehicle.co2_total(), vehicle.fuel_total(), vehicle.entry_time()));
            }
            keep
        });

        if !exited.is_empty() {
            debug!(
                "{:?} T={:.1}s: {} vehicle(s) reached the end of the road",
                self.scenario,
                self.time,
                exited.len()
            );
        }
        for (co2, fuel, entry_time) in exited {
            self.finished += 1;
            self.finished_co2 += co2;
            self.finished_fuel += fuel;
            self.travel_times.push(self.time - entry_time);
        }
    }

    /// Computes the aggregate statistics of the road.
    pub fn metrics(&self) -> Metrics {
        let active_co2: f64 = self.vehicles.iter().map(Vehicle::co2_total).sum();
        let active_fuel: f64 = self.vehicles.iter().map(Vehicle::fuel_total).sum();
        let avg_travel_time = if self.travel_times.is_empty() {
            0.0
        } else {
            self.travel_times.iter().sum::<f64>() / self.travel_times.len() as f64
        };
        Metrics {
            total_co2_kg: self.finished_co2 + active_co2,
            total_fuel_liters: self.finished_fuel + active_fuel,
            avg_travel_time,
            avg_density: self.sensors.snapshot().mean_density(),
            vehicle_count: self.vehicles.len() + self.finished,
        }
    }

    /// Samples every active vehicle for a time-space recording.
    pub fn trajectory_samples(&self) -> impl Iterator<Item = TrajectorySample> + '_ {
        self.vehicles.iter().map(move |v| TrajectorySample {
            id: v.id(),
            time: self.time,
            pos_km: v.pos() / 1000.0,
            speed_kmh: v.vel() * 3.6,
            connected: v.is_connected(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn vehicle(config: &Config, id: u64, pos: f64, vel: f64) -> Vehicle {
        Vehicle::with_variability(VehicleId(id), pos, vel, false, 1.0, config)
    }

    fn short_road(length_km: f64) -> Config {
        let mut config = Config::default();
        config.road.length_km = length_km;
        config.road.sensor_spacing = 100.0;
        config
    }

    #[test]
    fn sorts_front_to_back() {
        let config = Config::default();
        let mut road = Road::new(Scenario::Chaos, &config);
        road.add_vehicle(vehicle(&config, 1, 10.0, 20.0));
        road.add_vehicle(vehicle(&config, 2, 500.0, 20.0));
        road.add_vehicle(vehicle(&config, 3, 200.0, 20.0));
        road.update(0.25);

        let ids: Vec<_> = road.vehicles().iter().map(|v| v.id().0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(road.frame(), 1);
        assert_approx_eq!(road.time(), 0.25);
    }

    #[test]
    fn follows_only_nearby_leaders() {
        let config = Config::default();
        let mut road = Road::new(Scenario::Chaos, &config);
        let mut stalled = vehicle(&config, 1, 1500.0, 0.0);
        stalled.freeze_at(1500.0);
        road.add_vehicle(stalled);
        // Further back than the leader range: drives as if the road were empty.
        road.add_vehicle(vehicle(&config, 2, 400.0, 0.0));
        road.update(0.25);
        assert_approx_eq!(road.vehicles()[1].acc(), config.physics.max_accel);

        let mut road = Road::new(Scenario::Chaos, &config);
        let mut stalled = vehicle(&config, 1, 1500.0, 0.0);
        stalled.freeze_at(1500.0);
        road.add_vehicle(stalled);
        road.add_vehicle(vehicle(&config, 2, 600.0, 0.0));
        road.update(0.25);
        assert!(road.vehicles()[1].acc() < config.physics.max_accel);
    }

    #[test]
    fn retires_vehicles_at_the_end() {
        let config = short_road(1.0);
        let mut road = Road::new(Scenario::WaveBreaker, &config);
        road.add_vehicle(vehicle(&config, 1, 995.0, 30.0));
        road.update(0.25);
        road.add_vehicle(vehicle(&config, 2, 0.0, 30.0));
        road.update(0.25);

        assert_eq!(road.finished_count(), 1);
        assert_eq!(road.finished_travel_times(), &[0.25]);
        assert_eq!(road.vehicles().len(), 1);

        let metrics = road.metrics();
        assert_eq!(metrics.vehicle_count, 2);
        assert_approx_eq!(metrics.avg_travel_time, 0.25);
        assert!(metrics.total_co2_kg > road.vehicles()[0].co2_total());
        assert_approx_eq!(metrics.avg_density, 10.0 / 10.0);
    }

    #[test]
    fn metrics_of_an_empty_road() {
        let config = Config::default();
        let road = Road::new(Scenario::Chaos, &config);
        assert_eq!(road.metrics(), Metrics::default());
    }

    #[test]
    fn penalty_latch_survives_clearing() {
        let config = short_road(2.0);
        let mut chaos = Road::new(Scenario::Chaos, &config);
        let mut wb = Road::new(Scenario::WaveBreaker, &config);
        for road in [&mut chaos, &mut wb] {
            road.add_vehicle(vehicle(&config, 1, 800.0, 30.0));
            road.add_vehicle(vehicle(&config, 2, 300.0, 30.0));
        }

        let start = IncidentEvent::Started {
            victim: VehicleId(1),
            position: 1000.0,
            end_time: 100.0,
        };
        chaos.apply_incident(&start);
        wb.apply_incident(&start);
        assert!(chaos.penalty_active());
        assert!(!wb.penalty_active());
        assert_eq!(chaos.get_vehicle(VehicleId(1)).unwrap().pos(), 1000.0);

        for _ in 0..100 {
            chaos.update(0.25);
            assert!(chaos.penalty_active());
        }
        chaos.apply_incident(&IncidentEvent::Cleared);
        chaos.update(0.25);
        assert!(chaos.penalty_active());

        let victim = chaos.get_vehicle(VehicleId(1)).unwrap();
        assert_eq!(victim.target_speed(), victim.desired_speed());

        chaos.clear_penalty();
        assert!(!chaos.penalty_active());
    }

    #[test]
    fn penalty_can_be_released_on_clear() {
        let mut config = short_road(2.0);
        config.incident.release_penalty_on_clear = true;
        let mut chaos = Road::new(Scenario::Chaos, &config);
        chaos.latch_penalty();
        chaos.apply_incident(&IncidentEvent::Cleared);
        assert!(!chaos.penalty_active());
    }

    #[test]
    fn penalty_raises_emissions() {
        let config = Config::default();
        let mut calm = Road::new(Scenario::Chaos, &config);
        let mut stressed = Road::new(Scenario::Chaos, &config);
        stressed.latch_penalty();
        for road in [&mut calm, &mut stressed] {
            road.add_vehicle(vehicle(&config, 1, 0.0, 30.0));
            for _ in 0..40 {
                road.update(0.25);
            }
        }
        assert_approx_eq!(
            stressed.metrics().total_co2_kg,
            1.45 * calm.metrics().total_co2_kg
        );
    }

    #[test]
    fn trajectory_samples() {
        let config = Config::default();
        let mut road = Road::new(Scenario::Chaos, &config);
        road.add_vehicle(vehicle(&config, 7, 1500.0, 10.0));
        let samples: Vec<_> = road.trajectory_samples().collect();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].id, VehicleId(7));
        assert_approx_eq!(samples[0].pos_km, 1.5);
        assert_approx_eq!(samples[0].speed_kmh, 36.0);
        assert!(!samples[0].connected);
    }
}
