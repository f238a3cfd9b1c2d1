//! Tests that run both roads side by side through an incident.

use wavebreaker::config::kmh;
use wavebreaker::{run_ensemble, ComparisonStats, Config, ControllerState, TwinSimulation};

/// A short corridor with an early incident, so tests finish quickly.
fn short_config() -> Config {
    let mut config = Config::default();
    config.road.length_km = 10.0;
    config.road.sensor_spacing = 500.0;
    config.incident.position_km = 6.0;
    config.incident.trigger_time = 100.0;
    config.incident.duration = 120.0;
    config.controller.preshot_duration = 120.0;
    config
}

fn step_until_triggered(sim: &mut TwinSimulation) {
    while !sim.generator().incident_triggered() {
        sim.step();
        assert!(sim.time() < 1000.0, "incident never triggered");
    }
}

#[test]
fn controller_follows_the_incident() {
    let config = short_config();
    let mut sim = TwinSimulation::new(&config, 7);
    sim.set_penetration_rate(0.5);

    step_until_triggered(&mut sim);
    match sim.controller().state() {
        ControllerState::Active {
            position,
            end_time,
            triggered_at,
        } => {
            assert_eq!(position, 6000.0);
            let impact = sim.time() - sim.dt();
            assert!((end_time - (impact + config.incident.duration)).abs() < 1e-6);
            assert_eq!(triggered_at, Some(sim.time()));
        }
        state => panic!("controller should be active, got {:?}", state),
    }
    assert!(sim.controller().boq_position().is_some());
    assert!(sim.chaos().penalty_active());

    let triggered = sim.time();
    loop {
        sim.step();
        if !sim.generator().incident_active() {
            break;
        }
        assert!(sim.controller().is_active());
    }
    assert_eq!(sim.dt(), config.sim.dt);
    assert!(sim.time() >= triggered + config.incident.duration - sim.dt());
    assert_eq!(sim.controller().state(), ControllerState::Inactive);
    assert_eq!(sim.controller().boq_position(), None);
    assert!(sim.controller().speed_map().iter().all(|&s| s == config.physics.desired_speed));
}

#[test]
fn twins_share_ids_and_sensors_stay_consistent() {
    let config = short_config();
    let mut sim = TwinSimulation::new(&config, 11);
    sim.set_penetration_rate(0.3);

    for _ in 0..2000 {
        sim.step();
        for road in [sim.chaos(), sim.wavebreaker()] {
            let snapshot = road.snapshot();
            assert_eq!(snapshot.num_segments(), 20);
            let occupied: u32 = snapshot.occupancy.iter().sum();
            assert_eq!(occupied as usize, road.vehicles().len());
            for idx in 0..snapshot.num_segments() {
                assert!(snapshot.densities[idx] >= 0.0);
                assert!(snapshot.mean_speeds[idx] >= 0.0);
                if snapshot.occupancy[idx] == 0 {
                    assert_eq!(snapshot.mean_speeds[idx], config.vehicle.max_speed);
                }
            }
            for vehicle in road.vehicles() {
                assert!(vehicle.vel() >= 0.0);
                assert!(vehicle.pos() >= 0.0 && vehicle.pos() < road.length());
            }
        }
        assert!(sim.chaos().vehicles().iter().all(|v| !v.is_connected()));
    }

    let chaos = sim.chaos().metrics();
    let wb = sim.wavebreaker().metrics();
    assert_eq!(chaos.vehicle_count, wb.vehicle_count);
    assert_eq!(chaos.vehicle_count as u64, sim.generator().spawned());
}

#[test]
fn zero_penetration_has_no_connected_vehicles() {
    let config = short_config();
    let mut sim = TwinSimulation::new(&config, 3);
    sim.set_penetration_rate(0.0);
    for _ in 0..1500 {
        sim.step();
        assert!(sim.wavebreaker().vehicles().iter().all(|v| !v.is_connected()));
    }
}

#[test]
fn connected_vehicles_glide_upstream_of_the_queue() {
    let config = short_config();
    let mut sim = TwinSimulation::new(&config, 21);
    sim.set_penetration_rate(1.0);

    step_until_triggered(&mut sim);
    loop {
        sim.step();
        if !sim.generator().incident_active() {
            break;
        }
        let Some(boq) = sim.controller().boq_position() else {
            panic!("controller lost the queue at T={}", sim.time());
        };
        assert!(boq <= 6000.0);
        for vehicle in sim.wavebreaker().vehicles() {
            if vehicle.is_stalled() || vehicle.pos() >= boq {
                continue;
            }
            assert!(vehicle.is_connected());
            let target = vehicle.target_speed();
            assert!(
                target >= kmh(25.0) - 1e-9 && target <= kmh(80.0) + 1e-9,
                "vehicle {} ordered to {} m/s",
                vehicle.id(),
                target
            );
        }
    }
}

#[test]
fn runs_with_the_same_seed_match() {
    let config = short_config();
    let mut a = TwinSimulation::new(&config, 42);
    let mut b = TwinSimulation::new(&config, 42);
    a.run_until(400.0);
    b.run_until(400.0);
    assert_eq!(a.comparison(), b.comparison());
    assert_eq!(a.chaos().metrics(), b.chaos().metrics());
}

/// Averaged over several seeds, the WaveBreaker road emits less and is no slower.
/// Single runs may lose a little travel time to noise, so only the means are compared.
#[test]
fn wavebreaker_improves_on_average() {
    let config = Config::default();
    let seeds = [0, 12345, 24690, 37035, 49380];
    let stats = ComparisonStats::from_runs(&run_ensemble(&config, 0.5, &seeds, 3000.0));
    assert_eq!(stats.runs, seeds.len());
    assert!(stats.co2.mean > 0.0, "mean CO2 gain {}", stats.co2.mean);
    assert!(stats.fuel.mean > 0.0, "mean fuel gain {}", stats.fuel.mean);
    // Travel times agree to within a fraction of a percent run to run.
    assert!(stats.time.mean > -0.5, "mean travel time gain {}", stats.time.mean);
}

#[test]
fn nan_penetration_rate_keeps_the_previous_share() {
    let config = short_config();
    let mut sim = TwinSimulation::new(&config, 9);
    sim.set_penetration_rate(1.0);
    sim.set_penetration_rate(f64::NAN);
    assert_eq!(sim.generator().penetration_rate(), 1.0);
    for _ in 0..100 {
        sim.step();
    }
    assert!(sim.wavebreaker().vehicles().iter().all(|v| v.is_connected()));
}
