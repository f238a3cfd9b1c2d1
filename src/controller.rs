//! The WaveBreaker speed smoothing controller.
//!
//! While an incident blocks the road, the controller locates the tail of the
//! resulting queue and orders connected vehicles upstream of it to slow down
//! just enough that they arrive at the tail as the glide window runs out.

use crate::config::{Config, ControllerParams};
use crate::sensor::{segment_index, SensorSnapshot};
use crate::Vehicle;
use log::{debug, info, warn};

/// The state of the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControllerState {
    /// No incident; all connected vehicles drive at free-flow speed.
    Inactive,
    /// An incident is ongoing and vehicles are being steered into a glide.
    Active {
        /// The incident position in m.
        position: f64,
        /// The expected clearance time in s.
        end_time: f64,
        /// When the controller first reacted to the incident, once it has.
        triggered_at: Option<f64>,
    },
}

/// The centralized traffic controller.
#[derive(Clone, Debug)]
pub struct Controller {
    /// Disabled controllers behave as if no incident ever happens.
    enabled: bool,
    /// Tuning parameters.
    params: ControllerParams,
    /// The free-flow speed ordered outside of the glide zone, in m/s.
    free_speed: f64,
    /// The length of each segment in m.
    segment_len: f64,
    /// The current state.
    state: ControllerState,
    /// The target speed of each segment in m/s.
    speed_map: Vec<f64>,
    /// The back-of-queue position found by the last active update, in m.
    boq: Option<f64>,
}

impl Controller {
    /// Creates a new controller.
    pub fn new(config: &Config, enabled: bool) -> Self {
        let free_speed = config.physics.desired_speed;
        if enabled {
            info!(
                "WaveBreaker controller online (preshot {:.0} s)",
                config.controller.preshot_duration
            );
        }
        Self {
            enabled,
            params: config.controller,
            free_speed,
            segment_len: config.road.sensor_spacing,
            state: ControllerState::Inactive,
            speed_map: vec![free_speed; config.road.num_segments()],
            boq: None,
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether the controller is currently steering vehicles around an incident.
    pub fn is_active(&self) -> bool {
        self.enabled && matches!(self.state, ControllerState::Active { .. })
    }

    /// The target speed of each segment in m/s.
    pub fn speed_map(&self) -> &[f64] {
        &self.speed_map
    }

    /// The back-of-queue position found by the last active update, in m.
    pub fn boq_position(&self) -> Option<f64> {
        self.boq
    }

    /// Informs the controller that an incident has started or cleared.
    ///
    /// # Parameters
    /// * `active` - Whether an incident is ongoing
    /// * `end_time` - The expected clearance time in s
    /// * `position` - The incident position in m
    pub fn set_incident_state(&mut self, active: bool, end_time: f64, position: f64) {
        self.state = match (active, self.state) {
            (true, ControllerState::Active { triggered_at, .. }) => ControllerState::Active {
                position,
                end_time,
                triggered_at,
            },
            (true, ControllerState::Inactive) => ControllerState::Active {
                position,
                end_time,
                triggered_at: None,
            },
            (false, _) => ControllerState::Inactive,
        };
    }

    /// Recomputes the speed map from the latest sensor readings and sends the
    /// resulting orders to the connected vehicles.
    pub fn process(&mut self, snapshot: &SensorSnapshot, vehicles: &mut [Vehicle], now: f64) {
        match self.state {
            ControllerState::Active {
                position,
                end_time,
                triggered_at,
            } if self.enabled => {
                let triggered_at = match triggered_at {
                    Some(time) => time,
                    None => {
                        warn!(
                            "Eco-glide engaged at T={:.1}s, incident expected to clear at T={:.1}s",
                            now, end_time
                        );
                        self.state = ControllerState::Active {
                            position,
                            end_time,
                            triggered_at: Some(now),
                        };
                        now
                    }
                };
                let window = f64::max(1.0, self.params.preshot_duration - (now - triggered_at));
                let boq = self.find_queue_tail(snapshot, position);
                debug!("Back of queue at {:.0} m, {:.0} s left", boq, window);
                self.boq = Some(boq);
                self.fill_glide_speeds(boq, window);
            }
            _ => {
                if let ControllerState::Active { triggered_at, .. } = &mut self.state {
                    *triggered_at = None;
                }
                self.speed_map.fill(self.free_speed);
                self.boq = None;
            }
        }
        self.dispatch_orders(vehicles);
    }

    /// Locates the back of the queue, scanning from the far end of the road
    /// towards the entry. Segments slower than the jam threshold ahead of the
    /// incident pull the tail upstream; the scan stops at the first freely
    /// flowing segment once a tail has been found.
    fn find_queue_tail(&self, snapshot: &SensorSnapshot, incident_pos: f64) -> f64 {
        let mut boq = incident_pos;
        for (idx, &speed) in snapshot.mean_speeds.iter().enumerate().rev() {
            let seg_pos = idx as f64 * self.segment_len;
            if seg_pos >= incident_pos {
                continue;
            }
            if speed < self.params.jam_threshold {
                boq = seg_pos;
            } else if speed > self.params.free_flow_threshold && boq < incident_pos {
                break;
            }
        }
        boq
    }

    /// Fills the speed map so that each segment upstream of `boq` reaches it
    /// in `window` seconds.
    fn fill_glide_speeds(&mut self, boq: f64, window: f64) {
        let (min, max) = (self.params.min_speed, self.params.max_speed);
        for (idx, speed) in self.speed_map.iter_mut().enumerate() {
            let dist = boq - idx as f64 * self.segment_len;
            *speed = if dist > 0.0 {
                (dist / window).clamp(min, max)
            } else {
                self.free_speed
            };
        }
    }

    /// Sends each connected vehicle the target speed of its segment.
    fn dispatch_orders(&self, vehicles: &mut [Vehicle]) {
        let n = self.speed_map.len();
        for vehicle in vehicles.iter_mut().filter(|v| v.is_connected()) {
            if let Some(idx) = segment_index(vehicle.pos(), self.segment_len, n) {
                vehicle.set_wavebreaker_order(self.speed_map[idx]);
            }
        }
    }
}
