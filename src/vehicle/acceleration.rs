/// Target speeds at or below this are treated as "stop", in m/s.
const MIN_TARGET_SPEED: f64 = 0.1; // m/s

/// The speed ratio used when the target speed is effectively zero.
const STOP_RATIO: f64 = 1000.0;

/// The smallest net gap used in the interaction term, in m.
const MIN_GAP: f64 = 0.1; // m

/// The intelligent driver model of a single vehicle.
#[derive(Clone, Debug)]
pub struct AccelerationModel {
    headway: f64,
    max_acc: f64,
    comf_dec: f64,
    min_spacing: f64,
    exponent: f64,
}

/// The parameters of the acceleration model.
pub struct ModelParams {
    /// The desired gap between this and the vehicle ahead in seconds.
    pub time_headway: f64,
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The comfortable deceleration in m/s<sup>2</sup>.
    pub comf_deceleration: f64,
    /// The jam distance kept to a stopped leader in m.
    pub min_spacing: f64,
    /// The acceleration exponent.
    pub exponent: f64,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(params: &ModelParams) -> Self {
        AccelerationModel {
            headway: params.time_headway,
            max_acc: params.max_acceleration,
            comf_dec: params.comf_deceleration,
            min_spacing: params.min_spacing,
            exponent: params.exponent,
        }
    }

    /// The desired time headway in s.
    pub fn headway(&self) -> f64 {
        self.headway
    }

    /// The maximum acceleration in m/s<sup>2</sup>.
    pub fn max_acc(&self) -> f64 {
        self.max_acc
    }

    /// The comfortable deceleration in m/s<sup>2</sup>.
    pub fn comf_dec(&self) -> f64 {
        self.comf_dec
    }

    /// Calculates the free road acceleration towards a target speed.
    /// # Arguments
    /// * `vel` - The velocity of the simulated vehicle (m/s).
    /// * `target` - The speed the vehicle is trying to reach (m/s).
    pub fn free_road(&self, vel: f64, target: f64) -> f64 {
        let ratio = if target > MIN_TARGET_SPEED {
            vel / target
        } else {
            STOP_RATIO
        };
        self.max_acc * (1. - ratio.powf(self.exponent))
    }

    /// Calculates the braking term caused by the vehicle ahead.
    ///
    /// # Arguments
    /// * `net_dist` - The bumper-to-bumper distance to the vehicle ahead in metres.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `their_vel` - The vehicle ahead's velocity (m/s).
    pub fn interaction(&self, net_dist: f64, my_vel: f64, their_vel: f64) -> f64 {
        let appr = my_vel - their_vel;
        let factor = 1. / (2. * (self.max_acc * self.comf_dec).sqrt());
        let ss = self.min_spacing + (my_vel * self.headway) + (my_vel * appr * factor);
        let term = ss / f64::max(net_dist, MIN_GAP);
        -self.max_acc * (term * term)
    }
}
