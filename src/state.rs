use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Vehicle orientation. Rotates body-frame vectors into the inertial (NED) frame.
pub type Attitude = UnitQuaternion<f64>;

/// Rotation matrix mapping body-frame axes into the inertial frame.
///
/// Column `j` is body axis `j` expressed in NED, so element `(2, 2)` is the
/// inertial z component of the body z-axis: the cosine of the tilt angle, used
/// by the altitude and attitude stages as the "uprightness" factor.
pub fn body_to_inertial(attitude: &Attitude) -> Matrix3<f64> {
    attitude.to_rotation_matrix().into_inner()
}

/// Extract yaw angle from quaternion (ZYX Euler convention), in `[-π, π]`
pub fn yaw_of(attitude: &Attitude) -> f64 {
    attitude.euler_angles().2
}

/// Estimated state of the vehicle, as supplied by the estimator each tick.
///
/// # Fields
///
/// * `position` - Position in the NED frame (meters)
/// * `velocity` - Linear velocity in the NED frame (m/s)
/// * `attitude` - Body orientation
/// * `body_rates` - Angular velocity [p, q, r] about body axes (rad/s)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub attitude: Attitude,
    pub body_rates: Vector3<f64>,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            attitude: Attitude::identity(),
            body_rates: Vector3::zeros(),
        }
    }
}

impl VehicleState {
    /// Builds a state from roll, pitch and yaw angles instead of a quaternion.
    ///
    /// # Example
    ///
    /// ```
    /// # use nalgebra::Vector3;
    /// # use quad_control::VehicleState;
    /// let state = VehicleState::from_euler(
    ///     Vector3::new(0.0, 0.0, -5.0),
    ///     Vector3::zeros(),
    ///     0.0, 0.0, std::f64::consts::FRAC_PI_2,
    ///     Vector3::zeros(),
    /// );
    /// assert!((state.yaw() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    /// ```
    pub fn from_euler(
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        roll: f64,
        pitch: f64,
        yaw: f64,
        body_rates: Vector3<f64>,
    ) -> Self {
        Self {
            position,
            velocity,
            attitude: Attitude::from_euler_angles(roll, pitch, yaw),
            body_rates,
        }
    }

    /// Current yaw (rad), in `[-π, π]`
    pub fn yaw(&self) -> f64 {
        yaw_of(&self.attitude)
    }
}

/// One sample of the planned trajectory. Immutable once produced.
///
/// # Fields
///
/// * `position` - Desired position, NED (m)
/// * `velocity` - Desired velocity, NED (m/s)
/// * `accel` - Feed-forward acceleration, NED (m/s²)
/// * `attitude` - Desired attitude; only its yaw is tracked
/// * `time` - Trajectory time of this sample (s)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryPoint {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub accel: Vector3<f64>,
    pub attitude: Attitude,
    pub time: f64,
}

impl Default for TrajectoryPoint {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            accel: Vector3::zeros(),
            attitude: Attitude::identity(),
            time: 0.0,
        }
    }
}

impl TrajectoryPoint {
    /// A stationary setpoint at `position` facing `yaw`.
    pub fn hold(position: Vector3<f64>, yaw: f64) -> Self {
        Self {
            position,
            attitude: Attitude::from_euler_angles(0.0, 0.0, yaw),
            ..Self::default()
        }
    }

    /// Setpoint yaw (rad), in `[-π, π]`
    pub fn yaw(&self) -> f64 {
        yaw_of(&self.attitude)
    }
}

/// Per-motor thrust command, the only output of a control tick.
///
/// Motor order follows the quad-X layout: front left, front right,
/// rear left, rear right.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleCommand {
    /// Desired thrust per motor (N)
    pub desired_thrusts_n: [f64; 4],
}

impl VehicleCommand {
    /// Sum of the four motor thrusts (N)
    pub fn collective_thrust(&self) -> f64 {
        self.desired_thrusts_n.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_6};

    #[test]
    fn test_yaw_extraction() {
        let identity = Attitude::identity();
        assert!(yaw_of(&identity).abs() < 1e-10);

        let yaw_90 = Attitude::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        assert!(
            (yaw_of(&yaw_90) - FRAC_PI_2).abs() < 1e-6,
            "Expected {}, got {}",
            FRAC_PI_2,
            yaw_of(&yaw_90)
        );

        let yaw_neg90 = Attitude::from_axis_angle(&Vector3::z_axis(), -FRAC_PI_2);
        assert!((yaw_of(&yaw_neg90) + FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_uprightness_is_cosine_of_tilt() {
        let level = body_to_inertial(&Attitude::identity());
        assert!((level[(2, 2)] - 1.0).abs() < 1e-12);

        let rolled = body_to_inertial(&Attitude::from_euler_angles(FRAC_PI_6, 0.0, 0.0));
        assert!((rolled[(2, 2)] - FRAC_PI_6.cos()).abs() < 1e-12);

        // yaw alone never tilts the thrust axis
        let yawed = body_to_inertial(&Attitude::from_euler_angles(0.0, 0.0, 1.2));
        assert!((yawed[(2, 2)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_body_x_maps_into_inertial() {
        // a 90 degree yaw turns body x onto inertial y (east)
        let r = body_to_inertial(&Attitude::from_euler_angles(0.0, 0.0, FRAC_PI_2));
        let body_x_in_ned = r * Vector3::x();
        assert!((body_x_in_ned - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_hold_point() {
        let point = TrajectoryPoint::hold(Vector3::new(1.0, 2.0, -3.0), 0.5);
        assert_eq!(point.velocity, Vector3::zeros());
        assert_eq!(point.accel, Vector3::zeros());
        assert!((point.yaw() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_collective_thrust() {
        let cmd = VehicleCommand {
            desired_thrusts_n: [1.0, 1.5, 2.0, 0.5],
        };
        assert_eq!(cmd.collective_thrust(), 5.0);
    }
}
