use std::f64::consts::{PI, TAU};

use log::{info, warn};
use nalgebra::Vector3;

use crate::error::ControlError;
use crate::params::GainParameters;
use crate::state::{
    body_to_inertial, yaw_of, Attitude, TrajectoryPoint, VehicleCommand, VehicleState,
};
use crate::trajectory::TrajectorySource;

/// Gravitational acceleration (m/s²)
pub const GRAVITY: f64 = 9.81;

/// Fraction of the motor thrust range held back from the collective command
/// so the attitude loops keep some authority.
pub const THRUST_MARGIN_FRACTION: f64 = 0.1;

/// Below this uprightness factor `R[2][2]` the thrust projection is reported
/// as ill-conditioned.
pub const MIN_UPRIGHTNESS: f64 = 1e-3;

/// A cascaded controller for quad-X multirotor flight.
///
/// The control cascade, executed once per tick by [`QuadController::run_control`]:
///
/// ```text
/// Trajectory sample → Altitude Controller → Collective thrust (margin clamped)
///                   → Lateral Position Controller → Desired accelerations
///                                                          ↓
///                     Roll/Pitch Controller (accel + thrust + attitude) → p, q
/// Yaw setpoint      → Yaw Controller → r
///                                       ↓
/// Body Rate Controller (p, q, r vs. measured) → Moments → Motor Mixing → Motor Thrusts
/// ```
///
/// The altitude integral is the only state carried between ticks. Every other
/// stage is a pure function of its inputs and the immutable parameters.
#[derive(Clone, Debug)]
pub struct QuadController {
    params: GainParameters,
    /// `kpPQR ⊙ (Ixx, Iyy, Izz)`, fixed at construction
    moment_gain: Vector3<f64>,
    /// Accumulated altitude error for integral control (m⋅s)
    integrated_altitude_error: f64,
    cur_traj_point: TrajectoryPoint,
    cmd: VehicleCommand,
}

impl QuadController {
    /// Creates a controller for the vehicle described by `params`.
    ///
    /// # Errors
    ///
    /// * `ControlError::InvalidParameter` - if `params` fails [`GainParameters::validate`]
    ///
    /// # Example
    ///
    /// ```
    /// # use quad_control::{Defaults, GainParameters, QuadController};
    /// let params = GainParameters::from_provider(&Defaults)?;
    /// let controller = QuadController::new(params)?;
    /// assert_eq!(controller.integrated_altitude_error(), 0.0);
    /// # Ok::<(), quad_control::ControlError>(())
    /// ```
    pub fn new(params: GainParameters) -> Result<Self, ControlError> {
        params.validate()?;
        let moment_gain = params.kp_pqr.component_mul(&params.inertia());
        info!(
            "quad controller initialised: mass {} kg, arm {} m, motor thrust [{}, {}] N",
            params.mass, params.arm_length, params.min_motor_thrust, params.max_motor_thrust
        );

        Ok(Self {
            params,
            moment_gain,
            integrated_altitude_error: 0.0,
            cur_traj_point: TrajectoryPoint::default(),
            cmd: VehicleCommand::default(),
        })
    }

    /// Re-initialises the controller: clears the altitude integral.
    pub fn reset(&mut self) {
        self.integrated_altitude_error = 0.0;
        self.cur_traj_point = TrajectoryPoint::default();
        self.cmd = VehicleCommand::default();
    }

    /// Parameters the controller was built with
    pub fn params(&self) -> &GainParameters {
        &self.params
    }

    /// Altitude integral accumulated since construction or the last [`QuadController::reset`] (m⋅s)
    pub fn integrated_altitude_error(&self) -> f64 {
        self.integrated_altitude_error
    }

    /// The trajectory point sampled by the most recent tick
    pub fn current_trajectory_point(&self) -> &TrajectoryPoint {
        &self.cur_traj_point
    }

    /// The motor command produced by the most recent tick
    pub fn last_command(&self) -> &VehicleCommand {
        &self.cmd
    }

    /// Converts collective thrust and moment commands to clamped per-motor thrusts.
    ///
    /// # Motor Configuration (X-frame, NED body axes, x forward, y right)
    ///
    /// ```text
    ///   f1 (front left)   f2 (front right)
    ///            \      /
    ///             \    /
    ///              \  /
    ///              /  \
    ///             /    \
    ///            /      \
    ///   f3 (rear left)    f4 (rear right)
    /// ```
    ///
    /// Each motor sits `L / √2` from both body axes. Diagonal pairs spin in the
    /// same direction, so the yaw reaction torque sign alternates around the
    /// frame; this sign pattern belongs to the airframe and must not change
    /// independently of it.
    ///
    /// # Arguments
    ///
    /// * `coll_thrust_cmd` - Total thrust command in N (sum of all motors)
    /// * `moment_cmd` - Desired moments [Mx, My, Mz] in N⋅m about body axes
    ///
    /// # Returns
    ///
    /// Motor thrusts [f1, f2, f3, f4] in N, each clamped independently into
    /// `[minMotorThrust, maxMotorThrust]`. Saturating one motor does not
    /// redistribute thrust to the others. A non-finite allocation (singular
    /// attitude upstream) is commanded as `minMotorThrust`.
    pub fn generate_motor_commands(
        &self,
        coll_thrust_cmd: f64,
        moment_cmd: Vector3<f64>,
    ) -> VehicleCommand {
        let thrusts = self.allocate(coll_thrust_cmd, moment_cmd);
        VehicleCommand {
            desired_thrusts_n: thrusts.map(|f| {
                if f.is_finite() {
                    f.clamp(self.params.min_motor_thrust, self.params.max_motor_thrust)
                } else {
                    warn!("motor mixing: non-finite motor thrust {f}, commanding minimum thrust");
                    self.params.min_motor_thrust
                }
            }),
        }
    }

    /// Unclamped motor allocation behind [`QuadController::generate_motor_commands`].
    pub fn allocate(&self, coll_thrust_cmd: f64, moment_cmd: Vector3<f64>) -> [f64; 4] {
        let l = self.params.arm_length / 2.0_f64.sqrt();

        let t_roll = moment_cmd.x / l;
        let t_pitch = moment_cmd.y / l;
        let t_yaw = moment_cmd.z / -self.params.kappa;
        let t = coll_thrust_cmd;

        [
            0.25 * (t + t_roll + t_pitch + t_yaw), // front left  - f1
            0.25 * (t - t_roll + t_pitch - t_yaw), // front right - f2
            0.25 * (t + t_roll - t_pitch - t_yaw), // rear left   - f3
            0.25 * (t - t_roll - t_pitch + t_yaw), // rear right  - f4
        ]
    }

    /// Calculates desired 3-axis moments from body rate commands and measurements.
    ///
    /// The control law is: M = Kp ⊙ I ⊙ (ωcmd - ω), with the gain-inertia
    /// product computed once at construction so tuning is inertia normalised.
    ///
    /// # Arguments
    ///
    /// * `pqr_cmd` - Desired body rates [p, q, r] in rad/s
    /// * `pqr` - Current body rates [p, q, r] in rad/s
    ///
    /// # Returns
    ///
    /// Desired moments [Mx, My, Mz] in N⋅m about body axes
    pub fn body_rate_control(&self, pqr_cmd: Vector3<f64>, pqr: Vector3<f64>) -> Vector3<f64> {
        self.moment_gain.component_mul(&(pqr_cmd - pqr))
    }

    /// Calculates desired roll and pitch rates from a desired horizontal acceleration.
    ///
    /// The collective thrust is turned into an acceleration `c = -thrust / mass`
    /// (NED, so negative is up). The commanded tilt components `b = a / c` are
    /// limited to `maxTiltAngle` and compared with the current ones, `R[0][2]`
    /// and `R[1][2]`. The proportional tilt error is then mapped into body
    /// rates through the rotation matrix.
    ///
    /// # Arguments
    ///
    /// * `accel_cmd` - Desired acceleration in global NED coordinates (m/s²)
    /// * `attitude` - Current attitude
    /// * `coll_thrust_cmd` - Collective thrust command (N)
    ///
    /// # Returns
    ///
    /// Desired body rates [p, q, 0] in rad/s. Zero when the thrust command is
    /// not positive, since no tilt can realise an acceleration without thrust.
    ///
    /// # Notes
    ///
    /// The projection divides by `R[2][2]` and is unbounded near 90° of tilt.
    pub fn roll_pitch_control(
        &self,
        accel_cmd: Vector3<f64>,
        attitude: &Attitude,
        coll_thrust_cmd: f64,
    ) -> Vector3<f64> {
        let mut pqr_cmd = Vector3::zeros();

        if coll_thrust_cmd <= 0.0 {
            return pqr_cmd;
        }

        let r = body_to_inertial(attitude);
        let max_tilt = self.params.max_tilt_angle;

        let c = -coll_thrust_cmd / self.params.mass;
        let b_x_cmd = (accel_cmd.x / c).clamp(-max_tilt, max_tilt);
        let b_y_cmd = (accel_cmd.y / c).clamp(-max_tilt, max_tilt);

        let b_x_p_term = self.params.kp_bank * (b_x_cmd - r[(0, 2)]);
        let b_y_p_term = self.params.kp_bank * (b_y_cmd - r[(1, 2)]);

        pqr_cmd.x = (r[(1, 0)] * b_x_p_term - r[(0, 0)] * b_y_p_term) / r[(2, 2)];
        pqr_cmd.y = (r[(1, 1)] * b_x_p_term - r[(0, 1)] * b_y_p_term) / r[(2, 2)];

        pqr_cmd
    }

    /// Calculates desired collective thrust from altitude commands and current state.
    ///
    /// PID on vertical position with a feed-forward acceleration:
    ///
    /// ū = Kp_z * (z_cmd - z) + Kd_z * (ż_cmd - ż) + Ki_z * ∫(z_cmd - z)dt + z̈_ff
    ///
    /// and thrust = mass * (g - ū) / R[2][2]. The division by the uprightness
    /// factor raises the thrust as the vehicle tilts.
    ///
    /// # Arguments
    ///
    /// * `pos_z_cmd`, `vel_z_cmd` - Desired vertical position and velocity, NED (m, m/s)
    /// * `pos_z`, `vel_z` - Current vertical position and velocity, NED (m, m/s)
    /// * `attitude` - Current attitude
    /// * `accel_z_cmd` - Feed-forward vertical acceleration, NED (m/s²)
    /// * `dt` - Time step for integral accumulation (s), must be positive
    ///
    /// # Returns
    ///
    /// Collective thrust command in N
    ///
    /// # Notes
    ///
    /// - `vel_z_cmd` outside `[-maxAscentRate, maxDescentRate]` is clamped and
    ///   reported; the clamped value is used.
    /// - The integral is unbounded (no anti-windup).
    /// - A non-positive or non-finite `dt` skips the integral update for the tick.
    pub fn altitude_control(
        &mut self,
        pos_z_cmd: f64,
        vel_z_cmd: f64,
        pos_z: f64,
        vel_z: f64,
        attitude: &Attitude,
        accel_z_cmd: f64,
        dt: f64,
    ) -> f64 {
        let max_ascent = self.params.max_ascent_rate;
        let max_descent = self.params.max_descent_rate;

        let vel_z_cmd = if vel_z_cmd < -max_ascent || vel_z_cmd > max_descent {
            warn!(
                "altitude control: vertical velocity command {vel_z_cmd} outside [{}, {max_descent}], clamping",
                -max_ascent
            );
            vel_z_cmd.clamp(-max_ascent, max_descent)
        } else {
            vel_z_cmd
        };
        if vel_z < -max_ascent || vel_z > max_descent {
            warn!(
                "altitude control: vertical velocity {vel_z} outside [{}, {max_descent}]",
                -max_ascent
            );
        }

        let pos_z_err = pos_z_cmd - pos_z;
        let vel_z_err = vel_z_cmd - vel_z;

        if dt > 0.0 && dt.is_finite() {
            self.integrated_altitude_error += pos_z_err * dt;
        } else {
            warn!("altitude control: invalid time step {dt}, integral not updated");
        }

        let p_term = self.params.kp_pos_z * pos_z_err;
        let d_term = self.params.kp_vel_z * vel_z_err;
        let i_term = self.params.ki_pos_z * self.integrated_altitude_error;

        let acc_bar = p_term + d_term + i_term + accel_z_cmd;

        let r22 = body_to_inertial(attitude)[(2, 2)];
        if r22.abs() < MIN_UPRIGHTNESS {
            warn!("altitude control: uprightness {r22} near zero, thrust projection ill-conditioned");
        }

        let acc = (GRAVITY - acc_bar) / r22;

        self.params.mass * acc
    }

    /// Calculates desired horizontal acceleration from position and velocity commands.
    ///
    /// a = Kp_xy * (pos_cmd - pos) + Kd_xy * (vel_cmd - vel) + accel_ff
    ///
    /// The z components of the feed-forward and velocity command are zeroed and
    /// the position command's z is replaced by the current z, so this stage never
    /// couples into the vertical axis.
    ///
    /// # Arguments
    ///
    /// * `pos_cmd` - Desired position, NED (m)
    /// * `vel_cmd` - Desired velocity, NED (m/s)
    /// * `pos` - Current position, NED (m)
    /// * `vel` - Current velocity, NED (m/s)
    /// * `accel_cmd_ff` - Feed-forward acceleration, NED (m/s²)
    ///
    /// # Returns
    ///
    /// Desired acceleration [ax, ay, 0] in m/s². The commanded velocity is
    /// limited to `maxSpeedXY` and the result to `maxHorizAccel`, both by
    /// magnitude with direction preserved.
    pub fn lateral_position_control(
        &self,
        mut pos_cmd: Vector3<f64>,
        mut vel_cmd: Vector3<f64>,
        pos: Vector3<f64>,
        vel: Vector3<f64>,
        mut accel_cmd_ff: Vector3<f64>,
    ) -> Vector3<f64> {
        accel_cmd_ff.z = 0.0;
        vel_cmd.z = 0.0;
        pos_cmd.z = pos.z;

        let kp_pos = Vector3::new(self.params.kp_pos_xy, self.params.kp_pos_xy, 0.0);
        let kp_vel = Vector3::new(self.params.kp_vel_xy, self.params.kp_vel_xy, 0.0);

        let vel_cmd = clamp_magnitude(vel_cmd, self.params.max_speed_xy);

        let accel_cmd = kp_pos.component_mul(&(pos_cmd - pos))
            + kp_vel.component_mul(&(vel_cmd - vel))
            + accel_cmd_ff;

        clamp_magnitude(accel_cmd, self.params.max_accel_xy)
    }

    /// Calculates desired yaw rate from a yaw command and the current yaw.
    ///
    /// The command may have any magnitude or sign; it is first reduced by a
    /// signed modulo of 2π, then the error is wrapped to `[-π, π]` so the
    /// vehicle turns the short way round.
    ///
    /// # Arguments
    ///
    /// * `yaw_cmd` - Desired yaw angle in radians
    /// * `yaw` - Current yaw angle in radians, in `[-π, π]`
    ///
    /// # Returns
    ///
    /// Desired yaw rate in rad/s, at most `π * kpYaw` in magnitude
    pub fn yaw_control(&self, yaw_cmd: f64, yaw: f64) -> f64 {
        // `%` keeps the sign of the dividend
        let yaw_cmd = yaw_cmd % TAU;

        let mut err = yaw_cmd - yaw;
        if !err.is_finite() {
            warn!("yaw control: non-finite yaw error (cmd {yaw_cmd}, yaw {yaw}), holding heading");
            return 0.0;
        }
        if err.abs() > PI {
            err %= TAU;
        }
        if err > PI {
            err -= TAU;
        } else if err < -PI {
            err += TAU;
        }

        self.params.kp_yaw * err
    }

    /// Runs one control tick: trajectory setpoint and state estimate in, motor thrusts out.
    ///
    /// # Control Sequence
    ///
    /// 1. **Trajectory**: sample the setpoint at `sim_time`
    /// 2. **Altitude Control**: collective thrust from the vertical setpoint
    /// 3. **Thrust Margin**: clamp the collective thrust to
    ///    `[(min + m) * 4, (max - m) * 4]`, `m` = 10% of the motor range
    /// 4. **Position Control**: horizontal acceleration command
    /// 5. **Attitude Control**: roll and pitch rates
    /// 6. **Yaw Control**: yaw rate from the setpoint attitude's yaw
    /// 7. **Body Rate Control**: moments
    /// 8. **Motor Mixing**: per-motor thrusts, clamped to motor limits
    ///
    /// # Arguments
    ///
    /// * `dt` - Control period (s)
    /// * `sim_time` - Time at which the trajectory is sampled (s)
    /// * `state` - Current estimated vehicle state
    /// * `trajectory` - Setpoint source
    ///
    /// # Example
    ///
    /// ```
    /// # use nalgebra::Vector3;
    /// # use quad_control::{GainParameters, QuadController, TrajectoryPoint, VehicleState};
    /// let mut controller = QuadController::new(GainParameters::default())?;
    /// let hover = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -5.0), 0.0);
    /// let estimate = VehicleState {
    ///     position: hover.position,
    ///     ..VehicleState::default()
    /// };
    /// let cmd = controller.run_control(0.002, 0.0, &estimate, &hover);
    /// assert_eq!(controller.current_trajectory_point().time, 0.0);
    /// assert_eq!(*controller.last_command(), cmd);
    /// # Ok::<(), quad_control::ControlError>(())
    /// ```
    pub fn run_control<T>(
        &mut self,
        dt: f64,
        sim_time: f64,
        state: &VehicleState,
        trajectory: &T,
    ) -> VehicleCommand
    where
        T: TrajectorySource + ?Sized,
    {
        self.cur_traj_point = trajectory.sample(sim_time);
        let traj = self.cur_traj_point;

        let coll_thrust_cmd = self.altitude_control(
            traj.position.z,
            traj.velocity.z,
            state.position.z,
            state.velocity.z,
            &state.attitude,
            traj.accel.z,
            dt,
        );

        // reserve some thrust margin for angle control
        let min_thrust = self.params.min_motor_thrust;
        let max_thrust = self.params.max_motor_thrust;
        let thrust_margin = THRUST_MARGIN_FRACTION * (max_thrust - min_thrust);
        let coll_thrust_cmd = coll_thrust_cmd.clamp(
            (min_thrust + thrust_margin) * 4.0,
            (max_thrust - thrust_margin) * 4.0,
        );

        let des_acc = self.lateral_position_control(
            traj.position,
            traj.velocity,
            state.position,
            state.velocity,
            traj.accel,
        );

        let mut des_omega = self.roll_pitch_control(des_acc, &state.attitude, coll_thrust_cmd);
        des_omega.z = self.yaw_control(yaw_of(&traj.attitude), yaw_of(&state.attitude));

        let des_moment = self.body_rate_control(des_omega, state.body_rates);

        self.cmd = self.generate_motor_commands(coll_thrust_cmd, des_moment);
        self.cmd
    }
}

/// Scales `v` down to `max` magnitude, preserving direction. A zero vector stays zero.
fn clamp_magnitude(v: Vector3<f64>, max: f64) -> Vector3<f64> {
    let magnitude = v.norm();
    if magnitude > max && magnitude > 0.0 {
        v * (max / magnitude)
    } else {
        v
    }
}
