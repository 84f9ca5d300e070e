use nalgebra::Vector3;
use quad_control::control::GRAVITY;
use quad_control::{
    ControlError, GainParameters, QuadController, TrajectoryPoint, VehicleState, YamlProvider,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

const PARAMS: &str = "
QuadControlParams:
  Mass: 0.5
  L: 0.17
  Ixx: 0.0023
  Iyy: 0.0023
  Izz: 0.0046
  kappa: 0.016
  kpPosXY: 2.5
  kpPosZ: 4
  KiPosZ: 40
  kpVelXY: 10
  kpVelZ: 12
  kpBank: 12
  kpYaw: 3
  kpPQR: [80, 80, 6]
  maxAscentRate: 5
  maxDescentRate: 2
  maxSpeedXY: 5
  maxHorizAccel: 12
  maxTiltAngle: 0.7
  minMotorThrust: 0.1
  maxMotorThrust: 4.5
";

// Climbs from the ground to 1 m and holds, with a level vehicle whose only
// motion is vertical: z'' = g - T / m (NED).
fn main() -> Result<(), ControlError> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .ok();

    let provider = YamlProvider::from_yaml_str(PARAMS, "QuadControlParams")?;
    let params = GainParameters::from_provider(&provider)?;
    let mut controller = QuadController::new(params)?;

    let target = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -1.0), 0.0);
    let mut state = VehicleState::default();

    let simulation_span = 5.0;
    let dt = 0.002;
    let mut current_time = 0.0;
    let mut step = 0usize;

    while current_time < simulation_span {
        let cmd = controller.run_control(dt, current_time, &state, &target);

        let accel_z = GRAVITY - cmd.collective_thrust() / params.mass;
        state.velocity.z += accel_z * dt;
        state.position.z += state.velocity.z * dt;

        if step % 250 == 0 {
            println!(
                "t={:.2} z={:.3} vz={:.3} thrusts=[{:.3}, {:.3}, {:.3}, {:.3}]",
                current_time,
                state.position.z,
                state.velocity.z,
                cmd.desired_thrusts_n[0],
                cmd.desired_thrusts_n[1],
                cmd.desired_thrusts_n[2],
                cmd.desired_thrusts_n[3],
            );
        }

        current_time += dt;
        step += 1;
    }

    Ok(())
}
