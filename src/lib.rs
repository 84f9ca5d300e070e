//! # quad_control
//!
//! Flight-control core for a quad-X multirotor: a cascade of feedback control
//! laws turning a trajectory setpoint and a state estimate into four motor
//! thrust commands.
//!
//! Trajectory generation, state estimation, the vehicle itself and the origin
//! of the parameters are all outside this crate. It consumes their outputs and
//! produces a [`VehicleCommand`] per tick, with no I/O and no allocation.
//!
//! ## Example
//!
//! ```
//! use nalgebra::Vector3;
//! use quad_control::{GainParameters, MapProvider, QuadController, TrajectoryPoint, VehicleState};
//!
//! let mut provider = MapProvider::new();
//! provider.set("kpPosZ", 4.0).set("kpVelZ", 12.0).set("maxMotorThrust", 4.5);
//! let params = GainParameters::from_provider(&provider).unwrap();
//! let mut controller = QuadController::new(params).unwrap();
//!
//! let hover = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -5.0), 0.0);
//! let state = VehicleState {
//!     position: Vector3::new(0.0, 0.0, -5.0),
//!     ..VehicleState::default()
//! };
//! let cmd = controller.run_control(0.002, 0.0, &state, &hover);
//! assert!((cmd.collective_thrust() - 0.5 * 9.81).abs() < 1e-9);
//! ```
pub mod control;
pub mod error;
pub mod params;
pub mod state;
pub mod trajectory;

pub use control::QuadController;
pub use error::ControlError;
pub use params::{Defaults, GainParameters, MapProvider, ParamProvider, YamlProvider};
pub use state::{Attitude, TrajectoryPoint, VehicleCommand, VehicleState};
pub use trajectory::TrajectorySource;
