use crate::state::TrajectoryPoint;

/// Anything that can produce the trajectory setpoint for a given simulation time.
///
/// Trajectory generation and interpolation live outside the controller; this is
/// the seam through which a tick asks for its setpoint.
pub trait TrajectorySource {
    fn sample(&self, sim_time: f64) -> TrajectoryPoint;
}

/// A single point is a constant setpoint, re-stamped with the requested time.
impl TrajectorySource for TrajectoryPoint {
    fn sample(&self, sim_time: f64) -> TrajectoryPoint {
        TrajectoryPoint {
            time: sim_time,
            ..*self
        }
    }
}

impl<F> TrajectorySource for F
where
    F: Fn(f64) -> TrajectoryPoint,
{
    fn sample(&self, sim_time: f64) -> TrajectoryPoint {
        self(sim_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_constant_point_is_restamped() {
        let point = TrajectoryPoint::hold(Vector3::new(0.0, 0.0, -2.0), 0.0);
        let sampled = point.sample(3.5);
        assert_eq!(sampled.time, 3.5);
        assert_eq!(sampled.position, point.position);
    }

    #[test]
    fn test_closure_source() {
        let climb = |t: f64| TrajectoryPoint {
            position: Vector3::new(0.0, 0.0, -t),
            velocity: Vector3::new(0.0, 0.0, -1.0),
            time: t,
            ..TrajectoryPoint::default()
        };
        let sampled = climb.sample(2.0);
        assert_eq!(sampled.position.z, -2.0);
        assert_eq!(sampled.velocity.z, -1.0);
    }
}
