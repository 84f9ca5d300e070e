use std::collections::HashMap;

use log::debug;
use log::warn;
use nalgebra::Vector3;
use serde::Deserialize;

use crate::error::ControlError;

/// Source of named configuration values.
///
/// The controller never reads configuration itself; the surrounding
/// application picks a provider (simulator file, embedded parameter store,
/// test fixture) and hands the resolved [`GainParameters`] over at construction.
pub trait ParamProvider {
    /// Returns the value stored under `key`, or `default` when absent.
    fn resolve(&self, key: &str, default: f64) -> f64;

    /// Returns a 3-vector stored under `key`.
    ///
    /// The provided implementation reads the scalars `key.x`, `key.y` and
    /// `key.z`, each falling back to the matching component of `default`.
    fn resolve_vector3(&self, key: &str, default: Vector3<f64>) -> Vector3<f64> {
        resolve_components(self, key, default)
    }
}

fn resolve_components<P: ParamProvider + ?Sized>(
    provider: &P,
    key: &str,
    default: Vector3<f64>,
) -> Vector3<f64> {
    Vector3::new(
        provider.resolve(&format!("{key}.x"), default.x),
        provider.resolve(&format!("{key}.y"), default.y),
        provider.resolve(&format!("{key}.z"), default.z),
    )
}

/// Provider with nothing in it: every key resolves to its default.
#[derive(Clone, Copy, Debug, Default)]
pub struct Defaults;

impl ParamProvider for Defaults {
    fn resolve(&self, _key: &str, default: f64) -> f64 {
        default
    }
}

/// Flat key-value store, e.g. filled from an embedded parameter table.
#[derive(Clone, Debug, Default)]
pub struct MapProvider {
    values: HashMap<String, f64>,
}

impl MapProvider {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl FromIterator<(String, f64)> for MapProvider {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl ParamProvider for MapProvider {
    fn resolve(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(value) => *value,
            None => {
                debug!("parameter {key} not set, using default {default}");
                default
            }
        }
    }
}

/// Reads one section of a YAML document.
///
/// Dotted keys walk nested mappings, so `kpPQR.x` finds either a literal
/// `kpPQR.x` entry or `kpPQR: { x: .. }`. Vectors may also be written as a
/// three element sequence: `kpPQR: [23, 23, 5]`.
#[derive(Clone, Debug)]
pub struct YamlProvider {
    section: serde_yaml::Value,
}

impl YamlProvider {
    /// Selects `section` from an already parsed document.
    ///
    /// # Errors
    ///
    /// * `ControlError::Config` - if the section is missing or not a mapping
    pub fn new(document: &serde_yaml::Value, section: &str) -> Result<Self, ControlError> {
        let section_value = document
            .get(section)
            .ok_or_else(|| ControlError::Config(format!("missing section `{section}`")))?;
        if !section_value.is_mapping() {
            return Err(ControlError::Config(format!(
                "section `{section}` is not a mapping"
            )));
        }
        Ok(Self {
            section: section_value.clone(),
        })
    }

    /// Parses `text` and selects `section` from it.
    pub fn from_yaml_str(text: &str, section: &str) -> Result<Self, ControlError> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        Self::new(&document, section)
    }

    fn lookup(&self, key: &str) -> Option<&serde_yaml::Value> {
        if let Some(value) = self.section.get(key) {
            return Some(value);
        }
        key.split('.')
            .try_fold(&self.section, |node, part| node.get(part))
    }
}

impl ParamProvider for YamlProvider {
    fn resolve(&self, key: &str, default: f64) -> f64 {
        match self.lookup(key) {
            Some(value) => value.as_f64().unwrap_or_else(|| {
                warn!("parameter {key} is not a number ({value:?}), using default {default}");
                default
            }),
            None => {
                debug!("parameter {key} not set, using default {default}");
                default
            }
        }
    }

    fn resolve_vector3(&self, key: &str, default: Vector3<f64>) -> Vector3<f64> {
        let from_sequence = self
            .lookup(key)
            .and_then(|value| value.as_sequence())
            .and_then(|seq| {
                if seq.len() == 3 {
                    Some(Vector3::new(
                        seq[0].as_f64()?,
                        seq[1].as_f64()?,
                        seq[2].as_f64()?,
                    ))
                } else {
                    None
                }
            });
        match from_sequence {
            Some(vector) => vector,
            None => resolve_components(self, key, default),
        }
    }
}

/// Gains, physical constants and limits of one vehicle.
///
/// Built once at start-up and immutable for the controller's lifetime. Field
/// names in YAML follow the established parameter keys (`kpPosXY`, `KiPosZ`,
/// `maxHorizAccel`, `Mass`, `L`, ...). Missing keys take the defaults of
/// [`GainParameters::default`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GainParameters {
    /// Horizontal position P gain (1/s²)
    #[serde(rename = "kpPosXY")]
    pub kp_pos_xy: f64,
    /// Altitude P gain (1/s²)
    #[serde(rename = "kpPosZ")]
    pub kp_pos_z: f64,
    /// Altitude I gain (1/s³)
    #[serde(rename = "KiPosZ")]
    pub ki_pos_z: f64,
    /// Horizontal velocity gain (1/s)
    #[serde(rename = "kpVelXY")]
    pub kp_vel_xy: f64,
    /// Vertical velocity gain (1/s)
    #[serde(rename = "kpVelZ")]
    pub kp_vel_z: f64,
    /// Roll/pitch tilt P gain (1/s)
    #[serde(rename = "kpBank")]
    pub kp_bank: f64,
    /// Yaw P gain (1/s)
    #[serde(rename = "kpYaw")]
    pub kp_yaw: f64,
    /// Body rate P gains [p, q, r] (1/s)
    #[serde(rename = "kpPQR")]
    pub kp_pqr: Vector3<f64>,

    /// Maximum climb speed, positive (m/s)
    #[serde(rename = "maxAscentRate")]
    pub max_ascent_rate: f64,
    /// Maximum sink speed, positive (m/s)
    #[serde(rename = "maxDescentRate")]
    pub max_descent_rate: f64,
    /// Maximum commanded horizontal speed (m/s)
    #[serde(rename = "maxSpeedXY")]
    pub max_speed_xy: f64,
    /// Maximum commanded horizontal acceleration (m/s²)
    #[serde(rename = "maxHorizAccel")]
    pub max_accel_xy: f64,
    /// Limit on the commanded tilt components (rad)
    #[serde(rename = "maxTiltAngle")]
    pub max_tilt_angle: f64,
    /// Per-motor thrust floor (N)
    #[serde(rename = "minMotorThrust")]
    pub min_motor_thrust: f64,
    /// Per-motor thrust ceiling (N)
    #[serde(rename = "maxMotorThrust")]
    pub max_motor_thrust: f64,

    /// Vehicle mass (kg)
    #[serde(rename = "Mass")]
    pub mass: f64,
    /// Distance from center to motor (m)
    #[serde(rename = "L")]
    pub arm_length: f64,
    /// Rotor drag/thrust ratio (m)
    pub kappa: f64,
    /// Moment of inertia about body x (kg⋅m²)
    #[serde(rename = "Ixx")]
    pub ixx: f64,
    /// Moment of inertia about body y (kg⋅m²)
    #[serde(rename = "Iyy")]
    pub iyy: f64,
    /// Moment of inertia about body z (kg⋅m²)
    #[serde(rename = "Izz")]
    pub izz: f64,
}

impl Default for GainParameters {
    fn default() -> Self {
        Self {
            kp_pos_xy: 0.0,
            kp_pos_z: 0.0,
            ki_pos_z: 0.0,
            kp_vel_xy: 0.0,
            kp_vel_z: 0.0,
            kp_bank: 0.0,
            kp_yaw: 0.0,
            kp_pqr: Vector3::zeros(),
            max_ascent_rate: 100.0,
            max_descent_rate: 100.0,
            max_speed_xy: 100.0,
            max_accel_xy: 100.0,
            max_tilt_angle: 100.0,
            min_motor_thrust: 0.0,
            max_motor_thrust: 100.0,
            mass: 0.5,
            arm_length: 0.17,
            kappa: 0.016,
            ixx: 0.0023,
            iyy: 0.0023,
            izz: 0.0046,
        }
    }
}

impl GainParameters {
    /// Resolves every parameter through `provider`, then validates the result.
    ///
    /// # Errors
    ///
    /// * `ControlError::InvalidParameter` - see [`GainParameters::validate`]
    pub fn from_provider<P: ParamProvider + ?Sized>(provider: &P) -> Result<Self, ControlError> {
        let d = Self::default();
        let params = Self {
            kp_pos_xy: provider.resolve("kpPosXY", d.kp_pos_xy),
            kp_pos_z: provider.resolve("kpPosZ", d.kp_pos_z),
            ki_pos_z: provider.resolve("KiPosZ", d.ki_pos_z),
            kp_vel_xy: provider.resolve("kpVelXY", d.kp_vel_xy),
            kp_vel_z: provider.resolve("kpVelZ", d.kp_vel_z),
            kp_bank: provider.resolve("kpBank", d.kp_bank),
            kp_yaw: provider.resolve("kpYaw", d.kp_yaw),
            kp_pqr: provider.resolve_vector3("kpPQR", d.kp_pqr),
            max_descent_rate: provider.resolve("maxDescentRate", d.max_descent_rate),
            max_ascent_rate: provider.resolve("maxAscentRate", d.max_ascent_rate),
            max_speed_xy: provider.resolve("maxSpeedXY", d.max_speed_xy),
            max_accel_xy: provider.resolve("maxHorizAccel", d.max_accel_xy),
            max_tilt_angle: provider.resolve("maxTiltAngle", d.max_tilt_angle),
            min_motor_thrust: provider.resolve("minMotorThrust", d.min_motor_thrust),
            max_motor_thrust: provider.resolve("maxMotorThrust", d.max_motor_thrust),
            mass: provider.resolve("Mass", d.mass),
            arm_length: provider.resolve("L", d.arm_length),
            kappa: provider.resolve("kappa", d.kappa),
            ixx: provider.resolve("Ixx", d.ixx),
            iyy: provider.resolve("Iyy", d.iyy),
            izz: provider.resolve("Izz", d.izz),
        };
        params.validate()?;
        Ok(params)
    }

    /// Deserializes `section` of a YAML document straight into parameters.
    ///
    /// # Example
    ///
    /// ```
    /// # use quad_control::GainParameters;
    /// let text = "QuadControlParams:\n  kpBank: 10\n";
    /// let params = GainParameters::from_yaml_str(text, "QuadControlParams")?;
    /// assert_eq!(params.kp_bank, 10.0);
    /// # Ok::<(), quad_control::ControlError>(())
    /// ```
    pub fn from_yaml_str(text: &str, section: &str) -> Result<Self, ControlError> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        let section_value = document
            .get(section)
            .ok_or_else(|| ControlError::Config(format!("missing section `{section}`")))?;
        let params: Self = serde_yaml::from_value(section_value.clone())?;
        params.validate()?;
        Ok(params)
    }

    /// Principal moments of inertia (kg⋅m²)
    pub fn inertia(&self) -> Vector3<f64> {
        Vector3::new(self.ixx, self.iyy, self.izz)
    }

    /// Checks the values the control law divides by or clamps against.
    ///
    /// Gains are not range checked: a zero or negative gain is a tuning choice.
    pub fn validate(&self) -> Result<(), ControlError> {
        let all = [
            ("kpPosXY", self.kp_pos_xy),
            ("kpPosZ", self.kp_pos_z),
            ("KiPosZ", self.ki_pos_z),
            ("kpVelXY", self.kp_vel_xy),
            ("kpVelZ", self.kp_vel_z),
            ("kpBank", self.kp_bank),
            ("kpYaw", self.kp_yaw),
            ("kpPQR.x", self.kp_pqr.x),
            ("kpPQR.y", self.kp_pqr.y),
            ("kpPQR.z", self.kp_pqr.z),
            ("maxAscentRate", self.max_ascent_rate),
            ("maxDescentRate", self.max_descent_rate),
            ("maxSpeedXY", self.max_speed_xy),
            ("maxHorizAccel", self.max_accel_xy),
            ("maxTiltAngle", self.max_tilt_angle),
            ("minMotorThrust", self.min_motor_thrust),
            ("maxMotorThrust", self.max_motor_thrust),
            ("Mass", self.mass),
            ("L", self.arm_length),
            ("kappa", self.kappa),
            ("Ixx", self.ixx),
            ("Iyy", self.iyy),
            ("Izz", self.izz),
        ];
        for (key, value) in all {
            if !value.is_finite() {
                return Err(ControlError::InvalidParameter {
                    key,
                    value,
                    reason: "must be finite",
                });
            }
        }

        let positive = [
            ("Mass", self.mass),
            ("L", self.arm_length),
            ("kappa", self.kappa),
            ("Ixx", self.ixx),
            ("Iyy", self.iyy),
            ("Izz", self.izz),
        ];
        for (key, value) in positive {
            if value <= 0.0 {
                return Err(ControlError::InvalidParameter {
                    key,
                    value,
                    reason: "must be positive",
                });
            }
        }

        let non_negative = [
            ("maxAscentRate", self.max_ascent_rate),
            ("maxDescentRate", self.max_descent_rate),
            ("maxSpeedXY", self.max_speed_xy),
            ("maxHorizAccel", self.max_accel_xy),
            ("maxTiltAngle", self.max_tilt_angle),
        ];
        for (key, value) in non_negative {
            if value < 0.0 {
                return Err(ControlError::InvalidParameter {
                    key,
                    value,
                    reason: "must not be negative",
                });
            }
        }

        if self.min_motor_thrust > self.max_motor_thrust {
            return Err(ControlError::InvalidParameter {
                key: "minMotorThrust",
                value: self.min_motor_thrust,
                reason: "exceeds maxMotorThrust",
            });
        }

        Ok(())
    }
}
