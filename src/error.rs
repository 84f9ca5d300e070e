/// Errors raised while building a controller from its parameters.
///
/// None of these can occur inside a control tick: every per-tick
/// out-of-range condition is clamped and reported through the `log` facade.
#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    /// A resolved parameter that would make the control law meaningless
    #[error("invalid parameter `{key}` = {value}: {reason}")]
    InvalidParameter {
        key: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// A parameter document with the wrong shape
    #[error("configuration error: {0}")]
    Config(String),
    /// YAML parse failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
