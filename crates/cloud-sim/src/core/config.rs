//! Simulation configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfigRaw {
    /// name of the allocation policy used by the scheduler
    pub allocation_policy: Option<String>,
    /// duration between consecutive scheduler firings, must be > 0
    pub scheduling_quantum: Option<f64>,
    /// message trip time between the core and a host
    pub message_delay: Option<f64>,
    /// name of the event tracer, purely advisory (no tracer is built into the core)
    pub tracer: Option<String>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    pub allocation_policy: String,
    pub scheduling_quantum: f64,
    pub message_delay: f64,
    pub tracer: String,
}

impl SimulationConfig {
    /// Creates simulation config with default parameter values.
    pub fn new() -> Self {
        Self {
            allocation_policy: "first-fit".to_string(),
            scheduling_quantum: 60.,
            message_delay: 0.,
            tracer: "none".to_string(),
        }
    }

    /// Creates simulation config by reading parameter values from a YAML file (uses default
    /// values for parameters absent from the file).
    pub fn from_file(file_name: &str) -> Self {
        let data: SimulationConfigRaw =
            serde_yaml::from_str(&std::fs::read_to_string(file_name).expect(&format!("Can't read file {}", file_name)))
                .expect(&format!("Can't parse YAML from file {}", file_name));
        let default = SimulationConfig::new();
        let config = Self {
            allocation_policy: data.allocation_policy.unwrap_or(default.allocation_policy),
            scheduling_quantum: data.scheduling_quantum.unwrap_or(default.scheduling_quantum),
            message_delay: data.message_delay.unwrap_or(default.message_delay),
            tracer: data.tracer.unwrap_or(default.tracer),
        };
        assert!(config.scheduling_quantum > 0., "scheduling_quantum must be positive");
        config
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a config value string, which consists of a name and optional options.
/// Example: `BestFitThreshold[threshold=0.8]` splits into `BestFitThreshold` and `"threshold=0.8"`.
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.to_string(), Some(r.to_string().replace(']', ""))),
        None => (config_str.to_string(), None),
    }
}

/// Parses an options string from a config value, returns a map with option names and values.
///
/// # Examples
///
/// ```rust
/// use cloud_sim::core::config::parse_options;
///
/// let options = parse_options("option1=0.8,option2=something");
/// assert_eq!(options.get("option1").unwrap(), "0.8");
/// assert_eq!(options.get("option2").unwrap(), "something");
/// assert_eq!(options.get("option3"), None);
/// ```
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.to_string(), value.to_string());
        }
    }
    options
}
