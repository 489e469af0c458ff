//! # portsim Configuration System
//!
//! One explicit configuration value, built once and passed by reference to
//! every component that needs it.
//!
//! ## Features
//! - **Layered loading**: defaults, YAML files, then `PORTSIM_*` environment
//! - **Validation**: non-positive rates, weights, quanta and limits are rejected
//!   before any component is built
//! - **Flow tables**: per-flow weights and priorities as dense lists or sparse
//!   `{flow, value}` entries

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod port;
mod shaper;
mod simulation;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use port::{AdmissionConfig, DisciplineConfig, FlowEntry, FlowParams, LimitUnit, PortConfig};
pub use shaper::{MarkerConfig, ShaperConfig};
pub use simulation::SimulationConfig;
pub use telemetry::TelemetryConfig;

/// Top‑level configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PortSimConfig {
    #[serde(default)]
    #[validate(nested)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    #[validate(nested)]
    pub ports: Vec<PortConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub shapers: Vec<ShaperConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub markers: Vec<MarkerConfig>,
}

impl PortSimConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/portsim.yaml`, if present
    /// 3. `config/<PORTSIM_ENV>.yaml`, if present
    /// 4. `PORTSIM_*` environment variables (`__` separates nested keys)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(PortSimConfig::default()));

        if Path::new("config/portsim.yaml").exists() {
            figment = figment.merge(Yaml::file("config/portsim.yaml"));
        }

        if let Ok(env) = std::env::var("PORTSIM_ENV") {
            let env_file = format!("config/{}.yaml", env);
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::extract(figment.merge(Env::prefixed("PORTSIM_").split("__")))
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(PortSimConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("PORTSIM_").split("__")),
        )
    }

    /// Parse and validate an inline YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::extract(
            Figment::from(Serialized::defaults(PortSimConfig::default())).merge(Yaml::string(yaml)),
        )
    }

    pub fn port(&self, name: &str) -> Option<&PortConfig> {
        self.ports.iter().find(|port| port.name == name)
    }

    pub fn shaper(&self, name: &str) -> Option<&ShaperConfig> {
        self.shapers.iter().find(|shaper| shaper.name == name)
    }

    pub fn marker(&self, name: &str) -> Option<&MarkerConfig> {
        self.markers.iter().find(|marker| marker.name == name)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}
