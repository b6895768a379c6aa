use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_derive::Deserialize;

use crate::allocation::ObjectiveType;
use crate::errors::TorneError;
use crate::solve::integrator::Algorithm;

/// Run configuration, TOML-shaped. Times inside the simulation are
/// seconds since starttime.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub starttime: NaiveDateTime,
    pub endtime: NaiveDateTime,
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub results: ResultsConfig,
    /// Per node kind overrides pointing at columnar files replacing the
    /// database tables, keyed by kind name.
    #[serde(default)]
    pub tables: HashMap<String, TableOverride>,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub use_allocation: bool,
    /// Seconds between allocation solves.
    pub timestep: f64,
    pub objective_type: String,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            use_allocation: false,
            timestep: 86400.0,
            objective_type: "linear_absolute".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub algorithm: String,
    pub autodiff: bool,
    /// Seconds between output frames; 0 = only start and end.
    pub saveat: f64,
    /// Fixed step size; 0 = adaptive.
    pub dt: f64,
    pub abstol: f64,
    pub reltol: f64,
    pub maxiters: usize,
    pub sparse: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            algorithm: "bs23".to_string(),
            autodiff: false,
            saveat: 86400.0,
            dt: 0.0,
            abstol: 1e-6,
            reltol: 1e-5,
            maxiters: 10_000_000,
            sparse: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbosity: String,
    pub timing: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: "info".to_string(),
            timing: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub compression: bool,
    pub compression_level: u32,
    /// Where to write the final basin state for warm starts.
    pub outstate: Option<PathBuf>,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            compression: false,
            compression_level: 6,
            outstate: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableOverride {
    #[serde(rename = "static")]
    pub static_path: Option<PathBuf>,
    pub time: Option<PathBuf>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, TorneError> {
        let text = fs::read_to_string(path)
            .map_err(|e| TorneError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| TorneError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TorneError> {
        if self.endtime <= self.starttime {
            return Err(TorneError::Config(format!(
                "endtime {} is not after starttime {}",
                self.endtime, self.starttime
            )));
        }
        if Algorithm::parse(&self.solver.algorithm).is_none() {
            return Err(TorneError::Config(format!(
                "unknown solver algorithm {:?}",
                self.solver.algorithm
            )));
        }
        if ObjectiveType::parse(&self.allocation.objective_type).is_none() {
            return Err(TorneError::Config(format!(
                "unknown allocation objective type {:?}",
                self.allocation.objective_type
            )));
        }
        if self.allocation.use_allocation && self.allocation.timestep <= 0.0 {
            return Err(TorneError::Config(
                "allocation timestep must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Simulated duration in seconds.
    pub fn duration(&self) -> f64 {
        (self.endtime - self.starttime).num_milliseconds() as f64 / 1000.0
    }

    /// Seconds since starttime of an absolute instant.
    pub fn seconds_since_start(&self, t: NaiveDateTime) -> f64 {
        (t - self.starttime).num_milliseconds() as f64 / 1000.0
    }

    pub fn objective_type(&self) -> ObjectiveType {
        ObjectiveType::parse(&self.allocation.objective_type).unwrap_or(ObjectiveType::LinearAbsolute)
    }

    pub fn algorithm(&self) -> Algorithm {
        Algorithm::parse(&self.solver.algorithm).unwrap_or(Algorithm::Bs23)
    }
}
