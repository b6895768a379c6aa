use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_derive::Deserialize;

use crate::catalog::memory::MemoryCatalog;
use crate::catalog::{
    BasinTimeRow, FlowBoundaryTimeRow, LevelBoundaryTimeRow, PidControlTimeRow,
    TabulatedRatingCurveTimeRow, UserDemandTimeRow,
};
use crate::config::Config;
use crate::errors::TorneError;

/// Loads the csv-directory form of the input store into a
/// MemoryCatalog. Table files live under input_dir as `{Table}.csv`,
/// individually overridable from the config; absent optional tables
/// are simply empty. Time columns hold timestamps and are converted to
/// seconds since starttime here, so the core never sees absolute time.
pub fn load_csv_catalog(config: &Config) -> Result<MemoryCatalog, TorneError> {
    let loader = Loader {
        dir: config.input_dir.clone(),
        start: config.starttime,
        config: config.clone(),
    };
    let mut cat = MemoryCatalog::new();

    cat.nodes = loader.required("Node", None)?;
    cat.edges = loader.required("Edge", None)?;

    cat.basin_profiles = loader.optional("BasinProfile", loader.path_static("Basin"))?;
    cat.basin_state = loader.optional("BasinState", None)?;
    cat.basin_static = loader.optional("BasinStatic", None)?;
    cat.basin_time = loader
        .optional_raw::<RawBasinTimeRow>("BasinTime", loader.path_time("Basin"))?
        .into_iter()
        .map(|r| r.convert(&loader))
        .collect::<Result<_, _>>()?;

    cat.linear_resistance_static =
        loader.optional("LinearResistanceStatic", loader.path_static("LinearResistance"))?;
    cat.manning_resistance_static =
        loader.optional("ManningResistanceStatic", loader.path_static("ManningResistance"))?;
    cat.tabulated_rating_curve_static = loader.optional(
        "TabulatedRatingCurveStatic",
        loader.path_static("TabulatedRatingCurve"),
    )?;
    cat.tabulated_rating_curve_time = loader
        .optional_raw::<RawRatingCurveTimeRow>(
            "TabulatedRatingCurveTime",
            loader.path_time("TabulatedRatingCurve"),
        )?
        .into_iter()
        .map(|r| r.convert(&loader))
        .collect::<Result<_, _>>()?;
    cat.fractional_flow_static =
        loader.optional("FractionalFlowStatic", loader.path_static("FractionalFlow"))?;
    cat.level_boundary_static =
        loader.optional("LevelBoundaryStatic", loader.path_static("LevelBoundary"))?;
    cat.level_boundary_time = loader
        .optional_raw::<RawLevelBoundaryTimeRow>(
            "LevelBoundaryTime",
            loader.path_time("LevelBoundary"),
        )?
        .into_iter()
        .map(|r| r.convert(&loader))
        .collect::<Result<_, _>>()?;
    cat.flow_boundary_static =
        loader.optional("FlowBoundaryStatic", loader.path_static("FlowBoundary"))?;
    cat.flow_boundary_time = loader
        .optional_raw::<RawFlowBoundaryTimeRow>(
            "FlowBoundaryTime",
            loader.path_time("FlowBoundary"),
        )?
        .into_iter()
        .map(|r| r.convert(&loader))
        .collect::<Result<_, _>>()?;
    cat.pump_static = loader.optional("PumpStatic", loader.path_static("Pump"))?;
    cat.outlet_static = loader.optional("OutletStatic", loader.path_static("Outlet"))?;
    cat.pid_control_static =
        loader.optional("PidControlStatic", loader.path_static("PidControl"))?;
    cat.pid_control_time = loader
        .optional_raw::<RawPidControlTimeRow>("PidControlTime", loader.path_time("PidControl"))?
        .into_iter()
        .map(|r| r.convert(&loader))
        .collect::<Result<_, _>>()?;
    cat.user_demand_static =
        loader.optional("UserDemandStatic", loader.path_static("UserDemand"))?;
    cat.user_demand_time = loader
        .optional_raw::<RawUserDemandTimeRow>("UserDemandTime", loader.path_time("UserDemand"))?
        .into_iter()
        .map(|r| r.convert(&loader))
        .collect::<Result<_, _>>()?;
    cat.level_demand_static =
        loader.optional("LevelDemandStatic", loader.path_static("LevelDemand"))?;
    cat.flow_demand_static =
        loader.optional("FlowDemandStatic", loader.path_static("FlowDemand"))?;
    cat.discrete_control_variables = loader.optional("DiscreteControlVariable", None)?;
    cat.discrete_control_conditions = loader.optional("DiscreteControlCondition", None)?;
    cat.discrete_control_logic = loader.optional("DiscreteControlLogic", None)?;
    cat.subgrid = loader.optional("BasinSubgrid", None)?;

    Ok(cat)
}

struct Loader {
    dir: PathBuf,
    start: NaiveDateTime,
    config: Config,
}

impl Loader {
    fn path_static(&self, kind: &str) -> Option<PathBuf> {
        self.config
            .tables
            .get(kind)
            .and_then(|o| o.static_path.clone())
    }

    fn path_time(&self, kind: &str) -> Option<PathBuf> {
        self.config.tables.get(kind).and_then(|o| o.time.clone())
    }

    fn resolve(&self, table: &str, override_path: Option<PathBuf>) -> PathBuf {
        match override_path {
            Some(p) if p.is_absolute() => p,
            Some(p) => self.dir.join(p),
            None => self.dir.join(format!("{table}.csv")),
        }
    }

    fn required<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        override_path: Option<PathBuf>,
    ) -> Result<Vec<T>, TorneError> {
        let path = self.resolve(table, override_path);
        if !path.exists() {
            return Err(TorneError::Io(format!(
                "required table {} not found at {}",
                table,
                path.display()
            )));
        }
        self.read(&path)
    }

    fn optional<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        override_path: Option<PathBuf>,
    ) -> Result<Vec<T>, TorneError> {
        let path = self.resolve(table, override_path);
        if !path.exists() {
            return Ok(vec![]);
        }
        self.read(&path)
    }

    fn optional_raw<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        override_path: Option<PathBuf>,
    ) -> Result<Vec<T>, TorneError> {
        self.optional(table, override_path)
    }

    fn read<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, TorneError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| TorneError::Io(format!("cannot open {}: {e}", path.display())))?;
        let mut rows = vec![];
        for (line, record) in reader.deserialize().enumerate() {
            let row: T = record.map_err(|e| {
                TorneError::Io(format!("{} line {}: {e}", path.display(), line + 2))
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn seconds(&self, time: &str) -> Result<f64, TorneError> {
        let parsed = parse_timestamp(time).ok_or_else(|| {
            TorneError::Io(format!("cannot parse timestamp {time:?}"))
        })?;
        Ok((parsed - self.start).num_milliseconds() as f64 / 1000.0)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    s.parse::<chrono::NaiveDate>()
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
}

// Raw forms of the time tables: timestamps still text.

#[derive(Debug, Clone, Deserialize)]
struct RawBasinTimeRow {
    node_id: i32,
    time: String,
    #[serde(default)]
    precipitation: Option<f64>,
    #[serde(default)]
    potential_evaporation: Option<f64>,
    #[serde(default)]
    drainage: Option<f64>,
    #[serde(default)]
    infiltration: Option<f64>,
    #[serde(default)]
    urban_runoff: Option<f64>,
}

impl RawBasinTimeRow {
    fn convert(self, loader: &Loader) -> Result<BasinTimeRow, TorneError> {
        Ok(BasinTimeRow {
            node_id: self.node_id,
            time: loader.seconds(&self.time)?,
            precipitation: self.precipitation,
            potential_evaporation: self.potential_evaporation,
            drainage: self.drainage,
            infiltration: self.infiltration,
            urban_runoff: self.urban_runoff,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawRatingCurveTimeRow {
    node_id: i32,
    time: String,
    level: f64,
    discharge: f64,
}

impl RawRatingCurveTimeRow {
    fn convert(self, loader: &Loader) -> Result<TabulatedRatingCurveTimeRow, TorneError> {
        Ok(TabulatedRatingCurveTimeRow {
            node_id: self.node_id,
            time: loader.seconds(&self.time)?,
            level: self.level,
            discharge: self.discharge,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawLevelBoundaryTimeRow {
    node_id: i32,
    time: String,
    level: f64,
}

impl RawLevelBoundaryTimeRow {
    fn convert(self, loader: &Loader) -> Result<LevelBoundaryTimeRow, TorneError> {
        Ok(LevelBoundaryTimeRow {
            node_id: self.node_id,
            time: loader.seconds(&self.time)?,
            level: self.level,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawFlowBoundaryTimeRow {
    node_id: i32,
    time: String,
    flow_rate: f64,
}

impl RawFlowBoundaryTimeRow {
    fn convert(self, loader: &Loader) -> Result<FlowBoundaryTimeRow, TorneError> {
        Ok(FlowBoundaryTimeRow {
            node_id: self.node_id,
            time: loader.seconds(&self.time)?,
            flow_rate: self.flow_rate,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawPidControlTimeRow {
    node_id: i32,
    time: String,
    target: f64,
    proportional: f64,
    integral: f64,
    derivative: f64,
}

impl RawPidControlTimeRow {
    fn convert(self, loader: &Loader) -> Result<PidControlTimeRow, TorneError> {
        Ok(PidControlTimeRow {
            node_id: self.node_id,
            time: loader.seconds(&self.time)?,
            target: self.target,
            proportional: self.proportional,
            integral: self.integral,
            derivative: self.derivative,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawUserDemandTimeRow {
    node_id: i32,
    time: String,
    demand: f64,
    return_factor: f64,
    min_level: f64,
    priority: i32,
}

impl RawUserDemandTimeRow {
    fn convert(self, loader: &Loader) -> Result<UserDemandTimeRow, TorneError> {
        Ok(UserDemandTimeRow {
            node_id: self.node_id,
            time: loader.seconds(&self.time)?,
            demand: self.demand,
            return_factor: self.return_factor,
            min_level: self.min_level,
            priority: self.priority,
        })
    }
}
