use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::allocation::{AllocationRecord, FlowRecord};
use crate::errors::TorneError;
use crate::graph::NodeId;
use crate::nodes::discrete_control::ControlEvent;

/// One output frame row per basin.
#[derive(Debug, Clone)]
pub struct BasinRow {
    pub time: f64,
    pub node_id: i32,
    pub storage: f64,
    pub level: f64,
    pub inflow_rate: f64,
    pub outflow_rate: f64,
    pub precipitation: f64,
    pub evaporation: f64,
    pub drainage: f64,
    pub infiltration: f64,
    pub balance_error: f64,
    pub relative_error: f64,
}

/// One output frame row per flow edge. Basin vertical-flux totals ride
/// along as self-edges with a null edge id.
#[derive(Debug, Clone)]
pub struct FlowRow {
    pub time: f64,
    pub edge_id: Option<i32>,
    pub from_node_id: i32,
    pub to_node_id: i32,
    pub flow_rate: f64,
}

#[derive(Debug, Clone)]
pub struct SubgridRow {
    pub time: f64,
    pub subgrid_id: i32,
    pub subgrid_level: f64,
}

/// In-memory result buffers, appended by the output callback and
/// flushed to csv files by finalize. Holds whatever frames were
/// written when a run stops early.
#[derive(Debug, Clone, Default)]
pub struct ResultBuffers {
    pub basin: Vec<BasinRow>,
    pub flow: Vec<FlowRow>,
    pub control: Vec<ControlEvent>,
    pub allocation: Vec<AllocationRecord>,
    pub allocation_flow: Vec<FlowRecord>,
    pub subgrid: Vec<SubgridRow>,
}

impl ResultBuffers {
    /// Write all result tables under `dir`, gzipped when asked.
    pub fn write_all(
        &self,
        dir: &Path,
        compression: bool,
        compression_level: u32,
    ) -> Result<(), TorneError> {
        fs::create_dir_all(dir)?;
        let open = |name: &str| open_writer(dir, name, compression, compression_level);

        let mut w = open("basin")?;
        w.write_record([
            "time",
            "node_id",
            "storage",
            "level",
            "inflow_rate",
            "outflow_rate",
            "precipitation",
            "evaporation",
            "drainage",
            "infiltration",
            "balance_error",
            "relative_error",
        ])?;
        for row in &self.basin {
            w.write_record([
                row.time.to_string(),
                row.node_id.to_string(),
                row.storage.to_string(),
                row.level.to_string(),
                row.inflow_rate.to_string(),
                row.outflow_rate.to_string(),
                row.precipitation.to_string(),
                row.evaporation.to_string(),
                row.drainage.to_string(),
                row.infiltration.to_string(),
                row.balance_error.to_string(),
                row.relative_error.to_string(),
            ])?;
        }
        w.flush()?;

        let mut w = open("flow")?;
        w.write_record(["time", "edge_id", "from_node_id", "to_node_id", "flow_rate"])?;
        for row in &self.flow {
            w.write_record([
                row.time.to_string(),
                row.edge_id.map(|id| id.to_string()).unwrap_or_default(),
                row.from_node_id.to_string(),
                row.to_node_id.to_string(),
                row.flow_rate.to_string(),
            ])?;
        }
        w.flush()?;

        let mut w = open("control")?;
        w.write_record(["time", "control_node_id", "truth_state", "control_state"])?;
        for event in &self.control {
            w.write_record([
                event.time.to_string(),
                event.control_node_id.external_id.to_string(),
                event.truth_state.clone(),
                event.control_state.clone(),
            ])?;
        }
        w.flush()?;

        let mut w = open("allocation")?;
        w.write_record([
            "time",
            "subnetwork_id",
            "node_id",
            "priority",
            "demand",
            "allocated",
            "realized",
        ])?;
        for row in &self.allocation {
            w.write_record([
                row.time.to_string(),
                row.subnetwork_id.to_string(),
                row.node_id.external_id.to_string(),
                row.priority.to_string(),
                row.demand.to_string(),
                row.allocated.to_string(),
                row.realized.to_string(),
            ])?;
        }
        w.flush()?;

        let mut w = open("allocation_flow")?;
        w.write_record([
            "time",
            "from_node_id",
            "to_node_id",
            "subnetwork_id",
            "priority",
            "flow_rate",
            "optimization_type",
        ])?;
        for row in &self.allocation_flow {
            w.write_record([
                row.time.to_string(),
                row.from.external_id.to_string(),
                row.to.external_id.to_string(),
                row.subnetwork_id.to_string(),
                row.priority.to_string(),
                row.flow_rate.to_string(),
                row.optimization_type.as_str().to_string(),
            ])?;
        }
        w.flush()?;

        let mut w = open("subgrid_level")?;
        w.write_record(["time", "subgrid_id", "subgrid_level"])?;
        for row in &self.subgrid {
            w.write_record([
                row.time.to_string(),
                row.subgrid_id.to_string(),
                row.subgrid_level.to_string(),
            ])?;
        }
        w.flush()?;

        Ok(())
    }
}

/// Final basin levels, written when the config names an outstate path.
pub fn write_outstate(
    path: &Path,
    basins: &[(NodeId, f64)],
) -> Result<(), TorneError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = csv::Writer::from_path(path)
        .map_err(|e| TorneError::Io(format!("cannot write {}: {e}", path.display())))?;
    w.write_record(["node_id", "level"])?;
    for (id, level) in basins {
        w.write_record([id.external_id.to_string(), level.to_string()])?;
    }
    w.flush()?;
    Ok(())
}

fn open_writer(
    dir: &Path,
    name: &str,
    compression: bool,
    level: u32,
) -> Result<csv::Writer<Box<dyn Write>>, TorneError> {
    let inner: Box<dyn Write> = if compression {
        let file = fs::File::create(dir.join(format!("{name}.csv.gz")))?;
        Box::new(GzEncoder::new(file, Compression::new(level)))
    } else {
        Box::new(fs::File::create(dir.join(format!("{name}.csv")))?)
    };
    Ok(csv::Writer::from_writer(inner))
}
