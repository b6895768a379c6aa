use thiserror::Error;

use crate::graph::{EdgeKind, NodeId, NodeKind};

/// Structural errors raised by the network graph.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("{node} has {found} {kind:?} {direction}neighbors where exactly one is required")]
    DegreeViolation {
        node: NodeId,
        kind: EdgeKind,
        direction: &'static str,
        found: usize,
    },
    #[error("no edge from {from} to {to}")]
    UnknownEdge { from: NodeId, to: NodeId },
    #[error("unknown node {kind:?} #{external_id}")]
    UnknownNode { kind: NodeKind, external_id: i32 },
    #[error("duplicate node {node}")]
    DuplicateNode { node: NodeId },
}

/// A single schema or consistency problem found while loading a model.
/// These are collected and reported together, then the load fails.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("edge #{edge_id}: flow edge {from} -> {to} is not allowed")]
    FlowEdgeNotAllowed { edge_id: i32, from: NodeId, to: NodeId },
    #[error("edge #{edge_id}: control edge {from} -> {to} is not allowed")]
    ControlEdgeNotAllowed { edge_id: i32, from: NodeId, to: NodeId },
    #[error("{node} has {found} flow inneighbors, allowed range is [{min}, {}]", max.map(|m| m.to_string()).unwrap_or_else(|| "inf".to_string()))]
    FlowInDegree {
        node: NodeId,
        found: usize,
        min: usize,
        max: Option<usize>,
    },
    #[error("{node} has {found} flow outneighbors, allowed range is [{min}, {}]", max.map(|m| m.to_string()).unwrap_or_else(|| "inf".to_string()))]
    FlowOutDegree {
        node: NodeId,
        found: usize,
        min: usize,
        max: Option<usize>,
    },
    #[error("{node}: missing required static or time data")]
    MissingData { node: NodeId },
    #[error("{node}: initial level {level} is below the basin bottom {bottom}")]
    LevelBelowBottom { node: NodeId, level: f64, bottom: f64 },
    #[error("{node}: time column is not strictly increasing")]
    TimeNotIncreasing { node: NodeId },
    #[error("table {table}: rows are not sorted by {order} (external tables must be pre-sorted)")]
    TableNotSorted { table: String, order: String },
    #[error("{node}: negative flow rate {value}")]
    NegativeFlowRate { node: NodeId, value: f64 },
    #[error("{node}: flow fractions for control state {control_state:?} sum to {sum}, expected 1")]
    FractionSum {
        node: NodeId,
        control_state: String,
        sum: f64,
    },
    #[error("{node}: negative fraction {value}")]
    NegativeFraction { node: NodeId, value: f64 },
    #[error("{node}: truth state {truth_state:?} contains a character outside {{T, F, *}}")]
    BadTruthState { node: NodeId, truth_state: String },
    #[error("{node}: truth state {truth_state:?} expands to conflicting control states {a:?} and {b:?}")]
    AmbiguousTruthState {
        node: NodeId,
        truth_state: String,
        a: String,
        b: String,
    },
    #[error("{node}: profile levels must be strictly increasing (repeated level {level})")]
    RepeatedProfileLevel { node: NodeId, level: f64 },
    #[error("{node}: profile areas must be non-negative and non-decreasing towards the top")]
    BadProfileArea { node: NodeId },
    #[error("{node}: listen node {listen} is not a basin adjacent to the controlled node")]
    PidListenNotAdjacent { node: NodeId, listen: NodeId },
    #[error("unknown node type {0:?}")]
    UnknownNodeKind(String),
    #[error("subnetwork {subnetwork_id}: nodes do not form a connected flow subgraph")]
    SubnetworkNotConnected { subnetwork_id: i32 },
    #[error("interpolant for {node} needs at least one sample point")]
    EmptyInterpolant { node: NodeId },
    #[error("{0}")]
    Other(String),
}

/// The collected outcome of validating a catalog. Everything found wrong
/// is listed, one line per problem.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turns the report into a result, failing when anything was collected.
    pub fn into_result(self) -> Result<(), TorneError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(TorneError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} validation error(s):", self.errors.len())?;
        for e in &self.errors {
            writeln!(f, "  - {}", e)?;
        }
        Ok(())
    }
}

/// Errors raised while building or solving the allocation problem.
#[derive(Debug, Clone, Error)]
pub enum AllocationError {
    #[error("subnetwork {subnetwork_id}: source edge {from} -> {to} does not start at a boundary or main network node")]
    BadSourceNode {
        subnetwork_id: i32,
        from: NodeId,
        to: NodeId,
    },
    #[error("subnetwork {subnetwork_id}: allocation problem is {status:?} at priority {priority}")]
    NotOptimal {
        subnetwork_id: i32,
        priority: i32,
        status: crate::allocation::solver::LpStatus,
    },
    #[error("subnetwork {subnetwork_id}: {message}")]
    Construction { subnetwork_id: i32, message: String },
}

/// Errors raised by the ODE step loop.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    #[error("integrator exhausted maxiters = {maxiters} at t = {t}")]
    MaxItersExceeded { t: f64, maxiters: usize },
    #[error("step size collapsed below {dt_min} at t = {t}")]
    StepSizeTooSmall { t: f64, dt_min: f64 },
    #[error("negative storage {storage} in {node} at t = {t}")]
    NegativeStorage { node: NodeId, storage: f64, t: f64 },
    #[error("update_until target {target} lies before current time {current}")]
    TimeBackwards { target: f64, current: f64 },
    #[error("state vector has length {found}, expected {expected}")]
    BadStateLength { found: usize, expected: usize },
}

/// Top level error for the public API and the command line.
#[derive(Debug, Error)]
pub enum TorneError {
    #[error("{0}")]
    Validation(ValidationReport),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TorneError {
    fn from(e: std::io::Error) -> Self {
        TorneError::Io(e.to_string())
    }
}

impl From<csv::Error> for TorneError {
    fn from(e: csv::Error) -> Self {
        TorneError::Io(e.to_string())
    }
}
