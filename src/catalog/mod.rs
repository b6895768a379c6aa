pub use build::build_model_data;
pub use memory::MemoryCatalog;

pub mod build;
pub mod csv;
pub mod memory;
pub mod validation;

use serde_derive::Deserialize;

/// Typed rows handed out by a catalog. Times are seconds since the
/// simulation start; converting from absolute timestamps is the
/// catalog implementation's job.

#[derive(Debug, Clone, Deserialize)]
pub struct NodeRow {
    pub node_id: i32,
    pub node_type: String,
    #[serde(default)]
    pub subnetwork_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeRow {
    pub fid: i32,
    pub from_node_type: String,
    pub from_node_id: i32,
    pub to_node_type: String,
    pub to_node_id: i32,
    pub edge_type: String,
    /// Which subnetwork this edge is a source for; absent = none.
    #[serde(default)]
    pub subnetwork_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasinProfileRow {
    pub node_id: i32,
    pub area: f64,
    pub level: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasinStateRow {
    pub node_id: i32,
    pub level: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasinStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default)]
    pub potential_evaporation: Option<f64>,
    #[serde(default)]
    pub drainage: Option<f64>,
    #[serde(default)]
    pub infiltration: Option<f64>,
    #[serde(default)]
    pub urban_runoff: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasinTimeRow {
    pub node_id: i32,
    pub time: f64,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default)]
    pub potential_evaporation: Option<f64>,
    #[serde(default)]
    pub drainage: Option<f64>,
    #[serde(default)]
    pub infiltration: Option<f64>,
    #[serde(default)]
    pub urban_runoff: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearResistanceStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub resistance: f64,
    #[serde(default)]
    pub max_flow_rate: Option<f64>,
    #[serde(default)]
    pub control_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManningResistanceStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub length: f64,
    pub manning_n: f64,
    pub profile_width: f64,
    pub profile_slope: f64,
    #[serde(default)]
    pub control_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabulatedRatingCurveStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub level: f64,
    pub discharge: f64,
    #[serde(default)]
    pub control_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabulatedRatingCurveTimeRow {
    pub node_id: i32,
    pub time: f64,
    pub level: f64,
    pub discharge: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FractionalFlowStaticRow {
    pub node_id: i32,
    pub fraction: f64,
    #[serde(default)]
    pub control_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelBoundaryStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub level: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelBoundaryTimeRow {
    pub node_id: i32,
    pub time: f64,
    pub level: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowBoundaryStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub flow_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowBoundaryTimeRow {
    pub node_id: i32,
    pub time: f64,
    pub flow_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PumpStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub flow_rate: f64,
    #[serde(default)]
    pub min_flow_rate: Option<f64>,
    #[serde(default)]
    pub max_flow_rate: Option<f64>,
    #[serde(default)]
    pub control_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutletStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub flow_rate: f64,
    #[serde(default)]
    pub min_flow_rate: Option<f64>,
    #[serde(default)]
    pub max_flow_rate: Option<f64>,
    #[serde(default)]
    pub min_crest_level: Option<f64>,
    #[serde(default)]
    pub control_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PidControlStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub listen_node_type: String,
    pub listen_node_id: i32,
    pub target: f64,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    #[serde(default)]
    pub control_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PidControlTimeRow {
    pub node_id: i32,
    pub time: f64,
    pub target: f64,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDemandStaticRow {
    pub node_id: i32,
    #[serde(default)]
    pub active: Option<bool>,
    pub demand: f64,
    pub return_factor: f64,
    pub min_level: f64,
    pub priority: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDemandTimeRow {
    pub node_id: i32,
    pub time: f64,
    pub demand: f64,
    pub return_factor: f64,
    pub min_level: f64,
    pub priority: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelDemandStaticRow {
    pub node_id: i32,
    pub min_level: f64,
    pub max_level: f64,
    pub priority: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowDemandStaticRow {
    pub node_id: i32,
    pub demand: f64,
    pub priority: i32,
}

/// One weighted term of a discrete-control compound variable.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscreteControlVariableRow {
    pub node_id: i32,
    pub compound_variable_id: i32,
    pub listen_node_type: String,
    pub listen_node_id: i32,
    pub variable: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub look_ahead: Option<f64>,
}

/// One threshold of a compound variable.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscreteControlConditionRow {
    pub node_id: i32,
    pub compound_variable_id: i32,
    pub greater_than: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscreteControlLogicRow {
    pub node_id: i32,
    pub truth_state: String,
    pub control_state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgridRow {
    pub subgrid_id: i32,
    pub node_id: i32,
    pub basin_level: f64,
    pub subgrid_level: f64,
}

/// Read-only adapter over the input store. Implementations answer with
/// typed rows; tables they do not carry default to empty. The builder
/// consumes exactly this interface, so the on-disk format stays out of
/// the core.
pub trait Catalog {
    fn nodes(&self) -> Vec<NodeRow>;
    fn edges(&self) -> Vec<EdgeRow>;

    fn basin_profiles(&self) -> Vec<BasinProfileRow> {
        vec![]
    }
    fn basin_state(&self) -> Vec<BasinStateRow> {
        vec![]
    }
    fn basin_static(&self) -> Vec<BasinStaticRow> {
        vec![]
    }
    fn basin_time(&self) -> Vec<BasinTimeRow> {
        vec![]
    }
    fn linear_resistance_static(&self) -> Vec<LinearResistanceStaticRow> {
        vec![]
    }
    fn manning_resistance_static(&self) -> Vec<ManningResistanceStaticRow> {
        vec![]
    }
    fn tabulated_rating_curve_static(&self) -> Vec<TabulatedRatingCurveStaticRow> {
        vec![]
    }
    fn tabulated_rating_curve_time(&self) -> Vec<TabulatedRatingCurveTimeRow> {
        vec![]
    }
    fn fractional_flow_static(&self) -> Vec<FractionalFlowStaticRow> {
        vec![]
    }
    fn level_boundary_static(&self) -> Vec<LevelBoundaryStaticRow> {
        vec![]
    }
    fn level_boundary_time(&self) -> Vec<LevelBoundaryTimeRow> {
        vec![]
    }
    fn flow_boundary_static(&self) -> Vec<FlowBoundaryStaticRow> {
        vec![]
    }
    fn flow_boundary_time(&self) -> Vec<FlowBoundaryTimeRow> {
        vec![]
    }
    fn pump_static(&self) -> Vec<PumpStaticRow> {
        vec![]
    }
    fn outlet_static(&self) -> Vec<OutletStaticRow> {
        vec![]
    }
    fn pid_control_static(&self) -> Vec<PidControlStaticRow> {
        vec![]
    }
    fn pid_control_time(&self) -> Vec<PidControlTimeRow> {
        vec![]
    }
    fn user_demand_static(&self) -> Vec<UserDemandStaticRow> {
        vec![]
    }
    fn user_demand_time(&self) -> Vec<UserDemandTimeRow> {
        vec![]
    }
    fn level_demand_static(&self) -> Vec<LevelDemandStaticRow> {
        vec![]
    }
    fn flow_demand_static(&self) -> Vec<FlowDemandStaticRow> {
        vec![]
    }
    fn discrete_control_variables(&self) -> Vec<DiscreteControlVariableRow> {
        vec![]
    }
    fn discrete_control_conditions(&self) -> Vec<DiscreteControlConditionRow> {
        vec![]
    }
    fn discrete_control_logic(&self) -> Vec<DiscreteControlLogicRow> {
        vec![]
    }
    fn subgrid(&self) -> Vec<SubgridRow> {
        vec![]
    }

    /// Whether tables come from an external memory-mapped store. Such
    /// tables must already be sorted; the builder rejects them instead
    /// of sorting in place.
    fn is_external(&self) -> bool {
        false
    }
}
