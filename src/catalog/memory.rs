use crate::catalog::*;

/// In-memory catalog, the workhorse for tests and programmatic model
/// building. Set `external` to emulate a memory-mapped store whose
/// tables must arrive pre-sorted.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<EdgeRow>,
    pub basin_profiles: Vec<BasinProfileRow>,
    pub basin_state: Vec<BasinStateRow>,
    pub basin_static: Vec<BasinStaticRow>,
    pub basin_time: Vec<BasinTimeRow>,
    pub linear_resistance_static: Vec<LinearResistanceStaticRow>,
    pub manning_resistance_static: Vec<ManningResistanceStaticRow>,
    pub tabulated_rating_curve_static: Vec<TabulatedRatingCurveStaticRow>,
    pub tabulated_rating_curve_time: Vec<TabulatedRatingCurveTimeRow>,
    pub fractional_flow_static: Vec<FractionalFlowStaticRow>,
    pub level_boundary_static: Vec<LevelBoundaryStaticRow>,
    pub level_boundary_time: Vec<LevelBoundaryTimeRow>,
    pub flow_boundary_static: Vec<FlowBoundaryStaticRow>,
    pub flow_boundary_time: Vec<FlowBoundaryTimeRow>,
    pub pump_static: Vec<PumpStaticRow>,
    pub outlet_static: Vec<OutletStaticRow>,
    pub pid_control_static: Vec<PidControlStaticRow>,
    pub pid_control_time: Vec<PidControlTimeRow>,
    pub user_demand_static: Vec<UserDemandStaticRow>,
    pub user_demand_time: Vec<UserDemandTimeRow>,
    pub level_demand_static: Vec<LevelDemandStaticRow>,
    pub flow_demand_static: Vec<FlowDemandStaticRow>,
    pub discrete_control_variables: Vec<DiscreteControlVariableRow>,
    pub discrete_control_conditions: Vec<DiscreteControlConditionRow>,
    pub discrete_control_logic: Vec<DiscreteControlLogicRow>,
    pub subgrid: Vec<SubgridRow>,
    pub external: bool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand used all over the tests.
    pub fn add_node(&mut self, node_type: &str, node_id: i32, subnetwork_id: Option<i32>) {
        self.nodes.push(NodeRow {
            node_id,
            node_type: node_type.to_string(),
            subnetwork_id,
        });
    }

    pub fn add_edge(
        &mut self,
        from: (&str, i32),
        to: (&str, i32),
        edge_type: &str,
        subnetwork_id: Option<i32>,
    ) {
        let fid = self.edges.len() as i32 + 1;
        self.edges.push(EdgeRow {
            fid,
            from_node_type: from.0.to_string(),
            from_node_id: from.1,
            to_node_type: to.0.to_string(),
            to_node_id: to.1,
            edge_type: edge_type.to_string(),
            subnetwork_id,
        });
    }
}

impl Catalog for MemoryCatalog {
    fn nodes(&self) -> Vec<NodeRow> {
        self.nodes.clone()
    }
    fn edges(&self) -> Vec<EdgeRow> {
        self.edges.clone()
    }
    fn basin_profiles(&self) -> Vec<BasinProfileRow> {
        self.basin_profiles.clone()
    }
    fn basin_state(&self) -> Vec<BasinStateRow> {
        self.basin_state.clone()
    }
    fn basin_static(&self) -> Vec<BasinStaticRow> {
        self.basin_static.clone()
    }
    fn basin_time(&self) -> Vec<BasinTimeRow> {
        self.basin_time.clone()
    }
    fn linear_resistance_static(&self) -> Vec<LinearResistanceStaticRow> {
        self.linear_resistance_static.clone()
    }
    fn manning_resistance_static(&self) -> Vec<ManningResistanceStaticRow> {
        self.manning_resistance_static.clone()
    }
    fn tabulated_rating_curve_static(&self) -> Vec<TabulatedRatingCurveStaticRow> {
        self.tabulated_rating_curve_static.clone()
    }
    fn tabulated_rating_curve_time(&self) -> Vec<TabulatedRatingCurveTimeRow> {
        self.tabulated_rating_curve_time.clone()
    }
    fn fractional_flow_static(&self) -> Vec<FractionalFlowStaticRow> {
        self.fractional_flow_static.clone()
    }
    fn level_boundary_static(&self) -> Vec<LevelBoundaryStaticRow> {
        self.level_boundary_static.clone()
    }
    fn level_boundary_time(&self) -> Vec<LevelBoundaryTimeRow> {
        self.level_boundary_time.clone()
    }
    fn flow_boundary_static(&self) -> Vec<FlowBoundaryStaticRow> {
        self.flow_boundary_static.clone()
    }
    fn flow_boundary_time(&self) -> Vec<FlowBoundaryTimeRow> {
        self.flow_boundary_time.clone()
    }
    fn pump_static(&self) -> Vec<PumpStaticRow> {
        self.pump_static.clone()
    }
    fn outlet_static(&self) -> Vec<OutletStaticRow> {
        self.outlet_static.clone()
    }
    fn pid_control_static(&self) -> Vec<PidControlStaticRow> {
        self.pid_control_static.clone()
    }
    fn pid_control_time(&self) -> Vec<PidControlTimeRow> {
        self.pid_control_time.clone()
    }
    fn user_demand_static(&self) -> Vec<UserDemandStaticRow> {
        self.user_demand_static.clone()
    }
    fn user_demand_time(&self) -> Vec<UserDemandTimeRow> {
        self.user_demand_time.clone()
    }
    fn level_demand_static(&self) -> Vec<LevelDemandStaticRow> {
        self.level_demand_static.clone()
    }
    fn flow_demand_static(&self) -> Vec<FlowDemandStaticRow> {
        self.flow_demand_static.clone()
    }
    fn discrete_control_variables(&self) -> Vec<DiscreteControlVariableRow> {
        self.discrete_control_variables.clone()
    }
    fn discrete_control_conditions(&self) -> Vec<DiscreteControlConditionRow> {
        self.discrete_control_conditions.clone()
    }
    fn discrete_control_logic(&self) -> Vec<DiscreteControlLogicRow> {
        self.discrete_control_logic.clone()
    }
    fn subgrid(&self) -> Vec<SubgridRow> {
        self.subgrid.clone()
    }
    fn is_external(&self) -> bool {
        self.external
    }
}
