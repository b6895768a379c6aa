use crate::graph::{EdgeKind, Graph, NodeId, NodeKind};
use crate::nodes::basin::Basins;
use crate::nodes::discrete_control::DiscreteControls;
use crate::nodes::flow_boundary::FlowBoundaries;
use crate::nodes::flow_demand::FlowDemands;
use crate::nodes::fractional_flow::FractionalFlows;
use crate::nodes::level_boundary::LevelBoundaries;
use crate::nodes::level_demand::LevelDemands;
use crate::nodes::linear_resistance::LinearResistances;
use crate::nodes::manning_resistance::ManningResistances;
use crate::nodes::outlet::Outlets;
use crate::nodes::pid_control::PidControls;
use crate::nodes::pump::Pumps;
use crate::nodes::tabulated_rating_curve::TabulatedRatingCurves;
use crate::nodes::terminal::Terminals;
use crate::nodes::user_demand::UserDemands;
use crate::state::StateLayout;

/// Edge-indexed flow buffer plus the per-basin vertical flux channels.
/// Zeroed at the top of every rhs evaluation; the saved copy at output
/// instants is what ends up in the flow results.
#[derive(Debug, Clone, Default)]
pub struct FlowBuffer {
    pub edge: Vec<f64>,
    pub precipitation: Vec<f64>,
    pub evaporation: Vec<f64>,
    pub drainage: Vec<f64>,
    pub infiltration: Vec<f64>,
}

impl FlowBuffer {
    pub fn new(n_flow_edges: usize, n_basins: usize) -> Self {
        Self {
            edge: vec![0.0; n_flow_edges],
            precipitation: vec![0.0; n_basins],
            evaporation: vec![0.0; n_basins],
            drainage: vec![0.0; n_basins],
            infiltration: vec![0.0; n_basins],
        }
    }

    pub fn reset(&mut self) {
        self.edge.iter_mut().for_each(|v| *v = 0.0);
        self.precipitation.iter_mut().for_each(|v| *v = 0.0);
        self.evaporation.iter_mut().for_each(|v| *v = 0.0);
        self.drainage.iter_mut().for_each(|v| *v = 0.0);
        self.infiltration.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Read view handed to the flow laws: the graph plus whatever is needed
/// to answer "what is the level / storage at this node right now".
pub struct FlowContext<'a> {
    pub graph: &'a Graph,
    pub basins: &'a Basins,
    pub level_boundaries: &'a LevelBoundaries,
    pub t: f64,
}

impl<'a> FlowContext<'a> {
    /// Water level at a node. Basins answer from their cache, level
    /// boundaries from their time curve; nodes without a level report
    /// negative infinity so ramp factors against them saturate to one.
    pub fn level(&self, id: NodeId) -> f64 {
        match id.kind {
            NodeKind::Basin => self.basins.current_level[id.index],
            NodeKind::LevelBoundary => self.level_boundaries.level[id.index].sample(self.t),
            _ => f64::NEG_INFINITY,
        }
    }

    /// Storage at a node; boundaries behave as infinite basins.
    pub fn storage(&self, id: NodeId) -> f64 {
        match id.kind {
            NodeKind::Basin => self.basins.current_storage[id.index],
            _ => f64::INFINITY,
        }
    }

    pub fn basin_bottom(&self, id: NodeId) -> f64 {
        match id.kind {
            NodeKind::Basin => self.basins.profile[id.index].bottom(),
            _ => f64::NEG_INFINITY,
        }
    }
}

/// The node catalogue plus the graph: everything static about the
/// network, with the scalar interior fields the callbacks mutate.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: Graph,
    pub basins: Basins,
    pub linear_resistances: LinearResistances,
    pub manning_resistances: ManningResistances,
    pub rating_curves: TabulatedRatingCurves,
    pub fractional_flows: FractionalFlows,
    pub level_boundaries: LevelBoundaries,
    pub flow_boundaries: FlowBoundaries,
    pub pumps: Pumps,
    pub outlets: Outlets,
    pub terminals: Terminals,
    pub pid_controls: PidControls,
    pub discrete_controls: DiscreteControls,
    pub user_demands: UserDemands,
    pub level_demands: LevelDemands,
    pub flow_demands: FlowDemands,
    pub layout: StateLayout,
    pub flow: FlowBuffer,
    /// Distinct demand priorities across the model, ascending.
    pub priorities: Vec<i32>,
}

impl Network {
    /// The flow over the unique flow out-edge of a node, if any. Used
    /// by discrete control flow conditions.
    pub fn out_edge_flow(&self, id: NodeId) -> f64 {
        self.graph
            .out_edges(id, EdgeKind::Flow)
            .next()
            .and_then(|e| e.flow_idx)
            .map(|k| self.flow.edge[k])
            .unwrap_or(0.0)
    }

    /// max_flow_rate of a flow-constraining node, used as allocation
    /// edge capacity.
    pub fn max_flow_rate(&self, id: NodeId) -> f64 {
        match id.kind {
            NodeKind::Pump => self.pumps.max_flow_rate[id.index],
            NodeKind::Outlet => self.outlets.max_flow_rate[id.index],
            NodeKind::LinearResistance => self.linear_resistances.max_flow_rate[id.index],
            _ => f64::INFINITY,
        }
    }
}
