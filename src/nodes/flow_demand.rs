use crate::graph::NodeId;
use crate::numerical::interpolation::Interpolation;

/// A minimum-flow demand attached (via a control edge) to one
/// flow-constraining node. The allocation layer gives the target node a
/// flow buffer that fills at this demand's priority.
#[derive(Debug, Clone, Default)]
pub struct FlowDemands {
    pub node_id: Vec<NodeId>,
    pub demand_itp: Vec<Interpolation>,
    /// Current sampled demand, refreshed before each allocation solve.
    pub demand: Vec<f64>,
    pub priority: Vec<i32>,
}

impl FlowDemands {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(&mut self, node_id: NodeId, demand_itp: Interpolation, priority: i32) {
        self.node_id.push(node_id);
        self.demand_itp.push(demand_itp);
        self.demand.push(0.0);
        self.priority.push(priority);
    }
}
