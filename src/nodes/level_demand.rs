use crate::graph::NodeId;
use crate::numerical::interpolation::Interpolation;

/// Demand for keeping controlled basins between a minimum and maximum
/// level, expressed at one priority. Consumed by the allocation layer,
/// which turns the band into basin supply/demand variables.
#[derive(Debug, Clone, Default)]
pub struct LevelDemands {
    pub node_id: Vec<NodeId>,
    pub min_level: Vec<Interpolation>,
    pub max_level: Vec<Interpolation>,
    pub priority: Vec<i32>,
}

impl LevelDemands {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(
        &mut self,
        node_id: NodeId,
        min_level: Interpolation,
        max_level: Interpolation,
        priority: i32,
    ) {
        self.node_id.push(node_id);
        self.min_level.push(min_level);
        self.max_level.push(max_level);
        self.priority.push(priority);
    }
}
