use crate::graph::NodeId;
use crate::numerical::interpolation::Interpolation;

/// An infinite basin pinned at level(t). Carries no storage state and
/// no flow law of its own; neighbors read its level through the flow
/// context.
#[derive(Debug, Clone, Default)]
pub struct LevelBoundaries {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub level: Vec<Interpolation>,
}

impl LevelBoundaries {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(&mut self, node_id: NodeId, active: bool, level: Interpolation) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.level.push(level);
    }
}
