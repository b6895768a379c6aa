use crate::graph::{EdgeKind, NodeId};
use crate::network::{FlowBuffer, FlowContext};
use crate::numerical::interpolation::Interpolation;

/// Imposes q = rate(t) >= 0 on its outgoing edges. Negative rate
/// samples are rejected at load time.
#[derive(Debug, Clone, Default)]
pub struct FlowBoundaries {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub flow_rate: Vec<Interpolation>,
}

impl FlowBoundaries {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(&mut self, node_id: NodeId, active: bool, flow_rate: Interpolation) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.flow_rate.push(flow_rate);
    }

    pub fn formulate(&self, ctx: &FlowContext, flow: &mut FlowBuffer) {
        for i in 0..self.n() {
            let node = self.node_id[i];
            let q = if self.active[i] {
                self.flow_rate[i].sample(ctx.t)
            } else {
                0.0
            };
            for edge in ctx.graph.out_edges(node, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = q;
                }
            }
        }
    }
}
