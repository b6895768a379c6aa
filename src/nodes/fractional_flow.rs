use crate::graph::{EdgeKind, NodeId};
use crate::network::{FlowBuffer, FlowContext};
use crate::nodes::{ControlMapping, ControlUpdate};

/// Conservative splitter: the single out-edge carries fraction * q of
/// the unique predecessor's flow. Fractions leaving one predecessor
/// must sum to one per control state, which the load-time validation
/// enforces.
#[derive(Debug, Clone, Default)]
pub struct FractionalFlows {
    pub node_id: Vec<NodeId>,
    pub fraction: Vec<f64>,
    pub control_mapping: ControlMapping,
}

impl FractionalFlows {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(&mut self, node_id: NodeId, fraction: f64) {
        self.node_id.push(node_id);
        self.fraction.push(fraction);
    }

    pub fn apply_update(&mut self, idx: usize, update: &ControlUpdate) {
        for (slot, value) in &update.scalars {
            if *slot == "fraction" {
                self.fraction[idx] = *value;
            }
        }
    }

    /// Runs after the upstream laws so the inflow is already in the
    /// buffer.
    pub fn formulate(&self, ctx: &FlowContext, flow: &mut FlowBuffer) {
        for i in 0..self.n() {
            let node = self.node_id[i];
            let q_in = ctx
                .graph
                .in_edges(node, EdgeKind::Flow)
                .next()
                .and_then(|e| e.flow_idx)
                .map(|k| flow.edge[k])
                .unwrap_or(0.0);
            let q_out = self.fraction[i] * q_in;
            for edge in ctx.graph.out_edges(node, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = q_out;
                }
            }
        }
    }
}
