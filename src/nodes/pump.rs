use crate::graph::{EdgeKind, NodeId};
use crate::network::{FlowBuffer, FlowContext};
use crate::nodes::{ControlMapping, ControlUpdate};
use crate::numerical::smooth::low_storage_factor;

/// q = flow_rate, damped towards zero as the source storage empties.
/// PID-controlled pumps are skipped here: the controller writes their
/// rate and flow contribution itself at the end of the rhs.
#[derive(Debug, Clone, Default)]
pub struct Pumps {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub flow_rate: Vec<f64>,
    pub min_flow_rate: Vec<f64>,
    pub max_flow_rate: Vec<f64>,
    pub is_pid_controlled: Vec<bool>,
    pub control_mapping: ControlMapping,
}

impl Pumps {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(
        &mut self,
        node_id: NodeId,
        active: bool,
        flow_rate: f64,
        min_flow_rate: f64,
        max_flow_rate: f64,
    ) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.flow_rate.push(flow_rate);
        self.min_flow_rate.push(min_flow_rate);
        self.max_flow_rate.push(max_flow_rate);
        self.is_pid_controlled.push(false);
    }

    pub fn apply_update(&mut self, idx: usize, update: &ControlUpdate) {
        if let Some(active) = update.active {
            self.active[idx] = active;
        }
        for (slot, value) in &update.scalars {
            match *slot {
                "flow_rate" => self.flow_rate[idx] = *value,
                "min_flow_rate" => self.min_flow_rate[idx] = *value,
                "max_flow_rate" => self.max_flow_rate[idx] = *value,
                _ => {}
            }
        }
    }

    pub fn formulate(&self, ctx: &FlowContext, flow: &mut FlowBuffer) {
        for i in 0..self.n() {
            if self.is_pid_controlled[i] {
                continue;
            }
            let node = self.node_id[i];
            let mut q = 0.0;
            if self.active[i] {
                let src = match ctx.graph.unique_inneighbor(node, EdgeKind::Flow) {
                    Ok(src) => src,
                    Err(_) => continue,
                };
                q = self.flow_rate[i] * low_storage_factor(ctx.storage(src));
            }
            for edge in ctx.graph.in_edges(node, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = q;
                }
            }
            for edge in ctx.graph.out_edges(node, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = q;
                }
            }
        }
    }
}
