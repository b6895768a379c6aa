use crate::graph::EdgeKind;
use crate::graph::NodeId;
use crate::network::{FlowBuffer, FlowContext};
use crate::nodes::{ControlMapping, ControlUpdate};
use crate::numerical::smooth::low_storage_factor;

/// q = clamp((h_a - h_b) / R, -Qmax, Qmax), damped on whichever basin
/// side the water is leaving.
#[derive(Debug, Clone, Default)]
pub struct LinearResistances {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub resistance: Vec<f64>,
    pub max_flow_rate: Vec<f64>,
    pub control_mapping: ControlMapping,
}

impl LinearResistances {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(&mut self, node_id: NodeId, active: bool, resistance: f64, max_flow_rate: f64) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.resistance.push(resistance);
        self.max_flow_rate.push(max_flow_rate);
    }

    pub fn apply_update(&mut self, idx: usize, update: &ControlUpdate) {
        if let Some(active) = update.active {
            self.active[idx] = active;
        }
        for (slot, value) in &update.scalars {
            match *slot {
                "resistance" => self.resistance[idx] = *value,
                "max_flow_rate" => self.max_flow_rate[idx] = *value,
                _ => {}
            }
        }
    }

    pub fn formulate(&self, ctx: &FlowContext, flow: &mut FlowBuffer) {
        for i in 0..self.n() {
            let node = self.node_id[i];
            let mut q = 0.0;
            if self.active[i] {
                let a = match ctx.graph.unique_inneighbor(node, EdgeKind::Flow) {
                    Ok(a) => a,
                    Err(_) => continue,
                };
                let h_a = ctx.level(a);
                // All outneighbors see the same head; the first one sets
                // the downstream level.
                let b = match ctx.graph.outneighbors(node, EdgeKind::Flow).next() {
                    Some(b) => b,
                    None => continue,
                };
                let h_b = ctx.level(b);
                q = ((h_a - h_b) / self.resistance[i])
                    .clamp(-self.max_flow_rate[i], self.max_flow_rate[i]);
                q *= if q > 0.0 {
                    low_storage_factor(ctx.storage(a))
                } else {
                    low_storage_factor(ctx.storage(b))
                };
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
