use crate::graph::{EdgeKind, NodeId};
use crate::network::{FlowBuffer, FlowContext};
use crate::nodes::{ControlMapping, ControlUpdate};
use crate::numerical::smooth::{low_storage_factor, reduction_factor};

/// Gravity outlet. Like a pump, but flow also ramps to zero when the
/// source level drops below the downstream level (no siphoning) or
/// below the minimum crest level.
#[derive(Debug, Clone, Default)]
pub struct Outlets {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub flow_rate: Vec<f64>,
    pub min_flow_rate: Vec<f64>,
    pub max_flow_rate: Vec<f64>,
    pub min_crest_level: Vec<f64>,
    pub is_pid_controlled: Vec<bool>,
    pub control_mapping: ControlMapping,
}

impl Outlets {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        node_id: NodeId,
        active: bool,
        flow_rate: f64,
        min_flow_rate: f64,
        max_flow_rate: f64,
        min_crest_level: f64,
    ) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.flow_rate.push(flow_rate);
        self.min_flow_rate.push(min_flow_rate);
        self.max_flow_rate.push(max_flow_rate);
        self.min_crest_level.push(min_crest_level);
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
                "min_crest_level" => self.min_crest_level[idx] = *value,
                _ => {}
            }
        }
    }

    /// The three ramp factors for outlet i given its source and
    /// destination. Shared with the PID controller, which needs the
    /// same damping for its own rate computation.
    pub fn flow_factor(&self, ctx: &FlowContext, i: usize, src: NodeId, dst: NodeId) -> f64 {
        let h_src = ctx.level(src);
        let h_dst = ctx.level(dst);
        let mut factor = low_storage_factor(ctx.storage(src));
        factor *= reduction_factor(h_src - h_dst, 0.1);
        factor *= reduction_factor(h_src - self.min_crest_level[i], 0.1);
        factor
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
                let dst = match ctx.graph.outneighbors(node, EdgeKind::Flow).next() {
                    Some(dst) => dst,
                    None => continue,
                };
                q = self.flow_rate[i] * self.flow_factor(ctx, i, src, dst);
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
