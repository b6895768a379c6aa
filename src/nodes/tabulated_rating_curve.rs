use crate::graph::{EdgeKind, NodeId};
use crate::network::{FlowBuffer, FlowContext};
use crate::nodes::{ControlMapping, ControlUpdate};
use crate::numerical::interpolation::Interpolation;
use crate::numerical::smooth::low_storage_factor;

/// A pre-scheduled replacement of one node's level -> discharge curve.
#[derive(Debug, Clone)]
pub struct RatingCurveUpdate {
    pub time: f64,
    pub node_idx: usize,
    pub table: Interpolation,
}

/// q = table(h_upstream), damped near empty upstream storage. The
/// active curve can be swapped wholesale by the time table or by
/// discrete control.
#[derive(Debug, Clone, Default)]
pub struct TabulatedRatingCurves {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub table: Vec<Interpolation>,
    /// Time-scheduled curve replacements, sorted by time, played with a
    /// cursor like the basin forcing table.
    pub updates: Vec<RatingCurveUpdate>,
    cursor: usize,
    pub control_mapping: ControlMapping,
}

impl TabulatedRatingCurves {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(&mut self, node_id: NodeId, active: bool, table: Interpolation) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.table.push(table);
    }

    pub fn set_updates(&mut self, mut updates: Vec<RatingCurveUpdate>) {
        updates.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
        self.updates = updates;
        self.cursor = 0;
    }

    /// Distinct update times for callback pre-scheduling.
    pub fn update_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.updates.iter().map(|u| u.time).collect();
        times.dedup();
        times
    }

    /// Swap in every curve scheduled up to time t.
    pub fn apply_updates(&mut self, t: f64) {
        while self.cursor < self.updates.len() && self.updates[self.cursor].time <= t + 1e-9 {
            let update = self.updates[self.cursor].clone();
            self.table[update.node_idx].replace(update.table);
            self.cursor += 1;
        }
    }

    pub fn apply_update(&mut self, idx: usize, update: &ControlUpdate) {
        if let Some(active) = update.active {
            self.active[idx] = active;
        }
        for (slot, itp) in &update.interpolants {
            if *slot == "table" {
                self.table[idx].replace(itp.clone());
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
                q = self.table[i].sample(h_a) * low_storage_factor(ctx.storage(a));
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
