use crate::graph::{EdgeKind, NodeId};
use crate::network::{FlowBuffer, FlowContext};
use crate::numerical::interpolation::Interpolation;
use crate::numerical::smooth::{low_storage_factor, reduction_factor};

/// Water users abstracting from a basin, one demand curve per priority.
/// The abstraction is capped by what allocation granted, damped near
/// empty storage and near the user's minimum source level, and partly
/// returned downstream.
///
/// The demand and allocated arrays are flat (user-major, one slot per
/// priority) so the control surface can hand them out as contiguous
/// slices.
#[derive(Debug, Clone, Default)]
pub struct UserDemands {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub return_factor: Vec<f64>,
    pub min_level: Vec<f64>,
    /// demand_itp[user][priority_idx], priority_idx into the model's
    /// ascending priority list.
    pub demand_itp: Vec<Vec<Interpolation>>,
    /// Whether the demand came from a time table (kept for reporting).
    pub demand_from_timeseries: Vec<bool>,
    /// Current sampled demand, flat over (user, priority_idx).
    pub demand: Vec<f64>,
    /// Allocation result, same layout; infinity while allocation is
    /// disabled so the demand curve alone caps the flow.
    pub allocated: Vec<f64>,
    /// Current abstraction rate per user.
    pub abstraction: Vec<f64>,
    /// Cumulative abstracted volume per user.
    pub realized: Vec<f64>,
    n_priorities: usize,
}

impl UserDemands {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn n_priorities(&self) -> usize {
        self.n_priorities
    }

    /// Flat slot of (user, priority_idx).
    pub fn slot(&self, user: usize, priority_idx: usize) -> usize {
        user * self.n_priorities + priority_idx
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        node_id: NodeId,
        active: bool,
        return_factor: f64,
        min_level: f64,
        demand_itp: Vec<Interpolation>,
        demand_from_timeseries: bool,
        allocation_enabled: bool,
    ) {
        let n_priorities = demand_itp.len();
        if self.node_id.is_empty() {
            self.n_priorities = n_priorities;
        }
        self.node_id.push(node_id);
        self.active.push(active);
        self.return_factor.push(return_factor);
        self.min_level.push(min_level);
        self.demand_itp.push(demand_itp);
        self.demand_from_timeseries.push(demand_from_timeseries);
        self.demand.extend(std::iter::repeat(0.0).take(n_priorities));
        self.allocated.extend(
            std::iter::repeat(if allocation_enabled { 0.0 } else { f64::INFINITY })
                .take(n_priorities),
        );
        self.abstraction.push(0.0);
        self.realized.push(0.0);
    }

    pub fn formulate(&mut self, ctx: &FlowContext, flow: &mut FlowBuffer) {
        for i in 0..self.n() {
            let node = self.node_id[i];
            let mut q = 0.0;
            if self.active[i] {
                let src = match ctx.graph.unique_inneighbor(node, EdgeKind::Flow) {
                    Ok(src) => src,
                    Err(_) => continue,
                };
                for p in 0..self.demand_itp[i].len() {
                    let d = self.demand_itp[i][p].sample(ctx.t);
                    let slot = self.slot(i, p);
                    self.demand[slot] = d;
                    q += d.min(self.allocated[slot]);
                }
                q *= low_storage_factor(ctx.storage(src));
                q *= reduction_factor(ctx.level(src) - self.min_level[i], 0.1);
            }
            self.abstraction[i] = q;
            let q_return = self.return_factor[i] * q;
            for edge in ctx.graph.in_edges(node, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = q;
                }
            }
            for edge in ctx.graph.out_edges(node, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = q_return;
                }
            }
        }
    }
}
