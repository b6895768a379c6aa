use crate::graph::{EdgeKind, NodeId, NodeKind};
use crate::network::{FlowBuffer, FlowContext};
use crate::nodes::outlet::Outlets;
use crate::nodes::pump::Pumps;
use crate::nodes::{ControlMapping, ControlUpdate};
use crate::numerical::interpolation::Interpolation;
use crate::numerical::smooth::{low_storage_factor, reduction_factor};
use crate::state::StateLayout;

/// PID controllers steering one pump or outlet each towards a target
/// level on a listened basin. The integral of the error is part of the
/// state vector; the controller runs last in the rhs so it sees the
/// assembled storage derivatives.
#[derive(Debug, Clone, Default)]
pub struct PidControls {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub listen_node: Vec<NodeId>,
    pub controlled_node: Vec<NodeId>,
    pub target: Vec<Interpolation>,
    pub proportional: Vec<Interpolation>,
    pub integral: Vec<Interpolation>,
    pub derivative: Vec<Interpolation>,
    pub control_mapping: ControlMapping,
}

impl PidControls {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        node_id: NodeId,
        active: bool,
        listen_node: NodeId,
        controlled_node: NodeId,
        target: Interpolation,
        proportional: Interpolation,
        integral: Interpolation,
        derivative: Interpolation,
    ) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.listen_node.push(listen_node);
        self.controlled_node.push(controlled_node);
        self.target.push(target);
        self.proportional.push(proportional);
        self.integral.push(integral);
        self.derivative.push(derivative);
    }

    pub fn apply_update(&mut self, idx: usize, update: &ControlUpdate) {
        if let Some(active) = update.active {
            self.active[idx] = active;
        }
        for (slot, itp) in &update.interpolants {
            if *slot == "target" {
                self.target[idx].replace(itp.clone());
            }
        }
    }

    /// Compute controlled flow rates, write them into the pump/outlet
    /// rate slots and the flow buffer, and add the flow and the error
    /// integral to du. Must run after the flow scatter so du carries
    /// the listened basin's storage derivative.
    #[allow(clippy::too_many_arguments)]
    pub fn formulate(
        &self,
        ctx: &FlowContext,
        pumps: &mut Pumps,
        outlets: &mut Outlets,
        u: &[f64],
        du: &mut [f64],
        flow: &mut FlowBuffer,
        layout: StateLayout,
    ) {
        for i in 0..self.n() {
            let integral_slot = layout.integral(i);
            let controlled = self.controlled_node[i];
            let src = match ctx.graph.unique_inneighbor(controlled, EdgeKind::Flow) {
                Ok(src) => src,
                Err(_) => continue,
            };
            let dst = match ctx.graph.outneighbors(controlled, EdgeKind::Flow).next() {
                Some(dst) => dst,
                None => continue,
            };
            let controlled_factor = match controlled.kind {
                NodeKind::Outlet => {
                    low_storage_factor(ctx.storage(src))
                        * reduction_factor(ctx.level(src) - ctx.level(dst), 0.1)
                }
                _ => low_storage_factor(ctx.storage(src)),
            };

            let rate;
            if self.active[i] {
                let listen = self.listen_node[i];
                let level = ctx.basins.current_level[listen.index];
                let area = ctx.basins.current_area[listen.index].max(1e-10);
                let target = self.target[i].sample(ctx.t);
                let error = target - level;
                du[integral_slot] = error;

                let factor = match controlled.kind {
                    NodeKind::Outlet => controlled_factor,
                    _ => 1.0,
                };
                let k_p = self.proportional[i].sample(ctx.t);
                let k_i = self.integral[i].sample(ctx.t);
                let k_d = self.derivative[i].sample(ctx.t);
                let denom = if k_d != 0.0 {
                    1.0 - k_d * factor / area
                } else {
                    1.0
                };
                let dtarget = self.target[i].derivative(ctx.t);
                let dstorage = du[layout.storage(listen.index)];
                let integral_state = u[integral_slot];
                let (min_rate, max_rate) = match controlled.kind {
                    NodeKind::Pump => (
                        pumps.min_flow_rate[controlled.index],
                        pumps.max_flow_rate[controlled.index],
                    ),
                    NodeKind::Outlet => (
                        outlets.min_flow_rate[controlled.index],
                        outlets.max_flow_rate[controlled.index],
                    ),
                    _ => (0.0, f64::INFINITY),
                };
                rate = (factor
                    * (k_p * error / denom
                        + k_i * integral_state / denom
                        + k_d * (dtarget - dstorage / area) / denom))
                    .clamp(min_rate, max_rate);
                match controlled.kind {
                    NodeKind::Pump => pumps.flow_rate[controlled.index] = rate,
                    NodeKind::Outlet => outlets.flow_rate[controlled.index] = rate,
                    _ => {}
                }
            } else {
                // An inactive controller leaves the node to its own
                // rate; the flow still has to enter the buffer here
                // because the node's formulate skipped it.
                du[integral_slot] = 0.0;
                rate = match controlled.kind {
                    NodeKind::Pump => {
                        pumps.flow_rate[controlled.index] * controlled_factor
                    }
                    NodeKind::Outlet => {
                        outlets.flow_rate[controlled.index] * controlled_factor
                    }
                    _ => 0.0,
                };
            }

            // The controlled node was skipped by its own formulate, so
            // its flow contribution enters the buffer and du here.
            for edge in ctx.graph.in_edges(controlled, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = rate;
                }
                if edge.from.kind == NodeKind::Basin {
                    du[layout.storage(edge.from.index)] -= rate;
                }
            }
            for edge in ctx.graph.out_edges(controlled, EdgeKind::Flow) {
                if let Some(k) = edge.flow_idx {
                    flow.edge[k] = rate;
                }
                if edge.to.kind == NodeKind::Basin {
                    du[layout.storage(edge.to.index)] += rate;
                }
            }
        }
    }
}
