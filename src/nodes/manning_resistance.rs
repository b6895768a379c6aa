use crate::graph::{EdgeKind, NodeId};
use crate::network::{FlowBuffer, FlowContext};
use crate::nodes::{ControlMapping, ControlUpdate};
use crate::numerical::smooth::manning_slope_term;

/// Gauckler-Manning friction over a trapezoidal reach. The wetted area
/// and hydraulic radius are averaged between both ends; the slope term
/// is regularized with an arctangent so the derivative stays finite at
/// zero head difference.
#[derive(Debug, Clone, Default)]
pub struct ManningResistances {
    pub node_id: Vec<NodeId>,
    pub active: Vec<bool>,
    pub length: Vec<f64>,
    pub manning_n: Vec<f64>,
    pub profile_width: Vec<f64>,
    pub profile_slope: Vec<f64>,
    pub control_mapping: ControlMapping,
}

impl ManningResistances {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        node_id: NodeId,
        active: bool,
        length: f64,
        manning_n: f64,
        profile_width: f64,
        profile_slope: f64,
    ) {
        self.node_id.push(node_id);
        self.active.push(active);
        self.length.push(length);
        self.manning_n.push(manning_n);
        self.profile_width.push(profile_width);
        self.profile_slope.push(profile_slope);
    }

    pub fn apply_update(&mut self, idx: usize, update: &ControlUpdate) {
        if let Some(active) = update.active {
            self.active[idx] = active;
        }
        for (slot, value) in &update.scalars {
            match *slot {
                "length" => self.length[idx] = *value,
                "manning_n" => self.manning_n[idx] = *value,
                "profile_width" => self.profile_width[idx] = *value,
                "profile_slope" => self.profile_slope[idx] = *value,
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
                let b = match ctx.graph.outneighbors(node, EdgeKind::Flow).next() {
                    Some(b) => b,
                    None => continue,
                };
                let h_a = ctx.level(a);
                let h_b = ctx.level(b);
                let width = self.profile_width[i];
                let slope = self.profile_slope[i];
                let d_a = (h_a - ctx.basin_bottom(a)).max(0.0);
                let d_b = (h_b - ctx.basin_bottom(b)).max(0.0);
                let area_a = width * d_a + slope * d_a * d_a;
                let area_b = width * d_b + slope * d_b * d_b;
                let area = 0.5 * (area_a + area_b);
                let slope_unit = libm::sqrt(slope * slope + 1.0);
                let perim_a = width + 2.0 * d_a * slope_unit;
                let perim_b = width + 2.0 * d_b * slope_unit;
                let radius_a = if perim_a > 0.0 { area_a / perim_a } else { 0.0 };
                let radius_b = if perim_b > 0.0 { area_b / perim_b } else { 0.0 };
                let radius = 0.5 * (radius_a + radius_b);
                let dh = h_a - h_b;
                let q_sign = if dh >= 0.0 { 1.0 } else { -1.0 };
                q = q_sign * area / self.manning_n[i]
                    * libm::cbrt(radius * radius)
                    * manning_slope_term(dh, self.length[i]);
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
