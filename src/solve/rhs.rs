use crate::graph::NodeKind;
use crate::network::{FlowContext, Network};

/// The right-hand side of the water balance: dS/dt for every basin and
/// the error integrand for every PID controller.
///
/// The evaluation order is fixed: refresh basin properties, vertical
/// fluxes, the independent flow laws, the dependent ones, the scatter
/// of the flow buffer into du, and the PID controllers last so they
/// see the assembled storage derivatives.
pub fn water_balance(du: &mut [f64], u: &[f64], net: &mut Network, t: f64) {
    du.iter_mut().for_each(|v| *v = 0.0);

    let Network {
        graph,
        basins,
        linear_resistances,
        manning_resistances,
        rating_curves,
        fractional_flows,
        level_boundaries,
        flow_boundaries,
        pumps,
        outlets,
        pid_controls,
        user_demands,
        flow,
        layout,
        ..
    } = net;
    let layout = *layout;

    basins.set_current_properties(&u[..layout.n_basins]);
    flow.reset();
    basins.formulate_vertical_fluxes(
        &mut du[..layout.n_basins],
        &mut flow.precipitation,
        &mut flow.evaporation,
        &mut flow.drainage,
        &mut flow.infiltration,
    );

    let ctx = FlowContext {
        graph,
        basins,
        level_boundaries,
        t,
    };

    linear_resistances.formulate(&ctx, flow);
    manning_resistances.formulate(&ctx, flow);
    rating_curves.formulate(&ctx, flow);
    flow_boundaries.formulate(&ctx, flow);
    pumps.formulate(&ctx, flow);
    outlets.formulate(&ctx, flow);
    user_demands.formulate(&ctx, flow);
    // Dependent laws: fractional flows rescale what their predecessors
    // just wrote. Level boundaries and terminals have no law of their
    // own.
    fractional_flows.formulate(&ctx, flow);

    // Scatter the flow buffer into the storage derivatives.
    for edge in graph.flow_edges() {
        let q = match edge.flow_idx {
            Some(k) => flow.edge[k],
            None => continue,
        };
        if edge.from.kind == NodeKind::Basin {
            du[layout.storage(edge.from.index)] -= q;
        }
        if edge.to.kind == NodeKind::Basin {
            du[layout.storage(edge.to.index)] += q;
        }
    }

    pid_controls.formulate(&ctx, pumps, outlets, u, du, flow, layout);
}
