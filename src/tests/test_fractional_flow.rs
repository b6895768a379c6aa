use crate::catalog::{
    FlowBoundaryStaticRow, FractionalFlowStaticRow, MemoryCatalog, TabulatedRatingCurveStaticRow,
};
use crate::graph::NodeKind;
use crate::tests::support::{build, profile, state, test_config};

fn trc_row(node_id: i32, level: f64, discharge: f64) -> TabulatedRatingCurveStaticRow {
    TabulatedRatingCurveStaticRow {
        node_id,
        active: None,
        level,
        discharge,
        control_state: None,
    }
}

/// A rating curve discharging a constant 1 m3/s into a 25/75 split:
/// each branch carries its fraction at every saved instant, and the
/// split conserves the inflow exactly.
#[test]
fn split_carries_fractions_of_the_inflow() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("FlowBoundary", 1, None);
    cat.add_node("Basin", 2, None);
    cat.add_node("TabulatedRatingCurve", 3, None);
    cat.add_node("FractionalFlow", 4, None);
    cat.add_node("FractionalFlow", 5, None);
    cat.add_node("Basin", 6, None);
    cat.add_node("Basin", 7, None);
    cat.add_edge(("FlowBoundary", 1), ("Basin", 2), "flow", None);
    cat.add_edge(("Basin", 2), ("TabulatedRatingCurve", 3), "flow", None);
    cat.add_edge(("TabulatedRatingCurve", 3), ("FractionalFlow", 4), "flow", None);
    cat.add_edge(("TabulatedRatingCurve", 3), ("FractionalFlow", 5), "flow", None);
    cat.add_edge(("FractionalFlow", 4), ("Basin", 6), "flow", None);
    cat.add_edge(("FractionalFlow", 5), ("Basin", 7), "flow", None);
    let big = [(0.0, 1000.0), (10.0, 1000.0)];
    cat.basin_profiles = [profile(2, &big), profile(6, &big), profile(7, &big)].concat();
    cat.basin_state = vec![state(2, 5.0), state(6, 0.1), state(7, 0.1)];
    cat.flow_boundary_static = vec![FlowBoundaryStaticRow {
        node_id: 1,
        active: None,
        flow_rate: 1.0,
    }];
    // Flat curve: 1 m3/s at any level.
    cat.tabulated_rating_curve_static = vec![trc_row(3, 0.0, 1.0), trc_row(3, 10.0, 1.0)];
    cat.fractional_flow_static = vec![
        FractionalFlowStaticRow {
            node_id: 4,
            fraction: 0.25,
            control_state: None,
        },
        FractionalFlowStaticRow {
            node_id: 5,
            fraction: 0.75,
            control_state: None,
        },
    ];
    let mut config = test_config(3600.0, "fractional-split");
    config.solver.saveat = 900.0;
    let mut model = build(config, &cat);
    model.run().unwrap();

    // Every saved frame shows the split.
    let mut times: Vec<f64> = model.results.basin.iter().map(|r| r.time).collect();
    times.dedup();
    assert!(times.len() >= 4);
    for row in &model.results.flow {
        match (row.from_node_id, row.to_node_id) {
            (4, 6) => assert!((row.flow_rate - 0.25).abs() < 1e-6),
            (5, 7) => assert!((row.flow_rate - 0.75).abs() < 1e-6),
            (3, 4) | (3, 5) => assert!((row.flow_rate - 1.0).abs() < 1e-6),
            _ => {}
        }
    }

    // Conservation of the split against its own inflow.
    let graph = &model.net.graph;
    let trc = graph.resolve(NodeKind::TabulatedRatingCurve, 3).unwrap();
    let ff = graph.resolve(NodeKind::FractionalFlow, 4).unwrap();
    let basin6 = graph.resolve(NodeKind::Basin, 6).unwrap();
    let q_in = model.net.flow.edge[graph.edge(trc, ff).unwrap().flow_idx.unwrap()];
    let q_out = model.net.flow.edge[graph.edge(ff, basin6).unwrap().flow_idx.unwrap()];
    assert!((q_out - 0.25 * q_in).abs() < 1e-12);

    // The receiving basins filled accordingly: 0.25 and 0.75 of an
    // hour of 1 m3/s on top of the initial 100 m3.
    assert!((model.integrator.u[1] - (100.0 + 0.25 * 3600.0)).abs() < 1.0);
    assert!((model.integrator.u[2] - (100.0 + 0.75 * 3600.0)).abs() < 1.0);
}
