use crate::catalog::{
    FlowBoundaryStaticRow, FractionalFlowStaticRow, LinearResistanceStaticRow, MemoryCatalog,
    TabulatedRatingCurveStaticRow,
};
use crate::catalog::build_model_data;
use crate::solve::jacobian::JacobianPrototype;
use crate::tests::support::{profile, state};

/// Two basins joined by a linear resistance couple both ways; the
/// diagonal is always present.
#[test]
fn resistance_pair_pattern() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.add_node("Basin", 2, None);
    cat.add_node("LinearResistance", 3, None);
    cat.add_edge(("Basin", 1), ("LinearResistance", 3), "flow", None);
    cat.add_edge(("LinearResistance", 3), ("Basin", 2), "flow", None);
    cat.basin_profiles = [profile(1, &[(0.0, 100.0), (1.0, 100.0)]),
        profile(2, &[(0.0, 100.0), (1.0, 100.0)])]
    .concat();
    cat.basin_state = vec![state(1, 0.5), state(2, 0.5)];
    cat.linear_resistance_static = vec![LinearResistanceStaticRow {
        node_id: 3,
        active: None,
        resistance: 100.0,
        max_flow_rate: None,
        control_state: None,
    }];
    let data = build_model_data(&cat, false).unwrap();
    let proto = JacobianPrototype::from_network(&data.net);
    assert_eq!(proto.n, 2);
    for (i, j) in [(0, 0), (1, 1), (0, 1), (1, 0)] {
        assert!(proto.contains(i, j), "missing ({i}, {j})");
    }
}

/// A fractional flow extends the hop: the upstream basin couples to
/// the basin behind the splitter.
#[test]
fn fractional_flow_extends_reachability() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("FlowBoundary", 1, None);
    cat.add_node("Basin", 2, None);
    cat.add_node("TabulatedRatingCurve", 3, None);
    cat.add_node("FractionalFlow", 4, None);
    cat.add_node("Basin", 5, None);
    cat.add_edge(("FlowBoundary", 1), ("Basin", 2), "flow", None);
    cat.add_edge(("Basin", 2), ("TabulatedRatingCurve", 3), "flow", None);
    cat.add_edge(("TabulatedRatingCurve", 3), ("FractionalFlow", 4), "flow", None);
    cat.add_edge(("FractionalFlow", 4), ("Basin", 5), "flow", None);
    cat.basin_profiles = [profile(2, &[(0.0, 100.0), (1.0, 100.0)]),
        profile(5, &[(0.0, 100.0), (1.0, 100.0)])]
    .concat();
    cat.basin_state = vec![state(2, 0.5), state(5, 0.5)];
    cat.flow_boundary_static = vec![FlowBoundaryStaticRow {
        node_id: 1,
        active: None,
        flow_rate: 1.0,
    }];
    cat.tabulated_rating_curve_static = vec![
        TabulatedRatingCurveStaticRow {
            node_id: 3,
            active: None,
            level: 0.0,
            discharge: 0.0,
            control_state: None,
        },
        TabulatedRatingCurveStaticRow {
            node_id: 3,
            active: None,
            level: 1.0,
            discharge: 1.0,
            control_state: None,
        },
    ];
    cat.fractional_flow_static = vec![FractionalFlowStaticRow {
        node_id: 4,
        fraction: 1.0,
        control_state: None,
    }];
    let data = build_model_data(&cat, false).unwrap();
    let proto = JacobianPrototype::from_network(&data.net);
    // Basin #2 is index 0, basin #5 is index 1.
    assert!(proto.contains(0, 1));
    assert!(proto.contains(1, 0));
    assert!(proto.nnz() >= 4);
    // The CSC form is consistent with the entry count.
    let (colptr, rowval) = proto.to_csc();
    assert_eq!(*colptr.last().unwrap(), proto.nnz());
    assert_eq!(rowval.len(), proto.nnz());
}
