use crate::allocation::AllocationGraph;
use crate::catalog::{build_model_data, MemoryCatalog, PumpStaticRow, UserDemandStaticRow};
use crate::graph::NodeKind;
use crate::tests::support::{profile, state};

fn pump_row(node_id: i32, flow_rate: f64, max_flow_rate: f64) -> PumpStaticRow {
    PumpStaticRow {
        node_id,
        active: None,
        flow_rate,
        min_flow_rate: None,
        max_flow_rate: Some(max_flow_rate),
        control_state: None,
    }
}

/// A pump between two basins is not a node of interest: it collapses
/// into a composite edge carrying its capacity, one-directional.
#[test]
fn chains_collapse_into_composite_edges() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, Some(1));
    cat.add_node("Pump", 2, Some(1));
    cat.add_node("Basin", 3, Some(1));
    cat.add_node("Terminal", 4, Some(1));
    cat.add_node("Pump", 5, Some(1));
    cat.add_edge(("Basin", 1), ("Pump", 2), "flow", None);
    cat.add_edge(("Pump", 2), ("Basin", 3), "flow", None);
    cat.add_edge(("Basin", 3), ("Pump", 5), "flow", None);
    cat.add_edge(("Pump", 5), ("Terminal", 4), "flow", None);
    cat.basin_profiles = [
        profile(1, &[(0.0, 100.0), (1.0, 100.0)]),
        profile(3, &[(0.0, 100.0), (1.0, 100.0)]),
    ]
    .concat();
    cat.basin_state = vec![state(1, 0.5), state(3, 0.5)];
    cat.pump_static = vec![pump_row(2, 0.1, 5.0), pump_row(5, 0.1, 2.5)];

    let data = build_model_data(&cat, false).unwrap();
    let agraph = AllocationGraph::build(&data.net, 1).unwrap();

    let b1 = data.net.graph.resolve(NodeKind::Basin, 1).unwrap();
    let b3 = data.net.graph.resolve(NodeKind::Basin, 3).unwrap();
    let edge = agraph
        .edges
        .iter()
        .find(|e| e.from == b1 && e.to == b3)
        .expect("composite edge basin 1 -> basin 3");
    assert_eq!(edge.capacity, 5.0);
    assert_eq!(edge.node_path.len(), 1);
    assert_eq!(edge.node_path[0].kind, NodeKind::Pump);
    // Pumps forbid reverse flow: no basin 3 -> basin 1 edge.
    assert!(!agraph.edges.iter().any(|e| e.from == b3 && e.to == b1));
    // The second chain ends at the terminal with the smaller capacity.
    let term = data.net.graph.resolve(NodeKind::Terminal, 4).unwrap();
    let edge = agraph
        .edges
        .iter()
        .find(|e| e.from == b3 && e.to == term)
        .expect("composite edge basin 3 -> terminal");
    assert_eq!(edge.capacity, 2.5);
}

/// Sources are tagged: a boundary-fed edge is a source edge, and user
/// nodes keep their direct edges.
#[test]
fn boundary_sources_and_users_are_retained() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("FlowBoundary", 1, Some(1));
    cat.add_node("Basin", 2, Some(1));
    cat.add_node("UserDemand", 3, Some(1));
    cat.add_node("Terminal", 4, Some(1));
    cat.add_edge(("FlowBoundary", 1), ("Basin", 2), "flow", Some(1));
    cat.add_edge(("Basin", 2), ("UserDemand", 3), "flow", None);
    cat.add_edge(("UserDemand", 3), ("Terminal", 4), "flow", None);
    cat.basin_profiles = profile(2, &[(0.0, 100.0), (1.0, 100.0)]);
    cat.basin_state = vec![state(2, 0.5)];
    cat.flow_boundary_static = vec![crate::catalog::FlowBoundaryStaticRow {
        node_id: 1,
        active: None,
        flow_rate: 1.0,
    }];
    cat.user_demand_static = vec![UserDemandStaticRow {
        node_id: 3,
        active: None,
        demand: 1.0,
        return_factor: 0.0,
        min_level: 0.0,
        priority: 1,
    }];

    let data = build_model_data(&cat, false).unwrap();
    let agraph = AllocationGraph::build(&data.net, 1).unwrap();
    let fb = data.net.graph.resolve(NodeKind::FlowBoundary, 1).unwrap();
    let source = agraph
        .edges
        .iter()
        .find(|e| e.from == fb)
        .expect("source edge");
    assert!(source.boundary_source);
    assert!(source.is_source());
    let user = data.net.graph.resolve(NodeKind::UserDemand, 3).unwrap();
    assert!(agraph.edges.iter().any(|e| e.to == user));
    assert!(agraph.edges.iter().any(|e| e.from == user));
}
