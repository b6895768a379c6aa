use crate::errors::GraphError;
use crate::graph::{EdgeKind, EdgeMeta, Graph, NodeId, NodeKind};

fn edge(id: i32, kind: EdgeKind, from: NodeId, to: NodeId) -> EdgeMeta {
    EdgeMeta {
        id,
        kind,
        from,
        to,
        subnetwork_id_source: 0,
        node_path: vec![],
        flow_idx: None,
    }
}

fn small_graph() -> (Graph, NodeId, NodeId, NodeId, NodeId) {
    let mut g = Graph::new();
    let basin = NodeId::new(NodeKind::Basin, 1, 0);
    let pump = NodeId::new(NodeKind::Pump, 2, 0);
    let terminal = NodeId::new(NodeKind::Terminal, 3, 0);
    let control = NodeId::new(NodeKind::DiscreteControl, 4, 0);
    g.add_node(basin, 0).unwrap();
    g.add_node(pump, 0).unwrap();
    g.add_node(terminal, 0).unwrap();
    g.add_node(control, 0).unwrap();
    g.add_edge(edge(1, EdgeKind::Flow, basin, pump)).unwrap();
    g.add_edge(edge(2, EdgeKind::Flow, pump, terminal)).unwrap();
    g.add_edge(edge(3, EdgeKind::Control, control, pump)).unwrap();
    (g, basin, pump, terminal, control)
}

#[test]
fn neighbor_iteration_is_bucketed_by_edge_kind() {
    let (g, basin, pump, terminal, control) = small_graph();
    let flow_in: Vec<NodeId> = g.inneighbors(pump, EdgeKind::Flow).collect();
    assert_eq!(flow_in, vec![basin]);
    let flow_out: Vec<NodeId> = g.outneighbors(pump, EdgeKind::Flow).collect();
    assert_eq!(flow_out, vec![terminal]);
    let control_in: Vec<NodeId> = g.inneighbors(pump, EdgeKind::Control).collect();
    assert_eq!(control_in, vec![control]);
    assert_eq!(g.outneighbors(pump, EdgeKind::Control).count(), 0);
}

#[test]
fn flow_indices_are_dense_and_in_insertion_order() {
    let (g, basin, pump, ..) = small_graph();
    assert_eq!(g.n_flow_edges(), 2);
    let e = g.edge(basin, pump).unwrap();
    assert_eq!(e.flow_idx, Some(0));
    let indices: Vec<usize> = g.flow_edges().map(|e| e.flow_idx.unwrap()).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[test]
fn unique_neighbor_reports_degree_violations() {
    let (mut g, basin, pump, terminal, _) = small_graph();
    assert_eq!(g.unique_inneighbor(pump, EdgeKind::Flow).unwrap(), basin);
    assert_eq!(g.unique_outneighbor(pump, EdgeKind::Flow).unwrap(), terminal);
    // A second outflow edge breaks uniqueness.
    let lb = NodeId::new(NodeKind::LevelBoundary, 9, 0);
    g.add_node(lb, 0).unwrap();
    g.add_edge(edge(4, EdgeKind::Flow, pump, lb)).unwrap();
    match g.unique_outneighbor(pump, EdgeKind::Flow) {
        Err(GraphError::DegreeViolation { found, .. }) => assert_eq!(found, 2),
        other => panic!("expected degree violation, got {other:?}"),
    }
    // A node with no inflow edges reports zero.
    match g.unique_inneighbor(basin, EdgeKind::Flow) {
        Err(GraphError::DegreeViolation { found, .. }) => assert_eq!(found, 0),
        other => panic!("expected degree violation, got {other:?}"),
    }
}

#[test]
fn unknown_edges_and_duplicate_nodes_are_errors() {
    let (mut g, basin, _, terminal, _) = small_graph();
    assert!(matches!(
        g.edge(basin, terminal),
        Err(GraphError::UnknownEdge { .. })
    ));
    assert!(matches!(
        g.add_node(NodeId::new(NodeKind::Basin, 1, 5), 0),
        Err(GraphError::DuplicateNode { .. })
    ));
}

#[test]
fn node_ids_compare_on_kind_and_external_id_only() {
    let a = NodeId::new(NodeKind::Basin, 7, 0);
    let b = NodeId::new(NodeKind::Basin, 7, 42);
    assert_eq!(a, b);
    let c = NodeId::new(NodeKind::Pump, 7, 0);
    assert_ne!(a, c);
    assert!(NodeId::new(NodeKind::Basin, 3, 0) < NodeId::new(NodeKind::Basin, 8, 0));
}

#[test]
fn resolve_attaches_the_dense_index() {
    let (g, _, _, _, _) = small_graph();
    let id = g.resolve(NodeKind::Pump, 2).unwrap();
    assert_eq!(id.index, 0);
    assert!(g.resolve(NodeKind::Pump, 99).is_err());
}
