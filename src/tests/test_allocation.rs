use crate::catalog::{FlowBoundaryStaticRow, MemoryCatalog, UserDemandStaticRow};
use crate::graph::NodeKind;
use crate::tests::support::{build, profile, state, test_config};

fn user_row(node_id: i32, demand: f64, priority: i32) -> UserDemandStaticRow {
    UserDemandStaticRow {
        node_id,
        active: None,
        demand,
        return_factor: 0.0,
        min_level: 0.0,
        priority,
    }
}

/// One boundary source feeding a basin with two users at different
/// priorities.
fn two_user_catalog(demand1: f64, demand2: f64, source: f64) -> MemoryCatalog {
    let mut cat = MemoryCatalog::new();
    cat.add_node("FlowBoundary", 1, Some(1));
    cat.add_node("Basin", 2, Some(1));
    cat.add_node("UserDemand", 3, Some(1));
    cat.add_node("UserDemand", 4, Some(1));
    cat.add_node("Terminal", 5, Some(1));
    cat.add_edge(("FlowBoundary", 1), ("Basin", 2), "flow", Some(1));
    cat.add_edge(("Basin", 2), ("UserDemand", 3), "flow", None);
    cat.add_edge(("Basin", 2), ("UserDemand", 4), "flow", None);
    cat.add_edge(("UserDemand", 3), ("Terminal", 5), "flow", None);
    cat.add_edge(("UserDemand", 4), ("Terminal", 5), "flow", None);
    cat.basin_profiles = profile(2, &[(0.0, 1000.0), (10.0, 1000.0)]);
    cat.basin_state = vec![state(2, 5.0)];
    cat.flow_boundary_static = vec![FlowBoundaryStaticRow {
        node_id: 1,
        active: None,
        flow_rate: source,
    }];
    cat.user_demand_static = vec![user_row(3, demand1, 1), user_row(4, demand2, 2)];
    cat
}

/// Demands (2, 3) against a 4 m3/s source: the first priority is
/// served in full, the second gets the remainder.
#[test]
fn limited_source_is_split_by_priority() {
    let cat = two_user_catalog(2.0, 3.0, 4.0);
    let mut config = test_config(86400.0, "allocation-split");
    config.allocation.use_allocation = true;
    config.allocation.timestep = 86400.0;
    config.allocation.objective_type = "linear_absolute".to_string();
    let mut model = build(config, &cat);
    model.run().unwrap();

    let users = &model.net.user_demands;
    let u3 = model.net.graph.resolve(NodeKind::UserDemand, 3).unwrap();
    let u4 = model.net.graph.resolve(NodeKind::UserDemand, 4).unwrap();
    let a3_p1 = users.allocated[users.slot(u3.index, 0)];
    let a3_p2 = users.allocated[users.slot(u3.index, 1)];
    let a4_p1 = users.allocated[users.slot(u4.index, 0)];
    let a4_p2 = users.allocated[users.slot(u4.index, 1)];
    assert!((a3_p1 - 2.0).abs() < 1e-3, "a3_p1 = {a3_p1}");
    assert!((a4_p2 - 2.0).abs() < 1e-3, "a4_p2 = {a4_p2}");
    assert!(a3_p2.abs() < 1e-3);
    assert!(a4_p1.abs() < 1e-3);
    // Everything assigned adds up to the source cap.
    assert!((a3_p1 + a3_p2 + a4_p1 + a4_p2 - 4.0).abs() < 1e-2);

    // Feasibility of every recorded outcome: allocations stay inside
    // [0, demand] and every edge flow inside [0, capacity].
    assert!(!model.results.allocation.is_empty());
    for record in &model.results.allocation {
        assert!(record.allocated >= -1e-6);
        assert!(record.allocated <= record.demand + 1e-6);
    }
    assert!(!model.results.allocation_flow.is_empty());
    for record in &model.results.allocation_flow {
        assert!(record.flow_rate >= -1e-6);
    }
}

/// With equal demands and a saturated source, the lower priority never
/// receives more than the higher one.
#[test]
fn priorities_are_served_in_order() {
    let cat = two_user_catalog(3.0, 3.0, 4.0);
    let mut config = test_config(86400.0, "allocation-priority");
    config.allocation.use_allocation = true;
    config.allocation.timestep = 86400.0;
    config.allocation.objective_type = "linear_absolute".to_string();
    let mut model = build(config, &cat);
    model.run().unwrap();

    let users = &model.net.user_demands;
    let u3 = model.net.graph.resolve(NodeKind::UserDemand, 3).unwrap();
    let u4 = model.net.graph.resolve(NodeKind::UserDemand, 4).unwrap();
    let high = users.allocated[users.slot(u3.index, 0)];
    let low = users.allocated[users.slot(u4.index, 1)];
    assert!((high - 3.0).abs() < 1e-3, "high priority got {high}");
    assert!((low - 1.0).abs() < 1e-3, "low priority got {low}");
    assert!(high >= low);
}

/// The quadratic objective is exercised end to end as well.
#[test]
fn quadratic_objective_allocates_up_to_demand() {
    let cat = two_user_catalog(2.0, 3.0, 10.0);
    let mut config = test_config(86400.0, "allocation-quadratic");
    config.allocation.use_allocation = true;
    config.allocation.timestep = 86400.0;
    config.allocation.objective_type = "quadratic_absolute".to_string();
    let mut model = build(config, &cat);
    model.run().unwrap();

    let users = &model.net.user_demands;
    let u3 = model.net.graph.resolve(NodeKind::UserDemand, 3).unwrap();
    let u4 = model.net.graph.resolve(NodeKind::UserDemand, 4).unwrap();
    // An unconstrained source serves both demands in full.
    assert!((users.allocated[users.slot(u3.index, 0)] - 2.0).abs() < 1e-2);
    assert!((users.allocated[users.slot(u4.index, 1)] - 3.0).abs() < 1e-2);
}
