use crate::catalog::{
    DiscreteControlConditionRow, DiscreteControlLogicRow, DiscreteControlVariableRow,
    FlowBoundaryStaticRow, MemoryCatalog, TabulatedRatingCurveStaticRow,
};
use crate::tests::support::{build, profile, state, test_config};

fn trc_row(level: f64, discharge: f64, control_state: &str) -> TabulatedRatingCurveStaticRow {
    TabulatedRatingCurveStaticRow {
        node_id: 2,
        active: None,
        level,
        discharge,
        control_state: Some(control_state.to_string()),
    }
}

/// A discrete controller swaps the rating curve when the basin rises
/// past 0.5 m. The event log holds exactly the initial state and the
/// transition, with the transition located at the crossing time.
#[test]
fn rating_curve_switches_on_level_crossing() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.add_node("TabulatedRatingCurve", 2, None);
    cat.add_node("Terminal", 3, None);
    cat.add_node("FlowBoundary", 4, None);
    cat.add_node("DiscreteControl", 5, None);
    cat.add_edge(("FlowBoundary", 4), ("Basin", 1), "flow", None);
    cat.add_edge(("Basin", 1), ("TabulatedRatingCurve", 2), "flow", None);
    cat.add_edge(("TabulatedRatingCurve", 2), ("Terminal", 3), "flow", None);
    cat.add_edge(("DiscreteControl", 5), ("TabulatedRatingCurve", 2), "control", None);

    cat.basin_profiles = profile(1, &[(0.0, 100.0), (2.0, 100.0)]);
    cat.basin_state = vec![state(1, 0.3)];
    cat.flow_boundary_static = vec![FlowBoundaryStaticRow {
        node_id: 4,
        active: None,
        flow_rate: 0.01,
    }];
    cat.tabulated_rating_curve_static = vec![
        trc_row(1.0, 0.0, "high"),
        trc_row(2.0, 1.0, "high"),
        trc_row(1.2, 0.0, "low"),
        trc_row(2.0, 1.0, "low"),
    ];
    cat.discrete_control_variables = vec![DiscreteControlVariableRow {
        node_id: 5,
        compound_variable_id: 1,
        listen_node_type: "Basin".to_string(),
        listen_node_id: 1,
        variable: "level".to_string(),
        weight: None,
        look_ahead: None,
    }];
    cat.discrete_control_conditions = vec![DiscreteControlConditionRow {
        node_id: 5,
        compound_variable_id: 1,
        greater_than: 0.5,
    }];
    cat.discrete_control_logic = vec![
        DiscreteControlLogicRow {
            node_id: 5,
            truth_state: "F".to_string(),
            control_state: "high".to_string(),
        },
        DiscreteControlLogicRow {
            node_id: 5,
            truth_state: "T".to_string(),
            control_state: "low".to_string(),
        },
    ];

    let mut config = test_config(3000.0, "rating-control");
    config.solver.saveat = 3000.0;
    let mut model = build(config, &cat);
    model.run().unwrap();

    let events = &model.results.control;
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert_eq!(events[0].control_state, "high");
    assert_eq!(events[0].truth_state, "F");
    assert_eq!(events[0].time, 0.0);
    assert_eq!(events[1].control_state, "low");
    assert_eq!(events[1].truth_state, "T");
    // Filling at 1e-4 m/s from 0.3 m, the 0.5 m threshold falls at
    // t = 2000 s.
    assert!(
        (events[1].time - 2000.0).abs() < 1.0,
        "crossing at {}",
        events[1].time
    );

    // The active curve is now the "low" one.
    assert_eq!(model.net.discrete_controls.control_state[0], "low");
    let table = &model.net.rating_curves.table[0];
    assert_eq!(table.sample(1.2), 0.0);
    assert!(table.sample(1.6) > 0.0);
}
