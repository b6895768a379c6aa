use crate::catalog::{
    FlowBoundaryStaticRow, MemoryCatalog, PidControlStaticRow, PumpStaticRow,
};
use crate::tests::support::{build, profile, state, test_config};

/// A PI-controlled pump draining a rain-fed basin towards a 2 m
/// target. The controller is slow by construction (the decay rate is
/// -K_p / 2A), so the check is an envelope at the end of a long run,
/// not a tight trajectory match.
#[test]
fn pid_pump_steers_towards_the_target_level() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.add_node("FlowBoundary", 2, None);
    cat.add_node("Pump", 3, None);
    cat.add_node("Terminal", 4, None);
    cat.add_node("PidControl", 5, None);
    cat.add_edge(("FlowBoundary", 2), ("Basin", 1), "flow", None);
    cat.add_edge(("Basin", 1), ("Pump", 3), "flow", None);
    cat.add_edge(("Pump", 3), ("Terminal", 4), "flow", None);
    cat.add_edge(("PidControl", 5), ("Pump", 3), "control", None);

    // Start close to the target: the anti-windup-free controller is
    // only linear near its setpoint, and that is what the envelope
    // below describes.
    cat.basin_profiles = profile(1, &[(0.0, 100.0), (10.0, 100.0)]);
    cat.basin_state = vec![state(1, 1.99)];
    cat.flow_boundary_static = vec![FlowBoundaryStaticRow {
        node_id: 2,
        active: None,
        flow_rate: 0.01,
    }];
    cat.pump_static = vec![PumpStaticRow {
        node_id: 3,
        active: None,
        flow_rate: 0.0,
        min_flow_rate: None,
        max_flow_rate: None,
        control_state: None,
    }];
    cat.pid_control_static = vec![PidControlStaticRow {
        node_id: 5,
        active: None,
        listen_node_type: "Basin".to_string(),
        listen_node_id: 1,
        target: 2.0,
        proportional: -1e-3,
        integral: -1e-5,
        derivative: 0.0,
        control_state: None,
    }];

    let t_end = 6.0 * 86400.0;
    let mut config = test_config(t_end, "pid-pump");
    config.solver.saveat = 21600.0;
    let mut model = build(config, &cat);

    // The pump is flagged as PID-controlled and the integral state is
    // part of the state vector.
    assert!(model.net.pumps.is_pid_controlled[0]);
    assert_eq!(model.integrator.u.len(), 2);

    model.run().unwrap();

    let level = model.net.basins.current_level[0];
    assert!(
        (level - 2.0).abs() < 0.1,
        "level {level} has not settled near the 2 m target"
    );

    // The pump never ran backwards and the level stayed in a sane band
    // around the target while the integral state spun up.
    for row in &model.results.flow {
        if row.from_node_id == 1 && row.to_node_id == 3 {
            assert!(row.flow_rate >= -1e-12);
        }
    }
    for row in &model.results.basin {
        assert!(row.level > 1.0 && row.level < 3.0, "level {}", row.level);
    }

    // Late in the run the oscillation envelope has decayed.
    let late: Vec<f64> = model
        .results
        .basin
        .iter()
        .filter(|r| r.time > t_end - 86400.0)
        .map(|r| (r.level - 2.0).abs())
        .collect();
    assert!(!late.is_empty());
    assert!(late.iter().cloned().fold(0.0, f64::max) < 0.1);
}
