use crate::catalog::{build_model_data, FlowBoundaryStaticRow, MemoryCatalog};
use crate::errors::{TorneError, ValidationError};
use crate::tests::support::{profile, state};

fn basin_only() -> MemoryCatalog {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.basin_profiles = profile(1, &[(0.0, 100.0), (1.0, 100.0)]);
    cat.basin_state = vec![state(1, 0.5)];
    cat
}

fn errors_of(result: Result<crate::catalog::build::ModelData, TorneError>) -> Vec<ValidationError> {
    match result {
        Err(TorneError::Validation(report)) => report.errors,
        other => panic!("expected a validation failure, got {:?}", other.is_ok()),
    }
}

#[test]
fn minimal_basin_builds() {
    let data = build_model_data(&basin_only(), false).unwrap();
    assert_eq!(data.net.basins.n(), 1);
    assert_eq!(data.u0, vec![50.0]);
}

#[test]
fn initial_level_below_bottom_names_the_basin() {
    let mut cat = basin_only();
    cat.basin_state = vec![state(1, -0.5)];
    let errors = errors_of(build_model_data(&cat, false));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::LevelBelowBottom { .. })));
}

#[test]
fn missing_state_and_profile_are_reported_together() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.add_node("Basin", 2, None);
    cat.basin_profiles = profile(1, &[(0.0, 100.0), (1.0, 100.0)]);
    // Basin 2 has no profile; neither basin has an initial state.
    let errors = errors_of(build_model_data(&cat, false));
    let missing = errors
        .iter()
        .filter(|e| matches!(e, ValidationError::MissingData { .. }))
        .count();
    assert!(missing >= 3);
}

#[test]
fn external_tables_must_be_presorted() {
    let mut cat = basin_only();
    cat.add_node("Basin", 2, None);
    cat.basin_profiles
        .extend(profile(2, &[(0.0, 100.0), (1.0, 100.0)]));
    cat.basin_state.push(state(2, 0.5));
    // Out of order on purpose.
    cat.basin_state.swap(0, 1);
    cat.external = true;
    let errors = errors_of(build_model_data(&cat, false));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::TableNotSorted { .. })));
    // The in-memory variant sorts the same input in place instead.
    let mut cat2 = basin_only();
    cat2.add_node("Basin", 2, None);
    cat2.basin_profiles
        .extend(profile(2, &[(0.0, 100.0), (1.0, 100.0)]));
    cat2.basin_state.push(state(2, 0.5));
    cat2.basin_state.swap(0, 1);
    assert!(build_model_data(&cat2, false).is_ok());
}

#[test]
fn negative_flow_boundary_rate_is_rejected() {
    let mut cat = basin_only();
    cat.add_node("FlowBoundary", 2, None);
    cat.add_edge(("FlowBoundary", 2), ("Basin", 1), "flow", None);
    cat.flow_boundary_static = vec![FlowBoundaryStaticRow {
        node_id: 2,
        active: None,
        flow_rate: -1.0,
    }];
    let errors = errors_of(build_model_data(&cat, false));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::NegativeFlowRate { .. })));
}

#[test]
fn degree_and_adjacency_violations_are_collected() {
    let mut cat = basin_only();
    // A linear resistance with an inflow but no outflow, plus an
    // illegal basin -> basin edge.
    cat.add_node("Basin", 2, None);
    cat.basin_profiles
        .extend(profile(2, &[(0.0, 100.0), (1.0, 100.0)]));
    cat.basin_state.push(state(2, 0.5));
    cat.add_node("LinearResistance", 3, None);
    cat.add_edge(("Basin", 1), ("LinearResistance", 3), "flow", None);
    cat.add_edge(("Basin", 1), ("Basin", 2), "flow", None);
    cat.linear_resistance_static = vec![crate::catalog::LinearResistanceStaticRow {
        node_id: 3,
        active: None,
        resistance: 1.0,
        max_flow_rate: None,
        control_state: None,
    }];
    let errors = errors_of(build_model_data(&cat, false));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::FlowEdgeNotAllowed { .. })));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::FlowOutDegree { .. })));
}

#[test]
fn unknown_node_kinds_are_rejected() {
    let mut cat = basin_only();
    cat.add_node("Reservoir", 9, None);
    let errors = errors_of(build_model_data(&cat, false));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::UnknownNodeKind(_))));
}

#[test]
fn repeated_profile_levels_are_rejected() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.basin_profiles = profile(1, &[(0.0, 100.0), (0.0, 120.0), (1.0, 130.0)]);
    cat.basin_state = vec![state(1, 0.5)];
    let errors = errors_of(build_model_data(&cat, false));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::RepeatedProfileLevel { .. })));
}
