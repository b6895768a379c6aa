use crate::catalog::{BasinTimeRow, LinearResistanceStaticRow, MemoryCatalog};
use crate::nodes::basin::Profile;
use crate::numerical::smooth::low_storage_factor;
use crate::tests::support::{build, profile, state, test_config};

/// One rain-fed basin, no edges: an hour of precipitation at 1e-6 m/s
/// over 1000 m2 leaves 3.6 m3 behind.
#[test]
fn single_basin_accumulates_precipitation() {
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.basin_profiles = profile(1, &[(0.0, 1000.0), (1.0, 1000.0)]);
    cat.basin_state = vec![state(1, 0.0)];
    cat.basin_time = vec![
        BasinTimeRow {
            node_id: 1,
            time: 0.0,
            precipitation: Some(1e-6),
            potential_evaporation: None,
            drainage: None,
            infiltration: None,
            urban_runoff: None,
        },
        BasinTimeRow {
            node_id: 1,
            time: 3600.0,
            precipitation: Some(0.0),
            potential_evaporation: None,
            drainage: None,
            infiltration: None,
            urban_runoff: None,
        },
    ];
    let mut config = test_config(7200.0, "single-basin");
    config.solver.saveat = 3600.0;
    let mut model = build(config, &cat);
    model.run().unwrap();

    let storage = model.integrator.u[0];
    assert!((storage - 3.6).abs() < 1e-3, "storage = {storage}");
    let level = model.net.basins.current_level[0];
    assert!((level - 0.0036).abs() < 1e-5, "level = {level}");
    // Three frames: start, the rain cutoff, the end.
    assert_eq!(model.results.basin.len(), 3);
    let last = model.results.basin.last().unwrap();
    assert!(last.balance_error.abs() < 1e-6);
}

/// Two basins equalizing through a linear resistance, cross-checked
/// against a standalone explicit integration of the same law.
#[test]
fn resistance_pair_matches_standalone_integration() {
    let points = [(0.0, 0.0), (1.0, 100.0), (2.0, 100.0)];
    let mut cat = MemoryCatalog::new();
    cat.add_node("Basin", 1, None);
    cat.add_node("Basin", 2, None);
    cat.add_node("LinearResistance", 3, None);
    cat.add_edge(("Basin", 1), ("LinearResistance", 3), "flow", None);
    cat.add_edge(("LinearResistance", 3), ("Basin", 2), "flow", None);
    cat.basin_profiles = [profile(1, &points), profile(2, &points)].concat();
    cat.basin_state = vec![state(1, 1.0), state(2, 0.0)];
    cat.linear_resistance_static = vec![LinearResistanceStaticRow {
        node_id: 3,
        active: None,
        resistance: 1e3,
        max_flow_rate: None,
        control_state: None,
    }];
    let t_end = 86400.0;
    let mut config = test_config(t_end, "resistance-pair");
    config.solver.saveat = 21600.0;
    let mut model = build(config, &cat);
    model.run().unwrap();

    // Standalone forward Euler of ds1/dt = -q, ds2/dt = q with the
    // same profile and damping.
    let p = Profile::new(
        points.iter().map(|x| x.0).collect(),
        points.iter().map(|x| x.1).collect(),
    )
    .unwrap();
    let (mut s1, mut s2) = (p.storage_from_level(1.0), 0.0);
    let dt = 1.0;
    let mut t = 0.0;
    while t < t_end {
        let h1 = p.level_from_storage(s1);
        let h2 = p.level_from_storage(s2);
        let mut q = (h1 - h2) / 1e3;
        q *= if q > 0.0 {
            low_storage_factor(s1)
        } else {
            low_storage_factor(s2)
        };
        s1 -= q * dt;
        s2 += q * dt;
        t += dt;
    }
    let h1_ref = p.level_from_storage(s1);
    let h2_ref = p.level_from_storage(s2);

    let h1 = model.net.basins.current_level[0];
    let h2 = model.net.basins.current_level[1];
    assert!((h1 - h1_ref).abs() < 0.01, "h1 = {h1}, reference {h1_ref}");
    assert!((h2 - h2_ref).abs() < 0.01, "h2 = {h2}, reference {h2_ref}");
    // Water only moved, it did not appear or vanish.
    let total = model.integrator.u[0] + model.integrator.u[1];
    assert!((total - p.storage_from_level(1.0)).abs() < 1e-3);
    // The difference decayed but the levels have not fully equalized
    // in a day at this resistance.
    assert!(h1 > h2);
    assert!(h1 - h2 < 1.0);
}
