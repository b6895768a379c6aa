use std::collections::HashMap;

use crate::catalog::validation::{validate_graph, validate_network};
use crate::catalog::Catalog;
use crate::errors::{TorneError, ValidationError, ValidationReport};
use crate::graph::{EdgeKind, EdgeMeta, Graph, NodeId, NodeKind};
use crate::network::{FlowBuffer, Network};
use crate::nodes::basin::{BasinCumulatives, Basins, ForcingRow, ForcingTable, Profile};
use crate::nodes::discrete_control::{
    expand_logic_mapping, CompoundVariable, DiscreteControls, ListenVariable, SubVariable,
};
use crate::nodes::flow_boundary::FlowBoundaries;
use crate::nodes::flow_demand::FlowDemands;
use crate::nodes::fractional_flow::FractionalFlows;
use crate::nodes::level_boundary::LevelBoundaries;
use crate::nodes::level_demand::LevelDemands;
use crate::nodes::linear_resistance::LinearResistances;
use crate::nodes::manning_resistance::ManningResistances;
use crate::nodes::outlet::Outlets;
use crate::nodes::pid_control::PidControls;
use crate::nodes::pump::Pumps;
use crate::nodes::tabulated_rating_curve::{RatingCurveUpdate, TabulatedRatingCurves};
use crate::nodes::terminal::Terminals;
use crate::nodes::user_demand::UserDemands;
use crate::nodes::ControlUpdate;
use crate::numerical::interpolation::Interpolation;
use crate::state::StateLayout;
use crate::subgrid::Subgrid;

/// Everything the model needs out of a catalog: the network, the
/// initial state, the subgrid curves, and the pre-scheduled callback
/// times found in the time tables.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub net: Network,
    pub u0: Vec<f64>,
    pub subgrid: Subgrid,
    pub forcing_times: Vec<f64>,
    pub rating_times: Vec<f64>,
}

/// Millisecond key so f64 columns can participate in Ord sort keys.
fn ms(t: f64) -> i64 {
    (t * 1000.0).round() as i64
}

/// Sort an in-memory table in place, or reject an external one that is
/// out of order.
fn ensure_sorted<T, K: Ord>(
    rows: &mut [T],
    external: bool,
    table: &str,
    order: &str,
    key: impl Fn(&T) -> K,
    report: &mut ValidationReport,
) {
    let sorted = rows.windows(2).all(|w| key(&w[0]) <= key(&w[1]));
    if !sorted {
        if external {
            report.push(ValidationError::TableNotSorted {
                table: table.to_string(),
                order: order.to_string(),
            });
        } else {
            rows.sort_by(|a, b| key(a).cmp(&key(b)));
        }
    }
}

fn kind_ids(graph: &Graph, kind: NodeKind) -> Vec<NodeId> {
    graph
        .nodes()
        .iter()
        .copied()
        .filter(|n| n.kind == kind)
        .collect()
}

fn dummy_profile() -> Profile {
    Profile::new(vec![0.0, 1.0], vec![1.0, 1.0]).unwrap()
}

/// Assemble the network, initial state and subgrid from a catalog.
/// Validation problems are collected; the build fails at the end with
/// all of them listed.
pub fn build_model_data(
    catalog: &dyn Catalog,
    allocation_enabled: bool,
) -> Result<ModelData, TorneError> {
    let mut report = ValidationReport::new();
    let external = catalog.is_external();

    // Nodes, grouped into per-kind dense indices in external-id order.
    let mut node_rows = catalog.nodes();
    ensure_sorted(
        &mut node_rows,
        external,
        "Node",
        "(node_type, node_id)",
        |r| (r.node_type.clone(), r.node_id),
        &mut report,
    );
    let mut graph = Graph::new();
    let mut counts: HashMap<NodeKind, usize> = HashMap::new();
    for row in &node_rows {
        let kind = match NodeKind::parse(&row.node_type) {
            Some(k) => k,
            None => {
                report.push(ValidationError::UnknownNodeKind(row.node_type.clone()));
                continue;
            }
        };
        let index = counts.entry(kind).or_insert(0);
        let id = NodeId::new(kind, row.node_id, *index);
        match graph.add_node(id, row.subnetwork_id.unwrap_or(0)) {
            Ok(()) => *index += 1,
            Err(e) => report.push(ValidationError::Other(e.to_string())),
        }
    }

    for row in catalog.edges() {
        let from_kind = NodeKind::parse(&row.from_node_type);
        let to_kind = NodeKind::parse(&row.to_node_type);
        let (from_kind, to_kind) = match (from_kind, to_kind) {
            (Some(f), Some(t)) => (f, t),
            _ => {
                report.push(ValidationError::UnknownNodeKind(format!(
                    "edge #{}: {} or {}",
                    row.fid, row.from_node_type, row.to_node_type
                )));
                continue;
            }
        };
        let from = match graph.resolve(from_kind, row.from_node_id) {
            Ok(id) => id,
            Err(e) => {
                report.push(ValidationError::Other(e.to_string()));
                continue;
            }
        };
        let to = match graph.resolve(to_kind, row.to_node_id) {
            Ok(id) => id,
            Err(e) => {
                report.push(ValidationError::Other(e.to_string()));
                continue;
            }
        };
        let kind = match EdgeKind::parse(&row.edge_type) {
            Some(k) => k,
            None => {
                report.push(ValidationError::Other(format!(
                    "edge #{}: unknown edge type {:?}",
                    row.fid, row.edge_type
                )));
                continue;
            }
        };
        let result = graph.add_edge(EdgeMeta {
            id: row.fid,
            kind,
            from,
            to,
            subnetwork_id_source: row.subnetwork_id.unwrap_or(0),
            node_path: vec![],
            flow_idx: None,
        });
        if let Err(e) = result {
            report.push(ValidationError::Other(e.to_string()));
        }
    }

    // ---- Basin
    let mut basins = Basins::default();
    let mut profile_rows = catalog.basin_profiles();
    ensure_sorted(
        &mut profile_rows,
        external,
        "Basin / profile",
        "(node_id, level)",
        |r| (r.node_id, ms(r.level)),
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::Basin) {
        let level: Vec<f64> = profile_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .map(|r| r.level)
            .collect();
        let area: Vec<f64> = profile_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .map(|r| r.area)
            .collect();
        if level.len() < 2 {
            report.push(ValidationError::MissingData { node: id });
            basins.push(id, dummy_profile());
            continue;
        }
        // Repeated levels are reported specifically, they are the
        // common authoring mistake.
        if let Some(w) = level.windows(2).find(|w| w[1] <= w[0]) {
            report.push(ValidationError::RepeatedProfileLevel {
                node: id,
                level: w[1],
            });
            basins.push(id, dummy_profile());
            continue;
        }
        match Profile::new(level, area) {
            Ok(profile) => basins.push(id, profile),
            Err(msg) => {
                report.push(ValidationError::Other(format!("{id}: {msg}")));
                basins.push(id, dummy_profile());
            }
        }
    }
    for row in catalog.basin_static() {
        match graph.resolve(NodeKind::Basin, row.node_id) {
            Ok(id) => {
                if let Some(v) = row.precipitation {
                    basins.precipitation[id.index] = v;
                }
                if let Some(v) = row.potential_evaporation {
                    basins.potential_evaporation[id.index] = v;
                }
                if let Some(v) = row.drainage {
                    basins.drainage[id.index] = v;
                }
                if let Some(v) = row.infiltration {
                    basins.infiltration[id.index] = v;
                }
                if let Some(v) = row.urban_runoff {
                    basins.urban_runoff[id.index] = v;
                }
            }
            Err(e) => report.push(ValidationError::Other(e.to_string())),
        }
    }
    let mut basin_time = catalog.basin_time();
    ensure_sorted(
        &mut basin_time,
        external,
        "Basin / time",
        "(time, node_id)",
        |r| (ms(r.time), r.node_id),
        &mut report,
    );
    let mut forcing_rows = vec![];
    for row in &basin_time {
        match graph.resolve(NodeKind::Basin, row.node_id) {
            Ok(id) => forcing_rows.push(ForcingRow {
                time: row.time,
                basin_idx: id.index,
                precipitation: row.precipitation,
                potential_evaporation: row.potential_evaporation,
                drainage: row.drainage,
                infiltration: row.infiltration,
                urban_runoff: row.urban_runoff,
            }),
            Err(e) => report.push(ValidationError::Other(e.to_string())),
        }
    }
    basins.forcing = ForcingTable::new(forcing_rows);
    basins.cumulative = BasinCumulatives::new(basins.n());
    let forcing_times = basins.forcing.times();

    // Initial storages from initial levels.
    let mut state_rows = catalog.basin_state();
    ensure_sorted(
        &mut state_rows,
        external,
        "Basin / state",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    let mut storages = vec![0.0; basins.n()];
    for (i, id) in kind_ids(&graph, NodeKind::Basin).into_iter().enumerate() {
        match state_rows.iter().find(|r| r.node_id == id.external_id) {
            Some(row) => {
                let bottom = basins.profile[i].bottom();
                if row.level < bottom {
                    report.push(ValidationError::LevelBelowBottom {
                        node: id,
                        level: row.level,
                        bottom,
                    });
                } else {
                    storages[i] = basins.profile[i].storage_from_level(row.level);
                }
            }
            None => report.push(ValidationError::MissingData { node: id }),
        }
    }

    // ---- LinearResistance
    let mut linear_resistances = LinearResistances::default();
    let mut lr_rows = catalog.linear_resistance_static();
    ensure_sorted(
        &mut lr_rows,
        external,
        "LinearResistance / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::LinearResistance) {
        let rows: Vec<_> = lr_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        match rows.first() {
            Some(first) => {
                linear_resistances.push(
                    id,
                    first.active.unwrap_or(true),
                    first.resistance,
                    first.max_flow_rate.unwrap_or(f64::INFINITY),
                );
                for row in &rows {
                    if let Some(state) = &row.control_state {
                        linear_resistances.control_mapping.insert(
                            (id, state.clone()),
                            ControlUpdate {
                                active: row.active,
                                scalars: vec![
                                    ("resistance", row.resistance),
                                    (
                                        "max_flow_rate",
                                        row.max_flow_rate.unwrap_or(f64::INFINITY),
                                    ),
                                ],
                                interpolants: vec![],
                            },
                        );
                    }
                }
            }
            None => {
                report.push(ValidationError::MissingData { node: id });
                linear_resistances.push(id, true, 1.0, f64::INFINITY);
            }
        }
    }

    // ---- ManningResistance
    let mut manning_resistances = ManningResistances::default();
    let mut mr_rows = catalog.manning_resistance_static();
    ensure_sorted(
        &mut mr_rows,
        external,
        "ManningResistance / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::ManningResistance) {
        let rows: Vec<_> = mr_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        match rows.first() {
            Some(first) => {
                manning_resistances.push(
                    id,
                    first.active.unwrap_or(true),
                    first.length,
                    first.manning_n,
                    first.profile_width,
                    first.profile_slope,
                );
                for row in &rows {
                    if let Some(state) = &row.control_state {
                        manning_resistances.control_mapping.insert(
                            (id, state.clone()),
                            ControlUpdate {
                                active: row.active,
                                scalars: vec![
                                    ("length", row.length),
                                    ("manning_n", row.manning_n),
                                    ("profile_width", row.profile_width),
                                    ("profile_slope", row.profile_slope),
                                ],
                                interpolants: vec![],
                            },
                        );
                    }
                }
            }
            None => {
                report.push(ValidationError::MissingData { node: id });
                manning_resistances.push(id, true, 1000.0, 0.03, 1.0, 1.0);
            }
        }
    }

    // ---- TabulatedRatingCurve
    let mut rating_curves = TabulatedRatingCurves::default();
    let mut trc_rows = catalog.tabulated_rating_curve_static();
    ensure_sorted(
        &mut trc_rows,
        external,
        "TabulatedRatingCurve / static",
        "(node_id, level)",
        |r| {
            (
                r.node_id,
                r.control_state.clone().unwrap_or_default(),
                ms(r.level),
            )
        },
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::TabulatedRatingCurve) {
        let rows: Vec<_> = trc_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        if rows.is_empty() {
            report.push(ValidationError::MissingData { node: id });
            rating_curves.push(id, true, Interpolation::constant(0.0));
            continue;
        }
        // One curve per control state; the first state initializes the
        // node.
        let mut states: Vec<(Option<String>, Vec<f64>, Vec<f64>)> = vec![];
        for row in &rows {
            match states.iter_mut().find(|(s, _, _)| *s == row.control_state) {
                Some((_, levels, discharges)) => {
                    levels.push(row.level);
                    discharges.push(row.discharge);
                }
                None => {
                    states.push((
                        row.control_state.clone(),
                        vec![row.level],
                        vec![row.discharge],
                    ));
                }
            }
        }
        let mut first_table = None;
        for (state, levels, discharges) in states {
            let table = match Interpolation::new(levels, discharges) {
                Ok(t) => t,
                Err(msg) => {
                    report.push(ValidationError::Other(format!("{id}: {msg}")));
                    continue;
                }
            };
            if first_table.is_none() {
                first_table = Some((table.clone(), rows[0].active.unwrap_or(true)));
            }
            if let Some(state) = state {
                rating_curves.control_mapping.insert(
                    (id, state),
                    ControlUpdate {
                        active: None,
                        scalars: vec![],
                        interpolants: vec![("table", table)],
                    },
                );
            }
        }
        match first_table {
            Some((table, active)) => rating_curves.push(id, active, table),
            None => rating_curves.push(id, true, Interpolation::constant(0.0)),
        }
    }
    let mut trc_time = catalog.tabulated_rating_curve_time();
    ensure_sorted(
        &mut trc_time,
        external,
        "TabulatedRatingCurve / time",
        "(time, node_id, level)",
        |r| (ms(r.time), r.node_id, ms(r.level)),
        &mut report,
    );
    let mut updates: Vec<RatingCurveUpdate> = vec![];
    {
        let mut i = 0;
        while i < trc_time.len() {
            let (time, node_id) = (trc_time[i].time, trc_time[i].node_id);
            let mut levels = vec![];
            let mut discharges = vec![];
            while i < trc_time.len()
                && trc_time[i].node_id == node_id
                && ms(trc_time[i].time) == ms(time)
            {
                levels.push(trc_time[i].level);
                discharges.push(trc_time[i].discharge);
                i += 1;
            }
            match graph.resolve(NodeKind::TabulatedRatingCurve, node_id) {
                Ok(id) => match Interpolation::new(levels, discharges) {
                    Ok(table) => updates.push(RatingCurveUpdate {
                        time,
                        node_idx: id.index,
                        table,
                    }),
                    Err(msg) => report.push(ValidationError::Other(format!("{id}: {msg}"))),
                },
                Err(e) => report.push(ValidationError::Other(e.to_string())),
            }
        }
    }
    rating_curves.set_updates(updates);
    let rating_times = rating_curves.update_times();

    // ---- FractionalFlow
    let mut fractional_flows = FractionalFlows::default();
    let mut ff_rows = catalog.fractional_flow_static();
    ensure_sorted(
        &mut ff_rows,
        external,
        "FractionalFlow / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::FractionalFlow) {
        let rows: Vec<_> = ff_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        match rows.first() {
            Some(first) => {
                fractional_flows.push(id, first.fraction);
                for row in &rows {
                    if let Some(state) = &row.control_state {
                        fractional_flows.control_mapping.insert(
                            (id, state.clone()),
                            ControlUpdate {
                                active: None,
                                scalars: vec![("fraction", row.fraction)],
                                interpolants: vec![],
                            },
                        );
                    }
                }
            }
            None => {
                report.push(ValidationError::MissingData { node: id });
                fractional_flows.push(id, 1.0);
            }
        }
    }

    // ---- LevelBoundary
    let mut level_boundaries = LevelBoundaries::default();
    let mut lb_static = catalog.level_boundary_static();
    ensure_sorted(
        &mut lb_static,
        external,
        "LevelBoundary / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    let mut lb_time = catalog.level_boundary_time();
    ensure_sorted(
        &mut lb_time,
        external,
        "LevelBoundary / time",
        "(time, node_id)",
        |r| (ms(r.time), r.node_id),
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::LevelBoundary) {
        let times: Vec<f64> = lb_time
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .map(|r| r.time)
            .collect();
        if !times.is_empty() {
            let levels: Vec<f64> = lb_time
                .iter()
                .filter(|r| r.node_id == id.external_id)
                .map(|r| r.level)
                .collect();
            match Interpolation::new(times, levels) {
                Ok(itp) => level_boundaries.push(id, true, itp),
                Err(_) => {
                    report.push(ValidationError::TimeNotIncreasing { node: id });
                    level_boundaries.push(id, true, Interpolation::constant(0.0));
                }
            }
        } else if let Some(row) = lb_static.iter().find(|r| r.node_id == id.external_id) {
            level_boundaries.push(id, row.active.unwrap_or(true), Interpolation::constant(row.level));
        } else {
            report.push(ValidationError::MissingData { node: id });
            level_boundaries.push(id, true, Interpolation::constant(0.0));
        }
    }

    // ---- FlowBoundary
    let mut flow_boundaries = FlowBoundaries::default();
    let mut fb_static = catalog.flow_boundary_static();
    ensure_sorted(
        &mut fb_static,
        external,
        "FlowBoundary / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    let mut fb_time = catalog.flow_boundary_time();
    ensure_sorted(
        &mut fb_time,
        external,
        "FlowBoundary / time",
        "(time, node_id)",
        |r| (ms(r.time), r.node_id),
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::FlowBoundary) {
        let times: Vec<f64> = fb_time
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .map(|r| r.time)
            .collect();
        if !times.is_empty() {
            let rates: Vec<f64> = fb_time
                .iter()
                .filter(|r| r.node_id == id.external_id)
                .map(|r| r.flow_rate)
                .collect();
            match Interpolation::new(times, rates) {
                Ok(itp) => flow_boundaries.push(id, true, itp),
                Err(_) => {
                    report.push(ValidationError::TimeNotIncreasing { node: id });
                    flow_boundaries.push(id, true, Interpolation::constant(0.0));
                }
            }
        } else if let Some(row) = fb_static.iter().find(|r| r.node_id == id.external_id) {
            flow_boundaries.push(
                id,
                row.active.unwrap_or(true),
                Interpolation::constant(row.flow_rate),
            );
        } else {
            report.push(ValidationError::MissingData { node: id });
            flow_boundaries.push(id, true, Interpolation::constant(0.0));
        }
    }

    // ---- Pump
    let mut pumps = Pumps::default();
    let mut pump_rows = catalog.pump_static();
    ensure_sorted(
        &mut pump_rows,
        external,
        "Pump / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::Pump) {
        let rows: Vec<_> = pump_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        match rows.first() {
            Some(first) => {
                if first.flow_rate < 0.0 {
                    report.push(ValidationError::NegativeFlowRate {
                        node: id,
                        value: first.flow_rate,
                    });
                }
                pumps.push(
                    id,
                    first.active.unwrap_or(true),
                    first.flow_rate,
                    first.min_flow_rate.unwrap_or(0.0),
                    first.max_flow_rate.unwrap_or(f64::INFINITY),
                );
                for row in &rows {
                    if let Some(state) = &row.control_state {
                        pumps.control_mapping.insert(
                            (id, state.clone()),
                            ControlUpdate {
                                active: row.active,
                                scalars: vec![
                                    ("flow_rate", row.flow_rate),
                                    ("min_flow_rate", row.min_flow_rate.unwrap_or(0.0)),
                                    (
                                        "max_flow_rate",
                                        row.max_flow_rate.unwrap_or(f64::INFINITY),
                                    ),
                                ],
                                interpolants: vec![],
                            },
                        );
                    }
                }
            }
            None => {
                report.push(ValidationError::MissingData { node: id });
                pumps.push(id, true, 0.0, 0.0, f64::INFINITY);
            }
        }
    }

    // ---- Outlet
    let mut outlets = Outlets::default();
    let mut outlet_rows = catalog.outlet_static();
    ensure_sorted(
        &mut outlet_rows,
        external,
        "Outlet / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::Outlet) {
        let rows: Vec<_> = outlet_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        match rows.first() {
            Some(first) => {
                if first.flow_rate < 0.0 {
                    report.push(ValidationError::NegativeFlowRate {
                        node: id,
                        value: first.flow_rate,
                    });
                }
                outlets.push(
                    id,
                    first.active.unwrap_or(true),
                    first.flow_rate,
                    first.min_flow_rate.unwrap_or(0.0),
                    first.max_flow_rate.unwrap_or(f64::INFINITY),
                    first.min_crest_level.unwrap_or(f64::NEG_INFINITY),
                );
                for row in &rows {
                    if let Some(state) = &row.control_state {
                        outlets.control_mapping.insert(
                            (id, state.clone()),
                            ControlUpdate {
                                active: row.active,
                                scalars: vec![
                                    ("flow_rate", row.flow_rate),
                                    ("min_flow_rate", row.min_flow_rate.unwrap_or(0.0)),
                                    (
                                        "max_flow_rate",
                                        row.max_flow_rate.unwrap_or(f64::INFINITY),
                                    ),
                                    (
                                        "min_crest_level",
                                        row.min_crest_level.unwrap_or(f64::NEG_INFINITY),
                                    ),
                                ],
                                interpolants: vec![],
                            },
                        );
                    }
                }
            }
            None => {
                report.push(ValidationError::MissingData { node: id });
                outlets.push(id, true, 0.0, 0.0, f64::INFINITY, f64::NEG_INFINITY);
            }
        }
    }

    // ---- Terminal
    let mut terminals = Terminals::default();
    for id in kind_ids(&graph, NodeKind::Terminal) {
        terminals.push(id);
    }

    // ---- PidControl
    let mut pid_controls = PidControls::default();
    let mut pid_rows = catalog.pid_control_static();
    ensure_sorted(
        &mut pid_rows,
        external,
        "PidControl / static",
        "node_id",
        |r| r.node_id,
        &mut report,
    );
    let mut pid_time = catalog.pid_control_time();
    ensure_sorted(
        &mut pid_time,
        external,
        "PidControl / time",
        "(time, node_id)",
        |r| (ms(r.time), r.node_id),
        &mut report,
    );
    for id in kind_ids(&graph, NodeKind::PidControl) {
        let rows: Vec<_> = pid_rows
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        let first = match rows.first() {
            Some(f) => f,
            None => {
                report.push(ValidationError::MissingData { node: id });
                continue;
            }
        };
        let listen = NodeKind::parse(&first.listen_node_type)
            .ok_or(())
            .and_then(|k| graph.resolve(k, first.listen_node_id).map_err(|_| ()));
        let controlled = graph.unique_outneighbor(id, EdgeKind::Control);
        let (listen, controlled) = match (listen, controlled) {
            (Ok(l), Ok(c)) => (l, c),
            (l, c) => {
                if l.is_err() {
                    report.push(ValidationError::Other(format!(
                        "{id}: cannot resolve listen node {} #{}",
                        first.listen_node_type, first.listen_node_id
                    )));
                }
                if let Err(e) = c {
                    report.push(ValidationError::Other(format!("{id}: {e}")));
                }
                continue;
            }
        };
        let node_time: Vec<_> = pid_time
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        let (target, proportional, integral, derivative) = if node_time.is_empty() {
            (
                Interpolation::constant(first.target),
                Interpolation::constant(first.proportional),
                Interpolation::constant(first.integral),
                Interpolation::constant(first.derivative),
            )
        } else {
            let times: Vec<f64> = node_time.iter().map(|r| r.time).collect();
            let make = |values: Vec<f64>| match Interpolation::new(times.clone(), values) {
                Ok(itp) => itp,
                Err(_) => Interpolation::constant(0.0),
            };
            (
                make(node_time.iter().map(|r| r.target).collect()),
                make(node_time.iter().map(|r| r.proportional).collect()),
                make(node_time.iter().map(|r| r.integral).collect()),
                make(node_time.iter().map(|r| r.derivative).collect()),
            )
        };
        pid_controls.push(
            id,
            first.active.unwrap_or(true),
            listen,
            controlled,
            target,
            proportional,
            integral,
            derivative,
        );
        match controlled.kind {
            NodeKind::Pump => pumps.is_pid_controlled[controlled.index] = true,
            NodeKind::Outlet => outlets.is_pid_controlled[controlled.index] = true,
            _ => {}
        }
        for row in &rows {
            if let Some(state) = &row.control_state {
                pid_controls.control_mapping.insert(
                    (id, state.clone()),
                    ControlUpdate {
                        active: row.active,
                        scalars: vec![],
                        interpolants: vec![("target", Interpolation::constant(row.target))],
                    },
                );
            }
        }
    }

    // ---- Demand priorities across all demand node kinds.
    let mut ud_static = catalog.user_demand_static();
    ensure_sorted(
        &mut ud_static,
        external,
        "UserDemand / static",
        "(node_id, priority)",
        |r| (r.node_id, r.priority),
        &mut report,
    );
    let mut ud_time = catalog.user_demand_time();
    ensure_sorted(
        &mut ud_time,
        external,
        "UserDemand / time",
        "(node_id, priority, time)",
        |r| (r.node_id, r.priority, ms(r.time)),
        &mut report,
    );
    let ld_rows = catalog.level_demand_static();
    let fd_rows = catalog.flow_demand_static();
    let mut priorities: Vec<i32> = ud_static
        .iter()
        .map(|r| r.priority)
        .chain(ud_time.iter().map(|r| r.priority))
        .chain(ld_rows.iter().map(|r| r.priority))
        .chain(fd_rows.iter().map(|r| r.priority))
        .collect();
    priorities.sort_unstable();
    priorities.dedup();

    // ---- UserDemand
    let mut user_demands = UserDemands::default();
    for id in kind_ids(&graph, NodeKind::UserDemand) {
        let static_rows: Vec<_> = ud_static
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        let time_rows: Vec<_> = ud_time
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .collect();
        if static_rows.is_empty() && time_rows.is_empty() {
            report.push(ValidationError::MissingData { node: id });
            user_demands.push(
                id,
                true,
                0.0,
                f64::NEG_INFINITY,
                vec![Interpolation::constant(0.0); priorities.len()],
                false,
                allocation_enabled,
            );
            continue;
        }
        let mut demand_itp = vec![Interpolation::constant(0.0); priorities.len()];
        for row in &static_rows {
            if let Some(pi) = priorities.iter().position(|&p| p == row.priority) {
                demand_itp[pi] = Interpolation::constant(row.demand);
            }
        }
        for (pi, &priority) in priorities.iter().enumerate() {
            let rows: Vec<_> = time_rows
                .iter()
                .filter(|r| r.priority == priority)
                .collect();
            if rows.is_empty() {
                continue;
            }
            let times: Vec<f64> = rows.iter().map(|r| r.time).collect();
            let values: Vec<f64> = rows.iter().map(|r| r.demand).collect();
            match Interpolation::new(times, values) {
                Ok(itp) => demand_itp[pi] = itp,
                Err(_) => report.push(ValidationError::TimeNotIncreasing { node: id }),
            }
        }
        let (active, return_factor, min_level) = match static_rows.first() {
            Some(r) => (r.active.unwrap_or(true), r.return_factor, r.min_level),
            None => {
                let r = time_rows.first().unwrap();
                (true, r.return_factor, r.min_level)
            }
        };
        user_demands.push(
            id,
            active,
            return_factor,
            min_level,
            demand_itp,
            !time_rows.is_empty(),
            allocation_enabled,
        );
    }

    // ---- LevelDemand
    let mut level_demands = LevelDemands::default();
    for id in kind_ids(&graph, NodeKind::LevelDemand) {
        match ld_rows.iter().find(|r| r.node_id == id.external_id) {
            Some(row) => level_demands.push(
                id,
                Interpolation::constant(row.min_level),
                Interpolation::constant(row.max_level),
                row.priority,
            ),
            None => {
                report.push(ValidationError::MissingData { node: id });
                level_demands.push(
                    id,
                    Interpolation::constant(f64::NEG_INFINITY),
                    Interpolation::constant(f64::INFINITY),
                    1,
                );
            }
        }
    }

    // ---- FlowDemand
    let mut flow_demands = FlowDemands::default();
    for id in kind_ids(&graph, NodeKind::FlowDemand) {
        match fd_rows.iter().find(|r| r.node_id == id.external_id) {
            Some(row) => {
                flow_demands.push(id, Interpolation::constant(row.demand), row.priority)
            }
            None => {
                report.push(ValidationError::MissingData { node: id });
                flow_demands.push(id, Interpolation::constant(0.0), 1);
            }
        }
    }

    // ---- DiscreteControl
    let mut discrete_controls = DiscreteControls::default();
    let mut dc_vars = catalog.discrete_control_variables();
    ensure_sorted(
        &mut dc_vars,
        external,
        "DiscreteControl / variable",
        "(node_id, compound_variable_id)",
        |r| (r.node_id, r.compound_variable_id),
        &mut report,
    );
    let mut dc_conditions = catalog.discrete_control_conditions();
    ensure_sorted(
        &mut dc_conditions,
        external,
        "DiscreteControl / condition",
        "(node_id, compound_variable_id, greater_than)",
        |r| (r.node_id, r.compound_variable_id, ms(r.greater_than)),
        &mut report,
    );
    let dc_logic = catalog.discrete_control_logic();
    for id in kind_ids(&graph, NodeKind::DiscreteControl) {
        let mut variable_ids: Vec<i32> = dc_vars
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .map(|r| r.compound_variable_id)
            .collect();
        variable_ids.dedup();
        let mut compound_variables = vec![];
        for vid in variable_ids {
            let mut subvariables = vec![];
            for row in dc_vars
                .iter()
                .filter(|r| r.node_id == id.external_id && r.compound_variable_id == vid)
            {
                let listen = NodeKind::parse(&row.listen_node_type)
                    .ok_or(())
                    .and_then(|k| graph.resolve(k, row.listen_node_id).map_err(|_| ()));
                let variable = ListenVariable::parse(&row.variable);
                match (listen, variable) {
                    (Ok(listen), Some(variable)) => subvariables.push(SubVariable {
                        listen,
                        variable,
                        weight: row.weight.unwrap_or(1.0),
                        look_ahead: row.look_ahead.unwrap_or(0.0),
                    }),
                    _ => report.push(ValidationError::Other(format!(
                        "{id}: bad condition variable ({} #{}, {:?})",
                        row.listen_node_type, row.listen_node_id, row.variable
                    ))),
                }
            }
            let greater_than: Vec<f64> = dc_conditions
                .iter()
                .filter(|r| r.node_id == id.external_id && r.compound_variable_id == vid)
                .map(|r| r.greater_than)
                .collect();
            compound_variables.push(CompoundVariable {
                subvariables,
                greater_than,
            });
        }
        let n_bits = compound_variables
            .iter()
            .map(|v| v.greater_than.len())
            .sum();
        let raw: Vec<(String, String)> = dc_logic
            .iter()
            .filter(|r| r.node_id == id.external_id)
            .map(|r| (r.truth_state.clone(), r.control_state.clone()))
            .collect();
        match expand_logic_mapping(id, &raw, n_bits) {
            Ok(mapping) => discrete_controls.push(id, compound_variables, mapping),
            Err(e) => {
                report.push(e);
                discrete_controls.push(id, compound_variables, HashMap::new());
            }
        }
    }

    // ---- Subgrid
    let mut subgrid = Subgrid::default();
    let mut sg_rows = catalog.subgrid();
    ensure_sorted(
        &mut sg_rows,
        external,
        "Basin / subgrid",
        "(subgrid_id, basin_level)",
        |r| (r.subgrid_id, ms(r.basin_level)),
        &mut report,
    );
    let mut sg_ids: Vec<i32> = sg_rows.iter().map(|r| r.subgrid_id).collect();
    sg_ids.dedup();
    for sg_id in sg_ids {
        let rows: Vec<_> = sg_rows.iter().filter(|r| r.subgrid_id == sg_id).collect();
        let basin = match graph.resolve(NodeKind::Basin, rows[0].node_id) {
            Ok(id) => id,
            Err(e) => {
                report.push(ValidationError::Other(e.to_string()));
                continue;
            }
        };
        let x: Vec<f64> = rows.iter().map(|r| r.basin_level).collect();
        let y: Vec<f64> = rows.iter().map(|r| r.subgrid_level).collect();
        match Interpolation::new(x, y) {
            Ok(itp) => subgrid.push(sg_id, basin.index, itp),
            Err(msg) => report.push(ValidationError::Other(format!(
                "subgrid {sg_id}: {msg}"
            ))),
        }
    }

    let layout = StateLayout::new(basins.n(), pid_controls.n());
    let flow = FlowBuffer::new(graph.n_flow_edges(), basins.n());
    let net = Network {
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
        terminals,
        pid_controls,
        discrete_controls,
        user_demands,
        level_demands,
        flow_demands,
        layout,
        flow,
        priorities,
    };

    validate_graph(&net.graph, &mut report);
    validate_network(&net, &mut report);
    report.into_result()?;

    let mut u0 = storages;
    u0.extend(std::iter::repeat(0.0).take(net.pid_controls.n()));

    Ok(ModelData {
        net,
        u0,
        subgrid,
        forcing_times,
        rating_times,
    })
}
