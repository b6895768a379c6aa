use std::collections::HashMap;

use tracing::warn;

use crate::errors::ValidationError;
use crate::graph::{EdgeKind, NodeId, NodeKind};
use crate::network::Network;

/// What a condition sub-variable listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenVariable {
    Level,
    FlowRate,
}

impl ListenVariable {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "level" => Some(ListenVariable::Level),
            "flow_rate" => Some(ListenVariable::FlowRate),
            _ => None,
        }
    }
}

/// One term of a compound condition variable: a weighted reading of a
/// level or flow, optionally looked ahead in time for boundary curves.
#[derive(Debug, Clone)]
pub struct SubVariable {
    pub listen: NodeId,
    pub variable: ListenVariable,
    pub weight: f64,
    pub look_ahead: f64,
}

/// A weighted sum of sub-variables compared against a strictly
/// increasing list of thresholds. Each threshold owns one bit of the
/// node's truth state.
#[derive(Debug, Clone)]
pub struct CompoundVariable {
    pub subvariables: Vec<SubVariable>,
    pub greater_than: Vec<f64>,
}

/// One logged control transition.
#[derive(Debug, Clone)]
pub struct ControlEvent {
    pub time: f64,
    pub control_node_id: NodeId,
    pub truth_state: String,
    pub control_state: String,
}

/// Discrete controllers: watch compound variables, hold a truth state
/// over all thresholds, and on zero crossings map the truth state
/// through the logic mapping to a control state applied to every
/// controlled node.
#[derive(Debug, Clone, Default)]
pub struct DiscreteControls {
    pub node_id: Vec<NodeId>,
    pub compound_variables: Vec<Vec<CompoundVariable>>,
    /// Truth bits per node, one per (compound variable, threshold).
    pub truth_state: Vec<Vec<bool>>,
    pub control_state: Vec<String>,
    /// Expanded logic mapping: concrete truth string -> control state.
    pub logic_mapping: Vec<HashMap<String, String>>,
    pub record: Vec<ControlEvent>,
}

impl DiscreteControls {
    pub fn n(&self) -> usize {
        self.node_id.len()
    }

    pub fn push(
        &mut self,
        node_id: NodeId,
        compound_variables: Vec<CompoundVariable>,
        logic_mapping: HashMap<String, String>,
    ) {
        let n_bits = compound_variables
            .iter()
            .map(|v| v.greater_than.len())
            .sum();
        self.node_id.push(node_id);
        self.compound_variables.push(compound_variables);
        self.truth_state.push(vec![false; n_bits]);
        self.control_state.push(String::new());
        self.logic_mapping.push(logic_mapping);
    }

    /// Total number of threshold conditions across all nodes: the
    /// length of the zero-crossing function vector.
    pub fn n_conditions(&self) -> usize {
        self.truth_state.iter().map(|t| t.len()).sum()
    }

    pub fn truth_string(&self, idx: usize) -> String {
        self.truth_state[idx]
            .iter()
            .map(|&b| if b { 'T' } else { 'F' })
            .collect()
    }
}

/// Expand a wildcard logic mapping into its concrete form. `*`
/// characters stand for both T and F; anything else outside {T, F} is
/// rejected, as are duplicate concrete keys mapping to different
/// control states.
pub fn expand_logic_mapping(
    node: NodeId,
    raw: &[(String, String)],
    n_bits: usize,
) -> Result<HashMap<String, String>, ValidationError> {
    let mut expanded: HashMap<String, String> = HashMap::new();
    for (pattern, control_state) in raw {
        if pattern.len() != n_bits {
            return Err(ValidationError::BadTruthState {
                node,
                truth_state: pattern.clone(),
            });
        }
        if pattern.chars().any(|c| !matches!(c, 'T' | 'F' | '*')) {
            return Err(ValidationError::BadTruthState {
                node,
                truth_state: pattern.clone(),
            });
        }
        let mut keys = vec![String::new()];
        for c in pattern.chars() {
            match c {
                '*' => {
                    keys = keys
                        .iter()
                        .flat_map(|k| [format!("{k}T"), format!("{k}F")])
                        .collect();
                }
                c => {
                    for k in &mut keys {
                        k.push(c);
                    }
                }
            }
        }
        for key in keys {
            if let Some(existing) = expanded.get(&key) {
                if existing != control_state {
                    return Err(ValidationError::AmbiguousTruthState {
                        node,
                        truth_state: key,
                        a: existing.clone(),
                        b: control_state.clone(),
                    });
                }
            } else {
                expanded.insert(key, control_state.clone());
            }
        }
    }
    Ok(expanded)
}

/// The value a sub-variable reads from the network at time t.
fn subvariable_value(net: &Network, sub: &SubVariable, t: f64) -> f64 {
    let t_ahead = t + sub.look_ahead;
    match (sub.variable, sub.listen.kind) {
        (ListenVariable::Level, NodeKind::Basin) => net.basins.current_level[sub.listen.index],
        (ListenVariable::Level, NodeKind::LevelBoundary) => {
            net.level_boundaries.level[sub.listen.index].sample(t_ahead)
        }
        (ListenVariable::FlowRate, NodeKind::FlowBoundary) => {
            net.flow_boundaries.flow_rate[sub.listen.index].sample(t_ahead)
        }
        // Any other node: the flow over its unique out-edge.
        (ListenVariable::FlowRate, _) => net.out_edge_flow(sub.listen),
        _ => f64::NAN,
    }
}

/// value - threshold for every (node, compound variable, threshold), in
/// a fixed flattened order. Zero crossings of these are the
/// discrete-control events.
pub fn condition_values(net: &Network, t: f64) -> Vec<f64> {
    let dc = &net.discrete_controls;
    let mut out = Vec::with_capacity(dc.n_conditions());
    for i in 0..dc.n() {
        for var in &dc.compound_variables[i] {
            let value: f64 = var
                .subvariables
                .iter()
                .map(|sub| sub.weight * subvariable_value(net, sub, t))
                .sum();
            for &threshold in &var.greater_than {
                out.push(value - threshold);
            }
        }
    }
    out
}

/// Set every truth bit from the current condition values without
/// triggering transitions. Used once at initialization. The flattened
/// condition order matches the per-node bit order exactly.
pub fn set_initial_truth_states(net: &mut Network, t: f64) {
    let values = condition_values(net, t);
    let dc = &mut net.discrete_controls;
    let mut flat = 0;
    for i in 0..dc.n() {
        for bit in 0..dc.truth_state[i].len() {
            dc.truth_state[i][bit] = values[flat] > 0.0;
            flat += 1;
        }
    }
}

/// Flip the bit behind one crossed condition (flat index across all
/// nodes) and evaluate the resulting transition. Returns the error
/// string when the truth state is missing from the logic mapping,
/// which is fatal.
pub fn handle_crossing(net: &mut Network, flat_condition: usize, t: f64) -> Result<(), String> {
    // Locate (node, bit) behind the flat condition index.
    let dc = &mut net.discrete_controls;
    let mut offset = 0;
    let mut target: Option<(usize, usize)> = None;
    for i in 0..dc.n() {
        let n_bits = dc.truth_state[i].len();
        if flat_condition < offset + n_bits {
            target = Some((i, flat_condition - offset));
            break;
        }
        offset += n_bits;
    }
    let (node_idx, bit) = match target {
        Some(t) => t,
        None => return Ok(()),
    };
    dc.truth_state[node_idx][bit] = !dc.truth_state[node_idx][bit];
    let truth = dc.truth_string(node_idx);
    let control_node = dc.node_id[node_idx];
    let new_state = match dc.logic_mapping[node_idx].get(&truth) {
        Some(s) => s.clone(),
        None => {
            return Err(format!(
                "{control_node}: no control state for truth state {truth:?}"
            ))
        }
    };
    if new_state == dc.control_state[node_idx] {
        return Ok(());
    }
    apply_control_state(net, node_idx, &new_state);
    let dc = &mut net.discrete_controls;
    dc.control_state[node_idx] = new_state.clone();
    dc.record.push(ControlEvent {
        time: t,
        control_node_id: control_node,
        truth_state: truth,
        control_state: new_state,
    });
    Ok(())
}

/// Apply `state` to every node controlled by discrete controller
/// `node_idx`: overwrite active flags, assign scalar parameters, and
/// swap interpolants, all through the pre-built update descriptors.
pub fn apply_control_state(net: &mut Network, node_idx: usize, state: &str) {
    let control_node = net.discrete_controls.node_id[node_idx];
    let controlled: Vec<NodeId> = net
        .graph
        .outneighbors(control_node, EdgeKind::Control)
        .collect();
    for id in controlled {
        let key = (id, state.to_string());
        match id.kind {
            NodeKind::Pump => {
                if let Some(update) = net.pumps.control_mapping.get(&key).cloned() {
                    net.pumps.apply_update(id.index, &update);
                } else {
                    warn!("{id}: no control mapping for state {state:?}");
                }
            }
            NodeKind::Outlet => {
                if let Some(update) = net.outlets.control_mapping.get(&key).cloned() {
                    net.outlets.apply_update(id.index, &update);
                } else {
                    warn!("{id}: no control mapping for state {state:?}");
                }
            }
            NodeKind::TabulatedRatingCurve => {
                if let Some(update) = net.rating_curves.control_mapping.get(&key).cloned() {
                    net.rating_curves.apply_update(id.index, &update);
                } else {
                    warn!("{id}: no control mapping for state {state:?}");
                }
            }
            NodeKind::LinearResistance => {
                if let Some(update) = net.linear_resistances.control_mapping.get(&key).cloned() {
                    net.linear_resistances.apply_update(id.index, &update);
                } else {
                    warn!("{id}: no control mapping for state {state:?}");
                }
            }
            NodeKind::ManningResistance => {
                if let Some(update) = net.manning_resistances.control_mapping.get(&key).cloned() {
                    net.manning_resistances.apply_update(id.index, &update);
                } else {
                    warn!("{id}: no control mapping for state {state:?}");
                }
            }
            NodeKind::FractionalFlow => {
                if let Some(update) = net.fractional_flows.control_mapping.get(&key).cloned() {
                    net.fractional_flows.apply_update(id.index, &update);
                } else {
                    warn!("{id}: no control mapping for state {state:?}");
                }
            }
            NodeKind::PidControl => {
                if let Some(update) = net.pid_controls.control_mapping.get(&key).cloned() {
                    net.pid_controls.apply_update(id.index, &update);
                } else {
                    warn!("{id}: no control mapping for state {state:?}");
                }
            }
            _ => {}
        }
    }
}
