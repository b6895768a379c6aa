use std::collections::HashMap;

use crate::graph::NodeId;
use crate::numerical::interpolation::Interpolation;

/// Pre-built update descriptor applied when a node enters a control
/// state. Plain data produced at load time: named scalar slots and
/// wholesale interpolant replacements, no references into node fields.
#[derive(Debug, Clone, Default)]
pub struct ControlUpdate {
    pub active: Option<bool>,
    pub scalars: Vec<(&'static str, f64)>,
    pub interpolants: Vec<(&'static str, Interpolation)>,
}

/// (controlled node, control state label) -> update descriptor.
pub type ControlMapping = HashMap<(NodeId, String), ControlUpdate>;
