use std::collections::{HashMap, HashSet};

use crate::errors::{ValidationError, ValidationReport};
use crate::graph::{EdgeKind, Graph, NodeId, NodeKind};
use crate::network::Network;

/// Structural validation of the assembled graph: edge-kind adjacency,
/// per-kind degree bounds, and subnetwork connectivity. Everything
/// found wrong is collected into the report.
pub fn validate_graph(graph: &Graph, report: &mut ValidationReport) {
    for edge in graph.edges() {
        match edge.kind {
            EdgeKind::Flow => {
                if !edge
                    .from
                    .kind
                    .allowed_flow_neighbors()
                    .contains(&edge.to.kind)
                {
                    report.push(ValidationError::FlowEdgeNotAllowed {
                        edge_id: edge.id,
                        from: edge.from,
                        to: edge.to,
                    });
                }
            }
            EdgeKind::Control => {
                if !edge
                    .from
                    .kind
                    .allowed_control_neighbors()
                    .contains(&edge.to.kind)
                {
                    report.push(ValidationError::ControlEdgeNotAllowed {
                        edge_id: edge.id,
                        from: edge.from,
                        to: edge.to,
                    });
                }
            }
            EdgeKind::None => {}
        }
    }

    for &node in graph.nodes() {
        let (min_in, max_in) = node.kind.flow_in_bounds();
        let found_in = graph.flow_in_degree(node);
        if found_in < min_in || max_in.map(|m| found_in > m).unwrap_or(false) {
            report.push(ValidationError::FlowInDegree {
                node,
                found: found_in,
                min: min_in,
                max: max_in,
            });
        }
        let (min_out, max_out) = node.kind.flow_out_bounds();
        let found_out = graph.flow_out_degree(node);
        if found_out < min_out || max_out.map(|m| found_out > m).unwrap_or(false) {
            report.push(ValidationError::FlowOutDegree {
                node,
                found: found_out,
                min: min_out,
                max: max_out,
            });
        }
    }

    // Nodes sharing a positive subnetwork id must form one connected
    // component of the undirected flow graph.
    let mut by_subnetwork: HashMap<i32, Vec<NodeId>> = HashMap::new();
    for &node in graph.nodes() {
        let sid = graph.subnetwork_id(node);
        if sid > 0 && node.kind != NodeKind::DiscreteControl && node.kind != NodeKind::PidControl
        {
            by_subnetwork.entry(sid).or_default().push(node);
        }
    }
    for (sid, members) in by_subnetwork {
        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let with_flow: Vec<NodeId> = members
            .iter()
            .copied()
            .filter(|&n| graph.flow_in_degree(n) + graph.flow_out_degree(n) > 0)
            .collect();
        let start = match with_flow.first() {
            Some(&s) => s,
            None => continue,
        };
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            for next in graph
                .outneighbors(node, EdgeKind::Flow)
                .chain(graph.inneighbors(node, EdgeKind::Flow))
            {
                if member_set.contains(&next) {
                    stack.push(next);
                }
            }
        }
        if with_flow.iter().any(|n| !seen.contains(n)) {
            report.push(ValidationError::SubnetworkNotConnected { subnetwork_id: sid });
        }
    }
}

/// Checks that need the node tables as well: fractional flow fraction
/// sums, flow boundary sign, and PID listen adjacency.
pub fn validate_network(net: &Network, report: &mut ValidationReport) {
    // Fractions leaving one splitter owner must sum to one.
    let mut owners: HashSet<NodeId> = HashSet::new();
    for i in 0..net.fractional_flows.n() {
        let ff = net.fractional_flows.node_id[i];
        if net.fractional_flows.fraction[i] < 0.0 {
            report.push(ValidationError::NegativeFraction {
                node: ff,
                value: net.fractional_flows.fraction[i],
            });
        }
        if let Ok(owner) = net.graph.unique_inneighbor(ff, EdgeKind::Flow) {
            owners.insert(owner);
        }
    }
    for owner in owners {
        let mut sum = 0.0;
        for child in net.graph.outneighbors(owner, EdgeKind::Flow) {
            if child.kind == NodeKind::FractionalFlow {
                sum += net.fractional_flows.fraction[child.index];
            }
        }
        if (sum - 1.0).abs() > 1e-6 {
            report.push(ValidationError::FractionSum {
                node: owner,
                control_state: String::new(),
                sum,
            });
        }
    }

    for i in 0..net.flow_boundaries.n() {
        let min = net.flow_boundaries.flow_rate[i].min_y();
        if min < 0.0 {
            report.push(ValidationError::NegativeFlowRate {
                node: net.flow_boundaries.node_id[i],
                value: min,
            });
        }
    }

    for p in 0..net.pid_controls.n() {
        let listen = net.pid_controls.listen_node[p];
        let controlled = net.pid_controls.controlled_node[p];
        let adjacent = listen.kind == NodeKind::Basin
            && net
                .graph
                .inneighbors(controlled, EdgeKind::Flow)
                .chain(net.graph.outneighbors(controlled, EdgeKind::Flow))
                .any(|n| n == listen);
        if !adjacent {
            report.push(ValidationError::PidListenNotAdjacent {
                node: net.pid_controls.node_id[p],
                listen,
            });
        }
    }
}
