use std::collections::HashSet;

use tracing::debug;

use crate::errors::AllocationError;
use crate::graph::{EdgeKind, NodeId, NodeKind};
use crate::network::Network;

/// One edge of the reduced allocation graph. Possibly a composite of a
/// chain of physical edges through nodes that are not of interest to
/// allocation; then `node_path` lists the interior chain.
#[derive(Debug, Clone)]
pub struct AllocEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub capacity: f64,
    pub node_path: Vec<NodeId>,
    /// Crosses from the main network into this subnetwork.
    pub main_link: bool,
    /// Starts at a flow or level boundary acting as a source.
    pub boundary_source: bool,
}

impl AllocEdge {
    pub fn is_source(&self) -> bool {
        self.main_link || self.boundary_source
    }
}

/// The reduced graph one allocation problem is built over.
#[derive(Debug, Clone, Default)]
pub struct AllocationGraph {
    pub subnetwork_id: i32,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<AllocEdge>,
}

impl AllocationGraph {
    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = (usize, &AllocEdge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.from == id)
    }

    pub fn in_edges(&self, id: NodeId) -> impl Iterator<Item = (usize, &AllocEdge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.to == id)
    }

    /// Reduce the physical graph to the allocation graph of one
    /// subnetwork: keep the nodes of interest, collapse chains of other
    /// nodes into composite min-capacity edges, and attach the source
    /// edges coming from boundaries or from the main network.
    pub fn build(net: &Network, subnetwork_id: i32) -> Result<Self, AllocationError> {
        let graph = &net.graph;

        // Member nodes of this subnetwork.
        let members: HashSet<NodeId> = graph
            .nodes()
            .iter()
            .copied()
            .filter(|&id| graph.subnetwork_id(id) == subnetwork_id)
            .collect();

        // Nodes of interest: demand carriers, storage, sinks, splitter
        // chains and their owners, and anything carrying an external
        // flow demand.
        let mut retained: HashSet<NodeId> = HashSet::new();
        for &id in &members {
            let keep = match id.kind {
                NodeKind::Basin
                | NodeKind::UserDemand
                | NodeKind::Terminal
                | NodeKind::LevelBoundary
                | NodeKind::FlowBoundary
                | NodeKind::FractionalFlow => true,
                _ => {
                    // Owner of a fractional-flow split.
                    graph
                        .outneighbors(id, EdgeKind::Flow)
                        .any(|n| n.kind == NodeKind::FractionalFlow)
                        // Target of an external flow demand.
                        || graph
                            .inneighbors(id, EdgeKind::Control)
                            .any(|n| n.kind == NodeKind::FlowDemand)
                }
            };
            if keep {
                retained.insert(id);
            }
        }

        // Source edges tagged for this subnetwork. The from-node may
        // live in the main network; it is pulled into this graph as a
        // source endpoint.
        let mut main_link_edges: Vec<(NodeId, NodeId)> = vec![];
        // Links from this network into other subnetworks, demand edges
        // when this is the main network.
        let mut outgoing_links: Vec<(NodeId, NodeId)> = vec![];
        for edge in graph.flow_edges() {
            let from_sub = graph.subnetwork_id(edge.from);
            if subnetwork_id == 1
                && edge.subnetwork_id_source > 1
                && edge.subnetwork_id_source != subnetwork_id
                && from_sub == 1
            {
                outgoing_links.push((edge.from, edge.to));
                retained.insert(edge.from);
            }
            if edge.subnetwork_id_source != subnetwork_id {
                continue;
            }
            let boundary = matches!(
                edge.from.kind,
                NodeKind::FlowBoundary | NodeKind::LevelBoundary
            );
            if !boundary && from_sub != subnetwork_id {
                if from_sub == 1 {
                    main_link_edges.push((edge.from, edge.to));
                    retained.insert(edge.from);
                    retained.insert(edge.to);
                } else {
                    return Err(AllocationError::BadSourceNode {
                        subnetwork_id,
                        from: edge.from,
                        to: edge.to,
                    });
                }
            }
        }

        // Walk from every retained node through non-retained chains.
        // Sorted iteration keeps edge (and so LP variable) order
        // deterministic across runs.
        let mut retained_sorted: Vec<NodeId> = retained.iter().copied().collect();
        retained_sorted.sort();
        let mut edges: Vec<AllocEdge> = vec![];
        for &start in &retained_sorted {
            if !members.contains(&start) && !main_link_edges.iter().any(|&(f, _)| f == start) {
                continue;
            }
            for first in graph.outneighbors(start, EdgeKind::Flow) {
                let mut capacity = constraining_capacity(net, start);
                let mut reversible = !start.kind.is_flow_direction_constraining();
                let mut path: Vec<NodeId> = vec![];
                let mut current = first;
                loop {
                    if retained.contains(&current) {
                        capacity = capacity.min(constraining_capacity(net, current));
                        reversible = reversible && !current.kind.is_flow_direction_constraining();
                        break;
                    }
                    if !members.contains(&current) {
                        // Chain leaves the subnetwork without reaching a
                        // node of interest; not an allocation edge.
                        path.clear();
                        current = start;
                        break;
                    }
                    capacity = capacity.min(constraining_capacity(net, current));
                    reversible = reversible && !current.kind.is_flow_direction_constraining();
                    path.push(current);
                    match graph.outneighbors(current, EdgeKind::Flow).next() {
                        Some(next) => current = next,
                        None => {
                            path.clear();
                            current = start;
                            break;
                        }
                    }
                }
                if current == start {
                    continue;
                }
                let main_link = main_link_edges.iter().any(|&(f, t)| f == start && t == first)
                    || main_link_edges.contains(&(start, current));
                let boundary_source = matches!(
                    start.kind,
                    NodeKind::FlowBoundary | NodeKind::LevelBoundary
                );
                edges.push(AllocEdge {
                    from: start,
                    to: current,
                    capacity,
                    node_path: path.clone(),
                    main_link,
                    boundary_source,
                });
                if reversible && !main_link && !boundary_source {
                    let mut reverse_path = path;
                    reverse_path.reverse();
                    edges.push(AllocEdge {
                        from: current,
                        to: start,
                        capacity,
                        node_path: reverse_path,
                        main_link: false,
                        boundary_source: false,
                    });
                }
            }
        }

        // In the main network, every link into a subnetwork is its own
        // demand edge; the subnetwork side is a plain sink here.
        for &(from, to) in &outgoing_links {
            let capacity = constraining_capacity(net, from).min(constraining_capacity(net, to));
            edges.push(AllocEdge {
                from,
                to,
                capacity,
                node_path: vec![],
                main_link: true,
                boundary_source: false,
            });
        }

        // Drop user return edges that cycle back to the user.
        let mut dropped: Vec<usize> = vec![];
        for (i, edge) in edges.iter().enumerate() {
            if edge.from.kind != NodeKind::UserDemand {
                continue;
            }
            if reaches(&edges, edge.to, edge.from, i) {
                debug!(
                    "subnetwork {subnetwork_id}: dropping return edge {} -> {} (cycles back to the user)",
                    edge.from, edge.to
                );
                dropped.push(i);
            }
        }
        for &i in dropped.iter().rev() {
            edges.remove(i);
        }

        let mut nodes: Vec<NodeId> = edges
            .iter()
            .flat_map(|e| [e.from, e.to])
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        nodes.sort();

        Ok(Self {
            subnetwork_id,
            nodes,
            edges,
        })
    }
}

/// Whether `target` is reachable from `from` over the allocation edges,
/// ignoring edge `skip`.
fn reaches(edges: &[AllocEdge], from: NodeId, target: NodeId, skip: usize) -> bool {
    let mut stack = vec![from];
    let mut seen: HashSet<NodeId> = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        for (i, edge) in edges.iter().enumerate() {
            if i != skip && edge.from == node {
                stack.push(edge.to);
            }
        }
    }
    false
}

fn constraining_capacity(net: &Network, id: NodeId) -> f64 {
    if id.kind.is_flow_constraining() {
        net.max_flow_rate(id)
    } else {
        f64::INFINITY
    }
}
