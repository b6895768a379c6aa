use std::collections::HashMap;
use std::fmt;

use crate::errors::GraphError;

/// Every node type the network knows about. The enum is the key into
/// the per-kind tables of the node catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Basin,
    LinearResistance,
    ManningResistance,
    TabulatedRatingCurve,
    FractionalFlow,
    LevelBoundary,
    FlowBoundary,
    Pump,
    Outlet,
    Terminal,
    PidControl,
    DiscreteControl,
    UserDemand,
    LevelDemand,
    FlowDemand,
}

pub const NODE_KINDS: [NodeKind; 15] = [
    NodeKind::Basin,
    NodeKind::LinearResistance,
    NodeKind::ManningResistance,
    NodeKind::TabulatedRatingCurve,
    NodeKind::FractionalFlow,
    NodeKind::LevelBoundary,
    NodeKind::FlowBoundary,
    NodeKind::Pump,
    NodeKind::Outlet,
    NodeKind::Terminal,
    NodeKind::PidControl,
    NodeKind::DiscreteControl,
    NodeKind::UserDemand,
    NodeKind::LevelDemand,
    NodeKind::FlowDemand,
];

impl NodeKind {
    pub fn parse(s: &str) -> Option<NodeKind> {
        match s {
            "Basin" => Some(NodeKind::Basin),
            "LinearResistance" => Some(NodeKind::LinearResistance),
            "ManningResistance" => Some(NodeKind::ManningResistance),
            "TabulatedRatingCurve" => Some(NodeKind::TabulatedRatingCurve),
            "FractionalFlow" => Some(NodeKind::FractionalFlow),
            "LevelBoundary" => Some(NodeKind::LevelBoundary),
            "FlowBoundary" => Some(NodeKind::FlowBoundary),
            "Pump" => Some(NodeKind::Pump),
            "Outlet" => Some(NodeKind::Outlet),
            "Terminal" => Some(NodeKind::Terminal),
            "PidControl" => Some(NodeKind::PidControl),
            "DiscreteControl" => Some(NodeKind::DiscreteControl),
            "UserDemand" => Some(NodeKind::UserDemand),
            "LevelDemand" => Some(NodeKind::LevelDemand),
            "FlowDemand" => Some(NodeKind::FlowDemand),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Basin => "Basin",
            NodeKind::LinearResistance => "LinearResistance",
            NodeKind::ManningResistance => "ManningResistance",
            NodeKind::TabulatedRatingCurve => "TabulatedRatingCurve",
            NodeKind::FractionalFlow => "FractionalFlow",
            NodeKind::LevelBoundary => "LevelBoundary",
            NodeKind::FlowBoundary => "FlowBoundary",
            NodeKind::Pump => "Pump",
            NodeKind::Outlet => "Outlet",
            NodeKind::Terminal => "Terminal",
            NodeKind::PidControl => "PidControl",
            NodeKind::DiscreteControl => "DiscreteControl",
            NodeKind::UserDemand => "UserDemand",
            NodeKind::LevelDemand => "LevelDemand",
            NodeKind::FlowDemand => "FlowDemand",
        }
    }

    /// Kinds whose max_flow_rate bounds the capacity of allocation
    /// edges passing through them.
    pub fn is_flow_constraining(&self) -> bool {
        matches!(
            self,
            NodeKind::Pump
                | NodeKind::Outlet
                | NodeKind::LinearResistance
                | NodeKind::ManningResistance
                | NodeKind::TabulatedRatingCurve
        )
    }

    /// Kinds through which flow is one-directional for allocation
    /// purposes (water cannot be pushed back upstream).
    pub fn is_flow_direction_constraining(&self) -> bool {
        matches!(
            self,
            NodeKind::Pump
                | NodeKind::Outlet
                | NodeKind::TabulatedRatingCurve
                | NodeKind::FractionalFlow
                | NodeKind::UserDemand
                | NodeKind::FlowBoundary
        )
    }

    /// Closed adjacency table for flow edges: which kinds a flow edge
    /// leaving this kind may point at.
    pub fn allowed_flow_neighbors(&self) -> &'static [NodeKind] {
        use NodeKind::*;
        match self {
            Basin => &[
                LinearResistance,
                ManningResistance,
                TabulatedRatingCurve,
                Pump,
                Outlet,
                UserDemand,
            ],
            LinearResistance => &[Basin, LevelBoundary],
            ManningResistance => &[Basin],
            TabulatedRatingCurve => &[Basin, FractionalFlow, Terminal, LevelBoundary],
            FractionalFlow => &[Basin, Terminal, LevelBoundary],
            LevelBoundary => &[LinearResistance, Pump, Outlet, TabulatedRatingCurve],
            FlowBoundary => &[Basin, Terminal, LevelBoundary],
            Pump => &[Basin, FractionalFlow, Terminal, LevelBoundary],
            Outlet => &[Basin, FractionalFlow, Terminal, LevelBoundary],
            Terminal => &[],
            PidControl => &[],
            DiscreteControl => &[],
            UserDemand => &[Basin, Terminal, LevelBoundary],
            LevelDemand => &[],
            FlowDemand => &[],
        }
    }

    /// Closed adjacency table for control edges.
    pub fn allowed_control_neighbors(&self) -> &'static [NodeKind] {
        use NodeKind::*;
        match self {
            PidControl => &[Pump, Outlet],
            DiscreteControl => &[
                Pump,
                Outlet,
                TabulatedRatingCurve,
                LinearResistance,
                ManningResistance,
                FractionalFlow,
                PidControl,
            ],
            LevelDemand => &[Basin],
            FlowDemand => &[
                LinearResistance,
                ManningResistance,
                TabulatedRatingCurve,
                Pump,
                Outlet,
            ],
            _ => &[],
        }
    }

    /// (min, max) bound on the number of flow inneighbors; None = unbounded.
    pub fn flow_in_bounds(&self) -> (usize, Option<usize>) {
        use NodeKind::*;
        match self {
            Basin | LevelBoundary => (0, None),
            LinearResistance | ManningResistance | TabulatedRatingCurve | FractionalFlow
            | Pump | Outlet | UserDemand => (1, Some(1)),
            FlowBoundary => (0, Some(0)),
            Terminal => (1, None),
            PidControl | DiscreteControl | LevelDemand | FlowDemand => (0, Some(0)),
        }
    }

    /// (min, max) bound on the number of flow outneighbors.
    pub fn flow_out_bounds(&self) -> (usize, Option<usize>) {
        use NodeKind::*;
        match self {
            Basin | LevelBoundary => (0, None),
            LinearResistance | ManningResistance | TabulatedRatingCurve | Pump | Outlet
            | UserDemand => (1, None),
            FractionalFlow => (1, Some(1)),
            FlowBoundary => (1, None),
            Terminal => (0, Some(0)),
            PidControl | DiscreteControl | LevelDemand | FlowDemand => (0, Some(0)),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one node: its kind, the user-facing id (unique per
/// kind), and the dense position in that kind's table. Equality and
/// ordering deliberately ignore `index` so ids read from input data
/// compare equal to ids carrying their resolved position.
#[derive(Debug, Clone, Copy)]
pub struct NodeId {
    pub kind: NodeKind,
    pub external_id: i32,
    /// 0-based position in the kind table. Usable directly as an index
    /// into the table's parallel arrays.
    pub index: usize,
}

impl NodeId {
    pub fn new(kind: NodeKind, external_id: i32, index: usize) -> Self {
        Self {
            kind,
            external_id,
            index,
        }
    }

    /// An id as it appears in input data, before the table position is
    /// known.
    pub fn unresolved(kind: NodeKind, external_id: i32) -> Self {
        Self {
            kind,
            external_id,
            index: usize::MAX,
        }
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.external_id == other.external_id
    }
}

impl Eq for NodeId {}

impl std::hash::Hash for NodeId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.external_id.hash(state);
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.kind, self.external_id).cmp(&(other.kind, other.external_id))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.external_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Flow,
    Control,
    None,
}

impl EdgeKind {
    pub fn parse(s: &str) -> Option<EdgeKind> {
        match s {
            "flow" => Some(EdgeKind::Flow),
            "control" => Some(EdgeKind::Control),
            "none" => Some(EdgeKind::None),
            _ => None,
        }
    }
}

/// Metadata carried by one edge of the network.
#[derive(Debug, Clone)]
pub struct EdgeMeta {
    pub id: i32,
    pub kind: EdgeKind,
    pub from: NodeId,
    pub to: NodeId,
    /// Subnetwork this edge is a source for; 0 means not a source.
    pub subnetwork_id_source: i32,
    /// The physical node chain behind a composite allocation edge.
    pub node_path: Vec<NodeId>,
    /// Dense index into the flow buffer, for flow edges only.
    pub flow_idx: Option<usize>,
}

/// Typed directed multigraph over NodeIds. Adjacency lists are
/// bucketed by edge kind so neighbor iteration filtered by kind costs
/// O(degree). Neighbors come back in edge insertion order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<NodeId>,
    node_lookup: HashMap<(NodeKind, i32), usize>,
    edges: Vec<EdgeMeta>,
    edge_lookup: HashMap<(NodeId, NodeId), usize>,
    out_flow: Vec<Vec<usize>>,
    in_flow: Vec<Vec<usize>>,
    out_control: Vec<Vec<usize>>,
    in_control: Vec<Vec<usize>>,
    n_flow_edges: usize,
    /// Positive subnetwork id per node position; 0 = unassigned.
    subnetwork_ids: Vec<i32>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, subnetwork_id: i32) -> Result<(), GraphError> {
        if self.node_lookup.contains_key(&(id.kind, id.external_id)) {
            return Err(GraphError::DuplicateNode { node: id });
        }
        self.node_lookup
            .insert((id.kind, id.external_id), self.nodes.len());
        self.nodes.push(id);
        self.subnetwork_ids.push(subnetwork_id);
        self.out_flow.push(vec![]);
        self.in_flow.push(vec![]);
        self.out_control.push(vec![]);
        self.in_control.push(vec![]);
        Ok(())
    }

    /// Resolve an id as read from input data into the id the graph
    /// carries, with the table index attached.
    pub fn resolve(&self, kind: NodeKind, external_id: i32) -> Result<NodeId, GraphError> {
        self.node_lookup
            .get(&(kind, external_id))
            .map(|&pos| self.nodes[pos])
            .ok_or(GraphError::UnknownNode { kind, external_id })
    }

    fn position(&self, id: NodeId) -> Result<usize, GraphError> {
        self.node_lookup
            .get(&(id.kind, id.external_id))
            .copied()
            .ok_or(GraphError::UnknownNode {
                kind: id.kind,
                external_id: id.external_id,
            })
    }

    pub fn add_edge(&mut self, mut meta: EdgeMeta) -> Result<usize, GraphError> {
        let from_pos = self.position(meta.from)?;
        let to_pos = self.position(meta.to)?;
        // Store resolved endpoints so neighbor iteration hands out ids
        // that index straight into the kind tables.
        meta.from = self.nodes[from_pos];
        meta.to = self.nodes[to_pos];
        if meta.kind == EdgeKind::Flow {
            meta.flow_idx = Some(self.n_flow_edges);
            self.n_flow_edges += 1;
        }
        let edge_idx = self.edges.len();
        self.edge_lookup.entry((meta.from, meta.to)).or_insert(edge_idx);
        match meta.kind {
            EdgeKind::Flow => {
                self.out_flow[from_pos].push(edge_idx);
                self.in_flow[to_pos].push(edge_idx);
            }
            EdgeKind::Control => {
                self.out_control[from_pos].push(edge_idx);
                self.in_control[to_pos].push(edge_idx);
            }
            EdgeKind::None => {}
        }
        self.edges.push(meta);
        Ok(edge_idx)
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_flow_edges(&self) -> usize {
        self.n_flow_edges
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn subnetwork_id(&self, id: NodeId) -> i32 {
        match self.position(id) {
            Ok(pos) => self.subnetwork_ids[pos],
            Err(_) => 0,
        }
    }

    /// All positive subnetwork ids present, ascending, deduplicated.
    pub fn subnetwork_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .subnetwork_ids
            .iter()
            .copied()
            .filter(|&s| s > 0)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn edges(&self) -> &[EdgeMeta] {
        &self.edges
    }

    pub fn edge(&self, from: NodeId, to: NodeId) -> Result<&EdgeMeta, GraphError> {
        self.edge_lookup
            .get(&(from, to))
            .map(|&i| &self.edges[i])
            .ok_or(GraphError::UnknownEdge { from, to })
    }

    pub fn edge_mut(&mut self, from: NodeId, to: NodeId) -> Result<&mut EdgeMeta, GraphError> {
        match self.edge_lookup.get(&(from, to)) {
            Some(&i) => Ok(&mut self.edges[i]),
            None => Err(GraphError::UnknownEdge { from, to }),
        }
    }

    fn bucket(&self, id: NodeId, kind: EdgeKind, outgoing: bool) -> &[usize] {
        static EMPTY: [usize; 0] = [];
        let pos = match self.position(id) {
            Ok(p) => p,
            Err(_) => return &EMPTY,
        };
        match (kind, outgoing) {
            (EdgeKind::Flow, true) => &self.out_flow[pos],
            (EdgeKind::Flow, false) => &self.in_flow[pos],
            (EdgeKind::Control, true) => &self.out_control[pos],
            (EdgeKind::Control, false) => &self.in_control[pos],
            (EdgeKind::None, _) => &EMPTY,
        }
    }

    pub fn out_edges(&self, id: NodeId, kind: EdgeKind) -> impl Iterator<Item = &EdgeMeta> {
        self.bucket(id, kind, true).iter().map(move |&i| &self.edges[i])
    }

    pub fn in_edges(&self, id: NodeId, kind: EdgeKind) -> impl Iterator<Item = &EdgeMeta> {
        self.bucket(id, kind, false).iter().map(move |&i| &self.edges[i])
    }

    pub fn outneighbors(&self, id: NodeId, kind: EdgeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.out_edges(id, kind).map(|e| e.to)
    }

    pub fn inneighbors(&self, id: NodeId, kind: EdgeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.in_edges(id, kind).map(|e| e.from)
    }

    pub fn flow_out_degree(&self, id: NodeId) -> usize {
        self.bucket(id, EdgeKind::Flow, true).len()
    }

    pub fn flow_in_degree(&self, id: NodeId) -> usize {
        self.bucket(id, EdgeKind::Flow, false).len()
    }

    pub fn unique_outneighbor(&self, id: NodeId, kind: EdgeKind) -> Result<NodeId, GraphError> {
        let bucket = self.bucket(id, kind, true);
        if bucket.len() == 1 {
            Ok(self.edges[bucket[0]].to)
        } else {
            Err(GraphError::DegreeViolation {
                node: id,
                kind,
                direction: "out",
                found: bucket.len(),
            })
        }
    }

    pub fn unique_inneighbor(&self, id: NodeId, kind: EdgeKind) -> Result<NodeId, GraphError> {
        let bucket = self.bucket(id, kind, false);
        if bucket.len() == 1 {
            Ok(self.edges[bucket[0]].from)
        } else {
            Err(GraphError::DegreeViolation {
                node: id,
                kind,
                direction: "in",
                found: bucket.len(),
            })
        }
    }

    /// Flow edges in flow-index order (which is insertion order).
    pub fn flow_edges(&self) -> impl Iterator<Item = &EdgeMeta> {
        self.edges.iter().filter(|e| e.kind == EdgeKind::Flow)
    }
}
