use std::collections::HashMap;

use tracing::debug;

use crate::allocation::graph::AllocationGraph;
use crate::allocation::solver::{LpProblem, LpStatus, RowSense};
use crate::errors::AllocationError;
use crate::graph::{NodeId, NodeKind};
use crate::network::Network;

/// Which penalty shape the objective uses for unmet demand. Exactly one
/// is configured for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveType {
    QuadraticAbsolute,
    QuadraticRelative,
    LinearAbsolute,
    LinearRelative,
}

impl ObjectiveType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quadratic_absolute" => Some(Self::QuadraticAbsolute),
            "quadratic_relative" => Some(Self::QuadraticRelative),
            "linear_absolute" => Some(Self::LinearAbsolute),
            "linear_relative" => Some(Self::LinearRelative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuadraticAbsolute => "quadratic_absolute",
            Self::QuadraticRelative => "quadratic_relative",
            Self::LinearAbsolute => "linear_absolute",
            Self::LinearRelative => "linear_relative",
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, Self::LinearAbsolute | Self::LinearRelative)
    }
}

/// Whether a pass fixes source flows (allocate) or measures what the
/// subnetwork would like to draw from the main network (collect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationType {
    CollectDemands,
    Allocate,
}

impl OptimizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectDemands => "collect_demands",
            Self::Allocate => "allocate",
        }
    }
}

/// One (user or demand carrier, priority) outcome of a solve.
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    pub time: f64,
    pub subnetwork_id: i32,
    pub node_id: NodeId,
    pub priority: i32,
    pub demand: f64,
    pub allocated: f64,
    pub realized: f64,
}

/// Flow over one allocation edge at one priority of one solve.
#[derive(Debug, Clone)]
pub struct FlowRecord {
    pub time: f64,
    pub from: NodeId,
    pub to: NodeId,
    pub subnetwork_id: i32,
    pub priority: i32,
    pub flow_rate: f64,
    pub optimization_type: OptimizationType,
}

/// The allocation problem of one subnetwork: the reduced graph, the
/// editable LP over it, and the variable/row bookkeeping that lets the
/// per-priority loop adjust right-hand sides and objectives in place.
#[derive(Debug, Clone)]
pub struct AllocationModel {
    pub subnetwork_id: i32,
    pub objective: ObjectiveType,
    /// Allocation period in seconds.
    pub dt: f64,
    pub agraph: AllocationGraph,
    pub lp: LpProblem,
    /// LP variable per allocation edge.
    edge_var: Vec<usize>,
    basin_in: HashMap<NodeId, usize>,
    basin_out: HashMap<NodeId, usize>,
    buffer_in: HashMap<NodeId, usize>,
    buffer_out: HashMap<NodeId, usize>,
    /// |F - d| linearization variables per demand edge, linear
    /// objectives only.
    abs_var: HashMap<usize, usize>,
    capacity_row: HashMap<usize, usize>,
    source_row: HashMap<usize, usize>,
    user_return_row: HashMap<NodeId, usize>,
    basin_out_row: HashMap<NodeId, usize>,
    buffer_out_row: HashMap<NodeId, usize>,
    /// Row gating the outflow of a flow-demanded node at its priority.
    fd_gate_row: HashMap<NodeId, usize>,
    abs_rows: HashMap<usize, (usize, usize)>,
    /// Demand edges: (allocation edge index, the node whose demand they
    /// serve).
    user_edges: Vec<(usize, NodeId)>,
    link_edges: Vec<usize>,
    /// Flow-demand buffer volume carried between solves.
    buffer: HashMap<NodeId, f64>,
    /// What downstream subnetworks want over each main link, per
    /// priority index. Filled by their collect passes.
    pub subnetwork_demands: HashMap<(NodeId, NodeId), Vec<f64>>,
    /// What the main network granted on each link, per priority index.
    pub subnetwork_allocateds: HashMap<(NodeId, NodeId), Vec<f64>>,
    pub records: Vec<AllocationRecord>,
    pub flow_records: Vec<FlowRecord>,
}

impl AllocationModel {
    pub fn new(
        net: &Network,
        subnetwork_id: i32,
        objective: ObjectiveType,
        dt: f64,
        time_limit: f64,
    ) -> Result<Self, AllocationError> {
        let agraph = AllocationGraph::build(net, subnetwork_id)?;
        let n_edges = agraph.edges.len();
        let n_priorities = net.priorities.len();

        // Variable layout: edge flows first, then basin and buffer
        // storage exchange, then the |.| linearization variables.
        let mut n_vars = n_edges;
        let edge_var: Vec<usize> = (0..n_edges).collect();

        let mut basin_in = HashMap::new();
        let mut basin_out = HashMap::new();
        for ld in 0..net.level_demands.n() {
            for target in net.graph.outneighbors(
                net.level_demands.node_id[ld],
                crate::graph::EdgeKind::Control,
            ) {
                if agraph.nodes.contains(&target) {
                    basin_in.insert(target, n_vars);
                    basin_out.insert(target, n_vars + 1);
                    n_vars += 2;
                }
            }
        }
        let mut buffer_in = HashMap::new();
        let mut buffer_out = HashMap::new();
        let mut buffer = HashMap::new();
        for fd in 0..net.flow_demands.n() {
            for target in net
                .graph
                .outneighbors(net.flow_demands.node_id[fd], crate::graph::EdgeKind::Control)
            {
                if agraph.nodes.contains(&target) {
                    buffer_in.insert(target, n_vars);
                    buffer_out.insert(target, n_vars + 1);
                    buffer.insert(target, 0.0);
                    n_vars += 2;
                }
            }
        }

        let user_edges: Vec<(usize, NodeId)> = agraph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.to.kind == NodeKind::UserDemand)
            .map(|(i, e)| (i, e.to))
            .collect();
        let link_edges: Vec<usize> = agraph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.main_link)
            .map(|(i, _)| i)
            .collect();

        let mut abs_var = HashMap::new();
        if objective.is_linear() {
            for &(e, _) in &user_edges {
                abs_var.insert(e, n_vars);
                n_vars += 1;
            }
            if subnetwork_id == 1 {
                for &e in &link_edges {
                    abs_var.insert(e, n_vars);
                    n_vars += 1;
                }
            }
        }
        let mut lp = LpProblem::new(n_vars);
        lp.time_limit = time_limit;

        // Capacity rows for finite-capacity non-source edges; source
        // rows for the rest. Right-hand sides are refreshed per solve.
        let mut capacity_row = HashMap::new();
        let mut source_row = HashMap::new();
        for (i, edge) in agraph.edges.iter().enumerate() {
            if edge.is_source() && !(subnetwork_id == 1 && edge.main_link) {
                let row = lp.add_row(vec![(edge_var[i], 1.0)], RowSense::Le, 0.0);
                source_row.insert(i, row);
            } else if edge.capacity.is_finite() {
                let row = lp.add_row(vec![(edge_var[i], 1.0)], RowSense::Le, edge.capacity);
                capacity_row.insert(i, row);
            }
        }

        // User return: the outflow of a user is bounded by the return
        // accumulated over the priorities served so far.
        let mut user_return_row = HashMap::new();
        for node in &agraph.nodes {
            if node.kind != NodeKind::UserDemand {
                continue;
            }
            let coeffs: Vec<(usize, f64)> = agraph
                .out_edges(*node)
                .map(|(i, _)| (edge_var[i], 1.0))
                .collect();
            if !coeffs.is_empty() {
                let row = lp.add_row(coeffs, RowSense::Le, 0.0);
                user_return_row.insert(*node, row);
            }
        }

        // Flow conservation. Equality at interior nodes and basins
        // (with their storage exchange variables), inequality at
        // subnetwork inlets where the main network may deliver less
        // than the edge could carry.
        let inlets: Vec<NodeId> = agraph
            .edges
            .iter()
            .filter(|e| e.main_link && subnetwork_id != 1)
            .map(|e| e.to)
            .collect();
        for node in &agraph.nodes {
            match node.kind {
                NodeKind::FlowBoundary
                | NodeKind::LevelBoundary
                | NodeKind::Terminal
                | NodeKind::UserDemand => continue,
                _ => {}
            }
            if net.graph.subnetwork_id(*node) != subnetwork_id {
                // Source endpoint living in another network.
                continue;
            }
            if subnetwork_id == 1 && agraph.edges.iter().any(|e| e.main_link && e.to == *node) {
                // Subnetwork side of an outgoing link: a sink here.
                continue;
            }
            let mut coeffs: Vec<(usize, f64)> = vec![];
            for (i, _) in agraph.in_edges(*node) {
                coeffs.push((edge_var[i], 1.0));
            }
            for (i, _) in agraph.out_edges(*node) {
                coeffs.push((edge_var[i], -1.0));
            }
            if let Some(&v) = basin_out.get(node) {
                coeffs.push((v, 1.0));
            }
            if let Some(&v) = basin_in.get(node) {
                coeffs.push((v, -1.0));
            }
            if let Some(&v) = buffer_out.get(node) {
                coeffs.push((v, 1.0));
            }
            if let Some(&v) = buffer_in.get(node) {
                coeffs.push((v, -1.0));
            }
            if coeffs.is_empty() {
                continue;
            }
            if inlets.contains(node) {
                // sum(out) - sum(in) <= 0: slack allowed at the inlet.
                let flipped: Vec<(usize, f64)> =
                    coeffs.into_iter().map(|(v, c)| (v, -c)).collect();
                lp.add_row(flipped, RowSense::Le, 0.0);
            } else {
                lp.add_row(coeffs, RowSense::Eq, 0.0);
            }
        }

        // Fractional flow: the image edge carries at most fraction
        // times the inflow of the splitter's predecessor.
        for (i, edge) in agraph.edges.iter().enumerate() {
            if edge.from.kind != NodeKind::FractionalFlow {
                continue;
            }
            let ff = edge.from;
            let fraction = net.fractional_flows.fraction[ff.index];
            let pred = agraph.in_edges(ff).map(|(_, e)| e.from).next();
            let pred = match pred {
                Some(p) => p,
                None => continue,
            };
            let mut coeffs: Vec<(usize, f64)> = vec![(edge_var[i], 1.0)];
            for (j, _) in agraph.in_edges(pred) {
                coeffs.push((edge_var[j], -fraction));
            }
            lp.add_row(coeffs, RowSense::Le, 0.0);
        }

        // Storage exchange bounds, refreshed per solve.
        let mut basin_out_row = HashMap::new();
        for (node, &v) in &basin_out {
            let row = lp.add_row(vec![(v, 1.0)], RowSense::Le, 0.0);
            basin_out_row.insert(*node, row);
        }
        let mut buffer_out_row = HashMap::new();
        for (node, &v) in &buffer_out {
            let row = lp.add_row(vec![(v, 1.0)], RowSense::Le, 0.0);
            buffer_out_row.insert(*node, row);
        }

        // Outflow gate of flow-demanded nodes: closed at the demand's
        // own priority so the buffer fills first.
        let mut fd_gate_row = HashMap::new();
        for node in buffer_in.keys() {
            let coeffs: Vec<(usize, f64)> = agraph
                .out_edges(*node)
                .map(|(i, _)| (edge_var[i], 1.0))
                .collect();
            if !coeffs.is_empty() {
                let row = lp.add_row(coeffs, RowSense::Le, f64::INFINITY);
                fd_gate_row.insert(*node, row);
            }
        }

        // |F - d| rows for the linear objectives; vacuous (infinite
        // rhs) whenever the edge has no demand at the current priority.
        let mut abs_rows = HashMap::new();
        for (&e, &a) in &abs_var {
            let f = edge_var[e];
            let pos = lp.add_row(vec![(f, 1.0), (a, -1.0)], RowSense::Le, f64::INFINITY);
            let neg = lp.add_row(vec![(f, -1.0), (a, -1.0)], RowSense::Le, f64::INFINITY);
            abs_rows.insert(e, (pos, neg));
        }

        let mut subnetwork_demands = HashMap::new();
        let mut subnetwork_allocateds = HashMap::new();
        for &e in &link_edges {
            let edge = &agraph.edges[e];
            subnetwork_demands.insert((edge.from, edge.to), vec![0.0; n_priorities]);
            subnetwork_allocateds.insert((edge.from, edge.to), vec![0.0; n_priorities]);
        }

        Ok(Self {
            subnetwork_id,
            objective,
            dt,
            agraph,
            lp,
            edge_var,
            basin_in,
            basin_out,
            buffer_in,
            buffer_out,
            abs_var,
            capacity_row,
            source_row,
            user_return_row,
            basin_out_row,
            buffer_out_row,
            fd_gate_row,
            abs_rows,
            user_edges,
            link_edges,
            buffer,
            subnetwork_demands,
            subnetwork_allocateds,
            records: vec![],
            flow_records: vec![],
        })
    }

    /// The physical edge whose measured flow feeds a source edge's
    /// right-hand side.
    fn source_measurement_key(&self, edge_idx: usize) -> (NodeId, NodeId) {
        let edge = &self.agraph.edges[edge_idx];
        let first_hop = edge.node_path.first().copied().unwrap_or(edge.to);
        (edge.from, first_hop)
    }

    /// The physical edge whose mean flow is the realized abstraction of
    /// a user.
    fn user_measurement_key(&self, edge_idx: usize) -> (NodeId, NodeId) {
        let edge = &self.agraph.edges[edge_idx];
        let last_hop = edge.node_path.last().copied().unwrap_or(edge.from);
        (last_hop, edge.to)
    }

    /// Demand targeted by each demand-carrying variable at priority
    /// index pi: (variable, demand, node reported in records).
    fn demands_at_priority(
        &self,
        net: &Network,
        pi: usize,
        t: f64,
    ) -> Vec<(usize, f64, NodeId)> {
        let priority = net.priorities[pi];
        let mut out = vec![];
        for &(e, user) in &self.user_edges {
            let d = net.user_demands.demand_itp[user.index][pi].sample(t);
            out.push((self.edge_var[e], d, user));
        }
        if self.subnetwork_id == 1 {
            for &e in &self.link_edges {
                let edge = &self.agraph.edges[e];
                let d = self.subnetwork_demands[&(edge.from, edge.to)][pi];
                out.push((self.edge_var[e], d, edge.to));
            }
        }
        for ld in 0..net.level_demands.n() {
            if net.level_demands.priority[ld] != priority {
                continue;
            }
            for target in net
                .graph
                .outneighbors(net.level_demands.node_id[ld], crate::graph::EdgeKind::Control)
            {
                if let Some(&v) = self.basin_in.get(&target) {
                    let min_level = net.level_demands.min_level[ld].sample(t);
                    let storage_target =
                        net.basins.profile[target.index].storage_from_level(min_level);
                    let deficit =
                        (storage_target - net.basins.current_storage[target.index]).max(0.0);
                    out.push((v, deficit / self.dt, target));
                }
            }
        }
        for fd in 0..net.flow_demands.n() {
            if net.flow_demands.priority[fd] != priority {
                continue;
            }
            for target in net
                .graph
                .outneighbors(net.flow_demands.node_id[fd], crate::graph::EdgeKind::Control)
            {
                if let Some(&v) = self.buffer_in.get(&target) {
                    let d = net.flow_demands.demand_itp[fd].sample(t);
                    out.push((v, d, target));
                }
            }
        }
        out
    }

    /// Rebuild the objective for one priority. Quadratic variants
    /// penalize (F - d)^2 (optionally scaled by the demand), linear
    /// variants minimize the |F - d| linearization variables, with a
    /// small regularization on every flow so circulation is never free.
    fn set_objective(&mut self, net: &Network, pi: usize, t: f64) {
        let demands = self.demands_at_priority(net, pi, t);
        self.lp.clear_objective();
        match self.objective {
            ObjectiveType::QuadraticAbsolute => {
                for &(v, d, _) in &demands {
                    self.lp.add_quadratic(v, v, 1.0);
                    self.lp.add_linear(v, -2.0 * d);
                }
            }
            ObjectiveType::QuadraticRelative => {
                for &(v, d, _) in &demands {
                    if d > 1e-12 {
                        self.lp.add_quadratic(v, v, 1.0 / (d * d));
                        self.lp.add_linear(v, -2.0 / d);
                    }
                }
            }
            ObjectiveType::LinearAbsolute | ObjectiveType::LinearRelative => {
                let relative = self.objective == ObjectiveType::LinearRelative;
                // Deactivate every |.| row, then arm the ones with a
                // demand at this priority.
                for (&e, &(pos, neg)) in &self.abs_rows {
                    self.lp.set_rhs(pos, f64::INFINITY);
                    self.lp.set_rhs(neg, f64::INFINITY);
                    self.lp.add_linear(self.abs_var[&e], 1e-8);
                }
                let demand_by_var: HashMap<usize, f64> =
                    demands.iter().map(|&(v, d, _)| (v, d)).collect();
                for (&e, &(pos, neg)) in &self.abs_rows {
                    let f = self.edge_var[e];
                    if let Some(&d) = demand_by_var.get(&f) {
                        if relative {
                            // F/d - a <= 1 and -F/d - a <= -1, times d:
                            // the a coefficient carries the demand. The
                            // cost-per-flow term is disabled entirely
                            // for a zero demand.
                            if d > 0.0 {
                                let a = self.abs_var[&e];
                                self.lp.set_row_coeff(pos, a, -d);
                                self.lp.set_row_coeff(neg, a, -d);
                                self.lp.set_rhs(pos, d);
                                self.lp.set_rhs(neg, -d);
                                self.lp.add_linear(a, 1.0 - 1e-8);
                            }
                        } else {
                            self.lp.set_rhs(pos, d);
                            self.lp.set_rhs(neg, -d);
                            self.lp.add_linear(self.abs_var[&e], 1.0 - 1e-8);
                        }
                    }
                }
                // Demand variables without an |.| pair (basin/buffer
                // inflow) keep a simple linear pull towards the demand.
                for &(v, d, _) in &demands {
                    if !self.abs_rows.keys().any(|&e| self.edge_var[e] == v) {
                        let scale = if relative {
                            if d > 0.0 {
                                1.0 / d
                            } else {
                                0.0
                            }
                        } else {
                            1.0
                        };
                        self.lp.add_linear(v, -scale);
                    }
                }
                for v in self.edge_var.iter() {
                    self.lp.add_linear(*v, 1e-8);
                }
            }
        }
    }

    /// One full allocation pass over all priorities, ascending.
    pub fn optimize(
        &mut self,
        net: &mut Network,
        t: f64,
        mode: OptimizationType,
        mean_flows: &HashMap<(NodeId, NodeId), f64>,
    ) -> Result<(), AllocationError> {
        let priorities = net.priorities.clone();

        // Initial right-hand sides for this pass.
        for (&e, &row) in &self.source_row {
            let edge = &self.agraph.edges[e];
            let rhs = if edge.main_link {
                match mode {
                    OptimizationType::CollectDemands => f64::INFINITY,
                    // Set per priority from what the main network granted.
                    OptimizationType::Allocate => 0.0,
                }
            } else {
                let key = self.source_measurement_key(e);
                mean_flows.get(&key).copied().unwrap_or(0.0)
            };
            self.lp.set_rhs(row, rhs);
        }
        for (&e, &row) in &self.capacity_row {
            self.lp.set_rhs(row, self.agraph.edges[e].capacity);
        }
        for (_, &row) in &self.user_return_row {
            self.lp.set_rhs(row, 0.0);
        }
        for (node, &row) in &self.basin_out_row {
            let storage = net.basins.current_storage[node.index];
            self.lp.set_rhs(row, (storage / self.dt).max(0.0));
        }
        for (node, &row) in &self.buffer_out_row {
            self.lp.set_rhs(row, (self.buffer[node] / self.dt).max(0.0));
        }

        for (pi, &priority) in priorities.iter().enumerate() {
            // Main-network grants arriving over link sources apply per
            // priority rather than accumulating.
            if mode == OptimizationType::Allocate {
                for (&e, &row) in &self.source_row {
                    let edge = &self.agraph.edges[e];
                    if edge.main_link {
                        let granted = self.subnetwork_allocateds[&(edge.from, edge.to)][pi];
                        self.lp.set_rhs(row, granted);
                    }
                }
            }
            for (node, &row) in &self.fd_gate_row {
                let gate_closed = (0..net.flow_demands.n()).any(|fd| {
                    net.flow_demands.priority[fd] == priority
                        && net
                            .graph
                            .outneighbors(
                                net.flow_demands.node_id[fd],
                                crate::graph::EdgeKind::Control,
                            )
                            .any(|target| target == *node)
                });
                self.lp
                    .set_rhs(row, if gate_closed { 0.0 } else { f64::INFINITY });
            }

            // Each priority allocates only against its own demand:
            // every demand-carrying variable is capped at the demand it
            // serves right now, and released again afterwards.
            let demands = self.demands_at_priority(net, pi, t);
            for &(e, _) in &self.user_edges {
                self.lp.set_bounds(self.edge_var[e], 0.0, f64::INFINITY);
            }
            if self.subnetwork_id == 1 {
                for &e in &self.link_edges {
                    self.lp.set_bounds(self.edge_var[e], 0.0, f64::INFINITY);
                }
            }
            for &v in self.basin_in.values().chain(self.buffer_in.values()) {
                self.lp.set_bounds(v, 0.0, f64::INFINITY);
            }
            for &(v, d, _) in &demands {
                self.lp.set_bounds(v, 0.0, d.max(0.0));
            }

            self.set_objective(net, pi, t);
            let solution = self.lp.solve();
            if solution.status != LpStatus::Optimal {
                return Err(AllocationError::NotOptimal {
                    subnetwork_id: self.subnetwork_id,
                    priority,
                    status: solution.status,
                });
            }
            debug!(
                "subnetwork {} priority {} ({}): objective {:.6}",
                self.subnetwork_id,
                priority,
                mode.as_str(),
                solution.objective
            );

            // Write back user allocations and accumulate their return.
            for &(e, user) in &self.user_edges {
                let flow = solution.x[self.edge_var[e]].max(0.0);
                let demand = net.user_demands.demand_itp[user.index][pi].sample(t);
                if mode == OptimizationType::Allocate {
                    let slot = net.user_demands.slot(user.index, pi);
                    net.user_demands.allocated[slot] = flow;
                }
                let realized = mean_flows
                    .get(&self.user_measurement_key(e))
                    .copied()
                    .unwrap_or(net.user_demands.abstraction[user.index]);
                self.records.push(AllocationRecord {
                    time: t,
                    subnetwork_id: self.subnetwork_id,
                    node_id: user,
                    priority,
                    demand,
                    allocated: flow,
                    realized,
                });
                if let Some(&row) = self.user_return_row.get(&user) {
                    let rhs = self.lp.rhs(row);
                    self.lp.set_rhs(
                        row,
                        rhs + net.user_demands.return_factor[user.index] * flow,
                    );
                }
            }

            // Link edges: demands collected by subnetworks, grants made
            // by the main network.
            for &e in &self.link_edges {
                let edge_key = {
                    let edge = &self.agraph.edges[e];
                    (edge.from, edge.to)
                };
                let flow = solution.x[self.edge_var[e]].max(0.0);
                match (self.subnetwork_id, mode) {
                    (1, OptimizationType::Allocate) => {
                        self.subnetwork_allocateds.get_mut(&edge_key).unwrap()[pi] = flow;
                    }
                    (_, OptimizationType::CollectDemands) => {
                        self.subnetwork_demands.get_mut(&edge_key).unwrap()[pi] = flow;
                    }
                    _ => {}
                }
            }

            // Level and flow demand outcomes.
            for (node, &v) in &self.basin_in {
                let ld_priority = (0..net.level_demands.n()).find(|&ld| {
                    net.graph
                        .outneighbors(
                            net.level_demands.node_id[ld],
                            crate::graph::EdgeKind::Control,
                        )
                        .any(|target| target == *node)
                });
                if let Some(ld) = ld_priority {
                    if net.level_demands.priority[ld] == priority {
                        let min_level = net.level_demands.min_level[ld].sample(t);
                        let storage_target =
                            net.basins.profile[node.index].storage_from_level(min_level);
                        let deficit = (storage_target
                            - net.basins.current_storage[node.index])
                            .max(0.0)
                            / self.dt;
                        self.records.push(AllocationRecord {
                            time: t,
                            subnetwork_id: self.subnetwork_id,
                            node_id: *node,
                            priority,
                            demand: deficit,
                            allocated: solution.x[v].max(0.0),
                            realized: f64::NAN,
                        });
                    }
                }
            }
            for (node, &v) in &self.buffer_in {
                let v_in = solution.x[v].max(0.0);
                let v_out = self
                    .buffer_out
                    .get(node)
                    .map(|&w| solution.x[w].max(0.0))
                    .unwrap_or(0.0);
                let entry = self.buffer.get_mut(node).unwrap();
                *entry = (*entry + (v_in - v_out) * self.dt).max(0.0);
            }

            // Consume capacity and boundary-source budget for the next
            // priority.
            for (&e, &row) in &self.capacity_row {
                let used = solution.x[self.edge_var[e]].max(0.0);
                let rhs = self.lp.rhs(row);
                self.lp.set_rhs(row, (rhs - used).max(0.0));
            }
            for (&e, &row) in &self.source_row {
                if self.agraph.edges[e].main_link {
                    continue;
                }
                let used = solution.x[self.edge_var[e]].max(0.0);
                let rhs = self.lp.rhs(row);
                if rhs.is_finite() {
                    self.lp.set_rhs(row, (rhs - used).max(0.0));
                }
            }

            for (e, edge) in self.agraph.edges.iter().enumerate() {
                self.flow_records.push(FlowRecord {
                    time: t,
                    from: edge.from,
                    to: edge.to,
                    subnetwork_id: self.subnetwork_id,
                    priority,
                    flow_rate: solution.x[self.edge_var[e]],
                    optimization_type: mode,
                });
            }
        }
        Ok(())
    }
}
