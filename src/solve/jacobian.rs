use std::collections::BTreeSet;

use crate::graph::{EdgeKind, NodeId, NodeKind};
use crate::network::Network;

/// Sparsity prototype of the water-balance Jacobian, derived once from
/// the graph topology and reused for every factorization. An entry
/// (i, j) means du[i] may depend on u[j].
#[derive(Debug, Clone, Default)]
pub struct JacobianPrototype {
    pub n: usize,
    entries: BTreeSet<(usize, usize)>,
}

impl JacobianPrototype {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.entries.contains(&(row, col))
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().copied()
    }

    fn mark(&mut self, row: usize, col: usize) {
        self.entries.insert((row, col));
    }

    fn mark_pair(&mut self, a: usize, b: usize) {
        self.mark(a, b);
        self.mark(b, a);
    }

    /// Compressed sparse column arrays (colptr, rowval) for handing to
    /// a sparse factorization.
    pub fn to_csc(&self) -> (Vec<usize>, Vec<usize>) {
        let mut colptr = vec![0usize; self.n + 1];
        for &(_, col) in &self.entries {
            colptr[col + 1] += 1;
        }
        for c in 0..self.n {
            colptr[c + 1] += colptr[c];
        }
        let mut rowval = vec![0usize; self.entries.len()];
        let mut next = colptr.clone();
        // BTreeSet iterates sorted by (row, col); fill per column.
        for &(row, col) in &self.entries {
            rowval[next[col]] = row;
            next[col] += 1;
        }
        (colptr, rowval)
    }

    /// Build the prototype from the network topology: diagonal entries,
    /// basin pairs within two flow hops of each other (a FractionalFlow
    /// may extend the hop), and the PID integral couplings.
    pub fn from_network(net: &Network) -> Self {
        let layout = net.layout;
        let mut proto = Self {
            n: layout.len(),
            entries: BTreeSet::new(),
        };
        for slot in 0..layout.len() {
            proto.mark(slot, slot);
        }
        let graph = &net.graph;
        for i in 0..net.basins.n() {
            let basin = net.basins.node_id[i];
            for connector in graph.outneighbors(basin, EdgeKind::Flow) {
                for target in graph.outneighbors(connector, EdgeKind::Flow) {
                    match target.kind {
                        NodeKind::Basin => {
                            proto.mark_pair(layout.storage(i), layout.storage(target.index));
                        }
                        NodeKind::FractionalFlow => {
                            for downstream in graph.outneighbors(target, EdgeKind::Flow) {
                                if downstream.kind == NodeKind::Basin {
                                    proto.mark_pair(
                                        layout.storage(i),
                                        layout.storage(downstream.index),
                                    );
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        for p in 0..net.pid_controls.n() {
            let row = layout.integral(p);
            let listen = net.pid_controls.listen_node[p];
            let controlled = net.pid_controls.controlled_node[p];
            let mut coupled: Vec<NodeId> = vec![listen];
            coupled.extend(
                graph
                    .inneighbors(controlled, EdgeKind::Flow)
                    .chain(graph.outneighbors(controlled, EdgeKind::Flow))
                    .filter(|id| id.kind == NodeKind::Basin),
            );
            for id in &coupled {
                proto.mark_pair(row, layout.storage(id.index));
                // The controlled flow couples every adjacent basin to
                // the listened storage as well.
                proto.mark_pair(layout.storage(id.index), layout.storage(listen.index));
            }
        }
        proto
    }
}
