//! Edge-weight specifications and the normalized adjacency.
//!
//! Weights arrive either as a dense square matrix indexed by a caller-supplied
//! list of QPU names, or as a sparse list of `(from, weight, to)` triples.
//! Both forms normalize into the same [`Adjacency`]: a directed graph whose
//! node indices are the topology's [`NodeId`] ordinals. A weight of `0` (or
//! an absent entry) means "no connection".

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};
use crate::topology::{NodeId, Topology};

/// A single directed, weighted edge between two named QPUs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    /// Source QPU name.
    pub from: String,
    /// Traversal cost, strictly positive.
    pub weight: f64,
    /// Destination QPU name.
    pub to: String,
}

impl WeightedEdge {
    /// Create an edge.
    pub fn new(from: impl Into<String>, weight: f64, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            weight,
            to: to.into(),
        }
    }
}

/// Weight specification as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum WeightSpec {
    /// Square matrix; `matrix[i][j]` is the weight from `nodes[i]` to `nodes[j]`.
    Dense {
        /// Row/column order of the matrix.
        nodes: Vec<String>,
        /// Non-negative weights, `0` for no edge.
        matrix: Vec<Vec<f64>>,
    },
    /// Explicit edge list.
    Sparse {
        /// Edges with strictly positive weights.
        edges: Vec<WeightedEdge>,
    },
}

/// Directed weighted adjacency over the QPUs of a topology.
#[derive(Debug, Clone)]
pub struct Adjacency {
    graph: DiGraph<NodeId, f64>,
}

impl Adjacency {
    /// An adjacency with every QPU of `topology` and no edges.
    pub fn empty(topology: &Topology) -> Self {
        let mut graph = DiGraph::with_capacity(topology.num_qpus(), 0);
        for qpu in topology.qpus() {
            graph.add_node(qpu.id());
        }
        Self { graph }
    }

    /// Normalize either specification form.
    pub fn from_spec(topology: &Topology, spec: &WeightSpec) -> NetResult<Self> {
        match spec {
            WeightSpec::Dense { nodes, matrix } => Self::from_dense(topology, nodes, matrix),
            WeightSpec::Sparse { edges } => Self::from_edges(topology, edges),
        }
    }

    /// Build from a dense matrix indexed by `nodes`.
    ///
    /// The matrix must be `nodes.len()` square. QPUs of the topology that do
    /// not appear in `nodes` get no edges.
    pub fn from_dense<S: AsRef<str>>(
        topology: &Topology,
        nodes: &[S],
        matrix: &[Vec<f64>],
    ) -> NetResult<Self> {
        let n = nodes.len();
        if matrix.len() != n {
            return Err(NetError::InvalidTopologyShape {
                expected: n,
                found: format!("{} rows", matrix.len()),
            });
        }
        if let Some((i, row)) = matrix.iter().enumerate().find(|(_, row)| row.len() != n) {
            return Err(NetError::InvalidTopologyShape {
                expected: n,
                found: format!("{} columns in row {i}", row.len()),
            });
        }

        let mut ids = Vec::with_capacity(n);
        for (i, name) in nodes.iter().enumerate() {
            let name = name.as_ref();
            if nodes[..i].iter().any(|other| other.as_ref() == name) {
                return Err(NetError::DuplicateNode(name.to_string()));
            }
            ids.push(topology.require_id(name)?);
        }

        let mut adjacency = Self::empty(topology);
        for (i, row) in matrix.iter().enumerate() {
            for (j, &weight) in row.iter().enumerate() {
                if !weight.is_finite() || weight < 0.0 {
                    return Err(NetError::InvalidWeight {
                        from: nodes[i].as_ref().to_string(),
                        to: nodes[j].as_ref().to_string(),
                        weight,
                    });
                }
                if weight > 0.0 {
                    adjacency.set(ids[i], ids[j], weight);
                }
            }
        }
        Ok(adjacency)
    }

    /// Build from a sparse edge list. A repeated edge keeps the last weight.
    pub fn from_edges(topology: &Topology, edges: &[WeightedEdge]) -> NetResult<Self> {
        let mut adjacency = Self::empty(topology);
        for edge in edges {
            if !edge.weight.is_finite() || edge.weight <= 0.0 {
                return Err(NetError::InvalidWeight {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    weight: edge.weight,
                });
            }
            let from = topology.require_id(&edge.from)?;
            let to = topology.require_id(&edge.to)?;
            adjacency.set(from, to, edge.weight);
        }
        Ok(adjacency)
    }

    /// Set (or replace) the weight of a directed edge.
    pub fn set(&mut self, from: NodeId, to: NodeId, weight: f64) {
        self.graph
            .update_edge(NodeIndex::new(from.index()), NodeIndex::new(to.index()), weight);
    }

    /// Number of QPUs covered.
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of directed edges.
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Weight of the edge `from -> to`, if any.
    pub fn weight(&self, from: NodeId, to: NodeId) -> Option<f64> {
        self.graph
            .find_edge(NodeIndex::new(from.index()), NodeIndex::new(to.index()))
            .and_then(|e| self.graph.edge_weight(e).copied())
    }

    /// Outgoing edges of `node`, in ascending neighbor ordinal.
    ///
    /// The order is independent of how the adjacency was built, which keeps
    /// tie-breaking identical between the dense and sparse forms.
    pub fn neighbors(&self, node: NodeId) -> Vec<(NodeId, f64)> {
        let mut out: Vec<(NodeId, f64)> = self
            .graph
            .edges(NodeIndex::new(node.index()))
            .map(|e| (self.graph[e.target()], *e.weight()))
            .collect();
        out.sort_by_key(|&(id, _)| id);
        out
    }

    /// All edges as `(from, weight, to)`, ordered by source then target.
    pub fn edges(&self) -> Vec<(NodeId, f64, NodeId)> {
        let mut out: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()], *e.weight(), self.graph[e.target()]))
            .collect();
        out.sort_by_key(|&(from, _, to)| (from, to));
        out
    }

    /// Express this adjacency as a sparse specification.
    pub fn to_sparse(&self, topology: &Topology) -> WeightSpec {
        let edges = self
            .edges()
            .into_iter()
            .map(|(from, weight, to)| {
                WeightedEdge::new(topology.node(from).name(), weight, topology.node(to).name())
            })
            .collect();
        WeightSpec::Sparse { edges }
    }
}
