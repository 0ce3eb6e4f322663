//! Resource-aware shortest-path search.
//!
//! [`PathFinder`] runs Dijkstra over an [`Adjacency`], but only expands a hop
//! when both of its endpoints still have a free slot of the kind the hop
//! would consume. Free means *currently* free in the real pools minus what
//! the candidate path being extended has already claimed on paper. A path
//! that visits a QPU on two hops needs two slots there, and the search
//! accounts for that before anything is committed.
//!
//! The search never touches real pool state. Only
//! [`materialize`](crate::reservation::materialize) allocates, and only for
//! the single path the search returns.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{NetError, NetResult};
use crate::pool::ResourceKind;
use crate::topology::{NodeId, Topology};
use crate::weights::Adjacency;

/// Cost reported for a request that has no feasible path.
pub const NO_PATH_COST: f64 = -1.0;

/// A feasible path and its accumulated weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Sum of the edge weights along the path.
    pub cost: f64,
    /// QPU names from source to destination, both included.
    pub path: Vec<String>,
}

impl Route {
    /// Number of hops (edges) on the path.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Flatten a search result into the `(cost, path)` pair, using
    /// `(-1, [])` when no path exists.
    pub fn into_parts(found: Option<Route>) -> (f64, Vec<String>) {
        match found {
            Some(route) => (route.cost, route.path),
            None => (NO_PATH_COST, Vec::new()),
        }
    }
}

/// Slots claimed by one candidate path, keyed by `(node, kind)`.
type Consumption = FxHashMap<(NodeId, ResourceKind), usize>;

/// Entry in the search frontier.
#[derive(Debug)]
struct Candidate {
    /// Accumulated cost.
    cost: f64,
    /// Discovery order (for FIFO ordering of equal costs).
    seq: u64,
    /// Node this candidate ends at.
    node: NodeId,
    /// Nodes visited so far, `node` last.
    path: Vec<NodeId>,
    /// Slots this candidate would consume.
    consumed: Consumption,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: lower cost first, then earlier discovery.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Constrained shortest-path search over a topology.
#[derive(Debug, Clone, Copy)]
pub struct PathFinder<'a> {
    topology: &'a Topology,
    adjacency: &'a Adjacency,
}

impl<'a> PathFinder<'a> {
    /// Create a path finder.
    ///
    /// The adjacency must have been built against `topology`.
    pub fn new(topology: &'a Topology, adjacency: &'a Adjacency) -> NetResult<Self> {
        if adjacency.num_nodes() != topology.num_qpus() {
            return Err(NetError::InvalidTopologyShape {
                expected: topology.num_qpus(),
                found: format!("adjacency over {} nodes", adjacency.num_nodes()),
            });
        }
        Ok(Self {
            topology,
            adjacency,
        })
    }

    /// Find the cheapest feasible path between two named QPUs.
    ///
    /// Returns `Ok(None)` when no feasible path exists. Unknown names and
    /// costs that overflow `f64` are errors.
    pub fn find(&self, from: &str, to: &str) -> NetResult<Option<Route>> {
        let source = self.topology.require_id(from)?;
        let target = self.topology.require_id(to)?;
        Ok(self.find_ids(source, target)?.map(|(cost, path)| Route {
            cost,
            path: path
                .into_iter()
                .map(|id| self.topology.node(id).name().to_string())
                .collect(),
        }))
    }

    /// Like [`find`](Self::find), but a missing path is an error.
    pub fn require(&self, from: &str, to: &str) -> NetResult<Route> {
        self.find(from, to)?.ok_or_else(|| NetError::NoPathFound {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Search by ordinal. Returns the cost and the visited ordinals.
    pub fn find_ids(
        &self,
        source: NodeId,
        target: NodeId,
    ) -> NetResult<Option<(f64, Vec<NodeId>)>> {
        if source == target {
            return Ok(Some((0.0, vec![source])));
        }

        let mut best = vec![f64::INFINITY; self.topology.num_qpus()];
        let mut frontier = BinaryHeap::new();
        let mut seq = 0u64;

        best[source.index()] = 0.0;
        frontier.push(Candidate {
            cost: 0.0,
            seq,
            node: source,
            path: vec![source],
            consumed: Consumption::default(),
        });

        while let Some(current) = frontier.pop() {
            if current.node == target {
                debug!(
                    "Path {} -> {}: cost {}, {} hops",
                    self.name(source),
                    self.name(target),
                    current.cost,
                    current.path.len() - 1
                );
                return Ok(Some((current.cost, current.path)));
            }

            // Stale entry, a cheaper route to this node was already expanded.
            if current.cost > best[current.node.index()] {
                continue;
            }

            for (neighbor, weight) in self.adjacency.neighbors(current.node) {
                if weight <= 0.0 {
                    continue;
                }

                let kind = ResourceKind::for_link(self.topology.link_kind(current.node, neighbor));
                if self.effective(current.node, kind, &current.consumed) < 1
                    || self.effective(neighbor, kind, &current.consumed) < 1
                {
                    trace!(
                        "Skipping {} -> {}: no {} slot left on this candidate",
                        self.name(current.node),
                        self.name(neighbor),
                        kind
                    );
                    continue;
                }

                let cost = current.cost + weight;
                if !cost.is_finite() {
                    return Err(NetError::CostOverflow {
                        from: self.name(source).to_string(),
                        to: self.name(target).to_string(),
                        at: self.name(neighbor).to_string(),
                    });
                }
                if cost >= best[neighbor.index()] {
                    continue;
                }
                best[neighbor.index()] = cost;

                let mut consumed = current.consumed.clone();
                *consumed.entry((current.node, kind)).or_insert(0) += 1;
                *consumed.entry((neighbor, kind)).or_insert(0) += 1;

                let mut path = current.path.clone();
                path.push(neighbor);

                seq += 1;
                frontier.push(Candidate {
                    cost,
                    seq,
                    node: neighbor,
                    path,
                    consumed,
                });
            }
        }

        debug!(
            "No feasible path {} -> {}",
            self.name(source),
            self.name(target)
        );
        Ok(None)
    }

    /// Free slots of `kind` on `node`, net of what the candidate already claimed.
    fn effective(&self, node: NodeId, kind: ResourceKind, consumed: &Consumption) -> usize {
        let available = self.topology.node(node).resources().available(kind);
        let claimed = consumed.get(&(node, kind)).copied().unwrap_or(0);
        available.saturating_sub(claimed)
    }

    fn name(&self, id: NodeId) -> &str {
        self.topology.node(id).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SlotCapacity;
    use crate::weights::WeightedEdge;

    fn both_ways(a: &str, w: f64, b: &str) -> [WeightedEdge; 2] {
        [WeightedEdge::new(a, w, b), WeightedEdge::new(b, w, a)]
    }

    /// Three QPUs, each alone in its own rack.
    fn triangle(b_cross: u32) -> (Topology, Adjacency) {
        let mut t = Topology::new();
        t.add_rack("RackA", [("A", SlotCapacity::new(4, 0, 0))]).unwrap();
        t.add_rack("RackB", [("B", SlotCapacity::new(b_cross, 0, 0))])
            .unwrap();
        t.add_rack("RackC", [("C", SlotCapacity::new(4, 0, 0))]).unwrap();
        let edges: Vec<_> = [
            both_ways("A", 1.0, "B"),
            both_ways("B", 1.0, "C"),
            both_ways("A", 5.0, "C"),
        ]
        .into_iter()
        .flatten()
        .collect();
        let adj = Adjacency::from_edges(&t, &edges).unwrap();
        (t, adj)
    }

    #[test]
    fn test_same_node() {
        let (t, adj) = triangle(2);
        let finder = PathFinder::new(&t, &adj).unwrap();
        let route = finder.find("B", "B").unwrap().unwrap();
        assert_eq!(route.cost, 0.0);
        assert_eq!(route.path, vec!["B"]);
        assert_eq!(route.hops(), 0);
    }

    #[test]
    fn test_prefers_cheap_multi_hop() {
        let (t, adj) = triangle(2);
        let finder = PathFinder::new(&t, &adj).unwrap();
        let route = finder.find("A", "C").unwrap().unwrap();
        assert_eq!(route.cost, 2.0);
        assert_eq!(route.path, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_intermediate_hop_needs_two_slots() {
        // B has a single cross-rack slot: A->B would take it, leaving
        // nothing for B->C. The candidate accounting must see that.
        let (t, adj) = triangle(1);
        let finder = PathFinder::new(&t, &adj).unwrap();
        let route = finder.find("A", "C").unwrap().unwrap();
        assert_eq!(route.cost, 5.0);
        assert_eq!(route.path, vec!["A", "C"]);
    }

    #[test]
    fn test_no_edge_is_sentinel() {
        let mut t = Topology::new();
        t.add_rack(
            "Rack1",
            [
                ("QPU1", SlotCapacity::uniform(1)),
                ("QPU2", SlotCapacity::uniform(1)),
            ],
        )
        .unwrap();
        let adj = Adjacency::from_dense(&t, &["QPU1", "QPU2"], &[vec![0.0; 2], vec![0.0; 2]])
            .unwrap();
        let finder = PathFinder::new(&t, &adj).unwrap();
        let found = finder.find("QPU1", "QPU2").unwrap();
        assert_eq!(Route::into_parts(found), (NO_PATH_COST, Vec::<String>::new()));
        assert!(matches!(
            finder.require("QPU1", "QPU2"),
            Err(NetError::NoPathFound { .. })
        ));
    }

    #[test]
    fn test_cost_overflow_is_an_error() {
        // A->B->C is feasible, but 1e308 + 1e308 is not a finite cost.
        let mut t = Topology::new();
        for name in ["A", "B", "C"] {
            t.add_rack(format!("Rack{name}"), [(name, SlotCapacity::uniform(4))])
                .unwrap();
        }
        let adj = Adjacency::from_edges(
            &t,
            &[
                WeightedEdge::new("A", 1e308, "B"),
                WeightedEdge::new("B", 1e308, "C"),
            ],
        )
        .unwrap();
        let finder = PathFinder::new(&t, &adj).unwrap();
        assert!(finder.find("A", "B").unwrap().is_some());
        assert!(matches!(
            finder.find("A", "C"),
            Err(NetError::CostOverflow { from, to, at })
                if from == "A" && to == "C" && at == "C"
        ));
    }

    #[test]
    fn test_zero_capacity_of_needed_kind() {
        // Same rack, so the hop needs in-rack slots, and there are none.
        let mut t = Topology::new();
        t.add_rack(
            "Rack1",
            [
                ("QPU1", SlotCapacity::new(5, 0, 5)),
                ("QPU2", SlotCapacity::new(5, 0, 5)),
            ],
        )
        .unwrap();
        let adj = Adjacency::from_edges(&t, &both_ways("QPU1", 1.0, "QPU2")).unwrap();
        let finder = PathFinder::new(&t, &adj).unwrap();
        assert_eq!(finder.find("QPU1", "QPU2").unwrap(), None);
    }

    #[test]
    fn test_respects_edge_direction() {
        let (t, _) = triangle(2);
        let adj = Adjacency::from_edges(&t, &[WeightedEdge::new("A", 1.0, "B")]).unwrap();
        let finder = PathFinder::new(&t, &adj).unwrap();
        assert!(finder.find("A", "B").unwrap().is_some());
        assert!(finder.find("B", "A").unwrap().is_none());
    }

    #[test]
    fn test_equal_cost_tie_breaks_on_discovery_order() {
        // A reaches D through B or C at equal cost; B is discovered first.
        let mut t = Topology::new();
        for name in ["A", "B", "C", "D"] {
            t.add_rack(format!("Rack{name}"), [(name, SlotCapacity::uniform(2))])
                .unwrap();
        }
        let adj = Adjacency::from_edges(
            &t,
            &[
                WeightedEdge::new("A", 1.0, "C"),
                WeightedEdge::new("A", 1.0, "B"),
                WeightedEdge::new("B", 1.0, "D"),
                WeightedEdge::new("C", 1.0, "D"),
            ],
        )
        .unwrap();
        let finder = PathFinder::new(&t, &adj).unwrap();
        let route = finder.find("A", "D").unwrap().unwrap();
        assert_eq!(route.path, vec!["A", "B", "D"]);
    }

    #[test]
    fn test_unknown_endpoint() {
        let (t, adj) = triangle(2);
        let finder = PathFinder::new(&t, &adj).unwrap();
        assert!(matches!(
            finder.find("A", "Z"),
            Err(NetError::UnknownNode(name)) if name == "Z"
        ));
    }

    #[test]
    fn test_search_leaves_pools_untouched() {
        let (t, adj) = triangle(2);
        let finder = PathFinder::new(&t, &adj).unwrap();
        finder.find("A", "C").unwrap();
        let b = t.qpu("B").unwrap();
        assert_eq!(b.resources().available(ResourceKind::CrossRack), 2);
    }

    #[test]
    fn test_rejects_foreign_adjacency() {
        let (t, _) = triangle(2);
        let mut small = Topology::new();
        small
            .add_rack("Rack1", [("A", SlotCapacity::uniform(1))])
            .unwrap();
        let adj = Adjacency::empty(&small);
        assert!(PathFinder::new(&t, &adj).is_err());
    }
}
