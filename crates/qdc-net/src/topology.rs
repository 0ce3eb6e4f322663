//! Racks, QPUs and link classification.
//!
//! A [`Topology`] is the set of racks of a data center. Every QPU belongs to
//! exactly one rack and owns a [`ResourcePool`]. QPUs get a dense [`NodeId`]
//! in declaration order (racks in order, QPUs in order inside each rack);
//! every deterministic ordering in the crate uses that ordinal.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{RackConfig, TopologyConfig};
use crate::error::{NetError, NetResult};
use crate::pool::{ResourceKind, ResourcePool, SlotCapacity};

/// Dense ordinal of a QPU within a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position in the topology's node list.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for NodeId {
    fn from(id: usize) -> Self {
        NodeId(u32::try_from(id).expect("NodeId overflow: exceeds u32::MAX"))
    }
}

/// Dense ordinal of a rack within a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RackId(pub u32);

/// Whether a link stays inside a rack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Both endpoints share a rack.
    Local,
    /// Endpoints are in different racks.
    Remote,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Local => f.write_str("local"),
            LinkKind::Remote => f.write_str("remote"),
        }
    }
}

/// A QPU: a named, resource-holding endpoint.
#[derive(Debug, Clone)]
pub struct Qpu {
    id: NodeId,
    name: String,
    rack: RackId,
    resources: ResourcePool,
}

impl Qpu {
    /// Ordinal of this QPU.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name of this QPU.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rack this QPU belongs to.
    pub fn rack(&self) -> RackId {
        self.rack
    }

    /// Slot pools of this QPU.
    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    /// Mutable slot pools of this QPU.
    pub fn resources_mut(&mut self) -> &mut ResourcePool {
        &mut self.resources
    }
}

/// A named group of QPUs.
#[derive(Debug, Clone)]
pub struct Rack {
    name: String,
    members: Vec<NodeId>,
}

impl Rack {
    /// Name of this rack.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// QPUs of this rack, in declaration order.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }
}

/// The racks and QPUs of a data center.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    racks: Vec<Rack>,
    qpus: Vec<Qpu>,
    by_name: FxHashMap<String, NodeId>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a topology from configuration.
    ///
    /// Fails on duplicate rack names or on a QPU name used twice anywhere.
    pub fn from_config(config: &TopologyConfig) -> NetResult<Self> {
        let mut topology = Self::new();
        for RackConfig { name, qpus } in &config.racks {
            for qpu in qpus {
                let unknown: Vec<&str> = qpu.unknown_keys().collect();
                if !unknown.is_empty() {
                    warn!(
                        "Ignoring unknown keys on {}: {} (capacities are cross_rack, in_rack, data)",
                        qpu.name,
                        unknown.join(", ")
                    );
                }
            }
            topology.add_rack(
                name.clone(),
                qpus.iter().map(|q| (q.name.clone(), q.capacity)),
            )?;
        }
        debug!(
            "Built topology: {} racks, {} qpus",
            topology.num_racks(),
            topology.num_qpus()
        );
        Ok(topology)
    }

    /// Add a rack and its QPUs.
    ///
    /// Validation happens before anything is inserted, so a rejected rack
    /// leaves the topology unchanged.
    pub fn add_rack<I, S>(&mut self, name: impl Into<String>, qpus: I) -> NetResult<RackId>
    where
        I: IntoIterator<Item = (S, SlotCapacity)>,
        S: Into<String>,
    {
        let name = name.into();
        if self.racks.iter().any(|r| r.name == name) {
            return Err(NetError::DuplicateRack(name));
        }

        let qpus: Vec<(String, SlotCapacity)> =
            qpus.into_iter().map(|(n, c)| (n.into(), c)).collect();
        for (i, (qpu_name, _)) in qpus.iter().enumerate() {
            if self.by_name.contains_key(qpu_name)
                || qpus[..i].iter().any(|(other, _)| other == qpu_name)
            {
                return Err(NetError::DuplicateNode(qpu_name.clone()));
            }
        }

        let rack_id = RackId(self.racks.len() as u32);
        let mut members = Vec::with_capacity(qpus.len());
        for (qpu_name, capacity) in qpus {
            let id = NodeId::from(self.qpus.len());
            self.by_name.insert(qpu_name.clone(), id);
            self.qpus.push(Qpu {
                id,
                resources: ResourcePool::new(qpu_name.clone(), capacity),
                name: qpu_name,
                rack: rack_id,
            });
            members.push(id);
        }
        self.racks.push(Rack { name, members });
        Ok(rack_id)
    }

    /// Number of racks.
    pub fn num_racks(&self) -> usize {
        self.racks.len()
    }

    /// Number of QPUs.
    pub fn num_qpus(&self) -> usize {
        self.qpus.len()
    }

    /// Racks in declaration order.
    pub fn racks(&self) -> &[Rack] {
        &self.racks
    }

    /// QPUs in ordinal order.
    pub fn qpus(&self) -> &[Qpu] {
        &self.qpus
    }

    /// QPU names in ordinal order.
    pub fn names(&self) -> Vec<&str> {
        self.qpus.iter().map(|q| q.name.as_str()).collect()
    }

    /// Look up a QPU ordinal by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Look up a QPU ordinal by name, failing with [`NetError::UnknownNode`].
    pub fn require_id(&self, name: &str) -> NetResult<NodeId> {
        self.node_id(name)
            .ok_or_else(|| NetError::UnknownNode(name.to_string()))
    }

    /// Look up a QPU by name.
    pub fn qpu(&self, name: &str) -> Option<&Qpu> {
        self.node_id(name).map(|id| &self.qpus[id.index()])
    }

    /// Look up a QPU by ordinal.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this topology.
    pub fn node(&self, id: NodeId) -> &Qpu {
        &self.qpus[id.index()]
    }

    /// Mutable QPU by ordinal.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this topology.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Qpu {
        &mut self.qpus[id.index()]
    }

    /// Rack a QPU belongs to.
    pub fn rack_of(&self, id: NodeId) -> &Rack {
        &self.racks[self.node(id).rack.0 as usize]
    }

    /// Classify the link between two QPUs.
    pub fn link_kind(&self, a: NodeId, b: NodeId) -> LinkKind {
        if self.node(a).rack == self.node(b).rack {
            LinkKind::Local
        } else {
            LinkKind::Remote
        }
    }

    /// Classify the link between two QPUs given by name.
    pub fn link_kind_by_name(&self, a: &str, b: &str) -> NetResult<LinkKind> {
        Ok(self.link_kind(self.require_id(a)?, self.require_id(b)?))
    }

    /// Consume one data slot on a QPU, first-fit.
    ///
    /// Data slots hold payload qubits for operations layered above routing;
    /// path discovery never touches them.
    pub fn claim_data_slot(&mut self, name: &str) -> NetResult<usize> {
        let id = self.require_id(name)?;
        self.node_mut(id).resources.allocate(ResourceKind::Data)
    }
}
