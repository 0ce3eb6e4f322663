//! Turning a discovered path into committed slot reservations.
//!
//! Every hop of a path becomes one [`Reservation`]: a slot of the hop's
//! resource kind taken first-fit at both endpoints. The commit for one path
//! is all-or-nothing. If any allocation fails, the slots already taken for
//! that path are released again and the failure surfaces as
//! [`NetError::ReservationFailed`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{NetError, NetResult};
use crate::pathfinder::Route;
use crate::pool::ResourceKind;
use crate::topology::{LinkKind, NodeId, Topology};

/// One slot on one QPU.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// Owning QPU.
    pub node: String,
    /// Pool the slot belongs to.
    pub kind: ResourceKind,
    /// Index within the pool.
    pub index: usize,
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.node, self.kind.slot_tag(), self.index)
    }
}

/// A committed channel between two QPUs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation name.
    pub name: String,
    /// Slot taken on the source QPU.
    pub source: SlotRef,
    /// Slot taken on the destination QPU.
    pub destination: SlotRef,
    /// Whether the channel stays inside a rack.
    pub link: LinkKind,
}

impl Reservation {
    /// Resource kind consumed at both ends.
    pub fn kind(&self) -> ResourceKind {
        self.source.kind
    }
}

/// Default reservation name for a hop: `"{from}<->{to}"`.
pub fn default_name(from: &str, to: &str) -> String {
    format!("{from}<->{to}")
}

/// Commit a route using [`default_name`] for every hop.
pub fn materialize(topology: &mut Topology, route: &Route) -> NetResult<Vec<Reservation>> {
    materialize_with(topology, route, default_name)
}

/// Commit a route, naming each hop's reservation with `name`.
///
/// Paths with fewer than two nodes commit nothing. Unknown names are
/// rejected before any slot is taken.
pub fn materialize_with<F>(
    topology: &mut Topology,
    route: &Route,
    mut name: F,
) -> NetResult<Vec<Reservation>>
where
    F: FnMut(&str, &str) -> String,
{
    let ids = route
        .path
        .iter()
        .map(|n| topology.require_id(n))
        .collect::<NetResult<Vec<_>>>()?;

    let mut taken: Vec<(NodeId, ResourceKind, usize)> = Vec::new();
    let mut reservations = Vec::with_capacity(ids.len().saturating_sub(1));

    for hop in ids.windows(2) {
        let (a, b) = (hop[0], hop[1]);
        let link = topology.link_kind(a, b);
        let kind = ResourceKind::for_link(link);

        let mut slots = [0usize; 2];
        for (slot, node) in slots.iter_mut().zip([a, b]) {
            match topology.node_mut(node).resources_mut().allocate(kind) {
                Ok(index) => {
                    taken.push((node, kind, index));
                    *slot = index;
                }
                Err(e) => {
                    let from = topology.node(a).name().to_string();
                    let to = topology.node(b).name().to_string();
                    error!(
                        "Reservation {} <-> {} failed after search reported it feasible: {}",
                        from, to, e
                    );
                    rollback(topology, &taken);
                    return Err(NetError::ReservationFailed {
                        from,
                        to,
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let from = topology.node(a).name();
        let to = topology.node(b).name();
        let reservation = Reservation {
            name: name(from, to),
            source: SlotRef {
                node: from.to_string(),
                kind,
                index: slots[0],
            },
            destination: SlotRef {
                node: to.to_string(),
                kind,
                index: slots[1],
            },
            link,
        };
        debug!("Reserved {}", reservation);
        reservations.push(reservation);
    }

    Ok(reservations)
}

/// Release slots in reverse order of acquisition.
fn rollback(topology: &mut Topology, taken: &[(NodeId, ResourceKind, usize)]) {
    for &(node, kind, index) in taken.iter().rev() {
        let qpu = topology.node_mut(node);
        if let Err(e) = qpu.resources_mut().release(kind, index) {
            let slot = SlotRef {
                node: qpu.name().to_string(),
                kind,
                index,
            };
            error!("Rollback could not release {}: {}", slot, e);
        }
    }
}
