//! Per-QPU slot pools.
//!
//! Every QPU owns three independent pools, one per [`ResourceKind`]. A pool
//! is a fixed-capacity set of interchangeable slots tracked in a bitset.
//! Allocation is first-fit: the lowest free index always wins, so repeated
//! allocation from a fresh pool yields `0, 1, 2, ...` and runs replay
//! identically.

use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};
use crate::topology::LinkKind;

/// Kind of qubit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Communication qubits for links between racks.
    CrossRack,
    /// Communication qubits for links inside a rack.
    InRack,
    /// Payload qubits. Never picked by path discovery.
    Data,
}

impl ResourceKind {
    /// Slot kind consumed by a link of the given kind.
    pub fn for_link(link: LinkKind) -> Self {
        match link {
            LinkKind::Local => ResourceKind::InRack,
            LinkKind::Remote => ResourceKind::CrossRack,
        }
    }

    /// Short tag used in slot names (`QPU1_cross_0`).
    pub fn slot_tag(self) -> &'static str {
        match self {
            ResourceKind::CrossRack => "cross",
            ResourceKind::InRack => "in",
            ResourceKind::Data => "data",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::CrossRack => "cross-rack",
            ResourceKind::InRack => "in-rack",
            ResourceKind::Data => "data",
        };
        f.write_str(s)
    }
}

/// Slot capacities of a single QPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotCapacity {
    /// Cross-rack communication slots.
    pub cross_rack: u32,
    /// In-rack communication slots.
    pub in_rack: u32,
    /// Data slots.
    pub data: u32,
}

impl SlotCapacity {
    /// Create a capacity triple.
    pub fn new(cross_rack: u32, in_rack: u32, data: u32) -> Self {
        Self {
            cross_rack,
            in_rack,
            data,
        }
    }

    /// Same capacity for every kind.
    pub fn uniform(slots: u32) -> Self {
        Self::new(slots, slots, slots)
    }

    /// Capacity for one kind.
    pub fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::CrossRack => self.cross_rack,
            ResourceKind::InRack => self.in_rack,
            ResourceKind::Data => self.data,
        }
    }
}

/// Fixed-capacity pool of interchangeable slots of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPool {
    occupied: BitVec,
}

impl SlotPool {
    /// Create a pool with every slot free.
    pub fn new(capacity: usize) -> Self {
        Self {
            occupied: bitvec![0; capacity],
        }
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.occupied.len()
    }

    /// Number of occupied slots.
    #[inline]
    pub fn used(&self) -> usize {
        self.occupied.count_ones()
    }

    /// Number of free slots.
    #[inline]
    pub fn available(&self) -> usize {
        self.occupied.count_zeros()
    }

    /// Whether the slot at `index` is occupied. Out-of-range is `None`.
    pub fn is_occupied(&self, index: usize) -> Option<bool> {
        self.occupied.get(index).map(|bit| *bit)
    }

    /// Occupy the lowest free slot and return its index.
    pub fn allocate(&mut self) -> Option<usize> {
        let index = self.occupied.first_zero()?;
        self.occupied.set(index, true);
        Some(index)
    }

    /// Occupy a specific slot. Returns `false` if out of range or taken.
    pub fn mark_used(&mut self, index: usize) -> bool {
        match self.is_occupied(index) {
            Some(false) => {
                self.occupied.set(index, true);
                true
            }
            _ => false,
        }
    }

    /// Free a specific slot. Returns `false` if out of range or already free.
    pub fn release(&mut self, index: usize) -> bool {
        match self.is_occupied(index) {
            Some(true) => {
                self.occupied.set(index, false);
                true
            }
            _ => false,
        }
    }
}

/// The three slot pools owned by one QPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePool {
    owner: String,
    cross_rack: SlotPool,
    in_rack: SlotPool,
    data: SlotPool,
}

impl ResourcePool {
    /// Create the pools for `owner` with the given capacities.
    pub fn new(owner: impl Into<String>, capacity: SlotCapacity) -> Self {
        Self {
            owner: owner.into(),
            cross_rack: SlotPool::new(capacity.cross_rack as usize),
            in_rack: SlotPool::new(capacity.in_rack as usize),
            data: SlotPool::new(capacity.data as usize),
        }
    }

    /// Name of the owning QPU.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Pool for one kind.
    pub fn pool(&self, kind: ResourceKind) -> &SlotPool {
        match kind {
            ResourceKind::CrossRack => &self.cross_rack,
            ResourceKind::InRack => &self.in_rack,
            ResourceKind::Data => &self.data,
        }
    }

    fn pool_mut(&mut self, kind: ResourceKind) -> &mut SlotPool {
        match kind {
            ResourceKind::CrossRack => &mut self.cross_rack,
            ResourceKind::InRack => &mut self.in_rack,
            ResourceKind::Data => &mut self.data,
        }
    }

    /// Free slots of `kind`.
    pub fn available(&self, kind: ResourceKind) -> usize {
        self.pool(kind).available()
    }

    /// Occupied slots of `kind`.
    pub fn used(&self, kind: ResourceKind) -> usize {
        self.pool(kind).used()
    }

    /// Capacity of `kind`.
    pub fn capacity(&self, kind: ResourceKind) -> usize {
        self.pool(kind).capacity()
    }

    /// Allocate the lowest free slot of `kind`.
    ///
    /// Never falls back to a different kind.
    pub fn allocate(&mut self, kind: ResourceKind) -> NetResult<usize> {
        self.pool_mut(kind)
            .allocate()
            .ok_or_else(|| NetError::ResourceExhausted {
                node: self.owner.clone(),
                kind,
            })
    }

    /// Occupy a caller-chosen slot of `kind`.
    pub fn mark_used(&mut self, kind: ResourceKind, index: usize) -> NetResult<()> {
        if self.pool_mut(kind).mark_used(index) {
            Ok(())
        } else {
            Err(self.invalid_index(kind, index))
        }
    }

    /// Free a previously occupied slot of `kind`.
    pub fn release(&mut self, kind: ResourceKind, index: usize) -> NetResult<()> {
        if self.pool_mut(kind).release(index) {
            Ok(())
        } else {
            Err(self.invalid_index(kind, index))
        }
    }

    fn invalid_index(&self, kind: ResourceKind, index: usize) -> NetError {
        NetError::InvalidIndex {
            node: self.owner.clone(),
            kind,
            index,
            capacity: self.capacity(kind),
        }
    }
}
