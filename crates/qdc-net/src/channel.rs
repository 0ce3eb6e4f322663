//! Hand-off of committed reservations to whatever realizes the channels.
//!
//! Routing only decides *which* slots form a channel. How the channel is
//! physically prepared belongs to an external collaborator, reached through
//! the [`ChannelSink`] trait. [`EprProgram`] is a recording sink that emits the
//! standard Bell-pair preparation (`H` on the source slot, then `CNOT` from
//! source to destination) for every reservation.

use std::fmt;

use serde::Serialize;

use crate::error::NetResult;
use crate::reservation::{Reservation, SlotRef};

/// Receives the reservations of a batch once acquisition is complete.
pub trait ChannelSink {
    /// Realize the channels for `reservations`, in order.
    fn establish(&mut self, reservations: &[Reservation]) -> NetResult<()>;
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl ChannelSink for Discard {
    fn establish(&mut self, _reservations: &[Reservation]) -> NetResult<()> {
        Ok(())
    }
}

/// One channel-preparation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChannelOp {
    /// Hadamard on a slot.
    H {
        /// Target slot.
        target: SlotRef,
    },
    /// Controlled-NOT between two slots.
    Cnot {
        /// Control slot.
        control: SlotRef,
        /// Target slot.
        target: SlotRef,
    },
}

impl fmt::Display for ChannelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelOp::H { target } => write!(f, "h {target}"),
            ChannelOp::Cnot { control, target } => write!(f, "cx {control}, {target}"),
        }
    }
}

/// Recorded preparation operations, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EprProgram {
    ops: Vec<ChannelOp>,
    pairs: usize,
}

impl EprProgram {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded operations.
    pub fn ops(&self) -> &[ChannelOp] {
        &self.ops
    }

    /// Number of pairs prepared.
    pub fn num_pairs(&self) -> usize {
        self.pairs
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Append the preparation of one pair.
    pub fn push_pair(&mut self, reservation: &Reservation) {
        self.ops.push(ChannelOp::H {
            target: reservation.source.clone(),
        });
        self.ops.push(ChannelOp::Cnot {
            control: reservation.source.clone(),
            target: reservation.destination.clone(),
        });
        self.pairs += 1;
    }
}

impl ChannelSink for EprProgram {
    fn establish(&mut self, reservations: &[Reservation]) -> NetResult<()> {
        for reservation in reservations {
            self.push_pair(reservation);
        }
        Ok(())
    }
}

impl fmt::Display for EprProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            writeln!(f, "{op};")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ResourceKind;
    use crate::topology::LinkKind;

    fn reservation() -> Reservation {
        Reservation {
            name: "QPU2<->QPU3".into(),
            source: SlotRef {
                node: "QPU2".into(),
                kind: ResourceKind::CrossRack,
                index: 0,
            },
            destination: SlotRef {
                node: "QPU3".into(),
                kind: ResourceKind::CrossRack,
                index: 1,
            },
            link: LinkKind::Remote,
        }
    }

    #[test]
    fn test_epr_program_records_h_then_cnot() {
        let mut program = EprProgram::new();
        program.establish(&[reservation()]).unwrap();

        assert_eq!(program.num_pairs(), 1);
        assert_eq!(program.ops().len(), 2);
        assert_eq!(
            program.to_string(),
            "h QPU2_cross_0;\ncx QPU2_cross_0, QPU3_cross_1;\n"
        );
    }

    #[test]
    fn test_empty_establish() {
        let mut program = EprProgram::new();
        program.establish(&[]).unwrap();
        assert!(program.is_empty());
        assert_eq!(program.to_string(), "");
        Discard.establish(&[reservation()]).unwrap();
    }
}
