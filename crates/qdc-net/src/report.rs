//! Occupancy snapshots and human-readable summaries.

use std::fmt;

use serde::Serialize;

use crate::batch::{BatchOutcome, BatchReport};
use crate::pool::ResourceKind;
use crate::reservation::Reservation;
use crate::topology::Topology;

/// Used and total slots of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotUsage {
    /// Occupied slots.
    pub used: usize,
    /// Pool capacity.
    pub capacity: usize,
}

impl fmt::Display for SlotUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.used, self.capacity)
    }
}

/// Slot usage of one QPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QpuOccupancy {
    /// QPU name.
    pub name: String,
    /// Cross-rack slots.
    pub cross_rack: SlotUsage,
    /// In-rack slots.
    pub in_rack: SlotUsage,
    /// Data slots.
    pub data: SlotUsage,
}

impl QpuOccupancy {
    /// Usage for one kind.
    pub fn get(&self, kind: ResourceKind) -> SlotUsage {
        match kind {
            ResourceKind::CrossRack => self.cross_rack,
            ResourceKind::InRack => self.in_rack,
            ResourceKind::Data => self.data,
        }
    }
}

/// Slot usage of one rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackOccupancy {
    /// Rack name.
    pub name: String,
    /// Member QPUs in declaration order.
    pub qpus: Vec<QpuOccupancy>,
}

/// Slot usage of a whole topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    /// Racks in declaration order.
    pub racks: Vec<RackOccupancy>,
}

impl Occupancy {
    /// Look up a QPU.
    pub fn qpu(&self, name: &str) -> Option<&QpuOccupancy> {
        self.racks
            .iter()
            .flat_map(|r| r.qpus.iter())
            .find(|q| q.name == name)
    }
}

impl Topology {
    /// Snapshot current slot usage.
    pub fn occupancy(&self) -> Occupancy {
        let racks = self
            .racks()
            .iter()
            .map(|rack| RackOccupancy {
                name: rack.name().to_string(),
                qpus: rack
                    .members()
                    .iter()
                    .map(|&id| {
                        let qpu = self.node(id);
                        let usage = |kind| SlotUsage {
                            used: qpu.resources().used(kind),
                            capacity: qpu.resources().capacity(kind),
                        };
                        QpuOccupancy {
                            name: qpu.name().to_string(),
                            cross_rack: usage(ResourceKind::CrossRack),
                            in_rack: usage(ResourceKind::InRack),
                            data: usage(ResourceKind::Data),
                        }
                    })
                    .collect(),
            })
            .collect();
        Occupancy { racks }
    }
}

impl fmt::Display for Occupancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rack in &self.racks {
            writeln!(f, "{}", rack.name)?;
            for qpu in &rack.qpus {
                writeln!(
                    f,
                    "  {:<10} cross {:>7}  in {:>7}  data {:>7}",
                    qpu.name,
                    qpu.cross_rack.to_string(),
                    qpu.in_rack.to_string(),
                    qpu.data.to_string()
                )?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} -- {}",
            self.name, self.link, self.source, self.destination
        )
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Routes:")?;
        for route in &self.routes {
            writeln!(f, "  {:>8.3}  {}", route.cost, route.path.join(" -> "))?;
        }
        writeln!(f, "Reservations: {}", self.reservations.len())?;
        for reservation in &self.reservations {
            writeln!(f, "  {reservation}")?;
        }
        writeln!(f, "Acquisition: {} ns", self.acquisition_ns)?;
        write!(f, "Latency: {} ns", self.latency_ns)
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOutcome::Completed(report) => write!(f, "{report}"),
            BatchOutcome::Infeasible {
                index,
                request,
                committed,
            } => write!(
                f,
                "Request {index} ({request}) has no feasible path after {} reservations\nLatency: {}",
                committed.len(),
                self.latency_or_sentinel()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinder::Route;
    use crate::pool::SlotCapacity;
    use crate::reservation::materialize;

    fn committed() -> (Topology, Vec<Reservation>) {
        let mut t = Topology::new();
        t.add_rack(
            "Rack1",
            [
                ("QPU1", SlotCapacity::new(0, 1, 0)),
                ("QPU2", SlotCapacity::new(1, 1, 0)),
            ],
        )
        .unwrap();
        t.add_rack("Rack2", [("QPU3", SlotCapacity::new(1, 0, 3))])
            .unwrap();
        let route = Route {
            cost: 2.0,
            path: vec!["QPU1".into(), "QPU2".into(), "QPU3".into()],
        };
        let reservations = materialize(&mut t, &route).unwrap();
        (t, reservations)
    }

    #[test]
    fn test_occupancy_snapshot() {
        let (t, _) = committed();
        let occupancy = t.occupancy();
        assert_eq!(occupancy.racks.len(), 2);

        let qpu2 = occupancy.qpu("QPU2").unwrap();
        assert_eq!(qpu2.get(ResourceKind::InRack), SlotUsage { used: 1, capacity: 1 });
        assert_eq!(qpu2.get(ResourceKind::CrossRack), SlotUsage { used: 1, capacity: 1 });

        let text = occupancy.to_string();
        assert!(text.starts_with("Rack1\n"));
        assert!(text.contains("QPU3"));
        assert!(text.contains("0/3"));
    }

    #[test]
    fn test_occupancy_json() {
        let (t, _) = committed();
        let json = serde_json::to_value(t.occupancy()).unwrap();
        assert_eq!(json["racks"][1]["qpus"][0]["cross_rack"]["used"], 1);
    }

    #[test]
    fn test_reservation_display() {
        let (_, reservations) = committed();
        assert_eq!(
            reservations[1].to_string(),
            "QPU2<->QPU3 [remote] QPU2_cross_0 -- QPU3_cross_0"
        );
    }

    #[test]
    fn test_report_display() {
        let (_, reservations) = committed();
        let report = BatchReport {
            routes: vec![Route {
                cost: 2.0,
                path: vec!["QPU1".into(), "QPU2".into(), "QPU3".into()],
            }],
            reservations,
            latency_ns: 1200,
            acquisition_ns: 5000,
        };
        let text = report.to_string();
        assert!(text.contains("QPU1 -> QPU2 -> QPU3"));
        assert!(text.contains("Reservations: 2"));
        assert!(text.ends_with("Latency: 1200 ns"));
    }
}
