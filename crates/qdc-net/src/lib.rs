//! QDC Resource-Constrained EPR Routing
//!
//! This crate routes entanglement (EPR pairs) between QPUs of a quantum data
//! center and commits the communication-qubit slots each route consumes.
//!
//! # Overview
//!
//! QPUs are grouped into racks. Every QPU owns three slot pools: cross-rack
//! and in-rack communication qubits, plus data qubits. A hop between two QPUs
//! of the same rack consumes one in-rack slot at each end; a hop across racks
//! consumes one cross-rack slot at each end.
//!
//! The [`PathFinder`] searches for the cheapest path whose every hop can still
//! be realized, counting the slots the candidate path itself would use. The
//! [`materialize`] step then commits that path. A [`BatchRunner`] processes
//! requests in order and measures the latency of handing the committed
//! channels to a [`ChannelSink`].
//!
//! # Core Components
//!
//! - **Pools**: [`ResourcePool`], [`SlotPool`], [`ResourceKind`]
//! - **Topology**: [`Topology`], [`Qpu`], [`Rack`], [`LinkKind`]
//! - **Weights**: [`WeightSpec`] (dense or sparse) normalized to [`Adjacency`]
//! - **Search**: [`PathFinder`] returning a [`Route`]
//! - **Commit**: [`materialize`] producing [`Reservation`]s
//! - **Timing**: [`LatencyAccount`] over an injectable [`Clock`]
//! - **Batches**: [`BatchRunner`], [`Request`], [`BatchOutcome`]
//!
//! # Example: Two Racks
//!
//! ```rust
//! use qdc_net::{
//!     Adjacency, BatchRunner, EprProgram, Request, SlotCapacity, Topology, WeightedEdge,
//! };
//!
//! let mut topology = Topology::new();
//! topology
//!     .add_rack(
//!         "Rack1",
//!         [
//!             ("QPU1", SlotCapacity::new(0, 1, 0)),
//!             ("QPU2", SlotCapacity::new(1, 1, 0)),
//!         ],
//!     )
//!     .unwrap();
//! topology
//!     .add_rack("Rack2", [("QPU3", SlotCapacity::new(1, 0, 0))])
//!     .unwrap();
//!
//! let adjacency = Adjacency::from_edges(
//!     &topology,
//!     &[
//!         WeightedEdge::new("QPU1", 1.0, "QPU2"),
//!         WeightedEdge::new("QPU2", 1.0, "QPU3"),
//!     ],
//! )
//! .unwrap();
//!
//! let mut program = EprProgram::new();
//! let outcome = BatchRunner::new()
//!     .run(
//!         &mut topology,
//!         &adjacency,
//!         &[Request::new("QPU1", "QPU3")],
//!         &mut program,
//!     )
//!     .unwrap();
//!
//! assert!(outcome.is_completed());
//! assert_eq!(outcome.reservations().len(), 2);
//! assert_eq!(program.num_pairs(), 2);
//! assert!(outcome.latency_or_sentinel() >= 0);
//! ```

pub mod batch;
pub mod channel;
pub mod config;
pub mod error;
pub mod latency;
pub mod pathfinder;
pub mod pool;
pub mod provision;
pub mod report;
pub mod reservation;
pub mod topology;
pub mod weights;

pub use batch::{BatchOutcome, BatchReport, BatchRunner, NO_LATENCY, Request};
pub use channel::{ChannelOp, ChannelSink, Discard, EprProgram};
pub use config::{QpuConfig, RackConfig, Scenario, ScenarioConfig, TopologyConfig};
pub use error::{NetError, NetResult};
pub use latency::{Clock, LatencyAccount, ManualClock, MonotonicClock, Phase};
pub use pathfinder::{NO_PATH_COST, PathFinder, Route};
pub use pool::{ResourceKind, ResourcePool, SlotCapacity, SlotPool};
pub use provision::{provision_pairwise, qpu_name, uniform_weights};
pub use report::{Occupancy, QpuOccupancy, RackOccupancy, SlotUsage};
pub use reservation::{Reservation, SlotRef, default_name, materialize, materialize_with};
pub use topology::{LinkKind, NodeId, Qpu, Rack, RackId, Topology};
pub use weights::{Adjacency, WeightSpec, WeightedEdge};
