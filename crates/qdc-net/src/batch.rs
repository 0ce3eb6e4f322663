//! Running a batch of communication requests.
//!
//! Requests are processed strictly in order. For each one the path finder
//! searches the topology as it stands after every earlier commit, and the
//! returned path is materialized immediately, so later requests see the
//! slots earlier ones consumed. The first request without a feasible path
//! ends the batch with [`BatchOutcome::Infeasible`]; earlier commits stay in
//! place.
//!
//! Once every request is committed, the runner brackets the hand-off to the
//! [`ChannelSink`] with a [`LatencyAccount`] and reports the measured gap.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::channel::ChannelSink;
use crate::error::{NetError, NetResult};
use crate::latency::{Clock, LatencyAccount, MonotonicClock};
use crate::pathfinder::{PathFinder, Route};
use crate::provision::qpu_name;
use crate::reservation::{Reservation, materialize};
use crate::topology::Topology;
use crate::weights::Adjacency;

/// Latency reported for a batch that could not be routed.
pub const NO_LATENCY: i64 = -1;

/// A request for a channel between two QPUs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Source QPU name.
    pub from: String,
    /// Destination QPU name.
    pub to: String,
}

impl Request {
    /// Create a request.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Parses `"A:B"`. A side that is a bare number `n` names `QPU{n}`.
impl FromStr for Request {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once(':')
            .ok_or_else(|| NetError::ConfigParse(format!("expected FROM:TO, got '{s}'")))?;

        let side = |raw: &str| -> NetResult<String> {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(NetError::ConfigParse(format!(
                    "empty endpoint in request '{s}'"
                )));
            }
            Ok(match raw.parse::<usize>() {
                Ok(n) => qpu_name(n),
                Err(_) => raw.to_string(),
            })
        };

        Ok(Self::new(side(from)?, side(to)?))
    }
}

/// Everything a completed batch produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One route per request, in request order.
    pub routes: Vec<Route>,
    /// Every reservation committed, in commit order.
    pub reservations: Vec<Reservation>,
    /// Gap between the end of acquisition and the start of usage.
    pub latency_ns: u64,
    /// Time spent searching and committing.
    pub acquisition_ns: u64,
}

/// Result of running a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Every request was routed and committed.
    Completed(BatchReport),
    /// A request had no feasible path.
    Infeasible {
        /// Position of the request in the batch.
        index: usize,
        /// The request itself.
        request: Request,
        /// Reservations committed for earlier requests.
        committed: Vec<Reservation>,
    },
}

impl BatchOutcome {
    /// Whether every request was routed.
    pub fn is_completed(&self) -> bool {
        matches!(self, BatchOutcome::Completed(_))
    }

    /// Report of a completed batch.
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchOutcome::Completed(report) => Some(report),
            BatchOutcome::Infeasible { .. } => None,
        }
    }

    /// Latency in nanoseconds, or [`NO_LATENCY`] for an infeasible batch.
    pub fn latency_or_sentinel(&self) -> i64 {
        match self {
            BatchOutcome::Completed(report) => {
                i64::try_from(report.latency_ns).unwrap_or(i64::MAX)
            }
            BatchOutcome::Infeasible { .. } => NO_LATENCY,
        }
    }

    /// Reservations committed by this run, feasible or not.
    pub fn reservations(&self) -> &[Reservation] {
        match self {
            BatchOutcome::Completed(report) => &report.reservations,
            BatchOutcome::Infeasible { committed, .. } => committed,
        }
    }
}

/// Drives requests through search, commit and channel hand-off.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner<C: Clock + Clone = MonotonicClock> {
    clock: C,
}

impl BatchRunner<MonotonicClock> {
    /// Create a runner on the system clock.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock + Clone> BatchRunner<C> {
    /// Create a runner reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Run `requests` against `topology`, handing the committed reservations
    /// to `sink`.
    ///
    /// Infeasibility is reported in the outcome. Errors are reserved for
    /// caller mistakes (unknown names, a mismatched adjacency), path costs
    /// that overflow, invariant violations during commit, and sink failures.
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub fn run<S: ChannelSink + ?Sized>(
        &self,
        topology: &mut Topology,
        adjacency: &Adjacency,
        requests: &[Request],
        sink: &mut S,
    ) -> NetResult<BatchOutcome> {
        let mut account = LatencyAccount::with_clock(self.clock.clone());
        let mut routes = Vec::with_capacity(requests.len());
        let mut reservations = Vec::new();

        for (index, request) in requests.iter().enumerate() {
            let found = PathFinder::new(topology, adjacency)?.find(&request.from, &request.to)?;
            let Some(route) = found else {
                warn!(
                    "Request {} ({}) has no feasible path; stopping after {} reservations",
                    index,
                    request,
                    reservations.len()
                );
                return Ok(BatchOutcome::Infeasible {
                    index,
                    request: request.clone(),
                    committed: reservations,
                });
            };

            let committed = materialize(topology, &route)?;
            debug!(
                "Request {} ({}): cost {}, {} reservations",
                index,
                request,
                route.cost,
                committed.len()
            );
            reservations.extend(committed);
            routes.push(route);
        }

        account.finalize_acquisition()?;
        sink.establish(&reservations)?;
        let latency = account.begin_usage()?;

        let report = BatchReport {
            routes,
            reservations,
            latency_ns: u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX),
            acquisition_ns: account
                .acquisition_time()
                .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
        };
        info!(
            "Batch completed: {} reservations, latency {} ns",
            report.reservations.len(),
            report.latency_ns
        );
        Ok(BatchOutcome::Completed(report))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::{ChannelSink, Discard, EprProgram};
    use crate::latency::ManualClock;
    use crate::pool::{ResourceKind, SlotCapacity};
    use crate::weights::WeightedEdge;

    fn line() -> (Topology, Adjacency) {
        let mut t = Topology::new();
        t.add_rack(
            "Rack1",
            [
                ("QPU1", SlotCapacity::new(0, 1, 0)),
                ("QPU2", SlotCapacity::new(1, 1, 0)),
            ],
        )
        .unwrap();
        t.add_rack("Rack2", [("QPU3", SlotCapacity::new(1, 0, 0))])
            .unwrap();
        let adj = Adjacency::from_edges(
            &t,
            &[
                WeightedEdge::new("QPU1", 1.0, "QPU2"),
                WeightedEdge::new("QPU2", 1.0, "QPU3"),
            ],
        )
        .unwrap();
        (t, adj)
    }

    /// A sink that advances the clock while "establishing".
    struct SlowSink(ManualClock);

    impl ChannelSink for SlowSink {
        fn establish(&mut self, _reservations: &[Reservation]) -> NetResult<()> {
            self.0.advance(Duration::from_micros(40));
            Ok(())
        }
    }

    struct FailingSink;

    impl ChannelSink for FailingSink {
        fn establish(&mut self, _reservations: &[Reservation]) -> NetResult<()> {
            Err(NetError::Channel("backend offline".into()))
        }
    }

    #[test]
    fn test_request_parse() {
        assert_eq!(
            "1:3".parse::<Request>().unwrap(),
            Request::new("QPU1", "QPU3")
        );
        assert_eq!(
            "QPU1:edge".parse::<Request>().unwrap(),
            Request::new("QPU1", "edge")
        );
        assert!("QPU1".parse::<Request>().is_err());
        assert!(":QPU1".parse::<Request>().is_err());
    }

    #[test]
    fn test_latency_brackets_the_sink() {
        let (mut t, adj) = line();
        let clock = ManualClock::new();
        let runner = BatchRunner::with_clock(clock.clone());
        let outcome = runner
            .run(
                &mut t,
                &adj,
                &[Request::new("QPU1", "QPU3")],
                &mut SlowSink(clock),
            )
            .unwrap();

        let report = outcome.report().unwrap();
        assert_eq!(report.latency_ns, 40_000);
        assert_eq!(report.acquisition_ns, 0);
        assert_eq!(outcome.latency_or_sentinel(), 40_000);
        assert_eq!(report.routes[0].path, vec!["QPU1", "QPU2", "QPU3"]);
        assert_eq!(report.reservations.len(), 2);
    }

    #[test]
    fn test_infeasible_keeps_earlier_commits() {
        let (mut t, adj) = line();
        let outcome = BatchRunner::new()
            .run(
                &mut t,
                &adj,
                &[Request::new("QPU2", "QPU3"), Request::new("QPU2", "QPU3")],
                &mut Discard,
            )
            .unwrap();

        match &outcome {
            BatchOutcome::Infeasible {
                index,
                request,
                committed,
            } => {
                assert_eq!(*index, 1);
                assert_eq!(request, &Request::new("QPU2", "QPU3"));
                assert_eq!(committed.len(), 1);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
        assert_eq!(outcome.latency_or_sentinel(), NO_LATENCY);
        assert_eq!(
            t.qpu("QPU3").unwrap().resources().used(ResourceKind::CrossRack),
            1
        );
    }

    #[test]
    fn test_empty_batch_completes() {
        let (mut t, adj) = line();
        let outcome = BatchRunner::with_clock(ManualClock::new())
            .run(&mut t, &adj, &[], &mut Discard)
            .unwrap();
        let report = outcome.report().unwrap();
        assert!(report.routes.is_empty());
        assert!(report.reservations.is_empty());
        assert_eq!(outcome.latency_or_sentinel(), 0);
    }

    #[test]
    fn test_self_request_commits_nothing() {
        let (mut t, adj) = line();
        let mut program = EprProgram::new();
        let outcome = BatchRunner::new()
            .run(&mut t, &adj, &[Request::new("QPU1", "QPU1")], &mut program)
            .unwrap();
        assert!(outcome.is_completed());
        assert!(outcome.reservations().is_empty());
        assert!(program.is_empty());
    }

    #[test]
    fn test_sink_error_propagates() {
        let (mut t, adj) = line();
        let err = BatchRunner::new()
            .run(
                &mut t,
                &adj,
                &[Request::new("QPU1", "QPU2")],
                &mut FailingSink,
            )
            .unwrap_err();
        assert!(matches!(err, NetError::Channel(_)));
    }

    #[test]
    fn test_unknown_request_endpoint_is_error() {
        let (mut t, adj) = line();
        let err = BatchRunner::new()
            .run(&mut t, &adj, &[Request::new("QPU1", "QPU9")], &mut Discard)
            .unwrap_err();
        assert!(matches!(err, NetError::UnknownNode(_)));
    }

    #[test]
    fn test_dyn_sink() {
        let (mut t, adj) = line();
        let mut program = EprProgram::new();
        let sink: &mut dyn ChannelSink = &mut program;
        BatchRunner::new()
            .run(&mut t, &adj, &[Request::new("QPU1", "QPU2")], sink)
            .unwrap();
        assert_eq!(program.num_pairs(), 1);
    }
}
