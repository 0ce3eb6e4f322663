//! Scenario files.
//!
//! A scenario bundles everything one batch needs: the rack layout with
//! per-QPU slot capacities, the edge weights, and the ordered requests.
//! Files are YAML unless the extension is `.json`.
//!
//! ```yaml
//! topology:
//!   racks:
//!     - name: Rack1
//!       qpus:
//!         - { name: QPU1, in_rack: 1 }
//!         - { name: QPU2, in_rack: 1, cross_rack: 1 }
//!     - name: Rack2
//!       qpus:
//!         - { name: QPU3, cross_rack: 1 }
//! weights:
//!   format: sparse
//!   edges:
//!     - { from: QPU1, weight: 1.0, to: QPU2 }
//!     - { from: QPU2, weight: 1.0, to: QPU3 }
//! requests:
//!   - { from: QPU1, to: QPU3 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::{BatchOutcome, BatchRunner, Request};
use crate::channel::ChannelSink;
use crate::error::NetResult;
use crate::latency::Clock;
use crate::pool::SlotCapacity;
use crate::topology::Topology;
use crate::weights::{Adjacency, WeightSpec};

/// Rack layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Racks in declaration order.
    #[serde(default)]
    pub racks: Vec<RackConfig>,
}

/// One rack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackConfig {
    /// Rack name, unique within the topology.
    pub name: String,
    /// QPUs in declaration order.
    #[serde(default)]
    pub qpus: Vec<QpuConfig>,
}

/// One QPU and its slot capacities. Missing capacities are zero.
///
/// Keys other than `name`, `cross_rack`, `in_rack` and `data` are kept
/// aside and logged when the topology is built, so a misspelled capacity
/// (`cross-rack:`) shows up as a warning instead of a silent zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QpuConfig {
    /// QPU name, unique across all racks.
    pub name: String,
    /// Slot capacities.
    #[serde(flatten)]
    pub capacity: SlotCapacity,
    #[serde(flatten)]
    unknown: BTreeMap<String, serde_json::Value>,
}

impl QpuConfig {
    /// Create a QPU entry.
    pub fn new(name: impl Into<String>, capacity: SlotCapacity) -> Self {
        Self {
            name: name.into(),
            capacity,
            unknown: BTreeMap::new(),
        }
    }

    /// Keys that did not match any capacity field, in sorted order.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }
}

/// A complete, runnable scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Rack layout.
    pub topology: TopologyConfig,
    /// Edge weights.
    pub weights: WeightSpec,
    /// Requests, processed in order.
    #[serde(default)]
    pub requests: Vec<Request>,
}

impl ScenarioConfig {
    /// Load and validate a scenario file.
    ///
    /// Use [`Scenario::load`] to go straight to a runnable scenario without
    /// building it twice.
    pub fn from_file<P: AsRef<Path>>(path: P) -> NetResult<Self> {
        let config = Self::parse_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML.
    pub fn from_yaml_str(s: &str) -> NetResult<Self> {
        let config: Self = serde_yaml_ng::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON.
    pub fn from_json_str(s: &str) -> NetResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and deserialize a file, without validation.
    fn parse_file(path: &Path) -> NetResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        debug!("Loading scenario from {}", path.display());
        if is_json {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(serde_yaml_ng::from_str(&contents)?)
        }
    }

    /// Render as YAML.
    pub fn to_yaml_string(&self) -> NetResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Render as pretty JSON.
    pub fn to_json_string(&self) -> NetResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the scenario builds and that every request names known QPUs.
    pub fn validate(&self) -> NetResult<()> {
        self.build().map(|_| ())
    }

    /// Build the live topology and adjacency.
    pub fn build(&self) -> NetResult<Scenario> {
        let topology = Topology::from_config(&self.topology)?;
        let adjacency = Adjacency::from_spec(&topology, &self.weights)?;
        for request in &self.requests {
            topology.require_id(&request.from)?;
            topology.require_id(&request.to)?;
        }
        Ok(Scenario {
            topology,
            adjacency,
            requests: self.requests.clone(),
        })
    }
}

/// A scenario ready to run.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Live topology; commits mutate its pools.
    pub topology: Topology,
    /// Normalized weights.
    pub adjacency: Adjacency,
    /// Requests, processed in order.
    pub requests: Vec<Request>,
}

impl Scenario {
    /// Load a scenario file and build it once.
    pub fn load<P: AsRef<Path>>(path: P) -> NetResult<Self> {
        ScenarioConfig::parse_file(path.as_ref())?.build()
    }

    /// Run the requests on the system clock.
    pub fn run<S: ChannelSink + ?Sized>(&mut self, sink: &mut S) -> NetResult<BatchOutcome> {
        self.run_with(&BatchRunner::new(), sink)
    }

    /// Run the requests with a caller-provided runner.
    pub fn run_with<C, S>(&mut self, runner: &BatchRunner<C>, sink: &mut S) -> NetResult<BatchOutcome>
    where
        C: Clock + Clone,
        S: ChannelSink + ?Sized,
    {
        runner.run(&mut self.topology, &self.adjacency, &self.requests, sink)
    }
}
