//! Sizing a topology for a request batch.
//!
//! The provisioned layout numbers QPUs `QPU1..=QPUn` and pairs them into
//! racks (`Rack1 = {QPU1, QPU2}`, `Rack2 = {QPU3, QPU4}`, ...). An odd last
//! QPU gets a rack of its own. Every QPU is given, for every slot kind, one
//! slot per request endpoint it appears in plus a fixed headroom.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::batch::Request;
use crate::config::{QpuConfig, RackConfig, TopologyConfig};
use crate::error::{NetError, NetResult};
use crate::pool::SlotCapacity;
use crate::weights::WeightSpec;

/// Canonical name of the `n`-th QPU (1-based).
pub fn qpu_name(n: usize) -> String {
    format!("QPU{n}")
}

/// Build a pairwise-rack topology of `qpu_count` QPUs sized for `requests`.
///
/// Requests must only name provisioned QPUs. A slot count that does not fit
/// in `u32` is a [`NetError::CapacityOverflow`].
pub fn provision_pairwise(
    requests: &[Request],
    qpu_count: usize,
    headroom: u32,
) -> NetResult<TopologyConfig> {
    let mut endpoints: FxHashMap<String, u32> = (1..=qpu_count).map(|n| (qpu_name(n), 0)).collect();
    for request in requests {
        for name in [&request.from, &request.to] {
            let count = endpoints
                .get_mut(name)
                .ok_or_else(|| NetError::UnknownNode(name.clone()))?;
            *count = count
                .checked_add(1)
                .ok_or_else(|| NetError::CapacityOverflow { node: name.clone() })?;
        }
    }

    let names: Vec<String> = (1..=qpu_count).map(qpu_name).collect();
    let racks = names
        .chunks(2)
        .enumerate()
        .map(|(i, members)| {
            let qpus = members
                .iter()
                .map(|name| {
                    let slots = endpoints
                        .get(name)
                        .copied()
                        .unwrap_or(0)
                        .checked_add(headroom)
                        .ok_or_else(|| NetError::CapacityOverflow { node: name.clone() })?;
                    Ok(QpuConfig::new(name.clone(), SlotCapacity::uniform(slots)))
                })
                .collect::<NetResult<Vec<_>>>()?;
            Ok(RackConfig {
                name: format!("Rack{}", i + 1),
                qpus,
            })
        })
        .collect::<NetResult<Vec<_>>>()?;

    debug!(
        "Provisioned {} qpus in {} racks for {} requests",
        qpu_count,
        racks.len(),
        requests.len()
    );
    Ok(TopologyConfig { racks })
}

/// Dense weights with `weight` between every pair of distinct QPUs.
pub fn uniform_weights<S: AsRef<str>>(names: &[S], weight: f64) -> WeightSpec {
    let n = names.len();
    let matrix = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 0.0 } else { weight }).collect())
        .collect();
    WeightSpec::Dense {
        nodes: names.iter().map(|s| s.as_ref().to_string()).collect(),
        matrix,
    }
}
