//! Provision command implementation.
//!
//! Size a pairwise-rack topology for a batch and print it as a runnable
//! scenario.

use anyhow::{Context, Result};
use console::style;

use qdc_net::{Request, ScenarioConfig, provision_pairwise, qpu_name, uniform_weights};

/// Execute the provision command.
pub fn execute(
    qpus: usize,
    requests: Vec<Request>,
    headroom: u32,
    weight: f64,
    output: Option<&str>,
) -> Result<()> {
    if !weight.is_finite() || weight <= 0.0 {
        anyhow::bail!("Weight must be a positive number, got {weight}");
    }

    let topology =
        provision_pairwise(&requests, qpus, headroom).context("Failed to provision topology")?;
    let names: Vec<String> = (1..=qpus).map(qpu_name).collect();
    let config = ScenarioConfig {
        topology,
        weights: uniform_weights(&names, weight),
        requests,
    };
    config.validate().context("Provisioned scenario is invalid")?;

    let yaml = config.to_yaml_string()?;
    match output {
        Some(path) => {
            std::fs::write(path, &yaml)
                .with_context(|| format!("Failed to write scenario: {path}"))?;
            println!(
                "{} Wrote scenario with {} QPUs in {} racks to {}",
                style("✓").green().bold(),
                qpus,
                config.topology.racks.len(),
                style(path).dim()
            );
        }
        None => print!("{yaml}"),
    }

    Ok(())
}
