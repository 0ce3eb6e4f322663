//! Route command implementation.
//!
//! Load a scenario, run its batch once, and print the outcome.

use anyhow::{Context, Result};
use console::style;
use serde_json::json;
use tracing::info;

use qdc_net::{BatchOutcome, EprProgram, Scenario};

/// Execute the route command.
pub fn execute(path: &str, format: &str, show_program: bool) -> Result<()> {
    let mut scenario =
        Scenario::load(path).with_context(|| format!("Failed to load scenario: {path}"))?;
    info!(
        "Loaded scenario: {} qpus, {} edges, {} requests",
        scenario.topology.num_qpus(),
        scenario.adjacency.num_edges(),
        scenario.requests.len()
    );

    let mut program = EprProgram::new();
    let outcome = scenario.run(&mut program).context("Routing failed")?;
    let occupancy = scenario.topology.occupancy();

    match format {
        "json" => {
            let mut value = match &outcome {
                BatchOutcome::Completed(report) => json!({
                    "status": "completed",
                    "latency": outcome.latency_or_sentinel(),
                    "report": report,
                }),
                BatchOutcome::Infeasible {
                    index,
                    request,
                    committed,
                } => json!({
                    "status": "infeasible",
                    "latency": outcome.latency_or_sentinel(),
                    "index": index,
                    "request": request,
                    "committed": committed,
                }),
            };
            value["occupancy"] = serde_json::to_value(&occupancy)?;
            if show_program {
                value["program"] = serde_json::to_value(&program)?;
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            let marker = if outcome.is_completed() {
                style("✓").green().bold()
            } else {
                style("✗").red().bold()
            };
            println!(
                "{} {} requests from {}",
                marker,
                scenario.requests.len(),
                style(path).dim()
            );
            println!();
            println!("{outcome}");
            println!();
            println!("{}", style("Occupancy (used/capacity)").bold());
            print!("{occupancy}");
            if show_program && !program.is_empty() {
                println!();
                println!("{}", style("Channel preparation").bold());
                print!("{program}");
            }
        }
    }

    Ok(())
}
