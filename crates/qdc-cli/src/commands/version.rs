//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - resource-constrained EPR routing",
        style("QDC").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qdc-net  Topology, slot pools, constrained search, reservations");
    println!("  qdc-cli  Command-line interface");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
