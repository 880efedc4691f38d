//! Suite runner command.

use anyhow::Result;
use chrono::Local;
use console::style;
use gatecheck_core::scenario::ScenarioResult;
use gatecheck_core::Config;
use indicatif::{ProgressBar, ProgressStyle};

/// Run the configured suites (or only `only`) and print a report.
pub fn run(config: &Config, only: Option<&str>) -> Result<()> {
    let suites: Vec<_> = config
        .build_suites()?
        .into_iter()
        .filter(|s| only.map_or(true, |name| s.name() == name))
        .collect();

    if suites.is_empty() {
        match only {
            Some(name) => anyhow::bail!("No suite named '{}' in the configuration", name),
            None => anyhow::bail!("No suites configured. Add [[suites]] to gatecheck.toml."),
        }
    }

    let issuer = config.signing.issuer();
    let options = config.connection.connect_options();

    println!(
        "{} Run started {}",
        style("→").cyan(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let mut failed = 0;
    for suite in &suites {
        println!();
        println!(
            "{} {}",
            style(suite.name()).bold(),
            style(suite.endpoint()).dim()
        );

        let pb = ProgressBar::new(suite.scenarios().len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let report = suite.run_with(&issuer, &options, |result| {
            pb.set_message(result.name.clone());
            pb.inc(1);
        });
        pb.finish_and_clear();

        for result in &report.results {
            print_result(result);
        }
        println!(
            "  {} passed, {} failed",
            style(report.passed()).green(),
            if report.failed() > 0 {
                style(report.failed()).red()
            } else {
                style(report.failed()).dim()
            }
        );
        failed += report.failed();
    }

    println!();
    if failed > 0 {
        anyhow::bail!("{} scenario(s) failed", failed);
    }
    println!("{} All scenarios passed", style("✓").green());
    Ok(())
}

fn print_result(result: &ScenarioResult) {
    if result.success {
        println!("  {} {}", style("✓").green(), result.name);
        return;
    }

    println!(
        "  {} {} (step {})",
        style("×").red(),
        result.name,
        result.failure_step.unwrap_or(0)
    );
    if let Some(error) = &result.error {
        println!("      {}", style(error).red());
    }
}
