//! Run a scripted scenario and report the final state of every peer.

use std::path::PathBuf;

use ability_runtime::{PeerSnapshot, Scenario, ScenarioReport, logging};
use anyhow::{Context, Result};
use clap::Parser;
use console::style;

/// Run a RON scenario
#[derive(Parser)]
pub struct Simulate {
    /// Scenario file (RON)
    #[arg(value_name = "SCENARIO")]
    scenario: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,

    /// Override the fault injection seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the reorder window of the loopback network
    #[arg(long)]
    reorder: Option<usize>,

    /// Override the drop probability of the loopback network
    #[arg(long)]
    drop: Option<f64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// Step outcomes and per-peer state
    Summary,
    /// Full JSON report
    Json,
}

impl Simulate {
    pub fn execute(self) -> Result<()> {
        logging::init(&self.log).context("Failed to initialize logging")?;

        let mut scenario = Scenario::load_from_file(&self.scenario)
            .with_context(|| format!("Failed to load scenario: {}", self.scenario.display()))?;

        let faults = &mut scenario.simulation.faults;
        if let Some(seed) = self.seed {
            faults.seed = seed;
        }
        if let Some(reorder) = self.reorder {
            faults.reorder_window = reorder;
        }
        if let Some(drop) = self.drop {
            faults.drop_probability = drop;
        }

        let report = scenario
            .run()
            .with_context(|| format!("Scenario failed: {}", self.scenario.display()))?;

        match self.format {
            OutputFormat::Summary => print_summary(&self.scenario, &report),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        if !report.diverged.is_empty() {
            anyhow::bail!("{} peer(s) diverged from the authority", report.diverged.len());
        }
        Ok(())
    }
}

fn print_summary(path: &std::path::Path, report: &ScenarioReport) {
    println!("{} {}", style("Scenario:").bold().cyan(), path.display());
    println!(
        "{} {} ticks, {} ms",
        style("Elapsed:").bold().cyan(),
        report.ticks,
        report.elapsed_ms
    );
    println!(
        "{} sent {}, delivered {}, dropped {}, reordered {} ({} bytes)",
        style("Network:").bold().cyan(),
        report.network.sent,
        report.network.delivered,
        report.network.dropped,
        report.network.reordered,
        report.network.bytes
    );
    println!();

    println!("{}", style("=== Steps ===").bold().green());
    for record in &report.steps {
        let outcome = if record.accepted {
            style("ok").green()
        } else {
            style("refused").yellow()
        };
        println!(
            "  {:>3}. {:<20} {:<8} {} message(s)",
            record.index, record.step, outcome, record.delivered
        );
    }
    println!();

    println!("{}", style("=== Peers ===").bold().green());
    for peer in &report.peers {
        print_peer(peer, report.diverged.contains(&peer.peer));
    }
}

fn print_peer(peer: &PeerSnapshot, diverged: bool) {
    let role = if peer.authority { "authority" } else { "client" };
    let header = format!("{} ({role})", peer.peer);
    if diverged {
        println!("{} {}", style(header).bold().yellow(), style("diverged").red());
    } else {
        println!("{}", style(header).bold().yellow());
    }

    for ability in &peer.abilities {
        let cooldown = if ability.cooling_down { " cooling down" } else { "" };
        println!(
            "  {:<16} {:<14} #{}{}",
            ability.ability.as_str(),
            ability.state.to_string(),
            ability.state_id,
            cooldown
        );
    }
    for buff in &peer.buffs {
        println!("  {} x{}", style(&buff.id).magenta(), buff.count);
    }
    if !peer.tags.is_empty() {
        let tags: Vec<&str> = peer.tags.iter().map(|tag| tag.as_str()).collect();
        println!("  tags: {}", style(tags.join(", ")).dim());
    }
}
