//! routegraph CLI - replay and audit routing event scripts from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use routegraph::{
    audit, Audit, EngineOptions, EventScript, PolicyConfig, ReplayReport, RouteState, RulesEngine,
    Session,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing::Level;

#[derive(Parser)]
#[command(name = "routegraph")]
#[command(about = "Connectivity graph engine for schematic and PCB wire routing", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an event script and print the resulting graph
    Replay {
        /// Path to a JSON event script
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Override the script policy with a Manhattan grid of this step
        #[arg(long, value_name = "STEP")]
        grid: Option<f64>,

        /// Log every transaction and rollback
        #[arg(short, long)]
        verbose: bool,
    },

    /// Replay a script, then verify integrity and that the graph is stable
    Check {
        /// Path to a JSON event script
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Override the script policy with a Manhattan grid of this step
        #[arg(long, value_name = "STEP")]
        grid: Option<f64>,

        /// Log every transaction and rollback
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the normalisation rules in pipeline order
    Rules {
        /// Show rule descriptions
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for tooling
    Json,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Replay {
            script,
            format,
            grid,
            verbose,
        } => {
            init_logging(verbose);
            report_errors(handle_replay(&script, format, grid))
        }
        Commands::Check {
            script,
            format,
            grid,
            verbose,
        } => {
            init_logging(verbose);
            report_errors(handle_check(&script, format, grid))
        }
        Commands::Rules { verbose } => {
            handle_rules(verbose);
            0
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn report_errors(result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn load_script(path: &Path, grid: Option<f64>) -> Result<EventScript> {
    let mut script = EventScript::from_path(path)
        .with_context(|| format!("failed to load script {}", path.display()))?;
    if let Some(step) = grid {
        script.policy = PolicyConfig::manhattan(step);
    }
    Ok(script)
}

fn handle_replay(path: &Path, format: OutputFormat, grid: Option<f64>) -> Result<i32> {
    let script = load_script(path, grid)?;
    let report = Session::replay(&script).context("replay failed")?;

    match format {
        OutputFormat::Human => output_human(path, &report),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(0)
}

fn handle_check(path: &Path, format: OutputFormat, grid: Option<f64>) -> Result<i32> {
    let script = load_script(path, grid)?;
    let report = Session::replay(&script).context("replay failed")?;
    let result = audit(&report.graph, &script.policy, &script.options);

    let (audit, integrity_error) = match result {
        Ok(audit) => (Some(audit), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let clean = audit.as_ref().is_some_and(Audit::is_clean);

    match format {
        OutputFormat::Human => output_check_human(path, &report, audit.as_ref(), integrity_error.as_deref()),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "script": path.display().to_string(),
                "final_state": report.final_state,
                "integrity_error": integrity_error,
                "audit": audit,
                "clean": clean,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(if clean { 0 } else { 1 })
}

fn output_human(path: &Path, report: &ReplayReport) {
    println!("\nScript: {}", path.display());
    println!("{}", "─".repeat(60));
    println!("  Policy: {}", describe_policy(&report.policy));

    println!("\n  Events:");
    for event in &report.events {
        print!(
            "    {:>3} {:<10} -> {:<14} changed {}",
            event.index,
            event.event,
            describe_state(event.state),
            event.changed.len()
        );
        if let Some(edge) = event.committed {
            print!(", committed {}", edge);
        }
        println!();
        for conflict in &event.conflicts {
            println!(
                "          conflict: {} and {} coincide at {}",
                conflict.first, conflict.second, conflict.at
            );
        }
    }

    println!("\n  Graph:");
    for vertex in &report.graph.vertices {
        println!("    {} at {} ({:?})", vertex.id, vertex.point, vertex.ownership);
    }
    for edge in &report.graph.edges {
        println!("    {} {} -> {}", edge.id, edge.start, edge.end);
    }

    println!("\n  Summary:");
    println!("    Final state:  {}", describe_state(report.final_state));
    println!("    Transactions: {}", report.transactions_applied);
    println!("    Vertices:     {}", report.graph.vertices.len());
    println!("    Edges:        {}", report.graph.edges.len());
    println!("    Islands:      {}", report.islands);
}

fn output_check_human(
    path: &Path,
    report: &ReplayReport,
    audit: Option<&Audit>,
    integrity_error: Option<&str>,
) {
    println!("\nScript: {}", path.display());
    println!("{}", "─".repeat(60));

    if let Some(error) = integrity_error {
        println!("  FAILED: {}", error);
        return;
    }
    let Some(audit) = audit else {
        return;
    };

    if report.final_state != RouteState::Idle {
        println!("  Note: script ends with a route in progress");
    }
    if audit.is_clean() {
        println!("  Graph is consistent and stable");
    } else {
        println!("  UNSTABLE: resolution would still change the graph");
        for id in &audit.unstable_vertices {
            println!("    - vertex {}", id);
        }
        for id in &audit.unstable_edges {
            println!("    - edge {}", id);
        }
    }
    for conflict in &audit.conflicts {
        println!(
            "  Conflict: {} and {} coincide at {}",
            conflict.first, conflict.second, conflict.at
        );
    }

    println!("\n  Summary:");
    println!("    Vertices: {}", audit.vertices);
    println!("    Edges:    {}", audit.edges);
    println!("    Islands:  {}", audit.islands);
}

fn describe_policy(policy: &PolicyConfig) -> String {
    match policy {
        PolicyConfig::Free { .. } => "free".to_string(),
        PolicyConfig::Manhattan { step, .. } => format!("manhattan grid, step {}", step),
    }
}

fn describe_state(state: RouteState) -> &'static str {
    match state {
        RouteState::Idle => "idle",
        RouteState::StartingRoute => "starting_route",
    }
}

fn handle_rules(verbose: bool) {
    println!("Normalisation rules (in pipeline order):\n");

    let engine = RulesEngine::with_default_rules();
    for rule in engine.rules() {
        println!("  {}", rule.id());
        println!("    {}", rule.name());
        if verbose {
            println!("    {}", rule.description());
        }
        println!();
    }

    if verbose {
        let defaults = EngineOptions::default();
        println!(
            "Passes run until the graph stops changing (at most {} by default).",
            defaults.max_passes
        );
    }
}
