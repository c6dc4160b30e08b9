use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use swarm_analysis::{
    AgentRoster, LatencyReport, TimelineEntry, ToolState, analyze_latency, compose_timeline,
    final_summary,
};
use swarm_events::{JsonlFileSource, RawEventSource, StdinSource};
use swarm_runtime::{EngineConfig, Run, SwarmEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "swarmd")]
#[command(about = "Reconstruct swarm runs from a captured event log")]
struct Cli {
    /// Engine config as JSON; missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, env = "SWARMD_DEDUP_CAPACITY")]
    dedup_capacity: Option<usize>,
    /// Newline-delimited event log, or `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List reconstructed runs.
    Runs,
    /// Display timeline with tool states.
    Timeline {
        #[arg(long)]
        run: String,
    },
    /// Final summary text of a finished run.
    Summary {
        #[arg(long)]
        run: String,
    },
    /// Estimated swarm vs. classic latency.
    Latency {
        #[arg(long)]
        run: String,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli).await?;
    let engine = SwarmEngine::new(config)?;

    let source: Box<dyn RawEventSource> = if cli.input == "-" {
        Box::new(StdinSource)
    } else {
        Box::new(JsonlFileSource::new(&cli.input))
    };
    let stream = source.open().await?;
    let stats = engine.consume(stream).await?;
    info!(runs = engine.run_count(), applied = stats.applied, "replay complete");

    match cli.command {
        Command::Runs => {
            for run in engine.snapshot().runs {
                println!(
                    "{}\t{}\t{}\t{}",
                    run.id,
                    run.status.as_str(),
                    run.events.len(),
                    run.task
                );
            }
        }
        Command::Timeline { run } => {
            let run = engine.require_run(&run)?;
            print_timeline(&run, &engine);
        }
        Command::Summary { run } => {
            let run = engine.require_run(&run)?;
            let Some(summary) = final_summary(&run.events) else {
                bail!("run {} has not finished", run.id);
            };
            println!("{summary}");
        }
        Command::Latency { run, json } => {
            let run = engine.require_run(&run)?;
            let Some(report) = analyze_latency(&run.events, engine.tokens()) else {
                bail!(
                    "no latency estimate for run {}: start or finish timestamp missing or unreadable",
                    run.id
                );
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("failed encoding report")?
                );
            } else {
                print_latency(&report);
            }
        }
    }

    Ok(())
}

async fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed reading config {path:?}"))?;
            EngineConfig::from_json(&text)?
        }
        None => EngineConfig::new(),
    };
    if let Some(capacity) = cli.dedup_capacity {
        config = config.with_dedup_capacity(capacity);
    }
    Ok(config)
}

fn print_timeline(run: &Run, engine: &SwarmEngine) {
    let roster = AgentRoster::from_events(&run.events);
    for entry in compose_timeline(&run.events, engine.tokens()) {
        let label = roster.label(entry.event());
        match entry {
            TimelineEntry::Message { event } => {
                println!("{label}: {}", event.message_text());
            }
            TimelineEntry::Tool {
                call,
                tool_index,
                state,
            } => {
                let tool = call.tool_name.as_deref().unwrap_or("(unnamed tool)");
                let index = tool_index.map(|i| format!(" #{i}")).unwrap_or_default();
                let outcome = match state {
                    ToolState::Pending => "pending".to_owned(),
                    ToolState::Finished {
                        errored: true,
                        output,
                    } => format!("error: {output}"),
                    ToolState::Finished { output, .. } => format!("ok: {output}"),
                };
                println!("{label}: {tool}{index} [{outcome}]");
            }
        }
    }
}

fn print_latency(report: &LatencyReport) {
    println!("wall          {:.3}s", report.wall_seconds);
    println!("orchestrator  {:.3}s", report.orchestrator_seconds);
    println!("swarm         {:.3}s", report.swarm_seconds);
    println!("classic       {:.3}s", report.classic_seconds);
    match report.speedup {
        Some(speedup) => println!("speedup       {speedup:.2}x"),
        None => println!("speedup       n/a"),
    }
    for agent in &report.agents {
        println!("  {:<12}{:.3}s", agent.agent_id.as_str(), agent.seconds);
    }
    for (ordinal, segment) in report.segments.iter().enumerate() {
        println!(
            "segment {}: {:.3}s, overhead {:.3}s, {} workers, peak {}",
            ordinal + 1,
            segment.duration_seconds,
            segment.overhead_seconds,
            segment.windows.len(),
            segment.peak_concurrency
        );
    }
}
