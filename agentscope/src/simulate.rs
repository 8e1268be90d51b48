//! agentscope-simulate - run the chaos scenario headless
//!
//! Drives the simulation for a fixed number of ticks (or in real time until Ctrl-C)
//! and prints every emitted span and metric update as text or JSON lines.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/agentscope/agentscope.log (~/.local/state/agentscope/agentscope.log)
//! - Config: $XDG_CONFIG_HOME/agentscope/config.toml (~/.config/agentscope/config.toml)

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use agentscope_core::format::{format_cost, format_latency, format_tokens};
use agentscope_core::{
    AgentMetric, Config, SimulationConfig, SimulationDriver, SimulationStatus, TickOutcome,
    TraceSink, TraceSpan,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "agentscope-simulate")]
#[command(about = "Run the simulated agent scenario and print its trace")]
#[command(version)]
struct Args {
    /// Number of scenario steps to run (wait steps included)
    #[arg(short = 'n', long, default_value = "14")]
    ticks: u64,

    /// Seed for reproducible chaos
    #[arg(long)]
    seed: Option<u64>,

    /// Latency multiplier (overrides config)
    #[arg(long)]
    latency: Option<f64>,

    /// Error probability in [0, 1] (overrides config)
    #[arg(long)]
    error_rate: Option<f64>,

    /// Drift probability and magnitude in [0, 1] (overrides config)
    #[arg(long)]
    drift: Option<f64>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Tick on the wall clock instead of as fast as possible; runs until Ctrl-C if --ticks is 0
    #[arg(long)]
    realtime: bool,
}

/// JSON-lines event.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum OutputEvent<'a> {
    Span { span: &'a TraceSpan },
    Metrics { metrics: &'a AgentMetric },
}

/// Prints producer events to stdout.
struct PrintSink {
    format: OutputFormat,
    spans: u64,
}

impl PrintSink {
    fn emit(&self, event: &OutputEvent<'_>) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
    }
}

impl TraceSink for PrintSink {
    fn on_span(&mut self, span: TraceSpan) {
        self.spans += 1;
        match self.format {
            OutputFormat::Json => self.emit(&OutputEvent::Span { span: &span }),
            OutputFormat::Text => {
                let latency = span
                    .latency_ms
                    .map(|ms| format_latency(ms as f64))
                    .unwrap_or_else(|| "-".to_string());
                let mut line = format!(
                    "[{:<5}] {:>7}  {}",
                    span.span_type.as_str(),
                    latency,
                    span.content
                );
                if let Some(warning) = span.warning() {
                    line.push_str(&format!("  ({}, drift {:.2})", warning, span.drift()));
                }
                println!("{}", line);
            }
        }
        let _ = std::io::stdout().flush();
    }

    fn on_metrics(&mut self, metrics: &AgentMetric) {
        if self.format == OutputFormat::Json {
            self.emit(&OutputEvent::Metrics { metrics });
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        agentscope_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let chaos = SimulationConfig {
        latency_multiplier: args.latency.unwrap_or(config.chaos.latency_multiplier),
        error_rate: args.error_rate.unwrap_or(config.chaos.error_rate),
        drift_level: args.drift.unwrap_or(config.chaos.drift_level),
    };
    chaos.validate().context("invalid chaos settings")?;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let interval = config.simulation.tick_interval();
    let mut driver = SimulationDriver::with_rng(interval, rng);
    let mut sink = PrintSink {
        format: args.format,
        spans: 0,
    };

    tracing::info!(
        ticks = args.ticks,
        seed = ?args.seed,
        latency_multiplier = chaos.latency_multiplier,
        error_rate = chaos.error_rate,
        drift_level = chaos.drift_level,
        realtime = args.realtime,
        "agentscope-simulate starting"
    );

    driver.set_status(SimulationStatus::Running, Instant::now(), &mut sink);

    if args.realtime {
        run_realtime(&mut driver, &chaos, &mut sink, args.ticks)?;
    } else {
        for _ in 0..args.ticks {
            driver.tick(&chaos, &mut sink);
        }
    }

    let metrics = driver.metrics().clone();
    let steps = driver.step();
    driver.set_status(SimulationStatus::Idle, Instant::now(), &mut sink);

    if args.format == OutputFormat::Text {
        println!();
        println!("Steps:        {}", steps);
        println!("Spans:        {}", sink.spans);
        println!("Total spend:  {}", format_cost(metrics.total_cost));
        println!("Avg latency:  {}", format_latency(metrics.avg_latency));
        println!("Total tokens: {}", format_tokens(metrics.total_tokens));
        println!("Errors:       {}", metrics.error_count);
    }

    tracing::info!(steps, spans = sink.spans, "agentscope-simulate finished");
    Ok(())
}

/// Tick on the driver's own timer until `ticks` steps have run or Ctrl-C.
fn run_realtime(
    driver: &mut SimulationDriver<StdRng>,
    chaos: &SimulationConfig,
    sink: &mut PrintSink,
    ticks: u64,
) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl-C handler")?;

    while running.load(Ordering::SeqCst) && (ticks == 0 || driver.step() < ticks) {
        if let TickOutcome::Waited = driver.poll(Instant::now(), chaos, sink) {
            tracing::debug!(step = driver.step(), "Wait step");
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    if !running.load(Ordering::SeqCst) {
        eprintln!("Interrupted.");
    }
    Ok(())
}
