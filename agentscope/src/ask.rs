//! agentscope-ask - prompt the local model headless
//!
//! Loads the configured model on the background inference worker (with a progress bar),
//! then either answers one prompt or runs the flexible loop for N generations. Every span
//! the agent emits is printed as it arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use agentscope_core::format::{format_latency, format_tokens};
use agentscope_core::local_agent::THINKING_CONTENT;
use agentscope_core::{AgentStatus, Config, LocalAgent, SpanType, TraceSink, TraceSpan};
use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "agentscope-ask")]
#[command(about = "Send prompts to the local model through the inference worker")]
#[command(version)]
struct Args {
    /// Prompt to send (ignored with --flexible)
    prompt: Option<String>,

    /// Run the flexible loop until this many generations complete
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    flexible: Option<u32>,

    /// Ollama endpoint (overrides config)
    #[arg(long)]
    endpoint: Option<String>,

    /// Model name (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Print spans as JSON lines
    #[arg(long)]
    json: bool,
}

enum Task {
    Single(String),
    Flexible(u32),
}

/// Prints spans and counts finished generations.
struct AskSink {
    json: bool,
    completed: u32,
    failed: u32,
}

impl TraceSink for AskSink {
    fn on_span(&mut self, span: TraceSpan) {
        let is_answer = span.span_type == SpanType::Agent && span.latency_ms.is_some();
        if is_answer {
            self.completed += 1;
        }
        if span.is_error() {
            self.failed += 1;
        }

        if self.json {
            match serde_json::to_string(&span) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize span"),
            }
            return;
        }

        match span.span_type {
            SpanType::User => println!("> {}", span.content),
            SpanType::Agent if span.content == THINKING_CONTENT => {}
            SpanType::Agent => println!(
                "{}\n  ({}, {} tokens)\n",
                span.content.trim(),
                format_latency(span.latency_ms.unwrap_or(0) as f64),
                format_tokens(span.token_count.unwrap_or(0))
            ),
            SpanType::Error => eprintln!("{}", span.content),
            SpanType::Tool => println!("[tool] {}", span.content),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(endpoint) = args.endpoint.clone() {
        config.local_agent.endpoint = endpoint;
    }
    if let Some(model) = args.model.clone() {
        config.local_agent.model = model;
    }
    config.validate().context("invalid configuration")?;

    // Initialize logging
    let _log_guard =
        agentscope_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let task = match (&args.prompt, args.flexible) {
        (_, Some(target)) => Task::Flexible(target),
        (Some(prompt), None) if !prompt.trim().is_empty() => {
            Task::Single(prompt.trim().to_string())
        }
        _ => bail!("provide a prompt or --flexible N"),
    };

    tracing::info!(
        endpoint = %config.local_agent.endpoint,
        model = %config.local_agent.model,
        flexible = ?args.flexible,
        "agentscope-ask starting"
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let mut agent = LocalAgent::new(&config.local_agent);
    let mut sink = AskSink {
        json: args.json,
        completed: 0,
        failed: 0,
    };

    load_model(&mut agent, &mut sink, &running)?;
    if !running.load(Ordering::SeqCst) {
        return Ok(());
    }

    let generation_timeout = Duration::from_secs(config.local_agent.timeout_secs.max(1));

    match task {
        Task::Flexible(target) => {
            agent
                .toggle_flexible_mode(Instant::now(), &mut sink)
                .context("failed to start flexible mode")?;
            while running.load(Ordering::SeqCst) && sink.completed + sink.failed < target {
                agent.wait_for_reply(Duration::from_millis(50), &mut sink)?;
                agent.poll(Instant::now(), &mut sink)?;
                // a failed generation is not retried, so the loop ends there
                if agent.pending_requests() == 0 && agent.scheduled_run().is_none() {
                    break;
                }
            }
            agent.stop();
        }
        Task::Single(prompt) => {
            agent
                .run_agent(&prompt, Instant::now(), &mut sink)
                .context("failed to send prompt")?;
            let deadline = Instant::now() + generation_timeout;
            while running.load(Ordering::SeqCst) && agent.pending_requests() > 0 {
                if Instant::now() >= deadline {
                    bail!("no reply from the model within {:?}", generation_timeout);
                }
                agent.wait_for_reply(Duration::from_millis(200), &mut sink)?;
            }
        }
    }

    tracing::info!(
        completed = sink.completed,
        failed = sink.failed,
        "agentscope-ask finished"
    );

    if sink.failed > 0 {
        bail!("{} generation(s) failed", sink.failed);
    }
    Ok(())
}

/// Load the model, mirroring worker progress onto a progress bar.
fn load_model(agent: &mut LocalAgent, sink: &mut AskSink, running: &AtomicBool) -> Result<()> {
    agent.load_model().context("failed to start model load")?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("loading {}", agent.model_label()));
    pb.enable_steady_tick(Duration::from_millis(120));

    while running.load(Ordering::SeqCst) && agent.status() == AgentStatus::Loading {
        agent.wait_for_reply(Duration::from_millis(200), sink)?;
        if let Some(progress) = agent.progress() {
            pb.set_position(progress.progress.round() as u64);
            pb.set_message(progress.file.clone());
        }
    }

    match agent.status() {
        AgentStatus::Error => {
            pb.abandon_with_message("model load failed");
            bail!("could not load {}", agent.model_label());
        }
        _ => pb.finish_and_clear(),
    }
    Ok(())
}
