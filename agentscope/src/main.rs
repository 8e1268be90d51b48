//! agentscope - Agent Observability Dashboard
//!
//! Terminal UI that streams simulated or real agent traces with live metrics,
//! chaos controls, and a latency/drift chart.

mod app;
mod ui;

use std::io;
use std::time::{Duration, Instant};

use agentscope_core::{Config, Dashboard};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;

/// Demo to launch straight into, skipping the onboarding screen.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Demo {
    Simulation,
    Local,
}

#[derive(Parser)]
#[command(name = "agentscope")]
#[command(about = "Agent observability dashboard")]
#[command(version)]
struct Args {
    /// Start a demo immediately
    #[arg(long, value_enum)]
    demo: Option<Demo>,

    /// Simulation tick interval in milliseconds (overrides config)
    #[arg(long)]
    tick_ms: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(tick_ms) = args.tick_ms {
        config.simulation.tick_interval_ms = tick_ms;
        config.validate().context("invalid --tick-ms")?;
    }

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        agentscope_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(
        model = %config.local_agent.model,
        tick_interval_ms = config.simulation.tick_interval_ms,
        "agentscope TUI starting up"
    );

    let mut app = App::new(Dashboard::new(&config));
    let now = Instant::now();
    match args.demo {
        Some(Demo::Simulation) => app.start_simulation_demo(now),
        Some(Demo::Local) => app.start_local_demo(now),
        None => {}
    }

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("agentscope TUI shutting down");

    result
}

/// Run the main application loop.
///
/// Each pass polls the dashboard (simulation timer, worker replies, status settle),
/// renders, then waits up to 100ms for input.
fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.tick(Instant::now());

        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, Instant::now());
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
