//! # agentscope-core
//!
//! Core library for AgentScope - an agent observability dashboard.
//!
//! This library provides:
//! - Trace span and metric types
//! - A scripted scenario generator with chaos injection
//! - The simulation driver that ticks the scenario
//! - A local agent coordinator backed by a background inference worker
//! - Dashboard state shared by the terminal and headless front ends
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Two producers feed one consumer:
//! - **Simulation:** [`SimulationDriver`] calls [`scenario::generate`] on a timer
//! - **Local:** [`LocalAgent`] sends prompts to an [`local_agent::InferenceWorker`] thread
//!
//! Both report into a [`TraceSink`]; [`Dashboard`] owns the sink that front ends render.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use agentscope_core::{Config, Dashboard, SimulationStatus};
//!
//! let config = Config::load().expect("failed to load config");
//! let mut dashboard = Dashboard::new(&config);
//! dashboard.set_simulation_status(SimulationStatus::Running, Instant::now());
//! dashboard.poll(Instant::now()).expect("poll failed");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use dashboard::{ChaosKnob, Dashboard, DashboardMode, SystemStatus, TraceBoard};
pub use error::{Error, Result};
pub use local_agent::{AgentMode, AgentStatus, LocalAgent};
pub use simulation::{SimulationDriver, SimulationStatus, TickOutcome};
pub use types::*;

// Public modules
pub mod config;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod local_agent;
pub mod logging;
pub mod scenario;
pub mod simulation;
pub mod types;
