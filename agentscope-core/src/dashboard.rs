//! Dashboard state shared by every front end.
//!
//! [`Dashboard`] owns the current mode, the bounded trace board, the chaos config and both
//! producers. Front ends feed it input and call [`Dashboard::poll`] from their event loop;
//! everything else (timers, worker replies, the delayed system status) advances there.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;

use crate::config::Config;
use crate::error::Result;
use crate::local_agent::{AgentMode, AgentStatus, LocalAgent, RequestId};
use crate::simulation::{SimulationDriver, SimulationStatus};
use crate::types::{AgentMetric, SimulationConfig, TraceSink, TraceSpan};

/// Spans kept on the board, newest first.
pub const SPAN_LIMIT: usize = 50;

/// Spans plotted on the latency/drift chart.
pub const CHART_WINDOW: usize = 30;

/// Quiet period before a chaos change is reflected in the system status.
pub const STATUS_SETTLE: Duration = Duration::from_millis(1500);

/// Which producer the dashboard is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardMode {
    #[default]
    Simulation,
    Local,
}

impl DashboardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardMode::Simulation => "simulation",
            DashboardMode::Local => "local",
        }
    }
}

// ============================================
// Trace board
// ============================================

/// Bounded span list plus metric snapshot; the sink both producers write into.
#[derive(Debug, Clone)]
pub struct TraceBoard {
    mode: DashboardMode,
    spans: VecDeque<TraceSpan>,
    metrics: AgentMetric,
}

impl TraceBoard {
    pub fn new(mode: DashboardMode) -> Self {
        Self {
            mode,
            spans: VecDeque::with_capacity(SPAN_LIMIT),
            metrics: AgentMetric::zero(),
        }
    }

    /// Spans, newest first.
    pub fn spans(&self) -> std::collections::vec_deque::Iter<'_, TraceSpan> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn metrics(&self) -> &AgentMetric {
        &self.metrics
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.metrics = AgentMetric::zero();
    }

    fn set_mode(&mut self, mode: DashboardMode) {
        self.mode = mode;
    }
}

impl TraceSink for TraceBoard {
    fn on_span(&mut self, span: TraceSpan) {
        if self.mode == DashboardMode::Local && span.is_measured() {
            self.metrics = fold_local(&self.metrics, &span);
        }
        self.spans.push_front(span);
        self.spans.truncate(SPAN_LIMIT);
    }

    fn on_metrics(&mut self, metrics: &AgentMetric) {
        if self.mode == DashboardMode::Simulation {
            self.metrics = metrics.clone();
        }
    }

    fn on_stop(&mut self) {
        self.clear();
    }
}

/// Local-mode fold: like the driver's, except cost never moves.
fn fold_local(metrics: &AgentMetric, span: &TraceSpan) -> AgentMetric {
    let mut next = metrics.fold(span);
    next.total_cost = metrics.total_cost;
    next
}

// ============================================
// Chaos controls
// ============================================

/// One adjustable chaos parameter with its UI bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosKnob {
    LatencyMultiplier,
    ErrorRate,
    DriftLevel,
}

impl ChaosKnob {
    pub const ALL: [ChaosKnob; 3] = [
        ChaosKnob::LatencyMultiplier,
        ChaosKnob::ErrorRate,
        ChaosKnob::DriftLevel,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChaosKnob::LatencyMultiplier => "Latency Multiplier",
            ChaosKnob::ErrorRate => "Error Rate",
            ChaosKnob::DriftLevel => "Drift Level",
        }
    }

    /// Inclusive (min, max).
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            ChaosKnob::LatencyMultiplier => (0.5, 5.0),
            ChaosKnob::ErrorRate => (0.0, 0.5),
            ChaosKnob::DriftLevel => (0.0, 1.0),
        }
    }

    pub fn step(&self) -> f64 {
        match self {
            ChaosKnob::LatencyMultiplier => 0.1,
            ChaosKnob::ErrorRate => 0.05,
            ChaosKnob::DriftLevel => 0.1,
        }
    }

    pub fn get(&self, config: &SimulationConfig) -> f64 {
        match self {
            ChaosKnob::LatencyMultiplier => config.latency_multiplier,
            ChaosKnob::ErrorRate => config.error_rate,
            ChaosKnob::DriftLevel => config.drift_level,
        }
    }

    /// Set the knob, clamped to bounds and snapped to the step grid.
    pub fn set(&self, config: &mut SimulationConfig, value: f64) -> f64 {
        let (min, max) = self.bounds();
        let step = self.step();
        let snapped = min + ((value - min) / step).round() * step;
        // two decimals is finer than every step; drops float residue like 0.30000000000000004
        let value = ((snapped.clamp(min, max)) * 100.0).round() / 100.0;

        match self {
            ChaosKnob::LatencyMultiplier => config.latency_multiplier = value,
            ChaosKnob::ErrorRate => config.error_rate = value,
            ChaosKnob::DriftLevel => config.drift_level = value,
        }
        value
    }

    /// Move the knob by `steps` increments (negative to decrease).
    pub fn adjust(&self, config: &mut SimulationConfig, steps: i32) -> f64 {
        let current = self.get(config);
        self.set(config, current + steps as f64 * self.step())
    }
}

// ============================================
// System status
// ============================================

/// Health of one backing service as shown in the status panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    Operational,
    Degraded,
    HighLatency,
}

impl ServiceHealth {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceHealth::Operational => "Operational",
            ServiceHealth::Degraded => "Degraded",
            ServiceHealth::HighLatency => "High Latency",
        }
    }

    pub fn is_healthy(&self) -> bool {
        *self == ServiceHealth::Operational
    }
}

/// Derived view of how the chaos settings affect the simulated infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus {
    pub unstable_network: bool,
    pub high_latency: bool,
    pub vector_db: ServiceHealth,
    pub llm_gateway: ServiceHealth,
    pub tool_sandbox: ServiceHealth,
}

impl SystemStatus {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            unstable_network: config.error_rate > 0.1,
            high_latency: config.latency_multiplier > 1.5,
            vector_db: if config.error_rate > 0.2 {
                ServiceHealth::Degraded
            } else {
                ServiceHealth::Operational
            },
            llm_gateway: if config.latency_multiplier > 2.0 {
                ServiceHealth::HighLatency
            } else {
                ServiceHealth::Operational
            },
            tool_sandbox: ServiceHealth::Operational,
        }
    }

    /// Header badges, in display order.
    pub fn badges(&self) -> Vec<&'static str> {
        let mut badges = Vec::new();
        if self.unstable_network {
            badges.push("UNSTABLE NETWORK");
        }
        if self.high_latency {
            badges.push("HIGH LATENCY");
        }
        badges
    }

    /// Status panel rows.
    pub fn services(&self) -> [(&'static str, ServiceHealth); 3] {
        [
            ("Vector DB Cluster", self.vector_db),
            ("LLM Gateway", self.llm_gateway),
            ("Tool Execution Sandbox", self.tool_sandbox),
        ]
    }
}

/// System status that only follows the chaos config once it has been still for a while.
#[derive(Debug, Clone)]
pub struct SettlingStatus {
    current: SystemStatus,
    pending: Option<(SimulationConfig, Instant)>,
    settle: Duration,
}

impl SettlingStatus {
    pub fn new(config: &SimulationConfig, settle: Duration) -> Self {
        Self {
            current: SystemStatus::from_config(config),
            pending: None,
            settle,
        }
    }

    pub fn current(&self) -> &SystemStatus {
        &self.current
    }

    /// Record a config change; restarts the settle delay.
    pub fn observe(&mut self, config: SimulationConfig, now: Instant) {
        self.pending = Some((config, now + self.settle));
    }

    /// Apply the pending config once its delay has elapsed. Returns true if applied.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending {
            Some((config, due)) if now >= due => {
                self.current = SystemStatus::from_config(&config);
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

// ============================================
// Chart
// ============================================

/// One point on the latency/drift chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub index: usize,
    pub latency_ms: f64,
    /// Drift as a percentage
    pub drift: f64,
}

/// Chart series over the newest [`CHART_WINDOW`] spans, oldest first.
pub fn chart_points<'a, I>(newest_first: I) -> Vec<ChartPoint>
where
    I: IntoIterator<Item = &'a TraceSpan>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    let spans = newest_first.into_iter();
    let skip = spans.len().saturating_sub(CHART_WINDOW);
    spans
        .rev()
        .skip(skip)
        .enumerate()
        .map(|(index, span)| ChartPoint {
            index,
            latency_ms: span.latency_ms.unwrap_or(0) as f64,
            drift: span.drift() * 100.0,
        })
        .collect()
}

// ============================================
// Dashboard
// ============================================

/// Routes user actions to the simulation driver or the local agent.
pub struct Dashboard {
    mode: DashboardMode,
    board: TraceBoard,
    chaos: SimulationConfig,
    driver: SimulationDriver<StdRng>,
    agent: LocalAgent,
    status: SettlingStatus,
    auto_start_flexible: bool,
}

impl Dashboard {
    /// Dashboard wired to the configured Ollama model.
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            config.chaos,
            SimulationDriver::new(config.simulation.tick_interval()),
            LocalAgent::new(&config.local_agent),
        )
    }

    pub fn with_parts(
        chaos: SimulationConfig,
        driver: SimulationDriver<StdRng>,
        agent: LocalAgent,
    ) -> Self {
        Self {
            mode: DashboardMode::Simulation,
            board: TraceBoard::new(DashboardMode::Simulation),
            chaos,
            driver,
            agent,
            status: SettlingStatus::new(&chaos, STATUS_SETTLE),
            auto_start_flexible: false,
        }
    }

    pub fn mode(&self) -> DashboardMode {
        self.mode
    }

    pub fn board(&self) -> &TraceBoard {
        &self.board
    }

    pub fn metrics(&self) -> &AgentMetric {
        self.board.metrics()
    }

    pub fn chaos(&self) -> &SimulationConfig {
        &self.chaos
    }

    pub fn driver(&self) -> &SimulationDriver<StdRng> {
        &self.driver
    }

    pub fn agent(&self) -> &LocalAgent {
        &self.agent
    }

    pub fn system_status(&self) -> &SystemStatus {
        self.status.current()
    }

    /// True while the local demo is waiting for the model to become ready.
    pub fn auto_start_pending(&self) -> bool {
        self.auto_start_flexible
    }

    pub fn chart_points(&self) -> Vec<ChartPoint> {
        chart_points(&self.board.spans)
    }

    /// Switch producers. Resets the board and halts both producers.
    pub fn switch_mode(&mut self, mode: DashboardMode, now: Instant) {
        tracing::info!(from = self.mode.as_str(), to = mode.as_str(), "Switching mode");
        self.mode = mode;
        self.board.set_mode(mode);
        self.driver.set_status(SimulationStatus::Idle, now, &mut self.board);
        self.board.clear();
        self.agent.stop();
        self.auto_start_flexible = false;
    }

    /// Command the simulation driver. Ignored outside simulation mode.
    pub fn set_simulation_status(&mut self, status: SimulationStatus, now: Instant) -> bool {
        if self.mode != DashboardMode::Simulation {
            return false;
        }
        self.driver.set_status(status, now, &mut self.board)
    }

    /// Replace the chaos config; the next tick uses it.
    pub fn set_chaos(&mut self, chaos: SimulationConfig, now: Instant) {
        self.chaos = chaos;
        self.status.observe(chaos, now);
    }

    pub fn adjust_chaos(&mut self, knob: ChaosKnob, steps: i32, now: Instant) -> f64 {
        let mut chaos = self.chaos;
        let value = knob.adjust(&mut chaos, steps);
        self.set_chaos(chaos, now);
        tracing::debug!(knob = knob.label(), value, "Chaos adjusted");
        value
    }

    /// Low-chaos simulation, running immediately.
    pub fn start_simulation_demo(&mut self, now: Instant) {
        if self.mode != DashboardMode::Simulation {
            self.switch_mode(DashboardMode::Simulation, now);
        }
        self.set_chaos(SimulationConfig::low_chaos(), now);
        self.driver.set_status(SimulationStatus::Running, now, &mut self.board);
    }

    /// Local mode with the model loading; flexible mode starts once it is ready.
    pub fn start_local_demo(&mut self, now: Instant) -> Result<()> {
        self.switch_mode(DashboardMode::Local, now);
        self.agent.load_model()?;
        self.auto_start_flexible = true;
        Ok(())
    }

    pub fn load_model(&mut self) -> Result<bool> {
        self.agent.load_model()
    }

    pub fn run_agent(&mut self, prompt: &str, now: Instant) -> Result<RequestId> {
        self.agent.run_agent(prompt, now, &mut self.board)
    }

    pub fn toggle_flexible_mode(&mut self, now: Instant) -> Result<()> {
        self.agent.toggle_flexible_mode(now, &mut self.board)
    }

    pub fn stop_agent(&mut self) {
        self.agent.stop();
    }

    /// Advance timers and drain worker replies.
    pub fn poll(&mut self, now: Instant) -> Result<()> {
        self.driver.poll(now, &self.chaos, &mut self.board);

        // Agent failures are reported after the status settle has had its turn
        let agent_result = self
            .agent
            .poll(now, &mut self.board)
            .and_then(|_| self.auto_start(now));

        if self.status.poll(now) {
            tracing::debug!(badges = ?self.status.current().badges(), "System status updated");
        }
        agent_result
    }

    fn auto_start(&mut self, now: Instant) -> Result<()> {
        if self.auto_start_flexible && self.agent.status() == AgentStatus::Ready {
            self.auto_start_flexible = false;
            if self.agent.mode() != AgentMode::Flexible {
                tracing::info!("Model ready, starting flexible mode");
                self.agent.toggle_flexible_mode(now, &mut self.board)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::local_agent::{InferencePipeline, LoadProgress, PipelineLoader, WorkerReply};
    use crate::simulation::DEFAULT_TICK_INTERVAL;
    use crate::types::SpanType;
    use rand::SeedableRng;

    struct Offline;

    impl PipelineLoader for Offline {
        fn load(&mut self, _: &mut dyn FnMut(LoadProgress)) -> Result<Box<dyn InferencePipeline>> {
            Err(Error::Inference("offline".to_string()))
        }
    }

    fn dashboard() -> Dashboard {
        Dashboard::with_parts(
            SimulationConfig::low_chaos(),
            SimulationDriver::with_rng(DEFAULT_TICK_INTERVAL, StdRng::seed_from_u64(5)),
            LocalAgent::with_loader(Box::new(Offline), "tiny (Worker)", Duration::from_millis(300)),
        )
    }

    #[test]
    fn test_board_is_bounded_newest_first() {
        let mut board = TraceBoard::new(DashboardMode::Simulation);
        for i in 0..60 {
            board.on_span(TraceSpan::new(SpanType::Agent, format!("span {i}")));
        }
        assert_eq!(board.len(), SPAN_LIMIT);
        assert_eq!(board.spans().next().unwrap().content, "span 59");
        assert_eq!(board.spans().last().unwrap().content, "span 10");
    }

    #[test]
    fn test_local_board_folds_measured_spans_without_cost() {
        let mut board = TraceBoard::new(DashboardMode::Local);
        board.on_span(TraceSpan::new(SpanType::User, "Hi"));
        assert!(board.metrics().is_zero());

        board.on_span(
            TraceSpan::new(SpanType::Agent, "Hello")
                .with_latency(1000)
                .with_tokens(12)
                .with_cost(5.0),
        );
        assert_eq!(board.metrics().total_tokens, 12);
        assert_eq!(board.metrics().avg_latency, 100.0);
        assert_eq!(board.metrics().total_cost, 0.0);

        // driver metrics are ignored in local mode
        board.on_metrics(&AgentMetric {
            total_tokens: 999,
            ..AgentMetric::zero()
        });
        assert_eq!(board.metrics().total_tokens, 12);
    }

    #[test]
    fn test_simulation_board_takes_driver_metrics() {
        let mut board = TraceBoard::new(DashboardMode::Simulation);
        board.on_span(TraceSpan::new(SpanType::Agent, "x").with_tokens(10));
        assert!(board.metrics().is_zero());
        board.on_metrics(&AgentMetric {
            total_tokens: 42,
            ..AgentMetric::zero()
        });
        assert_eq!(board.metrics().total_tokens, 42);
    }

    #[test]
    fn test_knob_clamps_and_snaps() {
        let mut config = SimulationConfig::default();
        assert_eq!(ChaosKnob::LatencyMultiplier.set(&mut config, 9.0), 5.0);
        assert_eq!(ChaosKnob::LatencyMultiplier.set(&mut config, 0.1), 0.5);
        assert_eq!(ChaosKnob::ErrorRate.set(&mut config, 0.33), 0.35);
        assert_eq!(ChaosKnob::DriftLevel.set(&mut config, 0.1 + 0.2), 0.3);
        assert_eq!(config.drift_level, 0.3);

        config.error_rate = 0.45;
        assert_eq!(ChaosKnob::ErrorRate.adjust(&mut config, 3), 0.5);
        assert_eq!(ChaosKnob::ErrorRate.adjust(&mut config, -2), 0.4);
    }

    #[test]
    fn test_system_status_thresholds() {
        let calm = SystemStatus::from_config(&SimulationConfig::low_chaos());
        assert!(calm.badges().is_empty());
        assert!(calm.services().iter().all(|(_, h)| h.is_healthy()));

        let rough = SystemStatus::from_config(&SimulationConfig {
            latency_multiplier: 2.5,
            error_rate: 0.25,
            drift_level: 0.0,
        });
        assert_eq!(rough.badges(), vec!["UNSTABLE NETWORK", "HIGH LATENCY"]);
        assert_eq!(rough.vector_db, ServiceHealth::Degraded);
        assert_eq!(rough.llm_gateway, ServiceHealth::HighLatency);
        assert_eq!(rough.tool_sandbox, ServiceHealth::Operational);

        let edge = SystemStatus::from_config(&SimulationConfig {
            latency_multiplier: 2.0,
            error_rate: 0.15,
            drift_level: 0.0,
        });
        assert_eq!(edge.badges(), vec!["UNSTABLE NETWORK", "HIGH LATENCY"]);
        assert!(edge.vector_db.is_healthy());
        assert!(edge.llm_gateway.is_healthy());
    }

    #[test]
    fn test_status_settles_after_quiet_period() {
        let start = Instant::now();
        let mut status = SettlingStatus::new(&SimulationConfig::low_chaos(), STATUS_SETTLE);
        let rough = SimulationConfig {
            error_rate: 0.3,
            ..SimulationConfig::low_chaos()
        };

        status.observe(rough, start);
        status.observe(rough, start + Duration::from_millis(1000));
        assert!(!status.poll(start + Duration::from_millis(1600)));
        assert!(status.current().badges().is_empty());

        assert!(status.poll(start + Duration::from_millis(2500)));
        assert_eq!(status.current().vector_db, ServiceHealth::Degraded);
    }

    #[test]
    fn test_chart_keeps_last_thirty_oldest_first() {
        let mut board = TraceBoard::new(DashboardMode::Simulation);
        for i in 0..40u64 {
            board.on_span(
                TraceSpan::new(SpanType::Tool, "t")
                    .with_latency(i)
                    .with_metadata("drift", 0.5),
            );
        }
        let points = chart_points(board.spans());
        assert_eq!(points.len(), CHART_WINDOW);
        assert_eq!(points[0].index, 0);
        assert_eq!(points[0].latency_ms, 10.0);
        assert_eq!(points[29].latency_ms, 39.0);
        assert_eq!(points[29].drift, 50.0);
    }

    #[test]
    fn test_chart_defaults_missing_values() {
        let spans = vec![TraceSpan::new(SpanType::User, "Hi")];
        let points = chart_points(&spans);
        assert_eq!(
            points,
            vec![ChartPoint {
                index: 0,
                latency_ms: 0.0,
                drift: 0.0
            }]
        );
    }

    #[test]
    fn test_simulation_demo_runs_low_chaos() {
        let mut dash = dashboard();
        let start = Instant::now();
        dash.set_chaos(
            SimulationConfig {
                error_rate: 0.5,
                ..SimulationConfig::default()
            },
            start,
        );
        dash.start_simulation_demo(start);
        assert_eq!(*dash.chaos(), SimulationConfig::low_chaos());
        assert_eq!(dash.driver().status(), SimulationStatus::Running);

        dash.poll(start + DEFAULT_TICK_INTERVAL).unwrap();
        let first = dash.board().spans().next().unwrap();
        assert_eq!(first.content, "Can you analyze the sales data for Q3?");
        assert_eq!(dash.metrics().error_count, 0);
    }

    #[test]
    fn test_switch_mode_resets_and_stops() {
        let mut dash = dashboard();
        let start = Instant::now();
        dash.set_simulation_status(SimulationStatus::Running, start);
        dash.poll(start + DEFAULT_TICK_INTERVAL).unwrap();
        assert!(!dash.board().is_empty());

        dash.switch_mode(DashboardMode::Local, start + DEFAULT_TICK_INTERVAL);
        assert_eq!(dash.mode(), DashboardMode::Local);
        assert!(dash.board().is_empty());
        assert!(dash.metrics().is_zero());
        assert_eq!(dash.driver().status(), SimulationStatus::Idle);
        assert_eq!(dash.agent().mode(), AgentMode::Manual);

        // the driver cannot be started outside simulation mode
        assert!(!dash.set_simulation_status(SimulationStatus::Running, start));
        assert_eq!(dash.driver().status(), SimulationStatus::Idle);
    }

    #[test]
    fn test_local_demo_requests_load() {
        let mut dash = dashboard();
        dash.start_local_demo(Instant::now()).unwrap();
        assert_eq!(dash.mode(), DashboardMode::Local);
        assert_eq!(dash.agent().status(), AgentStatus::Loading);
        assert!(dash.auto_start_pending());
    }

    #[test]
    fn test_local_demo_load_failure_surfaces_error_span() {
        let mut dash = dashboard();
        dash.start_local_demo(Instant::now()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while dash.agent().status() == AgentStatus::Loading && Instant::now() < deadline {
            dash.poll(Instant::now()).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(dash.agent().status(), AgentStatus::Error);
        let span = dash.board().spans().next().unwrap();
        assert_eq!(span.span_type, SpanType::Error);
        assert!(span.content.starts_with("Worker Error: "));
        assert!(dash.auto_start_pending());
    }

    #[test]
    fn test_error_reply_routes_into_board() {
        let mut dash = dashboard();
        dash.switch_mode(DashboardMode::Local, Instant::now());
        dash.agent.handle_reply(
            WorkerReply::Error {
                request_id: None,
                message: "boom".to_string(),
            },
            Instant::now(),
            &mut dash.board,
        );
        assert_eq!(dash.board().len(), 1);
        assert!(dash.metrics().is_zero());
    }

    struct Crashes;

    impl PipelineLoader for Crashes {
        fn load(&mut self, _: &mut dyn FnMut(LoadProgress)) -> Result<Box<dyn InferencePipeline>> {
            panic!("loader crashed");
        }
    }

    #[test]
    fn test_crashing_loader_does_not_stall_dashboard() {
        crate::logging::init_test();
        let mut dash = Dashboard::with_parts(
            SimulationConfig::low_chaos(),
            SimulationDriver::with_rng(DEFAULT_TICK_INTERVAL, StdRng::seed_from_u64(5)),
            LocalAgent::with_loader(Box::new(Crashes), "tiny (Worker)", Duration::from_millis(300)),
        );
        let start = Instant::now();
        dash.start_local_demo(start).unwrap();
        dash.set_chaos(
            SimulationConfig {
                error_rate: 0.3,
                ..SimulationConfig::low_chaos()
            },
            start,
        );

        let deadline = start + Duration::from_secs(5);
        while dash.agent().status() == AgentStatus::Loading && Instant::now() < deadline {
            dash.poll(Instant::now()).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(dash.agent().status(), AgentStatus::Error);
        assert!(dash
            .board()
            .spans()
            .any(|span| span.is_error() && span.content.contains("loader crashed")));

        for secs in 10..15 {
            dash.poll(start + Duration::from_secs(secs)).unwrap();
        }
        assert_eq!(dash.system_status().vector_db, ServiceHealth::Degraded);
    }
}
