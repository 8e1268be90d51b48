//! Periodic simulation driver.
//!
//! The driver is a three-state machine (`Idle`, `Running`, `Paused`) commanded from
//! outside. While running, [`SimulationDriver::poll`] fires one scenario step whenever the
//! tick deadline has passed; the next deadline is measured from the poll that fired, so a
//! late poll delays the cadence instead of catching up.
//!
//! Entering `Idle` resets the step counter, the metric aggregate and the span accumulator,
//! and notifies the sink exactly once per transition.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::scenario::{self, Generated};
use crate::types::{AgentMetric, SimulationConfig, TraceSink, TraceSpan};

/// Default period between scenario steps.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(2000);

/// Most recent spans kept by the driver's own accumulator.
pub const SPAN_CAPACITY: usize = 50;

/// Commanded driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::Idle => "idle",
            SimulationStatus::Running => "running",
            SimulationStatus::Paused => "paused",
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A span was emitted and metrics updated
    Emitted(TraceSpan),
    /// The wait step came up; the counter advanced silently
    Waited,
    /// The driver is not running
    Inactive,
}

/// Ticking state machine over the scenario generator.
pub struct SimulationDriver<R = StdRng> {
    status: SimulationStatus,
    step: u64,
    metrics: AgentMetric,
    spans: VecDeque<TraceSpan>,
    interval: Duration,
    next_tick: Option<Instant>,
    rng: R,
}

impl SimulationDriver<StdRng> {
    /// Create an idle driver with an entropy-seeded RNG.
    pub fn new(interval: Duration) -> Self {
        Self::with_rng(interval, StdRng::from_entropy())
    }
}

impl<R: Rng> SimulationDriver<R> {
    /// Create an idle driver drawing chaos from `rng`.
    pub fn with_rng(interval: Duration, rng: R) -> Self {
        Self {
            status: SimulationStatus::Idle,
            step: 0,
            metrics: AgentMetric::zero(),
            spans: VecDeque::with_capacity(SPAN_CAPACITY),
            interval,
            next_tick: None,
            rng,
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    /// Steps taken since the last reset, wait steps included.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn metrics(&self) -> &AgentMetric {
        &self.metrics
    }

    /// Spans emitted since the last reset, newest first.
    pub fn spans(&self) -> impl Iterator<Item = &TraceSpan> {
        self.spans.iter()
    }

    /// Deadline of the next tick, if the timer is armed.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Command a state transition.
    ///
    /// Returns false if the driver was already in `status`.
    pub fn set_status(
        &mut self,
        status: SimulationStatus,
        now: Instant,
        sink: &mut dyn TraceSink,
    ) -> bool {
        if status == self.status {
            return false;
        }

        let previous = self.status;
        self.status = status;

        match status {
            SimulationStatus::Idle => {
                self.next_tick = None;
                self.step = 0;
                self.spans.clear();
                self.metrics = AgentMetric::zero();
                sink.on_stop();
            }
            SimulationStatus::Running => {
                self.next_tick = Some(now + self.interval);
            }
            SimulationStatus::Paused => {
                self.next_tick = None;
            }
        }

        tracing::info!(
            from = previous.as_str(),
            to = status.as_str(),
            step = self.step,
            "Simulation status changed"
        );
        true
    }

    /// Fire at most one tick if the deadline has passed.
    pub fn poll(
        &mut self,
        now: Instant,
        config: &SimulationConfig,
        sink: &mut dyn TraceSink,
    ) -> TickOutcome {
        match self.next_tick {
            Some(deadline) if self.status == SimulationStatus::Running && now >= deadline => {
                self.next_tick = Some(now + self.interval);
                self.tick(config, sink)
            }
            _ => TickOutcome::Inactive,
        }
    }

    /// Run one scenario step immediately, bypassing the timer.
    ///
    /// Only acts while running. The config is read fresh on every call.
    pub fn tick(&mut self, config: &SimulationConfig, sink: &mut dyn TraceSink) -> TickOutcome {
        if self.status != SimulationStatus::Running {
            return TickOutcome::Inactive;
        }

        let generated = scenario::generate(self.step, config, &mut self.rng);
        self.step += 1;

        match generated {
            Generated::Wait => {
                tracing::trace!(step = self.step, "Scenario wait step");
                TickOutcome::Waited
            }
            Generated::Span(span) => {
                tracing::debug!(
                    step = self.step,
                    span_type = span.span_type.as_str(),
                    latency_ms = span.latency_ms.unwrap_or(0),
                    "Simulated span"
                );

                self.metrics = self.metrics.fold(&span);

                self.spans.push_front(span.clone());
                self.spans.truncate(SPAN_CAPACITY);

                sink.on_span(span.clone());
                sink.on_metrics(&self.metrics);
                TickOutcome::Emitted(span)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordingSink, SpanType};

    fn calm() -> SimulationConfig {
        SimulationConfig::low_chaos()
    }

    fn driver() -> SimulationDriver {
        SimulationDriver::with_rng(DEFAULT_TICK_INTERVAL, StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_starts_idle_and_inactive() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        assert_eq!(driver.status(), SimulationStatus::Idle);
        assert_eq!(driver.tick(&calm(), &mut sink), TickOutcome::Inactive);
        assert!(sink.spans.is_empty());
        assert_eq!(driver.step(), 0);
    }

    #[test]
    fn test_poll_respects_interval() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        let start = Instant::now();

        driver.set_status(SimulationStatus::Running, start, &mut sink);
        assert_eq!(
            driver.poll(start + Duration::from_millis(1999), &calm(), &mut sink),
            TickOutcome::Inactive
        );
        assert!(matches!(
            driver.poll(start + Duration::from_millis(2000), &calm(), &mut sink),
            TickOutcome::Emitted(_)
        ));
        // no catch-up: a long gap still yields one tick per poll
        let late = start + Duration::from_secs(60);
        assert!(matches!(
            driver.poll(late, &calm(), &mut sink),
            TickOutcome::Emitted(_)
        ));
        assert_eq!(
            driver.poll(late + Duration::from_millis(10), &calm(), &mut sink),
            TickOutcome::Inactive
        );
        assert_eq!(driver.step(), 2);
        assert_eq!(driver.next_tick(), Some(late + DEFAULT_TICK_INTERVAL));
    }

    #[test]
    fn test_wait_step_advances_silently() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        driver.set_status(SimulationStatus::Running, Instant::now(), &mut sink);

        for _ in 0..6 {
            assert!(matches!(
                driver.tick(&calm(), &mut sink),
                TickOutcome::Emitted(_)
            ));
        }
        assert_eq!(driver.tick(&calm(), &mut sink), TickOutcome::Waited);
        assert_eq!(driver.step(), 7);
        assert_eq!(sink.spans.len(), 6);
        assert_eq!(sink.metrics.len(), 6);

        match driver.tick(&calm(), &mut sink) {
            TickOutcome::Emitted(span) => {
                assert_eq!(span.span_type, SpanType::User);
                assert_eq!(span.content, sink.spans[0].content);
            }
            other => panic!("expected span, got {:?}", other),
        }
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        driver.set_status(SimulationStatus::Running, Instant::now(), &mut sink);

        for _ in 0..3 {
            driver.tick(&calm(), &mut sink);
        }
        // user(0) + thinking(20) + tool call(55)
        assert_eq!(driver.metrics().total_tokens, 75);
        assert!((driver.metrics().total_cost - 75.0 * 0.00003).abs() < 1e-12);
        assert!(driver.metrics().avg_latency > 0.0);
        assert_eq!(driver.metrics().error_count, 0);
        assert_eq!(sink.metrics.last(), Some(driver.metrics()));
    }

    #[test]
    fn test_errors_are_counted() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        let config = SimulationConfig {
            error_rate: 1.0,
            ..calm()
        };
        driver.set_status(SimulationStatus::Running, Instant::now(), &mut sink);
        for _ in 0..7 {
            driver.tick(&config, &mut sink);
        }
        // the wait step is errored too, so every tick emits
        assert_eq!(sink.spans.len(), 7);
        assert_eq!(driver.metrics().error_count, 7);
    }

    #[test]
    fn test_pause_holds_state() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        let start = Instant::now();
        driver.set_status(SimulationStatus::Running, start, &mut sink);
        driver.tick(&calm(), &mut sink);
        driver.tick(&calm(), &mut sink);

        driver.set_status(SimulationStatus::Paused, start, &mut sink);
        let emitted = sink.spans.len();
        for secs in [2, 10, 600] {
            assert_eq!(
                driver.poll(start + Duration::from_secs(secs), &calm(), &mut sink),
                TickOutcome::Inactive
            );
        }
        assert_eq!(sink.spans.len(), emitted);
        assert_eq!(driver.step(), 2);

        // resume picks up where it left off
        let resumed = start + Duration::from_secs(700);
        driver.set_status(SimulationStatus::Running, resumed, &mut sink);
        match driver.poll(resumed + DEFAULT_TICK_INTERVAL, &calm(), &mut sink) {
            TickOutcome::Emitted(span) => assert_eq!(span.span_type, SpanType::Tool),
            other => panic!("expected span, got {:?}", other),
        }
    }

    #[test]
    fn test_idle_resets_once() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        let now = Instant::now();
        driver.set_status(SimulationStatus::Running, now, &mut sink);
        driver.tick(&calm(), &mut sink);
        driver.tick(&calm(), &mut sink);
        assert_eq!(driver.spans().count(), 2);

        assert!(driver.set_status(SimulationStatus::Idle, now, &mut sink));
        assert!(!driver.set_status(SimulationStatus::Idle, now, &mut sink));
        assert_eq!(sink.stops, 1);
        assert_eq!(driver.step(), 0);
        assert!(driver.metrics().is_zero());
        assert_eq!(driver.spans().count(), 0);

        // from paused as well
        driver.set_status(SimulationStatus::Running, now, &mut sink);
        driver.set_status(SimulationStatus::Paused, now, &mut sink);
        driver.set_status(SimulationStatus::Idle, now, &mut sink);
        assert_eq!(sink.stops, 2);
    }

    #[test]
    fn test_accumulator_is_bounded_newest_first() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        driver.set_status(SimulationStatus::Running, Instant::now(), &mut sink);
        for _ in 0..80 {
            driver.tick(&calm(), &mut sink);
        }
        assert_eq!(driver.spans().count(), SPAN_CAPACITY);
        let newest = driver.spans().next().unwrap();
        assert_eq!(newest.id, sink.spans.last().unwrap().id);
    }

    #[test]
    fn test_config_change_applies_to_next_tick() {
        let mut driver = driver();
        let mut sink = RecordingSink::default();
        driver.set_status(SimulationStatus::Running, Instant::now(), &mut sink);

        driver.tick(&calm(), &mut sink);
        assert_eq!(sink.spans[0].span_type, SpanType::User);

        let chaotic = SimulationConfig {
            error_rate: 1.0,
            ..calm()
        };
        driver.tick(&chaotic, &mut sink);
        assert_eq!(sink.spans[1].span_type, SpanType::Error);
        // earlier spans are untouched
        assert_eq!(sink.spans[0].span_type, SpanType::User);
    }
}
