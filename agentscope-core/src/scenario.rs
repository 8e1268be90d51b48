//! Scripted agent scenario with chaos injection.
//!
//! A fixed seven-step narrative (question, thinking, tool call, tool result, analysis,
//! final answer, wait) is replayed in a loop. Each call to [`generate`] turns one step into
//! a span, perturbed by the chaos config:
//!
//! - **Errors**: with probability `error_rate` the step becomes an error span with fixed
//!   content, whatever its nominal kind (including the wait step).
//! - **Latency**: non-zero base latencies get ±100 ms of uniform noise, are scaled by
//!   `latency_multiplier`, floored and clamped at 0.
//! - **Drift**: with probability `drift_level` the span carries a warning and the drift
//!   level as magnitude; otherwise it carries `drift: 0`.
//!
//! Randomness is drawn from the caller's RNG in a fixed order (error, noise, drift) so a
//! seeded RNG replays the same trace.

use rand::Rng;

use crate::types::{metadata_keys, SimulationConfig, SpanType, TraceSpan};

/// Content of every injected error span.
pub const ERROR_CONTENT: &str = "Error: Connection Timeout on DB Shard 04";

/// Warning attached to drifted spans.
pub const DRIFT_WARNING: &str = "Drift Detected: Semantic Score < 0.7";

/// Fake per-token price ($0.03 per 1k tokens).
pub const COST_PER_TOKEN: f64 = 0.00003;

/// Half-width of the uniform latency noise in milliseconds.
const LATENCY_JITTER_MS: f64 = 100.0;

/// Nominal kind of a scenario step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    User,
    Agent,
    Tool,
    /// Idle pause; never reaches consumers unless an error overrides it
    Wait,
}

impl StepKind {
    fn span_type(self) -> Option<SpanType> {
        match self {
            StepKind::User => Some(SpanType::User),
            StepKind::Agent => Some(SpanType::Agent),
            StepKind::Tool => Some(SpanType::Tool),
            StepKind::Wait => None,
        }
    }
}

/// One step of the scripted scenario.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioStep {
    pub kind: StepKind,
    pub content: &'static str,
    pub latency_ms: u64,
    pub tokens: u64,
}

/// The scripted scenario, replayed by step index modulo its length.
pub const SCENARIO: [ScenarioStep; 7] = [
    ScenarioStep {
        kind: StepKind::User,
        content: "Can you analyze the sales data for Q3?",
        latency_ms: 0,
        tokens: 0,
    },
    ScenarioStep {
        kind: StepKind::Agent,
        content: "Thinking... identifying necessary tools.",
        latency_ms: 450,
        tokens: 20,
    },
    ScenarioStep {
        kind: StepKind::Tool,
        content: "Tool Call: Database.query('SELECT * FROM sales WHERE quarter=3')",
        latency_ms: 1200,
        tokens: 55,
    },
    ScenarioStep {
        kind: StepKind::Tool,
        content: "Tool Result: Returned 1,405 rows. (Data Frame)",
        latency_ms: 150,
        tokens: 500,
    },
    ScenarioStep {
        kind: StepKind::Agent,
        content: "Analyzing data patterns and calculating growth...",
        latency_ms: 2100,
        tokens: 300,
    },
    ScenarioStep {
        kind: StepKind::Agent,
        content: "Final Answer: Q3 sales were up 15% YoY, driven primarily by the Enterprise sector.",
        latency_ms: 600,
        tokens: 150,
    },
    ScenarioStep {
        kind: StepKind::Wait,
        content: "Waiting for user...",
        latency_ms: 3000,
        tokens: 0,
    },
];

/// Number of steps before the scenario repeats.
pub const SCENARIO_LEN: u64 = SCENARIO.len() as u64;

/// Nominal step for an index.
pub fn nominal_step(step_index: u64) -> &'static ScenarioStep {
    &SCENARIO[(step_index % SCENARIO_LEN) as usize]
}

/// Result of generating one scenario step.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    /// A span for consumers
    Span(TraceSpan),
    /// The wait step came up un-errored; nothing is emitted
    Wait,
}

impl Generated {
    pub fn into_span(self) -> Option<TraceSpan> {
        match self {
            Generated::Span(span) => Some(span),
            Generated::Wait => None,
        }
    }
}

/// Generate the span for `step_index` under `config`.
///
/// Reads only its arguments; safe to call repeatedly from anywhere.
pub fn generate<R: Rng + ?Sized>(
    step_index: u64,
    config: &SimulationConfig,
    rng: &mut R,
) -> Generated {
    let step = nominal_step(step_index);

    let is_error = rng.gen::<f64>() < config.error_rate;

    let latency_ms = if step.latency_ms > 0 {
        let noise = rng.gen::<f64>() * (2.0 * LATENCY_JITTER_MS) - LATENCY_JITTER_MS;
        let scaled = (step.latency_ms as f64 + noise) * config.latency_multiplier;
        scaled.floor().max(0.0) as u64
    } else {
        0
    };

    let is_drift = config.drift_level > 0.0 && rng.gen::<f64>() < config.drift_level;

    let (span_type, content) = if is_error {
        (SpanType::Error, ERROR_CONTENT)
    } else {
        match step.kind.span_type() {
            Some(span_type) => (span_type, step.content),
            None => return Generated::Wait,
        }
    };

    let span = TraceSpan::new(span_type, content)
        .with_latency(latency_ms)
        .with_tokens(step.tokens)
        .with_cost(step.tokens as f64 * COST_PER_TOKEN);

    let span = if is_drift {
        span.with_metadata(metadata_keys::WARNING, DRIFT_WARNING)
            .with_metadata(metadata_keys::DRIFT, config.drift_level)
    } else {
        span.with_metadata(metadata_keys::DRIFT, 0.0)
    };

    Generated::Span(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn calm() -> SimulationConfig {
        SimulationConfig {
            latency_multiplier: 1.0,
            error_rate: 0.0,
            drift_level: 0.0,
        }
    }

    #[test]
    fn test_calm_config_follows_script() {
        let mut rng = StdRng::seed_from_u64(7);
        for step_index in 0..21 {
            let nominal = nominal_step(step_index);
            match generate(step_index, &calm(), &mut rng) {
                Generated::Span(span) => {
                    assert_eq!(Some(span.span_type), nominal.kind.span_type());
                    assert_eq!(span.content, nominal.content);
                    assert_eq!(span.drift(), 0.0);
                    assert!(span.warning().is_none());
                    assert_eq!(span.token_count, Some(nominal.tokens));
                }
                Generated::Wait => assert_eq!(nominal.kind, StepKind::Wait),
            }
        }
    }

    #[test]
    fn test_first_step_has_no_latency_or_cost() {
        let mut rng = StdRng::seed_from_u64(1);
        let span = generate(0, &calm(), &mut rng).into_span().unwrap();
        assert_eq!(span.span_type, SpanType::User);
        assert_eq!(span.content, "Can you analyze the sales data for Q3?");
        assert_eq!(span.latency_ms, Some(0));
        assert_eq!(span.token_count, Some(0));
        assert_eq!(span.cost, Some(0.0));
    }

    #[test]
    fn test_zero_latency_step_ignores_multiplier() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = SimulationConfig {
            latency_multiplier: 5.0,
            ..calm()
        };
        let span = generate(7, &config, &mut rng).into_span().unwrap();
        assert_eq!(span.latency_ms, Some(0));
    }

    #[test]
    fn test_latency_within_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let span = generate(2, &calm(), &mut rng).into_span().unwrap();
            let latency = span.latency_ms.unwrap();
            assert!((1100..=1300).contains(&latency), "latency {}", latency);
        }
    }

    #[test]
    fn test_latency_never_negative_with_tiny_multiplier() {
        let mut rng = StdRng::seed_from_u64(4);
        let config = SimulationConfig {
            latency_multiplier: 0.0,
            error_rate: 0.5,
            drift_level: 0.5,
        };
        for step_index in 0..100 {
            if let Generated::Span(span) = generate(step_index, &config, &mut rng) {
                assert_eq!(span.latency_ms, Some(0));
            }
        }
    }

    #[test]
    fn test_full_error_rate_overrides_every_step() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = SimulationConfig {
            error_rate: 1.0,
            ..calm()
        };
        for step_index in 0..14 {
            let span = generate(step_index, &config, &mut rng)
                .into_span()
                .expect("errors are never filtered as waits");
            assert_eq!(span.span_type, SpanType::Error);
            assert_eq!(span.content, ERROR_CONTENT);
        }
    }

    #[test]
    fn test_full_drift_level_flags_every_span() {
        let mut rng = StdRng::seed_from_u64(6);
        let config = SimulationConfig {
            drift_level: 1.0,
            ..calm()
        };
        for step_index in 0..6 {
            let span = generate(step_index, &config, &mut rng).into_span().unwrap();
            assert_eq!(span.warning(), Some(DRIFT_WARNING));
            assert_eq!(span.drift(), 1.0);
        }
    }

    #[test]
    fn test_cost_uses_fixed_token_rate() {
        let mut rng = StdRng::seed_from_u64(8);
        let span = generate(3, &calm(), &mut rng).into_span().unwrap();
        assert_eq!(span.token_count, Some(500));
        assert!((span.cost.unwrap() - 0.015).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_repeats_every_seven_steps() {
        let mut rng = StdRng::seed_from_u64(9);
        for step_index in 0..SCENARIO_LEN {
            let a = generate(step_index, &calm(), &mut rng);
            let b = generate(step_index + SCENARIO_LEN, &calm(), &mut rng);
            match (a, b) {
                (Generated::Span(a), Generated::Span(b)) => {
                    assert_eq!(a.span_type, b.span_type);
                    assert_eq!(a.content, b.content);
                }
                (Generated::Wait, Generated::Wait) => {}
                other => panic!("step {} diverged: {:?}", step_index, other),
            }
        }
    }

    #[test]
    fn test_seeded_rng_replays_trace() {
        let config = SimulationConfig {
            latency_multiplier: 1.3,
            error_rate: 0.3,
            drift_level: 0.4,
        };
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for step_index in 0..30 {
            let left = generate(step_index, &config, &mut a).into_span();
            let right = generate(step_index, &config, &mut b).into_span();
            match (left, right) {
                (Some(l), Some(r)) => {
                    assert_eq!(l.span_type, r.span_type);
                    assert_eq!(l.latency_ms, r.latency_ms);
                    assert_eq!(l.metadata, r.metadata);
                }
                (None, None) => {}
                _ => panic!("seeded runs diverged at step {}", step_index),
            }
        }
    }
}
