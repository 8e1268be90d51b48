//! Core domain types for agentscope
//!
//! These are the passive shapes shared by every producer (scenario generator,
//! simulation driver, local agent) and every consumer (dashboard state, renderers,
//! headless printers).
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Span** | One discrete recorded event in an agent's execution trace |
//! | **Drift** | A probability-gated synthetic flag for semantic divergence |
//! | **Chaos config** | User-tunable latency, error and drift parameters |
//!
//! The serialized form uses the camelCase wire names (`latencyMs`, `tokenCount`, ...),
//! with optional measurements omitted when absent. Absence means "not applicable",
//! never zero.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================
// Trace Spans
// ============================================

/// Kind of event a span records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanType {
    User,
    Agent,
    Tool,
    Error,
}

impl SpanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanType::User => "user",
            SpanType::Agent => "agent",
            SpanType::Tool => "tool",
            SpanType::Error => "error",
        }
    }
}

/// Scalar value stored in span metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            MetadataValue::Text(s) => s.parse().ok(),
            MetadataValue::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Number(n) => write!(f, "{}", n),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// Metadata keys written by producers.
pub mod metadata_keys {
    /// Drift magnitude (0 when no drift was flagged)
    pub const DRIFT: &str = "drift";
    /// Human-readable drift warning
    pub const WARNING: &str = "warning";
    /// Model that produced a local agent span
    pub const MODEL: &str = "model";
}

/// One observed event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSpan {
    /// Unique identifier generated at creation
    pub id: String,
    /// Creation time (epoch milliseconds)
    pub timestamp: i64,
    /// Event kind
    #[serde(rename = "type")]
    pub span_type: SpanType,
    /// Human-readable payload
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, MetadataValue>>,
}

impl TraceSpan {
    /// Create a span stamped with a fresh id and the current time.
    pub fn new(span_type: SpanType, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            span_type,
            content: content.into(),
            latency_ms: None,
            token_count: None,
            cost: None,
            metadata: None,
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_tokens(mut self, token_count: u64) -> Self {
        self.token_count = Some(token_count);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Drift magnitude recorded on this span, 0 when absent.
    pub fn drift(&self) -> f64 {
        self.metadata_value(metadata_keys::DRIFT)
            .and_then(MetadataValue::as_f64)
            .unwrap_or(0.0)
    }

    pub fn warning(&self) -> Option<&str> {
        self.metadata_value(metadata_keys::WARNING)
            .and_then(MetadataValue::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.span_type == SpanType::Error
    }

    /// True if the span carries a non-zero token count or latency.
    pub fn is_measured(&self) -> bool {
        self.token_count.unwrap_or(0) > 0 || self.latency_ms.unwrap_or(0) > 0
    }
}

// ============================================
// Metrics
// ============================================

/// Weight kept from the previous latency average on each update.
pub const LATENCY_EWMA_DECAY: f64 = 0.9;

/// Rolling aggregate over accepted spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetric {
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Exponentially-weighted moving average of latency, seeded at 0
    pub avg_latency: f64,
    /// Running count of error spans. Not normalized; the wire name is kept as `errorRate`.
    #[serde(rename = "errorRate")]
    pub error_count: u64,
    /// Time of last update (epoch milliseconds)
    pub timestamp: i64,
}

impl Default for AgentMetric {
    fn default() -> Self {
        Self::zero()
    }
}

impl AgentMetric {
    /// All-zero metrics stamped with the current time.
    pub fn zero() -> Self {
        Self {
            total_tokens: 0,
            total_cost: 0.0,
            avg_latency: 0.0,
            error_count: 0,
            timestamp: now_millis(),
        }
    }

    /// True if every aggregate is at its reset value.
    pub fn is_zero(&self) -> bool {
        self.total_tokens == 0
            && self.total_cost == 0.0
            && self.avg_latency == 0.0
            && self.error_count == 0
    }

    /// Fold one span into the aggregate, returning the updated snapshot.
    pub fn fold(&self, span: &TraceSpan) -> AgentMetric {
        let latency = span.latency_ms.unwrap_or(0) as f64;
        AgentMetric {
            total_tokens: self.total_tokens + span.token_count.unwrap_or(0),
            total_cost: self.total_cost + span.cost.unwrap_or(0.0),
            avg_latency: self.avg_latency * LATENCY_EWMA_DECAY
                + latency * (1.0 - LATENCY_EWMA_DECAY),
            error_count: if span.is_error() {
                self.error_count + 1
            } else {
                self.error_count
            },
            timestamp: now_millis(),
        }
    }
}

// ============================================
// Chaos Config
// ============================================

/// Chaos parameters read by the scenario generator on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    /// Scales base latency (>= 0)
    #[serde(default = "default_latency_multiplier")]
    pub latency_multiplier: f64,
    /// Probability in [0, 1] that a step becomes an error
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
    /// Probability in [0, 1] that a step is flagged with drift; doubles as the magnitude
    #[serde(default)]
    pub drift_level: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency_multiplier: default_latency_multiplier(),
            error_rate: default_error_rate(),
            drift_level: 0.0,
        }
    }
}

fn default_latency_multiplier() -> f64 {
    1.0
}

fn default_error_rate() -> f64 {
    0.05
}

impl SimulationConfig {
    /// No injected errors or drift at normal latency.
    pub fn low_chaos() -> Self {
        Self {
            latency_multiplier: 1.0,
            error_rate: 0.0,
            drift_level: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.latency_multiplier.is_nan() || self.latency_multiplier < 0.0 {
            return Err(Error::Config(
                "chaos.latency_multiplier must be >= 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(Error::Config(
                "chaos.error_rate must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.drift_level) {
            return Err(Error::Config(
                "chaos.drift_level must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================
// Sinks
// ============================================

/// Consumer of producer events.
///
/// Producers call these synchronously from the event loop; implementations must not block.
pub trait TraceSink {
    /// Called once per emitted span.
    fn on_span(&mut self, span: TraceSpan);

    /// Called after every accepted simulated span with the updated aggregate.
    fn on_metrics(&mut self, _metrics: &AgentMetric) {}

    /// Called exactly once each time the simulation driver enters idle.
    fn on_stop(&mut self) {}
}

/// Sink that records everything it receives, newest last.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub spans: Vec<TraceSpan>,
    pub metrics: Vec<AgentMetric>,
    pub stops: usize,
}

impl TraceSink for RecordingSink {
    fn on_span(&mut self, span: TraceSpan) {
        self.spans.push(span);
    }

    fn on_metrics(&mut self, metrics: &AgentMetric) {
        self.metrics.push(metrics.clone());
    }

    fn on_stop(&mut self) {
        self.stops += 1;
    }
}
