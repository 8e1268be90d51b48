//! Messages exchanged with the inference worker thread.
//!
//! Requests and replies serialize as `{"type": ..., "data": ...}`. Generation requests
//! carry a [`RequestId`] that the worker echoes back so completions and failures can be
//! matched to the request that caused them.

use serde::{Deserialize, Serialize};

/// Correlates a generation request with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Main thread -> worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WorkerRequest {
    /// Load the pipeline if it is not loaded yet
    Init,
    /// Run one generation
    Generate { request_id: RequestId, prompt: String },
}

/// Worker -> main thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WorkerReply {
    /// Model download/load progress
    Progress(LoadProgress),
    /// Pipeline is loaded and reusable
    Ready,
    /// Generation finished; `output` is the pipeline's opaque result
    Complete {
        request_id: RequestId,
        output: serde_json::Value,
    },
    /// Load or generation failed; `request_id` is set for generation failures
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        message: String,
    },
}

/// Observable progress of a model load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadProgress {
    pub status: String,
    pub name: String,
    pub file: String,
    /// Percentage in [0, 100]
    pub progress: f64,
    pub loaded: u64,
    pub total: u64,
}

impl LoadProgress {
    /// Build a progress record, computing the percentage from byte counts.
    pub fn new(
        status: impl Into<String>,
        name: impl Into<String>,
        file: impl Into<String>,
        loaded: u64,
        total: u64,
    ) -> Self {
        let progress = if total > 0 {
            (loaded as f64 / total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            status: status.into(),
            name: name.into(),
            file: file.into(),
            progress,
            loaded,
            total,
        }
    }
}

/// Fallback span content when the pipeline output has no generated text.
pub const NO_OUTPUT: &str = "No output";

/// Pull the generated text out of the first result entry.
pub fn generated_text(output: &serde_json::Value) -> Option<&str> {
    output
        .get(0)
        .and_then(|entry| entry.get("generated_text"))
        .and_then(|text| text.as_str())
}
