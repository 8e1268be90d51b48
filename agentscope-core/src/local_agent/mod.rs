//! Local agent coordinator.
//!
//! Drives a real model through the background [`InferenceWorker`]:
//!
//! ```text
//! idle -> loading -> ready <-> running
//!            |                   |
//!            +------> error <----+ (load failure or lost worker)
//! ```
//!
//! The worker handle is created lazily on the first [`LocalAgent::load_model`] and lives as
//! long as the coordinator, so the model is loaded at most once per session.
//!
//! Every generation request gets a [`RequestId`]; replies are matched against the pending
//! table, so latency and span attribution stay exact even if a second prompt is submitted
//! before the first completes.
//!
//! **Flexible mode** is a self-sustaining loop: after each completed generation, if the
//! coordinator is still flexible, another prompt from [`FLEXIBLE_PROMPTS`] is scheduled
//! after a short delay. The check is made both when scheduling and when the scheduled run
//! fires, against the current mode.

pub mod pipeline;
pub mod protocol;
pub mod worker;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::LocalAgentConfig;
use crate::error::{Error, Result};
use crate::types::{metadata_keys, SpanType, TraceSink, TraceSpan};

pub use pipeline::{create_default_loader, InferencePipeline, PipelineLoader};
pub use protocol::{LoadProgress, RequestId, WorkerReply, WorkerRequest};
pub use worker::InferenceWorker;

/// Prompt issued when flexible mode is switched on.
pub const FLEXIBLE_SEED_PROMPT: &str = "2 + 2";

/// Prompts the flexible loop picks from.
pub const FLEXIBLE_PROMPTS: [&str; 10] = [
    "Hi",
    "Answer yes or no: fire hot?",
    "2 + 2 =",
    "Say the word OK",
    "Which is larger: 9 or 12?",
    "Reverse the word: model",
    "If x = 3, what is x * 4 + 2?",
    "A cat is an animal. Is a cat a plant? Answer yes or no.",
    "Summarize in one sentence: The sun rises in the east and sets in the west.",
    "John has 3 apples. He buys 2 more, then gives 1 away. How many apples does he have? Answer with a number only.",
];

/// Placeholder content emitted while a generation is in flight.
pub const THINKING_CONTENT: &str = "Agent is running local inference (Worker)...";

/// Model lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Running,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Loading => "loading",
            AgentStatus::Ready => "ready",
            AgentStatus::Running => "running",
            AgentStatus::Error => "error",
        }
    }
}

/// Whether prompts come from the user or from the flexible loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentMode {
    #[default]
    Manual,
    Flexible,
}

#[derive(Debug, Clone)]
struct PendingRequest {
    started: Instant,
    prompt: String,
}

/// Coordinates the inference worker and turns its replies into spans.
pub struct LocalAgent {
    status: AgentStatus,
    progress: Option<LoadProgress>,
    mode: AgentMode,
    flexible_running: bool,
    loader: Option<Box<dyn PipelineLoader>>,
    worker: Option<InferenceWorker>,
    pending: HashMap<RequestId, PendingRequest>,
    next_request_id: u64,
    scheduled_run: Option<Instant>,
    flexible_delay: Duration,
    model_label: String,
    rng: StdRng,
}

impl LocalAgent {
    /// Coordinator for the configured Ollama model.
    pub fn new(config: &LocalAgentConfig) -> Self {
        Self::with_loader(
            create_default_loader(config),
            config.model_label(),
            config.flexible_delay(),
        )
    }

    /// Coordinator around a custom pipeline loader.
    pub fn with_loader(
        loader: Box<dyn PipelineLoader>,
        model_label: impl Into<String>,
        flexible_delay: Duration,
    ) -> Self {
        Self {
            status: AgentStatus::Idle,
            progress: None,
            mode: AgentMode::Manual,
            flexible_running: false,
            loader: Some(loader),
            worker: None,
            pending: HashMap::new(),
            next_request_id: 0,
            scheduled_run: None,
            flexible_delay,
            model_label: model_label.into(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed the RNG used to pick flexible-loop prompts.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn progress(&self) -> Option<&LoadProgress> {
        self.progress.as_ref()
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn is_flexible_running(&self) -> bool {
        self.flexible_running
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// When the flexible loop will next submit, if scheduled.
    pub fn scheduled_run(&self) -> Option<Instant> {
        self.scheduled_run
    }

    pub fn model_label(&self) -> &str {
        &self.model_label
    }

    /// Request model initialization.
    ///
    /// Only acts from `idle` or `error`; returns false (and sends nothing) otherwise.
    pub fn load_model(&mut self) -> Result<bool> {
        if !matches!(self.status, AgentStatus::Idle | AgentStatus::Error) {
            return Ok(false);
        }

        self.ensure_worker()?.send(WorkerRequest::Init)?;
        self.status = AgentStatus::Loading;
        tracing::info!(model = %self.model_label, "Loading local model");
        Ok(true)
    }

    /// Submit a prompt.
    ///
    /// Emits the user span and a thinking placeholder, then dispatches the request and
    /// returns without waiting; the answer arrives through [`LocalAgent::poll`].
    pub fn run_agent(
        &mut self,
        prompt: &str,
        now: Instant,
        sink: &mut dyn TraceSink,
    ) -> Result<RequestId> {
        if !matches!(self.status, AgentStatus::Ready | AgentStatus::Running) {
            return Err(Error::AgentNotReady {
                status: self.status.as_str().to_string(),
            });
        }

        let request_id = RequestId(self.next_request_id);
        self.next_request_id += 1;

        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| Error::Worker("worker not started".to_string()))?;
        worker.send(WorkerRequest::Generate {
            request_id,
            prompt: prompt.to_string(),
        })?;

        self.status = AgentStatus::Running;
        self.pending.insert(
            request_id,
            PendingRequest {
                started: now,
                prompt: prompt.to_string(),
            },
        );

        sink.on_span(TraceSpan::new(SpanType::User, prompt));
        sink.on_span(TraceSpan::new(SpanType::Agent, THINKING_CONTENT));

        tracing::debug!(%request_id, prompt = %prompt, "Generation requested");
        Ok(request_id)
    }

    /// Flip between manual and flexible mode.
    ///
    /// Turning flexible on while ready immediately submits [`FLEXIBLE_SEED_PROMPT`].
    pub fn toggle_flexible_mode(&mut self, now: Instant, sink: &mut dyn TraceSink) -> Result<()> {
        match self.mode {
            AgentMode::Manual => {
                self.mode = AgentMode::Flexible;
                self.flexible_running = true;
                tracing::info!("Flexible mode on");
                if self.status == AgentStatus::Ready {
                    self.run_agent(FLEXIBLE_SEED_PROMPT, now, sink)?;
                }
            }
            AgentMode::Flexible => self.stop(),
        }
        Ok(())
    }

    /// Leave flexible mode. In-flight generations still complete and emit their spans.
    pub fn stop(&mut self) {
        if self.mode == AgentMode::Flexible || self.scheduled_run.is_some() {
            tracing::info!("Flexible mode off");
        }
        self.mode = AgentMode::Manual;
        self.flexible_running = false;
        self.scheduled_run = None;
    }

    fn in_flexible_loop(&self) -> bool {
        self.flexible_running && self.mode == AgentMode::Flexible
    }

    /// Drain worker replies and fire a due flexible-loop run.
    ///
    /// A worker thread that has gone away counts as a failure: the agent moves to `error`
    /// with a worker error span. Returns the number of replies handled.
    pub fn poll(&mut self, now: Instant, sink: &mut dyn TraceSink) -> Result<usize> {
        let mut handled = 0;
        loop {
            let received = match &self.worker {
                Some(worker) => worker.try_recv(),
                None => Ok(None),
            };
            match received {
                Ok(Some(reply)) => {
                    self.handle_reply(reply, now, sink);
                    handled += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    self.worker_exited(&e, sink);
                    break;
                }
            }
        }

        self.fire_scheduled(now, sink)?;
        Ok(handled)
    }

    /// Block up to `timeout` for one worker reply and handle it.
    ///
    /// Used by headless callers that have no event loop of their own.
    pub fn wait_for_reply(&mut self, timeout: Duration, sink: &mut dyn TraceSink) -> Result<bool> {
        let received = match &self.worker {
            Some(worker) => worker.recv_timeout(timeout),
            None => return Ok(false),
        };
        match received {
            Ok(Some(reply)) => {
                self.handle_reply(reply, Instant::now(), sink);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.worker_exited(&e, sink);
                Ok(true)
            }
        }
    }

    /// Fail everything in flight after the worker thread disappeared.
    ///
    /// The loader went down with the thread, so a later [`LocalAgent::load_model`] reports
    /// an error instead of respawning.
    fn worker_exited(&mut self, cause: &Error, sink: &mut dyn TraceSink) {
        tracing::error!(error = %cause, pending = self.pending.len(), "Inference worker exited");
        self.worker = None;
        self.pending.clear();
        self.scheduled_run = None;
        self.fail(None, "inference worker exited".to_string(), sink);
    }

    fn fire_scheduled(&mut self, now: Instant, sink: &mut dyn TraceSink) -> Result<()> {
        let due = matches!(self.scheduled_run, Some(at) if now >= at);
        if !due {
            return Ok(());
        }
        self.scheduled_run = None;

        if !self.in_flexible_loop() {
            return Ok(());
        }
        if !matches!(self.status, AgentStatus::Ready | AgentStatus::Running) {
            tracing::debug!(status = self.status.as_str(), "Skipping flexible run");
            return Ok(());
        }
        let prompt = FLEXIBLE_PROMPTS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(FLEXIBLE_SEED_PROMPT);
        self.run_agent(prompt, now, sink)?;
        Ok(())
    }

    /// Apply one worker reply.
    pub fn handle_reply(&mut self, reply: WorkerReply, now: Instant, sink: &mut dyn TraceSink) {
        match reply {
            WorkerReply::Progress(progress) => {
                if self.status == AgentStatus::Loading {
                    self.progress = Some(progress);
                }
            }
            WorkerReply::Ready => {
                if self.status == AgentStatus::Loading {
                    self.status = AgentStatus::Ready;
                }
                self.progress = None;
                tracing::info!(model = %self.model_label, "Local model ready");
            }
            WorkerReply::Complete { request_id, output } => {
                self.complete_generation(request_id, &output, now, sink);
            }
            WorkerReply::Error {
                request_id,
                message,
            } => self.fail(request_id, message, sink),
        }
    }

    fn complete_generation(
        &mut self,
        request_id: RequestId,
        output: &serde_json::Value,
        now: Instant,
        sink: &mut dyn TraceSink,
    ) {
        let pending = self.pending.remove(&request_id);
        let latency_ms = pending
            .as_ref()
            .map(|p| now.saturating_duration_since(p.started).as_millis() as u64)
            .unwrap_or(0);
        let text = protocol::generated_text(output).unwrap_or(protocol::NO_OUTPUT);
        let token_count = (text.chars().count() / 4) as u64;

        tracing::info!(
            %request_id,
            latency_ms,
            token_count,
            prompt = pending.as_ref().map(|p| p.prompt.as_str()).unwrap_or(""),
            "Generation complete"
        );

        sink.on_span(
            TraceSpan::new(SpanType::Agent, text)
                .with_latency(latency_ms)
                .with_tokens(token_count)
                .with_cost(0.0)
                .with_metadata(metadata_keys::MODEL, self.model_label.as_str()),
        );

        self.settle_running();

        if self.in_flexible_loop() {
            self.scheduled_run = Some(now + self.flexible_delay);
            tracing::debug!(delay_ms = self.flexible_delay.as_millis() as u64, "Next flexible run scheduled");
        }
    }

    fn fail(&mut self, request_id: Option<RequestId>, message: String, sink: &mut dyn TraceSink) {
        let message = if message.is_empty() {
            "Unknown".to_string()
        } else {
            message
        };
        sink.on_span(TraceSpan::new(
            SpanType::Error,
            format!("Worker Error: {}", message),
        ));

        match request_id.and_then(|id| self.pending.remove(&id).map(|_| id)) {
            Some(id) => {
                tracing::warn!(request_id = %id, error = %message, "Generation failed");
                self.settle_running();
            }
            None => {
                tracing::error!(error = %message, "Local model failed");
                self.status = AgentStatus::Error;
                self.progress = None;
            }
        }
    }

    /// Return to ready once nothing is in flight, without clobbering other states.
    fn settle_running(&mut self) {
        if self.status == AgentStatus::Running && self.pending.is_empty() {
            self.status = AgentStatus::Ready;
        }
    }

    fn ensure_worker(&mut self) -> Result<&InferenceWorker> {
        if self.worker.is_none() {
            let loader = self
                .loader
                .take()
                .ok_or_else(|| {
                    Error::Worker("inference worker exited, restart to load again".to_string())
                })?;
            self.worker = Some(InferenceWorker::spawn(loader)?);
        }
        self.worker
            .as_ref()
            .ok_or_else(|| Error::Worker("worker not started".to_string()))
    }
}
