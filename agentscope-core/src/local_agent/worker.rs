//! Background inference worker.
//!
//! One OS thread owns the pipeline loader and, once loaded, the single pipeline instance.
//! Requests are processed in arrival order; replies flow back over a channel that the
//! coordinator drains from the event loop. Dropping the handle closes the request channel
//! and lets the thread exit after its current request.
//!
//! A panic inside the loader or pipeline is reported as an error reply and the pipeline is
//! discarded, so the next request loads it again.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use super::pipeline::{InferencePipeline, PipelineLoader};
use super::protocol::{WorkerReply, WorkerRequest};
use crate::error::{Error, Result};

/// Owned handle to the worker thread.
pub struct InferenceWorker {
    requests: Option<Sender<WorkerRequest>>,
    replies: Receiver<WorkerReply>,
    thread: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Spawn the worker thread around `loader`.
    pub fn spawn(loader: Box<dyn PipelineLoader>) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (reply_tx, reply_rx) = mpsc::channel::<WorkerReply>();

        let thread = std::thread::Builder::new()
            .name("agentscope-inference".to_string())
            .spawn(move || run_worker(loader, request_rx, reply_tx))?;

        tracing::info!("Inference worker spawned");

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            thread: Some(thread),
        })
    }

    /// Queue a request for the worker.
    pub fn send(&self, request: WorkerRequest) -> Result<()> {
        self.requests
            .as_ref()
            .ok_or_else(|| Error::Worker("worker is shut down".to_string()))?
            .send(request)
            .map_err(|_| Error::Worker("worker thread has exited".to_string()))
    }

    /// Next reply if one is waiting.
    pub fn try_recv(&self) -> Result<Option<WorkerReply>> {
        match self.replies.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(Error::Worker("worker thread has exited".to_string()))
            }
        }
    }

    /// Block up to `timeout` for the next reply.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkerReply>> {
        match self.replies.recv_timeout(timeout) {
            Ok(reply) => Ok(Some(reply)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Worker("worker thread has exited".to_string()))
            }
        }
    }
}

#[cfg(test)]
impl InferenceWorker {
    /// Handle whose thread is already gone.
    pub(crate) fn exited() -> Self {
        let (requests, _) = mpsc::channel();
        let (_, replies) = mpsc::channel();
        Self {
            requests: Some(requests),
            replies,
            thread: None,
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the in-flight request finishes.
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.is_finished() {
                let _ = thread.join();
            }
        }
    }
}

fn run_worker(
    mut loader: Box<dyn PipelineLoader>,
    requests: Receiver<WorkerRequest>,
    replies: Sender<WorkerReply>,
) {
    let mut pipeline: Option<Box<dyn InferencePipeline>> = None;

    for request in requests {
        let request_id = match &request {
            WorkerRequest::Generate { request_id, .. } => Some(*request_id),
            WorkerRequest::Init => None,
        };

        // A panicking loader or pipeline must not take the thread down with it
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            process(request, &mut pipeline, loader.as_mut(), &replies)
        }));
        let reply = match outcome {
            Ok(reply) => reply,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(?request_id, error = %message, "Inference pipeline panicked");
                pipeline = None;
                WorkerReply::Error {
                    request_id,
                    message,
                }
            }
        };

        if replies.send(reply).is_err() {
            break;
        }
    }

    tracing::info!("Inference worker stopped");
}

fn process(
    request: WorkerRequest,
    pipeline: &mut Option<Box<dyn InferencePipeline>>,
    loader: &mut dyn PipelineLoader,
    replies: &Sender<WorkerReply>,
) -> WorkerReply {
    match request {
        WorkerRequest::Init => match ensure_loaded(pipeline, loader, replies) {
            Ok(_) => WorkerReply::Ready,
            Err(e) => {
                tracing::error!(error = %e, "Model load failed");
                WorkerReply::Error {
                    request_id: None,
                    message: e.to_string(),
                }
            }
        },
        WorkerRequest::Generate { request_id, prompt } => {
            let result =
                ensure_loaded(pipeline, loader, replies).and_then(|p| p.generate(&prompt));
            match result {
                Ok(output) => WorkerReply::Complete { request_id, output },
                Err(e) => {
                    tracing::warn!(%request_id, error = %e, "Generation failed");
                    WorkerReply::Error {
                        request_id: Some(request_id),
                        message: e.to_string(),
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("pipeline panicked: {}", detail)
}

/// Load the pipeline on first use; later calls reuse the same instance.
fn ensure_loaded<'a>(
    pipeline: &'a mut Option<Box<dyn InferencePipeline>>,
    loader: &mut dyn PipelineLoader,
    replies: &Sender<WorkerReply>,
) -> Result<&'a mut Box<dyn InferencePipeline>> {
    if pipeline.is_none() {
        let loaded = loader.load(&mut |progress| {
            let _ = replies.send(WorkerReply::Progress(progress));
        })?;
        tracing::info!("Inference pipeline loaded");
        *pipeline = Some(loaded);
    }
    pipeline
        .as_mut()
        .ok_or_else(|| Error::Worker("pipeline missing after load".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_agent::protocol::{LoadProgress, RequestId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Echo;

    impl InferencePipeline for Echo {
        fn generate(&mut self, prompt: &str) -> Result<serde_json::Value> {
            Ok(json!([{ "generated_text": format!("echo: {prompt}") }]))
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl PipelineLoader for CountingLoader {
        fn load(
            &mut self,
            progress: &mut dyn FnMut(LoadProgress),
        ) -> Result<Box<dyn InferencePipeline>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            progress(LoadProgress::new("progress", "echo", "weights.bin", 1, 2));
            Ok(Box::new(Echo))
        }
    }

    fn recv(worker: &InferenceWorker) -> WorkerReply {
        worker
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .expect("worker reply")
    }

    #[test]
    fn test_init_is_idempotent() {
        let loads = Arc::new(AtomicUsize::new(0));
        let worker = InferenceWorker::spawn(Box::new(CountingLoader {
            loads: loads.clone(),
        }))
        .unwrap();

        worker.send(WorkerRequest::Init).unwrap();
        assert!(matches!(recv(&worker), WorkerReply::Progress(_)));
        assert_eq!(recv(&worker), WorkerReply::Ready);

        worker.send(WorkerRequest::Init).unwrap();
        assert_eq!(recv(&worker), WorkerReply::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_generate_echoes_request_id() {
        let loads = Arc::new(AtomicUsize::new(0));
        let worker = InferenceWorker::spawn(Box::new(CountingLoader { loads })).unwrap();
        worker.send(WorkerRequest::Init).unwrap();
        recv(&worker);
        recv(&worker);

        worker
            .send(WorkerRequest::Generate {
                request_id: RequestId(9),
                prompt: "Hi".to_string(),
            })
            .unwrap();
        match recv(&worker) {
            WorkerReply::Complete { request_id, output } => {
                assert_eq!(request_id, RequestId(9));
                assert_eq!(output[0]["generated_text"], "echo: Hi");
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    struct BrokenLoader;

    impl PipelineLoader for BrokenLoader {
        fn load(&mut self, _: &mut dyn FnMut(LoadProgress)) -> Result<Box<dyn InferencePipeline>> {
            Err(Error::Inference("no weights".to_string()))
        }
    }

    #[test]
    fn test_load_failure_is_reported() {
        let worker = InferenceWorker::spawn(Box::new(BrokenLoader)).unwrap();
        worker.send(WorkerRequest::Init).unwrap();
        match recv(&worker) {
            WorkerReply::Error {
                request_id,
                message,
            } => {
                assert!(request_id.is_none());
                assert!(message.contains("no weights"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(worker.try_recv().unwrap(), None);
    }

    /// Panics on the first load, succeeds afterwards.
    struct PanicsOnce {
        panicked: bool,
    }

    impl PipelineLoader for PanicsOnce {
        fn load(&mut self, _: &mut dyn FnMut(LoadProgress)) -> Result<Box<dyn InferencePipeline>> {
            if !self.panicked {
                self.panicked = true;
                panic!("weights corrupted");
            }
            Ok(Box::new(Echo))
        }
    }

    #[test]
    fn test_loader_panic_becomes_error_reply() {
        crate::logging::init_test();
        let worker = InferenceWorker::spawn(Box::new(PanicsOnce { panicked: false })).unwrap();

        worker.send(WorkerRequest::Init).unwrap();
        match recv(&worker) {
            WorkerReply::Error {
                request_id,
                message,
            } => {
                assert!(request_id.is_none());
                assert!(message.contains("weights corrupted"), "message: {message}");
            }
            other => panic!("unexpected reply {:?}", other),
        }

        // the thread survived and can still load
        worker.send(WorkerRequest::Init).unwrap();
        assert_eq!(recv(&worker), WorkerReply::Ready);
    }

    struct Exploding;

    impl InferencePipeline for Exploding {
        fn generate(&mut self, _: &str) -> Result<serde_json::Value> {
            panic!("tensor shape mismatch");
        }
    }

    struct ExplodingLoader;

    impl PipelineLoader for ExplodingLoader {
        fn load(&mut self, _: &mut dyn FnMut(LoadProgress)) -> Result<Box<dyn InferencePipeline>> {
            Ok(Box::new(Exploding))
        }
    }

    #[test]
    fn test_generation_panic_is_correlated() {
        crate::logging::init_test();
        let worker = InferenceWorker::spawn(Box::new(ExplodingLoader)).unwrap();
        worker
            .send(WorkerRequest::Generate {
                request_id: RequestId(4),
                prompt: "Hi".to_string(),
            })
            .unwrap();

        match recv(&worker) {
            WorkerReply::Error {
                request_id,
                message,
            } => {
                assert_eq!(request_id, Some(RequestId(4)));
                assert!(message.contains("tensor shape mismatch"), "message: {message}");
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_exited_worker_reports_disconnect() {
        let worker = InferenceWorker::exited();
        assert!(matches!(worker.try_recv(), Err(Error::Worker(_))));
        assert!(worker.send(WorkerRequest::Init).is_err());
    }
}
