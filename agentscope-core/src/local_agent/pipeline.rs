//! Inference pipeline seam and the Ollama-backed implementation.
//!
//! The coordinator treats the model as opaque: a [`PipelineLoader`] produces an
//! [`InferencePipeline`] (reporting progress while it loads), and the pipeline turns a
//! prompt into a JSON result whose first entry may carry `generated_text`.
//!
//! Both traits run on the worker thread only, so they need `Send` but not `Sync`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::protocol::LoadProgress;
use crate::config::LocalAgentConfig;
use crate::error::{Error, Result};

/// Loaded model: prompt in, opaque output out.
pub trait InferencePipeline: Send {
    fn generate(&mut self, prompt: &str) -> Result<serde_json::Value>;
}

/// Builds the pipeline. Called at most once per worker lifetime on success.
pub trait PipelineLoader: Send {
    fn load(&mut self, progress: &mut dyn FnMut(LoadProgress))
        -> Result<Box<dyn InferencePipeline>>;
}

/// Create the default HTTP-backed loader.
pub fn create_default_loader(config: &LocalAgentConfig) -> Box<dyn PipelineLoader> {
    Box::new(OllamaLoader::new(config.clone()))
}

/// Pulls a model from a local Ollama server.
pub struct OllamaLoader {
    config: LocalAgentConfig,
}

impl OllamaLoader {
    pub fn new(config: LocalAgentConfig) -> Self {
        Self { config }
    }
}

/// One NDJSON line of `/api/pull` output.
#[derive(Debug, Deserialize)]
struct PullStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl PullStatus {
    fn to_progress(&self, model: &str) -> LoadProgress {
        LoadProgress::new(
            "progress",
            model,
            self.digest.clone().unwrap_or_else(|| self.status.clone()),
            self.completed.unwrap_or(0),
            self.total.unwrap_or(0),
        )
    }
}

impl PipelineLoader for OllamaLoader {
    fn load(
        &mut self,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<Box<dyn InferencePipeline>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Inference(format!("failed to build tokio runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Inference(format!("failed to build HTTP client: {e}")))?;

        let endpoint = self.config.endpoint.trim_end_matches('/').to_string();
        let model = self.config.model.clone();

        tracing::info!(endpoint = %endpoint, model = %model, "Pulling model");

        runtime.block_on(async {
            let url = format!("{}/api/pull", endpoint);
            let mut resp = http
                .post(url)
                .json(&json!({ "model": model, "stream": true }))
                .send()
                .await
                .map_err(|e| Error::Inference(format!("ollama pull request failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Inference(format!(
                    "ollama pull returned {}: {}",
                    status.as_u16(),
                    body
                )));
            }

            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = resp
                .chunk()
                .await
                .map_err(|e| Error::Inference(format!("ollama pull stream failed: {e}")))?
            {
                buffer.extend_from_slice(&chunk);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    handle_pull_line(&line, &model, progress)?;
                }
            }
            if !buffer.is_empty() {
                handle_pull_line(&buffer, &model, progress)?;
            }
            Ok(())
        })?;

        Ok(Box::new(OllamaPipeline {
            endpoint,
            model: self.config.model.clone(),
            max_new_tokens: self.config.max_new_tokens,
            runtime,
            http,
        }))
    }
}

fn handle_pull_line(
    line: &[u8],
    model: &str,
    progress: &mut dyn FnMut(LoadProgress),
) -> Result<()> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    let status: PullStatus = serde_json::from_str(text)?;
    if let Some(error) = status.error {
        return Err(Error::Inference(format!("ollama pull failed: {error}")));
    }
    if status.total.is_some() {
        progress(status.to_progress(model));
    }
    Ok(())
}

/// Generation against a pulled Ollama model.
pub struct OllamaPipeline {
    endpoint: String,
    model: String,
    max_new_tokens: u32,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl InferencePipeline for OllamaPipeline {
    fn generate(&mut self, prompt: &str) -> Result<serde_json::Value> {
        self.runtime.block_on(async {
            let url = format!("{}/api/generate", self.endpoint);
            let resp = self
                .http
                .post(url)
                .json(&json!({
                    "model": self.model,
                    "prompt": prompt,
                    "stream": false,
                    "options": { "num_predict": self.max_new_tokens },
                }))
                .send()
                .await
                .map_err(|e| Error::Inference(format!("ollama request failed: {e}")))?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| Error::Inference(format!("ollama read body failed: {e}")))?;
            if !status.is_success() {
                return Err(Error::Inference(format!(
                    "ollama returned {}: {}",
                    status.as_u16(),
                    body
                )));
            }
            let json: serde_json::Value = serde_json::from_str(&body)?;
            let text = json
                .get("response")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    Error::Inference("ollama response missing string field `response`".to_string())
                })?;
            Ok(json!([{ "generated_text": text }]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_line_reports_progress() {
        let mut seen = Vec::new();
        let line = br#"{"status":"pulling abc","digest":"sha256:abc","total":200,"completed":50}"#;
        handle_pull_line(line, "tiny", &mut |p| seen.push(p)).unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "tiny");
        assert_eq!(seen[0].file, "sha256:abc");
        assert_eq!(seen[0].progress, 25.0);
        assert_eq!(seen[0].loaded, 50);
    }

    #[test]
    fn test_pull_line_without_sizes_is_silent() {
        let mut seen = Vec::new();
        handle_pull_line(br#"{"status":"pulling manifest"}"#, "tiny", &mut |p| {
            seen.push(p)
        })
        .unwrap();
        handle_pull_line(b"   \n", "tiny", &mut |p| seen.push(p)).unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn test_pull_line_error() {
        let result = handle_pull_line(br#"{"error":"model not found"}"#, "tiny", &mut |_| {});
        assert!(matches!(result, Err(Error::Inference(msg)) if msg.contains("model not found")));
    }

    #[test]
    fn test_unreachable_server_fails_load() {
        let config = LocalAgentConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let mut loader = OllamaLoader::new(config);
        assert!(loader.load(&mut |_| {}).is_err());
    }
}
