use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::{CompletionCache, RequestDescriptor};
use crate::config::CompressionConfig;
use crate::tokens::TokenCounter;

/// Which instruction wraps the text handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// A chunk of the combined file summaries.
    Chunk,
    /// The directory tree.
    Hierarchy,
    /// The raw contents of a single file.
    File,
}

impl PromptStyle {
    pub fn render(self, text: &str) -> String {
        match self {
            PromptStyle::Chunk => format!(
                "Please provide a concise summary.\nHighlight core files, classes, functions, etc.\n\n{text}\n\nSummary:\n"
            ),
            PromptStyle::Hierarchy => format!(
                "Please provide a concise file hierarchy.\nHighlight core files, classes and functions.\nSummarize directories with many files.\n\n{text}\n\nSummarized File Hierarchy:\n"
            ),
            PromptStyle::File => format!("Summarize the following:\n````\n{text}\n````"),
        }
    }
}

/// Lossy text shortening towards an approximate token target.
///
/// Implementations are allowed to return text that is no shorter than the
/// input (the pass-through mode does exactly that); callers must not assume
/// progress.
pub trait Compressor {
    fn compress(&mut self, text: &str, target_tokens: usize, style: PromptStyle) -> Result<String>;

    /// Number of calls that reached the remote backend (cache misses).
    fn remote_calls(&self) -> usize {
        0
    }
}

/// The remote side of a completion: one descriptor in, generated text out.
pub trait CompletionBackend {
    fn complete(&self, request: &RequestDescriptor) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: usize,
    n: u32,
    stop: Option<&'a str>,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Blocking client for an OpenAI-style `/v1/completions` endpoint.
pub struct HttpBackend {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl HttpBackend {
    pub fn new(endpoint: &str, api_key: String, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

impl CompletionBackend for HttpBackend {
    fn complete(&self, request: &RequestDescriptor) -> Result<String> {
        let body = CompletionRequest {
            model: &request.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            n: request.n,
            stop: request.stop.as_deref(),
            temperature: request.temperature,
        };

        let response: CompletionResponse = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)
            .with_context(|| format!("Completion request to {} failed", self.endpoint))?
            .into_json()
            .context("Malformed completion response")?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Completion response had no choices"))?;
        Ok(choice.text)
    }
}

/// Model-backed compressor with a memoization cache in front of the backend.
///
/// With no backend configured (no credential) it returns its input unchanged.
pub struct LlmCompressor<'a, B, C: ?Sized> {
    backend: Option<B>,
    cache: &'a mut CompletionCache,
    counter: &'a C,
    model: String,
    temperature: f32,
    context_window: usize,
    remote_calls: usize,
}

impl<'a, C: TokenCounter + ?Sized> LlmCompressor<'a, HttpBackend, C> {
    /// Build from config, reading the credential from the configured
    /// environment variable.
    pub fn from_env(cfg: &CompressionConfig, cache: &'a mut CompletionCache, counter: &'a C) -> Self {
        let backend = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(|key| HttpBackend::new(&cfg.endpoint, key, Duration::from_secs(cfg.timeout_secs)));
        if backend.is_none() {
            info!(var = %cfg.api_key_env, "no API key set, compression is a pass-through");
        }
        Self::new(backend, cfg, cache, counter)
    }
}

impl<'a, B: CompletionBackend, C: TokenCounter + ?Sized> LlmCompressor<'a, B, C> {
    pub fn new(backend: Option<B>, cfg: &CompressionConfig, cache: &'a mut CompletionCache, counter: &'a C) -> Self {
        Self {
            backend,
            cache,
            counter,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            context_window: cfg.context_window,
            remote_calls: 0,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.backend.is_none()
    }

    fn descriptor(&self, prompt: String, target_tokens: usize) -> RequestDescriptor {
        let prompt_tokens = self.counter.count(&prompt);
        let max_tokens = target_tokens
            .min(self.context_window.saturating_sub(prompt_tokens))
            .max(1);
        RequestDescriptor {
            model: self.model.clone(),
            prompt,
            max_tokens,
            n: 1,
            stop: None,
            temperature: self.temperature,
        }
    }
}

impl<B: CompletionBackend, C: TokenCounter + ?Sized> Compressor for LlmCompressor<'_, B, C> {
    fn compress(&mut self, text: &str, target_tokens: usize, style: PromptStyle) -> Result<String> {
        let Some(backend) = self.backend.as_ref() else {
            return Ok(text.to_string());
        };

        let descriptor = self.descriptor(style.render(text), target_tokens);
        if let Some(hit) = self.cache.lookup(&descriptor) {
            debug!(max_tokens = descriptor.max_tokens, "completion cache hit");
            return Ok(hit.trim().to_string());
        }

        debug!(max_tokens = descriptor.max_tokens, ?style, "completion cache miss");
        let result = backend.complete(&descriptor)?;
        self.remote_calls += 1;
        self.cache.store(&descriptor, &result);
        Ok(result.trim().to_string())
    }

    fn remote_calls(&self) -> usize {
        self.remote_calls
    }
}
