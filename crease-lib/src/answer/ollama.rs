use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::answer::{GenerationRequest, Generator};
use crate::{Error, Result};

/// Generator backed by a local Ollama server.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Connect to the server at `base_url` and check that `model` is installed.
    ///
    /// Fails with [`Error::ModelUnavailable`] if the server cannot be reached
    /// or does not know the model.
    pub fn connect(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::ModelUnavailable(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let resp = client
            .post(format!("{base_url}/api/show"))
            .json(&ShowRequest { model })
            .send()
            .map_err(|e| Error::ModelUnavailable(format!("cannot reach {base_url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::ModelUnavailable(format!(
                "{model} is not available at {base_url} ({})",
                resp.status()
            )));
        }

        info!("using generation model {model} at {base_url}");
        Ok(Self {
            client,
            base_url,
            model: model.to_string(),
        })
    }
}

impl Generator for OllamaGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String> {
        let body = GenerateRequest::new(&self.model, request);
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .map_err(|e| Error::Generation(format!("failed to call {}: {e}", self.base_url)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Generation(format!("Ollama returned {status}: {text}")));
        }

        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| Error::Generation(format!("failed to parse Ollama response: {e}")))?;
        Ok(parsed.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ShowRequest<'a> {
    model: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

impl<'a> GenerateRequest<'a> {
    fn new(model: &'a str, request: &'a GenerationRequest) -> Self {
        Self {
            model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}
