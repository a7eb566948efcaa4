//! Gemini `generateContent` client, on Vertex AI or the Generative Language API.
//!
//! Both endpoints are called with an API key in the `key` query parameter.
//! On Vertex AI this is express mode: the key is bound to a service account,
//! so there is no short-lived OAuth token to refresh.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::generator::{ContentGenerator, GenerationError};
use super::types::{GenerateContentRequest, GenerateContentResponse};
use crate::config::GeminiConfig;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-001";
pub const DEFAULT_LOCATION: &str = "us-central1";
const GENERATIVE_LANGUAGE_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    credential: SecretString,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, credential: SecretString) -> Self {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL).to_string();
        Self {
            client: Client::new(),
            endpoint: endpoint(config, &model),
            model,
            credential,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Vertex AI when a project is configured, the Generative Language API otherwise.
fn endpoint(config: &GeminiConfig, model: &str) -> String {
    match &config.project {
        Some(project) => {
            let location = config.location.as_deref().unwrap_or(DEFAULT_LOCATION);
            let base = config
                .api_base
                .clone()
                .unwrap_or_else(|| format!("https://{location}-aiplatform.googleapis.com/v1"));
            format!(
                "{}/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent",
                base.trim_end_matches('/')
            )
        }
        None => {
            let base = config.api_base.as_deref().unwrap_or(GENERATIVE_LANGUAGE_BASE);
            format!("{}/models/{model}:generateContent", base.trim_end_matches('/'))
        }
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let builder = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.credential.expose_secret())])
            .json(request);

        debug!("sending generateContent request");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<GenerateContentResponse>().await?)
    }
}
