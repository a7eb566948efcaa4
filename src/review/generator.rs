use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    HarmBlockThreshold, HarmCategory, Part, SafetySetting,
};

pub const MAX_OUTPUT_TOKENS: u32 = 8192;
pub const TEMPERATURE: f64 = 1.0;
pub const TOP_P: f64 = 0.95;

const FILTERED_CATEGORIES: [HarmCategory; 4] = [
    HarmCategory::HateSpeech,
    HarmCategory::DangerousContent,
    HarmCategory::SexuallyExplicit,
    HarmCategory::Harassment,
];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Generation API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error(
        "No content generated (block reason: {}, finish reason: {})",
        .block_reason.as_deref().unwrap_or("none"),
        .finish_reason.as_deref().unwrap_or("none")
    )]
    NoContent {
        block_reason: Option<String>,
        finish_reason: Option<String>,
    },
}

impl GenerationError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Api { status, .. } => Some(*status),
            GenerationError::Request(e) => e.status().map(|s| s.as_u16()),
            GenerationError::NoContent { .. } => None,
        }
    }
}

/// A generative-content backend.
/// Implementations must be Send + Sync so one client serves every delivery.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError>;
}

/// Turns a composed prompt into review text using fixed sampling and
/// safety settings.
#[derive(Clone)]
pub struct ReviewGenerator {
    backend: Arc<dyn ContentGenerator>,
}

impl ReviewGenerator {
    pub fn new(backend: Arc<dyn ContentGenerator>) -> Self {
        Self { backend }
    }

    /// The single-turn request sent for `prompt`.
    pub fn request_for(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
                temperature: TEMPERATURE,
                top_p: TOP_P,
            },
            safety_settings: FILTERED_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: HarmBlockThreshold::BlockMediumAndAbove,
                })
                .collect(),
        }
    }

    /// Generate a review and return the first candidate's text unchanged.
    ///
    /// Other candidates are ignored. A reply with no usable first candidate
    /// is `GenerationError::NoContent`.
    pub async fn generate_review(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = Self::request_for(prompt);
        let response = self.backend.generate_content(&request).await?;
        debug!(candidates = response.candidates.len(), "received generation response");

        match response.first_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!(
                    block_reason = response.block_reason(),
                    finish_reason = response.finish_reason(),
                    "model returned no usable candidate"
                );
                Err(GenerationError::NoContent {
                    block_reason: response.block_reason().map(str::to_string),
                    finish_reason: response.finish_reason().map(str::to_string),
                })
            }
        }
    }
}
