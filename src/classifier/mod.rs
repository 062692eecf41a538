//! Classification client.
//!
//! This module provides:
//! - The [`Classifier`] trait consumed by the orchestrator
//! - Request metadata and the wire request body
//! - Local content preparation matching the service's request limits
//! - The confidence threshold policy ([`policy`])
//! - The HTTP transport ([`http`])

pub mod http;
pub mod policy;

use crate::config::{ClassificationConfig, SensitivityTier};
use crate::text;
use crate::types::{ClassificationError, ClassificationResult};
use serde::{Deserialize, Serialize};

pub use http::HttpClassifier;
pub use policy::{PolicyDecision, ThresholdPolicy};

/// Shortest content the service accepts, after whitespace cleaning
pub const MIN_CONTENT_CHARS: usize = 5;

/// Longest content the service accepts
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Kind of content being submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Url,
    /// Text recovered from an image
    ImageText,
    VideoTranscript,
}

/// Metadata sent alongside every piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub content_type: ContentType,
    pub language: String,
    pub source_tag: String,
    pub sensitivity: SensitivityTier,
}

impl RequestMetadata {
    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self {
            content_type: ContentType::Text,
            language: config.language.clone(),
            source_tag: config.source_tag.clone(),
            sensitivity: config.sensitivity,
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::from_config(&ClassificationConfig::default())
    }
}

/// Free-form context forwarded to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContext {
    pub sensitivity: SensitivityTier,
}

/// JSON body of `POST /analyze`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationRequest {
    pub content: String,
    pub content_type: ContentType,
    pub language: String,
    #[serde(rename = "source_app")]
    pub source_tag: String,
    pub user_context: UserContext,
}

impl ClassificationRequest {
    /// Build a request, cleaning and bounding the content
    pub fn new(content: &str, metadata: &RequestMetadata) -> Result<Self, ClassificationError> {
        Ok(Self {
            content: prepare_content(content)?,
            content_type: metadata.content_type,
            language: metadata.language.clone(),
            source_tag: metadata.source_tag.clone(),
            user_context: UserContext {
                sensitivity: metadata.sensitivity,
            },
        })
    }
}

/// Collapse whitespace, reject content that is too short, truncate content
/// that is too long (on a char boundary)
pub fn prepare_content(raw: &str) -> Result<String, ClassificationError> {
    let cleaned = text::clean(raw);
    let len = text::char_len(&cleaned);
    if len < MIN_CONTENT_CHARS {
        return Err(ClassificationError::InvalidContent(format!(
            "content too short after cleaning ({} chars, minimum {})",
            len, MIN_CONTENT_CHARS
        )));
    }

    if len > MAX_CONTENT_CHARS {
        tracing::debug!("Truncating content from {} to {} chars", len, MAX_CONTENT_CHARS);
        return Ok(cleaned.chars().take(MAX_CONTENT_CHARS).collect());
    }

    Ok(cleaned)
}

/// Remote text classification
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one piece of text
    async fn classify(
        &self,
        content: &str,
        metadata: &RequestMetadata,
    ) -> Result<ClassificationResult, ClassificationError>;

    /// Whether the service is reachable and healthy
    async fn health_check(&self) -> bool;
}
