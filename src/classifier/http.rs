//! HTTP transport for the classification service.
//!
//! Speaks the service's JSON API:
//! - `POST {base}/analyze` with a [`ClassificationRequest`] body
//! - `GET {base}/health` as a liveness probe

use super::{ClassificationRequest, Classifier, RequestMetadata};
use crate::config::ClassificationConfig;
use crate::types::{ClassificationError, ClassificationResult};
use std::time::Duration;
use tracing::{debug, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest response body kept in a status error
const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(config: &ClassificationConfig) -> Result<Self, ClassificationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClassificationError::Transport(format!("client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.service_base_address.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClassificationError {
        if e.is_timeout() {
            ClassificationError::timeout(self.timeout)
        } else {
            ClassificationError::Transport(e.to_string())
        }
    }
}

/// Turn a raw status and body into a result
pub fn decode_response(status: u16, body: &str) -> Result<ClassificationResult, ClassificationError> {
    if !(200..300).contains(&status) {
        return Err(ClassificationError::Status {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    if body.trim().is_empty() {
        return Err(ClassificationError::Malformed("empty response body".to_string()));
    }

    let result: ClassificationResult =
        serde_json::from_str(body).map_err(|e| ClassificationError::Malformed(e.to_string()))?;

    if !(0.0..=1.0).contains(&result.confidence) {
        return Err(ClassificationError::Malformed(format!(
            "confidence {} outside [0, 1]",
            result.confidence
        )));
    }

    Ok(result)
}

#[async_trait::async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        content: &str,
        metadata: &RequestMetadata,
    ) -> Result<ClassificationResult, ClassificationError> {
        let request = ClassificationRequest::new(content, metadata)?;
        let url = format!("{}/analyze", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let result = decode_response(status, &body)?;

        debug!(
            "Classified {} chars: {} ({:.2})",
            request.content.len(),
            result.risk_level,
            result.confidence
        );
        Ok(result)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Classification service health check passed");
                true
            }
            Ok(resp) => {
                warn!("Classification service health check failed: {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Classification service unreachable: {}", e);
                false
            }
        }
    }
}
