use std::time::Duration;

use tracing::{debug, info};

use crate::error::ClassifierError;
use crate::subprocess::parse_output;
use crate::types::{Classification, IncidentSummary};
use crate::BatchClassifier;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP transport: POSTs the batch to a classifier service endpoint and
/// normalizes the response body through the same rules as the subprocess
/// transport.
pub struct HttpClassifier {
    endpoint: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            http: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl BatchClassifier for HttpClassifier {
    async fn classify(
        &self,
        batch: &[IncidentSummary],
    ) -> Result<Vec<Classification>, ClassifierError> {
        debug!(endpoint = %self.endpoint, incidents = batch.len(), "Classifier HTTP request");

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(batch)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(self.timeout.as_secs())
                } else {
                    ClassifierError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ClassifierError::Http(format!("{status}: {body}")));
        }

        let results = parse_output(&body, batch.len())?;
        info!(incidents = results.len(), "Classifier batch complete");
        Ok(results)
    }
}
