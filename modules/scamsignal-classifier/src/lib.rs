//! External Classifier Gateway.
//!
//! The aggregation engine hands a bounded batch of incident summaries to an
//! out-of-process topic classifier and gets back one classification per
//! incident. Everything behind [`BatchClassifier`] is swappable transport:
//! the default is a subprocess fed JSON over stdin, with an HTTP variant for
//! deployments that run the classifier as a service. The gateway normalizes
//! failures and never retries; retry policy belongs to the caller.

mod error;
mod http;
mod subprocess;
mod types;

pub use error::ClassifierError;
pub use http::HttpClassifier;
pub use subprocess::ScriptClassifier;
pub use types::{Classification, IncidentSummary};

use async_trait::async_trait;

/// Narrow batch-classification interface: request list in, response list
/// out, error union out. The response matches the request 1:1 by id.
#[async_trait]
pub trait BatchClassifier: Send + Sync {
    async fn classify(
        &self,
        batch: &[IncidentSummary],
    ) -> Result<Vec<Classification>, ClassifierError>;
}
