use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ClassifierError;
use crate::types::{Classification, ClassifierResponse, IncidentSummary};
use crate::BatchClassifier;

/// Default hard upper bound on one classifier invocation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Subprocess transport: spawns an interpreter + script, writes the batch as
/// JSON to stdin, and reads the classification list from stdout.
pub struct ScriptClassifier {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptClassifier {
    pub fn new(interpreter: &str, script: impl AsRef<Path>) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            script: script.as_ref().to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl BatchClassifier for ScriptClassifier {
    async fn classify(
        &self,
        batch: &[IncidentSummary],
    ) -> Result<Vec<Classification>, ClassifierError> {
        if !self.script.exists() {
            return Err(ClassifierError::ScriptNotFound(self.script.clone()));
        }

        let payload = serde_json::to_string(batch)
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        debug!(
            script = %self.script.display(),
            incidents = batch.len(),
            payload_bytes = payload.len(),
            "Invoking classifier script"
        );

        // kill_on_drop reaps a hung child when the timeout drops the future.
        let mut child = Command::new(&self.interpreter)
            .arg(&self.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let wait = async {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(payload.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| {
                warn!(
                    script = %self.script.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "Classifier timed out, killing process"
                );
                ClassifierError::Timeout(self.timeout.as_secs())
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let code = output.status.code().unwrap_or(-1);
            warn!(code, stderr = %stderr, "Classifier exited with error");
            return Err(ClassifierError::NonZeroExit { code, stderr });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let results = parse_output(&stdout, batch.len())?;

        info!(incidents = results.len(), "Classifier batch complete");
        Ok(results)
    }
}

/// Normalize raw classifier output shared by all transports: empty output,
/// unparseable output, and a top-level error field are all fatal; the result
/// list must match the request 1:1.
pub(crate) fn parse_output(
    raw: &str,
    sent: usize,
) -> Result<Vec<Classification>, ClassifierError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassifierError::EmptyOutput);
    }

    let response: ClassifierResponse = serde_json::from_str(trimmed)
        .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    match response {
        ClassifierResponse::Error { error } => Err(ClassifierError::Pipeline(error)),
        ClassifierResponse::Results(results) => {
            if results.len() != sent {
                return Err(ClassifierError::CardinalityMismatch {
                    sent,
                    received: results.len(),
                });
            }
            Ok(results)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn result_json(id: Uuid) -> String {
        format!(
            r#"[{{"id":"{id}","topic_id":5,"topic_name":"UPI fraud","parent_category":"financial and payment scams","child_label":"fake payment request","parent_confidence":0.9,"child_confidence":0.8,"summary":"Fake UPI requests"}}]"#
        )
    }

    #[test]
    fn empty_output_is_fatal() {
        assert!(matches!(
            parse_output("   \n", 1),
            Err(ClassifierError::EmptyOutput)
        ));
    }

    #[test]
    fn garbage_output_is_malformed() {
        assert!(matches!(
            parse_output("Traceback (most recent call last)", 1),
            Err(ClassifierError::Malformed(_))
        ));
    }

    #[test]
    fn top_level_error_short_circuits() {
        let err = parse_output(r#"{"error": "model load failed"}"#, 1).unwrap_err();
        assert!(matches!(err, ClassifierError::Pipeline(msg) if msg == "model load failed"));
    }

    #[test]
    fn cardinality_is_enforced() {
        let err = parse_output(&result_json(Uuid::new_v4()), 2).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::CardinalityMismatch { sent: 2, received: 1 }
        ));
    }

    #[test]
    fn well_formed_output_parses() {
        let id = Uuid::new_v4();
        let results = parse_output(&result_json(id), 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].topic_id, 5);
        assert_eq!(results[0].parent_category, "financial and payment scams");
    }
}
