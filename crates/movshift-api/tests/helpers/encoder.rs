use async_trait::async_trait;
use movshift_processing::{EncodeOutcome, Encoder, ProgressObserver, ProgressUpdate};
use std::path::Path;
use std::time::Duration;

/// Encoder double: copies the input to the output, or fails with a fixed message.
pub struct FakeEncoder {
    failure: Option<String>,
}

impl FakeEncoder {
    pub fn copying() -> Self {
        Self { failure: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        progress: &dyn ProgressObserver,
    ) -> EncodeOutcome {
        if let Some(message) = &self.failure {
            // Leave a partial output behind like a real encoder would.
            let _ = tokio::fs::write(output, b"partial").await;
            return EncodeOutcome::Failed {
                message: message.clone(),
            };
        }

        match tokio::fs::copy(input, output).await {
            Ok(_) => {
                progress.on_progress(&ProgressUpdate {
                    out_time: Duration::from_secs(1),
                    percent: Some(100.0),
                    done: true,
                });
                EncodeOutcome::Succeeded {
                    output: output.to_path_buf(),
                }
            }
            Err(e) => EncodeOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}
