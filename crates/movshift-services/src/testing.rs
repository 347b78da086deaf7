use async_trait::async_trait;
use movshift_processing::{EncodeOutcome, Encoder, ProgressObserver, ProgressUpdate};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Script {
    Succeed,
    SucceedWithoutOutput,
    Fail(String),
    PartialThenFail(String),
    /// Writes a partial output, then never finishes.
    PartialThenHang,
}

/// Encoder double that copies the input to the output instead of transcoding.
pub(crate) struct ScriptedEncoder {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedEncoder {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        progress: &dyn ProgressObserver,
    ) -> EncodeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(input.exists(), "input must exist while encoding");

        progress.on_progress(&ProgressUpdate {
            out_time: Duration::from_secs(1),
            percent: Some(50.0),
            done: false,
        });

        match &self.script {
            Script::Succeed => {
                tokio::fs::copy(input, output).await.unwrap();
                EncodeOutcome::Succeeded {
                    output: output.to_path_buf(),
                }
            }
            Script::SucceedWithoutOutput => EncodeOutcome::Succeeded {
                output: output.to_path_buf(),
            },
            Script::Fail(message) => EncodeOutcome::Failed {
                message: message.clone(),
            },
            Script::PartialThenFail(message) => {
                tokio::fs::write(output, b"partial").await.unwrap();
                EncodeOutcome::Failed {
                    message: message.clone(),
                }
            }
            Script::PartialThenHang => {
                tokio::fs::write(output, b"partial").await.unwrap();
                std::future::pending().await
            }
        }
    }
}

/// Wait for a file removed by a spawned task to disappear.
pub(crate) async fn wait_until_gone(path: &Path) {
    for _ in 0..100 {
        if !path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} still exists", path.display());
}
