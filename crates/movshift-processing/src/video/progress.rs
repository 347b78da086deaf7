use movshift_core::JobProgress;
use std::time::Duration;
use tokio::sync::mpsc;

/// One progress sample emitted by an encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Media time encoded so far.
    pub out_time: Duration,
    /// Percentage of the source duration, when the duration is known.
    pub percent: Option<f32>,
    /// Set on the final sample of a run.
    pub done: bool,
}

/// Receives progress samples while an encode runs.
///
/// Progress is advisory: observers must not block and nothing they do can
/// change the outcome of the encode.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Discards every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Forwards samples into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.tx.send(update.clone());
    }
}

impl ProgressObserver for JobProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        if let Some(percent) = update.percent {
            self.record(percent);
        }
        if update.done {
            self.record(100.0);
        }
    }
}
