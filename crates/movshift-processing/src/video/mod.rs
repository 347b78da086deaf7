//! Video encoding module

pub mod encoder;
pub mod progress;

pub use encoder::{EncodeOutcome, Encoder, FfmpegEncoder};
pub use progress::{ChannelObserver, NoopObserver, ProgressObserver, ProgressUpdate};
