//! Movshift Processing Library
//!
//! Validation of incoming uploads and the video encoder seam.
//!
//! The [`Encoder`] trait is what the transcode coordinator drives; the
//! production implementation is [`FfmpegEncoder`], which shells out to the
//! `ffmpeg` binary with a fixed H.264/AAC parameter set and reports progress
//! through a [`ProgressObserver`].

pub mod validator;
pub mod video;

pub use validator::{sanitize_filename, UploadValidator, ValidationError};
pub use video::{
    ChannelObserver, EncodeOutcome, Encoder, FfmpegEncoder, NoopObserver, ProgressObserver,
    ProgressUpdate,
};
