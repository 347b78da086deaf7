//! Movshift Services Layer
//!
//! The job lifecycle and storage reclamation services. An upload is staged by
//! [`UploadStager`], converted by [`TranscodeCoordinator`], and the resulting
//! artifact is then removed by whichever of three actors gets there first:
//! [`DeliveryGate`] after a download, [`RetentionScheduler`] when its TTL runs
//! out, or [`JanitorSweep`] on its periodic scan. None of them take a lock; each
//! deletion goes through [`movshift_storage::remove_idempotent`].

pub mod delivery;
mod guard;
pub mod janitor;
pub mod retention;
pub mod transcode;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{Delivery, DeliveryError, DeliveryGate, DeliveryStream};
pub use janitor::{JanitorHandle, JanitorSweep, SweepReport};
pub use retention::RetentionScheduler;
pub use transcode::{ConversionError, TranscodeCoordinator};
pub use upload::{UploadError, UploadStager};
