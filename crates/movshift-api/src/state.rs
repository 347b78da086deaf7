//! Application state shared by all handlers.

use movshift_core::Config;
use movshift_processing::{Encoder, UploadValidator};
use movshift_services::{
    DeliveryGate, JanitorSweep, RetentionScheduler, TranscodeCoordinator, UploadStager,
};
use movshift_storage::LocalStore;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub staging: LocalStore,
    pub output: LocalStore,
    pub stager: UploadStager,
    pub coordinator: TranscodeCoordinator,
    pub retention: RetentionScheduler,
    pub delivery: DeliveryGate,
    pub janitor: Arc<JanitorSweep>,
}

impl AppState {
    /// Wire every service from configuration around the given encoder.
    pub fn new(config: Config, encoder: Arc<dyn Encoder>) -> Self {
        let staging = LocalStore::new(config.staging_dir());
        let output = LocalStore::new(config.output_dir());
        let retention = RetentionScheduler::from_config(&config);

        Self {
            stager: UploadStager::new(staging.clone(), UploadValidator::from_config(&config)),
            coordinator: TranscodeCoordinator::from_config(&config, encoder, retention.clone()),
            delivery: DeliveryGate::from_config(&config),
            janitor: Arc::new(JanitorSweep::from_config(&config)),
            retention,
            staging,
            output,
            config,
        }
    }
}
