//! Configuration module
//!
//! This module provides configuration structures for the converter service:
//! server settings, the two store directories, retention timing and the fixed
//! encoder parameter set. Everything is read from the environment (optionally
//! seeded from a `.env` file).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Common constants
const SERVER_PORT: u16 = 3000;
const API_PREFIX: &str = "/api";
const STAGING_DIR: &str = "uploads";
const OUTPUT_DIR: &str = "converted";
const MAX_UPLOAD_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;
const SOURCE_EXTENSION: &str = "mov";
const TARGET_EXTENSION: &str = "mp4";
const OUTPUT_TTL_SECS: u64 = 3600;
const SWEEP_INTERVAL_SECS: u64 = 3600;
const SWEEP_MAX_AGE_SECS: u64 = 3600;
const VIDEO_CRF: u8 = 23;

/// Base configuration for the HTTP process
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub api_prefix: String,
    pub log_format: String,
}

/// Fixed parameter set handed to the external encoder on every invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub ffmpeg_path: String,
    pub video_codec: String,
    pub crf: u8,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            crf: VIDEO_CRF,
            preset: "fast".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// Converter configuration
#[derive(Clone, Debug)]
pub struct ConverterConfig {
    pub base: BaseConfig,
    // Store directories
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    // Upload validation
    pub max_upload_size_bytes: u64,
    pub source_extension: String,
    pub target_extension: String,
    // Retention
    pub output_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_max_age_secs: u64,
    pub encoder: EncoderConfig,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: SERVER_PORT,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
                api_prefix: API_PREFIX.to_string(),
                log_format: "compact".to_string(),
            },
            staging_dir: PathBuf::from(STAGING_DIR),
            output_dir: PathBuf::from(OUTPUT_DIR),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_BYTES,
            source_extension: SOURCE_EXTENSION.to_string(),
            target_extension: TARGET_EXTENSION.to_string(),
            output_ttl_secs: OUTPUT_TTL_SECS,
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
            sweep_max_age_secs: SWEEP_MAX_AGE_SECS,
            encoder: EncoderConfig::default(),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

impl ConverterConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env_string("CORS_ORIGINS", "*");
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            api_prefix: env_string("API_PREFIX", API_PREFIX),
            log_format: env_string("LOG_FORMAT", "compact").to_lowercase(),
        };

        let encoder = EncoderConfig {
            ffmpeg_path: env_string("FFMPEG_PATH", "ffmpeg"),
            video_codec: env_string("VIDEO_CODEC", "libx264"),
            crf: env::var("VIDEO_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(VIDEO_CRF),
            preset: env_string("VIDEO_PRESET", "fast"),
            audio_codec: env_string("AUDIO_CODEC", "aac"),
            audio_bitrate: env_string("AUDIO_BITRATE", "128k"),
        };

        Ok(ConverterConfig {
            base,
            staging_dir: PathBuf::from(env_string("STAGING_DIR", STAGING_DIR)),
            output_dir: PathBuf::from(env_string("OUTPUT_DIR", OUTPUT_DIR)),
            max_upload_size_bytes: env_u64("MAX_UPLOAD_SIZE_BYTES", MAX_UPLOAD_SIZE_BYTES),
            source_extension: normalize_extension(&env_string(
                "SOURCE_EXTENSION",
                SOURCE_EXTENSION,
            )),
            target_extension: normalize_extension(&env_string(
                "TARGET_EXTENSION",
                TARGET_EXTENSION,
            )),
            output_ttl_secs: env_u64("OUTPUT_TTL_SECS", OUTPUT_TTL_SECS),
            sweep_interval_secs: env_u64("SWEEP_INTERVAL_SECS", SWEEP_INTERVAL_SECS),
            sweep_max_age_secs: env_u64("SWEEP_MAX_AGE_SECS", SWEEP_MAX_AGE_SECS),
            encoder,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.output_ttl_secs == 0 {
            return Err(anyhow::anyhow!("OUTPUT_TTL_SECS must be greater than zero"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "SWEEP_INTERVAL_SECS must be greater than zero"
            ));
        }
        if self.sweep_max_age_secs == 0 {
            return Err(anyhow::anyhow!("SWEEP_MAX_AGE_SECS must be greater than zero"));
        }
        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_UPLOAD_SIZE_BYTES must be greater than zero"
            ));
        }

        for (name, ext) in [
            ("SOURCE_EXTENSION", &self.source_extension),
            ("TARGET_EXTENSION", &self.target_extension),
        ] {
            if ext.is_empty() || ext.contains('.') || ext.contains('/') {
                return Err(anyhow::anyhow!(
                    "{} must be a bare extension such as 'mov'",
                    name
                ));
            }
        }
        if self.source_extension.eq_ignore_ascii_case(&self.target_extension) {
            return Err(anyhow::anyhow!(
                "SOURCE_EXTENSION and TARGET_EXTENSION must differ"
            ));
        }

        if self.staging_dir == self.output_dir {
            return Err(anyhow::anyhow!(
                "STAGING_DIR and OUTPUT_DIR must be different directories"
            ));
        }

        let prefix = &self.base.api_prefix;
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(anyhow::anyhow!("API_PREFIX must start with '/'"));
        }

        if self.encoder.crf > 51 {
            return Err(anyhow::anyhow!("VIDEO_CRF must be between 0 and 51"));
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ConverterConfig>);

impl Default for Config {
    fn default() -> Self {
        Config(Box::default())
    }
}

impl Config {
    fn as_converter(&self) -> &ConverterConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ConverterConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    /// Config with default settings rooted at the given store directories.
    pub fn with_stores(staging_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let mut config = ConverterConfig::default();
        config.staging_dir = staging_dir.into();
        config.output_dir = output_dir.into();
        Config(Box::new(config))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_converter().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_converter().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.as_converter().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_converter().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_converter().base.environment
    }

    pub fn api_prefix(&self) -> &str {
        &self.as_converter().base.api_prefix
    }

    pub fn log_format(&self) -> &str {
        &self.as_converter().base.log_format
    }

    pub fn staging_dir(&self) -> &Path {
        &self.as_converter().staging_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.as_converter().output_dir
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.as_converter().max_upload_size_bytes
    }

    pub fn source_extension(&self) -> &str {
        &self.as_converter().source_extension
    }

    pub fn target_extension(&self) -> &str {
        &self.as_converter().target_extension
    }

    pub fn output_ttl(&self) -> Duration {
        Duration::from_secs(self.as_converter().output_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.as_converter().sweep_interval_secs)
    }

    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_secs(self.as_converter().sweep_max_age_secs)
    }

    pub fn encoder(&self) -> &EncoderConfig {
        &self.as_converter().encoder
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.as_converter().encoder.ffmpeg_path
    }
}
