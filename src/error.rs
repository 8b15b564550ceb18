//! Error taxonomy.
//!
//! Kernel compile failures and capability degradation are handled in place
//! (logged, never fatal); only startup asset decoding and host-side config
//! loading surface as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to decode the embedded dithering texture: {0}")]
    DitherTexture(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
