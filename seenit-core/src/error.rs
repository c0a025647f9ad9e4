use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SeenError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No GPS coordinates found in image metadata")]
    NoCoordinates,

    #[error("Geocode error: {0}")]
    Geocode(String),

    #[error("Corrupt cache entry for {key}: {reason}")]
    CacheCorrupt { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, SeenError>;
