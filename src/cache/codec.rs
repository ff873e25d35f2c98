//! Value encoding: JSON, deflated above a threshold, with size estimation.

use std::io::{Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::entry::StoredValue;
use super::error::{CacheError, CacheResult};

/// Size charged when a value cannot even be serialized for measurement.
pub const FALLBACK_ENTRY_SIZE: usize = 1024;

/// Bytes charged per character of an uncompressed value (wide-character estimate).
pub const BYTES_PER_CHAR: usize = 2;

/// Encodes `value` for storage and returns it with its charged size.
///
/// Never fails: serialization or compression problems fall back to the raw value.
pub fn encode<T: Serialize>(value: T, compression_threshold: usize) -> (StoredValue<T>, usize) {
    let json = match serde_json::to_string(&value) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize cache value, storing raw");
            return (StoredValue::Raw(value), FALLBACK_ENTRY_SIZE);
        }
    };

    let raw_size = json.chars().count() * BYTES_PER_CHAR;
    if json.len() <= compression_threshold {
        return (StoredValue::Raw(value), raw_size);
    }

    match compress(json.as_bytes()) {
        Ok(bytes) => {
            let size = bytes.len();
            (StoredValue::Compressed(Arc::from(bytes)), size)
        }
        Err(e) => {
            warn!(error = %e, "Failed to compress cache value, storing raw");
            (StoredValue::Raw(value), raw_size)
        }
    }
}

/// Recovers the original value from a [`StoredValue`].
pub fn decode<T: Clone + DeserializeOwned>(stored: &StoredValue<T>) -> CacheResult<T> {
    match stored {
        StoredValue::Raw(value) => Ok(value.clone()),
        StoredValue::Compressed(bytes) => {
            let json = decompress(bytes)?;
            serde_json::from_slice(&json).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })
        }
    }
}

pub fn compress(data: &[u8]) -> CacheResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::fast());
    encoder
        .write_all(data)
        .map_err(|e| CacheError::Compression {
            reason: e.to_string(),
        })?;
    encoder.finish().map_err(|e| CacheError::Compression {
        reason: e.to_string(),
    })
}

pub fn decompress(data: &[u8]) -> CacheResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Compression {
            reason: e.to_string(),
        })?;
    Ok(out)
}
