pub mod config;
pub mod schema;
pub mod types;

use crate::catalog::schema::DatabaseSchema;
use crate::error::MergeError;
use sha2::{Digest, Sha256};

/// Stable content hash of a snapshot. Two snapshots with the same
/// fingerprint are structurally identical, including declaration order.
pub fn fingerprint_hex(schema: &DatabaseSchema) -> Result<String, MergeError> {
    let bytes = serde_json::to_vec(schema).map_err(|e| MergeError::Encode(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
