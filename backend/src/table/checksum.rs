//! Row fingerprints for table deduplication.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Calculate the SHA-256 fingerprint of a table row.
///
/// The row is hashed through its canonical JSON encoding, so two rows share a
/// fingerprint exactly when they are cell-for-cell equal.
///
/// # Returns
/// Hexadecimal string representation of the SHA-256 hash.
pub fn row_fingerprint(row: &[Value]) -> String {
    let mut hasher = Sha256::new();
    for cell in row {
        // Each cell is length-prefixed so ["ab", "c"] and ["a", "bc"] differ.
        let encoded = cell.to_string();
        hasher.update((encoded.len() as u64).to_le_bytes());
        hasher.update(encoded.as_bytes());
    }
    hex::encode(hasher.finalize())
}
