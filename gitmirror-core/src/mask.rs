//! One-way masking of secrets for human-readable output.

use sha2::{Digest, Sha256};

/// Replace `value` with the hex SHA-256 digest of its bytes.
///
/// The empty string stays empty so an unset secret still renders as unset.
pub fn mask(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let mut h = Sha256::new();
    h.update(value.as_bytes());
    hex::encode(h.finalize())
}
