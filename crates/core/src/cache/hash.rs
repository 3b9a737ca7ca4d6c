//! Response body digests.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a response body.
///
/// Stored alongside every entry so two snapshots of a generation can be
/// compared without loading bodies.
pub fn body_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}
