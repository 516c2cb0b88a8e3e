//! Content digests for closed records.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data, hex encoded.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Outcome of checking a closed flow against its stored digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureCheck {
    pub flow_id: i64,
    /// Digest written when the flow closed
    pub stored: String,
    /// Digest of the flow as it is stored now
    pub computed: String,
}

impl ClosureCheck {
    pub fn is_intact(&self) -> bool {
        self.stored == self.computed
    }
}
