use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compare a presented trigger secret with the configured one.
/// Both sides are hashed first so the comparison always covers 32 bytes.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}
