//! Index key layouts.
//!
//! Ordered indexes store *inverted* big-endian integers so that a forward
//! prefix scan yields newest entries first. Caller-supplied ids (user and
//! provider session ids) are unbounded, while LMDB caps keys at 511 bytes,
//! so they enter keys only as a fixed-width SHA-256 digest.

use kyc_types::{SessionStatus, Timestamp};
use sha2::{Digest, Sha256};

/// Largest key LMDB accepts with the default build.
pub(crate) const MAX_KEY_SIZE: usize = 511;

/// Width of [`id_digest`] output.
pub(crate) const DIGEST_LEN: usize = 32;

fn inverted(n: u64) -> [u8; 8] {
    (u64::MAX - n).to_be_bytes()
}

/// SHA-256 of an opaque id, used wherever the id would otherwise be a key.
pub(crate) fn id_digest(id: &str) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let result = hasher.finalize();
    let mut output = [0u8; DIGEST_LEN];
    output.copy_from_slice(&result);
    output
}

/// `sha256(user_id)`: prefix of every entry for one user.
pub(crate) fn user_prefix(user_id: &str) -> [u8; DIGEST_LEN] {
    id_digest(user_id)
}

/// `sha256(user_id) ++ !created_at ++ !seq`
pub(crate) fn user_index_key(user_id: &str, created_at: Timestamp, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(DIGEST_LEN + 16);
    key.extend_from_slice(&user_prefix(user_id));
    key.extend_from_slice(&inverted(created_at.as_secs()));
    key.extend_from_slice(&inverted(seq));
    key
}

/// `sha256(provider_session_id)`
pub(crate) fn provider_key(provider_session_id: &str) -> [u8; DIGEST_LEN] {
    id_digest(provider_session_id)
}

pub(crate) fn status_prefix(status: SessionStatus) -> [u8; 1] {
    let tag = match status {
        SessionStatus::Pending => 0,
        SessionStatus::Approved => 1,
        SessionStatus::Failed => 2,
        SessionStatus::Review => 3,
    };
    [tag]
}

/// `status tag ++ !created_at ++ !seq`
pub(crate) fn status_index_key(status: SessionStatus, created_at: Timestamp, seq: u64) -> Vec<u8> {
    let mut key = status_prefix(status).to_vec();
    key.extend_from_slice(&inverted(created_at.as_secs()));
    key.extend_from_slice(&inverted(seq));
    key
}

/// `!seq`
pub(crate) fn audit_key(seq: u64) -> [u8; 8] {
    inverted(seq)
}

/// `sha256(provider_session_id) ++ !seq`
pub(crate) fn audit_provider_key(provider_session_id: &str, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(DIGEST_LEN + 8);
    key.extend_from_slice(&provider_key(provider_session_id));
    key.extend_from_slice(&inverted(seq));
    key
}
