//! Monotonic sequence counters kept in the `meta` database.

use heed::types::Bytes;
use heed::{Database, RwTxn};

use crate::LmdbError;

pub(crate) const SESSION_SEQ_KEY: &[u8] = b"session_seq";
pub(crate) const AUDIT_SEQ_KEY: &[u8] = b"audit_seq";

/// Return the next value of the counter at `key` and persist the increment
/// inside `wtxn`.
pub(crate) fn next_seq(
    meta_db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn<'_>,
    key: &[u8],
) -> Result<u64, LmdbError> {
    let current = match meta_db.get(wtxn, key)? {
        Some(bytes) => {
            let raw: [u8; 8] = bytes
                .try_into()
                .map_err(|_| LmdbError::Serialization(format!("corrupt counter {key:?}")))?;
            u64::from_be_bytes(raw)
        }
        None => 0,
    };
    meta_db.put(wtxn, key, &(current + 1).to_be_bytes())?;
    Ok(current)
}
