//! Webhook signature verification.
//!
//! The provider signs each raw body with HMAC-SHA256 under the shared webhook
//! secret and sends the lowercase hex digest in a header. Verification
//! recomputes the MAC over the exact received bytes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::ReconcileError;

type HmacSha256 = Hmac<Sha256>;

/// HTTP header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Clone)]
pub struct HmacVerifier {
    /// Keyed MAC state, cloned per message.
    keyed: HmacSha256,
}

impl HmacVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ReconcileError> {
        let keyed = <HmacSha256 as Mac>::new_from_slice(secret.as_ref())
            .map_err(|e| ReconcileError::InvalidSecret(e.to_string()))?;
        Ok(Self { keyed })
    }

    /// Hex signature of `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.mac(payload).finalize().into_bytes())
    }

    /// Constant-time check of a hex `signature` against `payload`.
    /// Empty, non-hex or wrong-length signatures fail.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(payload).verify_slice(&expected).is_ok()
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload);
        mac
    }
}

impl std::fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacVerifier").finish_non_exhaustive()
    }
}
