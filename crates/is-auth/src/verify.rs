//! The signature primitive. Per spec.md, `verify(payload, signature,
//! public_key) -> bool` is an out-of-scope external collaborator; this
//! module defines the boundary trait plus one concrete keyed-SHA256
//! implementation for the dev-mode / local-testing path.

use sha2::{Digest, Sha256};

pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// Keyed-hash verifier: `signature == SHA256(public_key || payload)`.
///
/// This stands in for the original's OpenSSL-based verifier, which this
/// system treats as an external collaborator. Production deployments should
/// supply a `SignatureVerifier` backed by the real pinned-key signature
/// scheme; this one exists so the authentication flow is exercisable without
/// one.
pub struct HmacSha256Verifier;

impl HmacSha256Verifier {
    fn digest(payload: &[u8], key: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(key);
        hasher.update(payload);
        hasher.finalize().to_vec()
    }

    #[cfg(test)]
    pub(crate) fn sign_for_tests(&self, payload: &[u8], key: &[u8]) -> Vec<u8> {
        Self::digest(payload, key)
    }
}

impl SignatureVerifier for HmacSha256Verifier {
    fn verify(&self, payload: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        Self::digest(payload, public_key) == signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tampered_payload_fails_verification() {
        let v = HmacSha256Verifier;
        let key = b"k";
        let sig = v.sign_for_tests(b"original", key);
        assert!(v.verify(b"original", &sig, key));
        assert!(!v.verify(b"tampered", &sig, key));
    }
}
