//! Authentication: verifying the signed `isAuth` blob fetched from the
//! remote store and checking ESAF membership (spec §4.3, §6).
//!
//! The signature primitive itself (`verify(payload, signature, public_key)
//! -> bool`) is an out-of-scope external collaborator per spec.md; this
//! crate defines it as the `SignatureVerifier` trait and supplies one
//! concrete HMAC-SHA256 implementation suitable for the local/dev-mode path,
//! mirroring the `is.h` extern `verifyIsAuth` boundary.

pub mod blob;
pub mod normalize;
pub mod verify;

pub use blob::AuthBlob;
pub use verify::{HmacSha256Verifier, SignatureVerifier};

use is_domain::error::{IsError, Result};

/// Check that the authenticated session is allowed to touch `esaf`.
/// `esaf == 0` is a wildcard meaning "no specific experiment restriction".
pub fn check_esaf_allowed(blob: &AuthBlob, session_id: &str, esaf: u32) -> Result<()> {
    if blob.pid != session_id {
        return Err(IsError::Unauthorized);
    }
    if esaf == 0 || blob.allowed_esafs.contains(&esaf) {
        Ok(())
    } else {
        Err(IsError::Unauthorized)
    }
}

/// Full first-encounter authentication flow: normalize, verify signature,
/// parse, and check ESAF membership.
pub fn authenticate(
    verifier: &dyn SignatureVerifier,
    raw_auth: &str,
    raw_signature: &str,
    public_key: &[u8],
    session_id: &str,
    esaf: u32,
) -> Result<AuthBlob> {
    let normalized = normalize::normalize_auth_payload(raw_auth);
    let signature = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, raw_signature)
        .map_err(|e| IsError::Unauthorized.tap_log(&format!("bad signature encoding: {e}")))?;

    if !verifier.verify(normalized.as_bytes(), &signature, public_key) {
        return Err(IsError::Unauthorized);
    }

    let blob = AuthBlob::parse(&normalized)?;
    check_esaf_allowed(&blob, session_id, esaf)?;
    Ok(blob)
}

// Small local helper trait so `authenticate` can attach a debug log to an
// error without threading a logger through every call site.
trait TapLog {
    fn tap_log(self, msg: &str) -> Self;
}

impl TapLog for IsError {
    fn tap_log(self, msg: &str) -> Self {
        tracing::debug!(target: "auth", %msg, "authentication failed");
        self
    }
}
