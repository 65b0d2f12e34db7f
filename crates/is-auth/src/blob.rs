//! The `isAuth` blob shape (spec §6): `{pid, uid, role, allowedESAFs[]}`.

use is_domain::error::{IsError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthBlob {
    pub pid: String,
    pub uid: u32,
    pub role: String,
    #[serde(rename = "allowedESAFs")]
    pub allowed_esafs: Vec<u32>,
}

impl AuthBlob {
    pub fn parse(normalized_json: &str) -> Result<AuthBlob> {
        serde_json::from_str(normalized_json)
            .map_err(|e| IsError::Unauthorized.into_bad_request_context(&e.to_string()))
    }
}

// Keep the error-construction detail local: a malformed auth blob is always
// `Unauthorized` from the caller's point of view, but logs the parse error.
trait IntoBadRequestContext {
    fn into_bad_request_context(self, detail: &str) -> IsError;
}

impl IntoBadRequestContext for IsError {
    fn into_bad_request_context(self, detail: &str) -> IsError {
        tracing::debug!(target: "auth", detail, "isAuth blob failed to parse");
        self
    }
}
