//! Resolves spec.md's Open Question on the `isAuth` newline escaping: the
//! blob arrives with literal `\n` two-character escapes that must be turned
//! into real newlines before the bytes are hashed for signature
//! verification and before the result is parsed as JSON. Decided in
//! DESIGN.md: normalize first, verify and parse the normalized bytes.

/// Replace literal backslash-n two-character sequences with a real newline.
/// Idempotent on already-normalized input (no literal `\n` pairs remain).
pub fn normalize_auth_payload(raw: &str) -> String {
    raw.replace("\\n", "\n")
}
