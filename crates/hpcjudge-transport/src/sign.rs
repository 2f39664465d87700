// crates/hpcjudge-transport/src/sign.rs
// ============================================================================
// Module: HPC Judge HMAC Signing
// Description: Message trimming, HMAC-SHA256 signing, and constant-time
// verification shared by the client and server sides of the contract.
// Purpose: One place that encodes the exact wire behaviour the reference
// implementation's `SignMessage`/`CheckSignedMessage` pair has.
// Dependencies: hmac, sha2, subtle
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq as _;

use crate::error::TransportError;

type HmacSha256 = Hmac<Sha256>;

/// Bytes trimmed from both ends of a message before signing, matching
/// the reference implementation's `bytes.Trim(message, " \r\n\t")`
/// exactly. A client and server that disagree here would silently fail
/// every signed call, so this is preserved byte-for-byte rather than
/// "cleaned up" to a `str::trim()` call (which trims a different, wider
/// set of Unicode whitespace).
const TRIM_BYTES: &[u8] = b" \r\n\t";

fn trimmed(message: &[u8]) -> &[u8] {
    let start = message.iter().position(|byte| !TRIM_BYTES.contains(byte)).unwrap_or(message.len());
    let end = message.iter().rposition(|byte| !TRIM_BYTES.contains(byte)).map_or(start, |pos| pos + 1);
    &message[start..end]
}

/// Computes the lowercase-hex HMAC-SHA256 signature of `message` under
/// `secret`, after trimming per [`TRIM_BYTES`].
///
/// # Errors
/// Returns [`TransportError::InvalidSigningKey`] if `secret` cannot key an
/// HMAC instance. `Hmac<Sha256>` accepts a key of any length, so this is
/// not expected to occur.
pub fn sign_message(secret: &[u8], message: &[u8]) -> Result<String, TransportError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).map_err(|err| TransportError::InvalidSigningKey(err.to_string()))?;
    mac.update(trimmed(message));
    let tag = mac.finalize().into_bytes();
    let mut hex = String::with_capacity(tag.len() * 2);
    for byte in tag {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(hex)
}

/// Verifies that `signature` (lowercase hex) is the HMAC-SHA256 of
/// `message` under `secret`, comparing in constant time (P7).
///
/// # Errors
/// Returns [`TransportError::InvalidSigningKey`] under the same condition
/// as [`sign_message`].
pub fn verify_signature(secret: &[u8], message: &[u8], signature: &str) -> Result<bool, TransportError> {
    let expected = sign_message(secret, message)?;
    if expected.len() != signature.len() {
        return Ok(false);
    }
    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

    use super::*;

    #[test]
    fn trims_leading_and_trailing_whitespace_before_signing() {
        let secret = b"shared-secret";
        let padded = b"  \r\n{\"a\":1}\t\n";
        let bare = b"{\"a\":1}";
        assert_eq!(sign_message(secret, padded).expect("sign"), sign_message(secret, bare).expect("sign"));
    }

    #[test]
    fn verification_rejects_tampered_body() {
        let secret = b"shared-secret";
        let signature = sign_message(secret, b"{\"a\":1}").expect("sign");
        assert!(verify_signature(secret, b"{\"a\":1}", &signature).expect("verify"));
        assert!(!verify_signature(secret, b"{\"a\":2}", &signature).expect("verify"));
    }
}
