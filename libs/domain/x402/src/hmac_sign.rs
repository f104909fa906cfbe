// [libs/domain/x402/src/hmac_sign.rs]
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 tag over `bytes` keyed by `secret`.
pub fn sign(secret: &str, bytes: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(bytes);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison so a verification failure never leaks timing
/// information about how many leading bytes matched.
pub fn verify(secret: &str, bytes: &[u8], tag: &str) -> bool {
    let expected = sign(secret, bytes);
    let expected_bytes = expected.as_bytes();
    let tag_bytes = tag.as_bytes();
    expected_bytes.len() == tag_bytes.len() && expected_bytes.ct_eq(tag_bytes).into()
}

/// Verifies `tag` against `secret`, falling back to `previous_secret`
/// during a rotation grace period.
pub fn verify_with_rotation(secret: &str, previous_secret: Option<&str>, bytes: &[u8], tag: &str) -> bool {
    if verify(secret, bytes, tag) {
        return true;
    }
    previous_secret.is_some_and(|prev| verify(prev, bytes, tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let tag = sign("secret-a", b"payload");
        assert!(verify("secret-a", b"payload", &tag));
        assert!(!verify("secret-b", b"payload", &tag));
    }

    #[test]
    fn rotation_grace_accepts_previous_secret() {
        let tag = sign("old-secret", b"payload");
        assert!(verify_with_rotation("new-secret", Some("old-secret"), b"payload", &tag));
        assert!(!verify_with_rotation("new-secret", None, b"payload", &tag));
    }
}
