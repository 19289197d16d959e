use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed(secret: &str, message: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    mac
}

fn signed_message(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

/// Lowercase hex HMAC-SHA256 of `message` keyed with `secret`.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    hex::encode(keyed(secret, message).finalize().into_bytes())
}

/// Signature the gateway issues for a completed checkout: HMAC over `order_id|payment_id`.
pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    hmac_sha256_hex(secret, &signed_message(order_id, payment_id))
}

/// Exact match of the supplied lowercase hex signature against the recomputed MAC.
pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    // The gateway only issues lowercase hex; `hex::decode` alone would accept uppercase
    if signature.bytes().any(|b| b.is_ascii_uppercase()) {
        return false;
    }
    let Ok(tag) = hex::decode(signature) else {
        return false;
    };

    keyed(secret, &signed_message(order_id, payment_id))
        .verify_slice(&tag)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_test_secret";

    #[test]
    fn test_hmac_matches_rfc4231_case_2() {
        assert_eq!(
            hmac_sha256_hex("Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signature_is_hmac_of_joined_ids() {
        assert_eq!(
            payment_signature(SECRET, "order_123", "pay_456"),
            hmac_sha256_hex(SECRET, "order_123|pay_456")
        );
    }

    #[test]
    fn test_valid_signature_verifies() {
        let signature = payment_signature(SECRET, "order_123", "pay_456");
        assert!(verify_payment_signature(SECRET, "order_123", "pay_456", &signature));
    }

    #[test]
    fn test_any_single_character_change_fails() {
        let order_id = "order_123";
        let payment_id = "pay_456";
        let signature = payment_signature(SECRET, order_id, payment_id);

        for i in 0..signature.len() {
            let mut tampered = signature.clone().into_bytes();
            tampered[i] = if tampered[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(!verify_payment_signature(SECRET, order_id, payment_id, &tampered));
        }

        assert!(!verify_payment_signature(SECRET, "order_124", payment_id, &signature));
        assert!(!verify_payment_signature(SECRET, order_id, "pay_457", &signature));
    }

    #[test]
    fn test_uppercase_or_truncated_signature_fails() {
        let signature = payment_signature(SECRET, "order_123", "pay_456");
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", &signature.to_uppercase()));
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", &signature[..63]));
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", ""));
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", &signature[..62]));
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", &format!(" {}", signature)));
    }

    #[test]
    fn test_other_secret_fails() {
        let signature = payment_signature("another_secret", "order_123", "pay_456");
        assert!(!verify_payment_signature(SECRET, "order_123", "pay_456", &signature));
    }
}
