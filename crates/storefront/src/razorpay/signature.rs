//! HMAC-SHA256 signatures used by Razorpay callbacks and webhooks.
//!
//! A checkout callback is signed over `"{razorpay_order_id}|{razorpay_payment_id}"`
//! with the API key secret. A webhook is signed over the raw request body with
//! the webhook secret. Both are lowercase hex.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature is missing")]
    Missing,
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("signature mismatch")]
    Mismatch,
}

fn sign(secret: &SecretString, message: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify(secret: &SecretString, message: &[u8], signature: &str) -> Result<(), SignatureError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::Missing);
    }

    let expected = sign(secret, message)?;

    // Constant-time comparison
    if !constant_time_compare(&expected, &signature.to_ascii_lowercase()) {
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

/// Compute the signature Razorpay attaches to a successful checkout.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the secret cannot key an HMAC.
pub fn payment_signature(
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    key_secret: &SecretString,
) -> Result<String, SignatureError> {
    let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
    sign(key_secret, message.as_bytes())
}

/// Verify a checkout callback signature.
///
/// # Errors
///
/// Returns `SignatureError::Mismatch` when the signature does not match, or
/// `SignatureError::Missing` when it is blank.
pub fn verify_payment_signature(
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
    key_secret: &SecretString,
) -> Result<(), SignatureError> {
    let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
    verify(key_secret, message.as_bytes(), signature)
}

/// Compute the `X-Razorpay-Signature` for a webhook body.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the secret cannot key an HMAC.
pub fn webhook_signature(body: &[u8], webhook_secret: &SecretString) -> Result<String, SignatureError> {
    sign(webhook_secret, body)
}

/// Verify the `X-Razorpay-Signature` header of a webhook delivery.
///
/// # Errors
///
/// Returns `SignatureError::Mismatch` when the body was not signed with
/// `webhook_secret`.
pub fn verify_webhook_signature(
    body: &[u8],
    signature: &str,
    webhook_secret: &SecretString,
) -> Result<(), SignatureError> {
    verify(webhook_secret, body, signature)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("rzp_test_key_secret".to_string())
    }

    #[test]
    fn test_payment_signature_matches_manual_hmac() {
        let mut mac = HmacSha256::new_from_slice(b"rzp_test_key_secret").expect("valid key");
        mac.update(b"order_ABC|pay_XYZ");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(
            payment_signature("order_ABC", "pay_XYZ", &secret()),
            Ok(expected)
        );
    }

    #[test]
    fn test_verify_payment_signature_valid() {
        let signature = payment_signature("order_ABC", "pay_XYZ", &secret()).expect("sign");
        assert!(verify_payment_signature("order_ABC", "pay_XYZ", &signature, &secret()).is_ok());
    }

    #[test]
    fn test_verify_payment_signature_accepts_uppercase_hex() {
        let signature = payment_signature("order_ABC", "pay_XYZ", &secret()).expect("sign");
        let upper = signature.to_ascii_uppercase();
        assert!(verify_payment_signature("order_ABC", "pay_XYZ", &upper, &secret()).is_ok());
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let mut signature = payment_signature("order_ABC", "pay_XYZ", &secret()).expect("sign");
        let last = if signature.ends_with('0') { "1" } else { "0" };
        signature.replace_range(signature.len() - 1.., last);

        assert_eq!(
            verify_payment_signature("order_ABC", "pay_XYZ", &signature, &secret()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_signature_bound_to_order_and_payment() {
        let signature = payment_signature("order_ABC", "pay_XYZ", &secret()).expect("sign");

        assert_eq!(
            verify_payment_signature("order_OTHER", "pay_XYZ", &signature, &secret()),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_payment_signature("order_ABC", "pay_OTHER", &signature, &secret()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let signature = payment_signature("order_ABC", "pay_XYZ", &secret()).expect("sign");
        let other = SecretString::from("another_secret".to_string());

        assert_eq!(
            verify_payment_signature("order_ABC", "pay_XYZ", &signature, &other),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_blank_signature_is_missing() {
        assert_eq!(
            verify_payment_signature("order_ABC", "pay_XYZ", "  ", &secret()),
            Err(SignatureError::Missing)
        );
    }

    #[test]
    fn test_webhook_signature() {
        let webhook_secret = SecretString::from("whsec_test".to_string());
        let body = br#"{"event":"payment.captured"}"#;

        let mut mac = HmacSha256::new_from_slice(b"whsec_test").expect("valid key");
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert_eq!(
            webhook_signature(body, &webhook_secret).as_deref(),
            Ok(signature.as_str())
        );
        assert!(verify_webhook_signature(body, &signature, &webhook_secret).is_ok());
        assert_eq!(
            verify_webhook_signature(b"{}", &signature, &webhook_secret),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
