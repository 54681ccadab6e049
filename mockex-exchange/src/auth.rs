use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA512 hex digest of `message` under `key`.
///
/// Both venues sign with the user's secret, which in this simulation equals the api
/// key itself. Bittrex signs the full request URL, Poloniex the urlencoded body.
pub fn sign_message(message: &str, key: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-shape check of a presented signature against the expected digest.
pub fn verify_signature(message: &str, key: &str, signature: &str) -> bool {
    sign_message(message, key) == signature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_message_round_trip() {
        let message = "http://localhost/bittrex.com/api/v1.1/market/buylimit?nonce=1&apikey=1";
        let signature = sign_message(message, "1");

        assert_eq!(signature.len(), 128);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(verify_signature(message, "1", &signature));
    }

    #[test]
    fn test_verify_rejects_any_mutation() {
        let message = "command=returnBalances&nonce=777";
        let signature = sign_message(message, "42");

        // Flipping any single character of the message must break verification.
        for index in 0..message.len() {
            let mut mutated = message.to_owned();
            let flipped = if mutated.as_bytes()[index] == b'x' { 'y' } else { 'x' };
            mutated.replace_range(index..index + 1, &flipped.to_string());
            assert!(
                !verify_signature(&mutated, "42", &signature),
                "mutation at {index} still verified"
            );
        }

        // A different key must break verification too.
        assert!(!verify_signature(message, "43", &signature));
    }
}
