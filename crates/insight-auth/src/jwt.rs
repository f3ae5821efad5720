//! Unverified JWT payload inspection
//!
//! Only the `exp` claim is read. Signatures are not checked: the token comes
//! from the user's own authenticated session, and the API verifies it anyway.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::debug;

/// Standard alphabet, padding optional and trailing bits ignored, as a
/// browser's `atob` decodes.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Extract the `exp` claim (unix seconds) from a compact JWT.
///
/// The payload segment is mapped from the base64url alphabet to the standard
/// one and decoded with or without `=` padding. Returns `None` for
/// missing segments, bad base64, bad JSON, or an absent/zero/non-numeric
/// `exp`.
pub fn decode_expiry(jwt: &str) -> Option<i64> {
    let payload = jwt.split('.').nth(1).filter(|p| !p.is_empty())?;
    let corrected = payload.replace('-', "+").replace('_', "/");

    let bytes = match LENIENT.decode(corrected.as_bytes()) {
        Ok(b) => b,
        Err(e) => {
            debug!(error = %e, "JWT payload is not valid base64");
            return None;
        }
    };

    let claims: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "JWT payload is not valid JSON");
            return None;
        }
    };

    let exp = claims.get("exp")?;
    exp.as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .filter(|&secs| secs != 0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

    /// Build an unsigned JWT with unpadded base64url segments.
    pub(crate) fn make_jwt(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn reads_exp_claim() {
        let jwt = make_jwt(serde_json::json!({"sub": "u1", "exp": 1_900_000_000}));
        assert_eq!(decode_expiry(&jwt), Some(1_900_000_000));
    }

    #[test]
    fn fractional_exp_is_truncated() {
        let jwt = make_jwt(serde_json::json!({"exp": 1_700_000_000.75}));
        assert_eq!(decode_expiry(&jwt), Some(1_700_000_000));
    }

    #[test]
    fn missing_exp_is_none() {
        let jwt = make_jwt(serde_json::json!({"sub": "u1"}));
        assert_eq!(decode_expiry(&jwt), None);
    }

    #[test]
    fn zero_or_string_exp_is_none() {
        assert_eq!(decode_expiry(&make_jwt(serde_json::json!({"exp": 0}))), None);
        assert_eq!(
            decode_expiry(&make_jwt(serde_json::json!({"exp": "soon"}))),
            None
        );
    }

    #[test]
    fn malformed_tokens_never_panic() {
        for jwt in [
            "",
            "single-segment",
            "header.",
            "header.!!!not-base64!!!.sig",
            // "not json" in base64
            "h.bm90IGpzb24=.s",
            // `[1,2]` decodes but has no exp
            "h.WzEsMl0=.s",
        ] {
            assert_eq!(decode_expiry(jwt), None, "input: {jwt:?}");
        }
    }

    #[test]
    fn unpadded_payload_decodes() {
        // 10 bytes of JSON encode to 16 chars ending in "=="
        let padded = URL_SAFE.encode(br#"{"exp":12}"#);
        assert!(padded.ends_with("=="));
        let stripped = padded.trim_end_matches('=');
        assert_eq!(decode_expiry(&format!("h.{stripped}.s")), Some(12));
        assert_eq!(decode_expiry(&format!("h.{padded}.s")), Some(12));
    }

    #[test]
    fn every_payload_length_decodes_unpadded() {
        // Pad the claim set so the encoded length hits each remainder mod 4
        for filler in ["", "a", "ab"] {
            let jwt = make_jwt(serde_json::json!({"exp": 1_900_000_000, "f": filler}));
            let payload = jwt.split('.').nth(1).unwrap();
            assert!(!payload.contains('='));
            assert_eq!(decode_expiry(&jwt), Some(1_900_000_000), "payload: {payload}");
        }
    }

    #[test]
    fn url_safe_characters_are_mapped() {
        // "???>>>" encodes to "_Pz8-Pj4" within this payload
        let claims = serde_json::json!({"exp": 1_900_000_000, "n": "???>>>"});
        let jwt = make_jwt(claims);
        let payload = jwt.split('.').nth(1).unwrap();
        assert!(payload.contains('-') || payload.contains('_'), "{payload}");
        assert_eq!(decode_expiry(&jwt), Some(1_900_000_000));
    }
}
