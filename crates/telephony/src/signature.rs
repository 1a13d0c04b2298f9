//! Webhook signature verification.
//!
//! The provider signs each webhook with HMAC-SHA1 over the delivery URL:
//! form bodies append the sorted `key || value` pairs to the URL before
//! signing; JSON bodies instead carry a `bodySHA256` query parameter whose
//! value must equal the hex SHA-256 of the raw body, and the signature
//! covers the URL alone.
//!
//! Behind a proxy the URL the provider signed and the URL we observed can
//! differ, so verification tries a small candidate set (as-received,
//! forwarded-host/proto rewrite, configured public base). All comparisons
//! are constant-time.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// What the signature covers, beyond the URL itself.
pub enum SignedPayload<'a> {
    /// Decoded form pairs; signed as `url || concat(sorted k, v)`.
    Form(&'a [(String, String)]),
    /// Raw JSON body; the URL must carry a matching `bodySHA256` parameter.
    Json(&'a [u8]),
}

/// Verify `signature` (base64) against every candidate URL. True when any
/// candidate matches.
pub fn verify(
    auth_token: &str,
    signature: &str,
    candidates: &[String],
    payload: &SignedPayload<'_>,
) -> bool {
    candidates
        .iter()
        .any(|url| verify_one(auth_token, signature, url, payload))
}

fn verify_one(auth_token: &str, signature: &str, url: &str, payload: &SignedPayload<'_>) -> bool {
    let signed_input = match payload {
        SignedPayload::Form(pairs) => {
            let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
            sorted.sort();
            let mut input = url.to_string();
            for (k, v) in sorted {
                input.push_str(k);
                input.push_str(v);
            }
            input
        }
        SignedPayload::Json(body) => {
            if !body_digest_matches(url, body) {
                return false;
            }
            url.to_string()
        }
    };

    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_input.as_bytes());
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// For JSON deliveries: the URL's `bodySHA256` parameter must equal the hex
/// SHA-256 of the raw body.
fn body_digest_matches(url: &str, body: &[u8]) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    let Some(declared) = parsed
        .query_pairs()
        .find(|(k, _)| k == "bodySHA256")
        .map(|(_, v)| v.into_owned())
    else {
        return false;
    };
    let actual = hex::encode(Sha256::digest(body));
    actual
        .as_bytes()
        .ct_eq(declared.to_lowercase().as_bytes())
        .into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// URL candidates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the candidate URLs a signature may have been computed against:
/// the URL as received, a proxy rewrite from forwarded headers, and the
/// configured public base.
pub fn url_candidates(
    received: &str,
    forwarded_host: Option<&str>,
    forwarded_proto: Option<&str>,
    public_base: Option<&str>,
) -> Vec<String> {
    let mut candidates = vec![received.to_string()];

    if forwarded_host.is_some() || forwarded_proto.is_some() {
        if let Ok(mut url) = url::Url::parse(received) {
            if let Some(proto) = forwarded_proto {
                let _ = url.set_scheme(proto);
            }
            if let Some(host) = forwarded_host {
                // Forwarded hosts may carry a port.
                let (h, p) = match host.rsplit_once(':') {
                    Some((h, p)) if p.parse::<u16>().is_ok() => (h, p.parse::<u16>().ok()),
                    _ => (host, None),
                };
                if url.set_host(Some(h)).is_ok() {
                    let _ = url.set_port(p);
                }
            }
            candidates.push(url.to_string());
        }
    }

    if let Some(base) = public_base {
        if let Ok(url) = url::Url::parse(received) {
            let path_and_query = match url.query() {
                Some(q) => format!("{}?{}", url.path(), q),
                None => url.path().to_string(),
            };
            candidates.push(format!("{}{}", base.trim_end_matches('/'), path_and_query));
        }
    }

    candidates.dedup();
    candidates
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signing (tests and outbound URL generation)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the provider-side signature for a form delivery. Exposed so the
/// test suite can forge valid webhooks.
pub fn sign_form(auth_token: &str, url: &str, pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort();
    let mut input = url.to_string();
    for (k, v) in sorted {
        input.push_str(k);
        input.push_str(v);
    }
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts any key length");
    mac.update(input.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Compute the provider-side signature for a JSON delivery (URL only).
pub fn sign_url(auth_token: &str, url: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts any key length");
    mac.update(url.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "auth-token-123";

    fn pairs(kv: &[(&str, &str)]) -> Vec<(String, String)> {
        kv.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn valid_form_signature_accepted() {
        let url = "https://coach.example.com/webhook?slug=case-1";
        let body = pairs(&[("CallSid", "CA1"), ("AccountSid", "AC1")]);
        let sig = sign_form(TOKEN, url, &body);
        assert!(verify(
            TOKEN,
            &sig,
            &[url.to_string()],
            &SignedPayload::Form(&body)
        ));
    }

    #[test]
    fn signature_over_unlisted_url_rejected() {
        let body = pairs(&[("CallSid", "CA1")]);
        let sig = sign_form(TOKEN, "https://attacker.example.com/webhook", &body);
        assert!(!verify(
            TOKEN,
            &sig,
            &["https://coach.example.com/webhook".to_string()],
            &SignedPayload::Form(&body)
        ));
    }

    #[test]
    fn sorting_is_order_independent() {
        let url = "https://coach.example.com/webhook";
        let sig = sign_form(TOKEN, url, &pairs(&[("b", "2"), ("a", "1")]));
        let body = pairs(&[("a", "1"), ("b", "2")]);
        assert!(verify(TOKEN, &sig, &[url.to_string()], &SignedPayload::Form(&body)));
    }

    #[test]
    fn json_delivery_requires_matching_body_digest() {
        let body = br#"{"CallSid":"CA1"}"#;
        let digest = hex::encode(Sha256::digest(body));
        let url = format!("https://coach.example.com/webhook?bodySHA256={digest}");
        let sig = sign_url(TOKEN, &url);

        assert!(verify(
            TOKEN,
            &sig,
            &[url.clone()],
            &SignedPayload::Json(body)
        ));
        // Tampered body fails even with a valid URL signature.
        assert!(!verify(
            TOKEN,
            &sig,
            &[url],
            &SignedPayload::Json(br#"{"CallSid":"CA2"}"#)
        ));
    }

    #[test]
    fn json_delivery_without_digest_param_rejected() {
        let url = "https://coach.example.com/webhook";
        let sig = sign_url(TOKEN, url);
        assert!(!verify(
            TOKEN,
            &sig,
            &[url.to_string()],
            &SignedPayload::Json(b"{}")
        ));
    }

    #[test]
    fn wrong_token_rejected() {
        let url = "https://coach.example.com/webhook";
        let body = pairs(&[("CallSid", "CA1")]);
        let sig = sign_form("other-token", url, &body);
        assert!(!verify(TOKEN, &sig, &[url.to_string()], &SignedPayload::Form(&body)));
    }

    #[test]
    fn candidates_include_forwarded_rewrite_and_public_base() {
        let got = url_candidates(
            "http://10.0.0.5:8080/webhook?slug=x",
            Some("coach.example.com"),
            Some("https"),
            Some("https://public.example.com/"),
        );
        assert_eq!(got[0], "http://10.0.0.5:8080/webhook?slug=x");
        assert!(got.contains(&"https://coach.example.com/webhook?slug=x".to_string()));
        assert!(got.contains(&"https://public.example.com/webhook?slug=x".to_string()));
    }

    #[test]
    fn forwarded_signature_verifies_through_candidates() {
        let signed_url = "https://coach.example.com/webhook?slug=x";
        let body = pairs(&[("CallSid", "CA1")]);
        let sig = sign_form(TOKEN, signed_url, &body);

        let candidates = url_candidates(
            "http://10.0.0.5:8080/webhook?slug=x",
            Some("coach.example.com"),
            Some("https"),
            None,
        );
        assert!(verify(TOKEN, &sig, &candidates, &SignedPayload::Form(&body)));
    }
}
