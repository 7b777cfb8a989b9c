//! AWS Signature Version 4 request signing.
//!
//! Only what `InvokeModel` needs: header-based signing of a request with an
//! empty query string and a fully buffered body.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static credentials for signing.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The parts of an HTTP request that go into the signature.
#[derive(Debug)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// URL path exactly as sent on the wire (already percent-encoded once).
    pub path: &'a str,
    /// Headers to sign, `host` included.
    pub headers: &'a [(String, String)],
    pub body: &'a [u8],
}

/// Headers produced by signing, to be attached to the outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub amz_date: String,
    pub security_token: Option<String>,
    pub authorization: String,
}

impl SignatureHeaders {
    /// `(name, value)` pairs ready for the HTTP client.
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("x-amz-date", self.amz_date)];
        if let Some(token) = self.security_token {
            pairs.push(("x-amz-security-token", token));
        }
        pairs.push(("authorization", self.authorization));
        pairs
    }
}

/// Sign `request` for `service` in `region` at time `now`.
pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> SignatureHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/{service}/aws4_request");

    let (canonical, signed_headers) = canonical_request(
        request,
        &amz_date,
        credentials.session_token.as_deref(),
    );
    let to_sign = string_to_sign(&amz_date, &scope, &canonical);

    let key = signing_key(&credentials.secret_access_key, &date, region, service);
    let signature = hex_encode(&hmac_sha256(&key, to_sign.as_bytes()));

    SignatureHeaders {
        amz_date,
        security_token: credentials.session_token.clone(),
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    }
}

/// Build the canonical request and the `;`-joined signed header list.
///
/// `x-amz-date` (and `x-amz-security-token` when present) are added to the
/// request's own headers before sorting.
fn canonical_request(
    request: &SigningRequest<'_>,
    amz_date: &str,
    session_token: Option<&str>,
) -> (String, String) {
    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), normalize_header_value(value)))
        .collect();
    headers.push(("x-amz-date".to_string(), amz_date.to_string()));
    if let Some(token) = session_token {
        headers.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        uri_encode(request.path, false),
        canonical_headers,
        signed_headers,
        sha256_hex(request.body),
    );
    (canonical, signed_headers)
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Percent-encode per the SigV4 rules: everything but `A-Za-z0-9-_.~` is
/// escaped with uppercase hex; `/` survives unless `encode_slash`.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: EXAMPLE_SECRET.into(),
            session_token: None,
        }
    }

    #[test]
    fn test_signing_key_matches_published_example() {
        let key = signing_key(EXAMPLE_SECRET, "20120215", "us-east-1", "iam");
        assert_eq!(
            hex_encode(&key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    fn vanilla_get() -> (Vec<(String, String)>, DateTime<Utc>) {
        let headers = vec![("Host".to_string(), "example.amazon.com".to_string())];
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        (headers, now)
    }

    #[test]
    fn test_vanilla_get_canonical_request() {
        let (headers, _) = vanilla_get();
        let request = SigningRequest {
            method: "GET",
            path: "/",
            headers: &headers,
            body: b"",
        };

        let (canonical, signed_headers) = canonical_request(&request, "20150830T123600Z", None);
        assert_eq!(
            canonical,
            "GET\n/\n\n\
             host:example.amazon.com\n\
             x-amz-date:20150830T123600Z\n\n\
             host;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(signed_headers, "host;x-amz-date");
        assert_eq!(
            sha256_hex(canonical.as_bytes()),
            "7f5f3543e13c2022b527e1f4a26c775cff257409d5f00a8ca401b317313011ed"
        );
    }

    #[test]
    fn test_vanilla_get_string_to_sign() {
        let (headers, _) = vanilla_get();
        let request = SigningRequest {
            method: "GET",
            path: "/",
            headers: &headers,
            body: b"",
        };
        let (canonical, _) = canonical_request(&request, "20150830T123600Z", None);

        assert_eq!(
            string_to_sign(
                "20150830T123600Z",
                "20150830/us-east-1/service/aws4_request",
                &canonical
            ),
            "AWS4-HMAC-SHA256\n\
             20150830T123600Z\n\
             20150830/us-east-1/service/aws4_request\n\
             7f5f3543e13c2022b527e1f4a26c775cff257409d5f00a8ca401b317313011ed"
        );
    }

    #[test]
    fn test_vanilla_get_signature() {
        let (headers, now) = vanilla_get();
        let request = SigningRequest {
            method: "GET",
            path: "/",
            headers: &headers,
            body: b"",
        };

        let signed = sign(&request, &example_credentials(), "us-east-1", "service", now);
        assert_eq!(signed.amz_date, "20150830T123600Z");
        assert_eq!(
            signed.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=7ab4567ae243ee168f6bf18206b2b40b61ce08277323168138fa113ed23c538e"
        );
    }

    #[test]
    fn test_session_token_is_signed() {
        let headers = vec![("host".to_string(), "example.amazon.com".to_string())];
        let request = SigningRequest {
            method: "POST",
            path: "/",
            headers: &headers,
            body: b"{}",
        };
        let mut creds = example_credentials();
        creds.session_token = Some("token".into());
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let signed = sign(&request, &creds, "us-east-1", "bedrock", now);
        assert!(signed
            .authorization
            .contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
        let pairs = signed.into_pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1], ("x-amz-security-token", "token".to_string()));
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(
            uri_encode("anthropic.claude-3-haiku-20240307-v1:0", true),
            "anthropic.claude-3-haiku-20240307-v1%3A0"
        );
        // Canonical URIs encode the wire path a second time.
        assert_eq!(
            uri_encode("/model/a%3A0/invoke", false),
            "/model/a%253A0/invoke"
        );
        assert_eq!(uri_encode("a b/c", true), "a%20b%2Fc");
    }

    #[test]
    fn test_header_values_are_normalized() {
        assert_eq!(normalize_header_value("  a   b  c "), "a b c");
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let printed = format!("{:?}", example_credentials());
        assert!(!printed.contains(EXAMPLE_SECRET));
    }
}
