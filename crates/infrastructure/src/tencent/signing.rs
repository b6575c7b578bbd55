//! TC3-HMAC-SHA256 request signing
//!
//! The signature must match the provider's algorithm byte for byte: canonical
//! request → credential scope → string to sign → key derived from
//! `HMAC(HMAC(HMAC("TC3" + secret, date), service), "tc3_request")`.

use chrono::DateTime;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use provisioner_core::{ProvisionerError, ProvisionerResult};

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const SIGNED_HEADERS: &str = "content-type;host;x-tc-action";
const TERMINATOR: &str = "tc3_request";

type HmacSha256 = Hmac<Sha256>;

/// Everything that feeds into one signature
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    pub secret_id: &'a str,
    pub secret_key: &'a str,
    pub service: &'a str,
    pub host: &'a str,
    pub action: &'a str,
    /// Serialized request body, hashed exactly as sent
    pub payload: &'a str,
    /// UTC seconds
    pub timestamp: i64,
}

/// `YYYY-MM-DD` in UTC for the given timestamp
pub fn utc_date(timestamp: i64) -> ProvisionerResult<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .ok_or_else(|| ProvisionerError::Internal(format!("时间戳超出范围: {timestamp}")))
}

pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

fn hmac_sha256(key: &[u8], message: &str) -> ProvisionerResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ProvisionerError::Internal(format!("HMAC初始化失败: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn canonical_request(input: &SigningInput<'_>) -> String {
    let canonical_headers = format!(
        "content-type:{CONTENT_TYPE}\nhost:{}\nx-tc-action:{}\n",
        input.host,
        input.action.to_lowercase()
    );

    format!(
        "POST\n/\n\n{canonical_headers}\n{SIGNED_HEADERS}\n{}",
        sha256_hex(input.payload)
    )
}

pub fn credential_scope(date: &str, service: &str) -> String {
    format!("{date}/{service}/{TERMINATOR}")
}

pub fn string_to_sign(timestamp: i64, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
        sha256_hex(canonical_request)
    )
}

pub fn derive_signing_key(secret_key: &str, date: &str, service: &str) -> ProvisionerResult<Vec<u8>> {
    let secret_date = hmac_sha256(format!("TC3{secret_key}").as_bytes(), date)?;
    let secret_service = hmac_sha256(&secret_date, service)?;
    hmac_sha256(&secret_service, TERMINATOR)
}

/// Build the full `Authorization` header value
pub fn authorization(input: &SigningInput<'_>) -> ProvisionerResult<String> {
    let date = utc_date(input.timestamp)?;
    let scope = credential_scope(&date, input.service);
    let to_sign = string_to_sign(input.timestamp, &scope, &canonical_request(input));
    let signing_key = derive_signing_key(input.secret_key, &date, input.service)?;
    let signature = hex_lower(&hmac_sha256(&signing_key, &to_sign)?);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
        input.secret_id
    ))
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_input(payload: &str) -> SigningInput<'_> {
        SigningInput {
            secret_id: "AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE",
            secret_key: "Gu5t9xGARNpq86cd98joQYCN3EXAMPLE",
            service: "lighthouse",
            host: "lighthouse.tencentcloudapi.com",
            action: "DescribeInstances",
            payload,
            timestamp: 1_551_113_065,
        }
    }

    #[test]
    fn test_utc_date() {
        assert_eq!(utc_date(1_551_113_065).unwrap(), "2019-02-25");
        assert_eq!(utc_date(0).unwrap(), "1970-01-01");
    }

    #[test]
    fn test_payload_hash() {
        assert_eq!(
            sha256_hex(r#"{"InstanceIds":["lhins-abc123"]}"#),
            "ec0a4c9fc92e72e307f7456ca9f008c053ea19ded569fd9b0578fc51e1e48d82"
        );
    }

    #[test]
    fn test_canonical_request_layout() {
        let payload = r#"{"InstanceIds":["lhins-abc123"]}"#;
        let canonical = canonical_request(&reference_input(payload));

        assert_eq!(
            canonical,
            "POST\n/\n\n\
             content-type:application/json; charset=utf-8\n\
             host:lighthouse.tencentcloudapi.com\n\
             x-tc-action:describeinstances\n\
             \n\
             content-type;host;x-tc-action\n\
             ec0a4c9fc92e72e307f7456ca9f008c053ea19ded569fd9b0578fc51e1e48d82"
        );
        assert_eq!(
            sha256_hex(&canonical),
            "730aae806bb1febeb9202a6c03e847a55a52c27cd8c8224549fd5e806ece59bb"
        );
    }

    #[test]
    fn test_authorization_matches_reference_signature() {
        let payload = r#"{"InstanceIds":["lhins-abc123"]}"#;
        let header = authorization(&reference_input(payload)).unwrap();

        assert_eq!(
            header,
            "TC3-HMAC-SHA256 \
             Credential=AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE/2019-02-25/lighthouse/tc3_request, \
             SignedHeaders=content-type;host;x-tc-action, \
             Signature=79cdb14fcd6891188b13627e1beb5e7d319774f65ccb009a9623605608832976"
        );
    }

    #[test]
    fn test_signature_depends_on_payload() {
        let a = authorization(&reference_input("{}")).unwrap();
        let b = authorization(&reference_input(r#"{"Limit":1}"#)).unwrap();
        assert_ne!(a, b);
    }
}
