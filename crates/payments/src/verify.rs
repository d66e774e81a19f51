//! Webhook signature verification.
//!
//! Signatures follow the Standard Webhooks scheme: the provider sends
//! `webhook-id`, `webhook-timestamp` and `webhook-signature` headers, where the
//! signature is `v1,<base64 HMAC-SHA256 of "{id}.{timestamp}.{body}">`.
//! Several space-separated signatures may be sent during key rotation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{ReconcileError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const WEBHOOK_ID_HEADER: &str = "webhook-id";
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "webhook-timestamp";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "webhook-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Signature headers lifted from the HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
}

/// Decides whether a webhook body really came from the provider.
pub trait WebhookVerifier: Send + Sync {
    fn verify(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<()>;
}

impl<T: WebhookVerifier + ?Sized> WebhookVerifier for std::sync::Arc<T> {
    fn verify(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<()> {
        (**self).verify(headers, body)
    }
}

/// Accepts everything. For local development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVerifier;

impl WebhookVerifier for NoopVerifier {
    fn verify(&self, _headers: &WebhookHeaders, _body: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// HMAC-SHA256 verifier for Standard Webhooks signatures.
#[derive(Clone)]
pub struct HmacWebhookVerifier {
    key: Vec<u8>,
    tolerance: chrono::Duration,
}

impl std::fmt::Debug for HmacWebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacWebhookVerifier")
            .field("key", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl HmacWebhookVerifier {
    /// Builds a verifier from the shared secret.
    ///
    /// A `whsec_`-prefixed secret is base64-decoded; anything else is used as
    /// raw bytes.
    pub fn new(secret: &str) -> Result<Self> {
        let key = match secret.strip_prefix(SECRET_PREFIX) {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map_err(|e| ReconcileError::Verification(format!("malformed secret: {e}")))?,
            None => secret.as_bytes().to_vec(),
        };
        if key.is_empty() {
            return Err(ReconcileError::Verification(
                "webhook secret must not be empty".to_string(),
            ));
        }

        Ok(Self {
            key,
            tolerance: chrono::Duration::minutes(5),
        })
    }

    /// Maximum allowed distance between the signed timestamp and now.
    pub fn with_tolerance(mut self, tolerance: chrono::Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Produces the signature header value for a message.
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> Result<String> {
        let mac = self.mac(id, &timestamp.to_string(), body)?;
        Ok(format!(
            "{SIGNATURE_VERSION},{}",
            STANDARD.encode(mac.finalize().into_bytes())
        ))
    }

    /// Verifies a message against an explicit clock.
    pub fn verify_at(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let id = required(&headers.id, WEBHOOK_ID_HEADER)?;
        let timestamp = required(&headers.timestamp, WEBHOOK_TIMESTAMP_HEADER)?;
        let signatures = required(&headers.signature, WEBHOOK_SIGNATURE_HEADER)?;

        let sent_at: i64 = timestamp.trim().parse().map_err(|_| {
            ReconcileError::Verification(format!("invalid {WEBHOOK_TIMESTAMP_HEADER} header"))
        })?;
        let skew = now.timestamp().abs_diff(sent_at);
        let tolerance = u64::try_from(self.tolerance.num_seconds()).unwrap_or(0);
        if skew > tolerance {
            return Err(ReconcileError::Verification(format!(
                "timestamp is {skew}s away from now"
            )));
        }

        let mac = self.mac(id, timestamp.trim(), body)?;
        let matched = signatures
            .split_whitespace()
            .filter_map(|candidate| candidate.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, encoded)| STANDARD.decode(encoded).ok())
            .any(|signature| mac.clone().verify_slice(&signature).is_ok());

        if matched {
            tracing::trace!(webhook_id = %id, "webhook signature verified");
            Ok(())
        } else {
            tracing::warn!(webhook_id = %id, "no matching webhook signature");
            Err(ReconcileError::Verification(
                "no matching signature".to_string(),
            ))
        }
    }

    fn mac(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| ReconcileError::Verification(e.to_string()))?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }
}

impl WebhookVerifier for HmacWebhookVerifier {
    fn verify(&self, headers: &WebhookHeaders, body: &[u8]) -> Result<()> {
        self.verify_at(headers, body, Utc::now())
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ReconcileError::Verification(format!("missing {name} header")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"type":"payment.succeeded"}"#;

    fn signed(verifier: &HmacWebhookVerifier, timestamp: i64) -> WebhookHeaders {
        WebhookHeaders {
            id: Some("msg_1".to_string()),
            timestamp: Some(timestamp.to_string()),
            signature: Some(verifier.sign("msg_1", timestamp, BODY).unwrap()),
        }
    }

    #[test]
    fn accepts_valid_signature() {
        let verifier = HmacWebhookVerifier::new("topsecret").unwrap();
        let now = Utc::now();
        let headers = signed(&verifier, now.timestamp());

        assert!(verifier.verify_at(&headers, BODY, now).is_ok());
    }

    #[test]
    fn accepts_any_of_several_signatures() {
        let verifier = HmacWebhookVerifier::new("topsecret").unwrap();
        let now = Utc::now();
        let mut headers = signed(&verifier, now.timestamp());
        headers.signature = Some(format!(
            "v1,AAAA {}",
            headers.signature.take().unwrap()
        ));

        assert!(verifier.verify_at(&headers, BODY, now).is_ok());
    }

    #[test]
    fn rejects_tampered_body_and_wrong_key() {
        let verifier = HmacWebhookVerifier::new("topsecret").unwrap();
        let now = Utc::now();
        let headers = signed(&verifier, now.timestamp());

        assert!(verifier.verify_at(&headers, b"{}", now).is_err());

        let other = HmacWebhookVerifier::new("othersecret").unwrap();
        assert!(other.verify_at(&headers, BODY, now).is_err());
    }

    #[test]
    fn rejects_stale_timestamp_and_missing_headers() {
        let verifier = HmacWebhookVerifier::new("topsecret").unwrap();
        let now = Utc::now();
        let stale = signed(&verifier, now.timestamp() - 600);
        assert!(matches!(
            verifier.verify_at(&stale, BODY, now),
            Err(ReconcileError::Verification(_))
        ));

        for extreme in [i64::MIN, i64::MAX] {
            assert!(matches!(
                verifier.verify_at(&signed(&verifier, extreme), BODY, now),
                Err(ReconcileError::Verification(_))
            ));
        }

        assert!(verifier.verify_at(&WebhookHeaders::default(), BODY, now).is_err());
    }

    #[test]
    fn decodes_prefixed_secret() {
        let raw = HmacWebhookVerifier::new("abc").unwrap();
        let prefixed = HmacWebhookVerifier::new(&format!("whsec_{}", STANDARD.encode("abc"))).unwrap();
        let now = Utc::now();

        let headers = signed(&raw, now.timestamp());
        assert!(prefixed.verify_at(&headers, BODY, now).is_ok());
        assert!(HmacWebhookVerifier::new("whsec_!!!").is_err());
    }
}
