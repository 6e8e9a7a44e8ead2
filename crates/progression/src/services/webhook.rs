//! Signed webhook payloads from the payment provider

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Oldest signature timestamp accepted, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
pub const EVENT_ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// The fields of a checkout session the ledger reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn checkout_session(&self) -> Result<CheckoutSessionObject> {
        Ok(serde_json::from_value(self.data.object.clone())?)
    }
}

fn mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Header value `t=<unix>,v1=<hex>` for a payload signed at `timestamp`.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let signature = hex::encode(mac(secret, timestamp, payload)?.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}

/// Check a `t=..,v1=..` signature header against the shared secret.
///
/// Any one matching `v1` entry is enough. Signatures older than
/// [`SIGNATURE_TOLERANCE_SECS`] are rejected even when they match.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: DateTime<Utc>) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(Error::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(Error::InvalidSignature);
    }

    let expected = mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|bytes| expected.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(Error::InvalidSignature);
    }

    if now.timestamp() - timestamp > SIGNATURE_TOLERANCE_SECS {
        return Err(Error::SignatureExpired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "whsec_test";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_signed_payload_verifies() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, SECRET, now().timestamp() - 10).unwrap();
        verify_signature(payload, &header, SECRET, now()).unwrap();
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let header = sign(b"{\"amount\":100}", SECRET, now().timestamp()).unwrap();
        let err = verify_signature(b"{\"amount\":999}", &header, SECRET, now()).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let header = sign(b"{}", "whsec_other", now().timestamp()).unwrap();
        assert!(matches!(
            verify_signature(b"{}", &header, SECRET, now()),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn test_old_signature_expires() {
        let header = sign(b"{}", SECRET, now().timestamp() - SIGNATURE_TOLERANCE_SECS - 1).unwrap();
        assert!(matches!(
            verify_signature(b"{}", &header, SECRET, now()),
            Err(Error::SignatureExpired)
        ));
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "v1=abcd", "t=notanumber,v1=abcd", "t=1700000000"] {
            assert!(matches!(
                verify_signature(b"{}", header, SECRET, now()),
                Err(Error::InvalidSignature)
            ));
        }
    }

    #[test]
    fn test_any_v1_entry_may_match() {
        let ts = now().timestamp();
        let good = sign(b"{}", SECRET, ts).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={ts},v1=deadbeef,v0=ignored,v1={good_sig}");
        verify_signature(b"{}", &header, SECRET, now()).unwrap();
    }

    #[test]
    fn test_checkout_session_fields() {
        let payload = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_1",
                "amount_total": 700,
                "payment_intent": "pi_1",
                "metadata": {"credits": "20", "purchase_id": "p-1"}
            }}
        }"#;
        let event = WebhookEvent::parse(payload).unwrap();
        assert_eq!(event.event_type, EVENT_CHECKOUT_COMPLETED);
        let session = event.checkout_session().unwrap();
        assert_eq!(session.id, "cs_1");
        assert_eq!(session.amount_total, Some(700));
        assert_eq!(session.metadata.get("credits").map(String::as_str), Some("20"));
    }
}
