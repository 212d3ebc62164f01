use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const GATEWAY_LABEL: &str = "Razorpay";

#[derive(Serialize)]
struct OrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

/// An order as returned by the gateway; `body` is the untouched JSON response.
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub id: String,
    pub body: serde_json::Value,
}

pub struct RazorpayClient {
    client: Client,
    orders_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(
        orders_url: String,
        key_id: String,
        key_secret: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build gateway client: {err}")))?;

        Ok(Self {
            client,
            orders_url,
            key_id,
            key_secret,
        })
    }

    pub async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let request = OrderRequest {
            amount: to_minor_units(amount)?,
            currency,
            receipt,
            payment_capture: 1,
        };

        let response = self
            .client
            .post(&self.orders_url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|err| AppError::Gateway(format!("payment gateway unreachable: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| AppError::Gateway(format!("failed to read gateway response: {err}")))?;

        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "failed to create gateway order: {status} {text}"
            )));
        }

        let body: serde_json::Value = serde_json::from_str(&text)
            .map_err(|err| AppError::Gateway(format!("gateway returned invalid json: {err}")))?;
        let id = body
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| AppError::Gateway("gateway order has no id".to_string()))?
            .to_string();

        tracing::info!(order_id = %id, receipt, "gateway order created");
        Ok(GatewayOrder { id, body })
    }

    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        signature_matches(&self.key_secret, order_id, payment_id, signature)
    }
}

/// Amount in the smallest currency unit, truncated.
pub fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "amount must be positive, got {amount}"
        )));
    }

    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| AppError::InvalidInput(format!("amount {amount} is out of range")))
}

fn signature_mac(secret: &str, order_id: &str, payment_id: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| AppError::Internal(format!("invalid gateway secret: {err}")))?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

/// Lower-case hex HMAC-SHA256 of `order_id|payment_id`.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> Result<String, AppError> {
    let mac = signature_mac(secret, order_id, payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compares in constant time; a signature that is not lower-case hex never matches.
pub fn signature_matches(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let signature = signature.trim();
    if !signature
        .bytes()
        .all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
    {
        return false;
    }
    let Ok(provided) = hex::decode(signature) else {
        return false;
    };

    match signature_mac(secret, order_id, payment_id) {
        Ok(mac) => mac.verify_slice(&provided).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{sign, signature_matches, to_minor_units, RazorpayClient};
    use crate::error::AppError;

    #[test]
    fn signature_is_lower_hex_sha256() {
        let signature = sign("secret", "order_1", "pay_1").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert!(signature_matches("secret", "order_1", "pay_1", &signature));
    }

    #[test]
    fn tampered_payment_id_does_not_match() {
        let signature = sign("secret", "order_1", "pay_1").unwrap();
        assert!(!signature_matches("secret", "order_1", "pay_2", &signature));
        assert!(!signature_matches("other", "order_1", "pay_1", &signature));
    }

    #[test]
    fn non_hex_or_truncated_signature_does_not_match() {
        let signature = sign("secret", "order_1", "pay_1").unwrap();
        assert!(!signature_matches("secret", "order_1", "pay_1", "not-hex"));
        assert!(!signature_matches("secret", "order_1", "pay_1", &signature[..62]));
    }

    #[test]
    fn upper_case_signature_does_not_match() {
        let signature = sign("secret", "order_1", "pay_1").unwrap();
        let shouted = signature.to_ascii_uppercase();
        assert_ne!(shouted, signature);
        assert!(!signature_matches("secret", "order_1", "pay_1", &shouted));
    }

    #[test]
    fn minor_units_truncate() {
        assert_eq!(to_minor_units(Decimal::new(6648, 2)).unwrap(), 6648);
        assert_eq!(to_minor_units(Decimal::new(41999, 3)).unwrap(), 4199);
        assert!(matches!(
            to_minor_units(Decimal::ZERO),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn create_order_posts_paise_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            // base64("key:secret")
            .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
            .and(body_json(json!({
                "amount": 4100,
                "currency": "INR",
                "receipt": "ride-1",
                "payment_capture": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_abc",
                "amount": 4100,
                "status": "created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RazorpayClient::new(
            format!("{}/v1/orders", server.uri()),
            "key".to_string(),
            "secret".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        let order = client
            .create_order(Decimal::new(4100, 2), "INR", "ride-1")
            .await
            .unwrap();

        assert_eq!(order.id, "order_abc");
        assert_eq!(order.body["status"], "created");
    }

    #[tokio::test]
    async fn gateway_rejection_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = RazorpayClient::new(
            format!("{}/v1/orders", server.uri()),
            "key".to_string(),
            "wrong".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client
            .create_order(Decimal::new(100, 0), "INR", "ride-9")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
    }
}
