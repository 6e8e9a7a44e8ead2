//! Payment provider seam and its Stripe implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::PaymentConfig;
use crate::error::{Error, Result};

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Everything the provider needs to open a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Also used as the idempotency key
    pub purchase_id: String,
    pub user_id: String,
    pub email: String,
    pub credits: i32,
    pub unit_amount_cents: i32,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "customer")]
    pub customer_id: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;

    /// Receipt of the first charge made for a payment intent, if any.
    async fn receipt_url(&self, payment_intent_id: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ChargeList {
    #[serde(default)]
    data: Vec<Charge>,
}

#[derive(Debug, Deserialize)]
struct Charge {
    #[serde(default)]
    receipt_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Talks to the Stripe REST API with form-encoded requests.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        Self::with_base_url(config, STRIPE_API_URL)
    }

    pub fn with_base_url(config: &PaymentConfig, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Gateway(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            return Err(Error::Gateway(format!("{status}: {message}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Gateway(format!("Invalid response: {e}")))
    }
}

fn checkout_form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("customer_email", request.email.clone()),
        ("line_items[0][quantity]", request.credits.to_string()),
        ("line_items[0][price_data][currency]", request.currency.clone()),
        (
            "line_items[0][price_data][unit_amount]",
            request.unit_amount_cents.to_string(),
        ),
        ("line_items[0][price_data][product_data][name]", "Credits".to_string()),
        (
            "line_items[0][price_data][product_data][description]",
            format!("{} credits for team starts", request.credits),
        ),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("metadata[user_id]", request.user_id.clone()),
        ("metadata[purchase_id]", request.purchase_id.clone()),
        ("metadata[credits]", request.credits.to_string()),
    ]
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        debug!(purchase_id = %request.purchase_id, credits = request.credits, "Creating checkout session");
        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &request.purchase_id)
            .form(&checkout_form(request))
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("Failed to create checkout session: {e}")))?;
        Self::parse(response).await
    }

    async fn receipt_url(&self, payment_intent_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/charges", self.base_url))
            .bearer_auth(&self.secret_key)
            .query(&[("payment_intent", payment_intent_id), ("limit", "1")])
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("Failed to list charges: {e}")))?;
        let charges: ChargeList = Self::parse(response).await?;
        Ok(charges
            .data
            .into_iter()
            .next()
            .and_then(|charge| charge.receipt_url)
            .filter(|url| !url.is_empty()))
    }
}
