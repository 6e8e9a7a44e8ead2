//! Credit purchases: checkout, webhook ingestion and stale cleanup

use std::sync::Arc;

use chrono::Duration;
use sea_orm::TransactionTrait;
use tracing::{error, info, warn};

use super::payment::{CheckoutRequest, CheckoutSession, PaymentGateway, StripeGateway};
use super::webhook::{
    self, CheckoutSessionObject, EVENT_ASYNC_PAYMENT_FAILED, EVENT_ASYNC_PAYMENT_SUCCEEDED,
    EVENT_CHECKOUT_COMPLETED, WebhookEvent,
};
use super::AppContext;
use crate::entity::credit_purchases::{self, STATUS_COMPLETED, STATUS_PENDING};
use crate::error::{Error, Result};
use crate::repository;

pub const REASON_PURCHASE: &str = "Purchase: via Stripe";

/// What a delivered webhook event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Credited {
        purchase_id: String,
        user_id: String,
        credits: i32,
    },
    MarkedFailed {
        purchase_id: String,
    },
    /// Acknowledged without changing anything
    Ignored {
        event_type: String,
    },
}

#[derive(Clone)]
pub struct PurchaseService {
    ctx: AppContext,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl PurchaseService {
    /// Uses Stripe when payments are configured, otherwise purchases are disabled.
    pub fn new(ctx: AppContext) -> Result<Self> {
        let gateway = match &ctx.config.payments {
            Some(payments) => Some(Arc::new(StripeGateway::new(payments)?) as Arc<dyn PaymentGateway>),
            None => None,
        };
        Ok(Self { ctx, gateway })
    }

    pub fn with_gateway(ctx: AppContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            ctx,
            gateway: Some(gateway),
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        match (&self.gateway, &self.ctx.config.payments) {
            (Some(gateway), Some(_)) => Ok(gateway),
            _ => Err(Error::PaymentsNotConfigured),
        }
    }

    /// Open a hosted checkout for `credits` and record the pending purchase.
    pub async fn create_checkout(&self, user_id: &str, credits: i32) -> Result<CheckoutSession> {
        let config = &self.ctx.config;
        if credits < config.min_credits_per_purchase || credits > config.max_credits_per_purchase {
            return Err(Error::InvalidCreditAmount(format!(
                "credit amount must be between {} and {}",
                config.min_credits_per_purchase, config.max_credits_per_purchase
            )));
        }
        let gateway = self.gateway()?;
        let currency = config
            .payments
            .as_ref()
            .map(|payments| payments.currency.clone())
            .unwrap_or_default();

        let user = repository::users::get(self.ctx.conn(), user_id).await?;
        let purchase_id = uuid::Uuid::new_v4().to_string();
        let site_url = config.site_url.trim_end_matches('/');
        let request = CheckoutRequest {
            purchase_id: purchase_id.clone(),
            user_id: user.id.clone(),
            email: user.email.clone(),
            credits,
            unit_amount_cents: config.credit_price_cents,
            currency,
            success_url: format!("{site_url}/admin/credits/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{site_url}/admin/credits/cancel"),
        };
        let session = gateway.create_checkout_session(&request).await?;

        let now = self.ctx.clock.now();
        repository::purchases::insert(
            self.ctx.conn(),
            credit_purchases::Model {
                id: purchase_id.clone(),
                user_id: user.id,
                credits,
                amount_paid: credits * config.credit_price_cents,
                external_session_id: session.id.clone(),
                external_customer_id: session.customer_id.clone(),
                external_payment_id: None,
                receipt_url: None,
                status: STATUS_PENDING.to_string(),
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        info!(user_id, purchase_id = %purchase_id, credits, session_id = %session.id, "Created checkout session");
        Ok(session)
    }

    /// Verify and apply one webhook delivery.
    pub async fn handle_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookOutcome> {
        let gateway = self.gateway()?;
        let secret = self
            .ctx
            .config
            .payments
            .as_ref()
            .map(|payments| payments.webhook_secret.as_str())
            .ok_or(Error::PaymentsNotConfigured)?;
        webhook::verify_signature(payload, signature_header, secret, self.ctx.clock.now())?;

        let event = WebhookEvent::parse(payload)?;
        match event.event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED | EVENT_ASYNC_PAYMENT_SUCCEEDED => {
                self.complete_purchase(gateway.as_ref(), &event.checkout_session()?).await
            }
            EVENT_ASYNC_PAYMENT_FAILED => self.fail_purchase(&event.checkout_session()?).await,
            other => {
                info!(event_type = other, "Unhandled webhook event type");
                Ok(WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }

    async fn complete_purchase(
        &self,
        gateway: &dyn PaymentGateway,
        session: &CheckoutSessionObject,
    ) -> Result<WebhookOutcome> {
        let purchase = repository::purchases::get_by_session(self.ctx.conn(), &session.id).await?;
        if purchase.status == STATUS_COMPLETED {
            warn!(purchase_id = %purchase.id, "Purchase already processed");
            return Err(Error::PurchaseAlreadyProcessed);
        }

        let amount_total = session.amount_total.unwrap_or(0);
        if amount_total != i64::from(purchase.amount_paid) {
            error!(
                purchase_id = %purchase.id,
                expected = purchase.amount_paid,
                received = amount_total,
                "Amount mismatch in webhook"
            );
            return Err(Error::PurchaseMismatch(format!(
                "expected {} cents, received {amount_total} cents",
                purchase.amount_paid
            )));
        }
        if let Some(credits) = session.metadata.get("credits") {
            if *credits != purchase.credits.to_string() {
                error!(purchase_id = %purchase.id, expected = purchase.credits, received = %credits, "Credits mismatch in webhook");
                return Err(Error::PurchaseMismatch(format!(
                    "expected {} credits, received {credits}",
                    purchase.credits
                )));
            }
        }

        let receipt_url = match &session.payment_intent {
            Some(payment_intent) => match gateway.receipt_url(payment_intent).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(purchase_id = %purchase.id, error = %e, "Failed to fetch receipt URL");
                    None
                }
            },
            None => None,
        };

        let now = self.ctx.clock.now();
        let txn = self.ctx.conn().begin().await?;
        repository::users::add_credits(&txn, &purchase.user_id, 0, purchase.credits, now).await?;
        repository::credit_adjustments::insert(
            &txn,
            repository::credit_adjustments::new_adjustment(
                purchase.user_id.clone(),
                purchase.credits,
                REASON_PURCHASE,
                Some(purchase.id.clone()),
                now,
            ),
        )
        .await?;
        if !repository::purchases::mark_completed(
            &txn,
            &purchase.id,
            session.payment_intent.clone(),
            receipt_url,
            now,
        )
        .await?
        {
            warn!(purchase_id = %purchase.id, "Purchase completed by a concurrent delivery");
            return Err(Error::PurchaseAlreadyProcessed);
        }
        txn.commit().await.inspect_err(|e| {
            error!(purchase_id = %purchase.id, error = %e, "Failed to commit purchase");
        })?;

        info!(
            purchase_id = %purchase.id,
            user_id = %purchase.user_id,
            credits = purchase.credits,
            session_id = %session.id,
            "Purchase completed"
        );
        Ok(WebhookOutcome::Credited {
            purchase_id: purchase.id,
            user_id: purchase.user_id,
            credits: purchase.credits,
        })
    }

    async fn fail_purchase(&self, session: &CheckoutSessionObject) -> Result<WebhookOutcome> {
        let purchase = repository::purchases::get_by_session(self.ctx.conn(), &session.id).await?;
        let now = self.ctx.clock.now();
        if !repository::purchases::mark_failed(self.ctx.conn(), &purchase.id, now).await? {
            info!(purchase_id = %purchase.id, status = %purchase.status, "Purchase is not pending, ignoring failure");
            return Ok(WebhookOutcome::Ignored {
                event_type: EVENT_ASYNC_PAYMENT_FAILED.to_string(),
            });
        }
        warn!(purchase_id = %purchase.id, user_id = %purchase.user_id, session_id = %session.id, "Purchase failed");
        Ok(WebhookOutcome::MarkedFailed {
            purchase_id: purchase.id,
        })
    }

    /// Delete pending and failed purchases older than the configured age.
    pub async fn cleanup_stale_purchases(&self) -> Result<u64> {
        let cutoff = self.ctx.clock.now() - Duration::days(self.ctx.config.stale_purchase_days);
        let txn = self.ctx.conn().begin().await?;
        let deleted = repository::purchases::delete_stale(&txn, cutoff).await?;
        txn.commit().await?;
        info!(deleted, cutoff = %cutoff, "Cleaned up stale purchases");
        Ok(deleted)
    }
}
