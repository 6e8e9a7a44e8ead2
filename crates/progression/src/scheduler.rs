//! Background jobs: monthly credit top-up and stale purchase cleanup

use std::future::Future;
use std::time::Duration;

use chrono::Datelike;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::services::topup::{MAX_RETRIES, RETRY_DELAY};
use crate::services::{AppContext, MonthlyTopUp, PurchaseService};

const TOPUP_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Run `job` until it succeeds, at most [`MAX_RETRIES`] times, waiting
/// `delay * attempt` between attempts.
pub async fn with_retries<T, F, Fut>(name: &str, delay: Duration, mut job: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=MAX_RETRIES {
        match job().await {
            Ok(value) => return Some(value),
            Err(e) if attempt < MAX_RETRIES => {
                warn!(job = name, attempt, error = %e, "Scheduled job failed, retrying");
                tokio::time::sleep(delay * attempt).await;
            }
            Err(e) => error!(job = name, attempts = MAX_RETRIES, error = %e, "Scheduled job failed"),
        }
    }
    None
}

pub struct Scheduler {
    ctx: AppContext,
    top_up: MonthlyTopUp,
    purchases: PurchaseService,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(ctx: AppContext) -> Result<Self> {
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            top_up: MonthlyTopUp::new(ctx.clone()),
            purchases: PurchaseService::new(ctx.clone())?,
            ctx,
            shutdown,
            handles: Vec::new(),
        })
    }

    /// Spawn both jobs. The top-up runs once straight away and then on the
    /// first of each month; cleanup runs daily.
    pub fn start(&mut self) {
        let top_up = self.top_up.clone();
        let clock = self.ctx.clock.clone();
        let mut shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            info!("Monthly top-up scheduler started");
            let top_up = &top_up;
            with_retries("monthly_top_up", RETRY_DELAY, move || top_up.top_up_credits()).await;

            let mut interval = tokio::time::interval(TOPUP_CHECK_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if clock.now().day() == 1 {
                            with_retries("monthly_top_up", RETRY_DELAY, move || top_up.top_up_credits()).await;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Monthly top-up scheduler stopped");
        }));

        let purchases = self.purchases.clone();
        let mut shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            info!("Stale purchase cleanup scheduler started");
            let purchases = &purchases;
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        with_retries("stale_purchase_cleanup", RETRY_DELAY, move || purchases.cleanup_stale_purchases()).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Stale purchase cleanup scheduler stopped");
        }));
    }

    /// Signal both jobs and wait for them to finish their current run.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}
