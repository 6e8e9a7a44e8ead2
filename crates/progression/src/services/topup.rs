//! Monthly free-credit top-up

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use sea_orm::TransactionTrait;
use tracing::{error, info, warn};

use super::AppContext;
use crate::error::Result;
use crate::repository;

pub const TOPUP_PREFIX_REGULAR: &str = "Monthly free credit top-up for regular user";
pub const TOPUP_PREFIX_EDUCATOR: &str = "Monthly free credit top-up for educator";

pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// What one top-up run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopUpReport {
    pub regular_users: u64,
    pub educators: u64,
    /// Classes already topped up this month
    pub skipped: Vec<&'static str>,
    /// Credit levels that still failed after every retry
    pub failed_levels: Vec<(bool, i32)>,
}

#[derive(Clone)]
pub struct MonthlyTopUp {
    ctx: AppContext,
    retry_delay: Duration,
}

impl MonthlyTopUp {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Raise every user below their class ceiling back up to it, once per calendar month.
    pub async fn top_up_credits(&self) -> Result<TopUpReport> {
        let mut report = TopUpReport::default();
        for (is_educator, prefix) in [(false, TOPUP_PREFIX_REGULAR), (true, TOPUP_PREFIX_EDUCATOR)] {
            if self.already_topped_up(prefix).await? {
                info!(prefix, "Monthly top-up already ran this month");
                report.skipped.push(prefix);
                continue;
            }

            let ceiling = self.ctx.config.free_credit_ceiling(is_educator);
            let reason = format!("{prefix}: topped up to {ceiling}");
            let mut raised = 0;
            for level in 0..ceiling {
                match self.level_with_retry(is_educator, level, ceiling, &reason).await {
                    Ok(count) => raised += count,
                    Err(e) => {
                        error!(
                            is_educator,
                            level,
                            error = %e,
                            "Top-up failed after {MAX_RETRIES} attempts, continuing with next level"
                        );
                        report.failed_levels.push((is_educator, level));
                    }
                }
            }

            if is_educator {
                report.educators = raised;
            } else {
                report.regular_users = raised;
            }
            info!(is_educator, ceiling, users = raised, "Monthly top-up finished");
        }
        Ok(report)
    }

    async fn already_topped_up(&self, prefix: &str) -> Result<bool> {
        let latest = repository::credit_adjustments::latest_with_prefix(self.ctx.conn(), prefix).await?;
        Ok(latest.is_some_and(|adjustment| same_month(adjustment.created_at, self.ctx.clock.now())))
    }

    async fn level_with_retry(&self, is_educator: bool, level: i32, ceiling: i32, reason: &str) -> Result<u64> {
        let mut attempt = 1;
        loop {
            match self.top_up_level(is_educator, level, ceiling, reason).await {
                Ok(count) => return Ok(count),
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(attempt, is_educator, level, error = %e, "Top-up attempt failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Users of one class holding exactly `level` free credits, in one transaction.
    async fn top_up_level(&self, is_educator: bool, level: i32, ceiling: i32, reason: &str) -> Result<u64> {
        let now = self.ctx.clock.now();
        let txn = self.ctx.conn().begin().await?;
        let users = repository::users::lock_with_free_credits(&txn, is_educator, level).await?;
        if users.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = users.into_iter().map(|user| user.id).collect();
        let raised = repository::users::raise_free_credits(&txn, ids.clone(), level, ceiling, now).await?;
        for user_id in ids {
            repository::credit_adjustments::insert(
                &txn,
                repository::credit_adjustments::new_adjustment(user_id, ceiling - level, reason, None, now),
            )
            .await?;
        }
        txn.commit().await?;
        Ok(raised)
    }
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_same_month() {
        let march = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 0).unwrap();
        assert!(same_month(march, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()));
        assert!(!same_month(march, Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()));
        assert!(!same_month(march, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()));
    }
}
