//! Credit ledger: balances, debits for team starts, and reporting

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::Serialize;
use tracing::{debug, info};

use super::AppContext;
use crate::entity::{credit_adjustments, team_start_logs};
use crate::error::{Error, Result};
use crate::repository;
use crate::repository::users::CreditBucket;

pub const REASON_TEAM_START: &str = "Team start";
pub const REASON_ADMIN: &str = "Admin";
pub const REASON_GIFT: &str = "Gift";

const DEFAULT_PAGE_SIZE: u64 = 25;
const DEFAULT_SUMMARY_DAYS: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct CreditAdjustmentFilter {
    pub user_id: String,
    /// 0 means the default page size
    pub limit: u64,
    pub offset: u64,
}

/// Period the team-start summary is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "day" => Ok(GroupBy::Day),
            "week" => Ok(GroupBy::Week),
            "month" => Ok(GroupBy::Month),
            "year" => Ok(GroupBy::Year),
            other => Err(Error::InvalidInput(format!(
                "groupBy must be one of: day, week, month, year (got {other})"
            ))),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupBy::Day => "day",
            GroupBy::Week => "week",
            GroupBy::Month => "month",
            GroupBy::Year => "year",
        };
        f.write_str(name)
    }
}

impl GroupBy {
    pub fn key(self, at: DateTime<Utc>) -> String {
        match self {
            GroupBy::Day => at.format("%Y-%m-%d").to_string(),
            GroupBy::Week => {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            GroupBy::Month => at.format("%Y-%m").to_string(),
            GroupBy::Year => at.format("%Y").to_string(),
        }
    }

    /// Start of the period containing `at`. Weeks start on Monday.
    fn truncate(self, at: DateTime<Utc>) -> NaiveDate {
        let date = at.date_naive();
        match self {
            GroupBy::Day => date,
            GroupBy::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            GroupBy::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
            GroupBy::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    fn next(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            GroupBy::Day => date.succ_opt(),
            GroupBy::Week => date.checked_add_signed(Duration::days(7)),
            GroupBy::Month => date.checked_add_months(Months::new(1)),
            GroupBy::Year => date.checked_add_months(Months::new(12)),
        }
    }

    /// Shift `at` by one period, backwards or forwards.
    fn pad(self, at: DateTime<Utc>, forward: bool) -> DateTime<Utc> {
        let shifted = match (self, forward) {
            (GroupBy::Day, true) => at.checked_add_signed(Duration::days(1)),
            (GroupBy::Day, false) => at.checked_sub_signed(Duration::days(1)),
            (GroupBy::Week, true) => at.checked_add_signed(Duration::days(7)),
            (GroupBy::Week, false) => at.checked_sub_signed(Duration::days(7)),
            (GroupBy::Month, true) => at.checked_add_months(Months::new(1)),
            (GroupBy::Month, false) => at.checked_sub_months(Months::new(1)),
            (GroupBy::Year, true) => at.checked_add_months(Months::new(12)),
            (GroupBy::Year, false) => at.checked_sub_months(Months::new(12)),
        };
        shifted.unwrap_or(at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeamStartLogFilter {
    pub user_id: String,
    pub instance_id: Option<String>,
    /// The range only applies when both ends are set
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub group_by: GroupBy,
}

impl TeamStartLogFilter {
    fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.start.zip(self.end)
    }
}

/// One bucket of the team-start summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStartSummary {
    pub date: DateTime<Utc>,
    pub key: String,
    pub count: u64,
    /// Count relative to the busiest bucket, 0 when every bucket is empty
    pub ratio: f64,
}

/// Bucket team starts into zero-filled periods from `start` to `end` inclusive.
pub fn summarize(
    logs: &[team_start_logs::Model],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    group_by: GroupBy,
) -> Vec<TeamStartSummary> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for log in logs {
        *counts.entry(group_by.key(log.created_at)).or_default() += 1;
    }

    let mut buckets = Vec::new();
    let last = group_by.truncate(end);
    let mut current = Some(group_by.truncate(start));
    while let Some(date) = current.filter(|date| *date <= last) {
        let at = date.and_time(NaiveTime::MIN).and_utc();
        let key = group_by.key(at);
        buckets.push(TeamStartSummary {
            date: at,
            count: counts.get(&key).copied().unwrap_or(0),
            key,
            ratio: 0.0,
        });
        current = group_by.next(date);
    }

    let busiest = buckets.iter().map(|bucket| bucket.count).max().unwrap_or(0);
    if busiest > 0 {
        for bucket in &mut buckets {
            bucket.ratio = bucket.count as f64 / busiest as f64;
        }
    }
    buckets
}

#[derive(Clone)]
pub struct CreditService {
    ctx: AppContext,
}

impl CreditService {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Current `(free, paid)` balance.
    pub async fn get_credit_balance(&self, user_id: &str) -> Result<(i32, i32)> {
        let user = repository::users::get(self.ctx.conn(), user_id).await?;
        Ok((user.free_credits, user.paid_credits))
    }

    /// Grant credits to one counter and record why.
    pub async fn add_credits(&self, user_id: &str, free: i32, paid: i32, reason: &str) -> Result<()> {
        if reason.trim().is_empty() {
            return Err(Error::InvalidCreditAmount("reason is required".to_string()));
        }
        if free > 0 && paid > 0 {
            return Err(Error::InvalidCreditAmount(
                "cannot add both free and paid credits at the same time".to_string(),
            ));
        }
        if free < 0 || paid < 0 {
            return Err(Error::InvalidCreditAmount(
                "credits to add must be greater than zero".to_string(),
            ));
        }
        if free == 0 && paid == 0 {
            return Err(Error::InvalidCreditAmount("must add at least one credit".to_string()));
        }

        let now = self.ctx.clock.now();
        let txn = self.ctx.conn().begin().await?;
        repository::users::add_credits(&txn, user_id, free, paid, now).await?;
        repository::credit_adjustments::insert(
            &txn,
            repository::credit_adjustments::new_adjustment(user_id, free + paid, reason, None, now),
        )
        .await?;
        txn.commit().await?;

        info!(user_id, free, paid, reason, "Credits added");
        Ok(())
    }

    /// Spend one credit on a team start inside the caller's transaction.
    ///
    /// Fails with [`Error::InsufficientCredits`] when both counters are empty,
    /// in which case nothing has been written.
    pub async fn deduct_credit_for_team_start<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        team_id: &str,
        instance_id: &str,
    ) -> Result<CreditBucket> {
        let now = self.ctx.clock.now();
        let bucket = repository::users::deduct_one_credit(db, user_id, now)
            .await?
            .ok_or(Error::InsufficientCredits)?;

        repository::credit_adjustments::insert(
            db,
            repository::credit_adjustments::new_adjustment(user_id, -1, REASON_TEAM_START, None, now),
        )
        .await?;
        repository::team_start_logs::insert(
            db,
            team_start_logs::Model {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                team_id: team_id.to_string(),
                instance_id: instance_id.to_string(),
                created_at: now,
            },
        )
        .await?;

        debug!(user_id, team_id, ?bucket, "Credit deducted for team start");
        Ok(bucket)
    }

    /// A page of the user's ledger, newest first.
    pub async fn get_credit_adjustments(
        &self,
        filter: &CreditAdjustmentFilter,
    ) -> Result<Vec<credit_adjustments::Model>> {
        let limit = if filter.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            filter.limit
        };
        repository::credit_adjustments::find_by_user(
            self.ctx.conn(),
            &filter.user_id,
            Some(limit),
            filter.offset,
        )
        .await
    }

    pub async fn get_team_start_logs(
        &self,
        filter: &TeamStartLogFilter,
    ) -> Result<Vec<team_start_logs::Model>> {
        repository::team_start_logs::find(
            self.ctx.conn(),
            &filter.user_id,
            filter.instance_id.as_deref(),
            filter.range(),
        )
        .await
    }

    /// Team starts bucketed by period, zero-filled across the range.
    pub async fn get_team_start_logs_summary(
        &self,
        filter: &TeamStartLogFilter,
    ) -> Result<Vec<TeamStartSummary>> {
        let logs = self.get_team_start_logs(filter).await?;
        let (start, end) = match filter.range() {
            Some(range) => range,
            None => match (logs.last(), logs.first()) {
                (Some(earliest), Some(latest)) => (
                    filter.group_by.pad(earliest.created_at, false),
                    filter.group_by.pad(latest.created_at, true),
                ),
                _ => {
                    let now = self.ctx.clock.now();
                    (now - Duration::days(DEFAULT_SUMMARY_DAYS), now)
                }
            },
        };
        Ok(summarize(&logs, start, end, filter.group_by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 15, 30, 0).unwrap()
    }

    fn log(created_at: DateTime<Utc>) -> team_start_logs::Model {
        team_start_logs::Model {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u".into(),
            team_id: "t".into(),
            instance_id: "i".into(),
            created_at,
        }
    }

    #[test]
    fn test_group_by_parse() {
        assert_eq!("".parse::<GroupBy>().unwrap(), GroupBy::Day);
        assert_eq!("week".parse::<GroupBy>().unwrap(), GroupBy::Week);
        assert!(matches!("hour".parse::<GroupBy>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_keys() {
        let date = at(2025, 1, 1);
        assert_eq!(GroupBy::Day.key(date), "2025-01-01");
        assert_eq!(GroupBy::Week.key(date), "2025-W01");
        assert_eq!(GroupBy::Month.key(date), "2025-01");
        assert_eq!(GroupBy::Year.key(date), "2025");
        // 2024-12-30 is a Monday in ISO week 1 of 2025
        assert_eq!(GroupBy::Week.key(at(2024, 12, 30)), "2025-W01");
    }

    #[test]
    fn test_daily_summary_is_zero_filled() {
        let logs = vec![log(at(2025, 3, 4)), log(at(2025, 3, 2)), log(at(2025, 3, 2))];
        let summary = summarize(&logs, at(2025, 3, 1), at(2025, 3, 5), GroupBy::Day);
        let counts: Vec<u64> = summary.iter().map(|bucket| bucket.count).collect();
        assert_eq!(counts, vec![0, 2, 0, 1, 0]);
        assert_eq!(summary[1].ratio, 1.0);
        assert_eq!(summary[3].ratio, 0.5);
        assert_eq!(summary[0].date, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_weekly_buckets_start_on_monday() {
        // Wednesday and the following Sunday share a week
        let logs = vec![log(at(2025, 3, 9)), log(at(2025, 3, 5))];
        let summary = summarize(&logs, at(2025, 3, 5), at(2025, 3, 12), GroupBy::Week);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].date.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[1].count, 0);
    }

    #[test]
    fn test_monthly_buckets_cross_year() {
        let logs = vec![log(at(2025, 1, 20))];
        let summary = summarize(&logs, at(2024, 11, 15), at(2025, 2, 1), GroupBy::Month);
        let keys: Vec<&str> = summary.iter().map(|bucket| bucket.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
        assert_eq!(summary[2].count, 1);
    }

    #[test]
    fn test_empty_summary_has_zero_ratios() {
        let summary = summarize(&[], at(2025, 1, 1), at(2025, 1, 3), GroupBy::Day);
        assert_eq!(summary.len(), 3);
        assert!(summary.iter().all(|bucket| bucket.ratio == 0.0));
    }
}
