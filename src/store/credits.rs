//! Monthly story credits.
//!
//! Every user gets [`MONTHLY_LIMIT`] stories per calendar month. The balance
//! refills on the first day of the next month (UTC), the first time it is
//! loaded at or after that instant.

use super::KeyValueStore;
use crate::error::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Store key holding the credit balance.
pub const CREDITS_KEY: &str = "story_credits";

/// Stories allowed per month.
pub const MONTHLY_LIMIT: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub balance: u32,
    pub used: u32,
    pub limit: u32,
    pub reset_date: DateTime<Utc>,
}

impl CreditBalance {
    /// A full balance that resets at the start of the month after `now`.
    pub fn fresh(limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            balance: limit,
            used: 0,
            limit,
            reset_date: first_of_next_month(now),
        }
    }

    pub fn can_use(&self) -> bool {
        self.balance > 0
    }
}

/// Midnight UTC on the first day of the month after `now`.
pub fn first_of_next_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| now + Duration::days(31))
}

/// Credit bookkeeping over a [`KeyValueStore`].
///
/// Every method has an `_at` twin taking the current time, for tests.
pub struct CreditLedger<S> {
    store: S,
    limit: u32,
}

impl<S: KeyValueStore> CreditLedger<S> {
    pub fn new(store: S) -> Self {
        Self::with_limit(store, MONTHLY_LIMIT)
    }

    pub fn with_limit(store: S, limit: u32) -> Self {
        Self { store, limit }
    }

    /// Current balance, creating or refilling it as needed.
    pub fn balance(&self) -> Result<CreditBalance> {
        self.balance_at(Utc::now())
    }

    pub fn balance_at(&self, now: DateTime<Utc>) -> Result<CreditBalance> {
        let stored: Option<CreditBalance> = match self.store.load(CREDITS_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        match stored {
            Some(credits) if now < credits.reset_date => Ok(credits),
            Some(_) => {
                let credits = CreditBalance::fresh(self.limit, now);
                info!(reset_date = %credits.reset_date, "monthly credits refilled");
                self.write(&credits)?;
                Ok(credits)
            }
            None => {
                let credits = CreditBalance::fresh(self.limit, now);
                self.write(&credits)?;
                Ok(credits)
            }
        }
    }

    fn write(&self, credits: &CreditBalance) -> Result<()> {
        self.store
            .save(CREDITS_KEY, &serde_json::to_string(credits)?)
    }

    /// Spend one credit. Returns `false`, spending nothing, when none are left.
    pub fn use_credit(&self) -> Result<bool> {
        self.use_credit_at(Utc::now())
    }

    pub fn use_credit_at(&self, now: DateTime<Utc>) -> Result<bool> {
        let mut credits = self.balance_at(now)?;
        if !credits.can_use() {
            debug!(used = credits.used, "no credits left this month");
            return Ok(false);
        }
        credits.balance -= 1;
        credits.used += 1;
        self.write(&credits)?;
        Ok(true)
    }

    pub fn can_use_credit(&self) -> Result<bool> {
        Ok(self.balance()?.can_use())
    }

    /// Whole days until the next refill, rounded up.
    pub fn days_until_reset(&self) -> Result<i64> {
        self.days_until_reset_at(Utc::now())
    }

    pub fn days_until_reset_at(&self, now: DateTime<Utc>) -> Result<i64> {
        let credits = self.balance_at(now)?;
        let secs = (credits.reset_date - now).num_seconds().max(0);
        Ok((secs + 86_399) / 86_400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_first_of_next_month() {
        assert_eq!(first_of_next_month(at(2026, 1, 31, 23)), at(2026, 2, 1, 0));
        assert_eq!(first_of_next_month(at(2026, 12, 5, 10)), at(2027, 1, 1, 0));
    }

    #[test]
    fn test_first_load_creates_full_balance() {
        let ledger = CreditLedger::new(MemoryStore::new());
        let credits = ledger.balance_at(at(2026, 10, 17, 12)).unwrap();
        assert_eq!(credits.balance, 3);
        assert_eq!(credits.used, 0);
        assert_eq!(credits.reset_date, at(2026, 11, 1, 0));
    }

    #[test]
    fn test_credits_run_out() {
        let ledger = CreditLedger::new(MemoryStore::new());
        let now = at(2026, 10, 17, 12);
        for _ in 0..3 {
            assert!(ledger.use_credit_at(now).unwrap());
        }
        assert!(!ledger.use_credit_at(now).unwrap());
        let credits = ledger.balance_at(now).unwrap();
        assert_eq!((credits.balance, credits.used), (0, 3));
    }

    #[test]
    fn test_refill_at_reset_date() {
        let ledger = CreditLedger::new(MemoryStore::new());
        let october = at(2026, 10, 17, 12);
        for _ in 0..3 {
            ledger.use_credit_at(october).unwrap();
        }
        // Still October: nothing refilled.
        assert!(!ledger.use_credit_at(at(2026, 10, 31, 23)).unwrap());

        let november = at(2026, 11, 1, 0);
        let credits = ledger.balance_at(november).unwrap();
        assert_eq!(credits.balance, 3);
        assert_eq!(credits.reset_date, at(2026, 12, 1, 0));
        assert!(ledger.use_credit_at(november).unwrap());
    }

    #[test]
    fn test_days_until_reset_rounds_up() {
        let ledger = CreditLedger::new(MemoryStore::new());
        assert_eq!(ledger.days_until_reset_at(at(2026, 10, 30, 12)).unwrap(), 2);
        assert_eq!(ledger.days_until_reset_at(at(2026, 10, 31, 0)).unwrap(), 1);
    }

    #[test]
    fn test_custom_limit() {
        let ledger = CreditLedger::with_limit(MemoryStore::new(), 1);
        let now = at(2026, 10, 17, 12);
        assert!(ledger.use_credit_at(now).unwrap());
        assert!(!ledger.use_credit_at(now).unwrap());
    }
}
