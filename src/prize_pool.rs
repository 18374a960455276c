//! Weekly prize pool estimated from recorded game purchases.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{Amount, WalletAddress};
use crate::leaderboard::{week_start, GameType};
use crate::storage::{KvStore, KvStoreExt, StorageError};

pub const PURCHASE_EVENTS_KEY: &str = "purchaseEvents";
/// Share of the week's fees that goes into the pool, in percent.
pub const POOL_SHARE_PERCENT: Amount = 10;
/// Payout percentages for positions 1 to 5.
pub const REWARD_SPLITS: [u8; 5] = [50, 25, 15, 7, 3];
pub const CACHE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseEvent {
    pub wallet_address: WalletAddress,
    pub amount: Amount,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub game_type: GameType,
}

pub fn load_purchases<S: KvStore + ?Sized>(store: &S) -> Result<Vec<PurchaseEvent>, StorageError> {
    store.get_list(PURCHASE_EVENTS_KEY)
}

pub fn record_purchase<S: KvStore + ?Sized>(store: &mut S, event: PurchaseEvent) -> Result<(), StorageError> {
    let mut events = load_purchases(store)?;
    events.push(event);
    store.set_json(PURCHASE_EVENTS_KEY, &events)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub position: u8,
    pub percentage: u8,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrizePool {
    pub total_fees: Amount,
    pub total_pool: Amount,
    pub participants: u64,
    pub ends_at: DateTime<Utc>,
    pub rewards: Vec<Reward>,
    pub computed_at: DateTime<Utc>,
}

impl PrizePool {
    /// `Monday, Oct 19 at 00:00 UTC`
    pub fn end_date_label(&self) -> String {
        format!("{} at 00:00 UTC", self.ends_at.format("%A, %b %-d"))
    }
}

/// Next Monday 00:00 UTC strictly after `now`.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    week_start(now) + Duration::days(7)
}

/// Pool for the week containing `now`: 10% of purchases since Monday 00:00 UTC,
/// split 50/25/15/7/3 over the top five.
pub fn estimate(events: &[PurchaseEvent], game_price: Amount, now: DateTime<Utc>) -> PrizePool {
    let start = week_start(now);
    let total_fees: Amount = events
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp <= now)
        .map(|e| e.amount)
        .sum();
    let total_pool = total_fees * POOL_SHARE_PERCENT / 100;
    let participants = if game_price == 0 { 0 } else { u64::try_from(total_fees / game_price).unwrap_or(u64::MAX) };
    let rewards = REWARD_SPLITS
        .iter()
        .zip(1u8..)
        .map(|(&percentage, position)| Reward { position, percentage, amount: total_pool * Amount::from(percentage) / 100 })
        .collect();
    PrizePool { total_fees, total_pool, participants, ends_at: next_reset(now), rewards, computed_at: now }
}

/// Memoizes the last estimate for [`CACHE_TTL_SECS`].
#[derive(Debug, Clone)]
pub struct PrizePoolCache {
    ttl: Duration,
    cached: Option<PrizePool>,
}

impl Default for PrizePoolCache {
    fn default() -> Self { Self::new(Duration::seconds(CACHE_TTL_SECS)) }
}

impl PrizePoolCache {
    pub fn new(ttl: Duration) -> Self { Self { ttl, cached: None } }

    pub fn get_or_compute<F>(&mut self, now: DateTime<Utc>, compute: F) -> Result<&PrizePool, StorageError>
    where
        F: FnOnce() -> Result<PrizePool, StorageError>,
    {
        let fresh = self.cached.as_ref().is_some_and(|p| now - p.computed_at < self.ttl);
        if !fresh {
            self.cached = Some(compute()?);
        }
        self.cached.as_ref().ok_or_else(|| StorageError::Unavailable("prize pool cache empty".into()))
    }

    pub fn reset(&mut self) { self.cached = None; }
}
