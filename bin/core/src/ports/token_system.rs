use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Abstraction over the token ledger that reward distributions settle
/// against. In production this would front a chain client; here it is
/// backed by [`crate::tokens::ledger::LedgerTokenSystem`], an in-process
/// account ledger, since the spec treats settlement as a local
/// bookkeeping concern rather than a wallet integration.
#[async_trait]
pub trait TokenSystem: Send + Sync {
  /// Credits `amount` to `account_id`, returning an opaque transaction id.
  async fn distribute(
    &self,
    account_id: &str,
    amount: Decimal,
  ) -> anyhow::Result<String>;

  /// Reverses a prior [`TokenSystem::distribute`] call by transaction id.
  async fn rollback(&self, transfer_tx_id: &str) -> anyhow::Result<String>;

  async fn balance(&self, account_id: &str) -> anyhow::Result<Decimal>;

  /// Amount `account_id` currently has staked. `0` if the account has
  /// never staked anything.
  async fn staked_balance(&self, account_id: &str) -> anyhow::Result<Decimal>;

  /// When `account_id` last had a staking reward settled. `None` if it
  /// has never been rewarded (and has no stake).
  async fn last_reward_time(
    &self,
    account_id: &str,
  ) -> anyhow::Result<Option<DateTime<Utc>>>;

  /// Advances `account_id`'s staking reward clock to `at`, so the next
  /// settlement only accrues reward for time after this point.
  async fn record_staking_reward(
    &self,
    account_id: &str,
    at: DateTime<Utc>,
  ) -> anyhow::Result<()>;
}
