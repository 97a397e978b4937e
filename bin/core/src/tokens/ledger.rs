use std::collections::HashMap;

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ports::token_system::TokenSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxKind {
  Distribute,
  Rollback,
}

#[derive(Debug, Clone)]
struct Tx {
  account_id: String,
  amount: Decimal,
  kind: TxKind,
}

#[derive(Debug, Clone, Copy)]
struct StakePosition {
  staked: Decimal,
  last_reward_time: DateTime<Utc>,
}

/// In-process account ledger. Every distribute/rollback is recorded as a
/// transaction so a rollback can be looked up and reversed by id; this
/// stands in for a real chain or payments integration, which is out of
/// scope. Staking positions are tracked the same way a real chain client
/// would expose them - `stake` is the only mutator, since nothing in this
/// control plane's HTTP surface stakes on an account's behalf.
#[derive(Debug, Default)]
pub struct LedgerTokenSystem {
  balances: RwLock<HashMap<String, Decimal>>,
  transactions: RwLock<HashMap<String, Tx>>,
  stakes: RwLock<HashMap<String, StakePosition>>,
}

impl LedgerTokenSystem {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds `amount` to `account_id`'s staked position, starting its
  /// reward clock at `since` if it has never staked before.
  pub async fn stake(&self, account_id: &str, amount: Decimal, since: DateTime<Utc>) {
    let mut stakes = self.stakes.write().await;
    let position = stakes.entry(account_id.to_string()).or_insert(
      StakePosition { staked: Decimal::ZERO, last_reward_time: since },
    );
    position.staked += amount;
  }
}

#[async_trait]
impl TokenSystem for LedgerTokenSystem {
  async fn distribute(
    &self,
    account_id: &str,
    amount: Decimal,
  ) -> anyhow::Result<String> {
    let tx_id = Uuid::new_v4().to_string();
    let mut balances = self.balances.write().await;
    *balances.entry(account_id.to_string()).or_default() += amount;
    self.transactions.write().await.insert(
      tx_id.clone(),
      Tx {
        account_id: account_id.to_string(),
        amount,
        kind: TxKind::Distribute,
      },
    );
    Ok(tx_id)
  }

  async fn rollback(&self, transfer_tx_id: &str) -> anyhow::Result<String> {
    let mut transactions = self.transactions.write().await;
    let Some(tx) = transactions.get(transfer_tx_id) else {
      bail!("unknown transaction id {transfer_tx_id}");
    };
    if tx.kind != TxKind::Distribute {
      bail!("transaction {transfer_tx_id} is not a distribution");
    }
    let account_id = tx.account_id.clone();
    let amount = tx.amount;
    let mut balances = self.balances.write().await;
    *balances.entry(account_id.clone()).or_default() -= amount;
    let rollback_id = Uuid::new_v4().to_string();
    transactions.insert(
      rollback_id.clone(),
      Tx { account_id, amount: -amount, kind: TxKind::Rollback },
    );
    Ok(rollback_id)
  }

  async fn balance(&self, account_id: &str) -> anyhow::Result<Decimal> {
    Ok(
      self
        .balances
        .read()
        .await
        .get(account_id)
        .copied()
        .unwrap_or_default(),
    )
  }

  async fn staked_balance(&self, account_id: &str) -> anyhow::Result<Decimal> {
    Ok(
      self
        .stakes
        .read()
        .await
        .get(account_id)
        .map(|p| p.staked)
        .unwrap_or_default(),
    )
  }

  async fn last_reward_time(
    &self,
    account_id: &str,
  ) -> anyhow::Result<Option<DateTime<Utc>>> {
    Ok(self.stakes.read().await.get(account_id).map(|p| p.last_reward_time))
  }

  async fn record_staking_reward(
    &self,
    account_id: &str,
    at: DateTime<Utc>,
  ) -> anyhow::Result<()> {
    if let Some(position) = self.stakes.write().await.get_mut(account_id) {
      position.last_reward_time = at;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn distribute_then_rollback_nets_to_zero() {
    let ledger = LedgerTokenSystem::new();
    let tx = ledger
      .distribute("alice", Decimal::new(500, 2))
      .await
      .unwrap();
    assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::new(500, 2));
    ledger.rollback(&tx).await.unwrap();
    assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::ZERO);
  }

  #[tokio::test]
  async fn rollback_of_unknown_tx_errors() {
    let ledger = LedgerTokenSystem::new();
    assert!(ledger.rollback("does-not-exist").await.is_err());
  }

  #[tokio::test]
  async fn staking_accrues_from_last_reward_time() {
    let ledger = LedgerTokenSystem::new();
    let start = Utc::now() - chrono::Duration::hours(10);
    ledger.stake("alice", Decimal::new(1000, 0), start).await;
    assert_eq!(ledger.staked_balance("alice").await.unwrap(), Decimal::new(1000, 0));
    assert_eq!(ledger.last_reward_time("alice").await.unwrap(), Some(start));

    let now = Utc::now();
    ledger.record_staking_reward("alice", now).await.unwrap();
    assert_eq!(ledger.last_reward_time("alice").await.unwrap(), Some(now));
  }

  #[tokio::test]
  async fn unstaked_account_has_no_reward_clock() {
    let ledger = LedgerTokenSystem::new();
    assert_eq!(ledger.staked_balance("bob").await.unwrap(), Decimal::ZERO);
    assert_eq!(ledger.last_reward_time("bob").await.unwrap(), None);
  }
}
