//! Ledger facade
//!
//! `Ledger` is the public entry point: it owns the storage, the metrics
//! registry, and the handle to the single-writer actor. Mutations go
//! through the actor; reads hit storage directly and never queue behind
//! writes.
//!
//! Mutations rejected with `Conflict` are retried a bounded number of
//! times before the error surfaces to the caller. With one writer task
//! the optimistic version check almost never fires; the retry loop
//! covers operators running side tooling against the same database.

use crate::actor::{spawn_ledger_actor, LedgerHandle};
use crate::metrics::Metrics;
use crate::types::{
    AchievementLink, Project, Referral, ReferralStats, StakingPosition, Transaction,
    TransactionSource, UserLevel, Wallet, WalletSummary,
};
use crate::{Config, Error, Result, Storage};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Transactions embedded in a wallet summary
const SUMMARY_TRANSACTION_LIMIT: usize = 50;

/// Ledger service
pub struct Ledger {
    /// Writer actor handle
    handle: LedgerHandle,

    /// Writer actor task, awaited on shutdown
    actor_task: tokio::task::JoinHandle<()>,

    /// Storage backend, shared with the actor
    storage: Arc<Storage>,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open the ledger: storage, metrics, and the writer actor
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new().map_err(|e| Error::Storage(e.to_string()))?;
        let (handle, actor_task) = spawn_ledger_actor(Arc::clone(&storage), config.referral.clone());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            actor_task,
            storage,
            metrics,
            config,
        })
    }

    /// Metrics collector, for exposition endpoints
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let timer = self.metrics.mutation_duration.start_timer();
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_retryable() && attempt < self.config.retry.max_attempts => {
                    self.metrics.conflict_retries_total.inc();
                    tracing::warn!(attempt, error = %err, "Mutation conflicted, retrying");
                    attempt += 1;
                }
                result => {
                    timer.observe_duration();
                    return result;
                }
            }
        }
    }

    // Mutations

    /// Create a wallet for a newly registered user
    pub async fn create_wallet(&self, user_id: Uuid) -> Result<Wallet> {
        self.handle.create_wallet(user_id).await
    }

    /// Insert or replace a project
    pub async fn register_project(&self, project: Project) -> Result<Project> {
        self.handle.register_project(project).await
    }

    /// Stake funds into a project
    pub async fn stake(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        amount: Decimal,
    ) -> Result<StakingPosition> {
        let position = self
            .with_retry(|| self.handle.stake(user_id, project_id, amount))
            .await?;
        self.metrics.stakes_total.inc();
        self.metrics.transactions_total.inc();
        Ok(position)
    }

    /// Release funds from a staking position, partially or in full
    pub async fn unstake(
        &self,
        user_id: Uuid,
        staking_id: Uuid,
        amount: Decimal,
    ) -> Result<StakingPosition> {
        let position = self
            .with_retry(|| self.handle.unstake(user_id, staking_id, amount))
            .await?;
        self.metrics.unstakes_total.inc();
        self.metrics.transactions_total.inc();
        Ok(position)
    }

    /// Credit a wallet and append the ledger entry
    pub async fn credit(
        &self,
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        let txn = self
            .with_retry(|| self.handle.credit(user_id, source, amount, description))
            .await?;
        self.metrics.transactions_total.inc();
        Ok(txn)
    }

    /// Debit a wallet and append the ledger entry
    pub async fn debit(
        &self,
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        let txn = self
            .with_retry(|| self.handle.debit(user_id, source, amount, description))
            .await?;
        self.metrics.transactions_total.inc();
        Ok(txn)
    }

    /// Grant a monetary reward: wallet credit plus reward-total tracking
    pub async fn grant_reward(
        &self,
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        let txn = self
            .with_retry(|| self.handle.grant_reward(user_id, source, amount, description))
            .await?;
        self.metrics.rewards_total.inc();
        self.metrics.transactions_total.inc();
        Ok(txn)
    }

    /// Add experience points to a user
    pub async fn add_xp(&self, user_id: Uuid, xp: u64) -> Result<UserLevel> {
        let level = self.handle.add_xp(user_id, xp).await?;
        self.metrics.xp_grants_total.inc();
        Ok(level)
    }

    /// Idempotently grant an achievement; true if newly granted
    pub async fn grant_achievement(&self, user_id: Uuid, key: &str) -> Result<bool> {
        let granted = self.handle.grant_achievement(user_id, key).await?;
        if granted {
            self.metrics.achievements_total.inc();
        }
        Ok(granted)
    }

    /// Create a referral code for a user
    pub async fn create_referral(&self, referrer_id: Uuid) -> Result<Referral> {
        self.handle.create_referral(referrer_id).await
    }

    /// Convert a referral: reward and XP the referrer, mark the code used
    pub async fn use_referral(&self, code: &str, referred_id: Uuid) -> Result<Referral> {
        let referral = self
            .with_retry(|| self.handle.use_referral(code, referred_id))
            .await?;
        self.metrics.rewards_total.inc();
        self.metrics.transactions_total.inc();
        Ok(referral)
    }

    // Reads

    /// Get a user's wallet
    pub fn wallet(&self, user_id: Uuid) -> Result<Wallet> {
        self.storage.get_wallet(user_id)
    }

    /// Aggregated wallet view: totals plus recent activity.
    ///
    /// `balance` is total capital (liquid plus actively staked),
    /// `available` is the liquid portion, so
    /// `available == balance - staked` always holds.
    pub fn wallet_summary(&self, user_id: Uuid) -> Result<WalletSummary> {
        // Single snapshot: a stake committing mid-read cannot combine a
        // pre-debit balance with a post-stake staked total.
        let view = self
            .storage
            .read_summary(user_id, SUMMARY_TRANSACTION_LIMIT)?;

        Ok(WalletSummary {
            balance: view.wallet.balance.saturating_add(view.staked),
            staked: view.staked,
            available: view.wallet.balance,
            transactions: view.transactions,
            stakings: view.stakings,
        })
    }

    /// Transactions for a user, most recent first
    pub fn transactions(&self, user_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let wallet = self.storage.get_wallet(user_id)?;
        self.storage.list_transactions(wallet.id, limit)
    }

    /// All staking positions for a user
    pub fn stakings(&self, user_id: Uuid) -> Result<Vec<StakingPosition>> {
        let wallet = self.storage.get_wallet(user_id)?;
        self.storage.list_stakings(wallet.id)
    }

    /// Get a project by ID
    pub fn project(&self, project_id: Uuid) -> Result<Project> {
        self.storage.get_project(project_id)
    }

    /// A user's level aggregate; level 1 with zero XP if never granted
    pub fn user_level(&self, user_id: Uuid) -> Result<UserLevel> {
        Ok(self
            .storage
            .try_get_level(user_id)?
            .unwrap_or_else(|| UserLevel::new(user_id)))
    }

    /// Achievements held by a user
    pub fn achievements(&self, user_id: Uuid) -> Result<Vec<AchievementLink>> {
        self.storage.list_achievements(user_id)
    }

    /// Referral counts and records for a referrer
    pub fn referral_stats(&self, referrer_id: Uuid) -> Result<ReferralStats> {
        let referrals = self.storage.list_referrals(referrer_id)?;
        let used = referrals
            .iter()
            .filter(|r| r.status == crate::types::ReferralStatus::Used)
            .count();

        Ok(ReferralStats {
            total: referrals.len(),
            active: referrals.len() - used,
            used,
            referrals,
        })
    }

    /// Sum of completed reward amounts for a user, filtered by source
    pub fn sum_rewards(&self, user_id: Uuid, source: TransactionSource) -> Result<Decimal> {
        let wallet = self.storage.get_wallet(user_id)?;
        self.storage.sum_rewards(wallet.id, source)
    }

    /// Graceful shutdown: drain the actor, then close storage
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;

        // The actor drops its storage Arc only once its task finishes
        self.actor_task
            .await
            .map_err(|e| Error::Concurrency(format!("Actor task failed: {}", e)))?;

        match Arc::try_unwrap(self.storage) {
            Ok(storage) => storage.close()?,
            Err(_) => tracing::warn!("Storage still shared at shutdown, skipping close"),
        }

        tracing::info!("Ledger shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_ledger() -> (Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Ledger::open(config).unwrap(), temp_dir)
    }

    fn test_project() -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Watershed Restoration".to_string(),
            apy: Decimal::new(615, 2),
            current_amount: Decimal::ZERO,
            target_amount: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_summary_invariant_after_stake() {
        let (ledger, _temp) = test_ledger().await;
        let user_id = Uuid::new_v4();

        ledger.create_wallet(user_id).await.unwrap();
        ledger
            .credit(
                user_id,
                TransactionSource::Transfer,
                Decimal::new(200_00, 2),
                "deposit",
            )
            .await
            .unwrap();

        let project = ledger.register_project(test_project()).await.unwrap();
        ledger
            .stake(user_id, project.id, Decimal::new(75_00, 2))
            .await
            .unwrap();

        let summary = ledger.wallet_summary(user_id).unwrap();
        assert_eq!(summary.balance, Decimal::new(200_00, 2));
        assert_eq!(summary.staked, Decimal::new(75_00, 2));
        assert_eq!(summary.available, Decimal::new(125_00, 2));
        assert_eq!(summary.available, summary.balance - summary.staked);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unstake_restores_available() {
        let (ledger, _temp) = test_ledger().await;
        let user_id = Uuid::new_v4();

        ledger.create_wallet(user_id).await.unwrap();
        ledger
            .credit(
                user_id,
                TransactionSource::Transfer,
                Decimal::new(100_00, 2),
                "deposit",
            )
            .await
            .unwrap();

        let project = ledger.register_project(test_project()).await.unwrap();
        let position = ledger
            .stake(user_id, project.id, Decimal::new(60_00, 2))
            .await
            .unwrap();

        // Partial release keeps the position active
        let partial = ledger
            .unstake(user_id, position.id, Decimal::new(20_00, 2))
            .await
            .unwrap();
        assert!(partial.is_active());
        assert_eq!(partial.amount, Decimal::new(40_00, 2));

        // Full release completes it
        let done = ledger
            .unstake(user_id, position.id, Decimal::new(40_00, 2))
            .await
            .unwrap();
        assert!(!done.is_active());
        assert!(done.ended_at.is_some());

        let summary = ledger.wallet_summary(user_id).unwrap();
        assert_eq!(summary.staked, Decimal::ZERO);
        assert_eq!(summary.available, Decimal::new(100_00, 2));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_state_unchanged() {
        let (ledger, _temp) = test_ledger().await;
        let user_id = Uuid::new_v4();

        ledger.create_wallet(user_id).await.unwrap();
        ledger
            .credit(
                user_id,
                TransactionSource::Transfer,
                Decimal::new(10_00, 2),
                "deposit",
            )
            .await
            .unwrap();

        let project = ledger.register_project(test_project()).await.unwrap();
        let before = ledger.wallet_summary(user_id).unwrap();

        let result = ledger
            .stake(user_id, project.id, Decimal::new(50_00, 2))
            .await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        let after = ledger.wallet_summary(user_id).unwrap();
        assert_eq!(after.balance, before.balance);
        assert_eq!(after.transactions.len(), before.transactions.len());
        assert_eq!(after.stakings.len(), before.stakings.len());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_referral_lifecycle() {
        let (ledger, _temp) = test_ledger().await;
        let referrer = Uuid::new_v4();
        let referred = Uuid::new_v4();

        ledger.create_wallet(referrer).await.unwrap();
        let referral = ledger.create_referral(referrer).await.unwrap();
        assert!(crate::referral::is_valid_code(&referral.code));

        let used = ledger.use_referral(&referral.code, referred).await.unwrap();
        assert_eq!(used.referred_id, Some(referred));

        // Reward landed in the referrer's wallet
        let wallet = ledger.wallet(referrer).unwrap();
        assert_eq!(wallet.balance, Decimal::new(1000, 2));

        // XP and reward totals updated
        let level = ledger.user_level(referrer).unwrap();
        assert_eq!(level.experience, 50);
        assert_eq!(level.total_rewards, Decimal::new(1000, 2));

        // Double use conflicts
        let again = ledger.use_referral(&referral.code, Uuid::new_v4()).await;
        assert!(matches!(again, Err(Error::Conflict(_))));

        let stats = ledger.referral_stats(referrer).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.active, 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_grant_achievement_idempotent() {
        let (ledger, _temp) = test_ledger().await;
        let user_id = Uuid::new_v4();

        assert!(ledger.grant_achievement(user_id, "first-stake").await.unwrap());
        assert!(!ledger.grant_achievement(user_id, "first-stake").await.unwrap());
        assert_eq!(ledger.achievements(user_id).unwrap().len(), 1);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_level_defaults_without_grants() {
        let (ledger, _temp) = test_ledger().await;
        let user_id = Uuid::new_v4();

        let level = ledger.user_level(user_id).unwrap();
        assert_eq!(level.level, 1);
        assert_eq!(level.experience, 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_releases_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let user_id = Uuid::new_v4();

        let ledger = Ledger::open(config.clone()).unwrap();
        ledger.create_wallet(user_id).await.unwrap();
        ledger
            .credit(
                user_id,
                TransactionSource::Transfer,
                Decimal::new(42_00, 2),
                "deposit",
            )
            .await
            .unwrap();
        ledger.shutdown().await.unwrap();

        // Reopening the same directory only works if shutdown actually
        // released the RocksDB lock
        let reopened = Ledger::open(config).unwrap();
        assert_eq!(
            reopened.wallet(user_id).unwrap().balance,
            Decimal::new(42_00, 2)
        );
        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_xp_overflow_rejected_without_outage() {
        let (ledger, _temp) = test_ledger().await;
        let user_id = Uuid::new_v4();

        ledger.add_xp(user_id, u64::MAX).await.unwrap();
        let overflow = ledger.add_xp(user_id, 1).await;
        assert!(matches!(overflow, Err(Error::InvalidInput(_))));

        // The writer survived and the aggregate is unchanged
        let level = ledger.user_level(user_id).unwrap();
        assert_eq!(level.experience, u64::MAX);
        assert!(ledger.grant_achievement(user_id, "survivor").await.unwrap());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_add_xp_levels_up() {
        let (ledger, _temp) = test_ledger().await;
        let user_id = Uuid::new_v4();

        let level = ledger.add_xp(user_id, 100).await.unwrap();
        assert_eq!(level.level, 2);

        let level = ledger.add_xp(user_id, 200).await.unwrap();
        assert_eq!(level.experience, 300);
        assert_eq!(level.level, 3);

        ledger.shutdown().await.unwrap();
    }
}
