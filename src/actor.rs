//! Actor-based concurrency for the ledger
//!
//! All balance-affecting mutations are serialized through a single Tokio
//! actor task: one logical writer means no two stakes can validate against
//! the same pre-debit balance, and a wallet can never be overdrawn by
//! interleaved requests. Reads bypass the actor and hit storage directly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              HTTP route handlers (external)           │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   read -> validate -> Storage::apply_* (WriteBatch)   │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::config::ReferralConfig;
use crate::types::{
    Achievement, AchievementLink, Project, Referral, ReferralStatus, StakingPosition,
    StakingStatus, Transaction, TransactionSource, UserLevel, Wallet,
};
use crate::{leveling, referral, Error, Result, Storage};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Attempts to allocate an unused referral code before giving up
const CODE_ALLOCATION_ATTEMPTS: usize = 5;

/// Overflow-checked Decimal addition. Decimal arithmetic panics on
/// overflow, and a panic inside the writer task would strand every
/// subsequent mutation, so overflows reject the request instead.
fn add_amount(lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_add(rhs).ok_or(Error::InvalidAmount(rhs))
}

/// Overflow-checked Decimal subtraction
fn sub_amount(lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_sub(rhs).ok_or(Error::InvalidAmount(rhs))
}

/// Overflow-checked XP accumulation
fn add_experience(lhs: u64, rhs: u64) -> Result<u64> {
    lhs.checked_add(rhs)
        .ok_or_else(|| Error::InvalidInput("experience total would overflow".to_string()))
}

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Create a wallet for a newly registered user
    CreateWallet {
        user_id: Uuid,
        response: oneshot::Sender<Result<Wallet>>,
    },

    /// Insert or replace a project
    RegisterProject {
        project: Project,
        response: oneshot::Sender<Result<Project>>,
    },

    /// Lock funds into a project
    Stake {
        user_id: Uuid,
        project_id: Uuid,
        amount: Decimal,
        response: oneshot::Sender<Result<StakingPosition>>,
    },

    /// Release funds from a staking position
    Unstake {
        user_id: Uuid,
        staking_id: Uuid,
        amount: Decimal,
        response: oneshot::Sender<Result<StakingPosition>>,
    },

    /// Credit a wallet and append the ledger entry
    Credit {
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: String,
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Debit a wallet and append the ledger entry
    Debit {
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: String,
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Credit a monetary reward and bump the user's reward total
    GrantReward {
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: String,
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Add experience points to a user
    AddXp {
        user_id: Uuid,
        xp: u64,
        response: oneshot::Sender<Result<UserLevel>>,
    },

    /// Idempotently grant a named achievement
    GrantAchievement {
        user_id: Uuid,
        key: String,
        response: oneshot::Sender<Result<bool>>,
    },

    /// Create a referral code for a user
    CreateReferral {
        referrer_id: Uuid,
        response: oneshot::Sender<Result<Referral>>,
    },

    /// Convert a referral: mark used, reward and XP the referrer
    UseReferral {
        code: String,
        referred_id: Uuid,
        response: oneshot::Sender<Result<Referral>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger mutations
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Referral policy
    referral: ReferralConfig,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        referral: ReferralConfig,
    ) -> Self {
        Self {
            storage,
            mailbox,
            referral,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                msg => self.handle_message(msg),
            }
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::CreateWallet { user_id, response } => {
                let _ = response.send(self.create_wallet(user_id));
            }
            LedgerMessage::RegisterProject { project, response } => {
                let result = self.storage.put_project(&project).map(|_| project);
                let _ = response.send(result);
            }
            LedgerMessage::Stake {
                user_id,
                project_id,
                amount,
                response,
            } => {
                let _ = response.send(self.stake(user_id, project_id, amount));
            }
            LedgerMessage::Unstake {
                user_id,
                staking_id,
                amount,
                response,
            } => {
                let _ = response.send(self.unstake(user_id, staking_id, amount));
            }
            LedgerMessage::Credit {
                user_id,
                source,
                amount,
                description,
                response,
            } => {
                let _ = response.send(self.balance_change(user_id, source, amount, description, true, false));
            }
            LedgerMessage::Debit {
                user_id,
                source,
                amount,
                description,
                response,
            } => {
                let _ = response.send(self.balance_change(user_id, source, amount, description, false, false));
            }
            LedgerMessage::GrantReward {
                user_id,
                source,
                amount,
                description,
                response,
            } => {
                let _ = response.send(self.balance_change(user_id, source, amount, description, true, true));
            }
            LedgerMessage::AddXp {
                user_id,
                xp,
                response,
            } => {
                let _ = response.send(self.add_xp(user_id, xp));
            }
            LedgerMessage::GrantAchievement {
                user_id,
                key,
                response,
            } => {
                let _ = response.send(self.grant_achievement(user_id, &key));
            }
            LedgerMessage::CreateReferral {
                referrer_id,
                response,
            } => {
                let _ = response.send(self.create_referral(referrer_id));
            }
            LedgerMessage::UseReferral {
                code,
                referred_id,
                response,
            } => {
                let _ = response.send(self.use_referral(&code, referred_id));
            }
            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn create_wallet(&self, user_id: Uuid) -> Result<Wallet> {
        let wallet = Wallet::new(user_id);
        self.storage.create_wallet(&wallet)?;
        Ok(wallet)
    }

    /// Stake funds: validate, then apply the four-row mutation atomically.
    /// Validation and write happen on the single writer task, so no other
    /// stake can slip in between the balance read and the debit.
    fn stake(&self, user_id: Uuid, project_id: Uuid, amount: Decimal) -> Result<StakingPosition> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let wallet = self.storage.get_wallet(user_id)?;
        if wallet.balance < amount {
            return Err(Error::InsufficientFunds {
                required: amount,
                available: wallet.balance,
            });
        }

        let mut project = self.storage.get_project(project_id)?;

        let now = Utc::now();
        let mut updated = wallet.clone();
        updated.balance = sub_amount(wallet.balance, amount)?;
        updated.version += 1;
        updated.updated_at = now;

        project.current_amount = add_amount(project.current_amount, amount)?;

        let position = StakingPosition {
            id: Uuid::now_v7(),
            wallet_id: wallet.id,
            user_id,
            project_id,
            amount,
            apy: project.apy, // snapshot, not a live reference
            status: StakingStatus::Active,
            created_at: now,
            ended_at: None,
        };

        let txn = Transaction::completed(
            wallet.id,
            user_id,
            TransactionSource::Stake.kind(),
            TransactionSource::Stake,
            amount,
            format!("stake into project {}", project.name),
        );

        self.storage
            .apply_stake(&updated, wallet.version, &project, &position, &txn)?;

        Ok(position)
    }

    /// Release funds from a position. The inverse of `stake`: wallet
    /// credit, project aggregate decrement, position update, reversal
    /// ledger entry, all atomic.
    fn unstake(&self, user_id: Uuid, staking_id: Uuid, amount: Decimal) -> Result<StakingPosition> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let mut position = self.storage.get_staking(staking_id)?;
        if position.user_id != user_id {
            // Never confirm the existence of another user's position
            return Err(Error::StakingNotFound(staking_id));
        }
        if !position.is_active() {
            return Err(Error::InvalidInput(format!(
                "staking position {} is not active",
                staking_id
            )));
        }
        if amount > position.amount {
            return Err(Error::InvalidAmount(amount));
        }

        let wallet = self.storage.get_wallet(user_id)?;
        let mut project = self.storage.get_project(position.project_id)?;

        let now = Utc::now();
        let mut updated = wallet.clone();
        updated.balance = add_amount(wallet.balance, amount)?;
        updated.version += 1;
        updated.updated_at = now;

        project.current_amount = sub_amount(project.current_amount, amount)?;

        position.amount = sub_amount(position.amount, amount)?;
        if position.amount == Decimal::ZERO {
            position.status = StakingStatus::Completed;
            position.ended_at = Some(now);
        }

        let txn = Transaction::completed(
            wallet.id,
            user_id,
            TransactionSource::StakeRelease.kind(),
            TransactionSource::StakeRelease,
            amount,
            format!("release from project {}", project.name),
        );

        self.storage
            .apply_unstake(&updated, wallet.version, &project, &position, &txn)?;

        Ok(position)
    }

    /// Credit or debit a wallet with its ledger entry; `track_reward`
    /// additionally folds the amount into the user's reward total.
    fn balance_change(
        &self,
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: String,
        credit: bool,
        track_reward: bool,
    ) -> Result<Transaction> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let wallet = self.storage.get_wallet(user_id)?;
        let mut updated = wallet.clone();
        if credit {
            updated.balance = add_amount(wallet.balance, amount)?;
        } else {
            if wallet.balance < amount {
                return Err(Error::InsufficientFunds {
                    required: amount,
                    available: wallet.balance,
                });
            }
            updated.balance = sub_amount(wallet.balance, amount)?;
        }
        updated.version += 1;
        updated.updated_at = Utc::now();

        let txn = Transaction::completed(wallet.id, user_id, source.kind(), source, amount, description);

        let level = if track_reward {
            let mut level = self
                .storage
                .try_get_level(user_id)?
                .unwrap_or_else(|| UserLevel::new(user_id));
            level.total_rewards = add_amount(level.total_rewards, amount)?;
            level.updated_at = updated.updated_at;
            Some(level)
        } else {
            None
        };

        self.storage
            .apply_balance_change(&updated, wallet.version, &txn, level.as_ref())?;

        Ok(txn)
    }

    /// Add XP; the aggregate is created lazily on the first grant.
    /// Grants no money: monetary rewards go through `GrantReward`.
    fn add_xp(&self, user_id: Uuid, xp: u64) -> Result<UserLevel> {
        let current = self
            .storage
            .try_get_level(user_id)?
            .unwrap_or_else(|| UserLevel::new(user_id));

        if xp == 0 {
            return Ok(current);
        }

        let mut level = current;
        level.experience = add_experience(level.experience, xp)?;
        level.level = leveling::calculate_level(level.experience);
        level.updated_at = Utc::now();

        self.storage.put_level(&level)?;

        tracing::debug!(user_id = %user_id, xp, level = level.level, "XP granted");
        Ok(level)
    }

    /// Idempotent achievement grant: upsert the catalog entry, insert the
    /// link only if absent. Returns whether the link was created now.
    fn grant_achievement(&self, user_id: Uuid, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Err(Error::InvalidInput("achievement key is empty".to_string()));
        }

        if self.storage.has_achievement(user_id, key)? {
            return Ok(false);
        }

        let achievement = match self.storage.get_achievement(key)? {
            Some(existing) => existing,
            None => Achievement {
                id: Uuid::new_v4(),
                key: key.to_string(),
                created_at: Utc::now(),
            },
        };

        let link = AchievementLink {
            user_id,
            key: key.to_string(),
            granted_at: Utc::now(),
        };

        self.storage.apply_achievement(&achievement, &link)?;
        Ok(true)
    }

    fn create_referral(&self, referrer_id: Uuid) -> Result<Referral> {
        // The referrer needs a wallet to receive the reward later
        self.storage.get_wallet(referrer_id)?;

        for _ in 0..CODE_ALLOCATION_ATTEMPTS {
            let code = referral::generate_code(self.referral.code_length)?;
            let candidate = Referral {
                link: referral::referral_link(&self.referral.base_url, &code),
                code,
                referrer_id,
                referred_id: None,
                status: ReferralStatus::Active,
                reward: self.referral.reward,
                created_at: Utc::now(),
                used_at: None,
            };

            match self.storage.create_referral(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(Error::Conflict(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(Error::Conflict(
            "could not allocate a unique referral code".to_string(),
        ))
    }

    /// Convert a referral. The Active -> Used transition happens exactly
    /// once; the reward credit, ledger entry, and XP grant commit with it.
    fn use_referral(&self, code: &str, referred_id: Uuid) -> Result<Referral> {
        let mut referral = self.storage.get_referral(code)?;

        if referral.status == ReferralStatus::Used {
            return Err(Error::Conflict(format!("referral {} already used", code)));
        }
        if referral.referrer_id == referred_id {
            return Err(Error::InvalidInput(
                "users cannot redeem their own referral".to_string(),
            ));
        }

        let wallet = self.storage.get_wallet(referral.referrer_id)?;

        let now = Utc::now();
        let mut updated = wallet.clone();
        updated.balance = add_amount(wallet.balance, referral.reward)?;
        updated.version += 1;
        updated.updated_at = now;

        referral.status = ReferralStatus::Used;
        referral.referred_id = Some(referred_id);
        referral.used_at = Some(now);

        let txn = Transaction::completed(
            wallet.id,
            referral.referrer_id,
            TransactionSource::ReferralReward.kind(),
            TransactionSource::ReferralReward,
            referral.reward,
            format!("referral {} converted", referral.code),
        );

        let mut level = self
            .storage
            .try_get_level(referral.referrer_id)?
            .unwrap_or_else(|| UserLevel::new(referral.referrer_id));
        level.experience = add_experience(level.experience, self.referral.xp)?;
        level.level = leveling::calculate_level(level.experience);
        level.total_rewards = add_amount(level.total_rewards, referral.reward)?;
        level.updated_at = now;

        self.storage
            .apply_referral_use(&referral, &updated, wallet.version, &txn, &level)?;

        Ok(referral)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        make_msg: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make_msg(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Create a wallet for a user
    pub async fn create_wallet(&self, user_id: Uuid) -> Result<Wallet> {
        self.request(|response| LedgerMessage::CreateWallet { user_id, response })
            .await
    }

    /// Insert or replace a project
    pub async fn register_project(&self, project: Project) -> Result<Project> {
        self.request(|response| LedgerMessage::RegisterProject { project, response })
            .await
    }

    /// Stake funds into a project
    pub async fn stake(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        amount: Decimal,
    ) -> Result<StakingPosition> {
        self.request(|response| LedgerMessage::Stake {
            user_id,
            project_id,
            amount,
            response,
        })
        .await
    }

    /// Release funds from a staking position
    pub async fn unstake(
        &self,
        user_id: Uuid,
        staking_id: Uuid,
        amount: Decimal,
    ) -> Result<StakingPosition> {
        self.request(|response| LedgerMessage::Unstake {
            user_id,
            staking_id,
            amount,
            response,
        })
        .await
    }

    /// Credit a wallet
    pub async fn credit(
        &self,
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Transaction> {
        let description = description.into();
        self.request(|response| LedgerMessage::Credit {
            user_id,
            source,
            amount,
            description,
            response,
        })
        .await
    }

    /// Debit a wallet
    pub async fn debit(
        &self,
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Transaction> {
        let description = description.into();
        self.request(|response| LedgerMessage::Debit {
            user_id,
            source,
            amount,
            description,
            response,
        })
        .await
    }

    /// Grant a monetary reward
    pub async fn grant_reward(
        &self,
        user_id: Uuid,
        source: TransactionSource,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Transaction> {
        let description = description.into();
        self.request(|response| LedgerMessage::GrantReward {
            user_id,
            source,
            amount,
            description,
            response,
        })
        .await
    }

    /// Add experience points
    pub async fn add_xp(&self, user_id: Uuid, xp: u64) -> Result<UserLevel> {
        self.request(|response| LedgerMessage::AddXp {
            user_id,
            xp,
            response,
        })
        .await
    }

    /// Idempotently grant an achievement; true if the link was created now
    pub async fn grant_achievement(&self, user_id: Uuid, key: impl Into<String>) -> Result<bool> {
        let key = key.into();
        self.request(|response| LedgerMessage::GrantAchievement {
            user_id,
            key,
            response,
        })
        .await
    }

    /// Create a referral code
    pub async fn create_referral(&self, referrer_id: Uuid) -> Result<Referral> {
        self.request(|response| LedgerMessage::CreateReferral {
            referrer_id,
            response,
        })
        .await
    }

    /// Convert a referral
    pub async fn use_referral(
        &self,
        code: impl Into<String>,
        referred_id: Uuid,
    ) -> Result<Referral> {
        let code = code.into();
        self.request(|response| LedgerMessage::UseReferral {
            code,
            referred_id,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor. The returned task handle completes once the
/// actor has drained its mailbox after `Shutdown`; await it before
/// tearing down storage.
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    referral: ReferralConfig,
) -> (LedgerHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx, referral);

    let task = tokio::spawn(actor.run());

    (LedgerHandle::new(tx), task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    async fn test_handle() -> (LedgerHandle, tokio::task::JoinHandle<()>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let storage = Arc::new(Storage::open(&config).unwrap());
        let (handle, task) = spawn_ledger_actor(storage, config.referral);
        (handle, task, temp_dir)
    }

    fn test_project() -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Desalination Plant".to_string(),
            apy: Decimal::new(720, 2),
            current_amount: Decimal::ZERO,
            target_amount: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, task, _temp) = test_handle().await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stake_through_actor() {
        let (handle, _task, _temp) = test_handle().await;
        let user_id = Uuid::new_v4();

        handle.create_wallet(user_id).await.unwrap();
        handle
            .credit(
                user_id,
                TransactionSource::Transfer,
                Decimal::new(100_00, 2),
                "initial deposit",
            )
            .await
            .unwrap();

        let project = handle.register_project(test_project()).await.unwrap();
        let position = handle
            .stake(user_id, project.id, Decimal::new(40_00, 2))
            .await
            .unwrap();

        assert_eq!(position.amount, Decimal::new(40_00, 2));
        assert_eq!(position.apy, project.apy);
        assert!(position.is_active());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_errors_after_shutdown() {
        let (handle, task, _temp) = test_handle().await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let result = handle.create_wallet(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_overflow_rejected_and_writer_survives() {
        let (handle, _task, _temp) = test_handle().await;
        let user_id = Uuid::new_v4();

        handle.create_wallet(user_id).await.unwrap();
        handle
            .credit(user_id, TransactionSource::Transfer, Decimal::MAX, "seed")
            .await
            .unwrap();

        let overflow = handle
            .credit(user_id, TransactionSource::Transfer, Decimal::ONE, "bump")
            .await;
        assert!(matches!(overflow, Err(Error::InvalidAmount(_))));

        // The writer is still alive and the wallet is intact
        handle
            .debit(user_id, TransactionSource::Purchase, Decimal::ONE, "spend")
            .await
            .unwrap();

        handle.shutdown().await.unwrap();
    }
}
