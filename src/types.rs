//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user monetary balance record.
///
/// `balance` is the liquid (spendable) balance: the sum of completed
/// inbound transactions minus completed outbound and staking allocations.
/// It is materialized, not derived on read, and every mutating operation
/// keeps it consistent with the transaction ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet ID
    pub id: Uuid,

    /// Owning user (one wallet per user)
    pub user_id: Uuid,

    /// Liquid balance (exact decimal, never negative)
    pub balance: Decimal,

    /// Write version, bumped on every mutation. Used for the optimistic
    /// stale-write check in storage.
    pub version: u64,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a fresh wallet for a user with zero balance
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: Decimal::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Water-resource project accepting stakes.
///
/// Owned by an external registry; the ledger mutates `current_amount`
/// atomically with each stake and unstake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Current annual yield rate offered to new stakes
    pub apy: Decimal,

    /// Sum of active stake amounts across all wallets
    pub current_amount: Decimal,

    /// Funding target, if any
    pub target_amount: Option<Decimal>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Staking position status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StakingStatus {
    /// Funds locked, earning yield
    Active = 1,
    /// Fully released back to the wallet
    Completed = 2,
    /// Cancelled before release
    Cancelled = 3,
}

/// A wallet's locked allocation into a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingPosition {
    /// Position ID
    pub id: Uuid,

    /// Wallet the funds came from
    pub wallet_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Project the funds are locked into
    pub project_id: Uuid,

    /// Remaining locked amount (positive while active)
    pub amount: Decimal,

    /// Annual yield rate snapshot taken from the project at staking time
    pub apy: Decimal,

    /// Status
    pub status: StakingStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Set when the position completes or is cancelled
    pub ended_at: Option<DateTime<Utc>>,
}

impl StakingPosition {
    /// True while funds remain locked
    pub fn is_active(&self) -> bool {
        self.status == StakingStatus::Active
    }
}

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionKind {
    /// Wallet-to-wallet movement
    Transfer = 1,
    /// Stake lock or release
    Staking = 2,
    /// Reward grant
    Reward = 3,
    /// Purchase debit
    Purchase = 4,
}

/// Structured category of a balance-affecting event.
///
/// Aggregates (cumulative referral rewards etc.) filter on this tag
/// rather than matching description text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionSource {
    /// Funds locked into a staking position
    Stake = 1,
    /// Funds released from a staking position
    StakeRelease = 2,
    /// Reward for a converted referral
    ReferralReward = 3,
    /// Reward for an achievement milestone
    AchievementReward = 4,
    /// Reward for a completed mission
    MissionReward = 5,
    /// Purchase debit
    Purchase = 6,
    /// Plain transfer
    Transfer = 7,
}

impl TransactionSource {
    /// The transaction kind this source always produces
    pub fn kind(self) -> TransactionKind {
        match self {
            TransactionSource::Stake | TransactionSource::StakeRelease => TransactionKind::Staking,
            TransactionSource::ReferralReward
            | TransactionSource::AchievementReward
            | TransactionSource::MissionReward => TransactionKind::Reward,
            TransactionSource::Purchase => TransactionKind::Purchase,
            TransactionSource::Transfer => TransactionKind::Transfer,
        }
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Awaiting completion
    Pending = 1,
    /// Applied; amount and kind are frozen
    Completed = 2,
    /// Rejected; does not affect balances
    Failed = 3,
}

/// Immutable ledger entry recording a balance-affecting event.
///
/// Append-only: once Completed, amount and kind never change; the only
/// permitted mutation is the Pending -> Completed|Failed transition.
/// Corrections are modeled as new offsetting entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Wallet affected
    pub wallet_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Kind of event
    pub kind: TransactionKind,

    /// Structured source category
    pub source: TransactionSource,

    /// Amount (exact decimal, sign by convention of kind)
    pub amount: Decimal,

    /// Status
    pub status: TransactionStatus,

    /// Free-text description (display only, never used for aggregation)
    pub description: String,

    /// Event timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,
}

impl Transaction {
    /// Build a Completed transaction for a wallet event
    pub fn completed(
        wallet_id: Uuid,
        user_id: Uuid,
        kind: TransactionKind,
        source: TransactionSource,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            wallet_id,
            user_id,
            kind,
            source,
            amount,
            status: TransactionStatus::Completed,
            description: description.into(),
            timestamp_nanos: Utc::now().timestamp_nanos_opt().unwrap_or(0),
        }
    }

    /// Event timestamp as a UTC datetime
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp_nanos)
    }
}

/// Per-user gamification aggregate. Created lazily on first XP grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLevel {
    /// Owning user
    pub user_id: Uuid,

    /// Current level, always `calculate_level(experience)`
    pub level: u32,

    /// Cumulative experience points
    pub experience: u64,

    /// Total monetary rewards earned
    pub total_rewards: Decimal,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserLevel {
    /// Fresh aggregate at level 1 with no experience
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            level: 1,
            experience: 0,
            total_rewards: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }
}

/// Catalog entry for a named achievement, upserted by key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    /// Catalog ID
    pub id: Uuid,

    /// Unique achievement key
    pub key: String,

    /// First-seen timestamp
    pub created_at: DateTime<Utc>,
}

/// Link row granting an achievement to a user; at most one per (user, key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementLink {
    /// User holding the achievement
    pub user_id: Uuid,

    /// Achievement key
    pub key: String,

    /// Grant timestamp
    pub granted_at: DateTime<Utc>,
}

/// Referral status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReferralStatus {
    /// Code may still be redeemed
    Active = 1,
    /// Redeemed exactly once
    Used = 2,
}

/// A referral code attributing a signup to a referring user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    /// Globally unique code, matches `^[A-Z0-9]{8,12}$`
    pub code: String,

    /// Shareable signup link embedding the code
    pub link: String,

    /// Referring user
    pub referrer_id: Uuid,

    /// Referred user, set when the code is used
    pub referred_id: Option<Uuid>,

    /// Status
    pub status: ReferralStatus,

    /// Reward credited to the referrer on use
    pub reward: Decimal,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Set when the code is used
    pub used_at: Option<DateTime<Utc>>,
}

/// Wallet fetch response.
///
/// `balance` is the wallet's total capital (liquid plus active stakes);
/// `available` is the liquid portion, so `available == balance - staked`
/// always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    /// Total capital: liquid balance plus active staked amounts
    pub balance: Decimal,

    /// Sum of active staking amounts
    pub staked: Decimal,

    /// Liquid balance available for new stakes and purchases
    pub available: Decimal,

    /// Most recent transactions, recency-descending
    pub transactions: Vec<Transaction>,

    /// The wallet's staking positions
    pub stakings: Vec<StakingPosition>,
}

/// Aggregate view of a user's referrals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralStats {
    /// Total referrals created
    pub total: usize,

    /// Still-redeemable referrals
    pub active: usize,

    /// Converted referrals
    pub used: usize,

    /// Per-referral detail
    pub referrals: Vec<Referral>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_starts_empty() {
        let user_id = Uuid::new_v4();
        let wallet = Wallet::new(user_id);
        assert_eq!(wallet.user_id, user_id);
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.version, 0);
    }

    #[test]
    fn test_completed_transaction_timestamp() {
        let txn = Transaction::completed(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TransactionKind::Staking,
            TransactionSource::Stake,
            Decimal::new(2500, 2),
            "stake into aquifer recharge",
        );
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert!(txn.timestamp_nanos > 0);
        assert_eq!(
            txn.created_at().timestamp_nanos_opt().unwrap_or(0),
            txn.timestamp_nanos
        );
    }

    #[test]
    fn test_staking_position_active() {
        let mut position = StakingPosition {
            id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            amount: Decimal::new(10000, 2),
            apy: Decimal::new(550, 2),
            status: StakingStatus::Active,
            created_at: Utc::now(),
            ended_at: None,
        };
        assert!(position.is_active());

        position.status = StakingStatus::Completed;
        assert!(!position.is_active());
    }

    #[test]
    fn test_wallet_roundtrip_preserves_decimal() {
        let mut wallet = Wallet::new(Uuid::new_v4());
        wallet.balance = Decimal::new(1234567, 4); // 123.4567

        let bytes = bincode::serialize(&wallet).unwrap();
        let decoded: Wallet = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, wallet);
        assert_eq!(decoded.balance, Decimal::new(1234567, 4));
    }
}
