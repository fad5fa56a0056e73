//! # Aqua Ledger
//!
//! Wallet and staking ledger for a water-infrastructure funding platform.
//! Users hold a platform-token wallet, stake tokens into water projects,
//! earn rewards, XP, and achievements, and refer other users for rewards.
//!
//! ## Architecture
//!
//! - **Storage**: RocksDB with column families per record type; every
//!   multi-row mutation commits through a single `WriteBatch`
//! - **Concurrency**: one writer actor serializes all balance-affecting
//!   mutations; reads go straight to storage
//! - **Money**: `rust_decimal::Decimal` everywhere, no floats
//! - **Auth**: HS256 JWTs issued by the platform, verified at the edge
//!
//! ## Example
//!
//! ```no_run
//! use aqua_ledger::{Config, Ledger, TransactionSource};
//! use rust_decimal::Decimal;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> aqua_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let user_id = Uuid::new_v4();
//!     ledger.create_wallet(user_id).await?;
//!     ledger
//!         .credit(user_id, TransactionSource::Transfer, Decimal::new(100_00, 2), "deposit")
//!         .await?;
//!
//!     let summary = ledger.wallet_summary(user_id)?;
//!     println!("available: {}", summary.available);
//!
//!     ledger.shutdown().await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod leveling;
pub mod metrics;
pub mod referral;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use storage::Storage;
pub use types::{
    Achievement, AchievementLink, Project, Referral, ReferralStats, ReferralStatus,
    StakingPosition, StakingStatus, Transaction, TransactionKind, TransactionSource,
    TransactionStatus, UserLevel, Wallet, WalletSummary,
};
