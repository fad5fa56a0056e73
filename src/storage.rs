//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - One wallet per user (key: user_id)
//! - `projects` - Project aggregates (key: project_id)
//! - `stakings` - Staking positions (key: staking_id)
//! - `transactions` - Append-only ledger entries (key: transaction_id)
//! - `levels` - Per-user gamification aggregates (key: user_id)
//! - `achievements` - Achievement catalog (key: achievement key)
//! - `achievement_links` - User/achievement links (key: user_id || key)
//! - `referrals` - Referral codes (key: code)
//! - `indices` - Secondary indices for fast lookups
//!
//! Every multi-row mutation goes through a single `WriteBatch`, so a
//! concurrent reader never observes a partially-applied state. Wallet
//! writes carry an expected version; a mismatch against the on-disk
//! wallet rejects the whole batch with `Conflict`.

use crate::{
    error::{Error, Result},
    types::{
        Achievement, AchievementLink, Project, Referral, StakingPosition, Transaction,
        TransactionKind, TransactionSource, TransactionStatus, UserLevel, Wallet,
    },
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, Snapshot, WriteBatch,
    DB,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_PROJECTS: &str = "projects";
const CF_STAKINGS: &str = "stakings";
const CF_TRANSACTIONS: &str = "transactions";
const CF_LEVELS: &str = "levels";
const CF_ACHIEVEMENTS: &str = "achievements";
const CF_ACHIEVEMENT_LINKS: &str = "achievement_links";
const CF_REFERRALS: &str = "referrals";
const CF_INDICES: &str = "indices";

/// Index key prefixes within CF_INDICES
const IDX_STAKING: &[u8] = b"stk:";
const IDX_TXN: &[u8] = b"txn:";
const IDX_REFERRAL: &[u8] = b"ref:";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

/// Consistent point-in-time view of one wallet, read from a single
/// RocksDB snapshot
#[derive(Debug)]
pub struct SummaryView {
    /// The wallet row as of the snapshot
    pub wallet: Wallet,

    /// Sum of active staking amounts as of the snapshot
    pub staked: Decimal,

    /// The wallet's staking positions
    pub stakings: Vec<StakingPosition>,

    /// Most recent transactions, recency-descending
    pub transactions: Vec<Transaction>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_PROJECTS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_STAKINGS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_LEVELS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_ACHIEVEMENTS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_ACHIEVEMENT_LINKS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_REFERRALS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_hot() -> Options {
        let mut opts = Options::default();
        // Frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Wallet operations

    /// Create a wallet; fails with Conflict if the user already has one
    pub fn create_wallet(&self, wallet: &Wallet) -> Result<()> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let key = wallet.user_id.as_bytes();

        if self.db.get_cf(cf, key)?.is_some() {
            return Err(Error::Conflict(format!(
                "wallet already exists for user {}",
                wallet.user_id
            )));
        }

        let value = bincode::serialize(wallet)?;
        self.db.put_cf(cf, key, &value)?;

        tracing::debug!(user_id = %wallet.user_id, wallet_id = %wallet.id, "Wallet created");
        Ok(())
    }

    /// Get wallet by owning user
    pub fn get_wallet(&self, user_id: Uuid) -> Result<Wallet> {
        self.try_get_wallet(user_id)?
            .ok_or(Error::WalletNotFound(user_id))
    }

    /// Get wallet by owning user, None if absent
    pub fn try_get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>> {
        let cf = self.cf_handle(CF_WALLETS)?;
        match self.db.get_cf(cf, user_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Verify the on-disk wallet still carries the version a mutation
    /// validated against
    fn check_wallet_version(&self, user_id: Uuid, expected_version: u64) -> Result<()> {
        let current = self.get_wallet(user_id)?;
        if current.version != expected_version {
            return Err(Error::Conflict(format!(
                "wallet {} version {} does not match expected {}",
                user_id, current.version, expected_version
            )));
        }
        Ok(())
    }

    // Project operations

    /// Insert or replace a project
    pub fn put_project(&self, project: &Project) -> Result<()> {
        let cf = self.cf_handle(CF_PROJECTS)?;
        let value = bincode::serialize(project)?;
        self.db.put_cf(cf, project.id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get project by ID
    pub fn get_project(&self, project_id: Uuid) -> Result<Project> {
        let cf = self.cf_handle(CF_PROJECTS)?;
        let value = self
            .db
            .get_cf(cf, project_id.as_bytes())?
            .ok_or(Error::ProjectNotFound(project_id))?;
        Ok(bincode::deserialize(&value)?)
    }

    // Staking operations

    /// Get staking position by ID
    pub fn get_staking(&self, staking_id: Uuid) -> Result<StakingPosition> {
        let cf = self.cf_handle(CF_STAKINGS)?;
        let value = self
            .db
            .get_cf(cf, staking_id.as_bytes())?
            .ok_or(Error::StakingNotFound(staking_id))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All staking positions for a wallet (via index)
    pub fn list_stakings(&self, wallet_id: Uuid) -> Result<Vec<StakingPosition>> {
        let prefix = Self::index_prefix(IDX_STAKING, wallet_id);
        let mut stakings = Vec::new();

        for key in self.scan_index_keys(&prefix, usize::MAX)? {
            // Staking id is the trailing 16 bytes
            if key.len() >= prefix.len() + 16 {
                let id_bytes: [u8; 16] = key[key.len() - 16..].try_into().unwrap();
                stakings.push(self.get_staking(Uuid::from_bytes(id_bytes))?);
            }
        }

        Ok(stakings)
    }

    /// Sum of active staking amounts for a wallet
    pub fn staked_total(&self, wallet_id: Uuid) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for staking in self.list_stakings(wallet_id)? {
            if staking.is_active() {
                total += staking.amount;
            }
        }
        Ok(total)
    }

    // Transaction operations

    /// Get transaction by ID
    pub fn get_transaction(&self, txn_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, txn_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("transaction {} not found", txn_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Transactions for a wallet, most recent first, bounded by `limit`
    pub fn list_transactions(&self, wallet_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let prefix = Self::index_prefix(IDX_TXN, wallet_id);
        let mut transactions = Vec::new();

        // Index keys embed an inverted timestamp, so ascending key order
        // is descending recency.
        for key in self.scan_index_keys(&prefix, limit)? {
            if key.len() >= prefix.len() + 8 + 16 {
                let id_bytes: [u8; 16] = key[key.len() - 16..].try_into().unwrap();
                transactions.push(self.get_transaction(Uuid::from_bytes(id_bytes))?);
            }
        }

        Ok(transactions)
    }

    /// Sum of completed reward amounts for a wallet, filtered by source
    pub fn sum_rewards(&self, wallet_id: Uuid, source: TransactionSource) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for txn in self.list_transactions(wallet_id, usize::MAX)? {
            if txn.kind == TransactionKind::Reward
                && txn.source == source
                && txn.status == TransactionStatus::Completed
            {
                total += txn.amount;
            }
        }
        Ok(total)
    }

    // Level operations

    /// Get a user's level aggregate, None if no XP was ever granted
    pub fn try_get_level(&self, user_id: Uuid) -> Result<Option<UserLevel>> {
        let cf = self.cf_handle(CF_LEVELS)?;
        match self.db.get_cf(cf, user_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Put a user's level aggregate
    pub fn put_level(&self, level: &UserLevel) -> Result<()> {
        let cf = self.cf_handle(CF_LEVELS)?;
        let value = bincode::serialize(level)?;
        self.db.put_cf(cf, level.user_id.as_bytes(), &value)?;
        Ok(())
    }

    // Achievement operations

    /// Get catalog entry by key
    pub fn get_achievement(&self, key: &str) -> Result<Option<Achievement>> {
        let cf = self.cf_handle(CF_ACHIEVEMENTS)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// True if the user already holds the achievement
    pub fn has_achievement(&self, user_id: Uuid, key: &str) -> Result<bool> {
        let cf = self.cf_handle(CF_ACHIEVEMENT_LINKS)?;
        Ok(self
            .db
            .get_cf(cf, Self::achievement_link_key(user_id, key))?
            .is_some())
    }

    /// All achievements held by a user
    pub fn list_achievements(&self, user_id: Uuid) -> Result<Vec<AchievementLink>> {
        let cf = self.cf_handle(CF_ACHIEVEMENT_LINKS)?;
        let prefix = user_id.as_bytes().to_vec();
        let mut links = Vec::new();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            links.push(bincode::deserialize(&value)?);
        }

        Ok(links)
    }

    /// Upsert the catalog entry and create the user link (atomic).
    /// The caller checks `has_achievement` first; the single writer makes
    /// the check-then-insert sequence race-free.
    pub fn apply_achievement(
        &self,
        achievement: &Achievement,
        link: &AchievementLink,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_catalog = self.cf_handle(CF_ACHIEVEMENTS)?;
        batch.put_cf(
            cf_catalog,
            achievement.key.as_bytes(),
            bincode::serialize(achievement)?,
        );

        let cf_links = self.cf_handle(CF_ACHIEVEMENT_LINKS)?;
        batch.put_cf(
            cf_links,
            Self::achievement_link_key(link.user_id, &link.key),
            bincode::serialize(link)?,
        );

        self.db.write(batch)?;

        tracing::debug!(user_id = %link.user_id, key = %link.key, "Achievement granted");
        Ok(())
    }

    // Referral operations

    /// Store a new referral; fails with Conflict if the code is taken
    pub fn create_referral(&self, referral: &Referral) -> Result<()> {
        let cf = self.cf_handle(CF_REFERRALS)?;

        if self.db.get_cf(cf, referral.code.as_bytes())?.is_some() {
            return Err(Error::Conflict(format!(
                "referral code {} already exists",
                referral.code
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(cf, referral.code.as_bytes(), bincode::serialize(referral)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::referral_index_key(referral.referrer_id, &referral.code),
            [],
        );

        self.db.write(batch)?;
        Ok(())
    }

    /// Get referral by code
    pub fn get_referral(&self, code: &str) -> Result<Referral> {
        let cf = self.cf_handle(CF_REFERRALS)?;
        let value = self
            .db
            .get_cf(cf, code.as_bytes())?
            .ok_or_else(|| Error::ReferralNotFound(code.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All referrals created by a user (via index)
    pub fn list_referrals(&self, referrer_id: Uuid) -> Result<Vec<Referral>> {
        let prefix = Self::index_prefix(IDX_REFERRAL, referrer_id);
        let mut referrals = Vec::new();

        for key in self.scan_index_keys(&prefix, usize::MAX)? {
            let code = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|_| Error::Storage("malformed referral index key".to_string()))?;
            referrals.push(self.get_referral(code)?);
        }

        Ok(referrals)
    }

    // Snapshot reads

    /// Point-in-time view backing a wallet summary. All rows come from one
    /// RocksDB snapshot, so a mutation committing mid-read cannot tear the
    /// liquid balance apart from the staked total.
    pub fn read_summary(&self, user_id: Uuid, txn_limit: usize) -> Result<SummaryView> {
        let snapshot = self.db.snapshot();

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let wallet: Wallet = match snapshot.get_cf(cf_wallets, user_id.as_bytes())? {
            Some(value) => bincode::deserialize(&value)?,
            None => return Err(Error::WalletNotFound(user_id)),
        };

        let cf_stakings = self.cf_handle(CF_STAKINGS)?;
        let staking_prefix = Self::index_prefix(IDX_STAKING, wallet.id);
        let mut stakings: Vec<StakingPosition> = Vec::new();
        for key in self.scan_snapshot_keys(&snapshot, &staking_prefix, usize::MAX)? {
            if key.len() >= staking_prefix.len() + 16 {
                let value = snapshot
                    .get_cf(cf_stakings, &key[key.len() - 16..])?
                    .ok_or_else(|| {
                        Error::Storage("staking index points at a missing row".to_string())
                    })?;
                stakings.push(bincode::deserialize(&value)?);
            }
        }

        let mut staked = Decimal::ZERO;
        for position in &stakings {
            if position.is_active() {
                staked += position.amount;
            }
        }

        let cf_txns = self.cf_handle(CF_TRANSACTIONS)?;
        let txn_prefix = Self::index_prefix(IDX_TXN, wallet.id);
        let mut transactions: Vec<Transaction> = Vec::new();
        for key in self.scan_snapshot_keys(&snapshot, &txn_prefix, txn_limit)? {
            if key.len() >= txn_prefix.len() + 8 + 16 {
                let value = snapshot
                    .get_cf(cf_txns, &key[key.len() - 16..])?
                    .ok_or_else(|| {
                        Error::Storage("transaction index points at a missing row".to_string())
                    })?;
                transactions.push(bincode::deserialize(&value)?);
            }
        }

        Ok(SummaryView {
            wallet,
            staked,
            stakings,
            transactions,
        })
    }

    // Atomic multi-row mutations

    /// Apply a stake: wallet debit, project aggregate increment, position
    /// insert, ledger append. All four writes commit atomically or not at
    /// all.
    pub fn apply_stake(
        &self,
        wallet: &Wallet,
        expected_version: u64,
        project: &Project,
        position: &StakingPosition,
        txn: &Transaction,
    ) -> Result<()> {
        self.check_wallet_version(wallet.user_id, expected_version)?;

        let mut batch = WriteBatch::default();
        self.batch_wallet(&mut batch, wallet)?;
        self.batch_project(&mut batch, project)?;
        self.batch_staking(&mut batch, position)?;
        self.batch_transaction(&mut batch, txn)?;
        self.db.write(batch)?;

        tracing::debug!(
            user_id = %wallet.user_id,
            project_id = %project.id,
            staking_id = %position.id,
            amount = %position.amount,
            "Stake applied"
        );
        Ok(())
    }

    /// Apply an unstake: wallet credit, project aggregate decrement,
    /// position update, ledger append. Atomic.
    pub fn apply_unstake(
        &self,
        wallet: &Wallet,
        expected_version: u64,
        project: &Project,
        position: &StakingPosition,
        txn: &Transaction,
    ) -> Result<()> {
        self.check_wallet_version(wallet.user_id, expected_version)?;

        let mut batch = WriteBatch::default();
        self.batch_wallet(&mut batch, wallet)?;
        self.batch_project(&mut batch, project)?;
        self.batch_staking(&mut batch, position)?;
        self.batch_transaction(&mut batch, txn)?;
        self.db.write(batch)?;

        tracing::debug!(
            user_id = %wallet.user_id,
            staking_id = %position.id,
            amount = %txn.amount,
            "Unstake applied"
        );
        Ok(())
    }

    /// Apply a plain balance change (credit or debit) with its ledger
    /// entry, optionally updating the user's level aggregate. Atomic.
    pub fn apply_balance_change(
        &self,
        wallet: &Wallet,
        expected_version: u64,
        txn: &Transaction,
        level: Option<&UserLevel>,
    ) -> Result<()> {
        self.check_wallet_version(wallet.user_id, expected_version)?;

        let mut batch = WriteBatch::default();
        self.batch_wallet(&mut batch, wallet)?;
        self.batch_transaction(&mut batch, txn)?;
        if let Some(level) = level {
            self.batch_level(&mut batch, level)?;
        }
        self.db.write(batch)?;

        tracing::debug!(
            user_id = %wallet.user_id,
            txn_id = %txn.id,
            amount = %txn.amount,
            "Balance change applied"
        );
        Ok(())
    }

    /// Apply a referral conversion: mark the referral used, credit the
    /// referrer, append the reward entry, update the referrer's level
    /// aggregate. Atomic.
    pub fn apply_referral_use(
        &self,
        referral: &Referral,
        wallet: &Wallet,
        expected_version: u64,
        txn: &Transaction,
        level: &UserLevel,
    ) -> Result<()> {
        self.check_wallet_version(wallet.user_id, expected_version)?;

        let mut batch = WriteBatch::default();

        let cf_referrals = self.cf_handle(CF_REFERRALS)?;
        batch.put_cf(
            cf_referrals,
            referral.code.as_bytes(),
            bincode::serialize(referral)?,
        );

        self.batch_wallet(&mut batch, wallet)?;
        self.batch_transaction(&mut batch, txn)?;
        self.batch_level(&mut batch, level)?;
        self.db.write(batch)?;

        tracing::debug!(
            code = %referral.code,
            referrer_id = %referral.referrer_id,
            reward = %referral.reward,
            "Referral conversion applied"
        );
        Ok(())
    }

    // Batch helpers

    fn batch_wallet(&self, batch: &mut WriteBatch, wallet: &Wallet) -> Result<()> {
        let cf = self.cf_handle(CF_WALLETS)?;
        batch.put_cf(cf, wallet.user_id.as_bytes(), bincode::serialize(wallet)?);
        Ok(())
    }

    fn batch_project(&self, batch: &mut WriteBatch, project: &Project) -> Result<()> {
        let cf = self.cf_handle(CF_PROJECTS)?;
        batch.put_cf(cf, project.id.as_bytes(), bincode::serialize(project)?);
        Ok(())
    }

    fn batch_staking(&self, batch: &mut WriteBatch, position: &StakingPosition) -> Result<()> {
        let cf = self.cf_handle(CF_STAKINGS)?;
        batch.put_cf(cf, position.id.as_bytes(), bincode::serialize(position)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::staking_index_key(position.wallet_id, position.id),
            [],
        );
        Ok(())
    }

    fn batch_transaction(&self, batch: &mut WriteBatch, txn: &Transaction) -> Result<()> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(cf, txn.id.as_bytes(), bincode::serialize(txn)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::txn_index_key(txn.wallet_id, txn.timestamp_nanos, txn.id),
            [],
        );
        Ok(())
    }

    fn batch_level(&self, batch: &mut WriteBatch, level: &UserLevel) -> Result<()> {
        let cf = self.cf_handle(CF_LEVELS)?;
        batch.put_cf(cf, level.user_id.as_bytes(), bincode::serialize(level)?);
        Ok(())
    }

    // Index key helpers

    fn index_prefix(tag: &[u8], id: Uuid) -> Vec<u8> {
        let mut key = tag.to_vec();
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn staking_index_key(wallet_id: Uuid, staking_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix(IDX_STAKING, wallet_id);
        key.extend_from_slice(staking_id.as_bytes());
        key
    }

    fn txn_index_key(wallet_id: Uuid, timestamp_nanos: i64, txn_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix(IDX_TXN, wallet_id);
        // Inverted timestamp: ascending key order scans newest-first
        key.extend_from_slice(&(u64::MAX - timestamp_nanos.max(0) as u64).to_be_bytes());
        key.extend_from_slice(txn_id.as_bytes());
        key
    }

    fn referral_index_key(referrer_id: Uuid, code: &str) -> Vec<u8> {
        let mut key = Self::index_prefix(IDX_REFERRAL, referrer_id);
        key.extend_from_slice(code.as_bytes());
        key
    }

    fn achievement_link_key(user_id: Uuid, key: &str) -> Vec<u8> {
        let mut link_key = user_id.as_bytes().to_vec();
        link_key.extend_from_slice(key.as_bytes());
        link_key
    }

    /// Collect up to `limit` index keys starting with `prefix`, in key order
    fn scan_index_keys(&self, prefix: &[u8], limit: usize) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut keys = Vec::new();
        for item in iter {
            if keys.len() >= limit {
                break;
            }
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    /// Like [`Self::scan_index_keys`] but pinned to a snapshot
    fn scan_snapshot_keys(
        &self,
        snapshot: &Snapshot<'_>,
        prefix: &[u8],
        limit: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let iter = snapshot.iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut keys = Vec::new();
        for item in iter {
            if keys.len() >= limit {
                break;
            }
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}
