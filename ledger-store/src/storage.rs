//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - One record per account (key: account_id)
//! - `transactions` - Append-only audit log (key: tx_id)
//! - `credit_feed` - Newest-first index of positive deltas (key: rev_ts || tx_id)
//! - `account_tx` - Newest-first per-account index (key: account_id || rev_ts || tx_id)
//! - `codes` - Promotional codes with use counters (key: code string)
//! - `referrals` - Referral links (key: referred account_id)
//! - `meta` - Counters such as global device counts
//!
//! Every mutating operation commits one `WriteBatch`, so a balance change and
//! the transaction record describing it are never observable separately.

use crate::{
    error::{Error, Result},
    types::{
        Account, AccountId, Currency, Device, PromoCode, RateTable, ReferralLink, StartOutcome,
        Transaction,
    },
    Config,
};
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_CREDIT_FEED: &str = "credit_feed";
const CF_ACCOUNT_TX: &str = "account_tx";
const CF_CODES: &str = "codes";
const CF_REFERRALS: &str = "referrals";
const CF_META: &str = "meta";

/// Meta key prefix for global device counts per kind
const META_DEVICE_COUNT: &[u8] = b"devcount:";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
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
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy transaction log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_CREDIT_FEED, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_ACCOUNT_TX, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_CODES, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_REFERRALS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_META, Self::cf_options_hot()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "opened ledger database");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_hot() -> Options {
        let mut opts = Options::default();
        // Frequently read records, LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_index() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    // Account reads

    /// Load an account if present
    pub fn load_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, account_id.key_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Load an account, creating a zero-balance one in memory if absent
    fn load_or_new(&self, account_id: AccountId, now: DateTime<Utc>) -> Result<Account> {
        Ok(self
            .load_account(account_id)?
            .unwrap_or_else(|| Account::new(account_id, now)))
    }

    /// All known account IDs (scheduler support)
    pub fn scan_account_ids(&self) -> Result<Vec<AccountId>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let mut ids = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            if key.len() == 8 {
                let bytes: [u8; 8] = key[..8].try_into().expect("checked length");
                ids.push(AccountId::from_key_bytes(bytes));
            }
        }
        Ok(ids)
    }

    // Adjustment primitive

    /// Stage one balance mutation plus its audit record into `batch`.
    ///
    /// The account is mutated in memory; the caller stages the account record
    /// once all adjustments for the operation are applied.
    fn stage_adjustment(
        &self,
        batch: &mut WriteBatch,
        account: &mut Account,
        currency: Currency,
        delta: Decimal,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        if delta == Decimal::ZERO {
            return Err(Error::InvalidAmount(delta));
        }

        let before = account.balance(currency);
        let after = before + delta;

        if after < Decimal::ZERO {
            return Err(Error::InsufficientFunds {
                account: account.account_id,
                currency,
                balance: before,
                requested: -delta,
            });
        }

        account.balances.insert(currency, after);
        if delta > Decimal::ZERO {
            let earned = account.earned(currency) + delta;
            account.total_earned.insert(currency, earned);
        }
        account.last_activity = now;

        let tx = Transaction {
            tx_id: Uuid::now_v7(),
            account_id: account.account_id,
            currency,
            delta,
            reason: reason.to_string(),
            balance_before: before,
            balance_after: after,
            timestamp: now,
        };

        let cf_tx = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(cf_tx, tx.tx_id.as_bytes(), bincode::serialize(&tx)?);

        let ts = now.timestamp_nanos_opt().unwrap_or(0) as u64;

        let cf_account_tx = self.cf_handle(CF_ACCOUNT_TX)?;
        batch.put_cf(cf_account_tx, Self::account_tx_key(account.account_id, ts, tx.tx_id), b"");

        if delta > Decimal::ZERO {
            let cf_feed = self.cf_handle(CF_CREDIT_FEED)?;
            batch.put_cf(cf_feed, Self::credit_feed_key(ts, tx.tx_id), b"");
        }

        tracing::debug!(
            account = %account.account_id,
            currency = %currency,
            %delta,
            reason,
            balance = %after,
            "adjustment staged"
        );

        Ok(after)
    }

    fn stage_account(&self, batch: &mut WriteBatch, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(cf, account.account_id.key_bytes(), bincode::serialize(account)?);
        Ok(())
    }

    /// Atomically apply one signed delta and append its transaction record
    pub fn adjust_balance(
        &self,
        account_id: AccountId,
        currency: Currency,
        delta: Decimal,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let mut account = self.load_or_new(account_id, now)?;
        let mut batch = WriteBatch::default();

        let new_balance =
            self.stage_adjustment(&mut batch, &mut account, currency, delta, reason, now)?;
        self.stage_account(&mut batch, &account)?;

        self.db.write(batch)?;
        Ok(new_balance)
    }

    // Devices

    /// Atomic debit + device append + global count bump
    #[allow(clippy::too_many_arguments)]
    pub fn purchase_device(
        &self,
        account_id: AccountId,
        device: Device,
        price: Decimal,
        currency: Currency,
        max_per_account: Option<u32>,
        global_limit: Option<u64>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Device> {
        let mut account = self.load_or_new(account_id, now)?;

        if let Some(max) = max_per_account {
            if account.device_count(&device.kind) >= max as usize {
                return Err(Error::PerAccountLimitReached(device.kind));
            }
        }

        let global_count = self.device_count(&device.kind)?;
        if let Some(limit) = global_limit {
            if global_count >= limit {
                return Err(Error::GlobalLimitReached(device.kind));
            }
        }

        let mut batch = WriteBatch::default();
        self.stage_adjustment(&mut batch, &mut account, currency, -price, reason, now)?;
        account.devices.push(device.clone());
        self.stage_account(&mut batch, &account)?;

        let cf_meta = self.cf_handle(CF_META)?;
        batch.put_cf(
            cf_meta,
            Self::device_count_key(&device.kind),
            (global_count + 1).to_be_bytes(),
        );

        self.db.write(batch)?;

        tracing::info!(
            account = %account_id,
            kind = %device.kind,
            %price,
            "device purchased"
        );

        Ok(device)
    }

    /// Global count of purchased devices of a kind
    pub fn device_count(&self, kind: &str) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, Self::device_count_key(kind))? {
            Some(value) if value.len() == 8 => {
                let bytes: [u8; 8] = value[..8].try_into().expect("checked length");
                Ok(u64::from_be_bytes(bytes))
            }
            _ => Ok(0),
        }
    }

    /// Reactivate every idle or expired device on the account
    pub fn start_devices(
        &self,
        account_id: AccountId,
        cap_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome> {
        let mut account = match self.load_account(account_id)? {
            Some(a) => a,
            None => {
                return Ok(StartOutcome {
                    started: false,
                    next_eligible_at: None,
                })
            }
        };

        let mut started = false;
        let mut next_eligible: Option<DateTime<Utc>> = None;

        for device in account.devices.iter_mut() {
            if !device.active {
                continue;
            }
            if device.is_accruing(now, cap_secs) {
                // Still inside its window; eligible again once the window ends
                let eligible = device.activated_at.expect("accruing implies activated")
                    + chrono::Duration::seconds(cap_secs);
                next_eligible = Some(match next_eligible {
                    Some(t) if t <= eligible => t,
                    _ => eligible,
                });
            } else {
                device.activated_at = Some(now);
                device.credited_ticks = 0;
                started = true;
            }
        }

        if started {
            account.last_activity = now;
            let mut batch = WriteBatch::default();
            self.stage_account(&mut batch, &account)?;
            self.db.write(batch)?;

            // A still-accruing device may become eligible before the
            // freshly started windows end
            let window_end = now + chrono::Duration::seconds(cap_secs);
            next_eligible = Some(match next_eligible {
                Some(t) if t <= window_end => t,
                _ => window_end,
            });
        }

        Ok(StartOutcome {
            started,
            next_eligible_at: next_eligible,
        })
    }

    /// Pay out all ticks owed to the account's accruing devices.
    ///
    /// Owed ticks are derived from `activated_at` and the persisted
    /// `credited_ticks` cursor, so re-running with the same clock reading
    /// credits nothing. Lifetime credit per activation window never exceeds
    /// `cap_ticks * rate`.
    pub fn accrue(
        &self,
        account_id: AccountId,
        rates: &RateTable,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<(Currency, Decimal)>> {
        let mut account = match self.load_account(account_id)? {
            Some(a) => a,
            None => return Ok(Vec::new()),
        };

        let tick_secs = rates.tick_secs.max(1) as i64;
        let mut totals: HashMap<Currency, Decimal> = HashMap::new();
        let mut touched = false;

        for device in account.devices.iter_mut() {
            if !device.active {
                continue;
            }
            let activated_at = match device.activated_at {
                Some(t) => t,
                None => continue,
            };
            let rate = match rates.rates.get(&device.kind) {
                Some(r) => r,
                None => {
                    tracing::warn!(kind = %device.kind, "device kind missing from rate table");
                    continue;
                }
            };

            let elapsed_secs = (now - activated_at).num_seconds().max(0);
            let elapsed_ticks = (elapsed_secs / tick_secs) as u64;
            let payable = elapsed_ticks.min(rates.cap_ticks);
            let owed = payable.saturating_sub(device.credited_ticks);

            if owed > 0 {
                let amount = rate.per_tick * Decimal::from(owed);
                *totals.entry(rate.currency).or_insert(Decimal::ZERO) += amount;
                device.credited_ticks = payable;
                touched = true;
            }
        }

        if !touched {
            return Ok(Vec::new());
        }

        let mut batch = WriteBatch::default();
        let mut credited = Vec::new();
        for (currency, amount) in totals {
            self.stage_adjustment(&mut batch, &mut account, currency, amount, reason, now)?;
            credited.push((currency, amount));
        }
        self.stage_account(&mut batch, &account)?;
        self.db.write(batch)?;

        Ok(credited)
    }

    // Promotional codes

    /// Register a redeemable code (admin operation)
    pub fn create_code(
        &self,
        code: &str,
        currency: Currency,
        amount: Decimal,
        uses: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.load_code(code)?.is_some() {
            return Err(Error::Other(format!("code '{}' already exists", code)));
        }
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let record = PromoCode {
            code: code.to_string(),
            currency,
            amount,
            uses_left: uses,
            redeemed_by: Default::default(),
            created_at: now,
        };

        let cf = self.cf_handle(CF_CODES)?;
        self.db
            .put_cf(cf, code.as_bytes(), bincode::serialize(&record)?)?;

        tracing::info!(code, %currency, %amount, uses, "promo code created");
        Ok(())
    }

    fn load_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let cf = self.cf_handle(CF_CODES)?;
        match self.db.get_cf(cf, code.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// One-time-per-account redemption with a global use counter.
    ///
    /// The counter decrement, the redeemer record, and the credit commit in
    /// one batch, so a crash cannot leave a consumed use without its grant.
    pub fn redeem_code(
        &self,
        code: &str,
        account_id: AccountId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Currency, Decimal)> {
        let mut record = self.load_code(code)?.ok_or(Error::UnknownCode)?;

        if record.uses_left == 0 {
            return Err(Error::CodeExhausted);
        }
        if record.redeemed_by.contains(&account_id.as_i64()) {
            return Err(Error::AlreadyRedeemed(account_id));
        }

        let mut account = self.load_or_new(account_id, now)?;
        let mut batch = WriteBatch::default();

        self.stage_adjustment(
            &mut batch,
            &mut account,
            record.currency,
            record.amount,
            reason,
            now,
        )?;
        self.stage_account(&mut batch, &account)?;

        record.uses_left -= 1;
        record.redeemed_by.insert(account_id.as_i64());
        let cf_codes = self.cf_handle(CF_CODES)?;
        batch.put_cf(cf_codes, code.as_bytes(), bincode::serialize(&record)?);

        self.db.write(batch)?;

        tracing::info!(code, account = %account_id, "promo code redeemed");
        Ok((record.currency, record.amount))
    }

    // Referrals

    /// Record a referral link and grant both one-time bonuses atomically.
    ///
    /// Strict at this layer: self-links, duplicate links and unknown
    /// referrers are typed errors; the ledger API above maps benign cases to
    /// `linked = false`.
    pub fn link_referral(
        &self,
        referred: AccountId,
        referrer: AccountId,
        signup_bonus: (Currency, Decimal),
        referrer_bonus: (Currency, Decimal),
        now: DateTime<Utc>,
    ) -> Result<()> {
        // Self-links would load the same account as two independent copies
        // and stage conflicting writes to one key
        if referred == referrer {
            return Err(Error::SelfReferral(referred));
        }
        if self.referrer_of(referred)?.is_some() {
            return Err(Error::AlreadyLinked(referred));
        }

        let mut referrer_account = self
            .load_account(referrer)?
            .ok_or(Error::AccountNotFound(referrer))?;
        let mut referred_account = self.load_or_new(referred, now)?;

        if referred_account.referral.referrer.is_some() {
            return Err(Error::AlreadyLinked(referred));
        }

        referred_account.referral.referrer = Some(referrer);

        let mut batch = WriteBatch::default();

        if !referred_account.referral.signup_bonus_granted && signup_bonus.1 > Decimal::ZERO {
            self.stage_adjustment(
                &mut batch,
                &mut referred_account,
                signup_bonus.0,
                signup_bonus.1,
                "referral:signup",
                now,
            )?;
            referred_account.referral.signup_bonus_granted = true;
        }

        if !referred_account.referral.referrer_bonus_granted && referrer_bonus.1 > Decimal::ZERO {
            self.stage_adjustment(
                &mut batch,
                &mut referrer_account,
                referrer_bonus.0,
                referrer_bonus.1,
                "referral:invite",
                now,
            )?;
            referred_account.referral.referrer_bonus_granted = true;
        }

        self.stage_account(&mut batch, &referred_account)?;
        self.stage_account(&mut batch, &referrer_account)?;

        let link = ReferralLink {
            referred,
            referrer,
            linked_at: now,
        };
        let cf = self.cf_handle(CF_REFERRALS)?;
        batch.put_cf(cf, referred.key_bytes(), bincode::serialize(&link)?);

        self.db.write(batch)?;

        tracing::info!(%referred, %referrer, "referral linked");
        Ok(())
    }

    /// Referrer lookup without loading the full account
    pub fn referrer_of(&self, account_id: AccountId) -> Result<Option<AccountId>> {
        let cf = self.cf_handle(CF_REFERRALS)?;
        match self.db.get_cf(cf, account_id.key_bytes())? {
            Some(value) => {
                let link: ReferralLink = bincode::deserialize(&value)?;
                Ok(Some(link.referrer))
            }
            None => Ok(None),
        }
    }

    // Audit queries

    /// Get transaction by ID
    pub fn get_transaction(&self, tx_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, tx_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("transaction {} not found", tx_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Newest-first positive deltas for the public "recent wins" feed
    pub fn recent_credits(&self, limit: usize) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(CF_CREDIT_FEED)?;
        let mut out = Vec::with_capacity(limit.min(64));

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            if out.len() >= limit {
                break;
            }
            let (key, _) = item?;
            if key.len() >= 24 {
                let tx_id_bytes: [u8; 16] = key[8..24].try_into().expect("checked length");
                out.push(self.get_transaction(Uuid::from_bytes(tx_id_bytes))?);
            }
        }

        Ok(out)
    }

    /// Newest-first transactions for one account
    pub fn account_transactions(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(CF_ACCOUNT_TX)?;
        let prefix = account_id.key_bytes();
        let mut out = Vec::with_capacity(limit.min(64));

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if key.len() < 32 || key[..8] != prefix {
                break;
            }
            if out.len() >= limit {
                break;
            }
            let tx_id_bytes: [u8; 16] = key[16..32].try_into().expect("checked length");
            out.push(self.get_transaction(Uuid::from_bytes(tx_id_bytes))?);
        }

        Ok(out)
    }

    // Administration

    /// Hard-delete an account and its indices (audit log is retained)
    pub fn purge_account(&self, account_id: AccountId) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.delete_cf(cf_accounts, account_id.key_bytes());

        let cf_referrals = self.cf_handle(CF_REFERRALS)?;
        batch.delete_cf(cf_referrals, account_id.key_bytes());

        let cf_account_tx = self.cf_handle(CF_ACCOUNT_TX)?;
        let prefix = account_id.key_bytes();
        let iter = self
            .db
            .iterator_cf(cf_account_tx, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if key.len() < 8 || key[..8] != prefix {
                break;
            }
            batch.delete_cf(cf_account_tx, key);
        }

        self.db.write(batch)?;
        tracing::warn!(account = %account_id, "account purged");
        Ok(())
    }

    // Index key helpers

    fn credit_feed_key(ts_nanos: u64, tx_id: Uuid) -> Vec<u8> {
        let mut key = (u64::MAX - ts_nanos).to_be_bytes().to_vec();
        key.extend_from_slice(tx_id.as_bytes());
        key
    }

    fn account_tx_key(account_id: AccountId, ts_nanos: u64, tx_id: Uuid) -> Vec<u8> {
        let mut key = account_id.key_bytes().to_vec();
        key.extend_from_slice(&(u64::MAX - ts_nanos).to_be_bytes());
        key.extend_from_slice(tx_id.as_bytes());
        key
    }

    fn device_count_key(kind: &str) -> Vec<u8> {
        let mut key = META_DEVICE_COUNT.to_vec();
        key.extend_from_slice(kind.as_bytes());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn rate_table(tick_secs: u64, cap_ticks: u64) -> RateTable {
        let mut rates = HashMap::new();
        rates.insert(
            "novice".to_string(),
            crate::types::DeviceRate {
                per_tick: Decimal::from(2u64),
                currency: Currency::Coins,
            },
        );
        RateTable {
            tick_secs,
            cap_ticks,
            rates,
        }
    }

    #[test]
    fn test_adjust_creates_account_lazily() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(7);
        let now = Utc::now();

        assert!(storage.load_account(id).unwrap().is_none());

        let balance = storage
            .adjust_balance(id, Currency::Coins, Decimal::from(10u64), "click", now)
            .unwrap();
        assert_eq!(balance, Decimal::from(10u64));

        let account = storage.load_account(id).unwrap().unwrap();
        assert_eq!(account.balance(Currency::Coins), Decimal::from(10u64));
        assert_eq!(account.earned(Currency::Coins), Decimal::from(10u64));
    }

    #[test]
    fn test_insufficient_funds_leaves_no_trace() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(1);
        let now = Utc::now();

        let result =
            storage.adjust_balance(id, Currency::Coins, Decimal::from(-5i64), "debit", now);
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        // Rejected debit must not create the account or any transactions
        assert!(storage.load_account(id).unwrap().is_none());
        assert!(storage.recent_credits(10).unwrap().is_empty());
    }

    #[test]
    fn test_debit_does_not_touch_total_earned() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(2);
        let now = Utc::now();

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(100u64), "seed", now)
            .unwrap();
        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(-40i64), "spend", now)
            .unwrap();

        let account = storage.load_account(id).unwrap().unwrap();
        assert_eq!(account.balance(Currency::Coins), Decimal::from(60u64));
        assert_eq!(account.earned(Currency::Coins), Decimal::from(100u64));
    }

    #[test]
    fn test_zero_delta_rejected() {
        let (storage, _temp) = test_storage();
        let result = storage.adjust_balance(
            AccountId::new(3),
            Currency::Coins,
            Decimal::ZERO,
            "noop",
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_audit_snapshots_chain() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(4);
        let now = Utc::now();

        storage
            .adjust_balance(id, Currency::Stars, Decimal::from(5u64), "a", now)
            .unwrap();
        storage
            .adjust_balance(id, Currency::Stars, Decimal::from(3u64), "b", now)
            .unwrap();

        let mut txs = storage.account_transactions(id, 10).unwrap();
        txs.reverse(); // oldest first
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].balance_before, Decimal::ZERO);
        assert_eq!(txs[0].balance_after, Decimal::from(5u64));
        assert_eq!(txs[1].balance_before, Decimal::from(5u64));
        assert_eq!(txs[1].balance_after, Decimal::from(8u64));
    }

    #[test]
    fn test_recent_credits_newest_first_positive_only() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(5);
        let t0 = Utc::now();

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(10u64), "first", t0)
            .unwrap();
        storage
            .adjust_balance(
                id,
                Currency::Coins,
                Decimal::from(-4i64),
                "debit",
                t0 + chrono::Duration::seconds(1),
            )
            .unwrap();
        storage
            .adjust_balance(
                id,
                Currency::Coins,
                Decimal::from(20u64),
                "second",
                t0 + chrono::Duration::seconds(2),
            )
            .unwrap();

        let feed = storage.recent_credits(10).unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].reason, "second");
        assert_eq!(feed[1].reason, "first");
        assert!(feed.iter().all(|tx| tx.delta > Decimal::ZERO));
    }

    #[test]
    fn test_purchase_device_atomic_debit() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(6);
        let now = Utc::now();

        // Broke account cannot buy
        let result = storage.purchase_device(
            id,
            Device::new("novice", now),
            Decimal::from(100u64),
            Currency::Coins,
            Some(2),
            None,
            "shop:novice",
            now,
        );
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(100u64), "seed", now)
            .unwrap();
        storage
            .purchase_device(
                id,
                Device::new("novice", now),
                Decimal::from(100u64),
                Currency::Coins,
                Some(2),
                None,
                "shop:novice",
                now,
            )
            .unwrap();

        let account = storage.load_account(id).unwrap().unwrap();
        assert_eq!(account.balance(Currency::Coins), Decimal::ZERO);
        assert_eq!(account.devices.len(), 1);
        assert_eq!(storage.device_count("novice").unwrap(), 1);
    }

    #[test]
    fn test_purchase_limits() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(7);
        let now = Utc::now();

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(1000u64), "seed", now)
            .unwrap();

        storage
            .purchase_device(
                id,
                Device::new("novice", now),
                Decimal::from(100u64),
                Currency::Coins,
                Some(1),
                None,
                "shop:novice",
                now,
            )
            .unwrap();

        let per_account = storage.purchase_device(
            id,
            Device::new("novice", now),
            Decimal::from(100u64),
            Currency::Coins,
            Some(1),
            None,
            "shop:novice",
            now,
        );
        assert!(matches!(per_account, Err(Error::PerAccountLimitReached(_))));

        let global = storage.purchase_device(
            AccountId::new(8),
            Device::new("novice", now),
            Decimal::from(100u64),
            Currency::Coins,
            None,
            Some(1),
            "shop:novice",
            now,
        );
        assert!(matches!(global, Err(Error::GlobalLimitReached(_))));
    }

    #[test]
    fn test_accrue_idempotent_and_bounded() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(9);
        let t0 = Utc::now();
        let rates = rate_table(60, 4); // 2 coins per minute, 4-minute cap

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(100u64), "seed", t0)
            .unwrap();
        storage
            .purchase_device(
                id,
                Device::new("novice", t0),
                Decimal::from(100u64),
                Currency::Coins,
                None,
                None,
                "shop:novice",
                t0,
            )
            .unwrap();
        storage.start_devices(id, rates.cap_secs(), t0).unwrap();

        // Two ticks elapsed
        let t2 = t0 + chrono::Duration::seconds(120);
        let credited = storage.accrue(id, &rates, t2, "mining:tick").unwrap();
        assert_eq!(credited, vec![(Currency::Coins, Decimal::from(4u64))]);

        // Same instant again: nothing owed
        assert!(storage.accrue(id, &rates, t2, "mining:tick").unwrap().is_empty());

        // Way past the cap: only the remaining 2 capped ticks pay out
        let t10 = t0 + chrono::Duration::seconds(600);
        let credited = storage.accrue(id, &rates, t10, "mining:backfill").unwrap();
        assert_eq!(credited, vec![(Currency::Coins, Decimal::from(4u64))]);

        // Re-running catch-up credits nothing further
        assert!(storage
            .accrue(id, &rates, t10, "mining:backfill")
            .unwrap()
            .is_empty());

        let account = storage.load_account(id).unwrap().unwrap();
        // cap_ticks(4) * rate(2) = 8 lifetime, on top of the spent seed
        assert_eq!(account.balance(Currency::Coins), Decimal::from(8u64));
    }

    #[test]
    fn test_start_devices_restart_resets_window() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(10);
        let t0 = Utc::now();
        let rates = rate_table(60, 4);

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(100u64), "seed", t0)
            .unwrap();
        storage
            .purchase_device(
                id,
                Device::new("novice", t0),
                Decimal::from(100u64),
                Currency::Coins,
                None,
                None,
                "shop:novice",
                t0,
            )
            .unwrap();

        let outcome = storage.start_devices(id, rates.cap_secs(), t0).unwrap();
        assert!(outcome.started);

        // Accruing device cannot be restarted mid-window
        let t1 = t0 + chrono::Duration::seconds(60);
        let outcome = storage.start_devices(id, rates.cap_secs(), t1).unwrap();
        assert!(!outcome.started);
        assert_eq!(
            outcome.next_eligible_at,
            Some(t0 + chrono::Duration::seconds(rates.cap_secs()))
        );

        // Expired device restarts with a fresh window
        let t5 = t0 + chrono::Duration::seconds(300);
        storage.accrue(id, &rates, t5, "mining:backfill").unwrap();
        let outcome = storage.start_devices(id, rates.cap_secs(), t5).unwrap();
        assert!(outcome.started);

        let account = storage.load_account(id).unwrap().unwrap();
        assert_eq!(account.devices[0].credited_ticks, 0);
        assert_eq!(account.devices[0].activated_at, Some(t5));
    }

    #[test]
    fn test_start_devices_reports_earliest_eligibility() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(14);
        let t0 = Utc::now();
        let rates = rate_table(60, 4);

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(200u64), "seed", t0)
            .unwrap();
        storage
            .purchase_device(
                id,
                Device::new("novice", t0),
                Decimal::from(100u64),
                Currency::Coins,
                None,
                None,
                "shop:novice",
                t0,
            )
            .unwrap();
        storage.start_devices(id, rates.cap_secs(), t0).unwrap();

        // Second device bought one tick later, still idle
        let t1 = t0 + chrono::Duration::seconds(60);
        storage
            .purchase_device(
                id,
                Device::new("novice", t1),
                Decimal::from(100u64),
                Currency::Coins,
                None,
                None,
                "shop:novice",
                t1,
            )
            .unwrap();

        // Starting it must report the first device's earlier window end,
        // not the fresh window's
        let outcome = storage.start_devices(id, rates.cap_secs(), t1).unwrap();
        assert!(outcome.started);
        assert_eq!(
            outcome.next_eligible_at,
            Some(t0 + chrono::Duration::seconds(rates.cap_secs()))
        );
    }

    #[test]
    fn test_code_redemption_flow() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let alice = AccountId::new(11);
        let bob = AccountId::new(12);

        storage
            .create_code("LAUNCH", Currency::Stars, Decimal::from(5u64), 2, now)
            .unwrap();

        assert!(matches!(
            storage.redeem_code("NOPE", alice, "promo:NOPE", now),
            Err(Error::UnknownCode)
        ));

        let (currency, amount) = storage
            .redeem_code("LAUNCH", alice, "promo:LAUNCH", now)
            .unwrap();
        assert_eq!(currency, Currency::Stars);
        assert_eq!(amount, Decimal::from(5u64));

        // Second redemption by the same account is rejected
        assert!(matches!(
            storage.redeem_code("LAUNCH", alice, "promo:LAUNCH", now),
            Err(Error::AlreadyRedeemed(_))
        ));

        // Last use consumed by bob, then the code is exhausted
        storage
            .redeem_code("LAUNCH", bob, "promo:LAUNCH", now)
            .unwrap();
        assert!(matches!(
            storage.redeem_code("LAUNCH", AccountId::new(13), "promo:LAUNCH", now),
            Err(Error::CodeExhausted)
        ));
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        storage
            .create_code("X", Currency::Coins, Decimal::from(1u64), 1, now)
            .unwrap();
        assert!(storage
            .create_code("X", Currency::Coins, Decimal::from(1u64), 1, now)
            .is_err());
    }

    #[test]
    fn test_link_referral_grants_both_bonuses_once() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let referrer = AccountId::new(20);
        let referred = AccountId::new(21);
        let signup = (Currency::Coins, Decimal::from(25u64));
        let invite = (Currency::Coins, Decimal::from(50u64));

        // Referrer must exist
        assert!(matches!(
            storage.link_referral(referred, referrer, signup, invite, now),
            Err(Error::AccountNotFound(_))
        ));

        storage
            .adjust_balance(referrer, Currency::Coins, Decimal::from(1u64), "seed", now)
            .unwrap();

        storage
            .link_referral(referred, referrer, signup, invite, now)
            .unwrap();

        assert_eq!(storage.referrer_of(referred).unwrap(), Some(referrer));
        let referred_account = storage.load_account(referred).unwrap().unwrap();
        assert_eq!(referred_account.balance(Currency::Coins), Decimal::from(25u64));
        assert!(referred_account.referral.signup_bonus_granted);
        assert!(referred_account.referral.referrer_bonus_granted);

        let referrer_account = storage.load_account(referrer).unwrap().unwrap();
        assert_eq!(referrer_account.balance(Currency::Coins), Decimal::from(51u64));

        // Retried link is a typed, benign error and grants nothing
        let retry = storage.link_referral(referred, referrer, signup, invite, now);
        assert!(matches!(retry, Err(Error::AlreadyLinked(_))));
        let referrer_account = storage.load_account(referrer).unwrap().unwrap();
        assert_eq!(referrer_account.balance(Currency::Coins), Decimal::from(51u64));
    }

    #[test]
    fn test_self_link_rejected_at_storage_layer() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let id = AccountId::new(22);
        let bonus = (Currency::Coins, Decimal::from(25u64));

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(1u64), "seed", now)
            .unwrap();

        let result = storage.link_referral(id, id, bonus, bonus, now);
        assert!(matches!(result, Err(Error::SelfReferral(_))));

        // Nothing committed: no link, no bonuses, no extra transactions
        assert_eq!(storage.referrer_of(id).unwrap(), None);
        let account = storage.load_account(id).unwrap().unwrap();
        assert_eq!(account.balance(Currency::Coins), Decimal::from(1u64));
        assert!(!account.referral.signup_bonus_granted);
        assert_eq!(storage.account_transactions(id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_purge_account_keeps_audit_log() {
        let (storage, _temp) = test_storage();
        let id = AccountId::new(30);
        let now = Utc::now();

        storage
            .adjust_balance(id, Currency::Coins, Decimal::from(10u64), "seed", now)
            .unwrap();
        let txs = storage.account_transactions(id, 10).unwrap();
        assert_eq!(txs.len(), 1);
        let tx_id = txs[0].tx_id;

        storage.purge_account(id).unwrap();
        assert!(storage.load_account(id).unwrap().is_none());
        assert!(storage.account_transactions(id, 10).unwrap().is_empty());
        // The raw transaction record survives
        assert!(storage.get_transaction(tx_id).is_ok());
    }

    #[test]
    fn test_scan_account_ids() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        for i in 1..=3 {
            storage
                .adjust_balance(AccountId::new(i), Currency::Coins, Decimal::from(1u64), "seed", now)
                .unwrap();
        }
        let ids = storage.scan_account_ids().unwrap();
        assert_eq!(ids.len(), 3);
    }
}
