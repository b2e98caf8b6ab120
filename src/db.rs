use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::categorizer::validate_rule;
use crate::error::{PloutosError, Result};
use crate::models::{
    Account, AccountDraft, AccountId, CategorizationRule, ConditionGroup, PairKey,
    ProcessorConfig, RejectedPair, RuleDraft, RuleId, SlaveDraft, SlaveTransaction, Transaction,
    TransactionDraft, TransactionId, TransactionType, Transfer, TransferLink, UNKNOWN,
};
use crate::store::Store;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    sub_category TEXT NOT NULL,
    is_real INTEGER NOT NULL DEFAULT 0,
    original_amount TEXT NOT NULL DEFAULT '0',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    amount TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('debit', 'credit')),
    description TEXT NOT NULL,
    date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS transaction_slaves (
    id INTEGER PRIMARY KEY,
    master_id INTEGER NOT NULL,
    account_id INTEGER NOT NULL,
    amount TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('debit', 'credit')),
    date TEXT NOT NULL,
    FOREIGN KEY (master_id) REFERENCES transactions(id) ON DELETE CASCADE,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE INDEX IF NOT EXISTS idx_slaves_master ON transaction_slaves(master_id);

CREATE TABLE IF NOT EXISTS categorization_rules (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    condition_groups TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    enabled INTEGER NOT NULL DEFAULT 1,
    processor_type TEXT NOT NULL,
    processor_config TEXT NOT NULL,
    account_ids TEXT NOT NULL DEFAULT '[]',
    last_applied_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rejected_transfer_pairs (
    id INTEGER PRIMARY KEY,
    credit_transaction_id INTEGER NOT NULL,
    debit_transaction_id INTEGER NOT NULL,
    rejected_reason TEXT,
    rejected_at TEXT NOT NULL,
    UNIQUE (credit_transaction_id, debit_transaction_id)
);

CREATE TABLE IF NOT EXISTS transfer_links (
    id INTEGER PRIMARY KEY,
    credit_transaction_id INTEGER NOT NULL,
    debit_transaction_id INTEGER NOT NULL,
    merged_at TEXT NOT NULL,
    UNIQUE (credit_transaction_id, debit_transaction_id)
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row(
        "SELECT count(*) FROM accounts WHERE name = ?1 AND category = ?1 AND sub_category = ?1 AND is_real = 0",
        [UNKNOWN],
        |row| row.get(0),
    )?;
    if count == 0 {
        conn.execute(
            "INSERT INTO accounts (name, category, sub_category, is_real, original_amount) VALUES (?1, ?1, ?1, 0, '0')",
            [UNKNOWN],
        )?;
    }
    Ok(())
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_at(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn kind_at(row: &Row, idx: usize) -> rusqlite::Result<TransactionType> {
    let text: String = row.get(idx)?;
    TransactionType::from_str(&text).map_err(|e| conversion_error(idx, e))
}

const ACCOUNT_COLUMNS: &str = "id, name, category, sub_category, is_real, original_amount";

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        sub_category: row.get(3)?,
        is_real: row.get(4)?,
        original_amount: decimal_at(row, 5)?,
    })
}

const TXN_COLUMNS: &str =
    "t.id, t.account_id, t.amount, t.type, t.description, t.date, t.created_at, t.updated_at";

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: decimal_at(row, 2)?,
        kind: kind_at(row, 3)?,
        description: row.get(4)?,
        date: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const SLAVE_COLUMNS: &str = "id, master_id, account_id, amount, type, date";

fn slave_from_row(row: &Row) -> rusqlite::Result<SlaveTransaction> {
    Ok(SlaveTransaction {
        id: row.get(0)?,
        master_id: row.get(1)?,
        account_id: row.get(2)?,
        amount: decimal_at(row, 3)?,
        kind: kind_at(row, 4)?,
        date: row.get(5)?,
    })
}

const RULE_COLUMNS: &str = "id, description, condition_groups, priority, enabled, \
     processor_type, processor_config, last_applied_at, created_at, account_ids";

fn rule_from_row(row: &Row) -> rusqlite::Result<CategorizationRule> {
    let groups: String = row.get(2)?;
    let condition_groups: Vec<ConditionGroup> =
        serde_json::from_str(&groups).map_err(|e| conversion_error(2, e))?;
    let processor_type: String = row.get(5)?;
    let processor_config: String = row.get(6)?;
    let processor = ProcessorConfig::from_parts(&processor_type, &processor_config)
        .map_err(|e| conversion_error(6, e))?;
    let account_ids: String = row.get(9)?;
    let account_ids: Vec<AccountId> =
        serde_json::from_str(&account_ids).map_err(|e| conversion_error(9, e))?;
    Ok(CategorizationRule {
        id: row.get(0)?,
        description: row.get(1)?,
        condition_groups,
        priority: row.get(3)?,
        enabled: row.get(4)?,
        processor,
        account_ids,
        last_applied_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn rejected_from_row(row: &Row) -> rusqlite::Result<RejectedPair> {
    Ok(RejectedPair {
        key: PairKey::new(row.get(0)?, row.get(1)?),
        rejected_reason: row.get(2)?,
        rejected_at: row.get(3)?,
    })
}

fn link_from_row(row: &Row) -> rusqlite::Result<TransferLink> {
    Ok(TransferLink {
        key: PairKey::new(row.get(0)?, row.get(1)?),
        merged_at: row.get(2)?,
    })
}

// ---------------------------------------------------------------------------
// Helpers shared by reads and guarded writes
// ---------------------------------------------------------------------------

fn find_transaction(conn: &Connection, id: TransactionId) -> Result<Transaction> {
    conn.query_row(
        &format!("SELECT {TXN_COLUMNS} FROM transactions t WHERE t.id = ?1"),
        [id],
        transaction_from_row,
    )
    .optional()?
    .ok_or_else(|| PloutosError::NotFound(format!("transaction {id}")))
}

fn find_unknown_id(conn: &Connection) -> Result<AccountId> {
    conn.query_row(
        "SELECT id FROM accounts WHERE name = ?1 AND category = ?1 AND sub_category = ?1 AND is_real = 0 \
         ORDER BY id LIMIT 1",
        [UNKNOWN],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| PloutosError::NotFound("Unknown account (run `ploutos init`)".into()))
}

fn is_uncategorized(conn: &Connection, master_id: TransactionId, unknown_id: AccountId) -> Result<bool> {
    let (count, on_unknown): (i64, i64) = conn.query_row(
        "SELECT count(*), COALESCE(SUM(account_id = ?2), 0) FROM transaction_slaves WHERE master_id = ?1",
        rusqlite::params![master_id, unknown_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(count == 1 && on_unknown == 1)
}

fn load_slaves(conn: &Connection, master_id: TransactionId) -> Result<Vec<SlaveTransaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLAVE_COLUMNS} FROM transaction_slaves WHERE master_id = ?1 ORDER BY id"
    ))?;
    let slaves = stmt
        .query_map([master_id], slave_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(slaves)
}

fn insert_slaves(conn: &Connection, master_id: TransactionId, slaves: &[SlaveDraft]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO transaction_slaves (master_id, account_id, amount, type, date) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (i, slave) in slaves.iter().enumerate() {
        let account_id = slave.account_id.ok_or_else(|| {
            PloutosError::InvalidSlaves(format!("slave {} has no account", i + 1))
        })?;
        stmt.execute(rusqlite::params![
            master_id,
            account_id,
            slave.amount.to_string(),
            slave.kind.as_str(),
            slave.date,
        ])?;
    }
    Ok(())
}

fn query_transactions(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, transaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (creating if needed) and initialize the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }

    fn check_rule_accounts(&self, draft: &RuleDraft) -> Result<()> {
        for id in &draft.account_ids {
            self.account(*id)?;
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for SqliteStore {
    fn accounts(&self) -> Result<Vec<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"))?;
        let rows = stmt
            .query_map([], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn account(&self, id: AccountId) -> Result<Account> {
        self.conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                [id],
                account_from_row,
            )
            .optional()?
            .ok_or_else(|| PloutosError::NotFound(format!("account {id}")))
    }

    fn create_account(&self, draft: &AccountDraft) -> Result<Account> {
        if draft.name.trim().is_empty() {
            return Err(PloutosError::Validation("account name is empty".into()));
        }
        self.conn.execute(
            "INSERT INTO accounts (name, category, sub_category, is_real, original_amount) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                draft.name,
                draft.category,
                draft.sub_category,
                draft.is_real,
                draft.original_amount.to_string(),
            ],
        )?;
        self.account(self.conn.last_insert_rowid())
    }

    fn unknown_account(&self) -> Result<Account> {
        self.account(find_unknown_id(&self.conn)?)
    }

    fn create_transaction(&self, draft: &TransactionDraft) -> Result<Transaction> {
        if draft.amount < Decimal::ZERO {
            return Err(PloutosError::Validation(format!(
                "transaction amount must be non-negative, got {}",
                draft.amount
            )));
        }
        self.account(draft.account_id)?;
        let unknown_id = find_unknown_id(&self.conn)?;

        let tx = self.conn.unchecked_transaction()?;
        let stamp = now();
        tx.execute(
            "INSERT INTO transactions (account_id, amount, type, description, date, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            rusqlite::params![
                draft.account_id,
                draft.amount.to_string(),
                draft.kind.as_str(),
                draft.description,
                draft.date,
                stamp,
            ],
        )?;
        let id = tx.last_insert_rowid();
        let master = find_transaction(&tx, id)?;
        insert_slaves(&tx, id, &[SlaveDraft::mirror(&master, unknown_id, master.amount)])?;
        tx.commit()?;
        Ok(master)
    }

    fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        find_transaction(&self.conn, id)
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        query_transactions(
            &self.conn,
            &format!("SELECT {TXN_COLUMNS} FROM transactions t ORDER BY t.date, t.id"),
            [],
        )
    }

    fn slaves(&self, master_id: TransactionId) -> Result<Vec<SlaveTransaction>> {
        find_transaction(&self.conn, master_id)?;
        load_slaves(&self.conn, master_id)
    }

    fn all_slaves(&self) -> Result<Vec<SlaveTransaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SLAVE_COLUMNS} FROM transaction_slaves ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], slave_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn uncategorized_transactions(&self) -> Result<Vec<Transaction>> {
        let unknown_id = find_unknown_id(&self.conn)?;
        query_transactions(
            &self.conn,
            &format!(
                "SELECT {TXN_COLUMNS} FROM transactions t \
                 WHERE (SELECT count(*) FROM transaction_slaves s WHERE s.master_id = t.id) = 1 \
                 AND EXISTS (SELECT 1 FROM transaction_slaves s WHERE s.master_id = t.id AND s.account_id = ?1) \
                 ORDER BY t.date, t.id"
            ),
            [unknown_id],
        )
    }

    fn categorize(&self, master_id: TransactionId, slaves: &[SlaveDraft]) -> Result<Vec<SlaveTransaction>> {
        let unknown_id = find_unknown_id(&self.conn)?;
        let tx = self.conn.unchecked_transaction()?;
        find_transaction(&tx, master_id)?;
        if !is_uncategorized(&tx, master_id, unknown_id)? {
            return Err(PloutosError::Conflict(format!(
                "transaction {master_id} is already categorized"
            )));
        }
        tx.execute("DELETE FROM transaction_slaves WHERE master_id = ?1", [master_id])?;
        insert_slaves(&tx, master_id, slaves)?;
        tx.execute(
            "UPDATE transactions SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now(), master_id],
        )?;
        let saved = load_slaves(&tx, master_id)?;
        tx.commit()?;
        Ok(saved)
    }

    fn replace_slaves(&self, master_id: TransactionId, slaves: &[SlaveDraft]) -> Result<Vec<SlaveTransaction>> {
        let tx = self.conn.unchecked_transaction()?;
        find_transaction(&tx, master_id)?;
        tx.execute("DELETE FROM transaction_slaves WHERE master_id = ?1", [master_id])?;
        insert_slaves(&tx, master_id, slaves)?;
        tx.execute(
            "UPDATE transactions SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now(), master_id],
        )?;
        let saved = load_slaves(&tx, master_id)?;
        tx.commit()?;
        Ok(saved)
    }

    fn rules(&self) -> Result<Vec<CategorizationRule>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM categorization_rules ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], rule_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn rule(&self, id: RuleId) -> Result<CategorizationRule> {
        self.conn
            .query_row(
                &format!("SELECT {RULE_COLUMNS} FROM categorization_rules WHERE id = ?1"),
                [id],
                rule_from_row,
            )
            .optional()?
            .ok_or_else(|| PloutosError::NotFound(format!("rule {id}")))
    }

    fn create_rule(&self, draft: &RuleDraft) -> Result<CategorizationRule> {
        validate_rule(draft)?;
        self.check_rule_accounts(draft)?;
        let groups = serde_json::to_string(&draft.condition_groups)?;
        let (processor_type, processor_config) = draft.processor.to_parts()?;
        let account_ids = serde_json::to_string(&draft.account_ids)?;
        self.conn.execute(
            "INSERT INTO categorization_rules \
             (description, condition_groups, priority, enabled, processor_type, processor_config, account_ids, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                draft.description,
                groups,
                draft.priority,
                draft.enabled,
                processor_type,
                processor_config,
                account_ids,
                now(),
            ],
        )?;
        self.rule(self.conn.last_insert_rowid())
    }

    fn update_rule(&self, id: RuleId, draft: &RuleDraft) -> Result<CategorizationRule> {
        validate_rule(draft)?;
        self.check_rule_accounts(draft)?;
        let groups = serde_json::to_string(&draft.condition_groups)?;
        let (processor_type, processor_config) = draft.processor.to_parts()?;
        let account_ids = serde_json::to_string(&draft.account_ids)?;
        let changed = self.conn.execute(
            "UPDATE categorization_rules SET description = ?1, condition_groups = ?2, priority = ?3, \
             enabled = ?4, processor_type = ?5, processor_config = ?6, account_ids = ?7 WHERE id = ?8",
            rusqlite::params![
                draft.description,
                groups,
                draft.priority,
                draft.enabled,
                processor_type,
                processor_config,
                account_ids,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(PloutosError::NotFound(format!("rule {id}")));
        }
        self.rule(id)
    }

    fn set_rule_enabled(&self, id: RuleId, enabled: bool) -> Result<CategorizationRule> {
        let rule = self.rule(id)?;
        if enabled {
            validate_rule(&RuleDraft {
                description: rule.description.clone(),
                condition_groups: rule.condition_groups.clone(),
                priority: rule.priority,
                enabled,
                processor: rule.processor.clone(),
                account_ids: rule.account_ids.clone(),
            })?;
        }
        self.conn.execute(
            "UPDATE categorization_rules SET enabled = ?1 WHERE id = ?2",
            rusqlite::params![enabled, id],
        )?;
        self.rule(id)
    }

    fn delete_rule(&self, id: RuleId) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM categorization_rules WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(PloutosError::NotFound(format!("rule {id}")));
        }
        Ok(())
    }

    fn mark_rules_applied(&self, ids: &[RuleId], at: NaiveDateTime) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE categorization_rules SET last_applied_at = ?1 WHERE id = ?2",
                rusqlite::params![at, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn transfer_pool(&self) -> Result<Vec<Transaction>> {
        query_transactions(
            &self.conn,
            &format!(
                "SELECT {TXN_COLUMNS} FROM transactions t \
                 JOIN accounts a ON a.id = t.account_id \
                 WHERE a.is_real = 1 \
                 AND NOT EXISTS ( \
                     SELECT 1 FROM transaction_slaves s JOIN accounts sa ON sa.id = s.account_id \
                     WHERE s.master_id = t.id AND sa.is_real = 1) \
                 ORDER BY t.date, t.id"
            ),
            [],
        )
    }

    fn rejected_pairs(&self) -> Result<Vec<RejectedPair>> {
        let mut stmt = self.conn.prepare(
            "SELECT credit_transaction_id, debit_transaction_id, rejected_reason, rejected_at \
             FROM rejected_transfer_pairs ORDER BY rejected_at, id",
        )?;
        let rows = stmt
            .query_map([], rejected_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn reject_pair(&self, key: PairKey, reason: Option<&str>) -> Result<RejectedPair> {
        let tx = self.conn.unchecked_transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM rejected_transfer_pairs \
             WHERE credit_transaction_id = ?1 AND debit_transaction_id = ?2)",
            rusqlite::params![key.credit_transaction_id, key.debit_transaction_id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(PloutosError::Conflict(format!("pair {key} is already rejected")));
        }
        let rejected = RejectedPair {
            key,
            rejected_reason: reason.map(str::to_string),
            rejected_at: now(),
        };
        tx.execute(
            "INSERT INTO rejected_transfer_pairs \
             (credit_transaction_id, debit_transaction_id, rejected_reason, rejected_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                key.credit_transaction_id,
                key.debit_transaction_id,
                rejected.rejected_reason,
                rejected.rejected_at,
            ],
        )?;
        tx.commit()?;
        Ok(rejected)
    }

    fn unreject_pair(&self, key: PairKey) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM rejected_transfer_pairs WHERE credit_transaction_id = ?1 AND debit_transaction_id = ?2",
            rusqlite::params![key.credit_transaction_id, key.debit_transaction_id],
        )?;
        if changed == 0 {
            return Err(PloutosError::NotFound(format!("rejected pair {key}")));
        }
        Ok(())
    }

    fn transfer_links(&self) -> Result<Vec<TransferLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT credit_transaction_id, debit_transaction_id, merged_at FROM transfer_links ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], link_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn merge_transfer(&self, key: PairKey, slave: &SlaveDraft) -> Result<TransferLink> {
        let tx = self.conn.unchecked_transaction()?;
        let linked: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM transfer_links \
             WHERE credit_transaction_id IN (?1, ?2) OR debit_transaction_id IN (?1, ?2))",
            rusqlite::params![key.credit_transaction_id, key.debit_transaction_id],
            |row| row.get(0),
        )?;
        if linked {
            return Err(PloutosError::Conflict(format!(
                "pair {key} is already merged, or one side belongs to another transfer"
            )));
        }
        find_transaction(&tx, key.credit_transaction_id)?;
        find_transaction(&tx, key.debit_transaction_id)?;
        let real_legs: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM transaction_slaves s JOIN accounts a ON a.id = s.account_id \
             WHERE s.master_id IN (?1, ?2) AND a.is_real = 1)",
            rusqlite::params![key.credit_transaction_id, key.debit_transaction_id],
            |row| row.get(0),
        )?;
        if real_legs {
            return Err(PloutosError::Conflict(format!(
                "pair {key}: a transaction already moves money to a real account"
            )));
        }

        let stamp = now();
        tx.execute(
            "DELETE FROM transaction_slaves WHERE master_id = ?1",
            [key.credit_transaction_id],
        )?;
        insert_slaves(&tx, key.credit_transaction_id, std::slice::from_ref(slave))?;
        tx.execute(
            "UPDATE transactions SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![stamp, key.credit_transaction_id],
        )?;
        tx.execute("DELETE FROM transactions WHERE id = ?1", [key.debit_transaction_id])?;
        tx.execute(
            "INSERT INTO transfer_links (credit_transaction_id, debit_transaction_id, merged_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key.credit_transaction_id, key.debit_transaction_id, stamp],
        )?;
        tx.commit()?;
        Ok(TransferLink {
            key,
            merged_at: stamp,
        })
    }

    fn transfers(&self) -> Result<Vec<Transfer>> {
        let masters = query_transactions(
            &self.conn,
            &format!(
                "SELECT {TXN_COLUMNS} FROM transactions t \
                 WHERE EXISTS ( \
                     SELECT 1 FROM transaction_slaves s JOIN accounts sa ON sa.id = s.account_id \
                     WHERE s.master_id = t.id AND sa.is_real = 1) \
                 ORDER BY t.date DESC, t.id DESC"
            ),
            [],
        )?;
        masters
            .into_iter()
            .map(|master| {
                let slaves = load_slaves(&self.conn, master.id)?;
                Ok(Transfer { master, slaves })
            })
            .collect()
    }
}
