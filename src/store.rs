//! The persistence boundary of the engine.

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::models::{
    Account, AccountDraft, AccountId, CategorizationRule, PairKey, RejectedPair, RuleDraft,
    RuleId, SlaveDraft, SlaveTransaction, Transaction, TransactionDraft, TransactionId, Transfer,
    TransferLink,
};

/// Everything the categorization and transfer services need from storage.
///
/// Methods that take a `TransactionId`, `AccountId` or `RuleId` return
/// [`PloutosError::NotFound`](crate::error::PloutosError::NotFound) when
/// the row does not exist.
pub trait Store {
    // --- accounts ---

    fn accounts(&self) -> Result<Vec<Account>>;
    fn account(&self, id: AccountId) -> Result<Account>;
    fn create_account(&self, draft: &AccountDraft) -> Result<Account>;

    /// The placeholder account new transactions are booked against.
    fn unknown_account(&self) -> Result<Account>;

    // --- transactions ---

    /// Create a transaction together with its single Unknown slave.
    fn create_transaction(&self, draft: &TransactionDraft) -> Result<Transaction>;
    fn transaction(&self, id: TransactionId) -> Result<Transaction>;
    fn transactions(&self) -> Result<Vec<Transaction>>;
    fn slaves(&self, master_id: TransactionId) -> Result<Vec<SlaveTransaction>>;
    fn all_slaves(&self) -> Result<Vec<SlaveTransaction>>;

    /// Transactions whose only slave sits on the Unknown account.
    fn uncategorized_transactions(&self) -> Result<Vec<Transaction>>;

    /// Replace the Unknown slave of `master_id` with `slaves`, atomically.
    /// Fails with `Conflict` if the transaction is no longer uncategorized.
    fn categorize(&self, master_id: TransactionId, slaves: &[SlaveDraft])
        -> Result<Vec<SlaveTransaction>>;

    /// Replace every slave of `master_id` with `slaves`, atomically.
    fn replace_slaves(&self, master_id: TransactionId, slaves: &[SlaveDraft])
        -> Result<Vec<SlaveTransaction>>;

    // --- rules ---

    fn rules(&self) -> Result<Vec<CategorizationRule>>;
    fn rule(&self, id: RuleId) -> Result<CategorizationRule>;
    fn create_rule(&self, draft: &RuleDraft) -> Result<CategorizationRule>;
    fn update_rule(&self, id: RuleId, draft: &RuleDraft) -> Result<CategorizationRule>;
    fn set_rule_enabled(&self, id: RuleId, enabled: bool) -> Result<CategorizationRule>;
    fn delete_rule(&self, id: RuleId) -> Result<()>;
    fn mark_rules_applied(&self, ids: &[RuleId], at: NaiveDateTime) -> Result<()>;

    // --- transfers ---

    /// Real-account transactions that are not already part of a transfer.
    fn transfer_pool(&self) -> Result<Vec<Transaction>>;
    fn rejected_pairs(&self) -> Result<Vec<RejectedPair>>;

    /// Fails with `Conflict` if the pair was already rejected.
    fn reject_pair(&self, key: PairKey, reason: Option<&str>) -> Result<RejectedPair>;

    /// Fails with `NotFound` if the pair was never rejected.
    fn unreject_pair(&self, key: PairKey) -> Result<()>;

    fn transfer_links(&self) -> Result<Vec<TransferLink>>;

    /// Make the credit side the master of a transfer: its slaves become
    /// `slave`, the debit transaction is removed and the link recorded.
    /// Fails with `Conflict` if the pair is already linked.
    fn merge_transfer(&self, key: PairKey, slave: &SlaveDraft) -> Result<TransferLink>;

    /// Masters with at least one slave on a real account.
    fn transfers(&self) -> Result<Vec<Transfer>>;
}
