use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PloutosError, Result};

pub type AccountId = i64;
pub type TransactionId = i64;
pub type SlaveId = i64;
pub type RuleId = i64;

/// Name shared by the name, category and sub-category of the placeholder account
/// that every freshly imported transaction is booked against.
pub const UNKNOWN: &str = "Unknown";

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }

    /// Credit is positive, debit is negative.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Credit => amount,
            Self::Debit => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = PloutosError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            other => Err(PloutosError::Validation(format!(
                "unknown transaction type '{other}' (expected debit or credit)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// Always non-negative; direction lives in `kind`.
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: String,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Transaction {
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub account_id: AccountId,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveTransaction {
    pub id: SlaveId,
    pub master_id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: NaiveDate,
}

/// A slave leg before it is persisted. `account_id` is optional because a
/// user-edited split row may not have an account chosen yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveDraft {
    pub master_id: TransactionId,
    pub account_id: Option<AccountId>,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: NaiveDate,
}

impl SlaveDraft {
    /// A leg booked on `account_id` with the mirrored type of `master`.
    pub fn mirror(master: &Transaction, account_id: AccountId, amount: Decimal) -> Self {
        Self {
            master_id: master.id,
            account_id: Some(account_id),
            amount,
            kind: master.kind.opposite(),
            date: master.date,
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub category: String,
    pub sub_category: String,
    pub is_real: bool,
    pub original_amount: Decimal,
}

impl Account {
    pub fn is_unknown(&self) -> bool {
        !self.is_real
            && self.name == UNKNOWN
            && self.category == UNKNOWN
            && self.sub_category == UNKNOWN
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDraft {
    pub name: String,
    pub category: String,
    pub sub_category: String,
    pub is_real: bool,
    #[serde(default)]
    pub original_amount: Decimal,
}

// ---------------------------------------------------------------------------
// Categorization rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Contains,
    StartsWith,
    Exact,
    Regex,
    AmountGt,
    AmountLt,
    AmountGte,
    AmountLte,
    AmountEq,
}

impl MatchType {
    pub const ALL: [MatchType; 9] = [
        Self::Contains,
        Self::StartsWith,
        Self::Exact,
        Self::Regex,
        Self::AmountGt,
        Self::AmountLt,
        Self::AmountGte,
        Self::AmountLte,
        Self::AmountEq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Exact => "exact",
            Self::Regex => "regex",
            Self::AmountGt => "amount_gt",
            Self::AmountLt => "amount_lt",
            Self::AmountGte => "amount_gte",
            Self::AmountLte => "amount_lte",
            Self::AmountEq => "amount_eq",
        }
    }

    pub fn is_amount(&self) -> bool {
        matches!(
            self,
            Self::AmountGt | Self::AmountLt | Self::AmountGte | Self::AmountLte | Self::AmountEq
        )
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = PloutosError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| PloutosError::Validation(format!("unknown match type '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub match_type: MatchType,
    pub match_value: String,
}

impl Condition {
    pub fn new(match_type: MatchType, match_value: impl Into<String>) -> Self {
        Self {
            match_type,
            match_value: match_value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub operator: LogicalOperator,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
    #[default]
    All,
    Debit,
    Credit,
}

impl TransactionFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    pub fn admits(&self, kind: TransactionType) -> bool {
        match self {
            Self::All => true,
            Self::Debit => kind == TransactionType::Debit,
            Self::Credit => kind == TransactionType::Credit,
        }
    }
}

impl FromStr for TransactionFilter {
    type Err = PloutosError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            other => Err(PloutosError::Validation(format!(
                "unknown transaction filter '{other}' (expected all, debit or credit)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitItem {
    pub account_id: AccountId,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleSplitConfig {
    pub splits: Vec<SplitItem>,
    #[serde(default)]
    pub transaction_filter: TransactionFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanConfig {
    pub loan_amount: Decimal,
    /// Yearly rate in percent: `1.5` means 1.5 %.
    pub annual_rate: Decimal,
    pub duration_months: u32,
    /// Date of the first repayment; only its year and month matter.
    pub start_date: NaiveDate,
    pub capital_account_id: AccountId,
    pub interest_account_id: AccountId,
    #[serde(default)]
    pub transaction_filter: TransactionFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "processor_type",
    content = "processor_config",
    rename_all = "snake_case"
)]
pub enum ProcessorConfig {
    SimpleSplit(SimpleSplitConfig),
    Loan(LoanConfig),
}

impl ProcessorConfig {
    pub fn processor_type(&self) -> &'static str {
        match self {
            Self::SimpleSplit(_) => "simple_split",
            Self::Loan(_) => "loan",
        }
    }

    pub fn transaction_filter(&self) -> TransactionFilter {
        match self {
            Self::SimpleSplit(config) => config.transaction_filter,
            Self::Loan(config) => config.transaction_filter,
        }
    }

    /// Splits the enum into the `(processor_type, processor_config)` pair it
    /// is stored as.
    pub fn to_parts(&self) -> Result<(&'static str, String)> {
        let config = match self {
            Self::SimpleSplit(config) => serde_json::to_string(config)?,
            Self::Loan(config) => serde_json::to_string(config)?,
        };
        Ok((self.processor_type(), config))
    }

    pub fn from_parts(processor_type: &str, config: &str) -> Result<Self> {
        match processor_type {
            "simple_split" => Ok(Self::SimpleSplit(serde_json::from_str(config)?)),
            "loan" => Ok(Self::Loan(serde_json::from_str(config)?)),
            other => Err(PloutosError::Configuration(format!(
                "unknown processor type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub id: RuleId,
    pub description: String,
    pub condition_groups: Vec<ConditionGroup>,
    /// Higher is more important.
    pub priority: i64,
    pub enabled: bool,
    pub processor: ProcessorConfig,
    /// Source accounts the rule applies to. Empty means every account.
    pub account_ids: Vec<AccountId>,
    pub last_applied_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// Input for creating or replacing a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub description: String,
    pub condition_groups: Vec<ConditionGroup>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub account_ids: Vec<AccountId>,
}

fn default_enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub credit_transaction_id: TransactionId,
    pub debit_transaction_id: TransactionId,
}

impl PairKey {
    pub fn new(credit_transaction_id: TransactionId, debit_transaction_id: TransactionId) -> Self {
        Self {
            credit_transaction_id,
            debit_transaction_id,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "credit {} / debit {}",
            self.credit_transaction_id, self.debit_transaction_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCandidate {
    pub credit_transaction: Transaction,
    pub debit_transaction: Transaction,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub confidence: f64,
}

impl TransferCandidate {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.credit_transaction.id, self.debit_transaction.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedPair {
    #[serde(flatten)]
    pub key: PairKey,
    pub rejected_reason: Option<String>,
    pub rejected_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLink {
    #[serde(flatten)]
    pub key: PairKey,
    pub merged_at: NaiveDateTime,
}

/// A confirmed transfer: a master with at least one slave on a real account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub master: Transaction,
    pub slaves: Vec<SlaveTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_inverts_type() {
        let master = Transaction {
            id: 7,
            account_id: 1,
            amount: Decimal::new(4200, 2),
            kind: TransactionType::Debit,
            description: "CARREFOUR MARKET".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            created_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            updated_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };
        let slave = SlaveDraft::mirror(&master, 3, master.amount);
        assert_eq!(slave.kind, TransactionType::Credit);
        assert_eq!(slave.master_id, 7);
        assert_eq!(slave.account_id, Some(3));
        assert_eq!(master.signed_amount(), Decimal::new(-4200, 2));
    }

    #[test]
    fn test_processor_config_json_shape() {
        let config = ProcessorConfig::SimpleSplit(SimpleSplitConfig {
            splits: vec![SplitItem {
                account_id: 4,
                percentage: Decimal::ONE_HUNDRED,
            }],
            transaction_filter: TransactionFilter::Debit,
        });
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["processor_type"], "simple_split");
        assert_eq!(json["processor_config"]["transaction_filter"], "debit");

        let (kind, raw) = config.to_parts().unwrap();
        assert_eq!(ProcessorConfig::from_parts(kind, &raw).unwrap(), config);
    }

    #[test]
    fn test_unknown_processor_type_is_configuration_error() {
        let err = ProcessorConfig::from_parts("salary", "{}").unwrap_err();
        assert!(matches!(err, PloutosError::Configuration(_)));
    }

    #[test]
    fn test_match_type_parsing() {
        assert_eq!("STARTS_WITH".parse::<MatchType>().unwrap(), MatchType::StartsWith);
        assert_eq!("amount_eq".parse::<MatchType>().unwrap(), MatchType::AmountEq);
        assert!("fuzzy".parse::<MatchType>().is_err());
        assert!(MatchType::AmountLte.is_amount());
        assert!(!MatchType::Regex.is_amount());
    }

    #[test]
    fn test_rule_draft_defaults() {
        let json = r#"{
            "description": "Groceries",
            "condition_groups": [{"conditions": [{"match_type": "contains", "match_value": "carrefour"}]}],
            "processor": {"processor_type": "simple_split",
                          "processor_config": {"splits": [{"account_id": 2, "percentage": "100"}]}}
        }"#;
        let draft: RuleDraft = serde_json::from_str(json).unwrap();
        assert!(draft.enabled);
        assert_eq!(draft.priority, 0);
        assert_eq!(draft.condition_groups[0].operator, LogicalOperator::And);
        assert_eq!(draft.processor.transaction_filter(), TransactionFilter::All);
        assert!(draft.account_ids.is_empty());
    }

    #[test]
    fn test_filter_admits() {
        assert!(TransactionFilter::All.admits(TransactionType::Credit));
        assert!(TransactionFilter::Debit.admits(TransactionType::Debit));
        assert!(!TransactionFilter::Debit.admits(TransactionType::Credit));
    }
}
