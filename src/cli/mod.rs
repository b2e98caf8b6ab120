pub mod accounts;
pub mod init;
pub mod matching;
pub mod rules;
pub mod status;
pub mod transactions;
pub mod transfers;

use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::db::SqliteStore;
use crate::error::{PloutosError, Result};
use crate::models::TransactionType;
use crate::settings::load_settings;

pub(crate) fn open_store() -> Result<SqliteStore> {
    SqliteStore::open(&load_settings().db_path())
}

/// Split `LEFT:RIGHT` at the first colon.
pub(crate) fn split_pair<'a>(raw: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    raw.split_once(':')
        .map(|(l, r)| (l.trim(), r.trim()))
        .ok_or_else(|| PloutosError::Validation(format!("expected {what}, got '{raw}'")))
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|_| PloutosError::Validation(format!("'{raw}' is not a number")))
}

pub(crate) fn parse_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| PloutosError::Validation(format!("'{raw}' is not an id")))
}

#[derive(Parser)]
#[command(
    name = "ploutos",
    version,
    about = "Rule-based categorization and transfer matching for a personal ledger."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for Ploutos data (default: ~/Documents/ploutos)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Record, list and split transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Apply enabled rules to every uncategorized transaction.
    Process {
        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show enabled rules and the uncategorized backlog.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Detect and resolve transfers between real accounts.
    Transfers {
        #[command(subcommand)]
        command: TransfersCommands,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Compte courant'
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long = "sub-category")]
        sub_category: String,
        /// Bank account (as opposed to a budget account)
        #[arg(long)]
        real: bool,
        /// Opening balance
        #[arg(long, default_value = "0")]
        opening: Decimal,
    },
    /// List all accounts with their current balance.
    List,
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// Record a transaction; it starts out on the Unknown account.
    Add {
        /// Account ID the transaction belongs to
        #[arg(long)]
        account: i64,
        /// Non-negative amount
        #[arg(long)]
        amount: Decimal,
        /// debit or credit
        #[arg(long = "type", value_parser = TransactionType::from_str)]
        kind: TransactionType,
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        description: String,
    },
    /// List transactions.
    List {
        /// Only transactions still on the Unknown account
        #[arg(long)]
        uncategorized: bool,
    },
    /// Replace a transaction's slaves by hand.
    Split {
        /// Transaction ID
        id: i64,
        /// ACCOUNT_ID:AMOUNT, repeatable
        #[arg(long = "to", required = true)]
        legs: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a percentage-split rule.
    Add {
        description: String,
        /// MATCH_TYPE:VALUE, repeatable (e.g. contains:CARREFOUR, amount_gt:100)
        #[arg(long = "when", required = true)]
        conditions: Vec<String>,
        /// Match when any condition holds instead of all of them
        #[arg(long)]
        any: bool,
        /// ACCOUNT_ID:PERCENT, repeatable
        #[arg(long = "split", required = true)]
        splits: Vec<String>,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
        /// all, debit or credit
        #[arg(long, default_value = "all")]
        filter: String,
        /// Only apply to transactions from this account, repeatable
        #[arg(long = "account")]
        accounts: Vec<i64>,
    },
    /// Import rules from a JSON file (an array of rule objects).
    Import {
        file: String,
    },
    /// List all categorization rules.
    List,
    /// Enable or disable a rule.
    Toggle {
        id: i64,
        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },
    /// Delete a rule by ID.
    Delete {
        id: i64,
    },
    /// Dry-run a rule over uncategorized transactions.
    Preview {
        id: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TransfersCommands {
    /// List likely transfers between real accounts.
    Candidates {
        #[arg(long)]
        json: bool,
    },
    /// Confirm a pair as a single transfer.
    Merge {
        /// Credit transaction ID
        credit: i64,
        /// Debit transaction ID
        debit: i64,
    },
    /// Mark a pair as not a transfer.
    Reject {
        credit: i64,
        debit: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Undo a rejection.
    Unreject {
        credit: i64,
        debit: i64,
    },
    /// List rejected pairs.
    Rejected,
    /// List confirmed transfers.
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("contains:VIR: SEPA", "x").unwrap(), ("contains", "VIR: SEPA"));
        assert!(split_pair("nocolon", "ACCOUNT:AMOUNT").is_err());
    }

    #[test]
    fn test_parse_rules_add() {
        let cli = Cli::try_parse_from([
            "ploutos", "rules", "add", "Groceries", "--when", "contains:carrefour", "--split", "3:70",
            "--split", "4:30", "--priority", "5", "--account", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Rules {
                command: RulesCommands::Add { splits, priority, any, accounts, .. },
            } => {
                assert_eq!(splits, vec!["3:70", "4:30"]);
                assert_eq!(priority, 5);
                assert!(!any);
                assert_eq!(accounts, vec![2]);
            }
            _ => panic!("parsed the wrong command"),
        }
    }
}
