pub mod loan;
pub mod simple_split;

use crate::error::Result;
use crate::ledger::ensure_balanced;
use crate::models::{CategorizationRule, ProcessorConfig, SlaveDraft, Transaction};

/// Validate a processor config before a rule carrying it is stored or enabled.
pub fn validate_config(processor: &ProcessorConfig) -> Result<()> {
    match processor {
        ProcessorConfig::SimpleSplit(config) => simple_split::validate(config),
        ProcessorConfig::Loan(config) => loan::validate(config),
    }
}

/// Run the rule's processor on `transaction` and return slaves that are
/// known to balance it.
pub fn apply(rule: &CategorizationRule, transaction: &Transaction) -> Result<Vec<SlaveDraft>> {
    // enum dispatch instead of trait objects
    let slaves = match &rule.processor {
        ProcessorConfig::SimpleSplit(config) => simple_split::process(transaction, config)?,
        ProcessorConfig::Loan(config) => loan::process(transaction, config)?,
    };
    ensure_balanced(transaction, &slaves)?;
    Ok(slaves)
}
