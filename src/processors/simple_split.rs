use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{PloutosError, Result};
use crate::models::{SimpleSplitConfig, SlaveDraft, Transaction};

const PERCENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub fn validate(config: &SimpleSplitConfig) -> Result<()> {
    if config.splits.is_empty() {
        return Err(PloutosError::Configuration(
            "simple_split needs at least one split".into(),
        ));
    }
    for split in &config.splits {
        if split.percentage <= Decimal::ZERO || split.percentage > Decimal::ONE_HUNDRED {
            return Err(PloutosError::Configuration(format!(
                "split percentage for account {} must be in (0, 100], got {}",
                split.account_id, split.percentage
            )));
        }
    }
    let total: Decimal = config.splits.iter().map(|s| s.percentage).sum();
    if (total - Decimal::ONE_HUNDRED).abs() > PERCENT_TOLERANCE {
        return Err(PloutosError::Configuration(format!(
            "split percentages must sum to 100, got {total}"
        )));
    }
    Ok(())
}

/// Amounts for each split, in order. Every split but the last is rounded to
/// the cent (half to even); the last takes whatever is left so the parts add
/// up to `amount` exactly.
pub fn split_amounts(amount: Decimal, config: &SimpleSplitConfig) -> Result<Vec<Decimal>> {
    validate(config)?;
    let (_, head) = config
        .splits
        .split_last()
        .ok_or_else(|| PloutosError::Configuration("simple_split has no splits".into()))?;

    let mut amounts: Vec<Decimal> = head
        .iter()
        .map(|split| {
            (amount * split.percentage / Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        })
        .collect();
    let allocated: Decimal = amounts.iter().sum();
    amounts.push(amount - allocated);
    Ok(amounts)
}

pub fn process(transaction: &Transaction, config: &SimpleSplitConfig) -> Result<Vec<SlaveDraft>> {
    let amounts = split_amounts(transaction.amount, config)?;
    Ok(config
        .splits
        .iter()
        .zip(amounts)
        .map(|(split, amount)| SlaveDraft::mirror(transaction, split.account_id, amount))
        .collect())
}
