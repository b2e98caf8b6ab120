use std::collections::{BTreeSet, HashSet};

use rust_decimal::Decimal;

use crate::error::{PloutosError, Result};
use crate::ledger::ensure_balanced;
use crate::models::{
    PairKey, RejectedPair, SlaveDraft, Transaction, TransactionId, TransactionType,
    TransferCandidate, TransferLink,
};
use crate::settings::Settings;
use crate::store::Store;

/// Amounts within half a cent are considered equal.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Scores how likely a debit/credit pair is one transfer seen from both ends.
pub trait ConfidencePolicy {
    /// Largest date gap, in days, a pair may have.
    fn window_days(&self) -> i64;

    /// Score in `[0, 1]` for a pair already known to fall in the window.
    fn confidence(&self, credit: &Transaction, debit: &Transaction) -> f64;
}

/// Weighted blend of date proximity and description overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedConfidence {
    pub window_days: i64,
    pub date_weight: f64,
    pub description_weight: f64,
}

impl Default for WeightedConfidence {
    fn default() -> Self {
        Self {
            window_days: 3,
            date_weight: 0.7,
            description_weight: 0.3,
        }
    }
}

impl WeightedConfidence {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            window_days: settings.transfer_window_days,
            date_weight: settings.date_weight,
            description_weight: settings.description_weight,
        }
    }
}

fn tokens(description: &str) -> BTreeSet<String> {
    description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard index of the two descriptions' word sets.
pub fn description_similarity(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

impl ConfidencePolicy for WeightedConfidence {
    fn window_days(&self) -> i64 {
        self.window_days
    }

    fn confidence(&self, credit: &Transaction, debit: &Transaction) -> f64 {
        let days = (credit.date - debit.date).num_days().abs() as f64;
        let proximity = 1.0 - days / (self.window_days as f64 + 1.0);
        let similarity = description_similarity(&credit.description, &debit.description);
        (self.date_weight * proximity + self.description_weight * similarity).clamp(0.0, 1.0)
    }
}

fn is_pair(credit: &Transaction, debit: &Transaction, window_days: i64) -> bool {
    credit.kind == TransactionType::Credit
        && debit.kind == TransactionType::Debit
        && credit.account_id != debit.account_id
        && (credit.amount - debit.amount).abs() <= AMOUNT_TOLERANCE
        && (credit.date - debit.date).num_days().abs() <= window_days
}

/// Every plausible debit/credit pairing in `transactions` that has not been
/// rejected, best first.
pub fn find_candidates(
    transactions: &[Transaction],
    rejected: &[RejectedPair],
    policy: &dyn ConfidencePolicy,
) -> Vec<TransferCandidate> {
    let rejected: HashSet<PairKey> = rejected.iter().map(|r| r.key).collect();
    let (credits, debits): (Vec<&Transaction>, Vec<&Transaction>) = transactions
        .iter()
        .partition(|t| t.kind == TransactionType::Credit);

    let mut candidates = Vec::new();
    for credit in &credits {
        for debit in &debits {
            if !is_pair(credit, debit, policy.window_days()) {
                continue;
            }
            if rejected.contains(&PairKey::new(credit.id, debit.id)) {
                continue;
            }
            candidates.push(TransferCandidate {
                credit_transaction: (*credit).clone(),
                debit_transaction: (*debit).clone(),
                amount: credit.amount,
                date: credit.date.min(debit.date),
                confidence: policy.confidence(credit, debit),
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.date.cmp(&b.date))
            .then(a.key().cmp(&b.key()))
    });
    candidates
}

pub fn candidates<S: Store + ?Sized>(
    store: &S,
    policy: &dyn ConfidencePolicy,
) -> Result<Vec<TransferCandidate>> {
    let pool = store.transfer_pool()?;
    let rejected = store.rejected_pairs()?;
    Ok(find_candidates(&pool, &rejected, policy))
}

/// Confirm a pair as one transfer. The credit side survives as master with a
/// single slave on the debit side's account; the debit transaction is removed.
pub fn merge<S: Store + ?Sized>(
    store: &S,
    credit_id: TransactionId,
    debit_id: TransactionId,
    policy: &dyn ConfidencePolicy,
) -> Result<TransferLink> {
    let key = PairKey::new(credit_id, debit_id);
    let links = store.transfer_links()?;
    let overlapping = links.iter().find(|link| {
        [link.key.credit_transaction_id, link.key.debit_transaction_id]
            .iter()
            .any(|id| *id == credit_id || *id == debit_id)
    });
    if let Some(link) = overlapping {
        return Err(PloutosError::Conflict(if link.key == key {
            format!("pair {key} is already merged")
        } else {
            format!("pair {key} overlaps the merged transfer {}", link.key)
        }));
    }

    let credit = store.transaction(credit_id)?;
    let debit = store.transaction(debit_id)?;
    check_direction(&credit, TransactionType::Credit)?;
    check_direction(&debit, TransactionType::Debit)?;
    if credit.account_id == debit.account_id {
        return Err(PloutosError::Validation(
            "both transactions are on the same account".into(),
        ));
    }
    for account_id in [credit.account_id, debit.account_id] {
        if !store.account(account_id)?.is_real {
            return Err(PloutosError::Validation(format!(
                "account {account_id} is not a real account"
            )));
        }
    }
    if (credit.amount - debit.amount).abs() > AMOUNT_TOLERANCE {
        return Err(PloutosError::Validation(format!(
            "amounts differ: {} vs {}",
            credit.amount, debit.amount
        )));
    }
    let gap = (credit.date - debit.date).num_days().abs();
    if gap > policy.window_days() {
        return Err(PloutosError::Validation(format!(
            "dates are {gap} days apart, more than the {}-day window",
            policy.window_days()
        )));
    }

    let slave = SlaveDraft::mirror(&credit, debit.account_id, credit.amount);
    ensure_balanced(&credit, std::slice::from_ref(&slave))?;
    let link = store.merge_transfer(key, &slave)?;
    tracing::info!(credit_id, debit_id, amount = %credit.amount, "merged transfer");
    Ok(link)
}

fn check_direction(transaction: &Transaction, expected: TransactionType) -> Result<()> {
    if transaction.kind != expected {
        return Err(PloutosError::Validation(format!(
            "transaction {} is a {}, expected a {expected}",
            transaction.id, transaction.kind
        )));
    }
    Ok(())
}

/// Record that a pair is not a transfer. Both transactions must still exist,
/// and the ids must be given credit first.
pub fn reject<S: Store + ?Sized>(
    store: &S,
    credit_id: TransactionId,
    debit_id: TransactionId,
    reason: Option<&str>,
) -> Result<RejectedPair> {
    check_direction(&store.transaction(credit_id)?, TransactionType::Credit)?;
    check_direction(&store.transaction(debit_id)?, TransactionType::Debit)?;
    let rejected = store.reject_pair(PairKey::new(credit_id, debit_id), reason)?;
    tracing::info!(credit_id, debit_id, reason = reason.unwrap_or("none"), "rejected transfer pair");
    Ok(rejected)
}

pub fn unreject<S: Store + ?Sized>(
    store: &S,
    credit_id: TransactionId,
    debit_id: TransactionId,
) -> Result<()> {
    store.unreject_pair(PairKey::new(credit_id, debit_id))?;
    tracing::info!(credit_id, debit_id, "unrejected transfer pair");
    Ok(())
}
