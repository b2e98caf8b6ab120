use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::categorizer::{self, group_matches_by_rule, rank_rules, select_ranked};
use crate::error::Result;
use crate::ledger::validate_slave_edits;
use crate::models::{
    CategorizationRule, MatchType, RuleId, SlaveDraft, SlaveTransaction, TransactionId,
};
use crate::processors;
use crate::store::Store;

// ---------------------------------------------------------------------------
// Batch run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizationDetail {
    pub transaction_id: TransactionId,
    pub description: String,
    pub matched_rule: String,
    pub match_type: Option<MatchType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizationFailure {
    pub transaction_id: TransactionId,
    pub description: String,
    pub matched_rule: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Transactions a rule matched, whether or not they were saved.
    pub processed: usize,
    pub categorized: usize,
    pub failed: usize,
    pub unmatched: usize,
    pub aborted: bool,
    pub details: Vec<CategorizationDetail>,
    pub failures: Vec<CategorizationFailure>,
}

/// Run every enabled rule over the uncategorized transactions. Each
/// transaction succeeds or fails on its own; `cancel` is polled between
/// transactions and keeps whatever was already saved.
pub fn process_uncategorized<S: Store + ?Sized>(store: &S, cancel: &AtomicBool) -> Result<BatchReport> {
    let rules = store.rules()?;
    let ranked = rank_rules(&rules);
    let pending = store.uncategorized_transactions()?;
    tracing::info!(
        rules = ranked.len(),
        transactions = pending.len(),
        "starting categorization run"
    );

    let mut report = BatchReport::default();
    let mut applied: BTreeSet<RuleId> = BTreeSet::new();

    for transaction in &pending {
        if cancel.load(Ordering::Relaxed) {
            tracing::warn!("categorization run cancelled");
            report.aborted = true;
            break;
        }
        let Some(compiled) = select_ranked(&ranked, transaction) else {
            report.unmatched += 1;
            continue;
        };
        let rule = compiled.rule;
        report.processed += 1;

        let outcome = processors::apply(rule, transaction)
            .and_then(|slaves| store.categorize(transaction.id, &slaves));
        match outcome {
            Ok(_) => {
                tracing::debug!(
                    transaction_id = transaction.id,
                    rule = %rule.description,
                    "categorized"
                );
                report.categorized += 1;
                applied.insert(rule.id);
                report.details.push(CategorizationDetail {
                    transaction_id: transaction.id,
                    description: transaction.description.clone(),
                    matched_rule: rule.description.clone(),
                    match_type: compiled.matched_by(transaction),
                });
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = transaction.id,
                    rule = %rule.description,
                    "categorization failed: {e}"
                );
                report.failed += 1;
                report.failures.push(CategorizationFailure {
                    transaction_id: transaction.id,
                    description: transaction.description.clone(),
                    matched_rule: rule.description.clone(),
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }
    }

    if !applied.is_empty() {
        let ids: Vec<RuleId> = applied.into_iter().collect();
        store.mark_rules_applied(&ids, Utc::now().naive_utc())?;
    }

    tracing::info!(
        processed = report.processed,
        categorized = report.categorized,
        failed = report.failed,
        unmatched = report.unmatched,
        "categorization run complete"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingStats {
    pub total_enabled_rules: usize,
    pub total_uncategorized_transactions: usize,
    /// Enabled rules in evaluation order.
    pub rules: Vec<CategorizationRule>,
    /// How many uncategorized transactions each rule would claim on the next
    /// run. Rules that would claim none are left out.
    pub pending_matches: BTreeMap<RuleId, usize>,
}

pub fn stats<S: Store + ?Sized>(store: &S) -> Result<MatchingStats> {
    let all = store.rules()?;
    let rules: Vec<CategorizationRule> = rank_rules(&all)
        .into_iter()
        .map(|compiled| compiled.rule.clone())
        .collect();
    let pending = store.uncategorized_transactions()?;
    let pending_matches = group_matches_by_rule(&all, &pending)
        .into_iter()
        .map(|(rule_id, claimed)| (rule_id, claimed.len()))
        .collect();
    Ok(MatchingStats {
        total_enabled_rules: rules.len(),
        total_uncategorized_transactions: pending.len(),
        rules,
        pending_matches,
    })
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewMatch {
    pub transaction_id: TransactionId,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResult {
    pub rule_id: RuleId,
    pub rule_description: String,
    pub total_matches: usize,
    pub matches: Vec<PreviewMatch>,
}

/// Dry run of one rule over the uncategorized transactions. Nothing is saved.
pub fn preview<S: Store + ?Sized>(store: &S, rule_id: RuleId) -> Result<PreviewResult> {
    let rule = store.rule(rule_id)?;
    let pending = store.uncategorized_transactions()?;
    let matches: Vec<PreviewMatch> = categorizer::preview(&rule, &pending)?
        .into_iter()
        .map(|t| PreviewMatch {
            transaction_id: t.id,
            description: t.description.clone(),
            amount: t.amount,
            date: t.date,
        })
        .collect();
    tracing::info!(rule = %rule.description, matches = matches.len(), "previewed rule");
    Ok(PreviewResult {
        rule_id: rule.id,
        rule_description: rule.description,
        total_matches: matches.len(),
        matches,
    })
}

// ---------------------------------------------------------------------------
// Manual edits
// ---------------------------------------------------------------------------

/// Replace a transaction's slaves with a hand-edited set.
pub fn save_slaves<S: Store + ?Sized>(
    store: &S,
    master_id: TransactionId,
    drafts: &[SlaveDraft],
) -> Result<Vec<SlaveTransaction>> {
    let master = store.transaction(master_id)?;
    validate_slave_edits(&master, drafts)?;
    store.replace_slaves(master_id, drafts)
}
