use std::collections::BTreeMap;

use crate::conditions::{validate, Matcher};
use crate::error::{PloutosError, Result};
use crate::models::{
    CategorizationRule, ConditionGroup, LogicalOperator, MatchType, RuleDraft, RuleId,
    Transaction,
};
use crate::processors::validate_config;

struct CompiledGroup {
    operator: LogicalOperator,
    matchers: Vec<Matcher>,
}

impl CompiledGroup {
    fn matches(&self, transaction: &Transaction) -> bool {
        if self.matchers.is_empty() {
            return false;
        }
        match self.operator {
            LogicalOperator::And => self.matchers.iter().all(|m| m.matches(transaction)),
            LogicalOperator::Or => self.matchers.iter().any(|m| m.matches(transaction)),
        }
    }
}

/// A rule whose conditions all compiled. A rule with one bad condition never
/// gets this far, so it cannot match through its other conditions.
pub struct CompiledRule<'a> {
    pub rule: &'a CategorizationRule,
    groups: Vec<CompiledGroup>,
}

impl<'a> CompiledRule<'a> {
    pub fn compile(rule: &'a CategorizationRule) -> Result<Self> {
        let groups = rule
            .condition_groups
            .iter()
            .map(|group| -> Result<CompiledGroup> {
                Ok(CompiledGroup {
                    operator: group.operator,
                    matchers: group
                        .conditions
                        .iter()
                        .map(Matcher::compile)
                        .collect::<Result<Vec<_>>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rule, groups })
    }

    /// Whether the rule's filters and condition groups accept the
    /// transaction. `enabled` is not consulted.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if !self.rule.processor.transaction_filter().admits(transaction.kind) {
            return false;
        }
        if !self.rule.account_ids.is_empty()
            && !self.rule.account_ids.contains(&transaction.account_id)
        {
            return false;
        }
        self.groups.iter().any(|group| group.matches(transaction))
    }

    /// Match type of the first condition that holds in the first matching group.
    pub fn matched_by(&self, transaction: &Transaction) -> Option<MatchType> {
        self.groups
            .iter()
            .filter(|group| group.matches(transaction))
            .flat_map(|group| group.matchers.iter())
            .find(|m| m.matches(transaction))
            .map(Matcher::match_type)
    }
}

fn compile_or_skip(rule: &CategorizationRule) -> Option<CompiledRule<'_>> {
    match CompiledRule::compile(rule) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            tracing::warn!(rule_id = rule.id, rule = %rule.description, "rule skipped: {e}");
            None
        }
    }
}

/// Enabled rules in evaluation order: priority descending, then oldest first,
/// then lowest id. Rules that fail to compile are logged and left out.
pub fn rank_rules(rules: &[CategorizationRule]) -> Vec<CompiledRule<'_>> {
    let mut ranked: Vec<CompiledRule> = rules
        .iter()
        .filter(|r| r.enabled)
        .filter_map(compile_or_skip)
        .collect();
    ranked.sort_by(|a, b| {
        b.rule
            .priority
            .cmp(&a.rule.priority)
            .then(a.rule.created_at.cmp(&b.rule.created_at))
            .then(a.rule.id.cmp(&b.rule.id))
    });
    ranked
}

pub fn select_ranked<'r, 'a>(
    ranked: &'r [CompiledRule<'a>],
    transaction: &Transaction,
) -> Option<&'r CompiledRule<'a>> {
    ranked.iter().find(|compiled| compiled.matches(transaction))
}

/// First enabled rule, in priority order, that matches the transaction.
pub fn select_rule<'a>(
    transaction: &Transaction,
    rules: &'a [CategorizationRule],
) -> Option<&'a CategorizationRule> {
    select_ranked(&rank_rules(rules), transaction).map(|compiled| compiled.rule)
}

pub fn matched_by(rule: &CategorizationRule, transaction: &Transaction) -> Option<MatchType> {
    compile_or_skip(rule)?.matched_by(transaction)
}

/// Every transaction the rule would match, regardless of `enabled`.
pub fn preview<'a>(
    rule: &CategorizationRule,
    transactions: &'a [Transaction],
) -> Result<Vec<&'a Transaction>> {
    let compiled = CompiledRule::compile(rule)?;
    Ok(transactions
        .iter()
        .filter(|t| compiled.matches(t))
        .collect())
}

/// Partition transactions by the rule that would claim them under
/// first-match-wins. Unmatched transactions are left out.
pub fn group_matches_by_rule<'a>(
    rules: &[CategorizationRule],
    transactions: &'a [Transaction],
) -> BTreeMap<RuleId, Vec<&'a Transaction>> {
    let ranked = rank_rules(rules);
    let mut groups: BTreeMap<RuleId, Vec<&Transaction>> = BTreeMap::new();
    for transaction in transactions {
        if let Some(compiled) = select_ranked(&ranked, transaction) {
            groups.entry(compiled.rule.id).or_default().push(transaction);
        }
    }
    groups
}

/// Structural checks run on create, update and enable.
pub fn validate_groups(groups: &[ConditionGroup]) -> Result<()> {
    if groups.is_empty() {
        return Err(PloutosError::Configuration(
            "a rule needs at least one condition group".into(),
        ));
    }
    for (i, group) in groups.iter().enumerate() {
        if group.conditions.is_empty() {
            return Err(PloutosError::Configuration(format!(
                "condition group {} has no conditions",
                i + 1
            )));
        }
        for condition in &group.conditions {
            validate(condition)?;
        }
    }
    Ok(())
}

pub fn validate_rule(draft: &RuleDraft) -> Result<()> {
    if draft.description.trim().is_empty() {
        return Err(PloutosError::Configuration("a rule needs a description".into()));
    }
    validate_groups(&draft.condition_groups)?;
    validate_config(&draft.processor)
}
