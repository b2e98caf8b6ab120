use std::str::FromStr;

use comfy_table::{Cell, Table};

use crate::categorizer::validate_rule;
use crate::cli::{open_store, parse_decimal, parse_id, split_pair};
use crate::error::Result;
use crate::fmt::money;
use crate::matching;
use crate::models::{
    CategorizationRule, Condition, ConditionGroup, LogicalOperator, MatchType, ProcessorConfig,
    RuleDraft, SimpleSplitConfig, SplitItem, TransactionFilter,
};
use crate::store::Store;

fn describe_conditions(rule: &CategorizationRule) -> String {
    rule.condition_groups
        .iter()
        .map(|group| {
            let joiner = match group.operator {
                LogicalOperator::And => " AND ",
                LogicalOperator::Or => " OR ",
            };
            let inner: Vec<String> = group
                .conditions
                .iter()
                .map(|c| format!("{} '{}'", c.match_type, c.match_value))
                .collect();
            format!("({})", inner.join(joiner))
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn describe_processor(processor: &ProcessorConfig) -> String {
    match processor {
        ProcessorConfig::SimpleSplit(config) => config
            .splits
            .iter()
            .map(|s| format!("{}% \u{2192} {}", s.percentage, s.account_id))
            .collect::<Vec<_>>()
            .join(", "),
        ProcessorConfig::Loan(config) => format!(
            "loan {} @ {}% over {} months",
            money(config.loan_amount),
            config.annual_rate,
            config.duration_months
        ),
    }
}

fn describe_accounts(account_ids: &[i64]) -> String {
    if account_ids.is_empty() {
        return "any".into();
    }
    account_ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn add(
    description: &str,
    conditions: &[String],
    any: bool,
    splits: &[String],
    priority: i64,
    filter: &str,
    accounts: &[i64],
) -> Result<()> {
    let conditions = conditions
        .iter()
        .map(|raw| {
            let (match_type, value) = split_pair(raw, "MATCH_TYPE:VALUE")?;
            Ok(Condition::new(MatchType::from_str(match_type)?, value))
        })
        .collect::<Result<Vec<_>>>()?;
    let splits = splits
        .iter()
        .map(|raw| {
            let (account, percentage) = split_pair(raw, "ACCOUNT_ID:PERCENT")?;
            Ok(SplitItem {
                account_id: parse_id(account)?,
                percentage: parse_decimal(percentage)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let store = open_store()?;
    for split in &splits {
        store.account(split.account_id)?;
    }
    let rule = store.create_rule(&RuleDraft {
        description: description.to_string(),
        condition_groups: vec![ConditionGroup {
            operator: if any { LogicalOperator::Or } else { LogicalOperator::And },
            conditions,
        }],
        priority,
        enabled: true,
        processor: ProcessorConfig::SimpleSplit(SimpleSplitConfig {
            splits,
            transaction_filter: TransactionFilter::from_str(filter)?,
        }),
        account_ids: accounts.to_vec(),
    })?;
    println!("Added rule {}: '{}'", rule.id, rule.description);
    Ok(())
}

pub fn import(file: &str) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let drafts: Vec<RuleDraft> = serde_json::from_str(&content)?;
    // all or nothing
    for draft in &drafts {
        validate_rule(draft)?;
    }
    let store = open_store()?;
    let mut added = 0usize;
    for draft in &drafts {
        let rule = store.create_rule(draft)?;
        tracing::debug!(rule_id = rule.id, description = %rule.description, "imported rule");
        added += 1;
    }
    println!("Imported {added} rules from {file}");
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store()?;
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Description", "Conditions", "Processor", "Filter", "Accounts", "Priority", "Enabled",
        "Last Applied",
    ]);
    for rule in store.rules()? {
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(&rule.description),
            Cell::new(describe_conditions(&rule)),
            Cell::new(describe_processor(&rule.processor)),
            Cell::new(rule.processor.transaction_filter().as_str()),
            Cell::new(describe_accounts(&rule.account_ids)),
            Cell::new(rule.priority),
            Cell::new(if rule.enabled { "yes" } else { "no" }),
            Cell::new(
                rule.last_applied_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn toggle(id: i64, off: bool) -> Result<()> {
    let store = open_store()?;
    let rule = store.set_rule_enabled(id, !off)?;
    let state = if rule.enabled { "Enabled" } else { "Disabled" };
    println!("{state} rule {id}: '{}'", rule.description);
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let store = open_store()?;
    let rule = store.rule(id)?;
    store.delete_rule(id)?;
    println!("Deleted rule {id}: '{}'", rule.description);
    Ok(())
}

pub fn preview(id: i64, json: bool) -> Result<()> {
    let store = open_store()?;
    let result = matching::preview(&store, id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Amount"]);
    for m in &result.matches {
        table.add_row(vec![
            Cell::new(m.transaction_id),
            Cell::new(m.date),
            Cell::new(&m.description),
            Cell::new(money(m.amount)),
        ]);
    }
    println!(
        "Rule {} '{}' would match {} transactions\n{table}",
        result.rule_id, result.rule_description, result.total_matches
    );
    Ok(())
}
