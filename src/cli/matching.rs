use std::sync::atomic::AtomicBool;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::Result;
use crate::matching::{process_uncategorized, stats};

pub fn process(json: bool) -> Result<()> {
    let store = open_store()?;
    let report = process_uncategorized(&store, &AtomicBool::new(false))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.details.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["ID", "Description", "Rule", "Matched On"]);
        for d in &report.details {
            table.add_row(vec![
                Cell::new(d.transaction_id),
                Cell::new(&d.description),
                Cell::new(&d.matched_rule),
                Cell::new(d.match_type.map(|m| m.as_str()).unwrap_or("")),
            ]);
        }
        println!("{table}");
    }
    for f in &report.failures {
        println!(
            "  {} #{} '{}' ({}): {}",
            "failed".red(),
            f.transaction_id,
            f.description,
            f.matched_rule,
            f.error
        );
    }

    println!(
        "Processed {}: {} categorized, {} failed, {} unmatched",
        report.processed,
        report.categorized.to_string().green(),
        report.failed.to_string().red(),
        report.unmatched.to_string().yellow()
    );
    if report.aborted {
        println!("{}", "Run was cancelled before finishing.".yellow());
    }
    Ok(())
}

pub fn show_stats(json: bool) -> Result<()> {
    let store = open_store()?;
    let s = stats(&store)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&s)?);
        return Ok(());
    }
    println!("Enabled rules:              {}", s.total_enabled_rules);
    println!("Uncategorized transactions: {}", s.total_uncategorized_transactions);
    if !s.rules.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Order", "ID", "Description", "Priority", "Pending"]);
        for (i, rule) in s.rules.iter().enumerate() {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(rule.id),
                Cell::new(&rule.description),
                Cell::new(rule.priority),
                Cell::new(s.pending_matches.get(&rule.id).copied().unwrap_or(0)),
            ]);
        }
        println!("{table}");
    }
    Ok(())
}
