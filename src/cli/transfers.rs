use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::Result;
use crate::fmt::{money, percent};
use crate::settings::load_settings;
use crate::store::Store;
use crate::transfers::{self, WeightedConfidence};

fn policy() -> Result<WeightedConfidence> {
    let settings = load_settings();
    settings.validate()?;
    Ok(WeightedConfidence::from_settings(&settings))
}

pub fn candidates(json: bool) -> Result<()> {
    let store = open_store()?;
    let found = transfers::candidates(&store, &policy()?)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Credit", "Debit", "Date", "Amount", "Description", "Confidence"]);
    for c in &found {
        table.add_row(vec![
            Cell::new(c.credit_transaction.id),
            Cell::new(c.debit_transaction.id),
            Cell::new(c.date),
            Cell::new(money(c.amount)),
            Cell::new(format!(
                "{} / {}",
                c.credit_transaction.description, c.debit_transaction.description
            )),
            Cell::new(percent(c.confidence)),
        ]);
    }
    println!("Transfer candidates ({})\n{table}", found.len());
    Ok(())
}

pub fn merge(credit: i64, debit: i64) -> Result<()> {
    let store = open_store()?;
    transfers::merge(&store, credit, debit, &policy()?)?;
    println!("Merged transfer: credit {credit} now carries debit {debit}");
    Ok(())
}

pub fn reject(credit: i64, debit: i64, reason: Option<&str>) -> Result<()> {
    let store = open_store()?;
    transfers::reject(&store, credit, debit, reason)?;
    println!("Rejected pair {credit} / {debit}");
    Ok(())
}

pub fn unreject(credit: i64, debit: i64) -> Result<()> {
    let store = open_store()?;
    transfers::unreject(&store, credit, debit)?;
    println!("Pair {credit} / {debit} can be proposed again");
    Ok(())
}

pub fn rejected() -> Result<()> {
    let store = open_store()?;
    let mut table = Table::new();
    table.set_header(vec!["Credit", "Debit", "Reason", "Rejected At"]);
    for r in store.rejected_pairs()? {
        table.add_row(vec![
            Cell::new(r.key.credit_transaction_id),
            Cell::new(r.key.debit_transaction_id),
            Cell::new(r.rejected_reason.unwrap_or_default()),
            Cell::new(r.rejected_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("Rejected pairs\n{table}");
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Amount", "From", "To"]);
    for transfer in store.transfers()? {
        let legs: Vec<String> = transfer
            .slaves
            .iter()
            .map(|s| s.account_id.to_string())
            .collect();
        table.add_row(vec![
            Cell::new(transfer.master.id),
            Cell::new(transfer.master.date),
            Cell::new(&transfer.master.description),
            Cell::new(money(transfer.master.amount)),
            Cell::new(legs.join(", ")),
            Cell::new(transfer.master.account_id),
        ]);
    }
    println!("Transfers\n{table}");
    Ok(())
}
