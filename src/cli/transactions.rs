use std::collections::HashMap;

use chrono::NaiveDate;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::cli::{open_store, parse_decimal, parse_id, split_pair};
use crate::error::Result;
use crate::fmt::money;
use crate::matching::save_slaves;
use crate::models::{SlaveDraft, TransactionDraft, TransactionType};
use crate::store::Store;

pub fn add(
    account_id: i64,
    amount: Decimal,
    kind: TransactionType,
    date: NaiveDate,
    description: &str,
) -> Result<()> {
    let store = open_store()?;
    let transaction = store.create_transaction(&TransactionDraft {
        account_id,
        amount,
        kind,
        description: description.to_string(),
        date,
    })?;
    println!(
        "Added transaction {}: {} {} {}",
        transaction.id,
        transaction.date,
        transaction.kind,
        money(transaction.amount)
    );
    Ok(())
}

pub fn list(uncategorized: bool) -> Result<()> {
    let store = open_store()?;
    let transactions = if uncategorized {
        store.uncategorized_transactions()?
    } else {
        store.transactions()?
    };
    let names: HashMap<i64, String> = store
        .accounts()?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();
    let mut slaves_by_master: HashMap<i64, Vec<String>> = HashMap::new();
    for slave in store.all_slaves()? {
        let label = names
            .get(&slave.account_id)
            .cloned()
            .unwrap_or_else(|| slave.account_id.to_string());
        slaves_by_master
            .entry(slave.master_id)
            .or_default()
            .push(format!("{label} {}", money(slave.amount)));
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Account", "Description", "Type", "Amount", "Slaves"]);
    for t in &transactions {
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(t.date),
            Cell::new(names.get(&t.account_id).map(String::as_str).unwrap_or("")),
            Cell::new(&t.description),
            Cell::new(t.kind),
            Cell::new(money(t.amount)),
            Cell::new(
                slaves_by_master
                    .get(&t.id)
                    .map(|s| s.join(", "))
                    .unwrap_or_default(),
            ),
        ]);
    }
    println!("Transactions ({})\n{table}", transactions.len());
    Ok(())
}

pub fn split(id: i64, legs: &[String]) -> Result<()> {
    let store = open_store()?;
    let master = store.transaction(id)?;
    let drafts = legs
        .iter()
        .map(|raw| {
            let (account, amount) = split_pair(raw, "ACCOUNT_ID:AMOUNT")?;
            Ok(SlaveDraft::mirror(&master, parse_id(account)?, parse_decimal(amount)?))
        })
        .collect::<Result<Vec<_>>>()?;
    let saved = save_slaves(&store, id, &drafts)?;
    println!("Saved {} slaves for transaction {id}", saved.len());
    Ok(())
}
