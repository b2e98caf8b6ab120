use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::balances::balances;
use crate::cli::open_store;
use crate::error::Result;
use crate::fmt::money;
use crate::models::AccountDraft;
use crate::store::Store;

pub fn add(name: &str, category: &str, sub_category: &str, is_real: bool, opening: Decimal) -> Result<()> {
    let store = open_store()?;
    let account = store.create_account(&AccountDraft {
        name: name.to_string(),
        category: category.to_string(),
        sub_category: sub_category.to_string(),
        is_real,
        original_amount: opening,
    })?;
    println!("Added account {}: {name}", account.id);
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Category", "Sub-category", "Real", "Balance"]);
    for row in balances(&store)? {
        table.add_row(vec![
            Cell::new(row.account.id),
            Cell::new(&row.account.name),
            Cell::new(&row.account.category),
            Cell::new(&row.account.sub_category),
            Cell::new(if row.account.is_real { "yes" } else { "" }),
            Cell::new(money(row.balance)),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
