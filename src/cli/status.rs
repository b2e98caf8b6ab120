use crate::db::get_connection;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!(
        "Transfers:  {}-day window, weights {}/{}",
        settings.transfer_window_days, settings.date_weight, settings.description_weight
    );

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        let accounts = count("SELECT count(*) FROM accounts")?;
        let transactions = count("SELECT count(*) FROM transactions")?;
        let rules = count("SELECT count(*) FROM categorization_rules")?;
        let enabled = count("SELECT count(*) FROM categorization_rules WHERE enabled = 1")?;
        let rejected = count("SELECT count(*) FROM rejected_transfer_pairs")?;
        let merged = count("SELECT count(*) FROM transfer_links")?;

        println!();
        println!("Accounts:      {accounts}");
        println!("Transactions:  {transactions}");
        println!("Rules:         {rules} ({enabled} enabled)");
        println!("Transfers:     {merged} merged, {rejected} rejected pairs");
    } else {
        println!();
        println!("Database not found. Run `ploutos init` to set up.");
    }

    Ok(())
}
