use clap::Parser;
use tracing_subscriber::prelude::*;

use ploutos::cli::{
    self, AccountsCommands, Cli, Commands, RulesCommands, TransactionsCommands, TransfersCommands,
};
use ploutos::settings::load_settings;

fn main() {
    fn get_rust_log() -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| load_settings().log_filter)
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(get_rust_log()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                category,
                sub_category,
                real,
                opening,
            } => cli::accounts::add(&name, &category, &sub_category, real, opening),
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Transactions { command } => match command {
            TransactionsCommands::Add {
                account,
                amount,
                kind,
                date,
                description,
            } => cli::transactions::add(account, amount, kind, date, &description),
            TransactionsCommands::List { uncategorized } => cli::transactions::list(uncategorized),
            TransactionsCommands::Split { id, legs } => cli::transactions::split(id, &legs),
        },
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                description,
                conditions,
                any,
                splits,
                priority,
                filter,
                accounts,
            } => cli::rules::add(&description, &conditions, any, &splits, priority, &filter, &accounts),
            RulesCommands::Import { file } => cli::rules::import(&file),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Toggle { id, off } => cli::rules::toggle(id, off),
            RulesCommands::Delete { id } => cli::rules::delete(id),
            RulesCommands::Preview { id, json } => cli::rules::preview(id, json),
        },
        Commands::Process { json } => cli::matching::process(json),
        Commands::Stats { json } => cli::matching::show_stats(json),
        Commands::Transfers { command } => match command {
            TransfersCommands::Candidates { json } => cli::transfers::candidates(json),
            TransfersCommands::Merge { credit, debit } => cli::transfers::merge(credit, debit),
            TransfersCommands::Reject {
                credit,
                debit,
                reason,
            } => cli::transfers::reject(credit, debit, reason.as_deref()),
            TransfersCommands::Unreject { credit, debit } => cli::transfers::unreject(credit, debit),
            TransfersCommands::Rejected => cli::transfers::rejected(),
            TransfersCommands::List => cli::transfers::list(),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
