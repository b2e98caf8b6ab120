pub mod balances;
pub mod categorizer;
pub mod cli;
pub mod conditions;
pub mod db;
pub mod error;
pub mod fmt;
pub mod ledger;
pub mod matching;
pub mod models;
pub mod processors;
pub mod settings;
pub mod store;
pub mod transfers;
