pub mod analytics;
pub mod cli;
pub mod config;
pub mod ledger;
pub mod notify;
pub mod points;
pub mod taxonomy;
