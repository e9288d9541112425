//! ProdVision library root.
//! Independent-row storage and grouping engine for daily production-health
//! entries, plus the thin CLI surface that drives it.

pub mod cli;
pub mod config;
pub mod db;
pub mod errors;
pub mod manager;
pub mod models;
pub mod validate;

use clap::Parser;
use cli::parser::Cli;
use config::Config;
use errors::AppResult;

/// Entry point used by main.rs
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let cfg = Config::load()?;
    cli::commands::handle(&cli, &cfg)
}
