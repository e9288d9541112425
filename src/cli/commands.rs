//! Thin command handlers: parse JSON in, call the manager, print JSON out.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::manager::EntryManager;
use crate::models::items::EntryInput;
use crate::models::row_kind::RowFilter;

use super::parser::{Cli, Commands};

fn data_dir(cli: &Cli, cfg: &Config) -> PathBuf {
    match &cli.data_dir {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(&cfg.data_dir),
    }
}

fn read_input(file: &Option<String>) -> AppResult<String> {
    match file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn read_payload(file: &Option<String>) -> AppResult<EntryInput> {
    serde_json::from_str(&read_input(file)?)
        .map_err(|e| AppError::Validation(format!("malformed entry payload: {e}")))
}

fn read_field_map(file: &Option<String>) -> AppResult<serde_json::Map<String, serde_json::Value>> {
    serde_json::from_str(&read_input(file)?)
        .map_err(|e| AppError::Validation(format!("malformed field map: {e}")))
}

fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Other(format!("cannot render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    match &cli.command {
        Commands::Init => {
            let config = Config::init_all(cli.data_dir.clone())?;
            // Opening the manager creates the five database files
            EntryManager::open(&PathBuf::from(&config.data_dir))?;
            println!("data directory: {}", config.data_dir);
            Ok(())
        }

        Commands::Add { file } => {
            let input = read_payload(file)?;
            let mut manager = EntryManager::open(&data_dir(cli, cfg))?;
            let entry = manager.create_logical_entry(&input)?;
            print_json(&entry)
        }

        Commands::Get { id, app, item_sets } => {
            let manager = EntryManager::open(&data_dir(cli, cfg))?;
            match manager.get_logical_entry(*id, app.as_deref())? {
                Some(entry) if *item_sets => print_json(&entry.item_sets()),
                Some(entry) => print_json(&entry),
                None => Err(AppError::NotFound(*id)),
            }
        }

        Commands::List { app, from, to } => {
            let manager = EntryManager::open(&data_dir(cli, cfg))?;
            let entries = manager.list_logical_entries(app, from.as_deref(), to.as_deref())?;
            print_json(&entries)
        }

        Commands::Rows {
            kind,
            app,
            from,
            to,
        } => {
            let filter = RowFilter::from_str_opt(kind)
                .ok_or_else(|| AppError::Validation(format!("unknown row kind: {kind}")))?;
            let manager = EntryManager::open(&data_dir(cli, cfg))?;
            let rows = manager.list_rows(app.as_deref(), from.as_deref(), to.as_deref(), filter)?;
            print_json(&rows)
        }

        Commands::Patch { id, file, app } => {
            let fields = read_field_map(file)?;
            let mut manager = EntryManager::open(&data_dir(cli, cfg))?;
            manager.update_row_fields(*id, &fields, app.as_deref())?;
            match manager.get_logical_entry(*id, app.as_deref())? {
                Some(entry) => print_json(&entry.main),
                None => Err(AppError::NotFound(*id)),
            }
        }

        Commands::Update { id, file, app } => {
            let input = read_payload(file)?;
            let mut manager = EntryManager::open(&data_dir(cli, cfg))?;
            let entry = manager.update_logical_entry(*id, &input, app.as_deref())?;
            print_json(&entry)
        }

        Commands::Del { id, app, row } => {
            let mut manager = EntryManager::open(&data_dir(cli, cfg))?;
            let deleted = if *row {
                manager.delete_row(*id, app.as_deref())?
            } else {
                manager.delete_logical_entry(*id, app.as_deref())?
            };
            if deleted {
                println!("deleted {id}");
                Ok(())
            } else {
                Err(AppError::NotFound(*id))
            }
        }

        Commands::Setting { key, value, app } => {
            let mut manager = EntryManager::open(&data_dir(cli, cfg))?;
            match value {
                Some(v) => {
                    manager.set_setting(key, v, app.as_deref())?;
                    println!("{key} set");
                }
                None => match manager.get_setting(key, app.as_deref())? {
                    Some(v) => println!("{v}"),
                    None => println!("(unset)"),
                },
            }
            Ok(())
        }
    }
}
