//! The `paydayd` node: configuration, store setup and the ledger commands.

pub mod commands;
pub mod config;
pub mod store;

use std::sync::Arc;
use std::time::Instant;

use crate::config::{CliAction, Command, Config};
use crate::store::{lock_data_dir, open_store, Backend};

pub fn run_entry() -> Result<(), String> {
    match config::parse_args()? {
        CliAction::PrintHelp => {
            println!("{}", config::usage());
            Ok(())
        }
        CliAction::PrintVersion => {
            println!("paydayd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::Run(config, command) => run_with_config(&config, &command),
    }
}

fn run_with_config(config: &Config, command: &Command) -> Result<(), String> {
    paydayd_log::init(config.log);
    let start = Instant::now();

    let _lock = match config.backend {
        Backend::Fjall => Some(lock_data_dir(&config.data_dir)?),
        Backend::Memory => None,
    };
    paydayd_log::log_debug!(
        "Starting paydayd on {} with {} backend (conf {})",
        config.network.as_str(),
        config.backend.as_str(),
        config.conf_path.display()
    );

    let store = Arc::new(open_store(config)?);
    let engine = commands::build_engine(config, Arc::clone(&store));
    let output = commands::execute(config, &engine, command);
    if let Err(err) = store.persist() {
        paydayd_log::log_error!("Failed to persist store: {err}");
    }
    let output = output?;

    let rendered = serde_json::to_string_pretty(&output).map_err(|err| err.to_string())?;
    println!("{rendered}");
    paydayd_log::log_debug!("Done in {} ms", start.elapsed().as_millis());
    Ok(())
}
