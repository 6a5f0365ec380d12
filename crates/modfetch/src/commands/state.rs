//! `modfetch state {backup|check}` — thin CLI wrappers around C1's
//! `backup(path)` and `check_integrity()` contracts (SPEC_FULL.md 2:
//! "`state backup`").

use modfetch_store::Store;

use crate::cli::StateCommand;
use crate::config::Settings;
use crate::exit::{self, CliError};

pub fn run(settings: &Settings, command: &StateCommand) -> Result<(), CliError> {
    let store = Store::open(settings.state_db_path())?;

    match command {
        StateCommand::Backup { path } => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            store.backup(path).map_err(|e| CliError::new(exit::OTHER, e.to_string()))?;
            println!("backed up state store to {}", path.display());
            Ok(())
        }
        StateCommand::Check => {
            let issues = store.check_integrity()?;
            if issues.is_empty() {
                println!("no integrity issues found");
                Ok(())
            } else {
                for issue in &issues {
                    println!("{issue:?}");
                }
                Err(CliError::new(
                    exit::OTHER,
                    format!("{} integrity issue(s) found; run `modfetch clean` or fix manually", issues.len()),
                ))
            }
        }
    }
}
