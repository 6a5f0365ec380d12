//! `modfetch config {validate|print}` — exercises the config loader
//! directly (spec section 6: `config {validate|print}`).

use std::path::Path;

use crate::cli::ConfigAction;
use crate::config::Settings;
use crate::exit::CliError;

pub fn run(config_path: &Path, action: &ConfigAction) -> Result<(), CliError> {
    let settings = Settings::load(config_path)?;

    match action {
        ConfigAction::Validate => {
            println!("{} is valid", config_path.display());
            Ok(())
        }
        ConfigAction::Print => {
            let toml = toml::to_string_pretty(&settings).expect("resolved settings are always serializable");
            print!("{toml}");
            Ok(())
        }
    }
}
