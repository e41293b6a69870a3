use clap::Subcommand;
use flowmodal_core::Config;
use serde_json::json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting
    Get {
        /// Dotted key: "storage.tiers", "storage.database" or "run.tick_interval_ms"
        key: String,
    },
    /// Change one setting
    Set {
        /// Dotted key
        key: String,
        /// New value; tiers are comma separated ("local, memory")
        value: String,
    },
    /// Show the settings together with the storage they resolve to
    List,
    /// Restore the default tiers, database file and tick interval
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let listing = json!({
                "settings": config,
                "resolved": {
                    "tiers": config.storage_tiers()?,
                    "database": config.database_path()?.display().to_string(),
                },
            });
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
