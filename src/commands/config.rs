use anyhow::{anyhow, Result};
use colored::Colorize;

use crate::config::{self, KEYS};

pub fn execute(key: Option<&str>, value: Option<&str>) -> Result<()> {
    let mut config = config::load_config()?;

    match (key, value) {
        (None, _) => {
            for key in KEYS {
                let shown = config.get(key).unwrap_or_else(|| "-".to_string());
                println!("{:<15} {}", key.bright_blue(), shown);
            }
            println!("{:<15} {}", "root (resolved)".bright_blue(), config.root()?.display());
        }
        (Some(key), None) => {
            if !KEYS.contains(&key) {
                return Err(anyhow!("Unknown config key '{}', expected one of {}", key, KEYS.join(", ")));
            }
            println!("{}", config.get(key).unwrap_or_default());
        }
        (Some(key), Some(value)) => {
            config.set(key, value)?;
            config::save_config(&config)?;
            println!("Set {} to {}", key.bright_blue(), config.get(key).unwrap_or_default().green());
        }
    }

    Ok(())
}
