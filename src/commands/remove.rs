use anyhow::{anyhow, Result};
use colored::Colorize;
use std::fs;

use crate::commands::Session;
use crate::utils::version::ConcreteVersion;

pub fn execute(version: &str) -> Result<()> {
    let session = Session::open()?;

    let actual_version = ConcreteVersion::parse(version)?;

    let version_dir = session.root.join(actual_version.folder_name());
    if !version_dir.is_dir() {
        return Err(anyhow!("Node.js {} is not installed", actual_version));
    }

    if let Some(ref active) = session.config.global_version {
        if *active == actual_version.folder_name() {
            return Err(anyhow!(
                "Cannot remove the global Node.js version. Switch to another version first."
            ));
        }
    }

    fs::remove_dir_all(&version_dir)?;

    println!("Successfully removed Node.js {}", actual_version.to_string().green());

    Ok(())
}
