use anyhow::{anyhow, Result};
use colored::Colorize;

use crate::commands::install::{installed_executable, set_global};
use crate::commands::Session;
use crate::utils::version::ConcreteVersion;

pub fn execute(version: &str) -> Result<()> {
    let session = Session::open()?;

    let actual_version = ConcreteVersion::parse(version)?;

    let version_dir = session.root.join(actual_version.folder_name());
    if installed_executable(&version_dir).is_none() {
        return Err(anyhow!("Node.js {} is not installed. Use 'spark-nvm install {}' first.",
                            actual_version, actual_version));
    }

    let mut config = session.config;
    set_global(&mut config, &session.root, &actual_version)?;

    println!("Now using Node.js {}", actual_version.to_string().green());

    Ok(())
}
