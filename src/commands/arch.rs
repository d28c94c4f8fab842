use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::commands::Session;
use crate::utils::probe;

pub fn execute(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Session::open()?.root.join(probe::node_executable()),
    };

    let arch = probe::architecture(&path)?;
    println!("{} is {}", path.display(), arch.to_string().green());
    Ok(())
}
