use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::commands::Session;
use crate::config::{self, Config};
use crate::utils::{self, download, mirror, probe};
use crate::utils::version::{Arch, ConcreteVersion};

pub fn execute(version: &str, arch: Option<&str>, use_it: bool) -> Result<()> {
    let session = Session::open()?;
    let resolved = utils::resolve_version(&session.client, session.config.registry, &session.root, version)?;

    let arch = match arch {
        Some(arch) => arch.parse::<Arch>()?,
        None => resolved.arch.unwrap_or_else(|| session.config.arch()),
    };
    let resolved = resolved.with_arch(arch);

    // rejects tier 0 and missing arch builds before anything touches disk
    let url = mirror::resolve_url(session.config.registry, &resolved, arch)?;
    let exec_name = url.rsplit('/').next().unwrap_or("node.exe");

    let version_dir = session.root.join(resolved.folder_name());
    let dest = version_dir.join(exec_name);

    if dest.exists() {
        println!("Node.js {} is already installed", resolved);
    } else {
        println!("Installing Node.js {}", resolved.to_string().green());
        if let Err(e) = download::download_file(session.client.transport(), &url, &dest) {
            // leave no empty version folder behind
            if let Err(cleanup) = fs::remove_dir(&version_dir) {
                debug!(path = %version_dir.display(), error = %cleanup, "could not remove version folder");
            }
            return Err(e).with_context(|| format!("Failed to install Node.js {}", resolved));
        }
        println!("Successfully installed Node.js {}", resolved.to_string().green());
    }

    let mut config = session.config;
    if use_it || config.global_version.is_none() {
        println!("Setting Node.js {} as the global version", resolved);
        set_global(&mut config, &session.root, &resolved)?;
    }

    Ok(())
}

/// Executable inside an installed version folder, `node.exe` or `iojs.exe`.
pub fn installed_executable(version_dir: &Path) -> Option<std::path::PathBuf> {
    [probe::node_executable(), "node.exe", "iojs.exe"]
        .into_iter()
        .map(|name| version_dir.join(name))
        .find(|path| path.is_file())
}

/// Copies the version's executable over `<root>/node.exe` and records it.
pub fn set_global(config: &mut Config, root: &Path, version: &ConcreteVersion) -> Result<()> {
    let version_dir = root.join(version.folder_name());
    let source = installed_executable(&version_dir)
        .with_context(|| format!("Node.js {} is not installed in {}", version, version_dir.display()))?;
    let target = root.join(probe::node_executable());

    fs::copy(&source, &target)
        .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;

    config.global_version = Some(version.folder_name());
    config::save_config(config)?;
    Ok(())
}
