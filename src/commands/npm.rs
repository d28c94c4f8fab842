use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::commands::Session;
use crate::error::ArchiveErrorKind;
use crate::utils::install::{InstallLayout, NpmInstall};
use crate::utils::mirror::{MirrorTarget, Registry, LATEST_NPM_URL};
use crate::utils::probe;
use crate::utils::registry::{RegistryClient, Transport};
use crate::utils::version::{ConcreteVersion, GLOBAL, LATEST};

pub fn execute(version: &str, yes: bool) -> Result<()> {
    let version = version.trim().to_lowercase();
    if version != LATEST && version != GLOBAL && ConcreteVersion::parse(&version).is_err() {
        return Err(anyhow!(
            "'{}' is not supported, use latest, global or a version such as 3.8.1",
            version
        ));
    }

    let session = Session::open()?;
    let registry = session.config.registry;

    let remote = match version.as_str() {
        LATEST => session.client.fetch_latest_npm(LATEST_NPM_URL)?,
        GLOBAL => bundled_npm_version(&session.client, registry, &session.root)?,
        _ => ConcreteVersion::parse(&version)?.number(),
    };
    let local = probe::local_npm_version(&session.root).unwrap_or_else(|| "unknown".to_string());

    println!("local    npm version is {}", local);
    println!("remote   npm version is {}", remote.red());

    if !yes && !confirm(&format!("download {} version [Y/n]? ", remote))? {
        println!("Operation has been cancelled.");
        return Ok(());
    }

    let target = MirrorTarget::npm(registry, &remote);
    println!("Start download new npm version {}", target.file_name);

    let layout = InstallLayout::new(&session.root);
    if let Err(failure) = NpmInstall::new(layout, target).run(session.client.transport()) {
        if failure.source.archive_kind() == Some(ArchiveErrorKind::OpenFailed) {
            println!(
                "{} the mirror did not return a usable archive, try another registry with 'spark-nvm config registry <name>'",
                "hint:".yellow()
            );
        }
        return Err(failure).with_context(|| format!("Failed to install npm {}", remote));
    }

    println!("Set success, current npm version is {}.", remote.green());
    Ok(())
}

pub fn uninstall() -> Result<()> {
    let session = Session::open()?;
    if probe::local_npm_version(&session.root).is_none() {
        println!("No npm found in {}", session.root.display());
        return Ok(());
    }

    InstallLayout::new(&session.root).clean_all()?;
    println!("Npm uninstall {}.", "success".green());
    Ok(())
}

/// npm version shipped with the global node, looked up in the index that
/// lists that node.
pub fn bundled_npm_version<T: Transport>(
    client: &RegistryClient<T>,
    registry: Registry,
    root: &Path,
) -> Result<String> {
    let node = probe::global_node_version(root)?;
    let url = registry.index_url(node.tier());
    let detail = client.fetch_detail_by_version(&url, &node.number())?;
    detail
        .npm
        .ok_or_else(|| anyhow!("Node.js {} does not bundle npm", node))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
