use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::commands::Session;
use crate::utils::version::{ConcreteVersion, Tier};

pub fn execute(remote: bool) -> Result<()> {
    let session = Session::open()?;
    if remote {
        list_remote_versions(&session)?;
    } else {
        list_local_versions(&session)?;
    }

    Ok(())
}

/// Version folders under the root, newest first.
pub fn local_versions(root: &Path) -> Vec<String> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut versions: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| ConcreteVersion::parse(name).is_ok())
        .collect();

    versions.sort_by(|a, b| {
        let key = |s: &str| semver::Version::parse(s.split('-').next().unwrap_or(s)).ok();
        match (key(a), key(b)) {
            (Some(a_ver), Some(b_ver)) => a_ver.cmp(&b_ver).reverse().then_with(|| a.cmp(b)),
            _ => a.cmp(b).reverse(),
        }
    });
    versions
}

fn list_local_versions(session: &Session) -> Result<()> {
    println!("Installed Node.js versions in {}:", session.root.display());

    let versions = local_versions(&session.root);
    if versions.is_empty() {
        println!("  No versions installed");
        return Ok(());
    }

    for version in versions {
        if session.config.global_version.as_deref() == Some(version.as_str()) {
            println!("* {} (global)", version.green());
        } else {
            println!("  {}", version);
        }
    }

    Ok(())
}

fn list_remote_versions(session: &Session) -> Result<()> {
    let url = session.config.registry.index_url(Tier::Node);
    println!("Fetching available Node.js versions from {}...", url);

    let available_versions = session.client.fetch_versions(&url)?;

    if available_versions.is_empty() {
        println!("No available versions found");
        return Ok(());
    }

    println!("\nAvailable Node.js versions:");

    for (i, detail) in available_versions.iter().enumerate().take(30) {
        let version = &detail.node;
        let installed = session.root.join(version).is_dir();
        let is_current = session.config.global_version.as_deref() == Some(version.as_str());

        if installed {
            if is_current {
                println!("* {} (installed, global)", version.green());
            } else {
                println!("* {} (installed)", version.yellow());
            }
        } else {
            println!("  {}", version);
        }

        if i == 29 && available_versions.len() > 30 {
            println!("  ... and more");
        }
    }

    Ok(())
}
