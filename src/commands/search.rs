use anyhow::Result;
use colored::Colorize;

use crate::commands::Session;
use crate::utils::version::{normalize, Tier};

pub fn execute(expr: &str) -> Result<()> {
    let session = Session::open()?;
    let registry = session.config.registry;

    let spec = normalize(expr, || session.client.fetch_latest(&registry.latest_url()))?;
    println!("Searching for {}", spec.source().green());

    let mut found = 0usize;
    for tier in [Tier::Node, Tier::IoJs] {
        let url = registry.index_url(tier);
        for detail in session.client.fetch_versions(&url)? {
            if !spec.is_match(&detail.node) {
                continue;
            }
            found += 1;
            let npm = detail.npm.as_deref().unwrap_or("-");
            let installed = session.root.join(&detail.node).is_dir();
            println!(
                "  {:<10} npm {:<8}{}",
                detail.node,
                npm,
                if installed { " (installed)".yellow().to_string() } else { String::new() }
            );
        }
    }

    if found == 0 {
        println!("No versions match {}", expr);
    }

    Ok(())
}
