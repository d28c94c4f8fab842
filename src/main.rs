mod commands;
mod config;
mod error;
mod options;
mod utils;

use clap::{Parser, CommandFactory};
use colored::Colorize;

fn main() {
    let cli = options::Cli::parse();

    options::verbose::init(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run(cli: options::Cli) -> anyhow::Result<()> {
    if cli.version {
        if cli.verbose {
            println!("Verbose mode: {}", "enabled".green());
        }
        options::version::show();
        return Ok(());
    }

    match cli.command {
        Some(options::Commands::Install { version, arch, use_it }) => {
            commands::install::execute(&version, arch.as_deref(), use_it)?;
        }
        Some(options::Commands::Use { version }) => {
            commands::r#use::execute(&version)?;
        }
        Some(options::Commands::List { remote }) => {
            commands::list::execute(remote)?;
        }
        Some(options::Commands::Remove { version }) => {
            commands::remove::execute(&version)?;
        }
        Some(options::Commands::Search { version }) => {
            commands::search::execute(&version)?;
        }
        Some(options::Commands::Npm { version, yes }) => {
            commands::npm::execute(&version, yes)?;
        }
        Some(options::Commands::NpmUninstall) => {
            commands::npm::uninstall()?;
        }
        Some(options::Commands::Arch { path }) => {
            commands::arch::execute(path)?;
        }
        Some(options::Commands::Config { key, value }) => {
            commands::config::execute(key.as_deref(), value.as_deref())?;
        }
        None => {
            let mut cmd = options::Cli::command();
            cmd.print_help()?;
            println!();
        }
    }

    Ok(())
}
