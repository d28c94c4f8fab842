pub mod verbose;
pub mod version;

use clap::{Parser, Subcommand, ArgAction};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short = 'V', long, action = ArgAction::SetTrue)]
    pub version: bool,

    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a node executable: latest, N.N.N[-x86], 5.x.x or /regex/
    Install {
        version: String,

        /// x86 or x64, defaults to the configured arch
        #[arg(short, long)]
        arch: Option<String>,

        /// Make it the global version once downloaded
        #[arg(short = 'g', long = "use", action = ArgAction::SetTrue)]
        use_it: bool,
    },

    /// Copy an installed version to the root as the global node
    #[command(name = "use")]
    Use {
        version: String,
    },

    Remove {
        version: String,
    },

    List {
        #[arg(short, long)]
        remote: bool,
    },

    /// List remote versions matching an expression
    Search {
        version: String,
    },

    /// Install npm: latest, global or N.N.N
    Npm {
        version: String,

        /// Skip the confirmation prompt
        #[arg(short, long, action = ArgAction::SetTrue)]
        yes: bool,
    },

    #[command(name = "npm-uninstall")]
    NpmUninstall,

    /// Report whether an executable is x86 or x64
    Arch {
        path: Option<std::path::PathBuf>,
    },

    /// Show or change configuration
    Config {
        key: Option<String>,
        value: Option<String>,
    },
}
