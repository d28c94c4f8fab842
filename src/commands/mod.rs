pub mod arch;
pub mod config;
pub mod install;
pub mod list;
pub mod npm;
pub mod remove;
pub mod search;
pub mod r#use;

use anyhow::Result;
use std::path::PathBuf;

use crate::config::{self as settings, Config};
use crate::utils::registry::{HttpTransport, RegistryClient};

/// What every command needs: settings, the resolved root and a client.
pub struct Session {
    pub config: Config,
    pub root: PathBuf,
    pub client: RegistryClient<HttpTransport>,
}

impl Session {
    pub fn open() -> Result<Self> {
        let config = settings::load_config()?;
        let root = config.root()?;
        let client = RegistryClient::new(HttpTransport::new()?);
        tracing::debug!(root = %root.display(), registry = %config.registry, "session");
        Ok(Self { config, root, client })
    }
}
