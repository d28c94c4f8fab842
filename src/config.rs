use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::utils::mirror::Registry;
use crate::utils::version::{Arch, ConcreteVersion};

pub const REGISTRY: &str = "registry";
pub const ROOT: &str = "root";
pub const ARCH: &str = "arch";
pub const GLOBAL_VERSION: &str = "global_version";

pub const KEYS: [&str; 4] = [REGISTRY, ROOT, ARCH, GLOBAL_VERSION];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: Registry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_version: Option<String>,
}

impl Config {
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            REGISTRY => Some(self.registry.to_string()),
            ROOT => self.root.as_ref().map(|p| p.display().to_string()),
            ARCH => self.arch.clone(),
            GLOBAL_VERSION => self.global_version.clone(),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            REGISTRY => self.registry = value.parse()?,
            ROOT => self.root = Some(PathBuf::from(value)),
            ARCH => self.arch = Some(value.parse::<Arch>()?.to_string()),
            GLOBAL_VERSION => self.global_version = Some(ConcreteVersion::parse(value)?.folder_name()),
            _ => return Err(anyhow!("Unknown config key '{}', expected one of {}", key, KEYS.join(", "))),
        }
        Ok(())
    }

    /// Configured arch, falling back to the host's.
    pub fn arch(&self) -> Arch {
        self.arch
            .as_deref()
            .and_then(|a| a.parse().ok())
            .unwrap_or_else(Arch::host)
    }

    /// Configured root, else the folder of the node on PATH, else
    /// `<data dir>/nodejs`.
    pub fn root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        if let Ok(node) = which::which("node") {
            if let Some(parent) = node.parent() {
                debug!(path = %parent.display(), "using folder of node on PATH as root");
                return Ok(parent.to_path_buf());
            }
        }
        Ok(get_dirs()?.data_dir.join("nodejs"))
    }
}

pub struct SparkDirs {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

pub fn get_dirs() -> Result<SparkDirs> {
    let project_dirs = ProjectDirs::from("com", "spark-nvm", "spark-nvm")
        .context("Failed to determine project directories")?;

    let config_dir = project_dirs.config_dir().to_path_buf();
    let data_dir = project_dirs.data_dir().to_path_buf();

    fs::create_dir_all(&config_dir)?;

    Ok(SparkDirs { config_dir, data_dir })
}

pub fn load_config() -> Result<Config> {
    let dirs = get_dirs()?;
    let config_path = dirs.config_dir.join("config.json");

    if config_path.exists() {
        let content = fs::read_to_string(&config_path)?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(config)
    } else {
        let config = Config::default();
        save_config(&config)?;
        Ok(config)
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    let dirs = get_dirs()?;
    let config_path = dirs.config_dir.join("config.json");

    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;
    debug!(path = %config_path.display(), "config saved");

    Ok(())
}
