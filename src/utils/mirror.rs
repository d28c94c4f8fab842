//! Mirror tables and download URL construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::version::{Arch, ConcreteVersion, Tier};

pub const NODE_LIST: &str = "index.json";
pub const LATEST_SHASUMS: &str = "latest/SHASUMS256.txt";
pub const LATEST_NPM_URL: &str = "https://registry.npmjs.org/npm/package.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    #[default]
    Default,
    Taobao,
    Huawei,
}

impl Registry {
    pub const ALL: [Registry; 3] = [Registry::Default, Registry::Taobao, Registry::Huawei];

    pub fn name(&self) -> &'static str {
        match self {
            Registry::Default => "default",
            Registry::Taobao => "taobao",
            Registry::Huawei => "huawei",
        }
    }

    /// Base URL for node binaries.
    pub fn node_base(&self) -> &'static str {
        match self {
            Registry::Default => "https://nodejs.org/dist/",
            Registry::Taobao => "https://cdn.npmmirror.com/binaries/node/",
            Registry::Huawei => "https://mirrors.huaweicloud.com/nodejs/",
        }
    }

    /// Base URL for io.js binaries.
    pub fn iojs_base(&self) -> &'static str {
        match self {
            Registry::Default => "https://iojs.org/dist/",
            Registry::Taobao => "https://cdn.npmmirror.com/binaries/iojs/",
            Registry::Huawei => "https://mirrors.huaweicloud.com/iojs/",
        }
    }

    /// Base URL that hosts the given version, io.js for tier 3.
    pub fn base_for(&self, tier: Tier) -> &'static str {
        if tier == Tier::IoJs {
            self.iojs_base()
        } else {
            self.node_base()
        }
    }

    pub fn index_url(&self, tier: Tier) -> String {
        format!("{}{}", self.base_for(tier), NODE_LIST)
    }

    pub fn latest_url(&self) -> String {
        format!("{}{}", self.node_base(), LATEST_SHASUMS)
    }

    fn npm_base(&self) -> &'static str {
        match self {
            Registry::Default => "https://registry.npmjs.org/npm/-/",
            Registry::Taobao => "https://cdn.npmmirror.com/binaries/npm/",
            Registry::Huawei => "https://mirrors.huaweicloud.com/npm-software/",
        }
    }

    /// The npm package layout differs per mirror: the origin registry
    /// publishes tarballs, the mirrors repackage them as zips.
    pub fn npm_archive_kind(&self) -> ArchiveKind {
        match self {
            Registry::Default => ArchiveKind::Tgz,
            Registry::Taobao | Registry::Huawei => ArchiveKind::Zip,
        }
    }
}

impl FromStr for Registry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        Registry::ALL
            .into_iter()
            .find(|r| r.name() == s || r.node_base().trim_end_matches('/') == s.trim_end_matches('/'))
            .ok_or(Error::InvalidValue {
                key: "registry",
                value: s,
            })
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tgz,
}

/// Everything needed to fetch and unpack one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTarget {
    pub url: String,
    pub file_name: String,
    pub kind: ArchiveKind,
    /// Top-level folder inside the archive, known once extraction starts.
    pub root: Option<String>,
}

impl MirrorTarget {
    pub fn npm(registry: Registry, npm_version: &str) -> Self {
        let kind = registry.npm_archive_kind();
        let file_name = match kind {
            ArchiveKind::Zip => format!("v{npm_version}.zip"),
            ArchiveKind::Tgz => format!("npm-{npm_version}.tgz"),
        };
        Self {
            url: format!("{}{}", registry.npm_base(), file_name),
            file_name,
            kind,
            root: None,
        }
    }
}

/// Path of the executable relative to `v<version>/` for a tier and arch.
pub fn executable_path(version: &ConcreteVersion, arch: Arch) -> Result<&'static str> {
    match (version.tier(), arch) {
        (Tier::Unsupported, _) => Err(Error::UnsupportedVersion(version.number())),
        (Tier::X86Only, Arch::X64) => Err(Error::UnsupportedArch {
            version: version.number(),
            arch: arch.to_string(),
        }),
        (Tier::X86Only, Arch::X86) | (Tier::X64Subfolder, Arch::X86) => Ok("node.exe"),
        (Tier::X64Subfolder, Arch::X64) => Ok("x64/node.exe"),
        (Tier::IoJs, Arch::X64) => Ok("win-x64/iojs.exe"),
        (Tier::IoJs, Arch::X86) => Ok("win-x86/iojs.exe"),
        (Tier::Node, Arch::X64) => Ok("win-x64/node.exe"),
        (Tier::Node, Arch::X86) => Ok("win-x86/node.exe"),
    }
}

/// Builds `<base>v<version>/<tier folder><exec>`. Tier 0 is rejected
/// before anything is composed.
pub fn resolve_url(registry: Registry, version: &ConcreteVersion, arch: Arch) -> Result<String> {
    let path = executable_path(version, arch)?;
    Ok(format!(
        "{}v{}/{}",
        registry.base_for(version.tier()),
        version.number(),
        path
    ))
}
