//! Version expressions, concrete versions and capability tiers.
//!
//! A user expression is one of:
//! - `latest` - the newest release published by the registry
//! - `global` - whatever the global node executable reports
//! - `5.9.0`, `5.9.0-x86` - exact version, optional arch suffix
//! - `*.*.*`, `5.x.x`, `0.10.*` - wildcards (`x` and `*` are interchangeable)
//! - `/^5\.1\.\d+$/` - a raw regex

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{Error, Result};

pub const LATEST: &str = "latest";
pub const GLOBAL: &str = "global";

/// Regex fragment for a single wildcard version component.
const COMPONENT: &str = r"(0|[1-9]\d?)";

fn exact_grammar() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^v?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-([0-9a-z]+))?$")
            .expect("static regex")
    })
}

fn wildcard_grammar() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[x*]\.[x*]\.[x*]|(0|[1-9]\d*)\.[x*]\.[x*]|(0|[1-9]\d*)\.(0|[1-9]\d*)\.[x*])$")
            .expect("static regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86,
    X64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X64 => "x64",
        }
    }

    pub fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            Arch::X64
        } else {
            Arch::X86
        }
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "386" => Ok(Arch::X86),
            "x64" | "amd64" => Ok(Arch::X64),
            _ => Err(Error::InvalidValue {
                key: "arch",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which binary layout a version band was published with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// No Windows executable at all.
    Unsupported = 0,
    /// `node.exe` at the version root, x86 only.
    X86Only = 1,
    /// x86 `node.exe` at the root, x64 under `x64/`.
    X64Subfolder = 2,
    /// `iojs.exe` under `win-x64/` and `win-x86/`.
    IoJs = 3,
    /// `node.exe` under `win-x64/` and `win-x86/`.
    Node = 4,
}

impl Tier {
    /// Buckets the `major.MMPP` float encoding of a version.
    pub fn from_level(level: f64) -> Self {
        if level <= 0.05 {
            Tier::Unsupported
        } else if level <= 0.0612 {
            Tier::X86Only
        } else if level < 1.0 {
            Tier::X64Subfolder
        } else if level <= 3.0301 {
            Tier::IoJs
        } else {
            Tier::Node
        }
    }
}

/// A fully qualified `N.N.N` version, optionally pinned to an arch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub arch: Option<Arch>,
}

impl ConcreteVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            arch: None,
        }
    }

    /// Parses `N.N.N` with an optional leading `v` and `-<arch>` suffix.
    /// Unknown suffixes are accepted and dropped.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let lowered = input.to_ascii_lowercase();
        let caps = exact_grammar()
            .captures(&lowered)
            .ok_or_else(|| Error::InvalidExpression(input.to_string()))?;

        let component = |i: usize| -> Result<u64> {
            caps[i]
                .parse()
                .map_err(|_| Error::InvalidExpression(input.to_string()))
        };

        let mut version = Self::new(component(1)?, component(2)?, component(3)?);
        version.arch = caps.get(4).and_then(|m| m.as_str().parse().ok());
        Ok(version)
    }

    /// The bare `N.N.N` form, without arch suffix.
    pub fn number(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// Encodes the version as `major.MMPP`, e.g. 0.6.12 -> 0.0612.
    pub fn level(&self) -> f64 {
        format!("{}.{:02}{:02}", self.major, self.minor, self.patch)
            .parse()
            .unwrap_or(0.0)
    }

    pub fn tier(&self) -> Tier {
        Tier::from_level(self.level())
    }

    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    /// Name of the folder this version is installed into under the root.
    /// x64 is the unsuffixed default.
    pub fn folder_name(&self) -> String {
        match self.arch {
            Some(Arch::X86) => format!("{}-x86", self.number()),
            _ => self.number(),
        }
    }
}

impl fmt::Display for ConcreteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arch {
            Some(arch) => write!(f, "{}-{}", self.number(), arch),
            None => f.write_str(&self.number()),
        }
    }
}

/// Raw user input, classified but not compiled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionExpr {
    Latest,
    Global,
    Exact(ConcreteVersion),
    Wildcard {
        major: Option<u64>,
        minor: Option<u64>,
    },
    Regex(String),
}

impl VersionExpr {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            return Ok(VersionExpr::Regex(raw[1..raw.len() - 1].to_string()));
        }

        let lowered = raw.to_ascii_lowercase();
        match lowered.as_str() {
            LATEST => return Ok(VersionExpr::Latest),
            GLOBAL => return Ok(VersionExpr::Global),
            _ => {}
        }

        if let Ok(version) = ConcreteVersion::parse(&lowered) {
            return Ok(VersionExpr::Exact(version));
        }

        if let Some(caps) = wildcard_grammar().captures(&lowered) {
            let num = |m: Option<regex::Match<'_>>| -> Option<u64> { m.and_then(|m| m.as_str().parse().ok()) };
            let (major, minor) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(major), _, _) => (num(Some(major)), None),
                (None, Some(major), Some(minor)) => (num(Some(major)), num(Some(minor))),
                _ => (None, None),
            };
            return Ok(VersionExpr::Wildcard { major, minor });
        }

        Err(Error::InvalidExpression(raw.to_string()))
    }
}

/// A compiled matching predicate.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    regex: Regex,
    source: String,
}

impl VersionSpec {
    /// Compiles an expression. `latest` is resolved only when needed; `global`
    /// has no meaning for a remote listing and is rejected.
    pub fn compile<F>(expr: &VersionExpr, resolve_latest: F) -> Result<Self>
    where
        F: FnOnce() -> Result<ConcreteVersion>,
    {
        let (pattern, source) = match expr {
            VersionExpr::Latest => {
                let version = resolve_latest()?;
                (exact_pattern(&version), version.number())
            }
            VersionExpr::Global => return Err(Error::InvalidExpression(GLOBAL.to_string())),
            VersionExpr::Exact(version) => (exact_pattern(version), version.to_string()),
            VersionExpr::Regex(pattern) => (pattern.clone(), format!("/{pattern}/")),
            VersionExpr::Wildcard { major, minor } => {
                let pattern = match (major, minor) {
                    (Some(major), Some(minor)) => format!(r"^{major}\.{minor}\.{COMPONENT}$"),
                    (Some(major), None) => format!(r"^{major}(\.{COMPONENT}){{2}}$"),
                    _ => format!(r"^{COMPONENT}(\.{COMPONENT}){{2}}$"),
                };
                let source = match (major, minor) {
                    (Some(major), Some(minor)) => format!("{major}.{minor}.x"),
                    (Some(major), None) => format!("{major}.x.x"),
                    _ => "x.x.x".to_string(),
                };
                (pattern, source)
            }
        };

        Ok(Self {
            regex: Regex::new(&pattern)?,
            source,
        })
    }

    pub fn is_match(&self, version: &str) -> bool {
        self.regex.is_match(version)
    }

    /// Keeps matching candidates in their original order.
    pub fn filter<'a, I>(&self, candidates: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|candidate| self.is_match(candidate))
            .collect()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

fn exact_pattern(version: &ConcreteVersion) -> String {
    format!("^{}$", regex::escape(&version.number()))
}

/// `normalize(expr, latest)` in one step.
pub fn normalize<F>(raw: &str, resolve_latest: F) -> Result<VersionSpec>
where
    F: FnOnce() -> Result<ConcreteVersion>,
{
    VersionSpec::compile(&VersionExpr::parse(raw)?, resolve_latest)
}
