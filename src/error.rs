use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which extraction step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveErrorKind {
    OpenFailed,
    EntryOpenFailed,
    WriteFailed,
    CopyFailed,
}

impl fmt::Display for ArchiveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArchiveErrorKind::OpenFailed => "could not open archive",
            ArchiveErrorKind::EntryOpenFailed => "could not open archive entry",
            ArchiveErrorKind::WriteFailed => "could not create destination",
            ArchiveErrorKind::CopyFailed => "could not copy entry bytes",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{0}' is not a valid version expression, use latest, N.N.N, a wildcard such as 5.x.x or /regex/")]
    InvalidExpression(String),

    #[error("'{value}' is not a valid {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid version pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("{url} format error: {reason}, please change registry")]
    MalformedDocument { url: String, reason: String },

    #[error("version {version} not found in {url}")]
    NotFound { version: String, url: String },

    #[error("Node.js {0} is not supported, no Windows executable was published for it")]
    UnsupportedVersion(String),

    #[error("Node.js {version} has no {arch} build")]
    UnsupportedArch { version: String, arch: String },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{kind}: {}", path.display())]
    Archive {
        kind: ArchiveErrorKind,
        path: PathBuf,
        #[source]
        source: BoxedSource,
    },

    #[error("{op} {} failed", path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no global node executable found in {}, install one first with 'spark-nvm install latest --use'", .0.display())]
    GlobalNodeMissing(PathBuf),
}

impl Error {
    pub fn archive(
        kind: ArchiveErrorKind,
        path: impl Into<PathBuf>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Error::Archive {
            kind,
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Error::MalformedDocument {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Archive error kind, if this is an extraction failure.
    pub fn archive_kind(&self) -> Option<ArchiveErrorKind> {
        match self {
            Error::Archive { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
