//! Remote version index access.

use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use tracing::debug;

use crate::error::{Error, Result};
use crate::utils::version::ConcreteVersion;

/// A response as seen by the pipeline: status, optional length, body stream.
pub struct Fetched {
    pub status: u16,
    pub len: Option<u64>,
    pub body: Box<dyn Read>,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into an error.
    pub fn ok(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::HttpStatus {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

pub trait Transport {
    fn get(&self, url: &str) -> Result<Fetched>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| Error::Transport {
                url: "(client setup)".to_string(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Fetched> {
        debug!(url, "GET");
        let resp = self.client.get(url).send().map_err(|source| Error::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(Fetched {
            status: resp.status().as_u16(),
            len: resp.content_length(),
            body: Box::new(resp),
        })
    }
}

/// Feeds each line (without its terminator) and its 1-based number to
/// `visit` until `visit` returns `true` or the stream ends.
pub fn scan_lines<R, F>(reader: R, mut visit: F) -> std::io::Result<()>
where
    R: Read,
    F: FnMut(&str, usize) -> bool,
{
    let reader = BufReader::new(reader);
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if visit(line.trim_end_matches('\r'), idx + 1) {
            break;
        }
    }
    Ok(())
}

/// One row of a registry `index.json`.
#[derive(Debug, Clone, Deserialize)]
struct IndexEntry {
    version: String,
    #[serde(default)]
    npm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDetail {
    pub node: String,
    pub npm: Option<String>,
}

pub struct RegistryClient<T: Transport> {
    transport: T,
}

impl<T: Transport> RegistryClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reads the latest version from line 1 of a `SHASUMS256.txt` listing,
    /// e.g. `<sha>  node-v16.2.0-aix-ppc64.tar.gz`.
    pub fn fetch_latest(&self, url: &str) -> Result<ConcreteVersion> {
        let fetched = self.transport.get(url)?.ok(url)?;

        let mut first: Option<String> = None;
        scan_lines(fetched.body, |line, number| {
            if number == 1 {
                first = Some(line.to_string());
            }
            true
        })
        .map_err(|e| Error::malformed(url, e.to_string()))?;

        let line = first
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::malformed(url, "empty listing"))?;
        let file = line
            .split("  ")
            .nth(1)
            .ok_or_else(|| Error::malformed(url, "missing file column"))?;
        let tag = file
            .split('-')
            .nth(1)
            .filter(|t| t.len() >= 2)
            .ok_or_else(|| Error::malformed(url, "missing version segment"))?;

        let version = ConcreteVersion::parse(tag)
            .map_err(|_| Error::malformed(url, format!("'{tag}' is not a version")))?;
        debug!(%version, url, "resolved latest");
        Ok(version)
    }

    fn fetch_index(&self, url: &str) -> Result<Vec<IndexEntry>> {
        let fetched = self.transport.get(url)?.ok(url)?;
        serde_json::from_reader(fetched.body).map_err(|e| Error::malformed(url, e.to_string()))
    }

    /// All versions of an index, in document order, without the `v` prefix.
    pub fn fetch_versions(&self, url: &str) -> Result<Vec<VersionDetail>> {
        Ok(self
            .fetch_index(url)?
            .into_iter()
            .map(|entry| VersionDetail {
                node: entry.version.trim_start_matches('v').to_string(),
                npm: entry.npm,
            })
            .collect())
    }

    pub fn fetch_detail_by_version(&self, url: &str, version: &str) -> Result<VersionDetail> {
        let wanted = version.trim_start_matches('v');
        self.fetch_versions(url)?
            .into_iter()
            .find(|detail| detail.node == wanted)
            .ok_or_else(|| Error::NotFound {
                version: wanted.to_string(),
                url: url.to_string(),
            })
    }

    /// The `version` field of npm's own package document.
    pub fn fetch_latest_npm(&self, url: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct PackageJson {
            version: String,
        }

        let fetched = self.transport.get(url)?.ok(url)?;
        let package: PackageJson =
            serde_json::from_reader(fetched.body).map_err(|e| Error::malformed(url, e.to_string()))?;
        Ok(package.version)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    /// Serves canned bodies keyed by URL; anything else is a 404.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub(crate) routes: HashMap<String, Vec<u8>>,
    }

    impl FakeTransport {
        pub(crate) fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.routes.insert(url.to_string(), body.into());
            self
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> Result<Fetched> {
            match self.routes.get(url) {
                Some(body) => Ok(Fetched {
                    status: 200,
                    len: Some(body.len() as u64),
                    body: Box::new(Cursor::new(body.clone())),
                }),
                None => Ok(Fetched {
                    status: 404,
                    len: None,
                    body: Box::new(std::io::empty()),
                }),
            }
        }
    }

    const INDEX: &str = r#"[
        {"version":"v16.2.0","date":"2021-05-19","npm":"7.13.0"},
        {"version":"v5.9.0","date":"2016-03-16","npm":"3.7.3"},
        {"version":"v0.10.22","date":"2013-11-12"}
    ]"#;

    #[test]
    fn latest_from_shasums() {
        let url = "https://nodejs.org/dist/latest/SHASUMS256.txt";
        let client = RegistryClient::new(FakeTransport::default().with(
            url,
            "abc123  node-v16.2.0-aix-ppc64.tar.gz\r\nabc124  node-v16.2.0-darwin-x64.tar.gz\n",
        ));
        assert_eq!(client.fetch_latest(url).unwrap(), ConcreteVersion::new(16, 2, 0));
    }

    #[test]
    fn latest_malformed_names_the_url() {
        let url = "https://mirror/latest/SHASUMS256.txt";
        let client = RegistryClient::new(FakeTransport::default().with(url, "<html>oops</html>\n"));
        match client.fetch_latest(url) {
            Err(Error::MalformedDocument { url: u, .. }) => assert_eq!(u, url),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_document_is_http_error() {
        let client = RegistryClient::new(FakeTransport::default());
        assert!(matches!(
            client.fetch_latest("https://nowhere/latest"),
            Err(Error::HttpStatus { status: 404, .. })
        ));
    }

    #[test]
    fn detail_by_version() {
        let url = "https://nodejs.org/dist/index.json";
        let client = RegistryClient::new(FakeTransport::default().with(url, INDEX));
        let detail = client.fetch_detail_by_version(url, "5.9.0").unwrap();
        assert_eq!(detail.node, "5.9.0");
        assert_eq!(detail.npm.as_deref(), Some("3.7.3"));

        let old = client.fetch_detail_by_version(url, "v0.10.22").unwrap();
        assert_eq!(old.npm, None);

        assert!(matches!(
            client.fetch_detail_by_version(url, "4.4.4"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn versions_keep_document_order() {
        let url = "https://nodejs.org/dist/index.json";
        let client = RegistryClient::new(FakeTransport::default().with(url, INDEX));
        let versions: Vec<String> = client
            .fetch_versions(url)
            .unwrap()
            .into_iter()
            .map(|d| d.node)
            .collect();
        assert_eq!(versions, ["16.2.0", "5.9.0", "0.10.22"]);
    }

    #[test]
    fn malformed_index() {
        let url = "https://nodejs.org/dist/index.json";
        let client = RegistryClient::new(FakeTransport::default().with(url, "[{\"version\": 5"));
        assert!(matches!(
            client.fetch_versions(url),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn latest_npm_version() {
        let client = RegistryClient::new(
            FakeTransport::default().with("https://npm/package.json", r#"{"name":"npm","version":"10.8.1"}"#),
        );
        assert_eq!(client.fetch_latest_npm("https://npm/package.json").unwrap(), "10.8.1");
    }

    #[test]
    fn scan_lines_stops_when_asked() {
        let mut seen = Vec::new();
        scan_lines(Cursor::new("a\nb\nc\n"), |line, n| {
            seen.push((line.to_string(), n));
            n == 2
        })
        .unwrap();
        assert_eq!(seen, [("a".to_string(), 1), ("b".to_string(), 2)]);
    }
}
