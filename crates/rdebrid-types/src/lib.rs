//! Shared types for rdebrid
//!
//! This crate contains the data structures passed between the core library
//! and the CLI: the persisted configuration, user-supplied links, and the
//! payloads returned by the Real-Debrid API.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Configuration
// ============================================================================

/// Persisted configuration, stored as a flat JSON object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub api_token: String,
    /// Downloader to use; `None` means aria2c when available, else HTTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_downloader: Option<DownloaderKind>,
}

impl Config {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            preferred_downloader: None,
        }
    }

    pub fn with_downloader(mut self, kind: Option<DownloaderKind>) -> Self {
        self.preferred_downloader = kind;
        self
    }

    /// A config is usable only if it carries a non-blank token
    pub fn has_token(&self) -> bool {
        !self.api_token.trim().is_empty()
    }
}

/// Which downloader the user prefers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloaderKind {
    Aria2c,
    Http,
}

impl DownloaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloaderKind::Aria2c => "aria2c",
            DownloaderKind::Http => "http",
        }
    }
}

impl fmt::Display for DownloaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Link Types
// ============================================================================

/// A link supplied on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkInput {
    /// A file-hoster URL, kept exactly as typed
    Direct { raw: String, url: url::Url },
    /// A `magnet:` URI
    Magnet(String),
}

impl LinkInput {
    /// Classify a raw argument. Returns `None` if it is neither a magnet
    /// nor an http(s) URL.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("magnet:")) {
            return Some(LinkInput::Magnet(raw.to_string()));
        }

        let url = url::Url::parse(raw).ok()?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Some(LinkInput::Direct {
                raw: raw.to_string(),
                url,
            }),
            _ => None,
        }
    }

    pub fn is_magnet(&self) -> bool {
        matches!(self, LinkInput::Magnet(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            LinkInput::Direct { raw, .. } => raw,
            LinkInput::Magnet(magnet) => magnet,
        }
    }

    /// Host of a direct link
    pub fn host(&self) -> Option<&str> {
        match self {
            LinkInput::Direct { url, .. } => url.host_str(),
            LinkInput::Magnet(_) => None,
        }
    }
}

impl fmt::Display for LinkInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A direct URL plus the metadata needed to fetch it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub url: String,
    pub filename: String,
    pub size: Option<u64>,
}

// ============================================================================
// API Payloads
// ============================================================================

/// Response of `POST /unrestrict/link`
#[derive(Debug, Clone, Deserialize)]
pub struct UnrestrictedLink {
    #[serde(default)]
    pub id: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub filesize: Option<u64>,
    pub download: String,
    #[serde(default)]
    pub host: Option<String>,
}

impl From<UnrestrictedLink> for ResolvedDownload {
    fn from(link: UnrestrictedLink) -> Self {
        Self {
            url: link.download,
            filename: link.filename,
            // The API reports 0 when it does not know the size
            size: link.filesize.filter(|s| *s > 0),
        }
    }
}

/// Response of `POST /torrents/addMagnet`
#[derive(Debug, Clone, Deserialize)]
pub struct AddedTorrent {
    pub id: String,
    #[serde(default)]
    pub uri: Option<String>,
}

/// Response of `GET /torrents/info/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct TorrentInfo {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    pub status: TorrentStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub speed: Option<u64>,
    #[serde(default)]
    pub links: Vec<String>,
}

/// Lifecycle of a torrent on the Real-Debrid side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    MagnetError,
    MagnetConversion,
    WaitingFilesSelection,
    Queued,
    Downloading,
    Downloaded,
    Error,
    Virus,
    Compressing,
    Uploading,
    Dead,
    #[serde(other)]
    Other,
}

impl TorrentStatus {
    /// The torrent will never become downloadable
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            TorrentStatus::MagnetError | TorrentStatus::Error | TorrentStatus::Virus | TorrentStatus::Dead
        )
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, TorrentStatus::Downloaded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::MagnetError => "magnet_error",
            TorrentStatus::MagnetConversion => "magnet_conversion",
            TorrentStatus::WaitingFilesSelection => "waiting_files_selection",
            TorrentStatus::Queued => "queued",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Downloaded => "downloaded",
            TorrentStatus::Error => "error",
            TorrentStatus::Virus => "virus",
            TorrentStatus::Compressing => "compressing",
            TorrentStatus::Uploading => "uploading",
            TorrentStatus::Dead => "dead",
            TorrentStatus::Other => "unknown",
        }
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `GET /user`
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub expiration: Option<String>,
}

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_magnets_case_insensitively() {
        let link = LinkInput::parse("MAGNET:?xt=urn:btih:abc").unwrap();
        assert!(link.is_magnet());
        assert_eq!(link.as_str(), "MAGNET:?xt=urn:btih:abc");
    }

    #[test]
    fn parses_http_links() {
        let link = LinkInput::parse(" https://host.example/file/abc ").unwrap();
        assert!(!link.is_magnet());
        assert_eq!(link.as_str(), "https://host.example/file/abc");
        assert_eq!(link.host(), Some("host.example"));
    }

    #[test]
    fn direct_links_keep_the_typed_form() {
        let link = LinkInput::parse("https://host.example").unwrap();
        assert_eq!(link.as_str(), "https://host.example");

        let link = LinkInput::parse("https://bücher.example/Datei?x=1").unwrap();
        assert_eq!(link.as_str(), "https://bücher.example/Datei?x=1");
        assert_eq!(link.host(), Some("xn--bcher-kva.example"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(LinkInput::parse("ftp://host.example/file").is_none());
        assert!(LinkInput::parse("not a link").is_none());
        assert!(LinkInput::parse("").is_none());
    }

    #[test]
    fn config_omits_missing_downloader() {
        let json = serde_json::to_string(&Config::new("tok")).unwrap();
        assert_eq!(json, r#"{"api_token":"tok"}"#);

        let cfg: Config =
            serde_json::from_str(r#"{"api_token":"tok","preferred_downloader":"http","extra":1}"#)
                .unwrap();
        assert_eq!(cfg.preferred_downloader, Some(DownloaderKind::Http));
    }

    #[test]
    fn blank_token_is_not_usable() {
        assert!(!Config::new("   ").has_token());
        assert!(Config::new("abc").has_token());
    }

    #[test]
    fn unknown_torrent_status_is_other() {
        let info: TorrentInfo = serde_json::from_str(
            r#"{"id":"X","filename":"f","status":"something_new","progress":0,"links":[]}"#,
        )
        .unwrap();
        assert_eq!(info.status, TorrentStatus::Other);
        assert!(!info.status.is_failed());
    }

    #[test]
    fn zero_filesize_becomes_unknown() {
        let link: UnrestrictedLink = serde_json::from_str(
            r#"{"filename":"a.bin","filesize":0,"download":"https://dl.example/a.bin"}"#,
        )
        .unwrap();
        let resolved = ResolvedDownload::from(link);
        assert_eq!(resolved.size, None);
    }
}
