//! Error types for rdebrid core

use thiserror::Error;

/// Errors that can occur while resolving or downloading a link
#[derive(Debug, Error)]
pub enum RdebridError {
    #[error("No API token configured. Run `rdebrid --setup` first")]
    NotConfigured,

    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Unsupported or unavailable host: {0}")]
    UnsupportedHost(String),

    #[error("Rate limited by Real-Debrid, try again later")]
    RateLimited,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Not a magnet or http(s) link: {0}")]
    InvalidLink(String),

    #[error("Unexpected API response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RdebridError {
    /// Classify a non-2xx API response.
    ///
    /// HTTP 401/403/429 win over the body; otherwise the Real-Debrid
    /// `error_code` decides.
    pub fn from_api(status: u16, message: String, error_code: Option<i64>) -> Self {
        match status {
            401 | 403 => return RdebridError::Auth { status, message },
            429 => return RdebridError::RateLimited,
            _ => {}
        }

        match error_code {
            // bad_token, permission_denied
            Some(8) | Some(9) => RdebridError::Auth { status, message },
            // slow_down, too_many_requests
            Some(5) | Some(34) => RdebridError::RateLimited,
            // hoster_unsupported .. hoster_not_free, unavailable_file,
            // file_not_allowed .. torrent_file_invalid, infringing_file
            Some(16..=20) | Some(24) | Some(28..=30) | Some(35) => {
                RdebridError::UnsupportedHost(message)
            }
            _ => RdebridError::Api { status, message },
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RdebridError::RateLimited)
    }
}

impl From<serde_json::Error> for RdebridError {
    fn from(error: serde_json::Error) -> Self {
        RdebridError::Serialization(error.to_string())
    }
}
