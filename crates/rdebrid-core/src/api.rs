//! Real-Debrid REST client
//!
//! Exchanges hoster links and magnets for direct download URLs:
//! - Direct links go through `POST /unrestrict/link`
//! - Magnets are added, all files selected, and the torrent polled until
//!   Real-Debrid has it cached; each resulting link is then unrestricted
//! - A rate-limited request is retried once after a fixed delay

use crate::error::RdebridError;
use crate::observer::ProgressObserver;
use rdebrid_types::{
    AddedTorrent, ApiErrorBody, Config, LinkInput, ResolvedDownload, TorrentInfo, TorrentStatus,
    UnrestrictedLink, UserInfo,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Delay between torrent status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Delay before the single retry of a rate-limited request
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);

/// Client bound to one API token
#[derive(Debug, Clone)]
pub struct RealDebridClient {
    client: Client,
    base_url: String,
    token: String,
    poll_interval: Duration,
    rate_limit_delay: Duration,
}

impl RealDebridClient {
    /// Build a client for the token in `config`
    pub fn new(config: &Config) -> Result<Self, RdebridError> {
        if !config.has_token() {
            return Err(RdebridError::NotConfigured);
        }

        let client = Client::builder()
            .user_agent(concat!("rdebrid/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: config.api_token.trim().to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
        })
    }

    /// Point the client at another API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// `GET /user`, used to validate a token during setup
    pub async fn user(&self) -> Result<UserInfo, RdebridError> {
        let response = self
            .send(|| self.client.get(self.endpoint("/user")))
            .await?;
        parse_json(response).await
    }

    /// `POST /unrestrict/link`: one hoster link to one direct download
    pub async fn unrestrict_link(&self, link: &str) -> Result<ResolvedDownload, RdebridError> {
        debug!("Unrestricting {}", link);
        let response = self
            .send(|| {
                self.client
                    .post(self.endpoint("/unrestrict/link"))
                    .form(&[("link", link)])
            })
            .await?;

        let unrestricted: UnrestrictedLink = parse_json(response).await?;
        if unrestricted.download.is_empty() {
            return Err(RdebridError::InvalidResponse(format!(
                "no download URL returned for {link}"
            )));
        }

        Ok(unrestricted.into())
    }

    /// `POST /torrents/addMagnet`
    pub async fn add_magnet(&self, magnet: &str) -> Result<AddedTorrent, RdebridError> {
        let response = self
            .send(|| {
                self.client
                    .post(self.endpoint("/torrents/addMagnet"))
                    .form(&[("magnet", magnet)])
            })
            .await
            .map_err(|e| match e {
                // Any other refusal of the magnet means the host will not take it
                RdebridError::Api { message, .. } => RdebridError::UnsupportedHost(message),
                other => other,
            })?;

        parse_json(response).await
    }

    /// `GET /torrents/info/{id}`
    pub async fn torrent_info(&self, id: &str) -> Result<TorrentInfo, RdebridError> {
        let path = format!("/torrents/info/{id}");
        let response = self
            .send(|| self.client.get(self.endpoint(&path)))
            .await?;
        parse_json(response).await
    }

    /// `POST /torrents/selectFiles/{id}` with `files=all`
    pub async fn select_all_files(&self, id: &str) -> Result<(), RdebridError> {
        let path = format!("/torrents/selectFiles/{id}");
        self.send(|| {
            self.client
                .post(self.endpoint(&path))
                .form(&[("files", "all")])
        })
        .await?;
        Ok(())
    }

    /// Poll a torrent until it is downloaded on the Real-Debrid side,
    /// selecting all files when asked to.
    pub async fn wait_for_torrent(
        &self,
        id: &str,
        observer: &dyn ProgressObserver,
    ) -> Result<TorrentInfo, RdebridError> {
        let mut selected = false;

        loop {
            let info = self.torrent_info(id).await?;
            observer.torrent_status(&info);
            debug!(
                "Torrent {}: status={} progress={}",
                id, info.status, info.progress
            );

            if info.status.is_ready() {
                return Ok(info);
            }
            if info.status.is_failed() {
                return Err(RdebridError::UnsupportedHost(format!(
                    "torrent '{}' ended with status '{}'",
                    display_name(&info),
                    info.status
                )));
            }
            if info.status == TorrentStatus::WaitingFilesSelection && !selected {
                info!("Selecting all files of torrent {}", id);
                self.select_all_files(id).await?;
                selected = true;
                continue;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Resolve any link into its direct downloads
    pub async fn unrestrict(
        &self,
        link: &LinkInput,
        observer: &dyn ProgressObserver,
    ) -> Result<Vec<ResolvedDownload>, RdebridError> {
        match link {
            LinkInput::Direct { raw, .. } => {
                debug!("Unrestricting link on {}", link.host().unwrap_or("unknown host"));
                Ok(vec![self.unrestrict_link(raw).await?])
            }
            LinkInput::Magnet(magnet) => self.unrestrict_magnet(magnet, observer).await,
        }
    }

    async fn unrestrict_magnet(
        &self,
        magnet: &str,
        observer: &dyn ProgressObserver,
    ) -> Result<Vec<ResolvedDownload>, RdebridError> {
        let added = self.add_magnet(magnet).await?;
        info!("Added magnet as torrent {}", added.id);

        let torrent = self.wait_for_torrent(&added.id, observer).await?;
        info!(
            "Torrent {} ready with {} link(s)",
            torrent.id,
            torrent.links.len()
        );

        let mut downloads = Vec::with_capacity(torrent.links.len());
        for link in &torrent.links {
            downloads.push(self.unrestrict_link(link).await?);
        }
        Ok(downloads)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request, retrying once if rate limited
    async fn send<F>(&self, build: F) -> Result<Response, RdebridError>
    where
        F: Fn() -> RequestBuilder,
    {
        match self.send_once(&build).await {
            Err(e) if e.is_rate_limited() => {
                warn!(
                    "Rate limited by Real-Debrid, retrying in {:?}",
                    self.rate_limit_delay
                );
                tokio::time::sleep(self.rate_limit_delay).await;
                self.send_once(&build).await
            }
            other => other,
        }
    }

    async fn send_once<F>(&self, build: &F) -> Result<Response, RdebridError>
    where
        F: Fn() -> RequestBuilder,
    {
        let response = build().bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let (message, error_code) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => (err.error, err.error_code),
            Err(_) => (
                status.canonical_reason().unwrap_or("Unknown").to_string(),
                None,
            ),
        };

        debug!("API error {}: {} (code {:?})", code, message, error_code);
        Err(RdebridError::from_api(code, message, error_code))
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, RdebridError> {
    let url = response.url().path().to_string();
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| RdebridError::InvalidResponse(format!("{url}: {e}")))
}

fn display_name(info: &TorrentInfo) -> &str {
    if info.filename.is_empty() {
        &info.id
    } else {
        &info.filename
    }
}
