//! rdebrid Core - Real-Debrid client and download dispatcher
//!
//! This crate resolves hoster links and magnets through the Real-Debrid API
//! and fetches the resulting files with aria2c or a built-in HTTP
//! downloader. The loaded [`Config`] is passed in explicitly; nothing here
//! keeps global state.

mod api;
mod download;
mod error;
mod observer;
mod queue;
mod storage;

pub use api::*;
pub use download::*;
pub use error::*;
pub use observer::*;
pub use queue::*;
pub use storage::*;

use rdebrid_types::{Config, DownloaderKind};
use std::path::Path;
use tracing::info;

/// A configured session: one API client and one downloader for the run
pub struct RdebridCore {
    /// Real-Debrid API client bound to the configured token
    pub api: RealDebridClient,
    /// Downloader chosen for this run
    pub dispatcher: Dispatcher,
}

impl RdebridCore {
    /// Build a session from the loaded configuration.
    ///
    /// `downloader` overrides the configured preference for this run only.
    pub async fn new(
        config: &Config,
        downloader: Option<DownloaderKind>,
    ) -> Result<Self, RdebridError> {
        let api = RealDebridClient::new(config)?;

        let preference = downloader.or(config.preferred_downloader);
        let strategy = select_strategy(preference).await;
        info!("Downloader for this run: {}", strategy.kind());

        Ok(Self {
            api,
            dispatcher: Dispatcher::new(strategy)?,
        })
    }

    /// Assemble a session from parts (custom API root, fixed strategy)
    pub fn from_parts(api: RealDebridClient, dispatcher: Dispatcher) -> Self {
        Self { api, dispatcher }
    }

    pub fn strategy(&self) -> &Strategy {
        self.dispatcher.strategy()
    }

    /// Resolve and download every link in order
    pub async fn process_links(
        &self,
        links: &[String],
        dest_dir: &Path,
        observer: &dyn ProgressObserver,
    ) -> BatchReport {
        run_batch(links, &self.api, &self.dispatcher, dest_dir, observer).await
    }
}
