//! Progress hooks called by the resolver, dispatcher and batch pipeline

use crate::error::RdebridError;
use rdebrid_types::{LinkInput, ResolvedDownload, TorrentInfo};

/// Receives progress notifications.
///
/// Every hook has an empty default so frontends only implement what they
/// display.
pub trait ProgressObserver: Send + Sync {
    /// A link is about to be resolved
    fn link_started(&self, _index: usize, _total: usize, _link: &LinkInput) {}

    /// A link resolved into one or more downloads
    fn link_resolved(&self, _link: &LinkInput, _downloads: &[ResolvedDownload]) {}

    /// A polled torrent state, reported on every poll
    fn torrent_status(&self, _info: &TorrentInfo) {}

    /// A file transfer is starting; `total` is the expected byte count
    fn transfer_started(&self, _download: &ResolvedDownload, _total: Option<u64>) {}

    /// More bytes were written by the built-in HTTP downloader
    fn transfer_progress(&self, _bytes: u64) {}

    /// The current transfer ended, successfully or not
    fn transfer_finished(&self, _download: &ResolvedDownload, _ok: bool) {}

    /// Every download of a link was fetched
    fn link_completed(&self, _link: &LinkInput) {}

    /// A link could not be processed; `link` is the raw argument since it
    /// may not have parsed
    fn link_failed(&self, _link: &str, _error: &RdebridError) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}
