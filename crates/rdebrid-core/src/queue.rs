//! Batch processing of command-line links
//!
//! Links run one after another: resolve, then fetch every resulting file.
//! A failing link is recorded and the batch moves on.

use crate::api::RealDebridClient;
use crate::download::Dispatcher;
use crate::error::RdebridError;
use crate::observer::ProgressObserver;
use async_trait::async_trait;
use rdebrid_types::{LinkInput, ResolvedDownload};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Turns a link into direct downloads
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        link: &LinkInput,
        observer: &dyn ProgressObserver,
    ) -> Result<Vec<ResolvedDownload>, RdebridError>;
}

/// Writes a resolved download to disk
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        download: &ResolvedDownload,
        dest_dir: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<PathBuf, RdebridError>;
}

#[async_trait]
impl Resolver for RealDebridClient {
    async fn resolve(
        &self,
        link: &LinkInput,
        observer: &dyn ProgressObserver,
    ) -> Result<Vec<ResolvedDownload>, RdebridError> {
        self.unrestrict(link, observer).await
    }
}

#[async_trait]
impl Fetcher for Dispatcher {
    async fn fetch(
        &self,
        download: &ResolvedDownload,
        dest_dir: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<PathBuf, RdebridError> {
        Dispatcher::fetch(self, download, dest_dir, observer).await
    }
}

/// A link whose files were all written
#[derive(Debug)]
pub struct CompletedLink {
    pub link: String,
    pub files: Vec<PathBuf>,
}

/// A link that failed at some stage
#[derive(Debug)]
pub struct FailedLink {
    pub link: String,
    pub error: RdebridError,
}

/// Outcome of a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<CompletedLink>,
    pub failed: Vec<FailedLink>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Process exit code: 0 only if every link succeeded
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Resolve and fetch each link in order
pub async fn run_batch<R, F>(
    links: &[String],
    resolver: &R,
    fetcher: &F,
    dest_dir: &Path,
    observer: &dyn ProgressObserver,
) -> BatchReport
where
    R: Resolver + ?Sized,
    F: Fetcher + ?Sized,
{
    let mut report = BatchReport::default();
    let total = links.len();

    for (index, raw) in links.iter().enumerate() {
        match process_link(index, total, raw, resolver, fetcher, dest_dir, observer).await {
            Ok(files) => {
                info!("Link {} done ({} file(s))", raw, files.len());
                report.completed.push(CompletedLink {
                    link: raw.clone(),
                    files,
                });
            }
            Err(error) => {
                warn!("Link {} failed: {}", raw, error);
                observer.link_failed(raw, &error);
                report.failed.push(FailedLink {
                    link: raw.clone(),
                    error,
                });
            }
        }
    }

    report
}

async fn process_link<R, F>(
    index: usize,
    total: usize,
    raw: &str,
    resolver: &R,
    fetcher: &F,
    dest_dir: &Path,
    observer: &dyn ProgressObserver,
) -> Result<Vec<PathBuf>, RdebridError>
where
    R: Resolver + ?Sized,
    F: Fetcher + ?Sized,
{
    let link = LinkInput::parse(raw).ok_or_else(|| RdebridError::InvalidLink(raw.to_string()))?;
    observer.link_started(index, total, &link);

    let downloads = resolver.resolve(&link, observer).await?;
    observer.link_resolved(&link, &downloads);

    // Keep going through a torrent's files; report the first failure
    let mut files = Vec::with_capacity(downloads.len());
    let mut first_error = None;
    for download in &downloads {
        match fetcher.fetch(download, dest_dir, observer).await {
            Ok(path) => files.push(path),
            Err(e) => {
                warn!("Fetching {} failed: {}", download.filename, e);
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }

    observer.link_completed(&link);
    Ok(files)
}
