//! Download dispatcher
//!
//! Key principles:
//! - The downloader is picked once per run: aria2c on PATH, else a
//!   best-effort install, else the built-in HTTP downloader
//! - aria2c runs as a child process; its exit code is the result
//! - The HTTP fallback is a single sequential stream straight to disk
//! - The child process is killed if the fetch is abandoned

use crate::error::RdebridError;
use crate::observer::ProgressObserver;
use futures::StreamExt;
use rdebrid_types::{DownloaderKind, ResolvedDownload};
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Name of the external multi-connection downloader
pub const ARIA2C: &str = "aria2c";

/// Connections per server and splits handed to aria2c
pub const ARIA2C_CONNECTIONS: u32 = 16;

/// How a resolved download is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Run the aria2c binary at this path
    External(PathBuf),
    /// Stream the file with the built-in HTTP client
    Http,
}

impl Strategy {
    pub fn kind(&self) -> DownloaderKind {
        match self {
            Strategy::External(_) => DownloaderKind::Aria2c,
            Strategy::Http => DownloaderKind::Http,
        }
    }
}

// ============================================================================
// Strategy Selection
// ============================================================================

/// Pick the downloader for this run.
///
/// An `http` preference skips the probe. Otherwise aria2c is looked up on
/// PATH, installed if missing and the platform allows it, and the HTTP
/// downloader is used when both fail.
pub async fn select_strategy(preference: Option<DownloaderKind>) -> Strategy {
    select_strategy_with(preference, probe_aria2c, install_aria2c).await
}

async fn select_strategy_with<P, I, Fut>(
    preference: Option<DownloaderKind>,
    probe: P,
    install: I,
) -> Strategy
where
    P: Fn() -> Option<PathBuf>,
    I: FnOnce() -> Fut,
    Fut: Future<Output = bool>,
{
    if preference == Some(DownloaderKind::Http) {
        debug!("HTTP downloader requested, not probing for {}", ARIA2C);
        return Strategy::Http;
    }

    if let Some(path) = probe() {
        info!("Using {} at {}", ARIA2C, path.display());
        return Strategy::External(path);
    }

    warn!("{} not found on PATH, attempting install", ARIA2C);
    if install().await {
        if let Some(path) = probe() {
            info!("Installed {} at {}", ARIA2C, path.display());
            return Strategy::External(path);
        }
        warn!("{} was installed but is not on PATH yet", ARIA2C);
    }

    warn!("Falling back to the built-in HTTP downloader");
    Strategy::Http
}

/// Look for aria2c on PATH
pub fn probe_aria2c() -> Option<PathBuf> {
    which::which(ARIA2C).ok()
}

/// Best-effort aria2c install. Returns true if the installer succeeded.
#[cfg(windows)]
pub async fn install_aria2c() -> bool {
    info!("Installing aria2 via winget");
    let result = Command::new("winget")
        .args([
            "install",
            "aria2.aria2",
            "--accept-source-agreements",
            "--accept-package-agreements",
        ])
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            warn!("winget exited with {}", output.status);
            false
        }
        Err(e) => {
            warn!("Could not run winget: {}", e);
            false
        }
    }
}

/// Best-effort aria2c install. Returns true if the installer succeeded.
#[cfg(not(windows))]
pub async fn install_aria2c() -> bool {
    // Installing here would need root or an interactive package manager
    debug!("No automatic {} install on this platform", ARIA2C);
    false
}

/// How the user can install aria2c by hand on this platform
pub fn install_hint() -> &'static str {
    if cfg!(windows) {
        "winget install aria2.aria2  (or: choco install aria2)"
    } else if cfg!(target_os = "macos") {
        "brew install aria2"
    } else {
        "sudo apt install aria2  (or your package manager)"
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Fetches resolved downloads with the selected strategy
#[derive(Debug, Clone)]
pub struct Dispatcher {
    strategy: Strategy,
    client: Client,
    connections: u32,
}

impl Dispatcher {
    pub fn new(strategy: Strategy) -> Result<Self, RdebridError> {
        let client = Client::builder()
            .user_agent(concat!("rdebrid/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            strategy,
            client,
            connections: ARIA2C_CONNECTIONS,
        })
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Download one file into `dest_dir`, returning the written path
    pub async fn fetch(
        &self,
        download: &ResolvedDownload,
        dest_dir: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<PathBuf, RdebridError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let filename = sanitize_filename(&download.filename);
        let target = dest_dir.join(&filename);

        let result = match &self.strategy {
            Strategy::External(aria2c) => {
                observer.transfer_started(download, download.size);
                self.fetch_external(aria2c, download, dest_dir, &filename)
                    .await
            }
            Strategy::Http => self
                .fetch_http(download, &target, observer)
                .await
                .map_err(|e| match e {
                    RdebridError::Network(e) => RdebridError::DownloadFailed(e.to_string()),
                    other => other,
                }),
        };
        observer.transfer_finished(download, result.is_ok());

        result.map(|_| target)
    }

    async fn fetch_external(
        &self,
        aria2c: &Path,
        download: &ResolvedDownload,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<(), RdebridError> {
        let args = aria2c_args(&download.url, dest_dir, filename, self.connections);
        debug!("Running {} {:?}", aria2c.display(), args);

        let status = Command::new(aria2c)
            .args(&args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                RdebridError::DownloadFailed(format!("could not start {}: {e}", aria2c.display()))
            })?;

        if status.success() {
            info!("{} finished {}", ARIA2C, filename);
            Ok(())
        } else {
            Err(RdebridError::DownloadFailed(format!(
                "{ARIA2C} exited with {status} for {filename}"
            )))
        }
    }

    async fn fetch_http(
        &self,
        download: &ResolvedDownload,
        target: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<(), RdebridError> {
        info!("Downloading {} to {}", download.url, target.display());

        let response = self.client.get(&download.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RdebridError::DownloadFailed(format!(
                "HTTP {} for {}",
                status.as_u16(),
                download.filename
            )));
        }

        let length = response.content_length();
        if let (Some(length), Some(size)) = (length, download.size) {
            if length != size {
                warn!(
                    "Server reports {} bytes for {}, API said {}",
                    length, download.filename, size
                );
            }
        }
        observer.transfer_started(download, download.size.or(length));

        let mut file = File::create(target).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            observer.transfer_progress(chunk.len() as u64);
        }

        file.flush().await?;
        file.sync_all().await?;

        info!("Wrote {} bytes to {}", written, target.display());
        Ok(())
    }
}

/// Command line for aria2c
pub fn aria2c_args(url: &str, dest_dir: &Path, filename: &str, connections: u32) -> Vec<String> {
    vec![
        "--file-allocation=none".to_string(),
        format!("--max-connection-per-server={connections}"),
        format!("--split={connections}"),
        "--min-split-size=1M".to_string(),
        "--summary-interval=0".to_string(),
        format!("--dir={}", dest_dir.display()),
        format!("--out={filename}"),
        url.to_string(),
    ]
}

/// Make an API-supplied filename safe to join onto the destination dir.
///
/// - Replaces path separators, NUL, control characters and characters
///   Windows rejects with `_`
/// - Trims leading/trailing spaces and dots
/// - Limits length to 255 bytes
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "download".to_string();
    }

    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CountingObserver {
        bytes: AtomicU64,
        totals: Mutex<Vec<Option<u64>>>,
        finished_ok: AtomicBool,
    }

    impl ProgressObserver for CountingObserver {
        fn transfer_started(&self, _download: &ResolvedDownload, total: Option<u64>) {
            self.totals.lock().unwrap().push(total);
        }

        fn transfer_progress(&self, bytes: u64) {
            self.bytes.fetch_add(bytes, Ordering::Relaxed);
        }

        fn transfer_finished(&self, _download: &ResolvedDownload, ok: bool) {
            self.finished_ok.store(ok, Ordering::Relaxed);
        }
    }

    fn never_probe() -> Option<PathBuf> {
        panic!("probe must not run")
    }

    async fn never_install() -> bool {
        panic!("install must not run")
    }

    #[tokio::test]
    async fn http_preference_skips_probe() {
        let strategy =
            select_strategy_with(Some(DownloaderKind::Http), never_probe, never_install).await;
        assert_eq!(strategy, Strategy::Http);
    }

    #[tokio::test]
    async fn aria2c_on_path_is_used() {
        let strategy = select_strategy_with(
            None,
            || Some(PathBuf::from("/usr/bin/aria2c")),
            never_install,
        )
        .await;
        assert_eq!(strategy, Strategy::External(PathBuf::from("/usr/bin/aria2c")));
        assert_eq!(strategy.kind(), DownloaderKind::Aria2c);
    }

    #[tokio::test]
    async fn installed_aria2c_is_used() {
        let probes = AtomicU64::new(0);
        let strategy = select_strategy_with(
            Some(DownloaderKind::Aria2c),
            || {
                if probes.fetch_add(1, Ordering::Relaxed) == 0 {
                    None
                } else {
                    Some(PathBuf::from("C:\\aria2\\aria2c.exe"))
                }
            },
            || async { true },
        )
        .await;
        assert_eq!(
            strategy,
            Strategy::External(PathBuf::from("C:\\aria2\\aria2c.exe"))
        );
    }

    #[tokio::test]
    async fn falls_back_to_http() {
        let strategy = select_strategy_with(None, || None, || async { false }).await;
        assert_eq!(strategy, Strategy::Http);

        // Install claims success but the binary still isn't visible
        let strategy = select_strategy_with(None, || None, || async { true }).await;
        assert_eq!(strategy, Strategy::Http);
    }

    #[test]
    fn aria2c_arguments() {
        let args = aria2c_args(
            "https://dl.example/f.bin",
            Path::new("/tmp/out"),
            "f.bin",
            ARIA2C_CONNECTIONS,
        );
        assert_eq!(
            args,
            [
                "--file-allocation=none",
                "--max-connection-per-server=16",
                "--split=16",
                "--min-split-size=1M",
                "--summary-interval=0",
                "--dir=/tmp/out",
                "--out=f.bin",
                "https://dl.example/f.bin",
            ]
        );
    }

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("a\\b:c?.mkv"), "a_b_c_.mkv");
        assert_eq!(sanitize_filename(" .hidden. "), "hidden");
        assert_eq!(sanitize_filename("..."), "download");
        assert_eq!(sanitize_filename("Movie (2024) 1080p.mkv"), "Movie (2024) 1080p.mkv");
        assert_eq!(sanitize_filename(&"é".repeat(200)).len(), 254);
    }

    #[tokio::test]
    async fn http_fallback_writes_file_matching_size() {
        let server = MockServer::start().await;
        let body = vec![7u8; 64 * 1024 + 13];
        Mock::given(method("GET"))
            .and(path("/d/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let download = ResolvedDownload {
            url: format!("{}/d/file.bin", server.uri()),
            filename: "file.bin".to_string(),
            size: Some(body.len() as u64),
        };

        let observer = CountingObserver::default();
        let dispatcher = Dispatcher::new(Strategy::Http).unwrap();
        let written = dispatcher
            .fetch(&download, &dir.path().join("sub"), &observer)
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("sub").join("file.bin"));
        let len = std::fs::metadata(&written).unwrap().len();
        assert_eq!(Some(len), download.size);
        assert_eq!(observer.bytes.load(Ordering::Relaxed), len);
        assert_eq!(*observer.totals.lock().unwrap(), vec![Some(len)]);
        assert!(observer.finished_ok.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn http_error_status_is_download_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let download = ResolvedDownload {
            url: format!("{}/d/missing.bin", server.uri()),
            filename: "missing.bin".to_string(),
            size: None,
        };

        let err = Dispatcher::new(Strategy::Http)
            .unwrap()
            .fetch(&download, dir.path(), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, RdebridError::DownloadFailed(ref m) if m.contains("404")));
        assert!(!dir.path().join("missing.bin").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_exit_code_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let download = ResolvedDownload {
            url: "https://dl.example/f.bin".to_string(),
            filename: "f.bin".to_string(),
            size: None,
        };

        let ok = Dispatcher::new(Strategy::External(PathBuf::from("true"))).unwrap();
        assert!(ok.fetch(&download, dir.path(), &NoopObserver).await.is_ok());

        let failing = Dispatcher::new(Strategy::External(PathBuf::from("false"))).unwrap();
        let err = failing
            .fetch(&download, dir.path(), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, RdebridError::DownloadFailed(_)));
    }

    #[tokio::test]
    async fn missing_external_binary_is_download_failed() {
        let dir = tempfile::tempdir().unwrap();
        let download = ResolvedDownload {
            url: "https://dl.example/f.bin".to_string(),
            filename: "f.bin".to_string(),
            size: None,
        };

        let dispatcher = Dispatcher::new(Strategy::External(PathBuf::from(
            "/nonexistent/rdebrid-test/aria2c",
        )))
        .unwrap();
        let err = dispatcher
            .fetch(&download, dir.path(), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, RdebridError::DownloadFailed(ref m) if m.contains("could not start")));
    }
}
