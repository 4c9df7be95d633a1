//! Terminal progress for resolution and downloads

use crate::output::{format_bytes, format_size, format_speed};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rdebrid_core::{ProgressObserver, RdebridError};
use rdebrid_types::{LinkInput, ResolvedDownload, TorrentInfo};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct State {
    /// Spinner shown while Real-Debrid fetches a torrent
    spinner: Option<ProgressBar>,
    /// Byte bar for the built-in downloader, created on the first chunk
    bar: Option<ProgressBar>,
    /// Expected size of the transfer that just started
    pending_total: Option<u64>,
}

/// Prints pipeline progress and drives indicatif bars
pub struct CliObserver {
    state: Mutex<State>,
}

impl CliObserver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Remove any bar still on screen
    pub fn clear(&self) {
        let mut state = self.lock();
        if let Some(spinner) = state.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(bar) = state.bar.take() {
            bar.abandon();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicked holder only leaves stale bars behind
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn new_bar(total: Option<u64>) -> ProgressBar {
        match total {
            Some(total) => {
                let pb = ProgressBar::new(total);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("  [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█▓▒░  "),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("  {spinner:.green} {bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        }
    }
}

impl Default for CliObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for CliObserver {
    fn link_started(&self, index: usize, total: usize, link: &LinkInput) {
        let action = if link.is_magnet() {
            "Adding magnet"
        } else {
            "Unrestricting"
        };
        println!(
            "{} [{}/{}] {}: {}",
            style("→").cyan().bold(),
            index + 1,
            total,
            action,
            style(link).dim()
        );
    }

    fn link_resolved(&self, link: &LinkInput, downloads: &[ResolvedDownload]) {
        if let Some(spinner) = self.lock().spinner.take() {
            spinner.finish_and_clear();
        }
        if link.is_magnet() {
            println!("  Ready. {} file(s) to download.", downloads.len());
        }
    }

    fn torrent_status(&self, info: &TorrentInfo) {
        let mut state = self.lock();
        let spinner = state.spinner.get_or_insert_with(|| {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(120));
            println!(
                "  Torrent: {}",
                if info.filename.is_empty() { "Unknown" } else { info.filename.as_str() }
            );
            pb
        });

        let speed = info.speed.map(format_speed).unwrap_or_default();
        spinner.set_message(format!(
            "Status: {} | {:.0}% | {}",
            info.status, info.progress, speed
        ));
    }

    fn transfer_started(&self, download: &ResolvedDownload, total: Option<u64>) {
        println!(
            "  Downloading: {} ({})",
            style(&download.filename).bold(),
            format_size(total)
        );
        let mut state = self.lock();
        state.pending_total = total;
        state.bar = None;
    }

    fn transfer_progress(&self, bytes: u64) {
        let mut state = self.lock();
        let total = state.pending_total;
        let bar = state.bar.get_or_insert_with(|| Self::new_bar(total));
        bar.inc(bytes);
    }

    fn transfer_finished(&self, download: &ResolvedDownload, ok: bool) {
        let bar = self.lock().bar.take();
        match (bar, ok) {
            (Some(bar), true) => bar.finish_and_clear(),
            (Some(bar), false) => bar.abandon(),
            (None, _) => {}
        }
        if ok {
            println!(
                "  {} {}{}",
                style("✓").green().bold(),
                download.filename,
                download
                    .size
                    .map(|s| format!(" ({})", format_bytes(s)))
                    .unwrap_or_default()
            );
        }
    }

    fn link_completed(&self, _link: &LinkInput) {
        println!();
    }

    fn link_failed(&self, link: &str, error: &RdebridError) {
        self.clear();
        println!(
            "  {} {}: {}",
            style("✗").red().bold(),
            link,
            style(error).red()
        );
        println!();
    }
}
