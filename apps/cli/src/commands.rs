//! CLI command implementations

use crate::output;
use crate::progress::CliObserver;
use anyhow::{anyhow, bail, Result};
use console::style;
use rdebrid_core::{
    install_hint, ConfigStore, RdebridCore, RdebridError, RealDebridClient, Strategy,
};
use rdebrid_types::{Config, DownloaderKind, LinkInput};
use std::path::Path;

/// Exit code after Ctrl-C, as shells report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

// ============================================================================
// Setup
// ============================================================================

pub async fn setup(store: &ConfigStore, token: Option<String>, api_url: Option<&str>) -> Result<()> {
    println!("{}", style("Real-Debrid Setup").bold());
    println!("{}", "=".repeat(40));
    println!();

    let interactive = token.is_none();
    let token = match token {
        Some(token) => token,
        None => {
            println!("Get your API token from: https://real-debrid.com/apitoken");
            println!();
            dialoguer::Password::new()
                .with_prompt("Enter your API token")
                .allow_empty_password(true)
                .interact()?
        }
    };

    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("No token entered. Aborting.");
    }

    println!("Validating token...");
    let mut client = RealDebridClient::new(&Config::new(token.as_str()))?;
    if let Some(url) = api_url {
        client = client.with_base_url(url);
    }

    let user = client.user().await.map_err(|e| match e {
        RdebridError::Auth { .. } => anyhow!("Invalid token. Please check and try again."),
        other => other.into(),
    })?;

    let downloader = if interactive {
        prompt_downloader()?
    } else {
        None
    };

    // Overwrites any previous config; the old token is never needed
    let config = Config::new(token).with_downloader(downloader);
    store.save(&config).await?;

    println!(
        "  Logged in as: {} ({})",
        style(&user.username).cyan(),
        if user.account_type.is_empty() { "free" } else { user.account_type.as_str() }
    );
    if let Some(ref expiration) = user.expiration {
        println!("  Premium until: {}", expiration);
    }
    println!("  Token saved to: {}", store.path().display());
    println!();
    println!("{} Setup complete!", style("✓").green().bold());

    Ok(())
}

fn prompt_downloader() -> Result<Option<DownloaderKind>> {
    let choices = [
        "auto (aria2c when available)",
        "aria2c",
        "http (built-in, single connection)",
    ];
    let selected = dialoguer::Select::new()
        .with_prompt("Preferred downloader")
        .items(&choices)
        .default(0)
        .interact()?;

    Ok(match selected {
        1 => Some(DownloaderKind::Aria2c),
        2 => Some(DownloaderKind::Http),
        _ => None,
    })
}

// ============================================================================
// Download
// ============================================================================

pub async fn download_links(
    store: &ConfigStore,
    links: &[String],
    dest_dir: &Path,
    downloader: Option<DownloaderKind>,
    api_url: Option<&str>,
) -> Result<i32> {
    let config = store.load().await?;
    tracing::debug!("Using config at {}", store.path().display());

    let mut core = RdebridCore::new(&config, downloader).await?;
    if let Some(url) = api_url {
        core.api = core.api.with_base_url(url);
    }

    let wanted = downloader.or(config.preferred_downloader);
    if *core.strategy() == Strategy::Http && wanted != Some(DownloaderKind::Http) {
        println!("{} aria2c not found.", style("!").yellow().bold());
        println!("  Install with: {}", install_hint());
        println!("  Falling back to built-in downloads.");
        println!();
    }

    let magnets = links
        .iter()
        .filter(|l| LinkInput::parse(l).is_some_and(|l| l.is_magnet()))
        .count();
    println!(
        "Processing {} link(s) and {} magnet(s)",
        links.len() - magnets,
        magnets
    );
    if dest_dir != Path::new(".") {
        let shown = std::path::absolute(dest_dir).unwrap_or_else(|_| dest_dir.to_path_buf());
        println!("Downloading to: {}", style(shown.display()).cyan());
    }
    println!();

    let observer = CliObserver::new();
    let report = tokio::select! {
        report = core.process_links(links, dest_dir, &observer) => report,
        _ = tokio::signal::ctrl_c() => {
            observer.clear();
            eprintln!();
            eprintln!("{} Interrupted", style("✗").red().bold());
            return Ok(EXIT_INTERRUPTED);
        }
    };

    output::print_summary(&report);
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("rdebrid").join("config.json"))
    }

    #[tokio::test]
    async fn setup_with_invalid_token_saves_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "bad_token",
                "error_code": 8
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let err = setup(&store, Some("BAD".into()), Some(&server.uri()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Invalid token"));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn setup_with_valid_token_saves_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "username": "alice",
                "type": "premium",
                "expiration": "2030-01-01T00:00:00.000Z"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        setup(&store, Some("  GOODTOKEN \n".into()), Some(&server.uri()))
            .await
            .unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.api_token, "GOODTOKEN");
        assert_eq!(config.preferred_downloader, None);
    }

    #[tokio::test]
    async fn download_without_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let links = vec!["https://files.example/1".to_string()];

        let err = download_links(&store, &links, dir.path(), Some(DownloaderKind::Http), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RdebridError>(),
            Some(RdebridError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn one_failed_link_gives_exit_code_one() {
        let server = MockServer::start().await;
        for (id, name) in [("1", "first.bin"), ("3", "third.bin")] {
            Mock::given(method("POST"))
                .and(path("/unrestrict/link"))
                .and(body_string_contains(format!("files.example%2F{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "filename": name,
                    "filesize": 4,
                    "download": format!("{}/dl/{}", server.uri(), name),
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("/dl/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_string("DATA"))
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path("/unrestrict/link"))
            .and(body_string_contains("files.example%2F2"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": "hoster_unavailable",
                "error_code": 19
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&Config::new("TOKEN")).await.unwrap();
        let dest = dir.path().join("out");
        let links: Vec<String> = ["1", "2", "3"]
            .iter()
            .map(|id| format!("https://files.example/{id}"))
            .collect();

        let code = download_links(
            &store,
            &links,
            &dest,
            Some(DownloaderKind::Http),
            Some(&server.uri()),
        )
        .await
        .unwrap();

        assert_eq!(code, 1);
        assert!(dest.join("first.bin").exists());
        assert!(!dest.join("second.bin").exists());
        assert!(dest.join("third.bin").exists());
    }
}
