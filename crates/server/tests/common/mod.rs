use anyhow::Context as _;
use std::process::{Command, Stdio};
use std::time::Duration;

pub use crawl_relay_test_support::{refused_url, serve_router};
use crawl_relay_test_support::{KillOnDrop, pick_unused_port, wait_http_ok};

/// A running `crawl-relay` process and its base URL.
pub struct RelayProcess {
    pub base_url: String,
    _child: KillOnDrop,
}

pub async fn spawn_relay(extra_args: &[&str]) -> anyhow::Result<RelayProcess> {
    let port = pick_unused_port()?;
    let bin = env!("CARGO_BIN_EXE_crawl-relay");
    let child = Command::new(bin)
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--log-level")
        .arg("info")
        .args(extra_args)
        .stdout(Stdio::null())
        .spawn()
        .context("spawn crawl-relay")?;
    let child = KillOnDrop(child);

    let base_url = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(20)).await?;

    Ok(RelayProcess {
        base_url,
        _child: child,
    })
}
