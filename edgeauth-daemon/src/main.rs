//! EdgeAuth daemon - admission gateway for a colocated reverse proxy.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use edgeauth_core::signing::{
    canonical_string, sign, GRANT_PATH, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use edgeauth_core::SecretProvider;
use edgeauth_daemon::{validator, DaemonConfig, EnvConfigSecret, Gateway, LISTEN_ADDR};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Definition
// ============================================================================

/// EdgeAuth - token and temporary-IP admission for a reverse proxy
#[derive(Parser)]
#[command(name = "edgeauth", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the JSON config file (defaults to <config dir>/edgeauth/config.json)
    #[arg(long, global = true, env = "EDGEAUTH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (default if no command given)
    Serve,

    /// Sign a grant and send it to a running gateway
    Grant {
        /// IP address to admit
        #[arg(long)]
        ip: String,

        /// Lifetime in seconds; 0 lets the gateway apply its default
        #[arg(long, default_value_t = 0)]
        ttl: i64,

        /// Gateway base URL
        #[arg(long, default_value = "http://127.0.0.1:5577")]
        url: String,

        /// Print the signed request instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(DaemonConfig::default_path);

    match cli.command {
        Some(Commands::Grant {
            ip,
            ttl,
            url,
            dry_run,
        }) => cmd_grant(&config_path, &ip, ttl, &url, dry_run).await,
        Some(Commands::Serve) | None => cmd_serve(&config_path).await,
    }
}

/// Start the gateway.
async fn cmd_serve(config_path: &std::path::Path) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(path = %config_path.display(), "Loading configuration");
    let config = DaemonConfig::load(config_path)?;

    let secrets = Arc::new(EnvConfigSecret::new(config_path));
    if secrets.admin_secret().is_none() {
        tracing::warn!(
            "EDGEAUTH_ADMIN_SECRET not set and no adminSecret in config; /allow will answer 500 until one is configured"
        );
    }

    let validator = validator::from_config(&config).context("building session authority client")?;
    let gateway = Gateway::new(&config, validator, secrets);

    let listener = TcpListener::bind(LISTEN_ADDR)
        .await
        .with_context(|| format!("binding {LISTEN_ADDR}"))?;
    tracing::info!(addr = %LISTEN_ADDR, "EdgeAuth gateway listening");

    match gateway.serve(listener).await {
        Ok(()) => {
            tracing::info!("Gateway shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway shutdown with error");
            Err(e.into())
        }
    }
}

/// Sign a grant with the locally resolved secret and send it.
async fn cmd_grant(
    config_path: &std::path::Path,
    ip: &str,
    ttl: i64,
    url: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let Some(secret) = EnvConfigSecret::new(config_path).admin_secret() else {
        bail!("admin secret not set (EDGEAUTH_ADMIN_SECRET or adminSecret in config)");
    };

    let timestamp = i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())?;
    let signature = sign(&secret, &canonical_string(timestamp, ip, ttl));
    let body = serde_json::json!({ "ip": ip, "ttlSeconds": ttl });
    let endpoint = format!("{}{GRANT_PATH}", url.trim_end_matches('/'));

    if dry_run {
        println!("POST {endpoint}");
        println!("{TIMESTAMP_HEADER}: {timestamp}");
        println!("{SIGNATURE_HEADER}: {signature}");
        println!();
        println!("{body}");
        return Ok(());
    }

    let response = reqwest::Client::new()
        .post(&endpoint)
        .header(TIMESTAMP_HEADER, timestamp.to_string())
        .header(SIGNATURE_HEADER, &signature)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .send()
        .await
        .with_context(|| format!("sending grant to {endpoint}"))?;

    let status = response.status();
    match status.as_u16() {
        200 => {
            println!("Granted {ip} ({})", ttl_label(ttl));
            Ok(())
        }
        400 => bail!("gateway rejected the request as malformed (400)"),
        401 => bail!("timestamp outside the gateway's skew window; check clocks (401)"),
        403 => bail!("signature mismatch; secrets differ between here and the gateway (403)"),
        429 => bail!("gateway is rate limiting grants; try again shortly (429)"),
        500 => bail!("gateway has no admin secret configured (500)"),
        _ => bail!("unexpected response from gateway: {status}"),
    }
}

fn ttl_label(ttl: i64) -> String {
    if ttl > 0 {
        format!("{ttl}s")
    } else {
        "default ttl".to_string()
    }
}
