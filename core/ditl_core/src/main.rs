use clap::Parser;
use ditl_core::{
    api::{router, AppState},
    clock::SystemClock,
    settings::{MissingIdPolicy, Settings, SettingsUpdate},
    store::ActivityStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use tracing::info;

const DEFAULT_PORT: u16 = 17620;

#[derive(Parser, Debug)]
#[command(name = "ditl_core", version)]
struct Args {
    /// Listen address.
    ///
    /// Accepts:
    /// - ip:port (recommended), e.g. 127.0.0.1:17620
    /// - ip (implies port 17620), e.g. 127.0.0.1
    /// - localhost or localhost:port
    #[arg(long, default_value = "127.0.0.1:17620")]
    listen: String,

    /// SQLite database path.
    #[arg(long, default_value = "./data/ditl.db")]
    db: PathBuf,

    /// Local UTC offset in minutes used for day/week/month/year boundaries.
    /// Overrides the stored setting when given.
    #[arg(long, allow_hyphen_values = true)]
    tz_offset_minutes: Option<i32>,

    /// Report updates/deletes of unknown ids as 404 instead of ignoring them.
    #[arg(long)]
    strict_ids: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ditl_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    if let Some(parent) = args.db.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = ActivityStore::open(&args.db)?;
    let mut settings = store.load_settings(Settings::default())?;
    if args.tz_offset_minutes.is_some() || args.strict_ids {
        settings = settings.apply(SettingsUpdate {
            tz_offset_minutes: args.tz_offset_minutes,
            missing_ids: args.strict_ids.then_some(MissingIdPolicy::Strict),
            quick_start_defaults: None,
        });
        store.save_settings(&settings)?;
    }

    info!(
        tz_offset_minutes = settings.tz_offset_minutes,
        missing_ids = settings.missing_ids.as_str(),
        "settings loaded"
    );

    let app = router(AppState::new(store, settings, Arc::new(SystemClock)));

    let addr = parse_listen(&args.listen)?;
    info!("Core listening on http://{addr}");
    info!("DB: {}", args.db.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        let ip = if host == "localhost" {
            Some(IpAddr::from([127, 0, 0, 1]))
        } else {
            host.parse::<IpAddr>().ok()
        };
        if let Some(ip) = ip {
            let port: u16 = port_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
                    input,
                    DEFAULT_PORT
                )
            })?;
            return Ok(SocketAddr::new(ip, port));
        }
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
