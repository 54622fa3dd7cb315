use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;

use shipgate::{
    app, app_state_builder, config, directory, server_config,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Bind host (default: 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (default: 18890)
    #[arg(long)]
    port: Option<u16>,

    /// Ship submissions allowed per agent per minute
    #[arg(long)]
    ships_per_minute: Option<u32>,

    /// Registrations allowed per address per hour
    #[arg(long)]
    registrations_per_hour: Option<u32>,

    /// Config TOML file (default: /etc/shipgate/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from("/etc/shipgate/config.toml"));
    let config = match config::Config::load(&config_path) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            if let Some(ioe) = e.downcast_ref::<std::io::Error>() {
                if ioe.kind() == std::io::ErrorKind::NotFound {
                    info!(
                        "config file not found at {}; continuing with defaults",
                        config_path.display()
                    );
                    None
                } else {
                    return Err(e);
                }
            } else {
                return Err(e);
            }
        }
    };

    let cli = server_config::CliOverrides {
        host: args.host,
        port: args.port,
        ships_per_minute: args.ships_per_minute,
        registrations_per_hour: args.registrations_per_hour,
    };
    let eff = server_config::effective_settings(&cli, config.as_ref());

    let state = app_state_builder::build_default_state(
        Arc::new(directory::InMemoryDirectory::new()),
        Arc::new(directory::InMemoryCollections::new()),
        Arc::new(directory::InMemoryShipStore::new()),
        Arc::new(directory::InMemoryAckSink::new()),
        config.as_ref(),
        eff.quotas.clone(),
    )?;

    let app = app::build_router(state);
    let addr: SocketAddr = format!("{}:{}", eff.host, eff.port).parse()?;
    info!("shipgate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
