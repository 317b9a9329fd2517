use clap::{Parser, Subcommand};
use pulse_core::OriginStore;
use pulse_origin::HttpOrigin;
use pulse_serve::config::StreamConfig;
use pulse_serve::hub::BroadcastHub;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulse")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the event distribution server.
    Serve,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pulse=info,pulse_serve=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => {
            let origin_url = std::env::var("PULSE_ORIGIN_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string());
            let port = std::env::var("PULSE_PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(4810);
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);

            let origin: Arc<dyn OriginStore> = match HttpOrigin::new(&origin_url) {
                Ok(origin) => Arc::new(origin),
                Err(err) => {
                    eprintln!("origin client error: {err}");
                    return;
                }
            };
            let config = StreamConfig::default();
            let hub = BroadcastHub::new(origin.clone(), config.clone());
            let state = pulse_serve::AppState {
                hub,
                origin,
                config,
            };

            tracing::info!(%addr, origin = %origin_url, "pulse serving");
            if let Err(err) = pulse_serve::serve(state, addr).await {
                eprintln!("serve error: {err}");
            }
        }
    }
}
