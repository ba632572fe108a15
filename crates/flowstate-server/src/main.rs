use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use flowstate_server::auth;
use flowstate_server::hub::{NotificationHub, DEFAULT_CAPACITY};

#[derive(Parser)]
#[command(name = "flowstate-server", about = "Flowstate notification server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Address to bind
    #[arg(long, env = "FLOWSTATE_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(long, env = "FLOWSTATE_PORT", default_value = "3710")]
    port: u16,

    /// Notifications buffered per stream subscriber before it starts skipping
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    buffer: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new API key to use as FLOWSTATE_API_KEY
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Keygen) => {
            let raw_key = auth::generate_api_key();
            // Print the raw key to stdout so it can be captured
            println!("{raw_key}");
            eprintln!("\nExport it as FLOWSTATE_API_KEY for the server and its clients.");
        }
        None => {
            let addr = SocketAddr::new(cli.bind.parse()?, cli.port);

            let auth = auth::build_auth_config();
            if auth.is_some() {
                info!("authentication enabled");
            } else {
                info!("authentication disabled (no FLOWSTATE_API_KEY)");
            }

            let listener = TcpListener::bind(addr).await?;
            info!("flowstate-server listening on http://{addr}");

            flowstate_server::serve(listener, NotificationHub::new(cli.buffer), auth).await?;
        }
    }

    Ok(())
}
