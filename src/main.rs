use std::net::{IpAddr, SocketAddr};

use clap::{Parser, Subcommand};
use sip::api::{CalculateArgs, run_calculate, run_http_server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "sip",
    version,
    about = "SIP calculator: future value, inflation impact and monthly schedule"
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, env = "SIP_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the browser calculator and its JSON/CSV API
    Serve {
        #[arg(long, env = "SIP_HOST", default_value = "0.0.0.0")]
        host: IpAddr,
        #[arg(short, long, env = "SIP_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Run one projection and print it to stdout
    Calculate(CalculateArgs),
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Command::Serve { host, port } => {
            if let Err(e) = run_http_server(SocketAddr::new(host, port)).await {
                tracing::error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        Command::Calculate(args) => match run_calculate(&args) {
            Ok(output) => print!("{output}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
    }
}
