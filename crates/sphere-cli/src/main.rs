//! # sphere CLI Entry Point
//!
//! Parses arguments, builds the payer session and dispatches.

use clap::Parser;
use sphere_core::{format_eth, CANONICAL_FEE_WEI};
use url::Url;

use sphere_cli::PayerSession;

/// Sphere payer CLI.
///
/// Pays credential fees from a local wallet (`LEDGER_PRIVATE_KEY`) and
/// reports payments to the Sphere API.
#[derive(Parser, Debug)]
#[command(name = "sphere", version, about)]
struct Cli {
    /// Sphere API base URL.
    #[arg(long, global = true, env = "SPHERE_API_URL", default_value = "http://localhost:8080")]
    api_url: Url,

    /// Bearer token, `user:{account_id}:{secret}`.
    #[arg(long, global = true, env = "SPHERE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Pay for an uploaded document and report the payment.
    Pay(sphere_cli::pay::PayArgs),
    /// Decode the CertificateUploaded event of an upload transaction.
    DecodeReceipt(sphere_cli::receipt::DecodeReceiptArgs),
    /// Print the protocol fee.
    Fee,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON result.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fee => {
            println!("{} ETH ({CANONICAL_FEE_WEI} wei)", format_eth(CANONICAL_FEE_WEI));
        }
        Commands::Pay(args) => {
            let session = PayerSession::connect(cli.api_url, cli.token).await?;
            let payment = sphere_cli::pay::run(&session, &args).await?;
            println!("{}", serde_json::to_string_pretty(&payment)?);
        }
        Commands::DecodeReceipt(args) => {
            let session = PayerSession::connect(cli.api_url, cli.token).await?;
            let decoded = sphere_cli::receipt::run(session.ledger.as_ref(), &args).await?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
    }

    Ok(())
}
