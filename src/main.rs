use clap::{Parser, Subcommand, ValueEnum};
use gigpay::application::orders::OrderService;
use gigpay::config::GatewayConfig;
use gigpay::infrastructure::http_gateway::HttpGatewayClient;
use gigpay::interfaces::{event, http};
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the order API over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Handle a single event read from stdin and print the response envelope
    Invoke {
        #[arg(long, value_enum)]
        function: FunctionArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FunctionArg {
    CreateOrder,
    VerifyOrder,
}

impl From<FunctionArg> for event::Function {
    fn from(arg: FunctionArg) -> Self {
        match arg {
            FunctionArg::CreateOrder => event::Function::CreateOrder,
            FunctionArg::VerifyOrder => event::Function::VerifyOrder,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `invoke` output stays machine-readable.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    // Credentials are checked once here, before anything is served.
    let config = GatewayConfig::from_env().into_diagnostic()?;
    if config.mode_defaulted {
        warn!("GATEWAY_MODE is not set, defaulting to production: orders will move real money");
    }
    info!(mode = ?config.mode, base_url = %config.base_url(), "Loaded gateway configuration");

    let gateway = HttpGatewayClient::new(&config).into_diagnostic()?;
    let service = Arc::new(OrderService::new(Box::new(gateway), &config));

    match cli.command {
        Command::Serve { bind } => {
            http::serve(&bind, service).await.into_diagnostic()?;
        }
        Command::Invoke { function } => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .into_diagnostic()?;
            let response = event::handle_json(&service, function.into(), &raw).await;
            println!("{}", serde_json::to_string(&response).into_diagnostic()?);
        }
    }

    Ok(())
}
