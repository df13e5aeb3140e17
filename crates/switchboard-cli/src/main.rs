mod client;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "switchboard", about = "Capability-provider tool gateway CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server with the demo providers
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to a config file (defaults to ~/.switchboard/config.json5)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show the registry status of a running gateway
    Status {
        /// Gateway base URL
        #[arg(long, default_value = "http://127.0.0.1:3100")]
        url: String,
    },
    /// Call a tool on a running gateway
    Call {
        /// Provider id (e.g. "database")
        #[arg(long)]
        provider: String,

        /// Tool name (e.g. "get_leads")
        #[arg(long)]
        tool: String,

        /// Tool parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,

        /// Gateway base URL
        #[arg(long, default_value = "http://127.0.0.1:3100")]
        url: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let mut config = match config {
                    Some(path) => {
                        switchboard_config::load_config_from(std::path::Path::new(&path))?
                    }
                    None => switchboard_config::load_config().unwrap_or_default(),
                };
                if let Some(port) = port {
                    config.gateway.port = port;
                }

                let providers = switchboard_providers::demo_providers();
                switchboard_gateway::start_gateway(config, providers)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))
            })?;
        }
        Commands::Status { url } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(client::run_status(url))?;
        }
        Commands::Call {
            provider,
            tool,
            params,
            url,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(client::run_call(url, provider, tool, params))?;
        }
    }

    Ok(())
}
