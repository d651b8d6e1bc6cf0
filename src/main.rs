use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use http::Method;
use tracing::info;
use tracing_subscriber::EnvFilter;

use withlimits::config::WithLimitsConfig;
use withlimits::{Dispatch, MemoryCache};

/// Send one HTTP request through the configured rate limit gates.
#[derive(Debug, Parser)]
#[command(name = "withlimits", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra request header, as NAME=VALUE
    #[arg(short = 'H', long = "header", value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    /// Query parameter, as NAME=VALUE
    #[arg(short = 'p', long = "param", value_parser = parse_pair)]
    params: Vec<(String, String)>,

    /// Path appended to the configured base URI
    path: String,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = WithLimitsConfig::load(&cli.config)?;
    info!(
        base_uri = %config.client.base_uri,
        gates = config.gates.len(),
        "Configuration loaded"
    );

    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let transport = Arc::new(config.client.build_transport()?);
    let cache = Arc::new(MemoryCache::new());

    let dispatcher = config
        .dispatcher(&cli.path, transport, cache)
        .method(method)
        .with_headers(cli.headers)
        .with_parameters(cli.params);

    match dispatcher.send().await? {
        Dispatch::Completed(response) => {
            println!("{}", response.status);
            if response.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
        Dispatch::Blocked(blocked) => {
            println!("blocked by {}", blocked);
            Ok(ExitCode::from(2))
        }
    }
}
