use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tokenxllm")]
#[command(about = "HTTP gateway for the AIC token and usage manager", long_about = None)]
pub struct Cli {
    /// Optional configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE", env = "TOKENXLLM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server address
    #[arg(long)]
    pub server_addr: Option<String>,

    /// Starknet RPC URL
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log format (pretty, compact, json)
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<String>,
}
