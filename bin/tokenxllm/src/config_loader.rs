use crate::cli::Cli;
use anyhow::Result;
use tokenxllm_common::utils::config::load_config;
use tokenxllm_gateway::GatewayConfig;

/// A loaded configuration plus notices for environment variables it ignored
pub struct LoadedConfig {
    pub config: GatewayConfig,
    pub ignored_env: Vec<String>,
}

/// File (if any), then environment, then command-line flags
pub fn load_gateway_config(args: &Cli) -> Result<LoadedConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    let ignored_env = config.apply_env();

    if let Some(addr) = &args.server_addr {
        config.server_addr = addr.clone();
    }

    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = rpc_url.clone();
    }

    if args.debug {
        config.logging.level = "debug".to_string();
    }

    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }

    Ok(LoadedConfig { config, ignored_env })
}
