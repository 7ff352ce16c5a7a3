use anyhow::{Context, Result};
use ::config::{Config, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads configuration from a file into a struct.
/// Supports TOML, YAML, JSON, etc. based on file extension.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_str = path.as_ref().to_str().context("Invalid config path")?;

    let settings = Config::builder()
        .add_source(File::with_name(path_str))
        .build()
        .with_context(|| format!("Failed to read configuration from {}", path_str))?;

    settings.try_deserialize::<T>().context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        rpc_url: String,
        #[serde(default)]
        decimals: Option<u32>,
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "rpc_url = \"http://localhost:5050\"\ndecimals = 6").unwrap();

        let sample: Sample = load_config(file.path()).unwrap();
        assert_eq!(sample.rpc_url, "http://localhost:5050");
        assert_eq!(sample.decimals, Some(6));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result: Result<Sample> = load_config("/nonexistent/tokenxllm.toml");
        assert!(result.is_err());
    }
}
