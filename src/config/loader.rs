//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    /// Environment requirement not met (strict_env without the variable).
    Environment(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Environment(msg) => write!(f, "Environment error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// The `GATEWAY_RPC_URL` environment override is applied after parsing,
/// so the validated config always carries the effective endpoint.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    config.chain.rpc_url = config.resolve_rpc_url().map_err(ConfigError::Environment)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "gateway-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_valid_file() {
        let path = write_temp_config(
            r#"
            [donation]
            donation_address = "S4DDsQjAwV2f9fGPNcbAQWPcQJP2GQT1VGrA5MK9Myq"
            token_mint = "EStPXF2Mh3NVEezeysYfhrWXnuqwmbmjqLSP9vR5pump"
            "#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.donation.token_symbol, "KT");
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config(Path::new("/nonexistent/gateway.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let path = write_temp_config("not [valid toml");
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_semantic_failure() {
        let path = write_temp_config(
            r#"
            [donation]
            donation_address = "bad"
            token_mint = "worse"
            "#,
        );
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        fs::remove_file(path).ok();
    }
}
