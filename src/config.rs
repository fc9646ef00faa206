use std::{env, net::SocketAddr, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// Which `MemeRepository` backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" => Ok(StoreBackend::DynamoDb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store '{}', expected 'dynamodb' or 'memory'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub memes_table: String,
    pub meme_triples_table: String,
    pub aws_region: String,
    // Optional endpoint for DynamoDB Local / LocalStack
    pub aws_endpoint: Option<String>,
    /// Create the DynamoDB tables at startup when they are missing.
    pub init_tables: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let store = match lookup("MEME_STORE") {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidVar("MEME_STORE".into(), e))?,
            None => StoreBackend::DynamoDb,
        };

        let memes_table = lookup("MEMES_TABLE").unwrap_or_else(|| "memes".to_string());
        let meme_triples_table = lookup("MEME_TRIPLES_TABLE").unwrap_or_else(|| "meme_triples".to_string());

        let aws_region = lookup("AWS_DEFAULT_REGION").unwrap_or_else(|| "ca-central-1".to_string());
        let aws_endpoint = lookup("AWS_ENDPOINT_URL").filter(|url| !url.trim().is_empty());

        let init_tables = match lookup("INIT_TABLES") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| ConfigError::InvalidVar("INIT_TABLES".into(), format!("'{}' is not a boolean", value)))?,
            None => true,
        };

        Ok(Config {
            bind_address,
            store,
            memes_table,
            meme_triples_table,
            aws_region,
            aws_endpoint,
            init_tables,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
