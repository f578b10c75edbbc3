use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://localhost:7066";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_DISCOVERY_ADDR: &str = "127.0.0.1:4010";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;
const DEFAULT_METADATA_CACHE_SECS: u64 = 1800;
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 150;
const DEFAULT_DISCOVERY_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "odata-mcpd", version, about = "OData reporting MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "ODATA_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    #[arg(
        long,
        env = "ODATA_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
    )]
    http_timeout_secs: u64,

    #[arg(
        long,
        env = "ODATA_METADATA_CACHE_SECS",
        default_value_t = DEFAULT_METADATA_CACHE_SECS
    )]
    metadata_cache_secs: u64,

    #[arg(
        long = "stdio",
        env = "ODATA_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "ODATA_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(
        long,
        env = "ODATA_MCP_STATEFUL",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_stateful: bool,

    #[arg(
        long,
        env = "ODATA_DISCOVERY_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    discovery_serve: bool,

    #[arg(long, env = "ODATA_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(long, env = "ODATA_DISCOVERY_ADDR", default_value = DEFAULT_DISCOVERY_ADDR)]
    discovery_addr: SocketAddr,

    #[arg(
        long,
        env = "ODATA_DISCOVERY_TIMEOUT_SECS",
        default_value_t = DEFAULT_DISCOVERY_TIMEOUT_SECS
    )]
    discovery_timeout_secs: u64,

    #[arg(
        long,
        env = "ODATA_DISCOVERY_MAX_BODY_BYTES",
        default_value_t = DEFAULT_DISCOVERY_MAX_BODY_BYTES
    )]
    discovery_max_body_bytes: usize,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct ODataConfig {
    pub api_base_url: String,
    pub http_timeout: Duration,
    pub metadata_cache: Duration,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_stateful: bool,
    pub discovery_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub discovery_addr: SocketAddr,
    pub discovery_timeout: Duration,
    pub discovery_max_body_bytes: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
    NothingToServe,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
            Self::NothingToServe => write!(
                f,
                "ODATA_ENABLE_STDIO, ODATA_MCP_SERVE and ODATA_DISCOVERY_SERVE are all disabled"
            ),
        }
    }
}

impl Error for ConfigError {}

impl ODataConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for ODataConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let api_base_url = args.api_base_url.trim().to_string();
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidSetting {
                name: "ODATA_API_BASE_URL",
                value: args.api_base_url,
            });
        }
        if args.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "ODATA_HTTP_TIMEOUT_SECS",
                value: args.http_timeout_secs.to_string(),
            });
        }
        if args.discovery_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "ODATA_DISCOVERY_TIMEOUT_SECS",
                value: args.discovery_timeout_secs.to_string(),
            });
        }
        if !(args.enable_stdio || args.mcp_serve || args.discovery_serve) {
            return Err(ConfigError::NothingToServe);
        }

        Ok(Self {
            api_base_url,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            metadata_cache: Duration::from_secs(args.metadata_cache_secs),
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_stateful: args.mcp_stateful,
            discovery_serve: args.discovery_serve,
            mcp_http_addr: args.mcp_http_addr,
            discovery_addr: args.discovery_addr,
            discovery_timeout: Duration::from_secs(args.discovery_timeout_secs),
            discovery_max_body_bytes: args.discovery_max_body_bytes,
        })
    }
}
