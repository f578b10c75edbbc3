use clap::Parser;
use odata_chat::endpoint::normalize_base_url;
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_CHAT_ADDR: &str = "127.0.0.1:4030";
const DEFAULT_TOOL_RELAY_URL: &str = "http://127.0.0.1:4010";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Parser, Debug)]
#[command(name = "odata-chatd", version, about = "OData reporting chat daemon.")]
struct CliArgs {
    #[arg(long, env = "CHAT_ADDR", default_value = DEFAULT_CHAT_ADDR)]
    addr: SocketAddr,

    #[arg(long, env = "CHAT_TOOL_RELAY_URL", default_value = DEFAULT_TOOL_RELAY_URL)]
    tool_relay_url: String,

    #[arg(long, env = "CHAT_MODEL_ENDPOINT")]
    model_endpoint: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_ENDPOINT", hide = true)]
    azure_openai_endpoint: Option<String>,

    #[arg(long, env = "CHAT_MODEL_DEPLOYMENT")]
    model_deployment: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT_NAME", hide = true)]
    azure_openai_deployment_name: Option<String>,

    #[arg(long, env = "CHAT_MODEL_API_KEY", hide_env_values = true)]
    model_api_key: Option<String>,

    #[arg(long, env = "CHAT_MODEL_API_VERSION")]
    model_api_version: Option<String>,

    #[arg(
        long,
        env = "CHAT_MODEL_TIMEOUT_SECS",
        default_value_t = DEFAULT_MODEL_TIMEOUT_SECS
    )]
    model_timeout_secs: u64,

    #[arg(
        long,
        env = "CHAT_RELAY_TIMEOUT_SECS",
        default_value_t = DEFAULT_RELAY_TIMEOUT_SECS
    )]
    relay_timeout_secs: u64,

    #[arg(
        long,
        env = "CHAT_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    #[arg(long, env = "CHAT_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    #[arg(long, env = "CHAT_MAX_TOOL_ROUNDS", default_value_t = DEFAULT_MAX_TOOL_ROUNDS)]
    max_tool_rounds: usize,

    #[arg(long, env = "CHAT_SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    session_ttl_secs: u64,

    #[arg(long, env = "CHAT_MAX_SESSIONS", default_value_t = DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,
}

/// Hosted model settings; present only when both endpoint and deployment are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub addr: SocketAddr,
    pub tool_relay_url: String,
    pub model: Option<ModelSettings>,
    pub model_timeout: Duration,
    pub relay_timeout: Duration,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_tool_rounds: usize,
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl ChatConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive_secs(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidSetting {
            name,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

impl TryFrom<CliArgs> for ChatConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(tool_relay_url) = normalize_base_url(&args.tool_relay_url) else {
            return Err(ConfigError::InvalidSetting {
                name: "CHAT_TOOL_RELAY_URL",
                value: args.tool_relay_url,
            });
        };
        if args.max_tool_rounds == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "CHAT_MAX_TOOL_ROUNDS",
                value: args.max_tool_rounds.to_string(),
            });
        }
        if args.max_sessions == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "CHAT_MAX_SESSIONS",
                value: args.max_sessions.to_string(),
            });
        }

        let endpoint = non_blank(args.model_endpoint).or_else(|| non_blank(args.azure_openai_endpoint));
        let deployment = non_blank(args.model_deployment)
            .or_else(|| non_blank(args.azure_openai_deployment_name));
        let model = match (endpoint, deployment) {
            (Some(endpoint), Some(deployment)) => Some(ModelSettings {
                endpoint,
                deployment,
                api_key: non_blank(args.model_api_key),
                api_version: non_blank(args.model_api_version),
            }),
            _ => None,
        };

        Ok(Self {
            addr: args.addr,
            tool_relay_url,
            model,
            model_timeout: positive_secs("CHAT_MODEL_TIMEOUT_SECS", args.model_timeout_secs)?,
            relay_timeout: positive_secs("CHAT_RELAY_TIMEOUT_SECS", args.relay_timeout_secs)?,
            request_timeout: positive_secs("CHAT_REQUEST_TIMEOUT_SECS", args.request_timeout_secs)?,
            max_body_bytes: args.max_body_bytes,
            max_tool_rounds: args.max_tool_rounds,
            session_ttl: positive_secs("CHAT_SESSION_TTL_SECS", args.session_ttl_secs)?,
            max_sessions: args.max_sessions,
        })
    }
}
