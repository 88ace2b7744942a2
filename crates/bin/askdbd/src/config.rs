use clap::{Parser, ValueEnum, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_DB_URI: &str = "mem://";
const DEFAULT_DB_NAMESPACE: &str = "askdb";
const DEFAULT_DB_NAME: &str = "testdb";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LOG_LEVEL: &str = "info";

/// How the agent bridge reaches the query tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolTransport {
    /// Call the registry in this process.
    Local,
    /// Start `askdbd --stdio` as a child process and talk MCP to it.
    Subprocess,
}

#[derive(Parser, Debug)]
#[command(name = "askdbd", version, about = "Natural-language query daemon.")]
#[allow(clippy::struct_excessive_bools)]
pub struct CliArgs {
    #[arg(long, env = "ASKDB_DB_URI", default_value = DEFAULT_DB_URI)]
    db_uri: String,

    #[arg(long, env = "ASKDB_DB_NAMESPACE", default_value = DEFAULT_DB_NAMESPACE)]
    db_namespace: String,

    #[arg(long, env = "ASKDB_DB_NAME", default_value = DEFAULT_DB_NAME)]
    db_name: String,

    #[arg(long, env = "ASKDB_DB_USERNAME")]
    db_username: Option<String>,

    #[arg(long, env = "ASKDB_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    #[arg(
        long,
        env = "ASKDB_STRICT_COLLECTIONS",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    strict_collections: bool,

    #[arg(
        long,
        env = "ASKDB_SEED_SAMPLE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    seed_sample: bool,

    #[arg(
        long = "stdio",
        env = "ASKDB_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "ASKDB_MCP_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "ASKDB_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "ASKDB_HTTP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    http_serve: bool,

    #[arg(long, env = "ASKDB_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    http_addr: SocketAddr,

    #[arg(
        long,
        env = "ASKDB_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    #[arg(
        long,
        env = "ASKDB_MAX_BODY_BYTES",
        default_value_t = DEFAULT_MAX_BODY_BYTES
    )]
    max_body_bytes: usize,

    #[arg(long, env = "ASKDB_TOOL_TRANSPORT", value_enum, default_value_t = ToolTransport::Local)]
    tool_transport: ToolTransport,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    #[arg(long, env = "ASKDB_OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    openai_model: String,

    #[arg(long, env = "ASKDB_LOG", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

/// Root credentials for the document store.
#[derive(Clone)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings for the completion service.
#[derive(Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct AskDbConfig {
    pub db_uri: String,
    pub db_namespace: String,
    pub db_name: String,
    pub db_credentials: Option<DbCredentials>,
    pub strict_collections: bool,
    pub seed_sample: bool,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub http_serve: bool,
    pub http_addr: SocketAddr,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub tool_transport: ToolTransport,
    /// Present whenever the HTTP facade is served.
    pub completion: Option<CompletionSettings>,
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl AskDbConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }

    /// Whether the HTTP facade runs. `--stdio` serves the tool and nothing else.
    #[must_use]
    pub const fn serves_http(&self) -> bool {
        self.http_serve && !self.enable_stdio
    }

    /// Arguments for a child `askdbd --stdio` that opens the same store.
    ///
    /// Credentials are not included; pass them through the environment.
    #[must_use]
    pub fn child_stdio_args(&self) -> Vec<String> {
        let mut args = vec![
            "--stdio".to_string(),
            "--db-uri".to_string(),
            self.db_uri.clone(),
            "--db-namespace".to_string(),
            self.db_namespace.clone(),
            "--db-name".to_string(),
            self.db_name.clone(),
            "--log-level".to_string(),
            self.log_level.clone(),
        ];
        if self.strict_collections {
            args.push("--strict-collections".to_string());
            args.push("true".to_string());
        }
        if self.seed_sample {
            args.push("--seed-sample".to_string());
            args.push("true".to_string());
        }
        args
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn require_non_empty(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidSetting { name, value });
    }
    Ok(value)
}

impl TryFrom<CliArgs> for AskDbConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let db_uri = require_non_empty("ASKDB_DB_URI", args.db_uri)?;
        let db_namespace = require_non_empty("ASKDB_DB_NAMESPACE", args.db_namespace)?;
        let db_name = require_non_empty("ASKDB_DB_NAME", args.db_name)?;

        let db_credentials = match (non_empty(args.db_username), non_empty(args.db_password)) {
            (Some(username), Some(password)) => Some(DbCredentials { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingSetting("ASKDB_DB_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::MissingSetting("ASKDB_DB_USERNAME")),
        };

        if args.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "ASKDB_REQUEST_TIMEOUT_SECS",
                value: args.request_timeout_secs.to_string(),
            });
        }

        let serves_http = args.http_serve && !args.enable_stdio;
        let completion = if serves_http {
            let api_key = non_empty(args.openai_api_key)
                .ok_or(ConfigError::MissingSetting("OPENAI_API_KEY"))?;
            Some(CompletionSettings {
                api_key,
                base_url: require_non_empty("OPENAI_BASE_URL", args.openai_base_url)?,
                model: require_non_empty("ASKDB_OPENAI_MODEL", args.openai_model)?,
            })
        } else {
            None
        };

        Ok(Self {
            db_uri,
            db_namespace,
            db_name,
            db_credentials,
            strict_collections: args.strict_collections,
            seed_sample: args.seed_sample,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            http_serve: args.http_serve,
            http_addr: args.http_addr,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            max_body_bytes: args.max_body_bytes,
            tool_transport: args.tool_transport,
            completion,
            log_level: args.log_level,
        })
    }
}
