use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};

pub const REDIS_URL_ENV: &str = "PORTKEY_REDIS_URL";
pub const ENVIRONMENT_ENV: &str = "PORTKEY_ENVIRONMENT";
pub const ALPHABET_ENV: &str = "PORTKEY_ALPHABET";
pub const CODE_WIDTH_ENV: &str = "PORTKEY_CODE_WIDTH";
pub const CACHE_CAPACITY_ENV: &str = "PORTKEY_CACHE_CAPACITY";
pub const CACHE_EXPIRATION_SECS_ENV: &str = "PORTKEY_CACHE_EXPIRATION_SECS";
pub const DEFAULT_TTL_SECS_ENV: &str = "PORTKEY_DEFAULT_TTL_SECS";
pub const STORE_TIMEOUT_MS_ENV: &str = "PORTKEY_STORE_TIMEOUT_MS";
pub const BUILD_POOL_ENV: &str = "PORTKEY_BUILD_POOL";
pub const LOG_FORMAT_ENV: &str = "PORTKEY_LOG_FORMAT";

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyz";
pub const DEFAULT_CODE_WIDTH: &str = "4";
pub const DEFAULT_CACHE_CAPACITY: &str = "10000";
pub const DEFAULT_CACHE_EXPIRATION_SECS: &str = "300";
pub const DEFAULT_TTL_SECS: &str = "86400";
pub const DEFAULT_STORE_TIMEOUT_MS: &str = "500";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "portkey", about = "Mint and resolve short links")]
pub struct CLI {
    #[arg(long, env = REDIS_URL_ENV, default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// Deployment environment; scopes every key in the store.
    #[arg(long, env = ENVIRONMENT_ENV, default_value = DEFAULT_ENVIRONMENT)]
    pub environment: String,

    #[arg(long, env = ALPHABET_ENV, default_value = DEFAULT_ALPHABET)]
    pub alphabet: String,

    #[arg(long, env = CODE_WIDTH_ENV, default_value = DEFAULT_CODE_WIDTH)]
    pub code_width: usize,

    #[arg(long, env = CACHE_CAPACITY_ENV, default_value = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,

    #[arg(
        long,
        env = CACHE_EXPIRATION_SECS_ENV,
        default_value = DEFAULT_CACHE_EXPIRATION_SECS,
    )]
    pub cache_expiration_secs: u64,

    /// TTL for links stored without one; 0 keeps them forever.
    #[arg(long, env = DEFAULT_TTL_SECS_ENV, default_value = DEFAULT_TTL_SECS)]
    pub default_ttl_secs: u64,

    #[arg(long, env = STORE_TIMEOUT_MS_ENV, default_value = DEFAULT_STORE_TIMEOUT_MS)]
    pub store_timeout_ms: u64,

    /// Pre-build the pool of unissued codes before minting.
    #[arg(long, env = BUILD_POOL_ENV)]
    pub build_pool: bool,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a URL under a newly minted code.
    Mint {
        url: String,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Store a URL under a chosen code, replacing any previous target.
    Set {
        code: String,
        url: String,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Print the URL a code points to.
    Resolve { code: String },
    /// Delete a code.
    Delete { code: String },
    /// Print usage totals.
    Stats,
}
