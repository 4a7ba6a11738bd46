//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate, health), and their associated argument
//! structs. Flags on `run` have environment variable equivalents for
//! container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_CONFIG_FILE: &str = "sample-config.json";
pub const DEFAULT_LB_SEPARATOR: &str = " ";

#[derive(Parser)]
#[command(
    name = "weeproxy",
    version,
    about = "Path-based reverse proxy with per-backend rate limiting and circuit breaking",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        weeproxy run                         Start with ./sample-config.json\n  \
        weeproxy run -c proxy.json           Start with a specific config\n  \
        weeproxy validate proxy.json         Check a config without starting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Run(Box<RunArgs>),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        weeproxy run                                  Use ./sample-config.json\n  \
        weeproxy run -c proxy.json --listen :9000     Override the listen address\n  \
        weeproxy run --lb-separator ','               Comma-separated backend lists")]
pub struct RunArgs {
    /// Config file path (JSON)
    #[arg(short, long, env = "WEEPROXY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Listen address, overrides `server.listen-at` (`:8080` binds every interface)
    #[arg(long, env = "WEEPROXY_LISTEN")]
    pub listen: Option<String>,

    /// Separator between backends in a `url-proxy` entry
    #[arg(
        long,
        env = "WEEPROXY_LB_SEPARATOR",
        default_value = DEFAULT_LB_SEPARATOR,
        allow_hyphen_values = true
    )]
    pub lb_separator: String,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Max request body size in bytes
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 1_048_576,
        help_heading = "Tuning"
    )]
    pub max_body: usize,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Separator between backends in a `url-proxy` entry
    #[arg(
        long,
        env = "WEEPROXY_LB_SEPARATOR",
        default_value = DEFAULT_LB_SEPARATOR,
        allow_hyphen_values = true
    )]
    pub lb_separator: String,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:8080")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
