use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "gerrit-trigger",
    about = "Gerrit stream-events trigger for CI orchestrators",
    version
)]
pub struct Cli {
    /// Config file (.yml)
    #[arg(long)]
    pub config_file: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "INFO")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARN")]
    Warn,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    /// Env-filter directive for the tracing subscriber.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "gerrit_trigger=debug",
            LogLevel::Info => "gerrit_trigger=info",
            LogLevel::Warn => "gerrit_trigger=warn",
            LogLevel::Error => "gerrit_trigger=error",
        }
    }
}
