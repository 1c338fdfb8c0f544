use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

/// Exit code for a missing argument or configuration file.
pub const EXIT_USAGE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "price-engine")]
#[command(about = "Price Engine - computes and publishes fair values for trading symbols")]
#[command(version)]
pub struct Cli {
    /// Path to the `key = value` configuration file
    pub config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", env = "PE_LOG_FORMAT")]
    pub log_format: LogFormatArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

/// What `main` should do when arguments cannot be used.
#[derive(Debug)]
pub enum ParseOutcome {
    Run(Cli),
    /// Print the message and exit with the given code.
    Exit { message: String, code: i32 },
}

impl Cli {
    pub fn parse_args() -> ParseOutcome {
        Self::parse_from_args(std::env::args_os())
    }

    /// Parse arguments, mapping usage errors to exit code 1.
    /// `--help` and `--version` exit with 0.
    pub fn parse_from_args<I, T>(args: I) -> ParseOutcome
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(cli) => ParseOutcome::Run(cli),
            Err(e) => {
                let code = match e.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                    _ => EXIT_USAGE,
                };
                ParseOutcome::Exit {
                    message: e.render().to_string(),
                    code,
                }
            }
        }
    }
}
