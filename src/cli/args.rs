use crate::domain::config::{Parity, SerialDefaults, SessionConfig, StopBits};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for SerialTerm
#[derive(Parser, Debug)]
#[command(
    name = "serialterm",
    version = env!("CARGO_PKG_VERSION"),
    about = "Minimal serial-port terminal",
    long_about = "A minimal serial-port terminal: pick a device and line parameters, open a session, and exchange text with the connected device. Unplugging the device drops the session."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available serial ports
    Ports,
    /// Open a serial port and exchange text over stdin/stdout
    Connect(ConnectArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Serial session arguments
///
/// Anything left out falls back to the `[serial]` section of the
/// configuration file.
#[derive(ClapArgs, Debug)]
pub struct ConnectArgs {
    /// Serial port path
    #[arg(short, long)]
    pub port: String,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Data bits
    #[arg(long)]
    pub data_bits: Option<u8>,

    /// Stop bits (1, 1.5, 2)
    #[arg(long)]
    pub stop_bits: Option<StopBits>,

    /// Parity (none, even, odd)
    #[arg(long, value_enum)]
    pub parity: Option<ParityArg>,

    /// Line ending appended to every line read from stdin
    #[arg(long, value_enum, default_value = "none")]
    pub eol: LineEnding,
}

impl ConnectArgs {
    /// Merge these arguments over the configured defaults
    pub fn session_config(&self, defaults: &SerialDefaults) -> SessionConfig {
        let mut config = defaults.session_for(self.port.clone());
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(data_bits) = self.data_bits {
            config.data_bits = data_bits;
        }
        if let Some(stop_bits) = self.stop_bits {
            config.stop_bits = stop_bits;
        }
        if let Some(parity) = &self.parity {
            config.parity = parity.clone().into();
        }
        config
    }
}

/// Parity configuration argument
#[derive(ValueEnum, Debug, Clone)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

/// Line ending argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    None,
    Lf,
    Cr,
    Crlf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Lf => "\n",
            LineEnding::Cr => "\r",
            LineEnding::Crlf => "\r\n",
        }
    }
}

impl From<ParityArg> for Parity {
    fn from(parity: ParityArg) -> Self {
        match parity {
            ParityArg::None => Self::None,
            ParityArg::Even => Self::Even,
            ParityArg::Odd => Self::Odd,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}
