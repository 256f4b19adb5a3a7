use clap::{Parser, Subcommand, ValueEnum};

/// CLI arguments for the Pasteup application.
#[derive(Parser, Debug, PartialEq, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// How parsed files get written.
#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
pub enum Mode {
    /// Write parsed contents to disk verbatim.
    Fast,
    /// Ask the model to merge each block into the existing file.
    Intelligent,
}

/// Subcommands for the Pasteup application.
#[derive(Subcommand, Debug, PartialEq, Clone)]
pub enum Commands {
    /// Parse a chat response and apply it to the workspace.
    Apply {
        /// Apply mode.
        #[arg(short, long, value_enum, default_value_t = Mode::Fast)]
        mode: Mode,

        /// Read the response from a file instead of stdin.
        #[arg(short, long)]
        from: Option<String>,

        /// Workspace root, as PATH or NAME=PATH. Repeatable; defaults to
        /// the current directory.
        #[arg(short, long, num_args = 1..)]
        root: Vec<String>,
    },

    /// Revert the changes made by the last apply.
    Revert {
        /// Workspace root, as PATH or NAME=PATH. Repeatable; defaults to
        /// the current directory.
        #[arg(short, long, num_args = 1..)]
        root: Vec<String>,
    },

    /// Manage configuration options.
    Config {
        /// Set the API key.
        #[arg(long)]
        set_api_key: Option<String>,

        /// Set the model used for intelligent updates.
        #[arg(long)]
        set_model: Option<String>,

        /// Set the fallback model tried once after a rate limit.
        #[arg(long)]
        set_fallback_model: Option<String>,

        /// Set the API base URL.
        #[arg(long)]
        set_base_url: Option<String>,

        /// Set the sampling temperature.
        #[arg(long)]
        set_temperature: Option<f32>,

        /// Set the intelligent-update batch size.
        #[arg(long)]
        set_concurrency: Option<usize>,

        /// Set the log level (debug, info, warn, error).
        #[arg(long)]
        set_log_level: Option<String>,
    },
}
