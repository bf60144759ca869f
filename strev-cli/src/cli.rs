use clap::{Parser, Subcommand, ValueEnum};
use platforms_parser::media::QualityLabel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "strev",
    about = "Strev (Streev) - resolve episode streams across providers",
    version,
    author
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Proxy URL (supports http, https, socks5)
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Proxy username (if proxy requires authentication)
    #[arg(long, global = true)]
    pub proxy_username: Option<String>,

    /// Proxy password (if proxy requires authentication)
    #[arg(long, global = true)]
    pub proxy_password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve streams for one or more episodes
    Resolve {
        /// Episode ids, e.g. "frieren-episode-5"
        #[arg(required = true, num_args = 1..)]
        episodes: Vec<String>,

        /// Only query these provider codes (default: all)
        #[arg(short, long, value_delimiter = ',')]
        provider: Vec<String>,

        /// Drop streams below this quality (e.g. "720p")
        #[arg(long, value_parser = parse_quality)]
        min_quality: Option<QualityLabel>,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,

        /// Save output to file
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,

        /// Skip the cache for this run
        #[arg(long)]
        no_cache: bool,
    },

    /// Fetch one URL, or up to 20 comma-separated URLs concurrently
    Fetch {
        /// Single URL; the body is printed as-is
        #[arg(long, conflicts_with = "urls", required_unless_present = "urls")]
        url: Option<String>,

        /// Comma-separated URLs; prints one result per URL
        #[arg(long)]
        urls: Option<String>,

        /// HTTP method shared by every request
        #[arg(short = 'X', long)]
        method: Option<String>,

        /// Request body shared by every request
        #[arg(short, long)]
        body: Option<String>,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,

        /// Save output to file
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,
    },

    /// Search title metadata
    Search {
        /// Title to look for
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Show title metadata by id
    Details {
        /// Title id
        id: u64,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// List configured providers
    Providers {
        /// Show detailed information about each provider
        #[arg(short, long)]
        detailed: bool,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Run the HTTP edge service
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Manage the stream cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Show configuration information
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Remove every cached entry
    Clear,
}

fn parse_quality(value: &str) -> Result<QualityLabel, String> {
    match value.parse::<QualityLabel>() {
        Ok(QualityLabel::Unknown) | Err(_) => Err(format!(
            "unknown quality '{value}', expected one of 2160p, 1440p, 1080p, 720p, 480p, 360p, 240p"
        )),
        Ok(label) => Ok(label),
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty-printed human-readable output
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// Compact JSON output
    JsonCompact,
    /// Table format
    Table,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pretty => write!(f, "pretty"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonCompact => write!(f, "json-compact"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
