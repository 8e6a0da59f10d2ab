use anyhow::Result;
use clap::{Parser, Subcommand};
use harcap_cli::OutputFormat;
use harcap_cli::commands;
use harcap_cli::commands::proxy::ProxyOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "harcap")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Record traffic through an intercepting proxy as HTTP Archive (HAR) files",
    long_about = "harcap runs an HTTP/HTTPS intercepting proxy and records every exchange \
                  into a HAR document, grouped into pages, with per-request timing breakdowns."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the capture proxy and write a HAR file on Ctrl+C
    Proxy {
        /// Port to listen on
        #[arg(short, long, env = "HARCAP_PORT", default_value_t = 8080)]
        port: u16,

        /// HAR file written when the proxy stops
        #[arg(short, long, default_value = "capture.har")]
        output: PathBuf,

        /// Comma separated capture types, e.g. REQUEST_HEADERS,RESPONSE_CONTENT
        #[arg(long, env = "HARCAP_CAPTURE_TYPES")]
        capture_types: Option<String>,

        /// CA certificate PEM file (defaults to ~/.harcap/ca.crt)
        #[arg(long, requires = "key")]
        cert: Option<PathBuf>,

        /// CA private key PEM file (defaults to ~/.harcap/ca.key)
        #[arg(long, requires = "cert")]
        key: Option<PathBuf>,

        /// Reference of the initial page
        #[arg(long)]
        page_ref: Option<String>,

        /// Title of the initial page
        #[arg(long)]
        page_title: Option<String>,
    },

    /// Validate a HAR file and summarize its pages and entries
    Inspect {
        /// Path to the HAR file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Proxy {
            port,
            output,
            capture_types,
            cert,
            key,
            page_ref,
            page_title,
        } => commands::proxy::execute(&ProxyOptions {
            port,
            output,
            capture_types,
            cert,
            key,
            page_ref,
            page_title,
        }),
        Commands::Inspect { file, format } => commands::inspect::execute(&file, format),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("harcap=debug,harcap_cli=debug,harcap_core=debug,harcap_proxy=debug")
    } else {
        EnvFilter::new("harcap=info,harcap_cli=info,harcap_proxy=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
