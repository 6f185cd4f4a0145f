//! mdfetch CLI - URL to Markdown web service and one-shot converter

use clap::{Args, Parser, Subcommand};
use mdfetch::config::{CHUNK_SIZE, CONVERSION_TIMEOUT, MAX_CONTENT_SIZE, REQUEST_TIMEOUT};
use mdfetch::target::{self, Target};
use mdfetch::{router, Config, Pipeline, DEFAULT_USER_AGENT};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// mdfetch - fetch any URL and get it back as Markdown
#[derive(Parser, Debug)]
#[command(name = "mdfetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Convert a single URL and print the Markdown
    Convert {
        /// URL to convert (scheme optional)
        url: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

/// Pipeline tuning shared by both subcommands
#[derive(Args, Debug, Clone)]
struct PipelineArgs {
    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,

    /// Overall conversion timeout in seconds
    #[arg(long, default_value_t = CONVERSION_TIMEOUT.as_secs())]
    conversion_timeout: u64,

    /// Maximum body size in bytes
    #[arg(long, default_value_t = MAX_CONTENT_SIZE)]
    max_content_size: usize,

    /// Chunk size for the streaming size check
    #[arg(long, default_value_t = CHUNK_SIZE)]
    chunk_size: usize,

    /// User-Agent sent upstream
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Directory for HTML temp files
    #[arg(long)]
    temp_dir: Option<PathBuf>,
}

impl PipelineArgs {
    fn to_config(&self) -> Config {
        let mut builder = Config::builder()
            .request_timeout(Duration::from_secs(self.request_timeout))
            .conversion_timeout(Duration::from_secs(self.conversion_timeout))
            .max_content_size(self.max_content_size)
            .chunk_size(self.chunk_size)
            .user_agent(self.user_agent.clone());

        if let Some(ref dir) = self.temp_dir {
            builder = builder.temp_dir(dir);
        }

        builder.build()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            pipeline,
        } => {
            if let Err(e) = run_serve(&host, port, pipeline.to_config()).await {
                error!(error = %e, "Server terminated");
                std::process::exit(1);
            }
        }
        Commands::Convert { url, pipeline } => {
            run_convert(&url, pipeline.to_config()).await;
        }
    }
}

async fn run_serve(host: &str, port: u16, config: Config) -> io::Result<()> {
    let pipeline = Pipeline::new(config).map_err(io::Error::other)?;

    let listener = bind_listener(host, port).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(Arc::new(pipeline)))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn run_convert(url: &str, config: Config) {
    let url = match target::classify(url.trim_start_matches('/')) {
        Target::Convert(url) => url,
        Target::Welcome | Target::NotFound => {
            eprintln!("Error: not a convertible URL: {url:?}");
            std::process::exit(1);
        }
    };

    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match pipeline.convert(&url).await {
        Ok(markdown) => writeln_safe(&markdown),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Bind `host:port`; host may be a name, an IP or a bracketed IPv6 address
async fn bind_listener(host: &str, port: u16) -> io::Result<TcpListener> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    TcpListener::bind((host, port)).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
