//! Command-line interface for the `devserve` binary.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use devserve_core::{
    capture_request, load_responses, MockHandler, ProxyRecorder, RequestRecord, ResponseMapping,
};
use tracing::Level;

use crate::error::ServerError;
use crate::server::{serve_forever, Server};

#[derive(Debug, Parser)]
#[command(name = "devserve", version, about = "Local HTTP endpoint for development")]
pub struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Seconds to wait for a connection in each polling cycle.
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve canned responses and record everything else.
    Mock {
        /// JSON file mapping "METHOD:/path" to a response.
        #[arg(long, value_name = "FILE")]
        responses: Option<PathBuf>,
    },

    /// Forward requests to URL and append each exchange to a transcript.
    Proxy {
        /// Upstream base URL.
        url: String,

        /// Transcript file.
        #[arg(short, long, default_value = "/dev/stdout")]
        output: PathBuf,

        /// Pretty-print transcript entries with N spaces.
        #[arg(long, value_name = "N")]
        indent: Option<usize>,
    },

    /// Capture one request and print it as JSON.
    SingleRequest {
        /// URL to suggest opening once the server is up.
        url: Option<String>,
    },
}

impl Cli {
    /// Log level for the `-v` count, starting from INFO.
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Errors surfaced by the binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] devserve_core::ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("cannot print captured request: {0}")]
    Output(#[from] serde_json::Error),

    #[error("cannot write to stdout: {0}")]
    Io(#[from] std::io::Error),
}

/// Print a captured request as indented JSON followed by a newline.
pub fn write_record<W: Write>(out: &mut W, record: &RequestRecord) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, record)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Run the selected mode to completion.
pub fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let timeout = cli.timeout();
    match cli.command {
        Command::Mock { responses } => {
            let mapping = match responses {
                Some(path) => load_responses(&path)?,
                None => ResponseMapping::new(),
            };
            serve_forever(MockHandler::new(mapping)?, &cli.host, cli.port, timeout)?;
        }
        Command::Proxy { url, output, indent } => {
            let recorder = ProxyRecorder::new(&url)
                .with_output(output)
                .with_json_indent(indent);
            serve_forever(recorder, &cli.host, cli.port, timeout)?;
        }
        Command::SingleRequest { url } => {
            let server = Server::bind(capture_request(), &cli.host, cli.port)?.with_timeout(timeout);
            if let Some(url) = url {
                eprintln!("Please open {url} in your browser");
            }
            match server.capture() {
                Ok(record) => write_record(&mut std::io::stdout().lock(), &record)?,
                Err(err) if err.is_aborted() => {
                    eprintln!("Server stopped by user");
                    return Ok(ExitCode::FAILURE);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
