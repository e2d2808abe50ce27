use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use vodmux_engine::{DownloaderConfig, HlsConfig, HlsDownloadError, HlsDownloader};

mod cli;
mod error;
mod progress;
mod sink;

use cli::CliArgs;
use error::AppError;
use progress::CliObserver;
use sink::FileSink;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    if args.batch_size == 0 {
        return Err(AppError::InvalidInput(
            "batch size must be at least 1".to_string(),
        ));
    }

    let mut base_builder = DownloaderConfig::builder()
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout));
    for header in &args.headers {
        let Some((name, value)) = header.split_once(':') else {
            return Err(AppError::InvalidInput(format!(
                "invalid header '{header}', expected 'Name: Value'"
            )));
        };
        base_builder = base_builder.with_header(name.trim(), value.trim());
    }

    let mut hls_config = HlsConfig {
        base: base_builder.build(),
        ..Default::default()
    };
    hls_config.fetcher_config.segment_batch_size = args.batch_size;
    hls_config.fetcher_config.max_segment_retries = args.retries;

    let downloader = HlsDownloader::new(hls_config)?;

    let output_dir = args.output_dir.unwrap_or_else(|| PathBuf::from("."));
    let sink = FileSink::new(output_dir);
    let observer = CliObserver::new(args.show_progress);

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling download");
            ctrl_c_token.cancel();
        }
    });

    info!(url = %args.url, "Starting download");
    // No transcoder capability is wired into the CLI, so output is always a
    // raw transport stream concatenation.
    match downloader
        .download(
            &args.url,
            args.name.as_deref(),
            None,
            &sink,
            &observer,
            &token,
        )
        .await
    {
        Ok(()) => Ok(()),
        Err(HlsDownloadError::Aborted) => {
            info!("Download aborted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
