//! Command-line interface for playlist-dl.
//!
//! Thin wrapper over the library: parses arguments, loads configuration,
//! wires the HTTP adapter and ffmpeg transcoder into a downloader, prints
//! progress events, and maps the run report to an exit code.

use clap::Parser;
use playlist_dl::{
    Config, CredentialCache, Error, Event, FfmpegTranscoder, HttpService, PlaylistDownloader,
    run_with_shutdown,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Exit code when the run itself failed (bad input, auth failure, ...)
const EXIT_RUN_FAILED: u8 = 1;
/// Exit code when the run finished but every track failed
const EXIT_ALL_TRACKS_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "playlist-dl",
    version,
    about = "Download a playlist or track from a streaming service to tagged MP3 files"
)]
struct Cli {
    /// Playlist or track URI or share URL
    /// (e.g. "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M" or an open.spotify.com link)
    uri: Option<String>,

    /// Path to a JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the output directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Delete cached credentials before doing anything else
    /// (with no URI, just clears and exits)
    #[arg(long)]
    clear_credentials: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            eprintln!("error: {e}");
            ExitCode::from(EXIT_RUN_FAILED)
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> playlist_dl::Result<Config> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let config = serde_json::from_str(&text)?;
            tracing::debug!(path = %path.display(), "Loaded configuration file");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

async fn run(cli: Cli) -> playlist_dl::Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.base_dir = dir;
    }

    let credentials = Arc::new(CredentialCache::new(&config.service)?);
    if cli.clear_credentials {
        credentials.clear().await?;
        if cli.uri.is_none() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    let Some(uri) = cli.uri else {
        return Err(Error::Other(
            "no playlist or track URI given (see --help)".to_string(),
        ));
    };

    let (event_tx, _) = tokio::sync::broadcast::channel(1000);
    let service = Arc::new(HttpService::new(
        &config.service,
        Arc::clone(&credentials),
        event_tx.clone(),
    )?);
    let transcoder = Arc::new(FfmpegTranscoder::from_config(&config.transcode)?);
    let all_failed_is_error = config.processing.all_failed_is_error;
    // service.clone() (not Arc::clone) so the result coerces to the trait objects
    let downloader =
        PlaylistDownloader::with_events(config, service.clone(), service, transcoder, event_tx);

    let mut events = downloader.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let report = run_with_shutdown(&downloader, &uri).await?;
    printer.abort();

    if report.all_failed() && all_failed_is_error {
        Ok(ExitCode::from(EXIT_ALL_TRACKS_FAILED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_event(event: &Event) {
    match event {
        Event::PlaylistStarted {
            id: Some(_),
            name,
            total_tracks,
        } => println!("Downloading \"{name}\" ({total_tracks} tracks)"),
        Event::PlaylistStarted { id: None, name, .. } => println!("Downloading {name}"),
        Event::AuthenticationRequired {
            verification_url,
            user_code,
        } => println!("To sign in, open {verification_url} and enter code {user_code}"),
        Event::TrackComplete {
            index, title, path, ..
        } => println!("  [{index}] done: {title} -> {}", path.display()),
        Event::TrackSkipped {
            index,
            title,
            reason,
            ..
        } => println!("  [{index}] skipped ({reason}): {title}"),
        Event::TrackFailed {
            index,
            title,
            error,
            ..
        } => println!("  [{index}] failed: {title}: {error}"),
        Event::PlaylistComplete {
            succeeded,
            skipped,
            failed,
        } => println!("Finished: {succeeded} downloaded, {skipped} skipped, {failed} failed"),
        // Stage transitions are debug-level detail; tracing already logs them
        Event::TrackStage { .. } => {}
    }
}
