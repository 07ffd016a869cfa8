use clap::Parser;
use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_playlist_export::config::ExportConfig;
use youtube_playlist_export::{ExportOutcome, run_export};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout is reserved for the status lines below.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let config = ExportConfig::parse();

    match run_export(&config, |channel_id| println!("Channel ID: {channel_id}")).await? {
        ExportOutcome::ChannelNotFound { channel } => {
            tracing::warn!(channel = %channel, "channel search returned no results");
            println!("Could not find the channel. Please check the channel name.");
        }
        ExportOutcome::ChannelLookupFailed { channel, error } => {
            tracing::error!(channel = %channel, error = %error, "channel search failed");
            println!("Could not look up the channel: {error}");
        }
        ExportOutcome::Exported { path, videos, .. } => {
            println!(
                "CSV file '{}' has been created with {videos} videos.",
                path.display()
            );
        }
    }

    Ok(())
}
