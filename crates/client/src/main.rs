// hangwire-replay: feed recorded channel frames through the sync coordinator.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hangwire_client::client::Client;
use hangwire_client::config::ClientConfig;
use hangwire_client::model::InMemoryModel;
use hangwire_client::runtime::ChannelEvent;
use hangwire_client::transport::OfflineTransport;
use hangwire_common::protocol::{parse_frame, ChannelPayload, Envelope};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hangwire-replay", about = "Replay recorded chat channel frames")]
struct Args {
    /// File with one raw channel frame per line.
    frames: PathBuf,
    /// Only decode frames and print what each one carries.
    #[arg(long)]
    decode_only: bool,
    /// Config file (defaults to ~/.hangwire/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Watermark left by a previous run, in microseconds.
    #[arg(long)]
    since: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClientConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClientConfig::load(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let text = std::fs::read_to_string(&args.frames)
        .with_context(|| format!("failed to read {}", args.frames.display()))?;
    let frames: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    info!(frames = frames.len(), "replaying channel frames");

    if args.decode_only {
        for (index, frame) in frames.iter().enumerate() {
            println!("{index}: {}", describe(frame));
        }
        return Ok(());
    }

    let client = Client::new(OfflineTransport, InMemoryModel::new(), config);
    if let Some(since) = args.since {
        client.coordinator().resume_from(since).await;
    }

    let channel = client.spawn_channel();
    channel.send(ChannelEvent::Connected).await?;
    for frame in frames {
        channel.send(ChannelEvent::Frame(frame.to_string())).await?;
    }
    let summary = channel.finish().await?;
    client.shutdown().await;

    println!(
        "frames: {} (keep-alive {}, dropped {}), state updates: {}",
        summary.frames, summary.keep_alives, summary.dropped_frames, summary.state_updates
    );
    let state = client.coordinator().state().await;
    println!("watermark: {}", state.last_sync_timestamp);
    if let Some(client_id) = &state.client_id {
        println!("client id: {client_id}");
    }
    client
        .coordinator()
        .with_model(|model| {
            for (id, entry) in model.conversations() {
                let name = entry.snapshot.name.as_deref().unwrap_or("-");
                println!("{id}\t{name}\t{} events", entry.events.len());
            }
        })
        .await;
    Ok(())
}

fn describe(frame: &str) -> String {
    match parse_frame(frame) {
        Ok(Envelope::KeepAlive) => "keep-alive".into(),
        Ok(Envelope::Message(message)) => {
            let client_id = message.client_id.as_deref().unwrap_or("-");
            match message.payload {
                ChannelPayload::None => format!("client id {client_id}"),
                ChannelPayload::BatchUpdate(batch) => {
                    let kinds: Vec<&str> =
                        batch.state_update.iter().map(|u| u.payload.kind()).collect();
                    format!("batch of {} [{}]", kinds.len(), kinds.join(", "))
                }
                ChannelPayload::Ignored { discriminator } => format!("ignored ({discriminator})"),
            }
        }
        Err(error) => format!("error at {}: {error}", error.path()),
    }
}
