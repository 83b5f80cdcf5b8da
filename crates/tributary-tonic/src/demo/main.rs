#![doc = include_str!("../../README.md")]

mod config;
mod messages;
mod source;
mod telemetry;

use bytes::Bytes;
use clap::Parser;
use config::{CliArgs, DemoConfig};
use futures::StreamExt;
use messages::{Summary, Tick};
use prost::Message;
use telemetry::init_tracing;
use tokio::{runtime::Handle, signal};
use tributary_tonic::{
    GrpcStreamCallback, ProstEncoder, ResponseStream, first_response,
    tributary::{Binding, ResponseAndServerStream, StreamServerHandle},
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DemoConfig::try_from(args)?;

    init_tracing()?;
    log_startup_info(&config);

    let (stream, feeder) = source::build(&config);
    let (callback, pending) = GrpcStreamCallback::channel(config.response_buffer);

    let mut binding = Binding::new(ProstEncoder::<Tick>::new(), Handle::current(), callback);
    if let Some(credits) = config.credits {
        binding = binding.with_credits(credits);
    }

    let bound = match &config.unary {
        Some(text) => {
            let summary = Summary { text: text.clone() };
            ResponseAndServerStream::new(summary, stream)
                .bind(|summary| Ok(Bytes::from(summary.encode_to_vec())), binding)?
        }
        None => stream.into_binder().bind(binding)?,
    };
    let server = bound.server_handle();

    let response = pending.response().await?;
    if let Some(first) = first_response(response.metadata()) {
        tracing::info!("Unary response: {}", Summary::decode(first)?.text);
    }

    let mut ticks = response.into_inner();
    let grant_credits = config.credits.is_some();
    tokio::select! {
        received = consume(&mut ticks, &server, grant_credits) => {
            tracing::info!("Client received {} ticks", received);
        }
        () = ctrl_c() => {
            tracing::info!("Received Ctrl+C signal; disconnecting client");
        }
    }
    // Dropping the response is how a client disconnect looks to the stream.
    drop(ticks);

    let outcome = bound.join().await?;
    if let Some(feeder) = feeder {
        feeder.await?;
    }
    tracing::info!(?outcome, "Stream finished");
    Ok(())
}

/// Reads the response like a gRPC client would, granting one credit per tick
/// when flow control is on.
async fn consume(
    ticks: &mut ResponseStream,
    server: &StreamServerHandle,
    grant_credits: bool,
) -> usize {
    let mut received = 0;
    while let Some(frame) = ticks.next().await {
        match frame {
            Ok(bytes) => match Tick::decode(bytes) {
                Ok(tick) => {
                    received += 1;
                    tracing::info!(seq = tick.seq, source = %tick.source, "Tick");
                    if grant_credits {
                        server.request(1);
                    }
                }
                Err(e) => tracing::warn!("Undecodable tick: {}", e),
            },
            Err(status) => {
                tracing::warn!(code = ?status.code(), "Stream failed: {}", status.message());
            }
        }
    }
    received
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
        core::future::pending::<()>().await;
    }
}

fn log_startup_info(config: &DemoConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting demo stream with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting {:?} demo stream of {} ticks",
            config.mode,
            config.items
        );
    }
}
