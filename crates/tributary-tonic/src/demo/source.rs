//! Builds the demo stream for each producer adapter.

use crate::{
    config::{DemoConfig, Mode},
    messages::Tick,
};
use core::time::Duration;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tributary_tonic::tributary::{ProducerError, Publisher, ServerStream};

/// The stream to bind, plus the feeder task in publisher mode.
pub fn build(config: &DemoConfig) -> (ServerStream<Tick>, Option<JoinHandle<()>>) {
    match config.mode {
        Mode::Generator => (
            generator(config.items, config.fail_after, config.interval),
            None,
        ),
        Mode::Pipeline => (
            pipeline(config.items, config.fail_after, config.interval),
            None,
        ),
        Mode::Publisher => {
            let (stream, publisher) = ServerStream::publisher(config.publisher, || {
                tracing::info!("Publisher released");
            });
            let feeder = tokio::spawn(feed(
                publisher,
                config.items,
                config.fail_after,
                config.interval,
            ));
            (stream, Some(feeder))
        }
    }
}

fn generator(items: u64, fail_after: Option<u64>, interval: Duration) -> ServerStream<Tick> {
    let ticks = futures::stream::unfold(0, move |seq| async move {
        if seq == items {
            return None;
        }
        if fail_after == Some(seq) {
            let error = ProducerError::new(format!("generator gave up after {} ticks", seq));
            return Some((Err(error), items));
        }
        tokio::time::sleep(interval).await;
        Some((Ok(Tick::new(seq, "generator")), seq + 1))
    });
    ServerStream::from_generator(ticks)
}

fn pipeline(items: u64, fail_after: Option<u64>, interval: Duration) -> ServerStream<Tick> {
    let count = usize::try_from(items).unwrap_or(usize::MAX);
    let source = IntervalStream::new(tokio::time::interval(interval))
        .take(count)
        .zip(futures::stream::iter(0..items))
        .map(move |(_, seq)| match fail_after {
            Some(limit) if seq == limit => Err(seq),
            _ => Ok(seq),
        });

    ServerStream::from_pipeline(
        source,
        |seq| Tick::new(seq, "pipeline"),
        |seq| ProducerError::new(format!("pipeline source broke at tick {}", seq)),
    )
}

async fn feed(publisher: Publisher<Tick>, items: u64, fail_after: Option<u64>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    for seq in 0..items {
        if fail_after == Some(seq) {
            if let Err(e) = publisher.fail(format!("publisher failed at tick {}", seq)) {
                tracing::debug!("Stream closed before failing: {}", e);
            }
            return;
        }

        tokio::select! {
            () = publisher.closed() => {
                tracing::debug!("Stream closed; feeder stopping at tick {}", seq);
                return;
            }
            _ = ticker.tick() => {}
        }

        if publisher.send(Tick::new(seq, "publisher")).await.is_err() {
            tracing::debug!("Stream closed; dropping tick {}", seq);
            return;
        }
    }

    if let Err(e) = publisher.complete() {
        tracing::debug!("Stream closed before completing: {}", e);
    }
}
