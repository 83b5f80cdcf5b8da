use super::*;
use core::future::poll_fn;
use futures::FutureExt;
use std::sync::atomic::AtomicUsize as StdAtomicUsize;

fn counting_pair<T>(
    config: PublisherConfig,
) -> (PublisherSource<T>, Publisher<T>, Arc<StdAtomicUsize>) {
    let fired = Arc::new(StdAtomicUsize::new(0));
    let (source, publisher) = {
        let fired = Arc::clone(&fired);
        publisher(config, move || {
            fired.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
    };
    (source, publisher, fired)
}

async fn pull<T: Send>(source: &mut PublisherSource<T>) -> Pull<T> {
    poll_fn(|cx| Pin::new(&mut *source).poll_pull(cx)).await
}

fn fired(count: &StdAtomicUsize) -> usize {
    count.load(std::sync::atomic::Ordering::SeqCst)
}

#[tokio::test]
async fn delivers_pushes_in_order_then_end() {
    let (mut source, publisher, count) = counting_pair(PublisherConfig::unbounded());

    for i in 0..100 {
        publisher.push(i).unwrap();
    }
    publisher.complete().unwrap();

    for i in 0..100 {
        assert_eq!(pull(&mut source).await, Pull::Item(i));
    }
    assert_eq!(fired(&count), 0);
    assert_eq!(pull(&mut source).await, Pull::End);
    assert_eq!(fired(&count), 1);
    assert!(publisher.is_closed());
}

#[tokio::test]
async fn fail_drains_queued_values_then_errors() {
    let (mut source, publisher, count) = counting_pair(PublisherConfig::default());

    publisher.push(1).unwrap();
    assert_eq!(pull(&mut source).await, Pull::Item(1));

    publisher.push(2).unwrap();
    publisher.push(3).unwrap();
    publisher.fail("boom").unwrap();
    // Anything pushed after the failure never reaches the stream.
    assert!(matches!(publisher.push(4), Err(PushError::Closed(4))));

    assert_eq!(pull(&mut source).await, Pull::Item(2));
    assert_eq!(pull(&mut source).await, Pull::Item(3));
    assert_eq!(fired(&count), 0);
    assert_eq!(
        pull(&mut source).await,
        Pull::Failed(ProducerError::new("boom"))
    );
    assert_eq!(fired(&count), 1);
    assert_eq!(pull(&mut source).await, Pull::End);
    assert_eq!(fired(&count), 1);
}

#[tokio::test]
async fn send_waiting_on_capacity_is_rejected_by_fail() {
    let (mut source, publisher, _count) = counting_pair(PublisherConfig::bounded(1));
    publisher.push(1).unwrap();

    let waiting = publisher.send(2);
    tokio::pin!(waiting);
    assert!(waiting.as_mut().now_or_never().is_none());

    publisher.fail("boom").unwrap();
    assert!(matches!(waiting.await, Err(PushError::Closed(2))));
    assert_eq!(pull(&mut source).await, Pull::Item(1));
    assert_eq!(
        pull(&mut source).await,
        Pull::Failed(ProducerError::new("boom"))
    );
}

#[test]
fn bounded_capacity_is_clamped_to_semaphore_limit() {
    let config = PublisherConfig::bounded(usize::MAX);
    assert_eq!(
        config.capacity.map(NonZeroUsize::get),
        Some(Semaphore::MAX_PERMITS)
    );
    assert_eq!(
        PublisherConfig::bounded(0).capacity,
        Some(NonZeroUsize::MIN)
    );

    let (_source, publisher, _count) = counting_pair(config);
    for i in 0..1000 {
        publisher.push(i).unwrap();
    }

    // A hand-built config past the limit is clamped when the queue is made.
    let (_source, publisher, _count) = counting_pair(PublisherConfig {
        capacity: NonZeroUsize::new(usize::MAX),
    });
    publisher.push(0).unwrap();
}

#[tokio::test]
async fn terminal_calls_are_exclusive() {
    let (_source, publisher, _count) = counting_pair::<u8>(PublisherConfig::default());

    publisher.complete().unwrap();
    assert!(matches!(publisher.complete(), Err(Error::PublisherClosed)));
    assert!(matches!(publisher.fail("late"), Err(Error::PublisherClosed)));
    assert!(matches!(publisher.push(1), Err(PushError::Closed(1))));
}

#[tokio::test]
async fn bounded_queue_reports_full() {
    let (mut source, publisher, _count) = counting_pair(PublisherConfig::bounded(2));

    publisher.push('a').unwrap();
    publisher.push('b').unwrap();
    assert!(matches!(publisher.push('c'), Err(PushError::Full('c'))));

    assert_eq!(pull(&mut source).await, Pull::Item('a'));
    publisher.push('c').unwrap();
    assert_eq!(pull(&mut source).await, Pull::Item('b'));
    assert_eq!(pull(&mut source).await, Pull::Item('c'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_waits_for_capacity() {
    let (mut source, publisher, _count) = counting_pair(PublisherConfig::bounded(1));
    publisher.push(1).unwrap();

    let feeder = {
        let publisher = publisher.clone();
        tokio::spawn(async move { publisher.send(2).await })
    };

    // The feeder cannot make progress until a slot frees up.
    tokio::task::yield_now().await;
    assert!(!feeder.is_finished());

    assert_eq!(pull(&mut source).await, Pull::Item(1));
    feeder.await.unwrap().unwrap();
    assert_eq!(pull(&mut source).await, Pull::Item(2));
}

#[tokio::test]
async fn send_fails_when_stream_closes_while_waiting() {
    let (mut source, publisher, _count) = counting_pair(PublisherConfig::bounded(1));
    publisher.push(1).unwrap();

    let waiting = publisher.send(2);
    tokio::pin!(waiting);
    assert!(waiting.as_mut().now_or_never().is_none());

    Pin::new(&mut source).on_cancel();
    assert!(matches!(waiting.await, Err(PushError::Closed(2))));
}

#[tokio::test]
async fn dropping_every_handle_ends_the_stream() {
    let (mut source, publisher, count) = counting_pair(PublisherConfig::default());
    let second = publisher.clone();

    publisher.push(1).unwrap();
    drop(publisher);
    second.push(2).unwrap();
    drop(second);

    assert_eq!(pull(&mut source).await, Pull::Item(1));
    assert_eq!(pull(&mut source).await, Pull::Item(2));
    assert_eq!(pull(&mut source).await, Pull::End);
    assert_eq!(fired(&count), 1);
}

#[tokio::test]
async fn cancel_fires_notification_once_and_closes() {
    let (mut source, publisher, count) = counting_pair(PublisherConfig::default());
    publisher.push(1).unwrap();

    Pin::new(&mut source).on_cancel();
    Pin::new(&mut source).on_cancel();
    drop(source);

    assert_eq!(fired(&count), 1);
    assert!(publisher.is_closed());
    publisher.closed().await;
    assert!(matches!(publisher.push(2), Err(PushError::Closed(2))));
    assert!(matches!(publisher.complete(), Err(Error::PublisherClosed)));
}

#[test]
fn dropping_an_unbound_source_releases_the_producer() {
    let (source, publisher, count) = counting_pair::<()>(PublisherConfig::default());
    drop(source);
    assert_eq!(fired(&count), 1);
    assert!(publisher.is_closed());
}
