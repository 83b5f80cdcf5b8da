use crate::{
    binder::{StreamBinder, StreamFactory},
    encoder::Encoder,
    error::ProducerError,
    producer::{
        BoxProducer, GeneratorProducer, PipelineProducer, Producer, Publisher, PublisherConfig,
        publisher,
    },
};
use futures::Stream;
use tokio::runtime::Handle;

/// A not-yet-bound server stream of `T`.
///
/// This is what a handler returns for a streaming method. It owns exactly one
/// producer and is consumed by the dispatch layer, either through
/// [`into_binder`](Self::into_binder) or [`into_factory`](Self::into_factory).
/// Nothing is delivered until it is bound.
#[must_use = "a stream does nothing unless it is bound"]
pub struct ServerStream<T> {
    producer: BoxProducer<T>,
}

impl<T: Send + 'static> ServerStream<T> {
    /// Wraps any [`Producer`].
    pub fn from_producer<P>(producer: P) -> Self
    where
        P: Producer<T> + Send + 'static,
    {
        Self {
            producer: Box::pin(producer),
        }
    }

    /// Builds a stream from an async generator.
    ///
    /// ```
    /// use tributary::{ProducerError, ServerStream};
    ///
    /// let numbers = futures::stream::iter([1, 2, 3].map(Ok::<_, ProducerError>));
    /// let stream = ServerStream::from_generator(numbers);
    /// # drop(stream);
    /// ```
    pub fn from_generator<S, E>(generator: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<ProducerError> + 'static,
    {
        Self::from_producer(GeneratorProducer::new(generator))
    }

    /// Builds a stream by mapping an existing fallible stream: each value
    /// through `map_item`, the terminal failure through `map_err`.
    pub fn from_pipeline<S, U, E, F, G>(source: S, map_item: F, map_err: G) -> Self
    where
        S: Stream<Item = Result<U, E>> + Send + 'static,
        F: FnMut(U) -> T + Send + 'static,
        G: FnMut(E) -> ProducerError + Send + 'static,
    {
        Self::from_producer(PipelineProducer::new(source, map_item, map_err))
    }

    /// Creates a push-driven stream and the [`Publisher`] that feeds it.
    ///
    /// `on_complete_or_cancel` runs exactly once, when the stream finishes for
    /// any reason. Release whatever feeds the publisher there.
    pub fn publisher<F>(config: PublisherConfig, on_complete_or_cancel: F) -> (Self, Publisher<T>)
    where
        F: FnOnce() + Send + 'static,
    {
        let (source, handle) = publisher(config, on_complete_or_cancel);
        (Self::from_producer(source), handle)
    }

    /// [`publisher`](Self::publisher) with [`PublisherConfig::default`].
    pub fn publisher_default<F>(on_complete_or_cancel: F) -> (Self, Publisher<T>)
    where
        F: FnOnce() + Send + 'static,
    {
        Self::publisher(PublisherConfig::default(), on_complete_or_cancel)
    }

    /// Hands the stream to a binder; the single bind happens there.
    pub fn into_binder(self) -> StreamBinder<T> {
        StreamBinder::new(self.producer)
    }

    /// Fixes the executor and encoder now and leaves the remote callback and
    /// first response for [`StreamFactory::start`].
    pub fn into_factory<E>(self, executor: Handle, encoder: E) -> StreamFactory<T, E>
    where
        E: Encoder<T>,
    {
        StreamFactory::new(self.into_binder(), executor, encoder)
    }
}

impl<T> core::fmt::Debug for ServerStream<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServerStream").finish_non_exhaustive()
    }
}
