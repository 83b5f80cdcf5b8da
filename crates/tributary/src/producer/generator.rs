use super::{Producer, Pull};
use crate::error::ProducerError;
use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};
use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// Adapts a pull-based async generator into a [`Producer`].
    ///
    /// Any `Stream<Item = Result<T, E>>` works as a generator: an
    /// `async_stream`-style block, `futures::stream::unfold`, a channel
    /// receiver wrapped in a stream. Each pull resumes the generator exactly
    /// once; when it suspends the pull returns `Poll::Pending` and the
    /// generator's own waker drives the delivery task forward.
    ///
    /// Items yielded before a failure are delivered in order before the
    /// failure itself. Once the generator ends or fails it is never polled
    /// again.
    #[must_use = "producers do nothing unless bound to a stream"]
    pub struct GeneratorProducer<S> {
        #[pin]
        generator: S,
        finished: bool,
    }
}

impl<S> GeneratorProducer<S> {
    pub const fn new(generator: S) -> Self {
        Self {
            generator,
            finished: false,
        }
    }
}

impl<S, T, E> Producer<T> for GeneratorProducer<S>
where
    S: Stream<Item = Result<T, E>> + Send,
    E: Into<ProducerError>,
{
    fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Pull<T>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(Pull::End);
        }

        let pulled = match ready!(this.generator.poll_next(cx)) {
            Some(Ok(item)) => return Poll::Ready(Pull::Item(item)),
            Some(Err(e)) => Pull::Failed(e.into()),
            None => Pull::End,
        };
        *this.finished = true;
        Poll::Ready(pulled)
    }
}
