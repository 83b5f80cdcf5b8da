use super::{Producer, Pull};
use crate::error::ProducerError;
use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};
use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// Adapts an existing fallible stream into a [`Producer`] of a different
    /// element type.
    ///
    /// For every event of the source exactly one transform runs: `map_item`
    /// for a value, `map_err` for a failure. Order is preserved and the first
    /// failure ends the stream.
    #[must_use = "producers do nothing unless bound to a stream"]
    pub struct PipelineProducer<S, F, G> {
        #[pin]
        source: S,
        map_item: F,
        map_err: G,
        finished: bool,
    }
}

impl<S, F, G> PipelineProducer<S, F, G> {
    pub const fn new(source: S, map_item: F, map_err: G) -> Self {
        Self {
            source,
            map_item,
            map_err,
            finished: false,
        }
    }
}

impl<S, U, E, T, F, G> Producer<T> for PipelineProducer<S, F, G>
where
    S: Stream<Item = Result<U, E>> + Send,
    F: FnMut(U) -> T + Send,
    G: FnMut(E) -> ProducerError + Send,
{
    fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Pull<T>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(Pull::End);
        }

        let pulled = match ready!(this.source.poll_next(cx)) {
            Some(Ok(value)) => return Poll::Ready(Pull::Item((this.map_item)(value))),
            Some(Err(e)) => Pull::Failed((this.map_err)(e)),
            None => Pull::End,
        };
        *this.finished = true;
        Poll::Ready(pulled)
    }
}
