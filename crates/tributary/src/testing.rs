//! Fixtures shared by the binder and composite test suites.

use crate::{
    ClientCallback, EncodedError, Encoder, Error, FirstResponsePayload, Producer, ProducerError,
    Pull, Result, StreamPayload, StreamServerHandle, encoder_fn,
};
use bytes::Bytes;
use core::{
    pin::Pin,
    task::{Context, Poll},
};
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::mpsc;

/// One call observed by [`RecordingCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    First(Bytes),
    Item(i32),
    Error(String),
    End,
}

/// Encodes `i32` as little-endian bytes and rejects negative values.
pub(crate) fn int_encoder() -> impl Encoder<i32> + Clone {
    encoder_fn(
        |n: i32| {
            if n < 0 {
                return Err(Error::encode(format!("cannot encode {n}")));
            }
            Ok(StreamPayload::new(n.to_le_bytes().to_vec()))
        },
        |err: ProducerError| Ok(EncodedError::new(err.message())),
    )
}

/// Forwards every callback invocation to a channel.
///
/// The channel closes when the delivery task drops the callback, so
/// [`Recorded::all`] doubles as "wait until the callback was released".
pub(crate) struct RecordingCallback {
    frames: mpsc::UnboundedSender<Frame>,
    server: Option<StreamServerHandle>,
    cancel_on_first: bool,
    cancel_after: Option<usize>,
    cancel_on_error: bool,
    fail_on_next: bool,
    delivered: usize,
}

pub(crate) struct Recorded {
    frames: mpsc::UnboundedReceiver<Frame>,
}

impl RecordingCallback {
    pub(crate) fn new() -> (Self, Recorded) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = Self {
            frames: tx,
            server: None,
            cancel_on_first: false,
            cancel_after: None,
            cancel_on_error: false,
            fail_on_next: false,
            delivered: 0,
        };
        (callback, Recorded { frames: rx })
    }

    /// Cancels the stream from inside the handshake.
    pub(crate) fn cancel_on_first(mut self) -> Self {
        self.cancel_on_first = true;
        self
    }

    /// Cancels the stream right after the `n`th item was received.
    pub(crate) fn cancel_after(mut self, n: usize) -> Self {
        self.cancel_after = Some(n);
        self
    }

    /// Cancels the stream while the error frame is being handed over.
    pub(crate) fn cancel_on_error(mut self) -> Self {
        self.cancel_on_error = true;
        self
    }

    /// Rejects every item as if the connection broke.
    pub(crate) fn fail_on_next(mut self) -> Self {
        self.fail_on_next = true;
        self
    }

    fn record(&self, frame: Frame) {
        // The test may have stopped listening.
        let _ = self.frames.send(frame);
    }
}

impl ClientCallback for RecordingCallback {
    async fn on_first_response(
        &mut self,
        payload: FirstResponsePayload,
        server: StreamServerHandle,
    ) -> Result<()> {
        self.record(Frame::First(payload.data));
        if self.cancel_on_first {
            server.cancel();
        }
        self.server = Some(server);
        Ok(())
    }

    async fn on_stream_next(&mut self, payload: StreamPayload) -> Result<()> {
        if self.fail_on_next {
            return Err(Error::transport("connection reset"));
        }
        let raw: [u8; 4] = payload.data[..]
            .try_into()
            .map_err(|_| Error::transport("bad payload"))?;
        self.record(Frame::Item(i32::from_le_bytes(raw)));

        self.delivered += 1;
        if self.cancel_after == Some(self.delivered) {
            if let Some(server) = &self.server {
                server.cancel();
            }
        }
        Ok(())
    }

    async fn on_stream_error(&mut self, error: EncodedError) -> Result<()> {
        self.record(Frame::Error(error.message));
        if self.cancel_on_error {
            if let Some(server) = &self.server {
                server.cancel();
            }
        }
        Ok(())
    }

    async fn on_stream_complete(&mut self) -> Result<()> {
        self.record(Frame::End);
        Ok(())
    }
}

impl Recorded {
    pub(crate) async fn next(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// Every frame, once the callback has been dropped.
    pub(crate) async fn all(mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.frames.recv().await {
            frames.push(frame);
        }
        frames
    }
}

/// How a [`ScriptedProducer`] behaves once its scripted items run out.
#[derive(Debug, Clone)]
pub(crate) enum Tail {
    End,
    Fail(&'static str),
    /// Never yields again and never wakes.
    Hang,
}

/// Counters shared between a [`ScriptedProducer`] and the test.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) pulls: AtomicUsize,
    pub(crate) cancels: AtomicUsize,
}

impl Counters {
    pub(crate) fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub(crate) fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

/// A scripted producer that counts pulls and releases.
pub(crate) struct ScriptedProducer {
    items: VecDeque<i32>,
    tail: Tail,
    counters: Arc<Counters>,
}

impl ScriptedProducer {
    pub(crate) fn new(items: impl IntoIterator<Item = i32>, tail: Tail) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let producer = Self {
            items: items.into_iter().collect(),
            tail,
            counters: Arc::clone(&counters),
        };
        (producer, counters)
    }
}

impl Producer<i32> for ScriptedProducer {
    fn poll_pull(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Pull<i32>> {
        let this = self.get_mut();
        this.counters.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(item) = this.items.pop_front() {
            return Poll::Ready(Pull::Item(item));
        }
        match this.tail {
            Tail::End => Poll::Ready(Pull::End),
            Tail::Fail(message) => Poll::Ready(Pull::Failed(ProducerError::new(message))),
            Tail::Hang => Poll::Pending,
        }
    }

    fn on_cancel(self: Pin<&mut Self>) {
        self.counters.cancels.fetch_add(1, Ordering::SeqCst);
    }
}
