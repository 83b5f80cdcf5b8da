use portable_atomic::{AtomicU8, Ordering};

/// Lifecycle of a stream binder.
///
/// ```text
/// Unbound -> Bound -> { Delivering <-> AwaitingNext } -> { Completed | Failed | Cancelled }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinderState {
    /// Waiting for dispatch to supply encoder, executor and callback.
    Unbound = 0,
    /// Bound; the first-response handshake has not been sent yet.
    Bound = 1,
    /// Encoding or handing an item to the transport.
    Delivering = 2,
    /// Parked until the producer has the next value ready.
    AwaitingNext = 3,
    /// The end-of-stream frame was handed to the transport.
    Completed = 4,
    /// The error frame was handed to the transport, or delivery failed.
    Failed = 5,
    /// The remote side cancelled the stream.
    Cancelled = 6,
}

impl BinderState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Unbound,
            1 => Self::Bound,
            2 => Self::Delivering,
            3 => Self::AwaitingNext,
            4 => Self::Completed,
            5 => Self::Failed,
            _ => Self::Cancelled,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// How a bound stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOutcome {
    /// The producer ended and the end frame was delivered.
    Completed,
    /// The producer failed and the error frame was delivered.
    Failed,
    /// The remote side cancelled before a terminal frame went out.
    Cancelled,
}

/// Shared, lock-free cell holding a [`BinderState`].
///
/// The delivery task and any number of cancelling threads race on it;
/// terminal states are claimed with compare-and-swap so exactly one of them
/// wins and later attempts observe the winner.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(BinderState::Unbound as u8))
    }

    pub(crate) fn get(&self) -> BinderState {
        BinderState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless a terminal state was already reached.
    ///
    /// Returns `false` when the cell is terminal; the caller lost the race.
    pub(crate) fn advance(&self, next: BinderState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (!BinderState::from_u8(raw).is_terminal()).then_some(next as u8)
            })
            .is_ok()
    }

    /// `Unbound -> Bound`, exactly once.
    pub(crate) fn bind(&self) -> bool {
        self.0
            .compare_exchange(
                BinderState::Unbound as u8,
                BinderState::Bound as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_state_is_sticky() {
        let cell = StateCell::new();
        assert!(cell.bind());
        assert!(!cell.bind());
        assert!(cell.advance(BinderState::Delivering));
        assert!(cell.advance(BinderState::Cancelled));
        assert!(!cell.advance(BinderState::Completed));
        assert!(!cell.advance(BinderState::AwaitingNext));
        assert_eq!(cell.get(), BinderState::Cancelled);
    }
}
