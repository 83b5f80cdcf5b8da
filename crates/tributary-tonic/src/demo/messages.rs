use prost::Message;

/// One value of the demo stream.
#[derive(Clone, PartialEq, Message)]
pub struct Tick {
    #[prost(uint64, tag = "1")]
    pub seq: u64,
    /// Which producer adapter emitted the tick.
    #[prost(string, tag = "2")]
    pub source: String,
}

impl Tick {
    pub fn new(seq: u64, source: &str) -> Self {
        Self {
            seq,
            source: source.to_owned(),
        }
    }
}

/// Unary response sent ahead of the stream when `--unary` is set.
#[derive(Clone, PartialEq, Message)]
pub struct Summary {
    #[prost(string, tag = "1")]
    pub text: String,
}
