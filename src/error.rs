use std::borrow::Cow;
use std::io;

pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("error in reading transport stream : {0}")]
    TransportRead(Cow<'static, str>),

    #[error("error in writing transport stream : {0}")]
    TransportWrite(Cow<'static, str>),

    /// raised by a pipeline filter on malformed input
    #[error("protocol error : {0}")]
    Protocol(Cow<'static, str>),

    #[error("package of length {length} exceeds the maximum package length {limit}")]
    OversizePackage { length: usize, limit: usize },

    /// raised to senders once the channel is closing or closed
    #[error("channel is closed")]
    ChannelClosed,

    #[error("invalid provided {0} value = {1}")]
    InvalidValue(&'static str, String),

    #[error("I/O {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    /// Both filter-raised violations and the oversize guard count as
    /// protocol errors; they terminate the channel the same way.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ChannelError::Protocol(_) | ChannelError::OversizePackage { .. }
        )
    }
}
