//! Package encoders: the outbound duals of the protocol filters.

mod length_field;
mod terminator;

pub use length_field::LengthFieldEncoder;
pub use terminator::TerminatorEncoder;

use bytes::BytesMut;

use crate::error::ChannelResult;

/// Serializes packages of type `P` into the outbound byte writer.
pub trait PackageEncoder<P>: Send + Sync {
    /// Write the encoded form of `pkg` into `dst` and return the number of
    /// bytes written. Implementations must not retain `dst`.
    fn encode(&self, dst: &mut BytesMut, pkg: &P) -> ChannelResult<usize>;
}
