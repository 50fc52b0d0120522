pub mod channel;
pub mod codec;
pub mod error;
pub mod filter;
pub mod pipe;

pub use channel::{
    Channel, ChannelHandle, ChannelOptions, ChannelState, PackageStream, DEFAULT_BUFFER_SIZE,
};
pub use codec::{LengthFieldEncoder, PackageEncoder, TerminatorEncoder};
pub use error::{ChannelError, ChannelResult};
pub use filter::{
    BoxFilter, FixedLengthFilter, LengthFieldFilter, LengthPrefix, PipelineFilter,
    TerminatorFilter,
};
pub use pipe::{ByteSegments, Pipe, PipeReader, PipeWriter, SeqReader};
