//! Byte-pipe plumbing between the transport loops and the parser driver.
//!
//! This module provides:
//! - SPSC byte pipes with explicit `(consumed, examined)` reader positions
//! - Zero-copy segmented views over buffered bytes
//! - A sequence reader for incremental protocol parsing

mod byte_pipe;
mod segments;
mod seq_reader;

pub use byte_pipe::{
    FlushResult, Pipe, PipeCancel, PipeCompletion, PipeReader, PipeWriter, ReadResult,
};
pub use segments::ByteSegments;
pub use seq_reader::SeqReader;
