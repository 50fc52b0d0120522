use getset::CopyGetters;

use crate::error::{ChannelError, ChannelResult};
use crate::pipe::{PipeReader, PipeWriter};

pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;
const DEFAULT_PACKAGE_QUEUE_CAPACITY: usize = 1024;

/// Per-channel tuning knobs.
#[derive(Debug, CopyGetters)]
pub struct ChannelOptions {
    /// target size of a single contiguous inbound read
    #[get_copy = "pub"]
    receive_buffer_size: usize,
    /// pause threshold of the outbound pipe; senders park beyond it
    #[get_copy = "pub"]
    send_buffer_size: usize,
    /// 0 = unlimited; otherwise a hard bound on the bytes one package may span
    #[get_copy = "pub"]
    max_package_length: usize,
    /// bound of the parsed-package queue between driver and consumer
    #[get_copy = "pub"]
    package_queue_capacity: usize,
    /// pre-built inbound pipe; the channel constructs one otherwise
    in_pipe: Option<(PipeWriter, PipeReader)>,
    /// pre-built outbound pipe; the channel constructs one otherwise
    out_pipe: Option<(PipeWriter, PipeReader)>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        ChannelOptions {
            receive_buffer_size: DEFAULT_BUFFER_SIZE,
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            max_package_length: 0,
            package_queue_capacity: DEFAULT_PACKAGE_QUEUE_CAPACITY,
            in_pipe: None,
            out_pipe: None,
        }
    }
}

impl ChannelOptions {
    pub fn new() -> Self {
        ChannelOptions::default()
    }

    pub fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    pub fn with_max_package_length(mut self, length: usize) -> Self {
        self.max_package_length = length;
        self
    }

    pub fn with_package_queue_capacity(mut self, capacity: usize) -> Self {
        self.package_queue_capacity = capacity;
        self
    }

    /// Inject a pre-built inbound pipe, mainly for tests and transport
    /// adapters that need to observe the byte path directly.
    pub fn with_in_pipe(mut self, pipe: (PipeWriter, PipeReader)) -> Self {
        self.in_pipe = Some(pipe);
        self
    }

    /// Inject a pre-built outbound pipe.
    pub fn with_out_pipe(mut self, pipe: (PipeWriter, PipeReader)) -> Self {
        self.out_pipe = Some(pipe);
        self
    }

    pub(crate) fn take_in_pipe(&mut self) -> Option<(PipeWriter, PipeReader)> {
        self.in_pipe.take()
    }

    pub(crate) fn take_out_pipe(&mut self) -> Option<(PipeWriter, PipeReader)> {
        self.out_pipe.take()
    }

    pub(crate) fn validate(&self) -> ChannelResult<()> {
        if self.receive_buffer_size == 0 {
            return Err(ChannelError::InvalidValue(
                "receive_buffer_size",
                self.receive_buffer_size.to_string(),
            ));
        }
        if self.send_buffer_size == 0 {
            return Err(ChannelError::InvalidValue(
                "send_buffer_size",
                self.send_buffer_size.to_string(),
            ));
        }
        if self.package_queue_capacity == 0 {
            return Err(ChannelError::InvalidValue(
                "package_queue_capacity",
                self.package_queue_capacity.to_string(),
            ));
        }
        Ok(())
    }

    /// A single read never pulls in more than one oversize package.
    pub(crate) fn read_chunk_size(&self) -> usize {
        if self.max_package_length > 0 {
            self.receive_buffer_size.min(self.max_package_length)
        } else {
            self.receive_buffer_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::Pipe;

    #[test]
    fn test_zero_receive_buffer_size_is_invalid() {
        let options = ChannelOptions::new().with_receive_buffer_size(0);
        assert!(matches!(
            options.validate(),
            Err(ChannelError::InvalidValue("receive_buffer_size", _))
        ));
    }

    #[test]
    fn test_read_chunk_size_respects_max_package_length() {
        let options = ChannelOptions::new().with_max_package_length(8);
        assert_eq!(options.read_chunk_size(), 8);
        let options = ChannelOptions::new();
        assert_eq!(options.read_chunk_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_injected_pipes_are_taken_once() {
        let mut options = ChannelOptions::new().with_in_pipe(Pipe::new(16));
        assert!(options.take_in_pipe().is_some());
        assert!(options.take_in_pipe().is_none());
        assert!(options.take_out_pipe().is_none());
    }
}
