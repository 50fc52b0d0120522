use std::collections::VecDeque;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{ChannelError, ChannelResult};

use super::ByteSegments;

/// In-memory single-producer/single-consumer byte pipe.
///
/// One pipe connects the fill loop with the parser driver (inbound), a
/// second connects senders with the send loop (outbound). The reader side
/// reports `(consumed, examined)` positions: consumed bytes release writer
/// capacity, while examined bytes suppress re-wakes until data arrives past
/// them, so a partial package is not re-parsed on every poll.
#[derive(Debug)]
pub struct Pipe;

impl Pipe {
    /// `capacity` is the pause threshold: `flush` suspends while at least
    /// this many bytes are buffered and unconsumed.
    pub fn new(capacity: usize) -> (PipeWriter, PipeReader) {
        let shared = Arc::new(PipeShared {
            state: Mutex::new(PipeState::default()),
            readable: Notify::new(),
            writable: Notify::new(),
        });
        let writer = PipeWriter {
            shared: shared.clone(),
            staging: BytesMut::new(),
            capacity,
        };
        let reader = PipeReader { shared };
        (writer, reader)
    }
}

#[derive(Debug, Default)]
struct PipeState {
    segments: VecDeque<Bytes>,
    /// absolute offset of the first unconsumed byte
    head: u64,
    /// absolute offset one past the last committed byte
    tail: u64,
    /// absolute position up to which the reader has already looked
    examined: u64,
    writer_done: bool,
    reader_done: bool,
    canceled: bool,
    error: Option<ChannelError>,
}

#[derive(Debug)]
struct PipeShared {
    state: Mutex<PipeState>,
    readable: Notify,
    writable: Notify,
}

impl PipeShared {
    fn complete_writer(&self, error: Option<ChannelError>) {
        {
            let mut state = self.state.lock();
            state.writer_done = true;
            if state.error.is_none() {
                state.error = error;
            }
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    fn complete_reader(&self, error: Option<ChannelError>) {
        {
            let mut state = self.state.lock();
            state.reader_done = true;
            if state.error.is_none() {
                state.error = error;
            }
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    fn cancel(&self) {
        self.state.lock().canceled = true;
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

/// Result of committing staged bytes.
#[derive(Debug, Clone, Copy)]
pub struct FlushResult {
    is_completed: bool,
}

impl FlushResult {
    /// True when the reader side is gone and the bytes went nowhere.
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }
}

/// One wake-up worth of buffered bytes.
#[derive(Debug)]
pub struct ReadResult {
    pub buffer: ByteSegments,
    pub is_completed: bool,
    pub is_canceled: bool,
}

#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<PipeShared>,
    staging: BytesMut,
    capacity: usize,
}

impl PipeWriter {
    /// Contiguous staging region with at least `min_capacity` bytes
    /// reserved. Bytes appended here stay invisible to the reader until
    /// `flush` commits them.
    pub fn writable(&mut self, min_capacity: usize) -> &mut BytesMut {
        self.staging.reserve(min_capacity);
        &mut self.staging
    }

    /// Drop any staged-but-uncommitted bytes, e.g. after a failed encode.
    pub fn discard_staged(&mut self) {
        self.staging.clear();
    }

    /// Stage `bytes` and flush them in one call.
    pub async fn write(&mut self, bytes: &[u8]) -> ChannelResult<FlushResult> {
        if !bytes.is_empty() {
            self.writable(bytes.len()).extend_from_slice(bytes);
        }
        self.flush().await
    }

    /// Commit staged bytes into the shared queue, suspending while the pipe
    /// is at capacity. Returns with `is_completed` set once the reader side
    /// has finished; fails with `ChannelClosed` once this writer was
    /// completed.
    pub async fn flush(&mut self) -> ChannelResult<FlushResult> {
        loop {
            let wait = self.shared.writable.notified();
            {
                let mut state = self.shared.state.lock();
                if state.writer_done {
                    self.staging.clear();
                    return Err(ChannelError::ChannelClosed);
                }
                if state.reader_done || state.canceled {
                    self.staging.clear();
                    return Ok(FlushResult { is_completed: true });
                }
                if self.staging.is_empty() {
                    return Ok(FlushResult {
                        is_completed: false,
                    });
                }
                if (state.tail - state.head) < self.capacity as u64 {
                    let chunk = self.staging.split().freeze();
                    state.tail += chunk.len() as u64;
                    state.segments.push_back(chunk);
                    drop(state);
                    self.shared.readable.notify_waiters();
                    return Ok(FlushResult {
                        is_completed: false,
                    });
                }
            }
            wait.await;
        }
    }

    pub fn complete(&mut self) {
        self.shared.complete_writer(None);
    }

    pub fn complete_with_error(&mut self, error: ChannelError) {
        self.shared.complete_writer(Some(error));
    }

    /// Detached handle that lets another task complete this writer side.
    pub fn completion_handle(&self) -> PipeCompletion {
        PipeCompletion {
            shared: self.shared.clone(),
        }
    }

    pub fn take_error(&mut self) -> Option<ChannelError> {
        self.shared.state.lock().error.take()
    }
}

/// Completes a pipe's writer side from outside the writer task.
#[derive(Debug, Clone)]
pub struct PipeCompletion {
    shared: Arc<PipeShared>,
}

impl PipeCompletion {
    pub fn complete(&self) {
        self.shared.complete_writer(None);
    }
}

/// Cancels a pipe from outside the reader task.
#[derive(Debug, Clone)]
pub struct PipeCancel {
    shared: Arc<PipeShared>,
}

impl PipeCancel {
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<PipeShared>,
}

impl PipeReader {
    /// Suspend until bytes exist past the examined position, the writer
    /// completed, or the pipe was canceled.
    pub async fn read(&mut self) -> ReadResult {
        loop {
            let wait = self.shared.readable.notified();
            {
                let state = self.shared.state.lock();
                if state.canceled {
                    return ReadResult {
                        buffer: ByteSegments::new(Vec::new(), state.head),
                        is_completed: state.writer_done,
                        is_canceled: true,
                    };
                }
                if state.tail > state.examined || state.writer_done {
                    let segments: Vec<Bytes> = state.segments.iter().cloned().collect();
                    return ReadResult {
                        buffer: ByteSegments::new(segments, state.head),
                        is_completed: state.writer_done,
                        is_canceled: false,
                    };
                }
            }
            wait.await;
        }
    }

    /// Report absolute `(consumed, examined)` positions for the buffer
    /// returned by the last `read`. Consumed bytes free writer capacity.
    pub fn advance_to(&mut self, consumed: u64, examined: u64) {
        {
            let mut state = self.shared.state.lock();
            assert!(
                consumed >= state.head && consumed <= state.tail,
                "consumed position outside the buffered range"
            );
            assert!(examined >= consumed, "examined must not precede consumed");
            let mut to_drop = (consumed - state.head) as usize;
            while to_drop > 0 {
                let front = state
                    .segments
                    .front_mut()
                    .expect("buffered segments cover the consumed range");
                if to_drop >= front.len() {
                    to_drop -= front.len();
                    state.segments.pop_front();
                } else {
                    front.advance(to_drop);
                    to_drop = 0;
                }
            }
            state.head = consumed;
            state.examined = examined.min(state.tail).max(consumed);
        }
        self.shared.writable.notify_waiters();
    }

    pub fn complete(&mut self) {
        self.shared.complete_reader(None);
    }

    pub fn complete_with_error(&mut self, error: ChannelError) {
        self.shared.complete_reader(Some(error));
    }

    pub fn cancel_handle(&self) -> PipeCancel {
        PipeCancel {
            shared: self.shared.clone(),
        }
    }

    pub fn take_error(&mut self) -> Option<ChannelError> {
        self.shared.state.lock().error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_write_then_read() {
        let (mut writer, mut reader) = Pipe::new(64);
        writer.write(b"hello").await.unwrap();
        let result = reader.read().await;
        assert!(!result.is_completed && !result.is_canceled);
        assert_eq!(result.buffer.len(), 5);
        assert_eq!(&result.buffer.segments()[0][..], b"hello");
    }

    #[tokio::test]
    async fn test_examined_suppresses_rewake() {
        let (mut writer, mut reader) = Pipe::new(64);
        writer.write(b"part").await.unwrap();
        let result = reader.read().await;
        // consume nothing, mark everything examined
        reader.advance_to(result.buffer.start(), result.buffer.end());

        // no new bytes: the reader must stay parked
        assert!(timeout(Duration::from_millis(50), reader.read())
            .await
            .is_err());

        writer.write(b"ial").await.unwrap();
        let result = reader.read().await;
        assert_eq!(result.buffer.len(), 7);
    }

    #[tokio::test]
    async fn test_flush_backpressure_until_consumed() {
        let (mut writer, mut reader) = Pipe::new(4);
        writer.write(b"abcd").await.unwrap();

        // pipe is at capacity, the second flush must park
        let mut blocked = Box::pin(writer.write(b"efgh"));
        assert!(timeout(Duration::from_millis(50), blocked.as_mut())
            .await
            .is_err());

        let result = reader.read().await;
        let end = result.buffer.end();
        reader.advance_to(end, end);
        blocked.await.unwrap();

        let result = reader.read().await;
        assert_eq!(result.buffer.len(), 4);
    }

    #[tokio::test]
    async fn test_writer_completion_observed_by_reader() {
        let (mut writer, mut reader) = Pipe::new(64);
        writer.write(b"tail").await.unwrap();
        writer.complete();

        let result = reader.read().await;
        assert!(result.is_completed);
        assert_eq!(result.buffer.len(), 4);
    }

    #[tokio::test]
    async fn test_reader_completion_observed_by_writer() {
        let (mut writer, mut reader) = Pipe::new(64);
        reader.complete();
        let flush = writer.write(b"dropped").await.unwrap();
        assert!(flush.is_completed());
    }

    #[tokio::test]
    async fn test_write_after_writer_completed_fails() {
        let (mut writer, _reader) = Pipe::new(64);
        let handle = writer.completion_handle();
        handle.complete();
        assert!(matches!(
            writer.write(b"late").await,
            Err(ChannelError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_cancel_wakes_reader() {
        let (writer, mut reader) = Pipe::new(64);
        let cancel = reader.cancel_handle();
        let read = tokio::spawn(async move { reader.read().await });
        cancel.cancel();
        let result = read.await.unwrap();
        assert!(result.is_canceled);
        drop(writer);
    }

    #[tokio::test]
    async fn test_completion_error_is_stored() {
        let (mut writer, mut reader) = Pipe::new(64);
        reader.complete_with_error(ChannelError::TransportWrite("broken pipe".into()));
        let flush = writer.write(b"x").await.unwrap();
        assert!(flush.is_completed());
        assert!(matches!(
            writer.take_error(),
            Some(ChannelError::TransportWrite(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_consume_keeps_remainder() {
        let (mut writer, mut reader) = Pipe::new(64);
        writer.write(b"one\ntwo").await.unwrap();
        let result = reader.read().await;
        let consumed = result.buffer.position_after(4);
        reader.advance_to(consumed, result.buffer.end());

        writer.write(b"\n").await.unwrap();
        let result = reader.read().await;
        assert_eq!(result.buffer.start(), consumed);
        assert_eq!(result.buffer.len(), 4);
        let joined: Vec<u8> = result
            .buffer
            .segments()
            .iter()
            .flat_map(|s| s.iter().copied())
            .collect();
        assert_eq!(&joined, b"two\n");
    }
}
