use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::io::{self, AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::codec::PackageEncoder;
use crate::error::{ChannelError, ChannelResult};
use crate::filter::{BoxFilter, PipelineFilter};
use crate::pipe::{Pipe, PipeReader, PipeWriter};

use super::controller::{ChannelState, CloseController};
use super::driver::ParserDriver;
use super::io_tasks::{fill_loop, send_loop};
use super::options::ChannelOptions;
use super::package_queue::{PackageConsumer, PackageQueue};

type BoxedReadHalf = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriteHalf = Box<dyn AsyncWrite + Send + Unpin>;

type OnClosedHook = Box<dyn FnOnce() + Send>;

/// A duplex package channel over one byte transport.
///
/// Owns an inbound pipe feeding the parser driver and an outbound pipe
/// drained by the send loop. `run` starts the three loop tasks and turns the
/// channel into a lazy sequence of parsed packages; sending goes through a
/// [`ChannelHandle`] obtained before `run`.
pub struct Channel<P, C> {
    read_half: BoxedReadHalf,
    write_half: BoxedWriteHalf,
    in_writer: PipeWriter,
    in_reader: PipeReader,
    out_writer: Arc<Mutex<PipeWriter>>,
    out_reader: PipeReader,
    filter: BoxFilter<P, C>,
    context: C,
    options: ChannelOptions,
    controller: Arc<CloseController>,
    on_closed: Arc<SyncMutex<Option<OnClosedHook>>>,
}

impl<P, C> Channel<P, C>
where
    P: Send + 'static,
    C: Send + 'static,
{
    pub fn new<T, F>(
        transport: T,
        filter: F,
        context: C,
        mut options: ChannelOptions,
    ) -> ChannelResult<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
        F: PipelineFilter<P, Context = C> + 'static,
    {
        options.validate()?;
        let (in_writer, in_reader) = options
            .take_in_pipe()
            .unwrap_or_else(|| Pipe::new(options.receive_buffer_size()));
        let (out_writer, out_reader) = options
            .take_out_pipe()
            .unwrap_or_else(|| Pipe::new(options.send_buffer_size()));
        let (read_half, write_half) = io::split(transport);
        let controller = Arc::new(CloseController::new(
            in_reader.cancel_handle(),
            out_writer.completion_handle(),
        ));
        Ok(Channel {
            read_half: Box::new(read_half),
            write_half: Box::new(write_half),
            in_writer,
            in_reader,
            out_writer: Arc::new(Mutex::new(out_writer)),
            out_reader,
            filter: Box::new(filter),
            context,
            options,
            controller,
            on_closed: Arc::new(SyncMutex::new(None)),
        })
    }

    /// Clonable handle for sending and closing; valid before and after
    /// `run`.
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            sender: self.out_writer.clone(),
            controller: self.controller.clone(),
        }
    }

    /// Register the close notification; invoked exactly once, after both
    /// I/O loops have settled.
    pub fn on_closed(&mut self, hook: impl FnOnce() + Send + 'static) {
        *self.on_closed.lock() = Some(Box::new(hook));
    }

    pub fn state(&self) -> ChannelState {
        self.controller.state()
    }

    /// Start the fill, send and parser tasks and return the lazy package
    /// sequence. A channel runs once; it is not restartable.
    pub fn run(self) -> PackageStream<P> {
        self.controller.mark_running();
        debug!("channel running");
        let (producer, consumer) = PackageQueue::bounded(self.options.package_queue_capacity());

        let fill = tokio::spawn(fill_loop(
            self.read_half,
            self.in_writer,
            self.controller.clone(),
            self.controller.subscribe_shutdown(),
            self.options.read_chunk_size(),
        ));
        let send = tokio::spawn(send_loop(
            self.write_half,
            self.out_reader,
            self.controller.clone(),
        ));
        let driver = ParserDriver::new(
            self.in_reader,
            self.filter,
            self.context,
            producer,
            self.options.max_package_length(),
            self.controller.clone(),
        );
        let parse = tokio::spawn(driver.run());

        PackageStream {
            packages: consumer,
            finalize: Some(StreamFinalize {
                tasks: vec![fill, send, parse],
                controller: self.controller,
                on_closed: self.on_closed,
            }),
        }
    }
}

/// Sending and closing endpoint shared with user code.
#[derive(Clone)]
pub struct ChannelHandle {
    sender: Arc<Mutex<PipeWriter>>,
    controller: Arc<CloseController>,
}

impl ChannelHandle {
    /// Buffer raw bytes into the outbound pipe. Completes when the bytes
    /// are committed; a zero-length send completes without writing.
    pub async fn send_bytes(&self, bytes: &[u8]) -> ChannelResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut writer = self.sender.lock().await;
        let flush = writer.write(bytes).await?;
        if flush.is_completed() {
            return Err(ChannelError::ChannelClosed);
        }
        Ok(())
    }

    /// Encode one package and flush it. The encoded bytes are committed
    /// atomically: they never interleave with another sender's.
    pub async fn send_encoded<P, E>(&self, encoder: &E, pkg: &P) -> ChannelResult<()>
    where
        E: PackageEncoder<P>,
    {
        let mut writer = self.sender.lock().await;
        if let Err(e) = encoder.encode(writer.writable(0), pkg) {
            writer.discard_staged();
            return Err(e);
        }
        let flush = writer.flush().await?;
        if flush.is_completed() {
            return Err(ChannelError::ChannelClosed);
        }
        Ok(())
    }

    /// Begin closing the channel: the parser exits promptly, the fill loop
    /// stops waiting on the transport, pending sends fail with
    /// `ChannelClosed`. Idempotent.
    pub fn close(&self) {
        self.controller.close();
    }

    pub fn state(&self) -> ChannelState {
        self.controller.state()
    }

    /// Resolves once the channel reached its terminal state.
    pub async fn closed(&self) {
        let mut rx = self.controller.subscribe_closed();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

struct StreamFinalize {
    tasks: Vec<JoinHandle<()>>,
    controller: Arc<CloseController>,
    on_closed: Arc<SyncMutex<Option<OnClosedHook>>>,
}

impl StreamFinalize {
    async fn settle(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("channel loop task panicked: {:?}", e);
                }
            }
        }
        self.controller.set_closed();
        let hook = self.on_closed.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        debug!("channel closed");
    }
}

/// Lazy sequence of parsed packages; ends when the channel closes.
pub struct PackageStream<P> {
    packages: PackageConsumer<P>,
    finalize: Option<StreamFinalize>,
}

impl<P> PackageStream<P> {
    /// Next package in wire order. The first `None` is returned only after
    /// both I/O loops settled and the close notification fired; internal
    /// errors never surface here.
    pub async fn next(&mut self) -> Option<P> {
        if let Some(pkg) = self.packages.next().await {
            return Some(pkg);
        }
        if let Some(finalize) = self.finalize.take() {
            finalize.settle().await;
        }
        None
    }
}
