use std::sync::Arc;

use bytes::{BufMut, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::error::ChannelError;
use crate::pipe::{PipeReader, PipeWriter};

use super::controller::CloseController;

/// Pump bytes from the transport into the inbound pipe until EOF, a fatal
/// I/O error, or shutdown.
pub(crate) async fn fill_loop<R>(
    mut transport: R,
    mut writer: PipeWriter,
    controller: Arc<CloseController>,
    mut shutdown: broadcast::Receiver<()>,
    chunk_size: usize,
) where
    R: AsyncRead + Unpin,
{
    while !controller.is_closing() {
        let region = writer.writable(chunk_size);
        let mut limited = region.limit(chunk_size);
        let read = tokio::select! {
            res = transport.read_buf(&mut limited) => res,
            _ = shutdown.recv() => {
                debug!("fill loop exit after recv shutdown signal");
                break;
            }
        };
        match read {
            // transport reached end of stream
            Ok(0) => {
                debug!("fill loop exit on transport eof");
                break;
            }
            Ok(_) => match writer.flush().await {
                Ok(flush) if flush.is_completed() => {
                    debug!("fill loop exit, parser side completed");
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            },
            Err(e) => {
                error!("error in reading transport stream : {}", e);
                writer.complete_with_error(ChannelError::TransportRead(e.to_string().into()));
                break;
            }
        }
    }
    // completing the inbound writer lets the parser drain what is buffered;
    // completing the outbound side cascades shutdown into the send loop
    writer.complete();
    controller.complete_outbound();
    controller.transition_closing();
}

/// Drain the outbound pipe and push its bytes to the transport until
/// completion, cancellation, or a fatal write error.
pub(crate) async fn send_loop<W>(
    mut transport: W,
    mut reader: PipeReader,
    controller: Arc<CloseController>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let result = reader.read().await;
        if result.is_canceled {
            debug!("send loop exit after pipe cancel");
            break;
        }
        let end = result.buffer.end();
        if !result.buffer.is_empty() {
            if let Err(e) = write_buffer(&mut transport, result.buffer.segments()).await {
                error!("error in writing transport stream : {}", e);
                reader.complete_with_error(ChannelError::TransportWrite(e.to_string().into()));
                controller.close();
                return;
            }
        }
        // all bytes handed to the transport
        reader.advance_to(end, end);
        if result.is_completed {
            debug!("send loop exit, outbound writer completed");
            break;
        }
    }
    reader.complete();
    controller.transition_closing();
    let _ = transport.shutdown().await;
}

async fn write_buffer<W>(transport: &mut W, segments: &[Bytes]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for segment in segments {
        transport.write_all(segment).await?;
    }
    transport.flush().await
}
