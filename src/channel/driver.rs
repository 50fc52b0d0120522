use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{ChannelError, ChannelResult};
use crate::filter::BoxFilter;
use crate::pipe::{ByteSegments, PipeReader, SeqReader};

use super::controller::CloseController;
use super::package_queue::PackageProducer;

/// The inbound parser: awaits buffered bytes, runs the active filter over
/// them and enqueues the packages it produces.
pub(crate) struct ParserDriver<P, C> {
    reader: PipeReader,
    filter: BoxFilter<P, C>,
    context: C,
    packages: PackageProducer<P>,
    max_package_length: usize,
    controller: Arc<CloseController>,
}

struct DrainOutcome {
    consumed: u64,
    examined: u64,
    fatal: Option<ChannelError>,
}

impl DrainOutcome {
    fn need_more(buffer: &ByteSegments, consumed: usize) -> Self {
        DrainOutcome {
            consumed: buffer.position_after(consumed),
            examined: buffer.end(),
            fatal: None,
        }
    }

    fn done(buffer: &ByteSegments) -> Self {
        DrainOutcome {
            consumed: buffer.end(),
            examined: buffer.end(),
            fatal: None,
        }
    }

    fn fatal(buffer: &ByteSegments, consumed: usize, error: ChannelError) -> Self {
        DrainOutcome {
            consumed: buffer.position_after(consumed),
            examined: buffer.end(),
            fatal: Some(error),
        }
    }
}

impl<P, C> ParserDriver<P, C>
where
    P: Send,
    C: Send,
{
    pub(crate) fn new(
        reader: PipeReader,
        filter: BoxFilter<P, C>,
        context: C,
        packages: PackageProducer<P>,
        max_package_length: usize,
        controller: Arc<CloseController>,
    ) -> Self {
        ParserDriver {
            reader,
            filter,
            context,
            packages,
            max_package_length,
            controller,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let result = self.reader.read().await;
            if result.is_canceled {
                debug!("parser driver exit after pipe cancel");
                break;
            }
            if !result.buffer.is_empty() {
                let outcome = self.drain_buffer(&result.buffer).await;
                self.reader.advance_to(outcome.consumed, outcome.examined);
                if let Some(e) = outcome.fatal {
                    if matches!(e, ChannelError::ChannelClosed) {
                        debug!("parser driver exit, package consumer gone");
                    } else {
                        error!("closing channel : {}", e);
                    }
                    self.controller.close();
                    break;
                }
            }
            if result.is_completed {
                debug!("parser driver exit after inbound eof");
                break;
            }
        }
        self.reader.complete();
        // dropping the package producer closes the queue: end of stream
    }

    /// One wake-up may drain several packages from the same buffer; the
    /// loop re-enters the filter until it asks for more data.
    async fn drain_buffer(&mut self, buffer: &ByteSegments) -> DrainOutcome {
        let mut reader = SeqReader::new(buffer);
        loop {
            let consumed_before = reader.consumed();
            let outcome = self.filter.filter(&mut self.context, &mut reader);
            // the swap is deferred until after reset, so the filter that
            // produced a package is the one reset and the successor starts
            // fresh
            let next = self.filter.take_next();
            let consumed_this_call = reader.consumed() - consumed_before;

            let pkg = match outcome {
                Ok(pkg) => pkg,
                Err(e) => return DrainOutcome::fatal(buffer, reader.consumed(), e),
            };
            if let Err(e) = self.check_package_length(&reader, consumed_this_call, pkg.is_some()) {
                return DrainOutcome::fatal(buffer, reader.consumed(), e);
            }

            match pkg {
                None => {
                    if let Some(next) = next {
                        self.filter = next;
                    }
                    return DrainOutcome::need_more(buffer, reader.consumed());
                }
                Some(pkg) => {
                    self.filter.reset();
                    if let Some(next) = next {
                        // the successor picks up the driver-owned context
                        // and any trailing bytes already buffered
                        self.filter = next;
                    }
                    if !self.packages.push(pkg).await {
                        return DrainOutcome::fatal(
                            buffer,
                            reader.consumed(),
                            ChannelError::ChannelClosed,
                        );
                    }
                    if reader.is_empty() {
                        return DrainOutcome::done(buffer);
                    }
                }
            }
        }
    }

    /// When the filter consumed bytes, those bound the package length.
    /// Otherwise the filter saw everything pending and still wants more, so
    /// the eventual package must span past the remaining length; reaching
    /// the limit without a package is already fatal then.
    fn check_package_length(
        &self,
        reader: &SeqReader<'_>,
        consumed_this_call: usize,
        produced: bool,
    ) -> ChannelResult<()> {
        if self.max_package_length == 0 {
            return Ok(());
        }
        let length = if consumed_this_call > 0 {
            consumed_this_call
        } else {
            reader.remaining()
        };
        let over = if consumed_this_call > 0 || produced {
            length > self.max_package_length
        } else {
            length >= self.max_package_length
        };
        if over {
            return Err(ChannelError::OversizePackage {
                length,
                limit: self.max_package_length,
            });
        }
        Ok(())
    }
}
