//! Protocol filters: incremental parsers turning buffered bytes into
//! packages.
//!
//! A filter is one stage of a forward-linked chain. The parser driver calls
//! the active filter whenever buffered bytes exist past the examined
//! position; a filter that installs a successor via `take_next` switches the
//! protocol mode for everything still in the buffer and after.

mod fixed_length;
mod length_field;
mod terminator;

pub use fixed_length::FixedLengthFilter;
pub use length_field::{LengthFieldFilter, LengthPrefix};
pub use terminator::TerminatorFilter;

use crate::error::ChannelResult;
use crate::pipe::SeqReader;

pub type BoxFilter<P, C> = Box<dyn PipelineFilter<P, Context = C> + Send>;

/// One stage of protocol parsing producing packages of type `P`.
pub trait PipelineFilter<P>: Send {
    /// Protocol state shared across the filter chain. The parser driver
    /// owns the single context value and lends it to whichever filter is
    /// active, so a successor observes its predecessor's state.
    type Context: Send;

    /// Advance the reader over buffered bytes and return a package, or
    /// `None` when more data is needed. Returning `None` without consuming
    /// anything parks the driver until new bytes arrive; bytes consumed
    /// here are gone regardless of the outcome.
    fn filter(
        &mut self,
        context: &mut Self::Context,
        reader: &mut SeqReader<'_>,
    ) -> ChannelResult<Option<P>>;

    /// Called once after each package this filter emits, before the next
    /// `filter` invocation.
    fn reset(&mut self) {}

    /// A successor returned here becomes the active filter before the next
    /// `filter` call; it sees any trailing bytes already buffered.
    fn take_next(&mut self) -> Option<BoxFilter<P, Self::Context>> {
        None
    }
}
