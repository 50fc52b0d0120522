use std::marker::PhantomData;

use bytes::Bytes;

use crate::error::ChannelResult;
use crate::pipe::SeqReader;

use super::PipelineFilter;

/// Splits the inbound stream on a single-byte terminator, emitting each
/// payload without the terminator.
#[derive(Debug)]
pub struct TerminatorFilter<C = ()> {
    terminator: u8,
    trim_cr: bool,
    _context: PhantomData<fn(C)>,
}

impl<C> TerminatorFilter<C> {
    pub fn new(terminator: u8) -> Self {
        TerminatorFilter {
            terminator,
            trim_cr: false,
            _context: PhantomData,
        }
    }

    /// Line protocol: split on `\n`, drop a trailing `\r`.
    pub fn lines() -> Self {
        TerminatorFilter {
            terminator: b'\n',
            trim_cr: true,
            _context: PhantomData,
        }
    }
}

impl<C: Send> PipelineFilter<Bytes> for TerminatorFilter<C> {
    type Context = C;

    fn filter(
        &mut self,
        _context: &mut C,
        reader: &mut SeqReader<'_>,
    ) -> ChannelResult<Option<Bytes>> {
        let Some(at) = reader.find(self.terminator) else {
            return Ok(None);
        };
        let mut payload = reader.take(at).expect("terminator lies within the sequence");
        reader.advance(1);
        if self.trim_cr && payload.last() == Some(&b'\r') {
            payload.truncate(payload.len() - 1);
        }
        Ok(Some(payload))
    }
}
