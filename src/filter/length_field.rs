use std::marker::PhantomData;

use bytes::Bytes;

use crate::error::ChannelResult;
use crate::pipe::SeqReader;

use super::PipelineFilter;

/// Width of a big-endian length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    U16Be,
    U32Be,
}

impl LengthPrefix {
    pub(crate) fn width(&self) -> usize {
        match self {
            LengthPrefix::U16Be => 2,
            LengthPrefix::U32Be => 4,
        }
    }

    pub(crate) fn max_body(&self) -> usize {
        match self {
            LengthPrefix::U16Be => u16::MAX as usize,
            LengthPrefix::U32Be => u32::MAX as usize,
        }
    }
}

/// Length-prefixed binary packages: a big-endian length field immediately
/// followed by that many body bytes, emitted as the package.
///
/// The header is only peeked until the full body is buffered, so a partial
/// package consumes nothing and the oversize guard sees the whole pending
/// length.
#[derive(Debug)]
pub struct LengthFieldFilter<C = ()> {
    prefix: LengthPrefix,
    _context: PhantomData<fn(C)>,
}

impl<C> LengthFieldFilter<C> {
    pub fn new(prefix: LengthPrefix) -> Self {
        LengthFieldFilter {
            prefix,
            _context: PhantomData,
        }
    }
}

impl<C: Send> PipelineFilter<Bytes> for LengthFieldFilter<C> {
    type Context = C;

    fn filter(
        &mut self,
        _context: &mut C,
        reader: &mut SeqReader<'_>,
    ) -> ChannelResult<Option<Bytes>> {
        let mut probe = reader.clone();
        let length = match self.prefix {
            LengthPrefix::U16Be => probe.try_get_u16_be().map(|v| v as usize),
            LengthPrefix::U32Be => probe.try_get_u32_be().map(|v| v as usize),
        };
        let Some(length) = length else {
            return Ok(None);
        };
        if probe.remaining() < length {
            return Ok(None);
        }
        reader.advance(self.prefix.width());
        Ok(reader.take(length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::ByteSegments;

    fn segmented(parts: &[&[u8]]) -> ByteSegments {
        let segments = parts.iter().map(|p| Bytes::copy_from_slice(p)).collect();
        ByteSegments::new(segments, 0)
    }

    #[test]
    fn test_parses_back_to_back_packages() {
        let buffer = segmented(&[b"\x00\x03abc\x00\x02de"]);
        let mut reader = SeqReader::new(&buffer);
        let mut filter = LengthFieldFilter::<()>::new(LengthPrefix::U16Be);
        assert_eq!(
            filter.filter(&mut (), &mut reader).unwrap(),
            Some(Bytes::from("abc"))
        );
        assert_eq!(
            filter.filter(&mut (), &mut reader).unwrap(),
            Some(Bytes::from("de"))
        );
        assert!(reader.is_empty());
    }

    #[test]
    fn test_partial_body_consumes_nothing() {
        let buffer = segmented(&[b"\x00\x05ab"]);
        let mut reader = SeqReader::new(&buffer);
        let mut filter = LengthFieldFilter::<()>::new(LengthPrefix::U16Be);
        assert_eq!(filter.filter(&mut (), &mut reader).unwrap(), None);
        assert_eq!(reader.consumed(), 0);
        assert_eq!(reader.remaining(), 4);
    }

    #[test]
    fn test_header_split_across_segments() {
        let buffer = segmented(&[b"\x00", b"\x02", b"ok"]);
        let mut reader = SeqReader::new(&buffer);
        let mut filter = LengthFieldFilter::<()>::new(LengthPrefix::U16Be);
        assert_eq!(
            filter.filter(&mut (), &mut reader).unwrap(),
            Some(Bytes::from("ok"))
        );
    }
}
