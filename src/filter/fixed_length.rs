use std::marker::PhantomData;

use bytes::Bytes;

use crate::error::ChannelResult;
use crate::pipe::SeqReader;

use super::PipelineFilter;

/// Emits fixed-size packages.
#[derive(Debug)]
pub struct FixedLengthFilter<C = ()> {
    length: usize,
    _context: PhantomData<fn(C)>,
}

impl<C> FixedLengthFilter<C> {
    pub fn new(length: usize) -> Self {
        FixedLengthFilter {
            length,
            _context: PhantomData,
        }
    }
}

impl<C: Send> PipelineFilter<Bytes> for FixedLengthFilter<C> {
    type Context = C;

    fn filter(
        &mut self,
        _context: &mut C,
        reader: &mut SeqReader<'_>,
    ) -> ChannelResult<Option<Bytes>> {
        if reader.remaining() < self.length {
            return Ok(None);
        }
        Ok(reader.take(self.length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::ByteSegments;

    #[test]
    fn test_waits_for_full_package() {
        let buffer = ByteSegments::new(vec![Bytes::from("abcde")], 0);
        let mut reader = SeqReader::new(&buffer);
        let mut filter = FixedLengthFilter::<()>::new(3);
        assert_eq!(
            filter.filter(&mut (), &mut reader).unwrap(),
            Some(Bytes::from("abc"))
        );
        assert_eq!(filter.filter(&mut (), &mut reader).unwrap(), None);
        assert_eq!(reader.remaining(), 2);
    }
}
