use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ChannelError, ChannelResult};
use crate::filter::LengthPrefix;

use super::PackageEncoder;

/// Writes a big-endian length prefix followed by the payload; dual of
/// `LengthFieldFilter`.
#[derive(Debug)]
pub struct LengthFieldEncoder {
    prefix: LengthPrefix,
}

impl LengthFieldEncoder {
    pub fn new(prefix: LengthPrefix) -> Self {
        LengthFieldEncoder { prefix }
    }
}

impl PackageEncoder<Bytes> for LengthFieldEncoder {
    fn encode(&self, dst: &mut BytesMut, pkg: &Bytes) -> ChannelResult<usize> {
        if pkg.len() > self.prefix.max_body() {
            return Err(ChannelError::Protocol(
                format!("payload of {} bytes does not fit the length prefix", pkg.len()).into(),
            ));
        }
        dst.reserve(self.prefix.width() + pkg.len());
        match self.prefix {
            LengthPrefix::U16Be => dst.put_u16(pkg.len() as u16),
            LengthPrefix::U32Be => dst.put_u32(pkg.len() as u32),
        }
        dst.extend_from_slice(pkg);
        Ok(self.prefix.width() + pkg.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{LengthFieldFilter, PipelineFilter};
    use crate::pipe::{ByteSegments, SeqReader};

    #[test]
    fn test_round_trip_with_filter() {
        let encoder = LengthFieldEncoder::new(LengthPrefix::U16Be);
        let mut dst = BytesMut::new();
        let pkg = Bytes::from("round trip");
        encoder.encode(&mut dst, &pkg).unwrap();

        let buffer = ByteSegments::new(vec![dst.freeze()], 0);
        let mut reader = SeqReader::new(&buffer);
        let mut filter = LengthFieldFilter::<()>::new(LengthPrefix::U16Be);
        assert_eq!(filter.filter(&mut (), &mut reader).unwrap(), Some(pkg));
        assert!(reader.is_empty());
    }
}
