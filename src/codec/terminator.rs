use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ChannelError, ChannelResult};

use super::PackageEncoder;

/// Appends the payload followed by a single-byte terminator.
#[derive(Debug)]
pub struct TerminatorEncoder {
    terminator: u8,
}

impl TerminatorEncoder {
    pub fn new(terminator: u8) -> Self {
        TerminatorEncoder { terminator }
    }

    /// Dual of `TerminatorFilter::lines`.
    pub fn lines() -> Self {
        TerminatorEncoder { terminator: b'\n' }
    }
}

impl PackageEncoder<Bytes> for TerminatorEncoder {
    fn encode(&self, dst: &mut BytesMut, pkg: &Bytes) -> ChannelResult<usize> {
        if pkg.contains(&self.terminator) {
            return Err(ChannelError::Protocol(
                "payload contains the terminator byte".into(),
            ));
        }
        dst.reserve(pkg.len() + 1);
        dst.extend_from_slice(pkg);
        dst.put_u8(self.terminator);
        Ok(pkg.len() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_terminator() {
        let encoder = TerminatorEncoder::lines();
        let mut dst = BytesMut::new();
        let written = encoder.encode(&mut dst, &Bytes::from("hello")).unwrap();
        assert_eq!(written, 6);
        assert_eq!(&dst[..], b"hello\n");
    }

    #[test]
    fn test_rejects_payload_containing_terminator() {
        let encoder = TerminatorEncoder::lines();
        let mut dst = BytesMut::new();
        assert!(encoder.encode(&mut dst, &Bytes::from("a\nb")).is_err());
    }
}
