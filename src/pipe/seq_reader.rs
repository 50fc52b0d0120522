use bytes::{BufMut, Bytes, BytesMut};

use super::ByteSegments;

/// Cursor over a segmented byte sequence.
///
/// Tracks how many bytes have been consumed since construction; reads stay
/// zero-copy unless a requested run spans a segment boundary. Cloning the
/// reader is cheap and gives an independent cursor, which is how filters
/// peek at a header without consuming it.
#[derive(Debug, Clone)]
pub struct SeqReader<'a> {
    segments: &'a [Bytes],
    seg_idx: usize,
    seg_offset: usize,
    consumed: usize,
    remaining: usize,
}

impl<'a> SeqReader<'a> {
    pub fn new(buffer: &'a ByteSegments) -> Self {
        SeqReader {
            segments: buffer.segments(),
            seg_idx: 0,
            seg_offset: 0,
            consumed: 0,
            remaining: buffer.len(),
        }
    }

    /// Bytes consumed since this reader was constructed.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Current contiguous run of unread bytes; empty only at the end.
    pub fn chunk(&self) -> &'a [u8] {
        match self.segments.get(self.seg_idx) {
            Some(segment) => &segment[self.seg_offset..],
            None => &[],
        }
    }

    pub fn advance(&mut self, mut cnt: usize) {
        assert!(cnt <= self.remaining, "advance past end of sequence");
        self.consumed += cnt;
        self.remaining -= cnt;
        while cnt > 0 {
            let seg_len = self.segments[self.seg_idx].len() - self.seg_offset;
            if cnt < seg_len {
                self.seg_offset += cnt;
                break;
            }
            cnt -= seg_len;
            self.seg_idx += 1;
            self.seg_offset = 0;
        }
    }

    /// Offset from the cursor to the first occurrence of `byte`.
    pub fn find(&self, byte: u8) -> Option<usize> {
        let mut base = 0;
        let mut offset = self.seg_offset;
        for segment in &self.segments[self.seg_idx..] {
            if let Some(pos) = segment[offset..].iter().position(|b| *b == byte) {
                return Some(base + pos);
            }
            base += segment.len() - offset;
            offset = 0;
        }
        None
    }

    /// Consume `cnt` bytes and return them, or `None` if fewer are buffered.
    pub fn take(&mut self, cnt: usize) -> Option<Bytes> {
        if cnt > self.remaining {
            return None;
        }
        if cnt == 0 {
            return Some(Bytes::new());
        }
        let segment = &self.segments[self.seg_idx];
        if self.seg_offset + cnt <= segment.len() {
            let out = segment.slice(self.seg_offset..self.seg_offset + cnt);
            self.advance(cnt);
            return Some(out);
        }
        // the run crosses a segment boundary, copy it contiguous
        let mut out = BytesMut::with_capacity(cnt);
        let mut left = cnt;
        while left > 0 {
            let chunk = self.chunk();
            let n = left.min(chunk.len());
            out.put_slice(&chunk[..n]);
            self.advance(n);
            left -= n;
        }
        Some(out.freeze())
    }

    pub fn try_get_u8(&mut self) -> Option<u8> {
        let [b] = self.try_get_array::<1>()?;
        Some(b)
    }

    pub fn try_get_u16_be(&mut self) -> Option<u16> {
        self.try_get_array::<2>().map(u16::from_be_bytes)
    }

    pub fn try_get_u32_be(&mut self) -> Option<u32> {
        self.try_get_array::<4>().map(u32::from_be_bytes)
    }

    fn try_get_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.remaining < N {
            return None;
        }
        let mut out = [0u8; N];
        let mut filled = 0;
        while filled < N {
            let chunk = self.chunk();
            let n = (N - filled).min(chunk.len());
            out[filled..filled + n].copy_from_slice(&chunk[..n]);
            self.advance(n);
            filled += n;
        }
        Some(out)
    }
}
