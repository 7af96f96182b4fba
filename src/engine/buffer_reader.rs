use crate::Result;
use crate::bson;
use crate::engine::page_address::PageAddress;
use crate::utils::BufferSlice;

/// Reads sequentially from one or more [`BufferSlice`]s as if they were a single
/// contiguous byte range. Use `fragmented` when a document spans several data blocks.
pub(crate) struct BufferReader<'a> {
    segments: Vec<&'a BufferSlice>,
    position: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(slice: &'a BufferSlice) -> BufferReader<'a> {
        BufferReader {
            segments: vec![slice],
            position: 0,
        }
    }

    /// Reader over a one-shot slice (a save point, a header area) rather than a
    /// sequence of data blocks.
    pub fn single(slice: &'a BufferSlice) -> BufferReader<'a> {
        Self::new(slice)
    }

    /// Reader spanning several data block buffers, used when a document doesn't fit
    /// in a single block.
    pub fn fragmented(segments: Vec<&'a BufferSlice>) -> BufferReader<'a> {
        BufferReader {
            segments,
            position: 0,
        }
    }

    pub fn read_document(&mut self) -> Result<bson::Document> {
        let length = i32::from_le_bytes(self.peek_bytes(4).try_into().unwrap()) as usize;
        let bytes = self.read_span(length);
        Ok(bson::Document::from_reader(&bytes)?)
    }

    pub fn skip(&mut self, bytes: usize) {
        self.position += bytes;
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl BufferReader<'_> {
    fn peek_bytes(&self, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut pos = self.position;
        let mut remaining = len;
        for seg in &self.segments {
            if remaining == 0 {
                break;
            }
            let seg_len = seg.len();
            if pos >= seg_len {
                pos -= seg_len;
                continue;
            }
            let avail = seg_len - pos;
            let n = remaining.min(avail);
            out.extend_from_slice(seg.read_bytes(pos, n));
            remaining -= n;
            pos = 0;
        }
        out
    }

    fn read_span(&mut self, len: usize) -> Vec<u8> {
        let out = self.peek_bytes(len);
        self.position += len;
        out
    }

    fn read<T, const S: usize>(&mut self, f: impl Fn([u8; S]) -> T) -> T {
        let bytes = self.read_span(S);
        f(bytes.try_into().unwrap())
    }

    pub fn read_i32(&mut self) -> i32 {
        self.read(i32::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> u32 {
        self.read(u32::from_le_bytes)
    }

    pub fn read_u16(&mut self) -> u16 {
        self.read(u16::from_le_bytes)
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read(u8::from_le_bytes)
    }

    pub fn read_i8(&mut self) -> i8 {
        self.read(i8::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> i64 {
        self.read(i64::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> u64 {
        self.read(u64::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> f64 {
        self.read(f64::from_le_bytes)
    }

    pub fn read_bool(&mut self) -> bool {
        self.read_u8() != 0
    }

    pub fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            let byte = self.read_u8();
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }
        Ok(String::from_utf8(bytes)?)
    }

    pub fn read_page_address(&mut self) -> PageAddress {
        let page_id = self.read_u32();
        let slot = self.read_u8();
        PageAddress::new(page_id, slot)
    }
}
