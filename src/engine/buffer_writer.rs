use crate::bson;
use crate::engine::page_address::PageAddress;
use crate::utils::BufferSlice;

/// Writes sequentially into one or more [`BufferSlice`]s as if they were a single
/// contiguous byte range. Documents that span several data blocks are written through
/// the `fragmented` constructor; everything else uses a single backing slice.
pub struct BufferWriter<'a> {
    segments: Vec<&'a mut BufferSlice>,
    position: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(slice: &'a mut BufferSlice) -> BufferWriter<'a> {
        BufferWriter {
            segments: vec![slice],
            position: 0,
        }
    }

    /// Writer over a one-shot slice (a save point, a header area) rather than a
    /// sequence of data blocks.
    pub fn single(slice: &'a mut BufferSlice) -> BufferWriter<'a> {
        Self::new(slice)
    }

    /// Writer spanning several data block buffers, used when a document doesn't fit
    /// in a single block.
    pub fn fragmented(segments: Vec<&'a mut BufferSlice>) -> BufferWriter<'a> {
        BufferWriter {
            segments,
            position: 0,
        }
    }

    pub fn write_document(&mut self, document: &bson::Document) {
        let bytes = bson::to_vec(document);
        self.write(&bytes);
    }

    pub fn write_array(&mut self, array: &bson::Array) {
        let len = array.get_serialized_value_len();
        let mut buffer = vec![0u8; len];
        array
            .write_value(&mut std::io::Cursor::new(&mut buffer))
            .unwrap();
        self.write(&buffer);
    }

    pub fn skip(&mut self, bytes: usize) {
        self.position += bytes;
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl BufferWriter<'_> {
    fn write(&mut self, data: &[u8]) {
        let mut pos = self.position;
        let mut remaining = data;
        for seg in self.segments.iter_mut() {
            if remaining.is_empty() {
                break;
            }
            let seg_len = seg.len();
            if pos >= seg_len {
                pos -= seg_len;
                continue;
            }
            let avail = seg_len - pos;
            let n = remaining.len().min(avail);
            seg.write_bytes(pos, &remaining[..n]);
            remaining = &remaining[n..];
            pos = 0;
        }
        self.position += data.len();
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_cstring(&mut self, value: &str) {
        debug_assert!(!value.as_bytes().contains(&0));
        self.write(value.as_bytes());
        self.write(&[0]);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write(value);
    }

    pub fn write_page_address(&mut self, value: PageAddress) {
        self.write_u32(value.page_id());
        self.write_u8(value.index());
    }
}
