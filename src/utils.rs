use crate::Result;
use crate::bson;
use crate::engine::PageAddress;
use std::cell::{Ref, RefCell, RefMut};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

// TODO: Implement the CompareOptions struct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CompareOptions(pub i32);

impl CompareOptions {
    pub const IGNORE_CASE: CompareOptions = CompareOptions(1);
    pub const IGNORE_KANA_TYPE: CompareOptions = CompareOptions(8);
    pub const IGNORE_NON_SPACE: CompareOptions = CompareOptions(2);
    pub const IGNORE_SYMBOLS: CompareOptions = CompareOptions(4);
    pub const IGNORE_WIDTH: CompareOptions = CompareOptions(16);
    pub const ORDINAL: CompareOptions = CompareOptions(1073741824);
    pub const STRING_SORT: CompareOptions = CompareOptions(536870912);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Collation {
    pub lcid: i32,
    pub sort_options: CompareOptions,
}

impl Default for Collation {
    fn default() -> Self {
        Collation {
            lcid: 127, // invariant
            sort_options: CompareOptions::IGNORE_CASE,
        }
    }
}

impl Collation {
    pub fn new(lcid: i32, sort_options: CompareOptions) -> Self {
        Collation { lcid, sort_options }
    }
}

/// Direction a skip-list level is walked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Order {
    Ascending,
    Descending,
}

/// A `String` key that hashes and compares ignoring ASCII case, used for
/// collection-name lookups (collection names are case-insensitive).
#[derive(Debug, Clone)]
pub(crate) struct CaseInsensitiveString(pub String);

impl PartialEq for CaseInsensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CaseInsensitiveString {}

impl Hash for CaseInsensitiveString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.as_bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

/// Single-threaded shared mutable cell, used for state handed out across the
/// transaction/snapshot/page-collection boundary within one connection.
#[derive(Debug)]
pub(crate) struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

/// A byte-addressed view into a page buffer.
///
/// Every accessor takes an absolute offset within the slice rather than keeping an
/// internal cursor; [`crate::engine::BufferReader`]/[`crate::engine::BufferWriter`] build the
/// cursor behavior on top of this.
#[repr(transparent)]
pub(crate) struct BufferSlice([u8]);

impl BufferSlice {
    pub fn new(data: &[u8]) -> &BufferSlice {
        unsafe { &*(data as *const [u8] as *const BufferSlice) }
    }

    pub fn new_mut(data: &mut [u8]) -> &mut BufferSlice {
        unsafe { &mut *(data as *mut [u8] as *mut BufferSlice) }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().take(16).all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn slice(&self, position: usize, length: usize) -> &BufferSlice {
        BufferSlice::new(&self.0[position..position + length])
    }

    pub fn slice_mut(&mut self, position: usize, length: usize) -> &mut BufferSlice {
        BufferSlice::new_mut(&mut self.0[position..position + length])
    }

    pub fn clear(&mut self, position: usize, length: usize) {
        self.0[position..position + length].fill(0);
    }

    pub fn read_byte(&self, position: usize) -> u8 {
        self.0[position]
    }

    pub fn write_byte(&mut self, position: usize, value: u8) {
        self.0[position] = value;
    }

    pub fn read_u8(&self, position: usize) -> u8 {
        self.0[position]
    }

    pub fn write_u8(&mut self, position: usize, value: u8) {
        self.0[position] = value;
    }

    pub fn read_bool(&self, position: usize) -> bool {
        self.0[position] != 0
    }

    pub fn write_bool(&mut self, position: usize, value: bool) {
        self.0[position] = value as u8;
    }

    pub fn read_bytes(&self, position: usize, length: usize) -> &[u8] {
        &self.0[position..position + length]
    }

    pub fn write_bytes(&mut self, position: usize, value: &[u8]) {
        self.0[position..position + value.len()].copy_from_slice(value);
    }

    fn read_array<const N: usize>(&self, position: usize) -> [u8; N] {
        self.0[position..position + N].try_into().unwrap()
    }

    pub fn read_u16(&self, position: usize) -> u16 {
        u16::from_le_bytes(self.read_array(position))
    }

    pub fn write_u16(&mut self, position: usize, value: u16) {
        self.write_bytes(position, &value.to_le_bytes());
    }

    pub fn read_u32(&self, position: usize) -> u32 {
        u32::from_le_bytes(self.read_array(position))
    }

    pub fn write_u32(&mut self, position: usize, value: u32) {
        self.write_bytes(position, &value.to_le_bytes());
    }

    pub fn read_u64(&self, position: usize) -> u64 {
        u64::from_le_bytes(self.read_array(position))
    }

    pub fn write_u64(&mut self, position: usize, value: u64) {
        self.write_bytes(position, &value.to_le_bytes());
    }

    pub fn read_i32(&self, position: usize) -> i32 {
        i32::from_le_bytes(self.read_array(position))
    }

    pub fn write_i32(&mut self, position: usize, value: i32) {
        self.write_bytes(position, &value.to_le_bytes());
    }

    pub fn read_i64(&self, position: usize) -> i64 {
        i64::from_le_bytes(self.read_array(position))
    }

    pub fn write_i64(&mut self, position: usize, value: i64) {
        self.write_bytes(position, &value.to_le_bytes());
    }

    pub fn read_f64(&self, position: usize) -> f64 {
        f64::from_le_bytes(self.read_array(position))
    }

    pub fn write_f64(&mut self, position: usize, value: f64) {
        self.write_bytes(position, &value.to_le_bytes());
    }

    pub fn read_page_address(&self, position: usize) -> PageAddress {
        let page_id = self.read_u32(position);
        let index = self.read_byte(position + 4);
        PageAddress::new(page_id, index)
    }

    pub fn write_page_address(&mut self, position: usize, value: PageAddress) {
        self.write_u32(position, value.page_id());
        self.write_byte(position + 4, value.index());
    }

    pub fn read_date_time(&self, position: usize) -> Result<bson::DateTime> {
        bson::DateTime::from_ticks(self.read_u64(position)).ok_or_else(crate::Error::datetime_overflow)
    }

    pub fn write_date_time(&mut self, position: usize, value: bson::DateTime) {
        self.write_u64(position, value.ticks());
    }

    /// Compact encoding used for index keys: one tag byte (mirrors [`bson::BsonType`]),
    /// an optional one-byte length for variable-sized types, then the raw payload.
    /// Kept separate from full BSON document encoding since an index key never nests
    /// a document/array and never carries a field name.
    pub fn read_index_key(&self, position: usize) -> Result<bson::Value> {
        let tag = self.read_byte(position);
        let body = position + 1;
        let value = match tag {
            0 => bson::Value::MinValue,
            1 => bson::Value::Null,
            2 => bson::Value::MaxValue,
            3 => bson::Value::Int32(self.read_i32(body)),
            4 => bson::Value::Int64(self.read_i64(body)),
            5 => bson::Value::Double(self.read_f64(body)),
            6 => bson::Value::Decimal(bson::Decimal128::from_bytes(self.read_array(body))),
            7 => {
                let length = self.read_byte(body) as usize;
                let bytes = self.read_bytes(body + 1, length).to_vec();
                bson::Value::String(String::from_utf8(bytes).map_err(crate::Error::err)?)
            }
            8 => {
                let length = self.read_byte(body) as usize;
                let bytes = self.read_bytes(body + 1, length).to_vec();
                bson::Value::Binary(bson::Binary::new(bytes))
            }
            9 => bson::Value::ObjectId(bson::ObjectId::from_bytes(self.read_array(body))),
            10 => bson::Value::Guid(bson::Guid::from_bytes(self.read_array(body))),
            11 => bson::Value::Boolean(self.read_byte(body) != 0),
            12 => bson::Value::DateTime(self.read_date_time(body)?),
            other => {
                return Err(crate::Error::invalid_index_key(&format!(
                    "unsupported index key tag {other}"
                )));
            }
        };
        Ok(value)
    }

    pub fn write_index_key(&mut self, position: usize, value: &bson::Value) {
        let body = position + 1;
        match value {
            bson::Value::MinValue => self.write_byte(position, 0),
            bson::Value::Null => self.write_byte(position, 1),
            bson::Value::MaxValue => self.write_byte(position, 2),
            bson::Value::Int32(v) => {
                self.write_byte(position, 3);
                self.write_i32(body, *v);
            }
            bson::Value::Int64(v) => {
                self.write_byte(position, 4);
                self.write_i64(body, *v);
            }
            bson::Value::Double(v) => {
                self.write_byte(position, 5);
                self.write_f64(body, *v);
            }
            bson::Value::Decimal(v) => {
                self.write_byte(position, 6);
                self.write_bytes(body, &v.bytes());
            }
            bson::Value::String(s) => {
                self.write_byte(position, 7);
                self.write_byte(body, s.len() as u8);
                self.write_bytes(body + 1, s.as_bytes());
            }
            bson::Value::Binary(b) => {
                self.write_byte(position, 8);
                self.write_byte(body, b.bytes().len() as u8);
                self.write_bytes(body + 1, b.bytes());
            }
            bson::Value::ObjectId(o) => {
                self.write_byte(position, 9);
                self.write_bytes(body, o.as_bytes());
            }
            bson::Value::Guid(g) => {
                self.write_byte(position, 10);
                self.write_bytes(body, &g.to_bytes());
            }
            bson::Value::Boolean(v) => {
                self.write_byte(position, 11);
                self.write_byte(body, *v as u8);
            }
            bson::Value::DateTime(v) => {
                self.write_byte(position, 12);
                self.write_date_time(body, *v);
            }
            bson::Value::Document(_) | bson::Value::Array(_) => {
                // composite values are never produced as secondary-index keys (the
                // expression evaluator flattens them before indexing); writing one
                // here would just waste the slot, so record it as MaxValue instead
                // of panicking on a page write.
                self.write_byte(position, 2);
            }
        }
    }
}
