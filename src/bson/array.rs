use super::de::{BsonReader, LimitReader, ParseError, limit_reader, parse_element};
use super::{BsonWriter, Value};
use std::fmt::Debug;
use std::vec;

#[derive(Clone, PartialEq)]
pub struct Array {
    data: Vec<Value>,
}

impl Array {
    pub fn new() -> Array {
        Array { data: Vec::new() }
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Value] {
        &mut self.data
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.data.push(value.into());
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.data.pop()
    }

    pub fn iter(&self) -> std::slice::Iter<Value> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<Value> {
        self.data.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Array {
    /// Returns the number of bytes this array takes up when serialized, same layout
    /// as a document keyed by the element index ("0", "1", ...).
    pub fn get_serialized_value_len(&self) -> usize {
        4 + self
            .data
            .iter()
            .enumerate()
            .map(|(i, v)| 1 + i.to_string().len() + 1 + v.get_serialized_value_len())
            .sum::<usize>()
            + 1
    }

    pub fn write_value<W: BsonWriter>(&self, w: &mut W) -> Result<(), W::Error> {
        let len = self.get_serialized_value_len();
        let len = i32::try_from(len).map_err(|_| W::when_too_large(len))?;
        w.write_bytes(&len.to_le_bytes())?;
        for (i, v) in self.data.iter().enumerate() {
            w.write_bytes(&[v.ty().bson_tag() as i8 as u8])?;
            w.write_bytes(i.to_string().as_bytes())?;
            w.write_bytes(&[0])?;
            v.write_value(w)?;
        }
        w.write_bytes(&[0])
    }

    pub(crate) fn parse_array<R: BsonReader>(r: &mut LimitReader<R>) -> Result<Array, R::Error> {
        let mut nested = limit_reader(r)?;
        let mut data = Vec::new();
        while let Some((_key, value)) = parse_element(&mut nested)? {
            data.push(value);
        }
        if !nested.is_end() {
            return Err(ParseError::RemainingDataInDocument.into());
        }
        Ok(Array { data })
    }
}

impl Debug for Array {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        Debug::fmt(&self.data[..], formatter)
    }
}

impl From<Vec<Value>> for Array {
    fn from(data: Vec<Value>) -> Array {
        Array { data }
    }
}

impl <const L: usize> From<[Value; L]> for Array {
    fn from(data: [Value; L]) -> Array {
        Self::from(Vec::from(data))
    }
}

impl From<&[Value]> for Array {
    fn from(data: &[Value]) -> Array {
        Self::from(Vec::from(data))
    }
}

impl <'a, T> From<&'a [T]> for Array where Value: From<&'a T> {
    fn from(data: &'a [T]) -> Array {
        Self::from(data.into_iter().map(Into::into).collect::<Vec<Value>>())
    }
}

impl<T: Into<Value>> FromIterator<T> for Array {
    fn from_iter<I: IntoIterator<Item=T>>(iter: I) -> Self {
        iter.into_iter().map(Into::into).collect::<Vec<Value>>().into()
    }
}

impl IntoIterator for Array {
    type Item = Value;
    type IntoIter = vec::IntoIter<Value>;
    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}
