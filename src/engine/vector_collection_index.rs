use crate::Result;
use crate::engine::buffer_reader::BufferReader;
use crate::engine::buffer_writer::BufferWriter;
use crate::engine::page_address::PageAddress;
use crate::expression::BsonExpression;

/// Distance metric a vector index was created with. Fixed for the lifetime of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VectorMetric {
    Cosine = 0,
    Euclidean = 1,
    DotProduct = 2,
}

impl VectorMetric {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(VectorMetric::Cosine),
            1 => Ok(VectorMetric::Euclidean),
            2 => Ok(VectorMetric::DotProduct),
            _ => Err(crate::Error::invalid_page()),
        }
    }
}

/// Per-collection vector index metadata, persisted inline in the collection page
/// alongside the skip-list secondary indexes. Mirrors [`crate::engine::collection_index::CollectionIndex`]'s
/// role but for the HNSW graph: `root` is the entry point node instead of a head/tail pair.
pub(crate) struct VectorCollectionIndex {
    slot: u8,
    name: String,
    expression: String,
    bson_expr: BsonExpression,
    dimensions: u16,
    metric: VectorMetric,
    root: PageAddress,
    free_vector_page_list: u32,
}

impl VectorCollectionIndex {
    pub fn new(
        slot: u8,
        name: String,
        expression: BsonExpression,
        dimensions: u16,
        metric: VectorMetric,
    ) -> Self {
        Self {
            slot,
            name,
            expression: expression.source().to_string(),
            bson_expr: expression,
            dimensions,
            metric,
            root: PageAddress::EMPTY,
            free_vector_page_list: u32::MAX,
        }
    }

    pub fn load(reader: &mut BufferReader) -> Result<Self> {
        let slot = reader.read_u8();
        let name = reader.read_cstring()?;
        let expression = reader.read_cstring()?;
        let dimensions = reader.read_u16();
        let metric = VectorMetric::from_u8(reader.read_u8())?;
        let root = reader.read_page_address();
        let free_vector_page_list = reader.read_u32();
        let bson_expr = BsonExpression::create(&expression)?;

        Ok(Self {
            slot,
            name,
            expression,
            bson_expr,
            dimensions,
            metric,
            root,
            free_vector_page_list,
        })
    }

    pub fn update_buffer(&self, writer: &mut BufferWriter) {
        writer.write_u8(self.slot);
        writer.write_cstring(&self.name);
        writer.write_cstring(&self.expression);
        writer.write_u16(self.dimensions);
        writer.write_u8(self.metric as u8);
        writer.write_page_address(self.root);
        writer.write_u32(self.free_vector_page_list);
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bson_expr(&self) -> &BsonExpression {
        &self.bson_expr
    }

    pub fn dimensions(&self) -> u16 {
        self.dimensions
    }

    pub fn metric(&self) -> VectorMetric {
        self.metric
    }

    pub fn root(&self) -> PageAddress {
        self.root
    }

    pub fn set_root(&mut self, root: PageAddress) {
        self.root = root;
    }

    pub fn free_vector_page_list(&self) -> u32 {
        self.free_vector_page_list
    }

    pub fn set_free_vector_page_list(&mut self, page_id: u32) {
        self.free_vector_page_list = page_id;
    }

    pub fn get_length(&self) -> usize {
        Self::get_length_static(&self.name, &self.expression)
    }

    pub fn get_length_static(name: &str, expr: &str) -> usize {
        1 // slot
            + name.len() + 1
            + expr.len() + 1
            + 2 // dimensions
            + 1 // metric
            + PageAddress::SERIALIZED_SIZE
            + 4 // free list head
    }
}
