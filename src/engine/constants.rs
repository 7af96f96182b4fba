
/// The size of each page in disk - use 8192 as all major databases
pub(crate) const PAGE_SIZE: usize = 8192;
/// header size of each page
pub(crate) const PAGE_HEADER_SIZE: usize = 32;
pub(crate) const CONTAINER_SORT_SIZE: usize = 100 * PAGE_SIZE;
pub(crate) const PAGE_FREE_LIST_SLOTS: usize = 5;

/// Max number of bytes a serialized index key may occupy inside an index node segment.
pub(crate) const MAX_INDEX_LENGTH: usize = 1023;
/// Max skip-list height. Levels above this are never sampled.
pub(crate) const MAX_LEVEL_LENGTH: usize = 32;
/// Max serialized document size accepted by the data service.
pub(crate) const MAX_DOCUMENT_SIZE: usize = 2 * 1024 * 1024;
/// Max dirty pages a single transaction may accumulate before a safepoint is forced.
pub(crate) const MAX_TRANSACTION_SIZE: u32 = 1000;
/// Max number of concurrently open transactions tracked by the monitor.
pub(crate) const MAX_OPEN_TRANSACTIONS: usize = 100;

/// Max graph height of a vector-index node (levels 0..=3).
pub(crate) const VECTOR_MAX_LEVEL: u8 = 4;
/// Max neighbor links stored per level per vector-index node.
pub(crate) const VECTOR_MAX_NEIGHBORS: usize = 8;
/// Beam width floor used both at search and construction time.
pub(crate) const VECTOR_MIN_EF: usize = 32;
/// Beam width used while wiring a freshly inserted node into the graph.
pub(crate) const VECTOR_CONSTRUCTION_EF: usize = 24;
/// Max number of distinct vector indexes a collection may carry.
pub(crate) const VECTOR_INDEX_SLOTS: usize = 256;
