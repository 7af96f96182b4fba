use crate::engine::{PageAddress, VECTOR_MAX_NEIGHBORS, VectorIndexPage};
use crate::utils::BufferSlice;

const P_SLOT: usize = 0; // 00-00 [byte]
const P_LEVEL: usize = 1; // 01-01 [byte] — 1..=VECTOR_MAX_LEVEL, how many levels this node participates in
const P_DATA_BLOCK: usize = 2; // 02-06 [PageAddress] — the document this vector belongs to
const P_EXTERNAL: usize = 7; // 07-07 [bool] — vector stored inline in this node vs. in a data block chain
const P_DIMENSIONS: usize = 8; // 08-09 [u16]
const P_VECTOR_REF: usize = 10; // 10-14 [PageAddress] — only meaningful when P_EXTERNAL is set
// 15-(15 + level * (1 + VECTOR_MAX_NEIGHBORS * PageAddress::SERIALIZED_SIZE)): per-level neighbor lists
const P_NEIGHBORS: usize = 15;

fn neighbor_list_size() -> usize {
    1 + VECTOR_MAX_NEIGHBORS * PageAddress::SERIALIZED_SIZE
}

fn inline_vector_offset(level: u8) -> usize {
    P_NEIGHBORS + level as usize * neighbor_list_size()
}

/// Fixed overhead shared by every vector-index node, excluding the per-level neighbor
/// lists and the inline vector payload (when the vector is stored inline).
const VECTOR_NODE_FIXED_SIZE: usize = P_NEIGHBORS;

/// Read-only view over one vector-index node (analogous to [`crate::engine::index_node::IndexNode`]).
pub(crate) struct VectorNodeShared<S, D> {
    segment: S,
    position: PageAddress,
    slot: u8,
    level: u8,
    data_block: PageAddress,
    external: bool,
    dimensions: u16,
    vector_ref: PageAddress,
    vector: Vec<f32>,
    neighbors: Vec<Vec<PageAddress>>,
    ptr: D,
}

pub(crate) type VectorNode = VectorNodeShared<(), ()>;
pub(crate) type VectorNodeMut<'a> = VectorNodeShared<&'a mut BufferSlice, *mut VectorIndexPage>;

extend_lifetime!(VectorNodeMut);

impl<S, D> VectorNodeShared<S, D> {
    fn load_inner<Seg>(
        page_id: u32,
        index: u8,
        segment: Seg,
        store_segment: impl FnOnce(Seg) -> S,
        dirty_ptr: D,
    ) -> Self
    where
        Seg: std::ops::Deref<Target = BufferSlice>,
    {
        let position = PageAddress::new(page_id, index);
        let slot = segment.read_u8(P_SLOT);
        let level = segment.read_u8(P_LEVEL);
        let data_block = segment.read_page_address(P_DATA_BLOCK);
        let external = segment.read_bool(P_EXTERNAL);
        let dimensions = segment.read_u16(P_DIMENSIONS);
        let vector_ref = segment.read_page_address(P_VECTOR_REF);

        let mut neighbors = Vec::with_capacity(level as usize);
        for lvl in 0..level as usize {
            let base = P_NEIGHBORS + lvl * neighbor_list_size();
            let count = segment.read_u8(base) as usize;
            let mut level_neighbors = Vec::with_capacity(count);
            for i in 0..count {
                level_neighbors.push(
                    segment.read_page_address(base + 1 + i * PageAddress::SERIALIZED_SIZE),
                );
            }
            neighbors.push(level_neighbors);
        }

        let vector = if external {
            Vec::new()
        } else {
            let offset = inline_vector_offset(level);
            (0..dimensions as usize)
                .map(|i| {
                    let bytes = segment.read_bytes(offset + i * 4, 4);
                    f32::from_le_bytes(bytes.try_into().unwrap())
                })
                .collect()
        };

        Self {
            segment: store_segment(segment),
            position,
            slot,
            level,
            data_block,
            external,
            dimensions,
            vector_ref,
            vector,
            neighbors,
            ptr: dirty_ptr,
        }
    }

    fn copy_data<S1, D1>(base: VectorNodeShared<S1, D1>, segment: S, dirty_ptr: D) -> Self {
        Self {
            segment,
            position: base.position,
            slot: base.slot,
            level: base.level,
            data_block: base.data_block,
            external: base.external,
            dimensions: base.dimensions,
            vector_ref: base.vector_ref,
            vector: base.vector,
            neighbors: base.neighbors,
            ptr: dirty_ptr,
        }
    }
}

impl<S, D> VectorNodeShared<S, D> {
    pub fn position(&self) -> PageAddress {
        self.position
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn data_block(&self) -> PageAddress {
        self.data_block
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn dimensions(&self) -> u16 {
        self.dimensions
    }

    pub fn vector_ref(&self) -> PageAddress {
        self.vector_ref
    }

    pub fn neighbors(&self, level: u8) -> &[PageAddress] {
        &self.neighbors[level as usize]
    }

    /// The vector payload, valid whether it was loaded from the inline body or (once
    /// hydrated separately by the caller) from an external Data-block chain.
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Bytes needed for a node with `level` levels and an inline vector of `dimensions` floats,
    /// or just the fixed/neighbor portion when the vector is stored externally.
    pub fn get_node_length(level: u8, dimensions: u16, external: bool) -> usize {
        let fixed = VECTOR_NODE_FIXED_SIZE + level as usize * neighbor_list_size();
        if external {
            fixed
        } else {
            fixed + dimensions as usize * 4
        }
    }
}

impl VectorNode {
    pub fn load(page_id: u32, index: u8, segment: &BufferSlice) -> Self {
        Self::load_inner(page_id, index, segment, |_| (), ())
    }
}

impl<'a> VectorNodeMut<'a> {
    pub fn load(
        page_id: u32,
        dirty_ptr: *mut VectorIndexPage,
        index: u8,
        segment: &'a mut BufferSlice,
    ) -> Self {
        Self::load_inner(page_id, index, segment, |s| s, dirty_ptr)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page_id: u32,
        index: u8,
        dirty_ptr: *mut VectorIndexPage,
        segment: &'a mut BufferSlice,
        slot: u8,
        level: u8,
        data_block: PageAddress,
        dimensions: u16,
        external: bool,
        vector: &[f32],
    ) -> Self {
        let position = PageAddress::new(page_id, index);

        segment.write_u8(P_SLOT, slot);
        segment.write_u8(P_LEVEL, level);
        segment.write_page_address(P_DATA_BLOCK, data_block);
        segment.write_bool(P_EXTERNAL, external);
        segment.write_u16(P_DIMENSIONS, dimensions);
        segment.write_page_address(P_VECTOR_REF, PageAddress::EMPTY);

        for lvl in 0..level as usize {
            let base = P_NEIGHBORS + lvl * neighbor_list_size();
            segment.write_u8(base, 0);
        }

        if !external {
            let offset = inline_vector_offset(level);
            for (i, value) in vector.iter().enumerate() {
                segment.write_bytes(offset + i * 4, &value.to_le_bytes());
            }
        }

        let mut result = Self {
            segment,
            position,
            slot,
            level,
            data_block,
            external,
            dimensions,
            vector_ref: PageAddress::EMPTY,
            vector: if external { Vec::new() } else { vector.to_vec() },
            neighbors: vec![Vec::new(); level as usize],
            ptr: dirty_ptr,
        };

        result.set_dirty();
        result
    }

    fn set_dirty(&mut self) {
        unsafe { VectorIndexPage::set_dirty_ptr(self.ptr) };
    }

    pub fn set_vector_ref(&mut self, address: PageAddress) {
        self.vector_ref = address;
        self.segment.write_page_address(P_VECTOR_REF, address);
        self.set_dirty();
    }

    pub fn set_neighbors(&mut self, level: u8, neighbors: &[PageAddress]) {
        debug_assert!(neighbors.len() <= VECTOR_MAX_NEIGHBORS);
        let base = P_NEIGHBORS + level as usize * neighbor_list_size();
        self.segment.write_u8(base, neighbors.len() as u8);
        for (i, addr) in neighbors.iter().enumerate() {
            self.segment
                .write_page_address(base + 1 + i * PageAddress::SERIALIZED_SIZE, *addr);
        }
        self.neighbors[level as usize] = neighbors.to_vec();
        self.set_dirty();
    }

    pub fn page_ptr(&self) -> *mut VectorIndexPage {
        self.ptr
    }

    pub fn into_read_only(self) -> VectorNode {
        VectorNode::copy_data(self, (), ())
    }
}

impl VectorNodeMut<'_> {
    pub(crate) fn remove_from_page(self) {
        let index = self.position().index();
        let page = unsafe { &mut *self.page_ptr() };
        page.delete_vector_node(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PageBuffer;
    use crate::engine::pages::VectorIndexPage;

    fn new_page() -> VectorIndexPage {
        VectorIndexPage::new(Box::new(PageBuffer::new(0)), 1)
    }

    #[test]
    fn inline_vector_round_trips_through_the_page() {
        let mut page = new_page();
        let vector = vec![1.0f32, -2.5, 3.25, 0.0];
        let length = VectorNode::get_node_length(2, vector.len() as u16, false);

        let slot = {
            let node = page.insert_vector_node(
                0,
                2,
                PageAddress::new(7, 3),
                vector.len() as u16,
                false,
                &vector,
                length,
            );
            node.slot()
        };

        let node = page.get_vector_node(slot);
        assert_eq!(node.level(), 2);
        assert_eq!(node.data_block(), PageAddress::new(7, 3));
        assert!(!node.is_external());
        assert_eq!(node.dimensions(), vector.len() as u16);
        assert_eq!(node.vector(), vector.as_slice());
        assert!(node.neighbors(0).is_empty());
        assert!(node.neighbors(1).is_empty());
    }

    #[test]
    fn external_vector_node_has_no_inline_payload_and_keeps_its_ref() {
        let mut page = new_page();
        let length = VectorNode::get_node_length(0, 64, true);

        let slot = {
            let mut node =
                page.insert_vector_node(1, 0, PageAddress::new(9, 1), 64, true, &[], length);
            node.set_vector_ref(PageAddress::new(40, 0));
            node.slot()
        };

        let node = page.get_vector_node(slot);
        assert!(node.is_external());
        assert!(node.vector().is_empty());
        assert_eq!(node.vector_ref(), PageAddress::new(40, 0));
    }

    #[test]
    fn set_neighbors_persists_across_reload() {
        let mut page = new_page();
        let vector = vec![0.0f32; 3];
        let length = VectorNode::get_node_length(1, 3, false);

        let slot = {
            let mut node = page.insert_vector_node(
                2,
                1,
                PageAddress::new(5, 0),
                3,
                false,
                &vector,
                length,
            );
            let neighbors = [PageAddress::new(1, 0), PageAddress::new(2, 0)];
            node.set_neighbors(0, &neighbors);
            node.slot()
        };

        let node = page.get_vector_node(slot);
        assert_eq!(
            node.neighbors(0),
            &[PageAddress::new(1, 0), PageAddress::new(2, 0)]
        );
        assert!(node.neighbors(1).is_empty());
        assert!(page.as_ref().is_dirty());
    }

    #[test]
    fn node_length_grows_with_level_and_dimensions() {
        let base = VectorNode::get_node_length(0, 0, false);
        assert_eq!(VectorNode::get_node_length(1, 0, false) - base, 1 + 8 * 5);
        assert_eq!(VectorNode::get_node_length(0, 4, false) - base, 16);
        assert_eq!(VectorNode::get_node_length(0, 4, true), base);
    }
}
