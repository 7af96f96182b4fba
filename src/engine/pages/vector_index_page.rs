use crate::Result;
use crate::engine::vector_index_node::{VectorNode, VectorNodeMut};
use crate::engine::{BasePage, MAX_INDEX_LENGTH, Page, PageAddress, PageBuffer, PageType};
use std::ops::{Deref, DerefMut};

pub(crate) struct VectorIndexPage {
    base: BasePage,
}

impl VectorIndexPage {
    pub fn new(buffer: Box<PageBuffer>, page_id: u32) -> Self {
        Self {
            base: BasePage::new(buffer, page_id, PageType::VectorIndex),
        }
    }

    pub fn load(buffer: Box<PageBuffer>) -> Result<Self> {
        let base = BasePage::load(buffer)?;
        if base.page_type() != PageType::VectorIndex {
            return Err(crate::Error::invalid_page_type(PageType::VectorIndex, base));
        }
        Ok(Self { base })
    }

    pub fn get_vector_node(&self, index: u8) -> VectorNode {
        let segment = self.base.get(index);
        VectorNode::load(self.base.page_id(), index, segment)
    }

    pub fn get_vector_node_mut(&mut self, index: u8) -> VectorNodeMut<'_> {
        let ptr = self as *mut VectorIndexPage;
        let page_id = self.base.page_id();
        let segment = self.base.get_mut(index);
        VectorNodeMut::load(page_id, ptr, index, segment)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_vector_node(
        &mut self,
        slot: u8,
        level: u8,
        data_block: PageAddress,
        dimensions: u16,
        external: bool,
        vector: &[f32],
        length: usize,
    ) -> VectorNodeMut<'_> {
        let ptr = self as *mut VectorIndexPage;
        let page_id = self.base.page_id();
        let (segment, index) = self.base.insert(length);

        VectorNodeMut::new(
            page_id, index, ptr, segment, slot, level, data_block, dimensions, external, vector,
        )
    }

    pub fn delete_vector_node(&mut self, index: u8) {
        self.base.delete(index);
    }

    pub fn get_vector_nodes(&self) -> impl Iterator<Item = VectorNode> {
        self.base.get_used_indices().map(|i| self.get_vector_node(i))
    }
}

impl VectorIndexPage {
    pub fn free_index_slot(free_bytes: usize) -> u8 {
        if free_bytes >= MAX_INDEX_LENGTH { 0 } else { 1 }
    }
}

impl VectorIndexPage {
    pub(crate) unsafe fn set_dirty_ptr(ptr: *mut VectorIndexPage) {
        unsafe {
            (*ptr).base.set_dirty();
        }
    }
}

impl Deref for VectorIndexPage {
    type Target = BasePage;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for VectorIndexPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl AsRef<BasePage> for VectorIndexPage {
    fn as_ref(&self) -> &BasePage {
        &self.base
    }
}

impl AsMut<BasePage> for VectorIndexPage {
    fn as_mut(&mut self) -> &mut BasePage {
        &mut self.base
    }
}

impl Page for VectorIndexPage {
    fn load(buffer: Box<PageBuffer>) -> Result<Self> {
        Self::load(buffer)
    }

    fn new(buffer: Box<PageBuffer>, page_id: u32) -> Self {
        Self::new(buffer, page_id)
    }

    fn update_buffer(&mut self) -> &PageBuffer {
        self.base.update_buffer()
    }

    fn into_base(self: Box<Self>) -> BasePage {
        self.base
    }
}
