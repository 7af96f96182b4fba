use crate::engine::data_block::DataBlock;
use crate::engine::snapshot::Snapshot;
use crate::engine::{
    BasePage, DataPage, MAX_DOCUMENT_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, PageAddress,
    StreamFactory,
};
use crate::{Error, Result, bson};

pub(crate) const MAX_DATA_BYTES_PER_PAGE: usize =
    PAGE_SIZE - PAGE_HEADER_SIZE - BasePage::SLOT_SIZE - DataBlock::DATA_BLOCK_FIXED_SIZE;

pub(crate) struct DataService<'snapshot, SF: StreamFactory> {
    snapshot: &'snapshot mut Snapshot<SF>,
    #[allow(dead_code)]
    max_item_count: u32,
}

impl<'snapshot, SF: StreamFactory> DataService<'snapshot, SF> {
    pub fn new(snapshot: &'snapshot mut Snapshot<SF>, max_item_count: u32) -> Self {
        Self {
            snapshot,
            max_item_count,
        }
    }

    /// Serializes `value` and writes it as a chain of Data-block pages, returning the
    /// head address. Mirrors [`crate::engine::vector_index_service::VectorIndexService`]'s
    /// external-vector chain writer: each chunk is written into its page as soon as that
    /// page is allocated, so no two pages are ever borrowed from the snapshot at once.
    pub async fn insert(&mut self, value: &bson::Document) -> Result<PageAddress> {
        let bytes = bson::to_vec(value);
        if bytes.len() > MAX_DOCUMENT_SIZE {
            return Err(Error::document_size_exceed_limit());
        }

        let mut offset = 0;
        let mut first_block = PageAddress::EMPTY;
        let mut prev_block: Option<PageAddress> = None;

        while offset < bytes.len() {
            let chunk_len = (bytes.len() - offset).min(MAX_DATA_BYTES_PER_PAGE);
            let extend = offset > 0;

            let block_position = {
                let page = self.snapshot.get_free_data_page(chunk_len as i32).await?;
                let mut block = page.insert_block(chunk_len, extend);
                block
                    .buffer_mut()
                    .write_bytes(0, &bytes[offset..offset + chunk_len]);
                block.position()
            };

            self.update_free_data_list(block_position.page_id()).await?;

            if let Some(prev) = prev_block {
                self.link_next(prev, block_position).await?;
            }
            if first_block.is_empty() {
                first_block = block_position;
            }

            prev_block = Some(block_position);
            offset += chunk_len;
        }

        Ok(first_block)
    }

    /// Overwrites the document stored at `block_address`. Reuses existing blocks in the
    /// chain as-is rather than resizing them; once the chain is exhausted, remaining bytes
    /// get new blocks appended, and leftover blocks from a shrunk document are freed.
    pub async fn update(&mut self, block_address: PageAddress, doc: &bson::Document) -> Result<()> {
        let bytes = bson::to_vec(doc);
        if bytes.len() > MAX_DOCUMENT_SIZE {
            return Err(Error::document_size_exceed_limit());
        }

        let mut offset = 0;
        let mut address = block_address;
        let mut prev_block: Option<PageAddress> = None;

        while offset < bytes.len() {
            if !address.is_empty() {
                let next_address;
                let written;
                {
                    let page = self
                        .snapshot
                        .get_page::<DataPage>(address.page_id(), false)
                        .await?;
                    let mut block = page.get_data_block_mut(address.index());
                    let buf_len = block.buffer().len();
                    written = buf_len.min(bytes.len() - offset);
                    block
                        .buffer_mut()
                        .write_bytes(0, &bytes[offset..offset + written]);
                    next_address = block.next_block();
                }

                self.update_free_data_list(address.page_id()).await?;
                offset += written;
                prev_block = Some(address);
                address = next_address;
            } else {
                let chunk_len = (bytes.len() - offset).min(MAX_DATA_BYTES_PER_PAGE);
                let block_position = {
                    let page = self.snapshot.get_free_data_page(chunk_len as i32).await?;
                    let mut block = page.insert_block(chunk_len, true);
                    block
                        .buffer_mut()
                        .write_bytes(0, &bytes[offset..offset + chunk_len]);
                    block.position()
                };

                self.update_free_data_list(block_position.page_id()).await?;
                if let Some(prev) = prev_block {
                    self.link_next(prev, block_position).await?;
                }
                prev_block = Some(block_position);
                offset += chunk_len;
            }
        }

        // old document had more blocks than the new one needs; drop the tail of the chain.
        if !address.is_empty() {
            if let Some(prev) = prev_block {
                self.link_next(prev, PageAddress::EMPTY).await?;
            }
            self.delete(address).await?;
        }

        Ok(())
    }

    pub async fn read(&mut self, mut address: PageAddress) -> Result<bson::Document> {
        let mut bytes = Vec::new();

        while !address.is_empty() {
            let page = self
                .snapshot
                .get_page::<DataPage>(address.page_id(), false)
                .await?;
            let block = page.get_data_block(address.index());
            let buffer = block.buffer();
            bytes.extend_from_slice(buffer.read_bytes(0, buffer.len()));
            address = block.next_block();
        }

        Ok(bson::Document::from_reader(&bytes)?)
    }

    pub async fn delete(&mut self, mut address: PageAddress) -> Result<()> {
        while !address.is_empty() {
            let next = {
                let page = self
                    .snapshot
                    .get_page::<DataPage>(address.page_id(), false)
                    .await?;
                let next = page.get_data_block(address.index()).next_block();
                page.delete_block(address.index());
                next
            };

            self.update_free_data_list(address.page_id()).await?;
            address = next;
        }

        Ok(())
    }

    async fn link_next(&mut self, from: PageAddress, to: PageAddress) -> Result<()> {
        let page = self
            .snapshot
            .get_page::<DataPage>(from.page_id(), false)
            .await?;
        page.get_data_block_mut(from.index()).set_next_block(to);
        Ok(())
    }

    /// Sequential, non-aliasing re-implementation of [`Snapshot::add_or_remove_free_data_list`]
    /// that takes a page id rather than a live `&mut DataPage` borrow, mirroring
    /// [`crate::engine::vector_index_service::VectorIndexService::update_free_data_list`].
    /// Pages that empty out are unlinked from the free list but not recycled into the
    /// empty-page list; see `DESIGN.md`.
    async fn update_free_data_list(&mut self, page_id: u32) -> Result<()> {
        let (free_bytes, items_count, initial_slot, prev_id, next_id) = {
            let page = self.snapshot.get_page::<DataPage>(page_id, false).await?;
            (
                page.free_bytes(),
                page.items_count(),
                page.page_list_slot(),
                page.prev_page_id(),
                page.next_page_id(),
            )
        };

        let new_slot = DataPage::free_index_slot(free_bytes);

        if new_slot == initial_slot && items_count > 0 {
            return Ok(());
        }

        if initial_slot != u8::MAX {
            self.unlink_data_page(page_id, initial_slot, prev_id, next_id)
                .await?;
        }

        if items_count > 0 {
            self.link_data_page_as_head(page_id, new_slot).await?;

            let page = self.snapshot.get_page::<DataPage>(page_id, false).await?;
            page.set_page_list_slot(new_slot);
            page.set_dirty();
        }

        Ok(())
    }

    async fn unlink_data_page(
        &mut self,
        page_id: u32,
        slot: u8,
        prev_id: u32,
        next_id: u32,
    ) -> Result<()> {
        if prev_id != u32::MAX {
            let prev = self.snapshot.get_page::<DataPage>(prev_id, false).await?;
            prev.set_next_page_id(next_id);
            prev.set_dirty();
        }
        if next_id != u32::MAX {
            let next = self.snapshot.get_page::<DataPage>(next_id, false).await?;
            next.set_prev_page_id(prev_id);
            next.set_dirty();
        }

        let head = self.snapshot.collection_page().unwrap().free_data_page_list[slot as usize];
        if head == page_id {
            self.snapshot
                .collection_page_mut()
                .unwrap()
                .free_data_page_list[slot as usize] = next_id;
            self.snapshot.collection_page_mut().unwrap().set_dirty();
        }

        let page = self.snapshot.get_page::<DataPage>(page_id, false).await?;
        page.set_prev_page_id(u32::MAX);
        page.set_next_page_id(u32::MAX);
        page.set_dirty();

        Ok(())
    }

    async fn link_data_page_as_head(&mut self, page_id: u32, slot: u8) -> Result<()> {
        let head = self.snapshot.collection_page().unwrap().free_data_page_list[slot as usize];

        if head != u32::MAX {
            let next = self.snapshot.get_page::<DataPage>(head, false).await?;
            next.set_prev_page_id(page_id);
            next.set_dirty();
        }

        let page = self.snapshot.get_page::<DataPage>(page_id, false).await?;
        page.set_prev_page_id(u32::MAX);
        page.set_next_page_id(head);
        page.set_dirty();

        self.snapshot
            .collection_page_mut()
            .unwrap()
            .free_data_page_list[slot as usize] = page_id;
        self.snapshot.collection_page_mut().unwrap().set_dirty();

        Ok(())
    }
}
