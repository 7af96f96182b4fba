use crate::engine::snapshot::Snapshot;
use crate::engine::vector_distance;
use crate::engine::vector_index_node::VectorNode;
use crate::engine::{
    DataPage, MAX_INDEX_LENGTH, PageAddress, StreamFactory, VECTOR_CONSTRUCTION_EF,
    VECTOR_MAX_LEVEL, VECTOR_MAX_NEIGHBORS, VECTOR_MIN_EF, VectorIndexPage, VectorMetric,
};
use crate::expression::BsonExpression;
use crate::{Error, Result};
use std::collections::{HashSet, VecDeque};

/// Data-service style access to the HNSW vector index of a collection: one graph per
/// named index, entry point tracked in [`crate::engine::VectorCollectionIndex::root`].
/// Mirrors [`crate::engine::index_service::IndexService`]'s role for the skip-list
/// secondary indexes, but the wiring (level sampling, beam search, pruned neighbor
/// selection) is specific to HNSW.
pub(crate) struct VectorIndexService<'snapshot, SF: StreamFactory> {
    snapshot: &'snapshot mut Snapshot<SF>,
}

impl<'snapshot, SF: StreamFactory> VectorIndexService<'snapshot, SF> {
    pub fn new(snapshot: &'snapshot mut Snapshot<SF>) -> Self {
        Self { snapshot }
    }
}

/// Deduplicates by address, sorts by ascending distance and keeps the closest `max`
/// candidates — the pruning rule applied both to a new node's own neighbor lists and to
/// any existing neighbor list a new node is linked into.
fn select_neighbors(
    mut candidates: Vec<(f32, PageAddress)>,
    max: usize,
) -> Vec<(f32, PageAddress)> {
    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = HashSet::new();
    candidates.retain(|&(_, addr)| seen.insert(addr));
    candidates.truncate(max);
    candidates
}

impl<SF: StreamFactory> VectorIndexService<'_, SF> {
    pub async fn create_index(
        &mut self,
        name: &str,
        expression: &str,
        dimensions: u16,
        metric: VectorMetric,
    ) -> Result<()> {
        let bson_expr = BsonExpression::create(expression)?;

        self.snapshot
            .collection_page_mut()
            .unwrap()
            .insert_vector_index(name, bson_expr, dimensions, metric)?;

        Ok(())
    }

    pub async fn insert(
        &mut self,
        index_name: &str,
        data_block: PageAddress,
        vector: &[f32],
    ) -> Result<()> {
        let (slot, dimensions, metric, root, free_vector_page_list) = {
            let index = self
                .snapshot
                .collection_page()
                .and_then(|c| c.get_vector_index(index_name))
                .ok_or_else(|| Error::index_not_found(index_name))?;

            (
                index.slot(),
                index.dimensions(),
                index.metric(),
                index.root(),
                index.free_vector_page_list(),
            )
        };

        if vector.len() != dimensions as usize {
            return Err(Error::vector_dimension_mismatch(
                dimensions as usize,
                vector.len(),
            ));
        }

        let level = Self::sample_level();
        let inline_length = VectorNode::get_node_length(level, dimensions, false);
        let external = inline_length > MAX_INDEX_LENGTH;
        let length = if external {
            VectorNode::get_node_length(level, dimensions, true)
        } else {
            inline_length
        };

        let page = self
            .snapshot
            .get_free_vector_page(length, free_vector_page_list)
            .await?;
        let page_id = page.page_id();
        let node = page.insert_vector_node(
            slot, level, data_block, dimensions, external, vector, length,
        );
        let new_position = node.position();

        self.update_free_vector_list(page_id, index_name).await?;

        if external {
            let head = self.write_external_vector(vector).await?;
            self.snapshot
                .get_page::<VectorIndexPage>(new_position.page_id(), false)
                .await?
                .get_vector_node_mut(new_position.index())
                .set_vector_ref(head);
        }

        if root.is_empty() {
            self.set_root(index_name, new_position);
        } else {
            self.insert_into_graph(index_name, metric, root, new_position, level, vector)
                .await?;
        }

        Ok(())
    }

    pub async fn search(
        &mut self,
        index_name: &str,
        query: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<(PageAddress, f32)>> {
        let (dimensions, metric, root) = {
            let index = self
                .snapshot
                .collection_page()
                .and_then(|c| c.get_vector_index(index_name))
                .ok_or_else(|| Error::index_not_found(index_name))?;

            (index.dimensions(), index.metric(), index.root())
        };

        if query.len() != dimensions as usize {
            return Err(Error::vector_dimension_mismatch(
                dimensions as usize,
                query.len(),
            ));
        }

        if root.is_empty() {
            return Ok(Vec::new());
        }

        let ef = (limit.saturating_mul(4)).max(VECTOR_MIN_EF);

        let root_node = self.get_vector_node(root).await?;
        let mut entry = root;
        let mut layer = root_node.level().saturating_sub(1);
        while layer > 0 {
            entry = self.greedy_descend(entry, query, layer, metric).await?;
            layer -= 1;
        }

        let candidates = self.search_layer(&[entry], query, 0, ef, metric).await?;

        let mut results = Vec::with_capacity(candidates.len());
        for (_, addr) in candidates {
            let node = self.get_vector_node(addr).await?;
            let vector = self.load_vector(&node).await?;
            let (distance, similarity) = vector_distance::distance(metric, query, &vector);

            if vector_distance::within_threshold(metric, similarity, threshold) {
                results.push((distance, node.data_block(), similarity));
            }
        }

        // distance is ascending-good for every metric, including DotProduct (negated there).
        results.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        Ok(results
            .into_iter()
            .map(|(_, addr, similarity)| (addr, similarity))
            .collect())
    }

    pub async fn delete(&mut self, index_name: &str, data_block: PageAddress) -> Result<()> {
        let root = {
            let index = self
                .snapshot
                .collection_page()
                .and_then(|c| c.get_vector_index(index_name))
                .ok_or_else(|| Error::index_not_found(index_name))?;

            index.root()
        };

        if root.is_empty() {
            return Ok(());
        }

        let target = match self.bfs_find_by_data_block(root, data_block).await? {
            Some(addr) => addr,
            None => return Ok(()),
        };

        let node = self.get_vector_node(target).await?;
        let level = node.level();
        let external = node.is_external();
        let vector_ref = node.vector_ref();
        let fallback_entry = node.neighbors(0).first().copied();

        for layer in 0..level {
            let neighbors = node.neighbors(layer).to_vec();
            for neighbor in neighbors {
                self.unlink_neighbor(neighbor, layer, target).await?;
            }
        }

        if external {
            self.release_external_vector(vector_ref).await?;
        }

        let page_id = target.page_id();
        self.snapshot
            .get_page::<VectorIndexPage>(page_id, false)
            .await?
            .delete_vector_node(target.index());
        self.update_free_vector_list(page_id, index_name).await?;

        if target == root {
            let new_root = match fallback_entry {
                Some(start) => self.bfs_highest_level(start).await?,
                None => PageAddress::EMPTY,
            };
            self.set_root(index_name, new_root);
        }

        Ok(())
    }

    fn sample_level() -> u8 {
        let mut level = 1u8;
        while level < VECTOR_MAX_LEVEL && rand::random::<f32>() < 0.5 {
            level += 1;
        }
        level
    }

    fn set_root(&mut self, index_name: &str, root: PageAddress) {
        self.snapshot
            .collection_page_mut()
            .unwrap()
            .get_vector_index_mut(index_name)
            .unwrap()
            .set_root(root);
    }

    async fn get_vector_node(&mut self, addr: PageAddress) -> Result<VectorNode> {
        let page = self
            .snapshot
            .get_page::<VectorIndexPage>(addr.page_id(), false)
            .await?;
        Ok(page.get_vector_node(addr.index()))
    }

    async fn load_vector(&mut self, node: &VectorNode) -> Result<Vec<f32>> {
        if node.is_external() {
            self.read_external_vector(node.vector_ref(), node.dimensions())
                .await
        } else {
            Ok(node.vector().to_vec())
        }
    }

    async fn load_vector_by_addr(&mut self, addr: PageAddress) -> Result<Vec<f32>> {
        let node = self.get_vector_node(addr).await?;
        self.load_vector(&node).await
    }

    /// Follows the single best neighbor at `layer` until no closer node is found,
    /// starting from `current`.
    async fn greedy_descend(
        &mut self,
        mut current: PageAddress,
        query: &[f32],
        layer: u8,
        metric: VectorMetric,
    ) -> Result<PageAddress> {
        let current_vector = self.load_vector_by_addr(current).await?;
        let (mut best_distance, _) = vector_distance::distance(metric, query, &current_vector);

        loop {
            let node = self.get_vector_node(current).await?;
            if (node.level() as i32 - 1) < layer as i32 {
                break;
            }

            let neighbors = node.neighbors(layer).to_vec();
            let mut improved = None;

            for neighbor in neighbors {
                let vector = self.load_vector_by_addr(neighbor).await?;
                let (distance, _) = vector_distance::distance(metric, query, &vector);
                if distance < best_distance {
                    best_distance = distance;
                    improved = Some(neighbor);
                }
            }

            match improved {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(current)
    }

    /// Bounded beam search: expands the frontier of `entry_points` at `layer`, keeping
    /// at most `ef` candidates ordered by ascending distance, until no closer candidate
    /// is discovered.
    async fn search_layer(
        &mut self,
        entry_points: &[PageAddress],
        query: &[f32],
        layer: u8,
        ef: usize,
        metric: VectorMetric,
    ) -> Result<Vec<(f32, PageAddress)>> {
        let mut visited = HashSet::new();
        let mut candidates: Vec<(f32, PageAddress)> = Vec::new();

        for &addr in entry_points {
            if !visited.insert(addr) {
                continue;
            }
            let vector = self.load_vector_by_addr(addr).await?;
            let (distance, _) = vector_distance::distance(metric, query, &vector);
            candidates.push((distance, addr));
        }
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(ef);

        loop {
            let frontier = candidates.clone();
            let mut improved = false;

            for (_, addr) in &frontier {
                let node = self.get_vector_node(*addr).await?;
                if (node.level() as i32 - 1) < layer as i32 {
                    continue;
                }

                for neighbor in node.neighbors(layer).to_vec() {
                    if !visited.insert(neighbor) {
                        continue;
                    }

                    let vector = self.load_vector_by_addr(neighbor).await?;
                    let (distance, _) = vector_distance::distance(metric, query, &vector);
                    let worst = candidates.last().map(|&(d, _)| d).unwrap_or(f32::INFINITY);

                    if candidates.len() < ef || distance < worst {
                        candidates.push((distance, neighbor));
                        improved = true;
                    }
                }
            }

            candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            candidates.truncate(ef);

            if !improved {
                break;
            }
        }

        Ok(candidates)
    }

    async fn insert_into_graph(
        &mut self,
        index_name: &str,
        metric: VectorMetric,
        root: PageAddress,
        new_position: PageAddress,
        new_level: u8,
        query: &[f32],
    ) -> Result<()> {
        let root_node = self.get_vector_node(root).await?;
        let root_top = root_node.level().saturating_sub(1);
        let new_top = new_level.saturating_sub(1);

        let mut entry = root;
        let mut layer = root_top;
        while layer > new_top {
            entry = self.greedy_descend(entry, query, layer, metric).await?;
            if layer == 0 {
                break;
            }
            layer -= 1;
        }

        let mut entry_points = vec![entry];
        let mut layer = root_top.min(new_top);

        loop {
            let candidates = self
                .search_layer(&entry_points, query, layer, VECTOR_CONSTRUCTION_EF, metric)
                .await?;

            let selected = select_neighbors(candidates, VECTOR_MAX_NEIGHBORS);
            self.link_bidirectional(new_position, layer, &selected, metric)
                .await?;

            entry_points = selected.iter().map(|&(_, addr)| addr).collect();
            if entry_points.is_empty() {
                entry_points = vec![entry];
            }

            if layer == 0 {
                break;
            }
            layer -= 1;
        }

        if new_top > root_top {
            self.set_root(index_name, new_position);
        }

        Ok(())
    }

    async fn link_bidirectional(
        &mut self,
        new_position: PageAddress,
        layer: u8,
        selected: &[(f32, PageAddress)],
        metric: VectorMetric,
    ) -> Result<()> {
        let new_neighbors: Vec<PageAddress> = selected.iter().map(|&(_, addr)| addr).collect();

        self.snapshot
            .get_page::<VectorIndexPage>(new_position.page_id(), false)
            .await?
            .get_vector_node_mut(new_position.index())
            .set_neighbors(layer, &new_neighbors);

        for &neighbor in &new_neighbors {
            self.add_neighbor_pruned(neighbor, layer, new_position, metric)
                .await?;
        }

        Ok(())
    }

    async fn add_neighbor_pruned(
        &mut self,
        addr: PageAddress,
        layer: u8,
        candidate: PageAddress,
        metric: VectorMetric,
    ) -> Result<()> {
        let node = self.get_vector_node(addr).await?;
        if (node.level() as i32 - 1) < layer as i32 {
            return Ok(());
        }

        let mut neighbors = node.neighbors(layer).to_vec();
        if neighbors.contains(&candidate) {
            return Ok(());
        }
        neighbors.push(candidate);

        let pruned = if neighbors.len() > VECTOR_MAX_NEIGHBORS {
            let own_vector = self.load_vector(&node).await?;
            let mut scored = Vec::with_capacity(neighbors.len());
            for neighbor in neighbors {
                let vector = self.load_vector_by_addr(neighbor).await?;
                let (distance, _) = vector_distance::distance(metric, &own_vector, &vector);
                scored.push((distance, neighbor));
            }
            select_neighbors(scored, VECTOR_MAX_NEIGHBORS)
                .into_iter()
                .map(|(_, addr)| addr)
                .collect()
        } else {
            neighbors
        };

        self.snapshot
            .get_page::<VectorIndexPage>(addr.page_id(), false)
            .await?
            .get_vector_node_mut(addr.index())
            .set_neighbors(layer, &pruned);

        Ok(())
    }

    async fn unlink_neighbor(
        &mut self,
        addr: PageAddress,
        layer: u8,
        target: PageAddress,
    ) -> Result<()> {
        let node = self.get_vector_node(addr).await?;
        if (node.level() as i32 - 1) < layer as i32 {
            return Ok(());
        }

        let remaining: Vec<PageAddress> = node
            .neighbors(layer)
            .iter()
            .copied()
            .filter(|&a| a != target)
            .collect();

        self.snapshot
            .get_page::<VectorIndexPage>(addr.page_id(), false)
            .await?
            .get_vector_node_mut(addr.index())
            .set_neighbors(layer, &remaining);

        Ok(())
    }

    async fn bfs_find_by_data_block(
        &mut self,
        root: PageAddress,
        data_block: PageAddress,
    ) -> Result<Option<PageAddress>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(root);
        visited.insert(root);

        while let Some(addr) = queue.pop_front() {
            let node = self.get_vector_node(addr).await?;
            if node.data_block() == data_block {
                return Ok(Some(addr));
            }

            for layer in 0..node.level() {
                for &neighbor in node.neighbors(layer) {
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        Ok(None)
    }

    async fn bfs_highest_level(&mut self, start: PageAddress) -> Result<PageAddress> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);

        let mut best = start;
        let mut best_level = 0u8;

        while let Some(addr) = queue.pop_front() {
            let node = self.get_vector_node(addr).await?;
            if node.level() > best_level {
                best_level = node.level();
                best = addr;
            }

            for layer in 0..node.level() {
                for &neighbor in node.neighbors(layer) {
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        Ok(best)
    }

    /// Writes `vector` as a chain of Data-block pages and returns the head address,
    /// mirroring [`crate::engine::data_service::DataService::insert`]'s chunking but over a
    /// fixed-size float payload instead of a BSON document.
    async fn write_external_vector(&mut self, vector: &[f32]) -> Result<PageAddress> {
        let bytes: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut offset = 0;
        let mut first_block = PageAddress::EMPTY;
        let mut prev_block: Option<PageAddress> = None;

        while offset < bytes.len() {
            let max_chunk = crate::engine::data_service::MAX_DATA_BYTES_PER_PAGE;
            let chunk_len = (bytes.len() - offset).min(max_chunk);
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
                self.snapshot
                    .get_page::<DataPage>(prev.page_id(), false)
                    .await?
                    .get_data_block_mut(prev.index())
                    .set_next_block(block_position);
            }

            if first_block.is_empty() {
                first_block = block_position;
            }

            prev_block = Some(block_position);
            offset += chunk_len;
        }

        Ok(first_block)
    }

    async fn read_external_vector(
        &mut self,
        head: PageAddress,
        dimensions: u16,
    ) -> Result<Vec<f32>> {
        let mut bytes = Vec::with_capacity(dimensions as usize * 4);
        let mut address = head;

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

        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect())
    }

    async fn release_external_vector(&mut self, head: PageAddress) -> Result<()> {
        let mut address = head;

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

    /// Sequential, non-aliasing re-implementation of [`Snapshot::add_or_remove_free_data_list`]
    /// that takes a page id rather than a live `&mut DataPage` borrow, since that page's own
    /// free-list bookkeeping already happened within the same `&mut self.snapshot` call chain
    /// that produced it.
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

    /// Sequential counterpart of [`Snapshot::add_or_remove_free_vector_list`], written against
    /// page ids rather than a live `&mut VectorIndexPage` borrow for the same reason as
    /// [`Self::update_free_data_list`]. Pages that empty out are unlinked from the free list but,
    /// unlike [`crate::engine::snapshot::PageCollection::delete_page`], not recycled into the
    /// empty-page list; see `DESIGN.md`.
    async fn update_free_vector_list(&mut self, page_id: u32, index_name: &str) -> Result<()> {
        let (free_bytes, items_count, current_slot, prev_id, next_id) = {
            let page = self
                .snapshot
                .get_page::<VectorIndexPage>(page_id, false)
                .await?;
            (
                page.free_bytes(),
                page.items_count(),
                page.page_list_slot(),
                page.prev_page_id(),
                page.next_page_id(),
            )
        };

        let new_slot = VectorIndexPage::free_index_slot(free_bytes);
        let is_on_list = current_slot == 0;
        let must_keep = new_slot == 0;

        if items_count == 0 {
            if is_on_list {
                self.unlink_vector_page(index_name, page_id, prev_id, next_id)
                    .await?;
            }
            return Ok(());
        }

        if is_on_list && !must_keep {
            self.unlink_vector_page(index_name, page_id, prev_id, next_id)
                .await?;
        } else if !is_on_list && must_keep {
            self.link_vector_page_as_head(index_name, page_id).await?;
        }

        let page = self
            .snapshot
            .get_page::<VectorIndexPage>(page_id, false)
            .await?;
        page.set_page_list_slot(new_slot);
        page.set_dirty();

        Ok(())
    }

    async fn unlink_vector_page(
        &mut self,
        index_name: &str,
        page_id: u32,
        prev_id: u32,
        next_id: u32,
    ) -> Result<()> {
        if prev_id != u32::MAX {
            let prev = self
                .snapshot
                .get_page::<VectorIndexPage>(prev_id, false)
                .await?;
            prev.set_next_page_id(next_id);
            prev.set_dirty();
        }
        if next_id != u32::MAX {
            let next = self
                .snapshot
                .get_page::<VectorIndexPage>(next_id, false)
                .await?;
            next.set_prev_page_id(prev_id);
            next.set_dirty();
        }

        let head = self
            .snapshot
            .collection_page()
            .and_then(|c| c.get_vector_index(index_name))
            .unwrap()
            .free_vector_page_list();

        if head == page_id {
            self.snapshot
                .collection_page_mut()
                .unwrap()
                .get_vector_index_mut(index_name)
                .unwrap()
                .set_free_vector_page_list(next_id);
        }

        let page = self
            .snapshot
            .get_page::<VectorIndexPage>(page_id, false)
            .await?;
        page.set_prev_page_id(u32::MAX);
        page.set_next_page_id(u32::MAX);
        page.set_dirty();

        Ok(())
    }

    async fn link_vector_page_as_head(&mut self, index_name: &str, page_id: u32) -> Result<()> {
        let head = self
            .snapshot
            .collection_page()
            .and_then(|c| c.get_vector_index(index_name))
            .unwrap()
            .free_vector_page_list();

        if head != u32::MAX {
            let next = self
                .snapshot
                .get_page::<VectorIndexPage>(head, false)
                .await?;
            next.set_prev_page_id(page_id);
            next.set_dirty();
        }

        let page = self
            .snapshot
            .get_page::<VectorIndexPage>(page_id, false)
            .await?;
        page.set_prev_page_id(u32::MAX);
        page.set_next_page_id(head);
        page.set_dirty();

        self.snapshot
            .collection_page_mut()
            .unwrap()
            .get_vector_index_mut(index_name)
            .unwrap()
            .set_free_vector_page_list(page_id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(page_id: u32, index: u8) -> PageAddress {
        PageAddress::new(page_id, index)
    }

    #[test]
    fn select_neighbors_orders_by_distance_and_truncates() {
        let candidates = vec![
            (0.9, addr(1, 0)),
            (0.1, addr(2, 0)),
            (0.5, addr(3, 0)),
            (0.3, addr(4, 0)),
        ];

        let selected = select_neighbors(candidates, 2);

        assert_eq!(selected, vec![(0.1, addr(2, 0)), (0.3, addr(4, 0))]);
    }

    #[test]
    fn select_neighbors_dedups_repeated_addresses() {
        let candidates = vec![(0.2, addr(1, 0)), (0.1, addr(1, 0)), (0.4, addr(2, 0))];

        let selected = select_neighbors(candidates, 8);

        assert_eq!(selected, vec![(0.1, addr(1, 0)), (0.4, addr(2, 0))]);
    }

    #[test]
    fn inline_vs_external_boundary_matches_node_length() {
        let inline_length = VectorNode::get_node_length(4, 64, false);
        let small_inline_length = VectorNode::get_node_length(1, 4, false);

        assert!(inline_length > MAX_INDEX_LENGTH);
        assert!(small_inline_length <= MAX_INDEX_LENGTH);
    }
}
