//! Collection assembler.
//!
//! Every paginated listing is the same three steps: ask the store for one
//! page of ids with the total row count, check the requested offset against
//! that total, then load each id through the scatter-gather executor.

use std::future::Future;

use forum_core::{validate_offset, EntityId, ForumResult, Page, PaginatedCollection};

use crate::scatter::ScatterGather;
use crate::store::{ListQuery, ListSource};

/// Builds paginated collections from id pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionAssembler {
    executor: ScatterGather,
}

impl CollectionAssembler {
    pub fn new(executor: ScatterGather) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &ScatterGather {
        &self.executor
    }

    /// Load one page of `query`, hydrating each id with `load`.
    ///
    /// Fails with a bad request when the offset is past the last page of a
    /// non-empty collection, and with the executor's error if any item
    /// fails to load. Never returns a partial page.
    pub async fn list<S, T, F, Fut>(
        &self,
        source: &S,
        query: &ListQuery,
        page: Page,
        load: F,
    ) -> ForumResult<PaginatedCollection<T>>
    where
        S: ListSource + ?Sized,
        F: Fn(EntityId) -> Fut,
        Fut: Future<Output = ForumResult<T>>,
    {
        let id_page = source.page(query, page).await?;
        validate_offset(page.offset, id_page.total, page.limit)?;

        tracing::trace!(
            query = query.name(),
            total = id_page.total,
            ids = id_page.ids.len(),
            "assembling collection"
        );

        let items = self.executor.gather(&id_page.ids, load).await?;
        Ok(PaginatedCollection::new(items, id_page.total, page))
    }
}
