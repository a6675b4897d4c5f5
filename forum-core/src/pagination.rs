//! Pagination boundary math shared by every list operation.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Limit used when a caller does not supply one.
pub const DEFAULT_LIMIT: i64 = 25;

/// Largest page a caller may request; larger limits are clamped.
pub const MAX_LIMIT: i64 = 250;

/// A requested window into a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Build a page request, rejecting non-positive limits and negative
    /// offsets and clamping the limit to [`MAX_LIMIT`].
    pub fn new(limit: i64, offset: i64) -> Result<Self, ValidationError> {
        if limit <= 0 {
            return Err(ValidationError::InvalidLimit { limit });
        }
        if offset < 0 {
            return Err(ValidationError::NegativeOffset { offset });
        }
        Ok(Self {
            limit: limit.min(MAX_LIMIT),
            offset,
        })
    }

    /// First page with the given limit.
    pub fn first(limit: i64) -> Result<Self, ValidationError> {
        Self::new(limit, 0)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Number of pages needed to show `total` items, `limit` at a time.
pub fn page_count(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    total / limit + i64::from(total % limit != 0)
}

/// Offset of the last page.
pub fn max_offset(total: i64, limit: i64) -> i64 {
    let pages = page_count(total, limit);
    if pages == 0 {
        return 0;
    }
    (pages - 1) * limit
}

/// Reject an offset that points past the last page.
///
/// An empty collection accepts any offset so that "page 1 of nothing" is not
/// an error.
pub fn validate_offset(offset: i64, total: i64, limit: i64) -> Result<(), ValidationError> {
    if total == 0 {
        return Ok(());
    }
    let max = max_offset(total, limit);
    if offset > max {
        return Err(ValidationError::OffsetOutOfRange {
            offset,
            max_offset: max,
            total,
        });
    }
    Ok(())
}

/// One page of a collection plus the numbers needed to render pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedCollection<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub pages: i64,
}

impl<T> PaginatedCollection<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
            pages: page_count(total, page.limit),
        }
    }

    pub fn empty(page: Page) -> Self {
        Self::new(Vec::new(), 0, page)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Transform the items while keeping the pagination numbers.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PaginatedCollection<U> {
        PaginatedCollection {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(1, 20), 1);
        assert_eq!(page_count(20, 20), 1);
        assert_eq!(page_count(21, 20), 2);
        assert_eq!(page_count(47, 20), 3);
        assert_eq!(page_count(i64::MAX, 1), i64::MAX);
        assert_eq!(page_count(i64::MAX, 2), i64::MAX / 2 + 1);
        assert_eq!(max_offset(i64::MAX, 2), i64::MAX - 1);
    }

    #[test]
    fn test_last_page_of_47_by_20() {
        assert_eq!(max_offset(47, 20), 40);
        assert!(validate_offset(40, 47, 20).is_ok());
        let remaining = 47 - 40;
        assert_eq!(remaining, 7);
    }

    #[test]
    fn test_offset_past_last_page_is_rejected() {
        assert_eq!(
            validate_offset(60, 47, 20),
            Err(ValidationError::OffsetOutOfRange {
                offset: 60,
                max_offset: 40,
                total: 47,
            })
        );
    }

    #[test]
    fn test_empty_collection_accepts_any_offset() {
        assert!(validate_offset(0, 0, 20).is_ok());
        assert!(validate_offset(500, 0, 20).is_ok());
    }

    #[test]
    fn test_page_new_validates() {
        assert_eq!(Page::new(0, 0), Err(ValidationError::InvalidLimit { limit: 0 }));
        assert_eq!(
            Page::new(10, -1),
            Err(ValidationError::NegativeOffset { offset: -1 })
        );
        assert_eq!(Page::new(1000, 0).map(|p| p.limit), Ok(MAX_LIMIT));
        assert_eq!(Page::default().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_collection_map_keeps_numbers() {
        let page = Page::new(20, 40).expect("valid page");
        let collection = PaginatedCollection::new(vec![1, 2, 3], 47, page);
        let mapped = collection.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.pages, 3);
        assert_eq!(mapped.offset, 40);
    }
}
