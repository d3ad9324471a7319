//! Pagination request validation and paged result envelope

use serde::{Deserialize, Serialize};

use super::DomainError;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page request (page >= 1, 1 <= page_size <= 100)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validates raw pagination parameters, applying defaults for omitted values
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Result<Self, DomainError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page < 1 {
            return Err(DomainError::validation("page must be greater than or equal to 1"));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(DomainError::validation(format!(
                "pageSize must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of rows to skip in the backing store
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            page: request.page(),
            page_size: request.page_size(),
            total_items,
            total_pages: total_items.div_ceil(u64::from(request.page_size())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let request = PageRequest::new(None, None).unwrap();
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 10);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_rejects_page_zero() {
        assert!(matches!(
            PageRequest::new(Some(0), Some(10)),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(PageRequest::new(Some(1), Some(0)).is_err());
        assert!(PageRequest::new(Some(1), Some(101)).is_err());
        assert!(PageRequest::new(Some(1), Some(1)).is_ok());
        assert!(PageRequest::new(Some(1), Some(100)).is_ok());
    }

    #[test]
    fn test_offset() {
        let request = PageRequest::new(Some(3), Some(25)).unwrap();
        assert_eq!(request.offset(), 50);
        assert_eq!(request.limit(), 25);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let request = PageRequest::new(Some(1), Some(10)).unwrap();

        assert_eq!(Page::<u8>::new(vec![], request, 0).total_pages, 0);
        assert_eq!(Page::<u8>::new(vec![], request, 1).total_pages, 1);
        assert_eq!(Page::<u8>::new(vec![], request, 10).total_pages, 1);
        assert_eq!(Page::<u8>::new(vec![], request, 11).total_pages, 2);
    }
}
