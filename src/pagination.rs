//! # Pagination
//!
//! Two windowing modes, never mixed in one request: offset mode
//! (1-based `page`/`limit` with a total count and next/prev flags) and
//! cursor mode (windowing relative to a unique-key row, signed `take`).
//! The math here is pure; the engine issues the count and window reads.

use crate::filter::FieldValue;
use serde::{Deserialize, Serialize};

/// Caller inputs for offset pagination. Missing values fall back to the
/// engine configuration; values below 1 are clamped to 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            limit: None,
        }
    }
}

/// Computed page metadata returned alongside the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    /// Page math for a 1-based `page` and `limit >= 1`:
    /// `pages = ceil(total/limit)`, `has_next = page*limit < total`,
    /// `has_prev = page > 1`.
    pub fn compute(page: u32, limit: u32, total: u64) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            pages: total.div_ceil(u64::from(limit)),
            has_next: u64::from(page) * u64::from(limit) < total,
            has_prev: page > 1,
        }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// A page of rows plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

/// The unique-key value identifying the cursor row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorKey {
    pub field: String,
    pub value: FieldValue,
}

impl CursorKey {
    pub fn new(field: &str, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// Caller inputs for cursor pagination. `take > 0` walks forward from the
/// cursor, `take < 0` backward; `skip` steps past the cursor row first
/// (the cursor row itself is included when `skip == 0`). Requires a stable
/// `order_by` from the caller; the engine never invents one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorRequest {
    pub cursor: CursorKey,
    pub take: i64,
    #[serde(default)]
    pub skip: u64,
}

impl CursorRequest {
    pub fn forward(cursor: CursorKey, take: u32) -> Self {
        Self {
            cursor,
            take: i64::from(take),
            skip: 0,
        }
    }

    pub fn backward(cursor: CursorKey, take: u32) -> Self {
        Self {
            cursor,
            take: -i64::from(take),
            skip: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info_metadata() {
        // total=45, limit=20: pages=3; page 1 has next, no prev
        let info = PageInfo::compute(1, 20, 45);
        assert_eq!(info.pages, 3);
        assert!(info.has_next);
        assert!(!info.has_prev);

        let info = PageInfo::compute(3, 20, 45);
        assert!(!info.has_next);
        assert!(info.has_prev);
    }

    #[test]
    fn test_page_info_exact_boundary() {
        let info = PageInfo::compute(2, 10, 20);
        assert_eq!(info.pages, 2);
        assert!(!info.has_next);
        assert!(info.has_prev);
    }

    #[test]
    fn test_page_info_empty_result() {
        let info = PageInfo::compute(1, 20, 0);
        assert_eq!(info.pages, 0);
        assert!(!info.has_next);
        assert!(!info.has_prev);
    }

    #[test]
    fn test_page_clamped_to_one() {
        let info = PageInfo::compute(0, 0, 5);
        assert_eq!(info.page, 1);
        assert_eq!(info.limit, 1);
        assert_eq!(info.offset(), 0);
    }

    #[test]
    fn test_offset_computation() {
        assert_eq!(PageInfo::compute(3, 10, 100).offset(), 20);
        assert_eq!(PageInfo::compute(1, 10, 100).offset(), 0);
    }
}
