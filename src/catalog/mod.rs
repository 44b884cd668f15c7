//! Marketplace catalogs: record types, the shared company-list cache, and
//! payload compaction applied before summarization.

pub mod cache;
pub mod compact;
pub mod types;

/// Smallest page requested when approximating "every company of a kind".
pub const MIN_CATALOG_PAGE_SIZE: u32 = 100;

pub use cache::{CatalogCache, CatalogSlot};
pub use types::{AssetKind, Catalog, CatalogQuery, CatalogRecord, CompanyKind, COMPANY_NAME_FIELDS};
