//! Notion database integration.
//!
//! - [`property`]: typed page properties and their filter/sort fragments
//! - [`filter`]: filter combinators and sort keys
//! - [`date`]: date ranges, wire formatting and relative stamps
//! - [`client`]: authenticated HTTP client
//! - [`query`]: paginated queries and full-result draining
//! - [`database`]: database metadata and field checks

pub mod client;
pub mod database;
pub mod date;
pub mod filter;
pub mod property;
pub mod query;

pub use client::NotionClient;
pub use database::{DatabaseProperty, DatabaseSchema};
pub use date::{DateDelta, DatePoint, DateRange};
pub use filter::{Filter, FilterOp, Sort, SortDirection};
pub use property::{Property, PropertyKind};
pub use query::{MAX_PAGE_SIZE, SearchResultPage};
