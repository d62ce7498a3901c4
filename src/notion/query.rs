//! Paginated database queries.
//!
//! [`NotionClient::query`] fetches one page, [`NotionClient::continue_query`]
//! follows its cursor and [`NotionClient::drain`] walks every page. Callers
//! that need "the" answer must use `drain`; a single page is only a slice.

use super::client::NotionClient;
use super::filter::{Filter, Sort};
use crate::error::{NotesError, Result};
use serde_json::{Map, Value, json};
use tracing::debug;

/// Largest page the service hands out.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of query results plus what is needed to fetch the next one.
#[derive(Debug, Clone)]
pub struct SearchResultPage {
    pub rows: Vec<Value>,
    pub has_more: bool,
    /// Present exactly when `has_more` is set.
    pub next_cursor: Option<String>,
    /// Sorts of the originating query, echoed on continuation.
    pub sorts: Vec<Sort>,
    /// Filter of the originating query, echoed on continuation.
    pub filter: Option<Filter>,
}

impl SearchResultPage {
    pub fn is_exhausted(&self) -> bool {
        !self.has_more
    }
}

/// Request body for `POST /v1/databases/{id}/query`.
///
/// Absent filters and empty sorts are left out entirely.
pub fn build_query_body(
    filter: Option<&Filter>,
    sorts: &[Sort],
    page_size: u32,
    start_cursor: Option<&str>,
) -> Value {
    let mut body = Map::new();
    body.insert("page_size".into(), json!(page_size));
    if let Some(filter) = filter {
        body.insert("filter".into(), filter.to_wire());
    }
    if !sorts.is_empty() {
        body.insert("sorts".into(), json!(sorts));
    }
    if let Some(cursor) = start_cursor {
        body.insert("start_cursor".into(), json!(cursor));
    }
    Value::Object(body)
}

fn check_page_size(page_size: u32) -> Result<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(NotesError::precondition(format!(
            "page size {page_size} outside 1..={MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

fn parse_page(body: Value, filter: Option<Filter>, sorts: Vec<Sort>) -> Result<SearchResultPage> {
    let mut body = match body {
        Value::Object(map) => map,
        other => return Err(NotesError::parse(format!("query response is not an object: {other}"))),
    };
    let rows = match body.remove("results") {
        Some(Value::Array(rows)) => rows,
        _ => return Err(NotesError::parse("query response has no results array")),
    };
    let has_more = body
        .get("has_more")
        .and_then(Value::as_bool)
        .ok_or_else(|| NotesError::parse("query response has no has_more flag"))?;
    let next_cursor = if has_more {
        let cursor = body
            .get("next_cursor")
            .and_then(Value::as_str)
            .ok_or_else(|| NotesError::parse("has_more is set but next_cursor is missing"))?;
        Some(cursor.to_owned())
    } else {
        None
    };
    Ok(SearchResultPage {
        rows,
        has_more,
        next_cursor,
        sorts,
        filter,
    })
}

impl NotionClient {
    /// Run one query request against the configured database.
    pub async fn query(
        &self,
        filter: Option<Filter>,
        sorts: Vec<Sort>,
        page_size: u32,
    ) -> Result<SearchResultPage> {
        check_page_size(page_size)?;
        self.fetch_page(filter, sorts, page_size, None).await
    }

    /// Fetch the page after `page`, reusing its filter and sorts.
    ///
    /// # Errors
    ///
    /// [`NotesError::Precondition`] when `page` has no cursor.
    pub async fn continue_query(
        &self,
        page: &SearchResultPage,
        page_size: u32,
    ) -> Result<SearchResultPage> {
        let cursor = page
            .next_cursor
            .as_deref()
            .ok_or_else(|| NotesError::precondition("cannot continue an exhausted page"))?;
        check_page_size(page_size)?;
        self.fetch_page(page.filter.clone(), page.sorts.clone(), page_size, Some(cursor))
            .await
    }

    /// Fetch every page and concatenate the rows in page order.
    ///
    /// Any failing request aborts the drain; no partial result is returned.
    pub async fn drain(&self, filter: Option<Filter>, sorts: Vec<Sort>) -> Result<Vec<Value>> {
        let page_size = self.page_size();
        let mut page = self.query(filter, sorts, page_size).await?;
        let mut rows = std::mem::take(&mut page.rows);
        let mut pages = 1usize;
        while page.has_more {
            page = self.continue_query(&page, page_size).await?;
            rows.append(&mut page.rows);
            pages += 1;
        }
        debug!(pages, rows = rows.len(), "query drained");
        Ok(rows)
    }

    async fn fetch_page(
        &self,
        filter: Option<Filter>,
        sorts: Vec<Sort>,
        page_size: u32,
        start_cursor: Option<&str>,
    ) -> Result<SearchResultPage> {
        let body = build_query_body(filter.as_ref(), &sorts, page_size, start_cursor);
        let path = format!("/v1/databases/{}/query", self.database_id());
        let response = self.post_json(&path, &body).await?;
        parse_page(response, filter, sorts)
    }
}
