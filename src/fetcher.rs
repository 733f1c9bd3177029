//!
//! Paginated retrieval of the audit trail.
//!
//! The first response carries the total number of matching records in the
//! `X-Total-Count` header, which decides how many pages are requested. Pages
//! are fetched one at a time, in order, and concatenated as returned.
//!
use crate::{AuditRecord, Client, Error, Result};

/// Path of the audit log list, relative to the registry base URL
pub const AUDIT_LOGS_PATH: &str = "api/v2.0/audit-logs";

/// Response header with the number of records across all pages
pub const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// URL of one page. A non-empty `filter` is appended verbatim as `q`.
#[must_use]
pub fn page_url(endpoint: &url::Url, page_size: u64, page: u64, filter: &str) -> String {
    let mut url = format!("{endpoint}?page_size={page_size}&page={page}");
    if !filter.is_empty() {
        url.push_str("&q=");
        url.push_str(filter);
    }
    url
}

/// Parse the total count header, a missing header counts as zero records.
pub fn parse_total_count(header: Option<&reqwest::header::HeaderValue>) -> Result<u64> {
    let Some(header) = header else {
        return Ok(0);
    };
    let text = header
        .to_str()
        .map_err(|_| Error::TotalCount(String::from_utf8_lossy(header.as_bytes()).into()))?;
    if text.is_empty() {
        return Ok(0);
    }
    text.parse().map_err(|_| Error::TotalCount(text.to_string()))
}

/// Number of pages needed for `total_count` records
#[must_use]
pub fn total_pages(total_count: u64, page_size: u64) -> u64 {
    total_count.div_ceil(page_size)
}

/// Fetch every audit log matching `filter`.
#[tracing::instrument(skip(client), fields(base_url = %client.base_url()))]
pub async fn audit_logs(client: &Client, filter: &str) -> Result<Vec<AuditRecord>> {
    let endpoint = client.base_url().join(AUDIT_LOGS_PATH)?;
    let page_size = client.page_size();

    let mut records = Vec::new();
    // Set from the first response only
    let mut total: Option<(u64, u64)> = None;
    let mut page = 1;

    loop {
        let url = page_url(&endpoint, page_size, page, filter);
        let response = client.get_page::<AuditRecord>(&url).await?;

        if total.is_none() {
            let count = parse_total_count(response.total_count.as_ref())?;
            let pages = total_pages(count, page_size);
            tracing::debug!("{} audit logs in {} pages", count, pages);
            total = Some((count, pages));
        }

        records.extend(response.items);
        page += 1;

        if total.is_some_and(|(_, pages)| page > pages) {
            break;
        }
    }

    let expected = total.map_or(0, |(count, _)| count);
    let actual = records.len() as u64;
    if actual != expected {
        tracing::warn!(
            "server reported {} audit logs but {} were returned",
            expected,
            actual
        );
        return Err(Error::CountMismatch { expected, actual });
    }

    tracing::info!("fetched {} audit logs in {} requests", actual, page - 1);
    Ok(records)
}
