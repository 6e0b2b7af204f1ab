//! Cursor pagination.
//!
//! List endpoints answer with `{data: [...], pagination: {cursor}}`. The
//! walk starts with an empty `after` and follows the cursor until it is
//! missing or empty. Pages are requested strictly one after another since
//! each cursor comes from the previous response.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::Result;
use crate::session::Session;

/// Pagination block of a list response.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    /// Opaque cursor for the next page.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One page of a list response.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Cursor block; absent on the final page.
    #[serde(default)]
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Cursor for the next page, if there is one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.pagination
            .cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
    }
}

/// Walks a paginated endpoint to completion.
///
/// `query` is sent on every page alongside `after`. Items are returned in
/// page order.
pub async fn collect_pages<T: DeserializeOwned>(
    session: &Session,
    path: &str,
    query: &[(&str, &str)],
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut cursor = String::new();
    let mut pages: u32 = 0;

    loop {
        let mut request = session.request(Method::GET, path)?;
        for (name, value) in query {
            request = request.query(*name, *value);
        }
        request = request.query("after", cursor.as_str());

        let page: Page<T> = session.send(&request).await?.expect_status(200)?.json()?;
        pages += 1;

        let next = page.next_cursor().map(str::to_string);
        items.extend(page.data);

        match next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    log::debug!("{path}: collected {} item(s) over {pages} page(s)", items.len());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_without_pagination_block_is_last() {
        let page: Page<u32> = serde_json::from_str(r#"{"data":[1,2]}"#).unwrap();
        assert_eq!(page.data, vec![1, 2]);
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn test_empty_cursor_is_last() {
        let page: Page<u32> =
            serde_json::from_str(r#"{"data":[],"pagination":{"cursor":""}}"#).unwrap();
        assert_eq!(page.next_cursor(), None);

        let page: Page<u32> = serde_json::from_str(r#"{"data":[],"pagination":{}}"#).unwrap();
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn test_cursor_present() {
        let page: Page<u32> =
            serde_json::from_str(r#"{"data":[7],"pagination":{"cursor":"eyJiIjpu"}}"#).unwrap();
        assert_eq!(page.next_cursor(), Some("eyJiIjpu"));
    }
}
