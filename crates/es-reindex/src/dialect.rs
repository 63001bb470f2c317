//! Version-specific shapes of the scroll requests.

use serde_json::json;
use std::fmt;

use crate::client::{Body, Method, Request};
use crate::config::Endpoint;

/// Scroll request dialect, chosen once per run by [`crate::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Elasticsearch < 5: `search_type=scan`, cursor sent as a bare body.
    Legacy,
    /// Elasticsearch >= 5: `_doc`-sorted scroll, cursor wrapped in JSON.
    Modern,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        })
    }
}

impl Dialect {
    /// Request opening a scroll over every document of `source`.
    pub fn open_scroll(&self, source: &Endpoint, size: usize, keep_alive: &str) -> Request {
        match self {
            Self::Legacy => Request::new(
                Method::Get,
                format!(
                    "{}?search_type=scan&scroll={}&size={}",
                    source.path(&["_search"]),
                    keep_alive,
                    size
                ),
            ),
            Self::Modern => Request::new(
                Method::Post,
                format!("{}?scroll={}", source.path(&["_search"]), keep_alive),
            )
            .with_body(Body::Json(json!({
                "size": size,
                "sort": ["_doc"],
            }))),
        }
    }

    /// Request fetching the page after `cursor`.
    pub fn continue_scroll(&self, source: &Endpoint, cursor: &str, keep_alive: &str) -> Request {
        match self {
            Self::Legacy => Request::new(
                Method::Post,
                format!(
                    "{}?scroll={}",
                    source.cluster_path(&["_search", "scroll"]),
                    keep_alive
                ),
            )
            .with_body(Body::Text(cursor.to_string())),
            Self::Modern => Request::new(Method::Post, source.cluster_path(&["_search", "scroll"]))
                .with_body(Body::Json(json!({
                    "scroll": keep_alive,
                    "scroll_id": cursor,
                }))),
        }
    }

    /// Request releasing the server-side scroll context.
    pub fn clear_scroll(&self, source: &Endpoint, cursor: &str) -> Request {
        let request = Request::new(Method::Delete, source.cluster_path(&["_search", "scroll"]));
        match self {
            Self::Legacy => request.with_body(Body::Text(cursor.to_string())),
            Self::Modern => request.with_body(Body::Json(json!({ "scroll_id": [cursor] }))),
        }
    }

    /// Routing field name inside a bulk action header.
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::Legacy => "_routing",
            Self::Modern => "routing",
        }
    }
}
