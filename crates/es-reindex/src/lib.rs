// Reindex tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # es-reindex
//!
//! `es-reindex` copies one Elasticsearch index into another, optionally on a
//! different cluster. The destination is created with the source settings and
//! mappings when it does not exist yet, documents are streamed with the scroll
//! API and written back with `_bulk`, and the run ends with a document count
//! comparison between both sides.
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Retrying request executor | [`client`], [`retry`] |
//! | Server version probe | [`probe`] |
//! | Scroll extraction | [`extractor`], [`dialect`] |
//! | Document transformation | [`transform`] |
//! | Bulk writes | [`bulk`] |
//! | Progress / E.T.A. | [`progress`] |
//! | Count verification | [`verify`] |
//! | Orchestration | [`pipeline`] |
//!
//! ## Quick Start
//!
//! ```bash
//! # Copy a local index into a new one
//! es-reindex products products_v2
//!
//! # Copy to another cluster, replacing the destination first
//! es-reindex -r http://old:9200/products http://new:9200/products
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   url: http://old:9200
//!   index: products
//!
//! destination:
//!   url: http://new:9200
//!   index: products
//!
//! options:
//!   frame_size: 2000
//!   update_existing: true
//!   retry:
//!     max_retries: 50
//! ```

#![warn(missing_docs)]

pub mod bulk;
pub mod client;
pub mod config;
pub mod dialect;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod schema;
pub mod transform;
pub mod verify;

pub use client::{Body, Executor, HttpTransport, Method, Request, Transport};
pub use config::{Endpoint, ReindexConfig, ReindexOptions};
pub use dialect::Dialect;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, ReindexStats};
pub use retry::{Attempt, RetryConfig};
pub use transform::{BulkAction, DocumentHook, DocumentRecord, Identity};
pub use verify::CountReport;
