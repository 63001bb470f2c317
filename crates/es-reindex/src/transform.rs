//! Document transformation: scroll hits into bulk instructions.
//!
//! A [`DocumentHook`] is the single place where documents may be reshaped in
//! flight (renamed fields, redactions, ...). The default hook, [`Identity`],
//! copies documents untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dialect::Dialect;

/// A document as returned by a scroll page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Mapping type, absent on typeless clusters.
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Custom routing value.
    #[serde(rename = "_routing", default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<Value>,
    /// Parent id (parent/child mappings).
    #[serde(rename = "_parent", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Value>,
    /// Legacy `_timestamp` metadata.
    #[serde(rename = "_timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    /// Legacy `_ttl` metadata.
    #[serde(rename = "_ttl", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Value>,
    /// Document body.
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl DocumentRecord {
    /// Creates a record with only id, type and body.
    pub fn new(id: impl Into<String>, doc_type: Option<&str>, source: Value) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.map(str::to_string),
            routing: None,
            parent: None,
            timestamp: None,
            ttl: None,
            source,
        }
    }
}

/// In-flight document rewrite.
///
/// Implemented for any `Fn(DocumentRecord) -> DocumentRecord`, so a closure
/// can be passed directly to [`crate::Pipeline::with_hook`].
pub trait DocumentHook: Send + Sync {
    /// Returns the document to write in place of `doc`.
    fn apply(&self, doc: DocumentRecord) -> DocumentRecord;
}

impl<F> DocumentHook for F
where
    F: Fn(DocumentRecord) -> DocumentRecord + Send + Sync,
{
    fn apply(&self, doc: DocumentRecord) -> DocumentRecord {
        self(doc)
    }
}

/// Hook that leaves documents untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl DocumentHook for Identity {
    fn apply(&self, doc: DocumentRecord) -> DocumentRecord {
        doc
    }
}

/// Bulk action used for every document of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkAction {
    /// Skip documents whose id already exists in the destination.
    #[default]
    Create,
    /// Create or overwrite.
    Index,
}

impl BulkAction {
    /// `Index` when existing documents should be updated.
    pub fn from_update_flag(update_existing: bool) -> Self {
        if update_existing {
            Self::Index
        } else {
            Self::Create
        }
    }

    /// Action name in the bulk header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Index => "index",
        }
    }
}

/// One bulk write: action header plus document body.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkInstruction {
    /// `{"create": {...}}` or `{"index": {...}}`.
    pub header: Value,
    /// Document body.
    pub source: Value,
}

/// Turns scroll hits into bulk instructions for the destination index.
pub struct Transformer {
    destination_index: String,
    action: BulkAction,
    dialect: Dialect,
    hook: Box<dyn DocumentHook>,
}

impl Transformer {
    /// Creates a transformer with the identity hook.
    pub fn new(destination_index: impl Into<String>, action: BulkAction, dialect: Dialect) -> Self {
        Self {
            destination_index: destination_index.into(),
            action,
            dialect,
            hook: Box::new(Identity),
        }
    }

    /// Replaces the document hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Box<dyn DocumentHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Applies the hook and builds the bulk instruction for one document.
    pub fn to_instruction(&self, doc: DocumentRecord) -> BulkInstruction {
        let doc = self.hook.apply(doc);

        let mut meta = Map::new();
        meta.insert("_index".to_string(), Value::String(self.destination_index.clone()));
        meta.insert("_id".to_string(), Value::String(doc.id));
        if let Some(doc_type) = doc.doc_type {
            meta.insert("_type".to_string(), Value::String(doc_type));
        }
        if let Some(routing) = doc.routing {
            meta.insert(self.dialect.routing_key().to_string(), routing);
        }
        if let Some(parent) = doc.parent {
            meta.insert("_parent".to_string(), parent);
        }
        if let Some(timestamp) = doc.timestamp {
            meta.insert("_timestamp".to_string(), timestamp);
        }
        if let Some(ttl) = doc.ttl {
            meta.insert("_ttl".to_string(), ttl);
        }

        let mut header = Map::new();
        header.insert(self.action.as_str().to_string(), Value::Object(meta));

        BulkInstruction {
            header: Value::Object(header),
            source: doc.source,
        }
    }
}
