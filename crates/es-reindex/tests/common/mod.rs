//! In-memory Elasticsearch stand-in for pipeline tests.
//!
//! Keys indices by name and ignores the host part of URLs, so one
//! `FakeCluster` can play both the source and the destination cluster.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use es_reindex::{Attempt, Body, Error, Method, Request, Transport};

#[derive(Debug, Clone)]
pub struct FakeIndex {
    pub shards: u64,
    pub settings: Value,
    pub mappings: Value,
    pub docs: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct Scroll {
    hits: Vec<Value>,
    position: usize,
    page: usize,
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, FakeIndex>,
    scrolls: HashMap<String, Scroll>,
    next_cursor: u64,
}

#[derive(Debug)]
struct Failure {
    pattern: String,
    remaining: u32,
}

pub struct FakeCluster {
    version: String,
    state: Mutex<State>,
    failures: Mutex<Vec<Failure>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeCluster {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            state: Mutex::new(State::default()),
            failures: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Seeds an index with `(id, type, source)` documents.
    pub fn with_index(
        self,
        name: &str,
        shards: u64,
        mappings: Value,
        docs: Vec<(String, Option<&str>, Value)>,
    ) -> Self {
        let docs = docs
            .into_iter()
            .map(|(id, doc_type, source)| {
                let hit = hit(name, &id, doc_type, source);
                (id, hit)
            })
            .collect();
        let index = FakeIndex {
            shards,
            settings: json!({
                "index.number_of_shards": shards.to_string(),
                "index.number_of_replicas": "1",
                "index.version.created": "2040099",
                "index.uuid": format!("uuid-{name}"),
                "index.creation_date": "1700000000000"
            }),
            mappings,
            docs,
        };
        self.state
            .lock()
            .unwrap()
            .indices
            .insert(name.to_string(), index);
        self
    }

    /// The next `times` requests whose URL contains `pattern` fail with 503.
    pub fn fail_next(&self, pattern: &str, times: u32) {
        self.failures.lock().unwrap().push(Failure {
            pattern: pattern.to_string(),
            remaining: times,
        });
    }

    pub fn index(&self, name: &str) -> Option<FakeIndex> {
        self.state.lock().unwrap().indices.get(name).cloned()
    }

    pub fn doc_count(&self, name: &str) -> usize {
        self.index(name).map_or(0, |index| index.docs.len())
    }

    pub fn source_of(&self, name: &str, id: &str) -> Option<Value> {
        self.index(name)
            .and_then(|index| index.docs.get(id).map(|hit| hit["_source"].clone()))
    }

    pub fn put_source(&self, name: &str, id: &str, source: Value) {
        let mut state = self.state.lock().unwrap();
        if let Some(hit) = state
            .indices
            .get_mut(name)
            .and_then(|index| index.docs.get_mut(id))
        {
            hit["_source"] = source;
        }
    }

    pub fn open_scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(pattern))
            .count()
    }

    fn injected_failure(&self, url: &str) -> Option<Attempt<Value>> {
        let mut failures = self.failures.lock().unwrap();
        let failure = failures
            .iter_mut()
            .find(|f| f.remaining > 0 && url.contains(&f.pattern))?;
        failure.remaining -= 1;
        Some(Attempt::Retry(Error::Status {
            status: 503,
            body: "{\"error\":\"unavailable\"}".to_string(),
        }))
    }

    fn modern(&self) -> bool {
        self.version
            .split('.')
            .next()
            .and_then(|major| major.parse::<u64>().ok())
            .is_some_and(|major| major >= 5)
    }

    fn route(&self, request: &Request) -> Attempt<Value> {
        let (segments, query) = split_url(&request.url);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let mut state = self.state.lock().unwrap();

        match (request.method, segments.as_slice()) {
            (Method::Get, []) => Attempt::Success(json!({
                "name": "fake",
                "version": {"number": self.version}
            })),
            (Method::Post, ["_search", "scroll"]) => {
                let cursor = match &request.body {
                    Some(Body::Text(cursor)) => cursor.clone(),
                    Some(Body::Json(body)) => body["scroll_id"].as_str().unwrap_or_default().to_string(),
                    _ => String::new(),
                };
                self.continue_scroll(&mut state, &cursor)
            }
            (Method::Delete, ["_search", "scroll"]) => {
                let cursor = match &request.body {
                    Some(Body::Text(cursor)) => cursor.clone(),
                    Some(Body::Json(body)) => body["scroll_id"][0].as_str().unwrap_or_default().to_string(),
                    _ => String::new(),
                };
                match state.scrolls.remove(&cursor) {
                    Some(_) => Attempt::Success(json!({"succeeded": true, "num_freed": 1})),
                    None => Attempt::Absent,
                }
            }
            (Method::Post, ["_bulk"]) => match &request.body {
                Some(Body::NdJson(body)) => Attempt::Success(bulk(&mut state, body)),
                _ => bad_request("bulk body must be ndjson"),
            },
            (Method::Get, [index, "_recovery"]) => match state.indices.get(*index) {
                Some(_) => Attempt::Success(json!({ *index: {"shards": []} })),
                None => Attempt::Absent,
            },
            (Method::Get, [index, "_settings"]) => match state.indices.get(*index) {
                Some(found) => Attempt::Success(json!({ *index: {"settings": found.settings} })),
                None => Attempt::Absent,
            },
            (Method::Get, [index, "_mapping"]) => match state.indices.get(*index) {
                Some(found) => Attempt::Success(json!({ *index: {"mappings": found.mappings} })),
                None => Attempt::Absent,
            },
            (Method::Put, [index]) => {
                if state.indices.contains_key(*index) {
                    return bad_request("index_already_exists_exception");
                }
                let settings = match &request.body {
                    Some(Body::Json(body)) => body.get("settings").cloned().unwrap_or(json!({})),
                    _ => json!({}),
                };
                let shards = settings
                    .get("index.number_of_shards")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1);
                state.indices.insert(
                    index.to_string(),
                    FakeIndex {
                        shards,
                        settings,
                        mappings: json!({}),
                        docs: BTreeMap::new(),
                    },
                );
                Attempt::Success(json!({"acknowledged": true}))
            }
            (Method::Delete, [index]) => match state.indices.remove(*index) {
                Some(_) => Attempt::Success(json!({"acknowledged": true})),
                None => Attempt::Absent,
            },
            (Method::Put, [index, "_mapping"]) => {
                let Some(found) = state.indices.get_mut(*index) else {
                    return Attempt::Absent;
                };
                if let Some(Body::Json(body)) = &request.body {
                    found.mappings = body.clone();
                }
                Attempt::Success(json!({"acknowledged": true}))
            }
            (Method::Put, [index, doc_type, "_mapping"]) => {
                let Some(found) = state.indices.get_mut(*index) else {
                    return Attempt::Absent;
                };
                if let Some(Body::Json(body)) = &request.body {
                    found.mappings[*doc_type] = body[*doc_type].clone();
                }
                Attempt::Success(json!({"acknowledged": true}))
            }
            (Method::Get, [index, "_count"]) => match state.indices.get(*index) {
                Some(found) => Attempt::Success(json!({
                    "count": found.docs.len(),
                    "_shards": {"total": found.shards, "successful": found.shards, "failed": 0}
                })),
                None => Attempt::Absent,
            },
            (_, [index, "_search"]) => {
                let size = match &request.body {
                    Some(Body::Json(body)) => body["size"].as_u64(),
                    _ => query.get("size").and_then(|s| s.parse().ok()),
                }
                .unwrap_or(10) as usize;
                let scan = query.get("search_type").is_some_and(|t| t == "scan");
                self.open_scroll(&mut state, index, size, scan)
            }
            _ => Attempt::Absent,
        }
    }

    fn open_scroll(&self, state: &mut State, index: &str, size: usize, scan: bool) -> Attempt<Value> {
        let Some(found) = state.indices.get(index) else {
            return Attempt::Absent;
        };
        let total = found.docs.len();
        // scan pages hold `size` documents per shard
        let page = if scan {
            size * found.shards.max(1) as usize
        } else {
            size
        };
        let mut scroll = Scroll {
            hits: found.docs.values().cloned().collect(),
            position: 0,
            page,
        };

        let hits = if scan { Vec::new() } else { take_page(&mut scroll) };
        let cursor = new_cursor(state);
        state.scrolls.insert(cursor.clone(), scroll);

        Attempt::Success(json!({
            "_scroll_id": cursor,
            "hits": {"total": self.total_hits(total), "hits": hits}
        }))
    }

    fn continue_scroll(&self, state: &mut State, cursor: &str) -> Attempt<Value> {
        let Some(mut scroll) = state.scrolls.remove(cursor) else {
            return Attempt::Absent;
        };
        let total = scroll.hits.len();
        let hits = take_page(&mut scroll);
        let next = new_cursor(state);
        state.scrolls.insert(next.clone(), scroll);

        Attempt::Success(json!({
            "_scroll_id": next,
            "hits": {"total": self.total_hits(total), "hits": hits}
        }))
    }

    fn total_hits(&self, total: usize) -> Value {
        if self.modern() {
            json!({"value": total, "relation": "eq"})
        } else {
            json!(total)
        }
    }
}

#[async_trait]
impl Transport for FakeCluster {
    async fn execute(&self, request: &Request) -> Attempt<Value> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(failure) = self.injected_failure(&request.url) {
            return failure;
        }
        self.route(request)
    }
}

fn hit(index: &str, id: &str, doc_type: Option<&str>, source: Value) -> Value {
    let mut hit = Map::new();
    hit.insert("_index".to_string(), json!(index));
    if let Some(doc_type) = doc_type {
        hit.insert("_type".to_string(), json!(doc_type));
    }
    hit.insert("_id".to_string(), json!(id));
    hit.insert("_source".to_string(), source);
    Value::Object(hit)
}

fn take_page(scroll: &mut Scroll) -> Vec<Value> {
    let end = (scroll.position + scroll.page).min(scroll.hits.len());
    let page = scroll.hits[scroll.position..end].to_vec();
    scroll.position = end;
    page
}

fn new_cursor(state: &mut State) -> String {
    state.next_cursor += 1;
    format!("cursor-{}", state.next_cursor)
}

fn bad_request(reason: &str) -> Attempt<Value> {
    Attempt::Retry(Error::Status {
        status: 400,
        body: json!({"error": {"type": reason}}).to_string(),
    })
}

fn bulk(state: &mut State, body: &str) -> Value {
    let lines: Vec<Value> = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    let mut items = Vec::new();
    let mut errors = false;

    for pair in lines.chunks(2) {
        let [header, source] = pair else { break };
        let Some((action, meta)) = header.as_object().and_then(|h| h.iter().next()) else {
            continue;
        };
        let index = meta["_index"].as_str().unwrap_or_default().to_string();
        let id = meta["_id"].as_str().unwrap_or_default().to_string();
        let doc_type = meta.get("_type").and_then(Value::as_str);

        let Some(target) = state.indices.get_mut(&index) else {
            errors = true;
            items.push(json!({ action: {"_index": index, "_id": id, "status": 404,
                "error": {"type": "index_not_found_exception"}} }));
            continue;
        };

        if action == "create" && target.docs.contains_key(&id) {
            errors = true;
            items.push(json!({ action: {"_index": index, "_id": id, "status": 409,
                "error": {"type": "version_conflict_engine_exception"}} }));
            continue;
        }

        let status = if target.docs.contains_key(&id) { 200 } else { 201 };
        target
            .docs
            .insert(id.clone(), hit(&index, &id, doc_type, source.clone()));
        items.push(json!({ action: {"_index": index, "_id": id, "status": status} }));
    }

    json!({"took": 1, "errors": errors, "items": items})
}

/// Path segments and query parameters of a URL.
fn split_url(url: &str) -> (Vec<String>, HashMap<String, String>) {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path_and_query = without_scheme.split_once('/').map_or("", |(_, rest)| rest);
    let (path, query) = path_and_query
        .split_once('?')
        .unwrap_or((path_and_query, ""));

    let segments = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    let query = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    (segments, query)
}

/// Typed `product` documents named after their ids.
pub fn docs(ids: &[&str]) -> Vec<(String, Option<&'static str>, Value)> {
    ids.iter()
        .map(|id| (id.to_string(), Some("product"), json!({"name": format!("item {id}")})))
        .collect()
}

/// Typeless documents `doc-0..n`.
pub fn numbered(n: usize) -> Vec<(String, Option<&'static str>, Value)> {
    (0..n)
        .map(|i| (format!("doc-{i:03}"), None, json!({"n": i})))
        .collect()
}

pub fn typed_mappings() -> Value {
    json!({"product": {"properties": {"name": {"type": "string"}}}})
}

pub fn typeless_mappings() -> Value {
    json!({"properties": {"n": {"type": "long"}}})
}
