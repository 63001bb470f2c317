//! Destination index preparation: settings and mappings copied from the source.
//!
//! Any failure here is fatal for the run, unlike the transfer itself.

use serde_json::{Map, Value};
use tracing::info;

use crate::client::{Executor, Transport};
use crate::config::Endpoint;
use crate::error::{Error, Result};

/// Server-assigned settings that must not be replayed onto a new index.
const SERVER_ASSIGNED: &[&str] = &["version", "uuid", "creation_date", "provided_name"];

/// Top-level mapping keys of a typeless (Elasticsearch 7+) mapping.
const TYPELESS_KEYS: &[&str] = &[
    "properties",
    "dynamic",
    "dynamic_templates",
    "date_detection",
    "numeric_detection",
    "runtime",
    "enabled",
    "_source",
    "_meta",
    "_routing",
];

/// Index-level settings read from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSettings {
    /// Concrete source index name (an alias resolves to it).
    pub index: String,
    /// `{"settings": {...}}` body, ready to create an index with.
    pub body: Value,
}

impl CollectionSettings {
    /// Builds settings from a `GET {index}/_settings` response.
    ///
    /// # Errors
    ///
    /// [`Error::Setup`] when the response holds no index.
    pub fn from_response(response: Value) -> Result<Self> {
        let Value::Object(indices) = response else {
            return Err(Error::Setup("settings response is not an object".to_string()));
        };
        let (index, body) = indices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Setup("settings response names no index".to_string()))?;

        let mut settings = Self { index, body };
        settings.strip_server_metadata();
        Ok(settings)
    }

    /// Removes creation metadata, both flat (`index.uuid`) and nested
    /// (`index: {uuid}`) forms.
    pub fn strip_server_metadata(&mut self) {
        let Some(settings) = self.body.get_mut("settings").and_then(Value::as_object_mut) else {
            return;
        };

        settings.retain(|key, _| {
            !SERVER_ASSIGNED
                .iter()
                .any(|name| key.strip_prefix("index.").is_some_and(|rest| rest.starts_with(name)))
        });

        if let Some(index) = settings.get_mut("index").and_then(Value::as_object_mut) {
            for name in SERVER_ASSIGNED {
                index.remove(*name);
            }
        }
    }

    /// Reads the source settings.
    ///
    /// # Errors
    ///
    /// [`Error::Setup`] when the source index does not exist.
    pub async fn fetch<T: Transport>(executor: &Executor<T>, source: &Endpoint) -> Result<Self> {
        let response = executor
            .get(source.path(&["_settings"]))
            .await?
            .ok_or_else(|| {
                Error::Setup(format!("Failed to obtain source index '{source}' settings!"))
            })?;
        Self::from_response(response)
    }

    /// Creates the destination index with these settings.
    ///
    /// # Errors
    ///
    /// [`Error::Setup`] when the destination refuses the index.
    pub async fn create_destination<T: Transport>(
        &self,
        executor: &Executor<T>,
        destination: &Endpoint,
    ) -> Result<()> {
        info!(
            "Creating '{}' index with settings from '{}'",
            destination, self.index
        );
        executor
            .put_json(destination.path(&[]), self.body.clone())
            .await?
            .ok_or_else(|| Error::Setup(format!("Creating '{destination}' FAILED!")))?;
        Ok(())
    }
}

/// Mapping of one document type, or the single typeless mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    /// Type name; `None` for typeless indices.
    pub type_name: Option<String>,
    /// Mapping body for that type.
    pub body: Value,
}

impl FieldMapping {
    /// Splits a `GET {index}/_mapping` response into per-type mappings.
    ///
    /// # Errors
    ///
    /// [`Error::Setup`] when the response has no mapping section for `index`.
    pub fn from_response(response: &Value, index: &str) -> Result<Vec<Self>> {
        let mappings = response
            .get(index)
            .or_else(|| response.as_object().and_then(|m| m.values().next()))
            .and_then(|entry| entry.get("mappings"))
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Setup(format!("no mappings found for '{index}'")))?;

        if mappings.is_empty() {
            return Ok(Vec::new());
        }

        if mappings.keys().any(|key| TYPELESS_KEYS.contains(&key.as_str())) {
            return Ok(vec![Self {
                type_name: None,
                body: Value::Object(mappings.clone()),
            }]);
        }

        Ok(mappings
            .iter()
            .map(|(type_name, body)| Self {
                type_name: Some(type_name.clone()),
                body: body.clone(),
            })
            .collect())
    }

    /// Reads every mapping of the source index.
    ///
    /// # Errors
    ///
    /// [`Error::Setup`] when the mappings cannot be read.
    pub async fn fetch_all<T: Transport>(
        executor: &Executor<T>,
        source: &Endpoint,
        index: &str,
    ) -> Result<Vec<Self>> {
        let response = executor
            .get(source.path(&["_mapping"]))
            .await?
            .ok_or_else(|| {
                Error::Setup(format!("Failed to obtain source index '{source}' mappings!"))
            })?;
        Self::from_response(&response, index)
    }

    /// Puts this mapping on the destination index.
    ///
    /// # Errors
    ///
    /// [`Error::Setup`] when the destination refuses the mapping.
    pub async fn apply<T: Transport>(
        &self,
        executor: &Executor<T>,
        destination: &Endpoint,
    ) -> Result<()> {
        let (url, body) = match &self.type_name {
            Some(type_name) => {
                let mut wrapped = Map::new();
                wrapped.insert(type_name.clone(), self.body.clone());
                (
                    destination.path(&[type_name.as_str(), "_mapping"]),
                    Value::Object(wrapped),
                )
            }
            None => (destination.path(&["_mapping"]), self.body.clone()),
        };

        info!(
            "Copying mapping '{}/{}'",
            destination,
            self.type_name.as_deref().unwrap_or("_doc")
        );
        executor
            .put_json(url, body)
            .await?
            .ok_or_else(|| Error::Setup(format!("Copying mapping to '{destination}' FAILED!")))?;
        Ok(())
    }
}

/// Whether the index exists, probed through its `_recovery` endpoint.
///
/// # Errors
///
/// Only when the retry policy gives up.
pub async fn index_exists<T: Transport>(executor: &Executor<T>, endpoint: &Endpoint) -> Result<bool> {
    Ok(executor.get(endpoint.path(&["_recovery"])).await?.is_some())
}

/// Deletes the index. Returns `false` when it did not exist.
///
/// # Errors
///
/// Only when the retry policy gives up.
pub async fn delete_index<T: Transport>(executor: &Executor<T>, endpoint: &Endpoint) -> Result<bool> {
    info!("Removing '{}'", endpoint);
    Ok(executor.delete(endpoint.path(&[])).await?.is_some())
}

/// Creates the destination index with the source settings and mappings.
///
/// Returns the concrete source index name.
///
/// # Errors
///
/// [`Error::Setup`] on any refused step.
pub async fn copy_schema<T: Transport>(
    executor: &Executor<T>,
    source: &Endpoint,
    destination: &Endpoint,
) -> Result<String> {
    let settings = CollectionSettings::fetch(executor, source).await?;
    settings.create_destination(executor, destination).await?;

    let mappings = FieldMapping::fetch_all(executor, source, &settings.index).await?;
    for mapping in &mappings {
        mapping.apply(executor, destination).await?;
    }

    Ok(settings.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_strip_flat_metadata() {
        let response = json!({
            "tweets_v1": {"settings": {
                "index.number_of_shards": "5",
                "index.version.created": "1070599",
                "index.uuid": "abc"
            }}
        });

        let settings = CollectionSettings::from_response(response).unwrap();

        assert_eq!(settings.index, "tweets_v1");
        assert_eq!(
            settings.body,
            json!({"settings": {"index.number_of_shards": "5"}})
        );
    }

    #[test]
    fn test_settings_strip_nested_metadata() {
        let response = json!({
            "products": {"settings": {"index": {
                "number_of_shards": "3",
                "number_of_replicas": "1",
                "uuid": "Yq3",
                "creation_date": "1700000000000",
                "provided_name": "products",
                "version": {"created": "7170999"},
                "analysis": {"analyzer": {"folded": {"type": "custom", "tokenizer": "standard"}}}
            }}}
        });

        let settings = CollectionSettings::from_response(response).unwrap();
        let index = &settings.body["settings"]["index"];

        assert_eq!(index["number_of_shards"], "3");
        assert!(index.get("uuid").is_none());
        assert!(index.get("version").is_none());
        assert!(index.get("creation_date").is_none());
        assert!(index.get("provided_name").is_none());
        assert!(index.get("analysis").is_some());
    }

    #[test]
    fn test_settings_empty_response_is_setup_error() {
        assert!(matches!(
            CollectionSettings::from_response(json!({})),
            Err(Error::Setup(_))
        ));
    }

    #[test]
    fn test_typed_mappings_split_per_type() {
        let response = json!({
            "tweets": {"mappings": {
                "tweet": {"properties": {"text": {"type": "string"}}},
                "user": {"properties": {"name": {"type": "string"}}}
            }}
        });

        let mappings = FieldMapping::from_response(&response, "tweets").unwrap();

        let names: Vec<_> = mappings.iter().filter_map(|m| m.type_name.as_deref()).collect();
        assert_eq!(names, vec!["tweet", "user"]);
    }

    #[test]
    fn test_typeless_mapping_is_single() {
        let response = json!({
            "products": {"mappings": {"dynamic": "strict", "properties": {"x": {"type": "long"}}}}
        });

        let mappings = FieldMapping::from_response(&response, "products").unwrap();

        assert_eq!(mappings.len(), 1);
        assert!(mappings[0].type_name.is_none());
        assert_eq!(mappings[0].body["dynamic"], "strict");
    }

    #[test]
    fn test_empty_mappings() {
        let response = json!({"products": {"mappings": {}}});
        assert!(FieldMapping::from_response(&response, "products")
            .unwrap()
            .is_empty());
    }
}
