//! The KameletBinding document model.
//!
//! Unknown fields are ignored on decode. Unknown `metadata` keys are kept in
//! [`ObjectMeta::additional`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const KAMELET_BINDING_KIND: &str = "KameletBinding";
pub const KAMELET_API_VERSION: &str = "camel.apache.org/v1alpha1";

/// A `KameletBinding` resource linking a source to a sink through optional
/// intermediate steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDocument {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BindingSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    /// Any other metadata key (namespace, managedFields, ...)
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BindingStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<BindingStep>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<BindingStep>,
}

/// One endpoint of a binding: either a URI or a structured reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl BindingStep {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    pub fn from_ref(reference: ObjectReference) -> Self {
        Self {
            reference: Some(reference),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub api_version: String,
}

impl ObjectReference {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            api_version: api_version.into(),
        }
    }

    /// Reference to a Kamelet by name
    pub fn kamelet(name: impl Into<String>) -> Self {
        Self::new(name, "Kamelet", KAMELET_API_VERSION)
    }
}

impl BindingDocument {
    /// Metadata as a loose key/value map: `name`, `annotations`, `labels`,
    /// `finalizers` and `additionalProperties`
    pub fn metadata_map(&self) -> Map<String, Value> {
        let meta = &self.metadata;
        let mut map = Map::new();
        map.insert(
            "name".to_string(),
            meta.name.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map.insert("annotations".to_string(), string_map(&meta.annotations));
        map.insert("labels".to_string(), string_map(&meta.labels));
        map.insert(
            "finalizers".to_string(),
            Value::Array(meta.finalizers.iter().cloned().map(Value::String).collect()),
        );
        map.insert(
            "additionalProperties".to_string(),
            Value::Object(meta.additional.clone().into_iter().collect()),
        );
        map
    }
}

fn string_map(entries: &BTreeMap<String, String>) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}
