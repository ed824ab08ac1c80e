use conduit_model::{kinds, Parameter, ParameterType, Step, StepType};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::DescriptorParser;
use crate::error::{CatalogError, CatalogResult};
use crate::source::RawDescriptor;

/// Label carrying the role of a Kamelet (`source`, `action` or `sink`)
pub const KAMELET_TYPE_LABEL: &str = "camel.apache.org/kamelet.type";

/// Parses Kamelet definitions (`*.kamelet.yaml`) into a single step.
///
/// A definition declaring `kind: Knative` has the same layout and becomes a
/// `KNATIVE` step, whose `kind`/`name` parameters mirror the binding reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct KameletDescriptorParser;

#[derive(Debug, Deserialize)]
struct KameletDocument {
    #[serde(default)]
    kind: Option<String>,
    metadata: KameletMetadata,
    #[serde(default)]
    spec: KameletSpec,
}

#[derive(Debug, Deserialize)]
struct KameletMetadata {
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct KameletSpec {
    #[serde(default)]
    definition: Definition,
}

#[derive(Debug, Default, Deserialize)]
struct Definition {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: Vec<String>,
    // serde_yaml's Mapping keeps insertion order
    #[serde(default)]
    properties: serde_yaml::Mapping,
}

#[derive(Debug, Default, Deserialize)]
struct PropertyDefinition {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    schema_type: Option<String>,
    #[serde(default)]
    default: Option<Value>,
}

fn step_type_for(label: &str) -> Option<StepType> {
    match label.trim().to_ascii_lowercase().as_str() {
        "source" => Some(StepType::Start),
        "action" => Some(StepType::Middle),
        "sink" => Some(StepType::End),
        _ => None,
    }
}

fn to_json(value: Value) -> Result<serde_json::Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

impl DescriptorParser for KameletDescriptorParser {
    fn identifier(&self) -> &'static str {
        "kamelet"
    }

    fn applies_to(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        lower.ends_with(".kamelet.yaml") || lower.ends_with(".kamelet.yml")
    }

    fn parse(&self, descriptor: &RawDescriptor) -> CatalogResult<Vec<Step>> {
        let document: KameletDocument = serde_yaml::from_str(&descriptor.content)
            .map_err(|e| CatalogError::descriptor(&descriptor.name, e))?;

        let step_kind = match document.kind.as_deref().map(str::trim) {
            None => kinds::KAMELET,
            Some(kind) if kind.eq_ignore_ascii_case("Kamelet") => kinds::KAMELET,
            Some(kind) if kind.eq_ignore_ascii_case("Knative") => kinds::KNATIVE,
            Some(kind) => {
                debug!(file = %descriptor.name, kind = %kind, "Not a Kamelet definition, skipping");
                return Ok(Vec::new());
            }
        };

        let name = document.metadata.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::descriptor(&descriptor.name, "metadata.name is empty"));
        }

        let label = document
            .metadata
            .labels
            .get(KAMELET_TYPE_LABEL)
            .ok_or_else(|| {
                CatalogError::descriptor(&descriptor.name, format!("missing label {}", KAMELET_TYPE_LABEL))
            })?;
        let step_type = step_type_for(label).ok_or_else(|| {
            CatalogError::descriptor(&descriptor.name, format!("unknown kamelet type '{}'", label))
        })?;

        let definition = document.spec.definition;
        let mut step = Step::new(name.clone(), name, step_kind, step_type);
        if let Some(title) = definition.title.filter(|t| !t.trim().is_empty()) {
            step.title = title;
        }
        if let Some(description) = definition.description.filter(|d| !d.trim().is_empty()) {
            step.description = description;
        }

        for (key, raw) in definition.properties {
            let Some(id) = key.as_str().map(str::to_string) else {
                return Err(CatalogError::descriptor(&descriptor.name, "property keys must be strings"));
            };
            let property: PropertyDefinition = serde_yaml::from_value(raw).map_err(|e| {
                CatalogError::descriptor(&descriptor.name, format!("property {}: {}", id, e))
            })?;

            let param_type =
                ParameterType::from_schema_type(property.schema_type.as_deref().unwrap_or("object"));
            let mut parameter = Parameter::new(id.as_str(), param_type);
            if let Some(title) = property.title.filter(|t| !t.trim().is_empty()) {
                parameter = parameter.with_title(title);
            }
            if let Some(description) = property.description.filter(|d| !d.trim().is_empty()) {
                parameter = parameter.with_description(description);
            }
            if let Some(default) = property.default {
                let default = to_json(default).map_err(|e| {
                    CatalogError::descriptor(&descriptor.name, format!("property {}: {}", id, e))
                })?;
                parameter = parameter.with_default(default);
            }
            step.parameters.push(parameter);
        }

        step.required = definition.required;
        step.validate()
            .map_err(|e| CatalogError::descriptor(&descriptor.name, e))?;

        Ok(vec![step])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TWITTER_SEARCH: &str = r#"
apiVersion: camel.apache.org/v1alpha1
kind: Kamelet
metadata:
  name: twitter-search-source
  labels:
    camel.apache.org/kamelet.type: "source"
spec:
  definition:
    title: "Twitter Search Source"
    description: |-
      Allows to get all tweets on particular keywords from Twitter.
    required:
      - keywords
      - apiKey
    properties:
      keywords:
        title: Keywords
        description: The keywords to use in the Twitter search
        type: string
      apiKey:
        title: API Key
        description: The API Key from the Twitter application in the developer portal
        type: string
        format: password
      delay:
        title: Delay
        type: integer
        default: 5000
      lang:
        type: string
"#;

    fn descriptor(content: &str) -> RawDescriptor {
        RawDescriptor {
            name: "test.kamelet.yaml".to_string(),
            path: "kamelets/test.kamelet.yaml".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_parse_source_kamelet() {
        let steps = KameletDescriptorParser.parse(&descriptor(TWITTER_SEARCH)).unwrap();
        assert_eq!(steps.len(), 1);

        let step = &steps[0];
        assert_eq!(step.id, "twitter-search-source");
        assert_eq!(step.name, "twitter-search-source");
        assert_eq!(step.kind, kinds::KAMELET);
        assert_eq!(step.step_type, StepType::Start);
        assert_eq!(step.title, "Twitter Search Source");
        assert_eq!(step.required, vec!["keywords", "apiKey"]);

        let ids: Vec<&str> = step.parameters.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["keywords", "apiKey", "delay", "lang"]);

        let delay = step.parameter("delay").unwrap();
        assert_eq!(delay.param_type(), ParameterType::Number);
        assert_eq!(delay.default_value(), Some(&json!(5000)));
        assert_eq!(step.parameter("apiKey").unwrap().title(), "API Key");
        assert_eq!(step.parameter("lang").unwrap().title(), "Lang");
    }

    #[test]
    fn test_type_label_mapping() {
        for (label, expected) in [("sink", StepType::End), ("action", StepType::Middle), ("Source", StepType::Start)] {
            let doc = format!(
                "kind: Kamelet\nmetadata:\n  name: k\n  labels:\n    camel.apache.org/kamelet.type: {}\n",
                label
            );
            let steps = KameletDescriptorParser.parse(&descriptor(&doc)).unwrap();
            assert_eq!(steps[0].step_type, expected);
            assert_eq!(steps[0].title, "K");
        }
    }

    #[test]
    fn test_unknown_type_label_is_an_error() {
        let doc = "kind: Kamelet\nmetadata:\n  name: k\n  labels:\n    camel.apache.org/kamelet.type: filter\n";
        let err = KameletDescriptorParser.parse(&descriptor(doc)).unwrap_err();
        assert!(err.to_string().contains("unknown kamelet type 'filter'"));

        let doc = "kind: Kamelet\nmetadata:\n  name: k\n";
        assert!(KameletDescriptorParser.parse(&descriptor(doc)).is_err());
    }

    #[test]
    fn test_required_must_name_a_property() {
        let doc = r#"
kind: Kamelet
metadata:
  name: k
  labels:
    camel.apache.org/kamelet.type: sink
spec:
  definition:
    required: [missing]
"#;
        let err = KameletDescriptorParser.parse(&descriptor(doc)).unwrap_err();
        assert_eq!(err.error_code(), "ERR_CATALOG_DESCRIPTOR");
    }

    #[test]
    fn test_knative_definition() {
        let doc = r#"
kind: Knative
metadata:
  name: knative
  labels:
    camel.apache.org/kamelet.type: sink
spec:
  definition:
    title: Knative Sink
    properties:
      kind:
        type: string
      name:
        type: string
"#;
        let steps = KameletDescriptorParser.parse(&descriptor(doc)).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, kinds::KNATIVE);
        assert_eq!(steps[0].name, "knative");
        assert_eq!(steps[0].step_type, StepType::End);
        assert!(steps[0].parameter("kind").is_some());
    }

    #[test]
    fn test_other_kinds_are_skipped() {
        let doc = "kind: KameletBinding\nmetadata:\n  name: b\n";
        assert!(KameletDescriptorParser.parse(&descriptor(doc)).unwrap().is_empty());
    }

    #[test]
    fn test_applies_to() {
        assert!(KameletDescriptorParser.applies_to("aws-s3-sink.kamelet.yaml"));
        assert!(KameletDescriptorParser.applies_to("log-action.KAMELET.yml"));
        assert!(!KameletDescriptorParser.applies_to("values.yaml"));
        assert!(!KameletDescriptorParser.applies_to("browse.json"));
    }
}
