//! Deployment generators render a resolved step list back into a target
//! document.

use conduit_model::{kinds, Parameter, Step, StepType};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::document::{
    BindingDocument, BindingSpec, BindingStep, ObjectMeta, ObjectReference, KAMELET_API_VERSION,
    KAMELET_BINDING_KIND,
};
use crate::engine::BINDING_KINDS;
use crate::error::{BindingError, BindingResult};

/// apiVersion used for knative references that do not carry their own
pub const DEFAULT_KNATIVE_API_VERSION: &str = "messaging.knative.dev/v1";

/// Renders resolved steps into a deployable document
pub trait DeploymentGenerator: Send + Sync {
    fn identifier(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Upper-case step kinds this generator can render
    fn kinds(&self) -> &[&'static str];

    /// Whether every step is of a supported kind
    fn applies_to(&self, steps: &[Step]) -> bool {
        steps.iter().all(|s| {
            let kind = kinds::normalize(&s.kind);
            self.kinds().iter().any(|k| *k == kind)
        })
    }

    fn generate(
        &self,
        name: &str,
        steps: &[Step],
        metadata: &Map<String, Value>,
        parameters: &[Parameter],
    ) -> BindingResult<String>;
}

/// Renders a `KameletBinding` YAML document
#[derive(Debug, Default, Clone, Copy)]
pub struct KameletBindingGenerator;

impl KameletBindingGenerator {
    /// Build the document without rendering it
    pub fn build(
        &self,
        name: &str,
        steps: &[Step],
        metadata: &Map<String, Value>,
    ) -> BindingResult<BindingDocument> {
        if !self.applies_to(steps) {
            return Err(BindingError::Generation(
                "steps contain kinds a KameletBinding can't express".to_string(),
            ));
        }

        let source = steps
            .iter()
            .find(|s| s.step_type == StepType::Start)
            .ok_or_else(|| BindingError::Generation("no START step to use as source".to_string()))?;
        let sink = steps
            .iter()
            .rev()
            .find(|s| s.step_type == StepType::End)
            .ok_or_else(|| BindingError::Generation("no END step to use as sink".to_string()))?;
        let middle = steps
            .iter()
            .filter(|s| s.step_type == StepType::Middle)
            .map(binding_step)
            .collect::<BindingResult<Vec<_>>>()?;

        Ok(BindingDocument {
            api_version: KAMELET_API_VERSION.to_string(),
            kind: KAMELET_BINDING_KIND.to_string(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: string_entries(metadata.get("annotations")),
                labels: string_entries(metadata.get("labels")),
                ..ObjectMeta::default()
            },
            spec: BindingSpec {
                source: Some(binding_step(source)?),
                steps: if middle.is_empty() { None } else { Some(middle) },
                sink: Some(binding_step(sink)?),
            },
        })
    }
}

impl DeploymentGenerator for KameletBindingGenerator {
    fn identifier(&self) -> &'static str {
        "KameletBinding"
    }

    fn description(&self) -> &'static str {
        "Renders steps as a KameletBinding custom resource."
    }

    fn kinds(&self) -> &[&'static str] {
        &BINDING_KINDS
    }

    fn generate(
        &self,
        name: &str,
        steps: &[Step],
        metadata: &Map<String, Value>,
        _parameters: &[Parameter],
    ) -> BindingResult<String> {
        let document = self.build(name, steps, metadata)?;
        debug!(name, steps = steps.len(), "Rendering KameletBinding");
        serde_yaml::to_string(&document).map_err(|e| BindingError::Generation(e.to_string()))
    }
}

fn binding_step(step: &Step) -> BindingResult<BindingStep> {
    if step.is_kind(kinds::KAMELET) {
        let mut binding = BindingStep::from_ref(ObjectReference::kamelet(&step.name));
        binding.properties = step.bound_values().into_iter().collect();
        Ok(binding)
    } else if step.is_kind(kinds::KNATIVE) {
        let reference = ObjectReference::new(
            text_value(step, "name").unwrap_or_default(),
            text_value(step, "kind").unwrap_or_default(),
            text_value(step, "apiVersion")
                .unwrap_or_else(|| DEFAULT_KNATIVE_API_VERSION.to_string()),
        );
        let mut binding = BindingStep::from_ref(reference);
        binding.properties = step
            .bound_values()
            .into_iter()
            .filter(|(id, _)| !["name", "kind", "apiVersion"].iter().any(|k| k.eq_ignore_ascii_case(id)))
            .collect();
        Ok(binding)
    } else if step.is_kind(kinds::CAMEL_CONNECTOR) {
        Ok(BindingStep::from_uri(connector_uri(step)))
    } else {
        Err(BindingError::Generation(format!(
            "step '{}' of kind {} has no KameletBinding form",
            step.id, step.kind
        )))
    }
}

/// `name:` followed by the bound path parameters in path order, then the
/// bound non-path parameters as a query string
pub fn connector_uri(step: &Step) -> String {
    let mut path_parameters: Vec<&Parameter> = step.path_parameters().collect();
    path_parameters.sort_by_key(|p| p.path_order());

    let mut uri = format!("{}:", step.name);
    for (i, parameter) in path_parameters.iter().enumerate() {
        // positions after an unbound segment can't be expressed
        let Some(value) = parameter.value() else {
            break;
        };
        if i > 0 {
            uri.push_str(parameter.path_separator());
        }
        uri.push_str(&plain(value));
    }

    let query: Vec<String> = step
        .parameters
        .iter()
        .filter(|p| !p.is_path())
        .filter_map(|p| p.value().map(|v| format!("{}={}", p.id(), plain(v))))
        .collect();
    if !query.is_empty() {
        uri.push('?');
        uri.push_str(&query.join("&"));
    }
    uri
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_value(step: &Step, id: &str) -> Option<String> {
    step.parameter(id)
        .and_then(|p| p.effective_value())
        .map(plain)
        .filter(|s| !s.is_empty())
}

fn string_entries(value: Option<&Value>) -> BTreeMap<String, String> {
    match value {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), plain(v))).collect(),
        _ => BTreeMap::new(),
    }
}
