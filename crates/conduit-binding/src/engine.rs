//! Binding resolution.
//!
//! Each reference of a binding document is matched against a catalog
//! snapshot and the matching step template is copied and bound with the
//! values the document supplies. A reference that cannot be resolved is
//! logged and left out of the result.

use conduit_catalog::CatalogSnapshot;
use conduit_model::{kinds, Step, StepType, DEFAULT_PATH_SEPARATOR};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Reverse;
use tracing::{debug, trace, warn};

use crate::document::{BindingDocument, BindingStep, ObjectReference};
use crate::error::BindingResult;

lazy_static! {
    // key=value pairs of a URI query string
    static ref QUERY_PARAMETER: Regex = Regex::new(r"(?i)(?:\?|&)([^=]+)=([^&\n]+)").unwrap();
}

/// Kinds a binding may reference, lowest priority first
pub const BINDING_KINDS: [&str; 3] = [kinds::KAMELET, kinds::KNATIVE, kinds::CAMEL_CONNECTOR];

/// Marker in a reference `apiVersion` that selects the knative step
const KNATIVE_API_MARKER: &str = "knative";
/// Catalog name of the knative step
const KNATIVE_STEP_NAME: &str = "knative";

/// Resolves binding documents against a catalog snapshot
#[derive(Debug, Clone)]
pub struct BindingEngine {
    kinds: Vec<String>,
}

impl Default for BindingEngine {
    fn default() -> Self {
        Self::with_kinds(BINDING_KINDS)
    }
}

impl BindingEngine {
    /// Engine accepting `kinds`, in ascending priority order
    pub fn with_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kinds: kinds.into_iter().map(|k| kinds::normalize(k.as_ref())).collect(),
        }
    }

    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    /// Position of `kind` in the priority list, -1 when not listed
    fn priority(&self, kind: &str) -> i64 {
        let kind = kinds::normalize(kind);
        self.kinds
            .iter()
            .position(|k| *k == kind)
            .map_or(-1, |i| i as i64)
    }

    /// Resolve every reference of `document`: source, middle steps in order,
    /// then sink. Unresolved references are dropped.
    pub fn resolve(&self, document: &BindingDocument, snapshot: &CatalogSnapshot) -> Vec<Step> {
        let spec = &document.spec;
        let mut references: Vec<(&BindingStep, StepType)> = Vec::new();
        if let Some(source) = &spec.source {
            references.push((source, StepType::Start));
        }
        for middle in spec.steps.iter().flatten() {
            references.push((middle, StepType::Middle));
        }
        if let Some(sink) = &spec.sink {
            references.push((sink, StepType::End));
        }

        let declared = references.len();
        let steps: Vec<Step> = references
            .into_iter()
            .filter_map(|(reference, step_type)| self.resolve_step(reference, step_type, snapshot))
            .collect();

        debug!(declared, resolved = steps.len(), "Binding resolved");
        steps
    }

    /// Resolve one reference into a bound copy of its catalog step
    pub fn resolve_step(
        &self,
        reference: &BindingStep,
        step_type: StepType,
        snapshot: &CatalogSnapshot,
    ) -> Option<Step> {
        match self.try_resolve_step(reference, step_type, snapshot) {
            Ok(Some(step)) => Some(step),
            Ok(None) => {
                warn!(
                    reference = %describe(reference),
                    step_type = %step_type,
                    "No catalog step matches reference"
                );
                None
            }
            Err(e) => {
                warn!(
                    reference = %describe(reference),
                    error = %e,
                    code = e.error_code(),
                    "Can't resolve step"
                );
                None
            }
        }
    }

    fn try_resolve_step(
        &self,
        reference: &BindingStep,
        step_type: StepType,
        snapshot: &CatalogSnapshot,
    ) -> BindingResult<Option<Step>> {
        let mut step = if let Some(uri) = &reference.uri {
            trace!(uri = %uri, "Found uri reference");
            let Some(template) = self.match_uri(uri, step_type, snapshot) else {
                return Ok(None);
            };
            let mut step = template.clone();
            bind_uri(&mut step, uri)?;
            step
        } else if let Some(object_ref) = &reference.reference {
            trace!(name = %object_ref.name, kind = %object_ref.kind, "Found ref reference");
            match self.match_ref(object_ref, step_type, snapshot) {
                Some(template) => template.clone(),
                None => return Ok(None),
            }
        } else {
            return Ok(None);
        };

        trace!(name = %step.name, kind = %step.kind, "Found step");
        bind_values(&mut step, &reference.properties)?;
        bind_values(&mut step, &reference.parameters)?;

        // knative identity mirrors the reference, whatever the properties say
        if let Some(object_ref) = &reference.reference {
            if step.is_kind(kinds::KNATIVE) {
                mirror_reference(&mut step, object_ref);
            }
        }

        Ok(Some(step))
    }

    /// Candidates named after the URI scheme, highest kind priority first.
    /// Among equal priorities a step of the requested type is preferred.
    /// A URI without a `:` has no scheme and matches nothing.
    fn match_uri<'a>(
        &self,
        uri: &str,
        step_type: StepType,
        snapshot: &'a CatalogSnapshot,
    ) -> Option<&'a Step> {
        let Some((scheme, _)) = uri.split_once(':') else {
            warn!(uri = %uri, "URI has no scheme");
            return None;
        };
        let mut candidates: Vec<&Step> = snapshot
            .search_by_name(scheme)
            .into_iter()
            .filter(|s| self.priority(&s.kind) >= 0)
            .collect();
        candidates.sort_by_key(|s| (Reverse(self.priority(&s.kind)), s.step_type != step_type));
        candidates.into_iter().next()
    }

    /// Candidates for a structured reference, lowest kind priority first
    fn match_ref<'a>(
        &self,
        object_ref: &ObjectReference,
        step_type: StepType,
        snapshot: &'a CatalogSnapshot,
    ) -> Option<&'a Step> {
        let (name, kind) = if object_ref.api_version.contains(KNATIVE_API_MARKER) {
            (KNATIVE_STEP_NAME, "")
        } else {
            (object_ref.name.as_str(), object_ref.kind.as_str())
        };

        let mut candidates: Vec<&Step> = snapshot
            .search_by_name(name)
            .into_iter()
            .filter(|s| kind.trim().is_empty() || s.is_kind(kind))
            .filter(|s| s.step_type == step_type)
            .collect();
        candidates.sort_by_key(|s| self.priority(&s.kind));
        candidates.into_iter().next()
    }
}

/// Bind the positional path segments and the query string of `uri`
pub fn bind_uri(step: &mut Step, uri: &str) -> BindingResult<()> {
    let rest = uri.split_once(':').map_or("", |(_, rest)| rest);
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);

    let splitter = separator_pattern(step)?;
    let mut segments: Vec<&str> = if path.is_empty() {
        Vec::new()
    } else {
        splitter.split(path).collect()
    };
    while segments.last().map_or(false, |s| s.is_empty()) {
        segments.pop();
    }

    step.sort_parameters();
    let mut segments = segments.into_iter();
    for parameter in step.parameters.iter_mut().filter(|p| p.is_path()) {
        let Some(segment) = segments.next() else {
            break;
        };
        parameter.bind(&Value::String(segment.to_string()))?;
    }

    for captures in QUERY_PARAMETER.captures_iter(uri) {
        let (key, value) = (&captures[1], &captures[2]);
        match step.parameter_mut(key) {
            Some(parameter) => parameter.bind(&Value::String(value.to_string()))?,
            None => warn!(step = %step.id, key = %key, "Unknown query parameter"),
        }
    }

    Ok(())
}

/// Alternation of the distinct path separators, longest first
fn separator_pattern(step: &Step) -> BindingResult<Regex> {
    let mut separators: Vec<&str> = Vec::new();
    for parameter in step.path_parameters() {
        if !separators.contains(&parameter.path_separator()) {
            separators.push(parameter.path_separator());
        }
    }
    if separators.is_empty() {
        separators.push(DEFAULT_PATH_SEPARATOR);
    }
    separators.sort_by_key(|s| Reverse(s.len()));

    let pattern = separators
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&pattern)?)
}

/// Bind a properties/parameters map. Values equal to a parameter's default are
/// not recorded; unknown keys are logged and ignored.
fn bind_values(step: &mut Step, values: &Map<String, Value>) -> BindingResult<()> {
    for (key, value) in values {
        match step.parameter_mut(key) {
            Some(parameter) => {
                parameter.bind_override(value)?;
            }
            None => warn!(step = %step.id, property = %key, "There is an unknown property"),
        }
    }
    Ok(())
}

fn mirror_reference(step: &mut Step, object_ref: &ObjectReference) {
    if let Some(parameter) = step.parameter_mut("kind") {
        parameter.set_value(Value::String(object_ref.kind.clone()));
    }
    if let Some(parameter) = step.parameter_mut("name") {
        parameter.set_value(Value::String(object_ref.name.clone()));
    }
}

fn describe(reference: &BindingStep) -> String {
    match (&reference.uri, &reference.reference) {
        (Some(uri), _) => uri.clone(),
        (None, Some(r)) => format!("{}/{} ({})", r.kind, r.name, r.api_version),
        (None, None) => "<empty>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_catalog::StepCatalog;
    use conduit_model::{Parameter, ParameterType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn jms() -> Step {
        let mut step = Step::new("jms-producer", "jms", kinds::CAMEL_CONNECTOR, StepType::End);
        step.parameters = vec![
            Parameter::new("deliveryDelay", ParameterType::Number).with_default(json!(-1)),
            Parameter::new("destinationName", ParameterType::String).as_path(2),
            Parameter::new("destinationType", ParameterType::String)
                .as_path(1)
                .with_default(json!("queue")),
        ];
        step
    }

    fn bound(step: &Step) -> Vec<(String, Value)> {
        step.bound_values().into_iter().collect()
    }

    #[test]
    fn test_bind_uri_path_and_query() {
        let mut step = jms();
        bind_uri(&mut step, "jms:topic:orders?deliveryDelay=10").unwrap();
        assert_eq!(
            bound(&step),
            vec![
                ("deliveryDelay".to_string(), json!(10)),
                ("destinationName".to_string(), json!("orders")),
                ("destinationType".to_string(), json!("topic")),
            ]
        );
        // positional binding reorders by path order
        let ids: Vec<&str> = step.parameters.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["deliveryDelay", "destinationType", "destinationName"]);
    }

    #[test]
    fn test_extra_segments_and_missing_segments() {
        let mut step = jms();
        bind_uri(&mut step, "jms:topic:orders:extra").unwrap();
        assert_eq!(step.parameter("destinationName").unwrap().value(), Some(&json!("orders")));

        let mut step = jms();
        bind_uri(&mut step, "jms:topic").unwrap();
        assert_eq!(step.parameter("destinationType").unwrap().value(), Some(&json!("topic")));
        assert_eq!(step.parameter("destinationName").unwrap().value(), None);

        let mut step = jms();
        bind_uri(&mut step, "jms:").unwrap();
        assert!(step.bound_values().is_empty());
    }

    #[test]
    fn test_separators_are_literal() {
        let mut step = Step::new("file-consumer", "file", kinds::CAMEL_CONNECTOR, StepType::Start);
        step.parameters = vec![
            Parameter::new("host", ParameterType::String).as_path(1),
            Parameter::new("port", ParameterType::Number)
                .as_path(2)
                .with_path_separator("."),
            Parameter::new("directory", ParameterType::String)
                .as_path(3)
                .with_path_separator("/"),
        ];
        bind_uri(&mut step, "file:localhost.8080/inbox").unwrap();
        assert_eq!(
            bound(&step),
            vec![
                ("directory".to_string(), json!("inbox")),
                ("host".to_string(), json!("localhost")),
                ("port".to_string(), json!(8080)),
            ]
        );
    }

    #[test]
    fn test_query_keys_are_case_insensitive_and_last_wins() {
        let mut step = jms();
        bind_uri(&mut step, "jms:queue:a?DELIVERYDELAY=5&deliveryDelay=7").unwrap();
        assert_eq!(step.parameter("deliveryDelay").unwrap().value(), Some(&json!(7)));
    }

    #[test]
    fn test_coercion_failure_drops_reference() {
        let catalog = StepCatalog::from_steps(vec![jms()]);
        let snapshot = catalog.snapshot();
        let engine = BindingEngine::default();

        let reference = BindingStep::from_uri("jms:queue:a?deliveryDelay=soon");
        assert!(engine.resolve_step(&reference, StepType::End, &snapshot).is_none());
    }

    #[test]
    fn test_bind_values_skip_defaults() {
        let mut step = jms();
        let values: Map<String, Value> = serde_json::from_value(json!({
            "destinationType": "queue",
            "DeliveryDelay": "25",
            "unknown": true
        }))
        .unwrap();
        bind_values(&mut step, &values).unwrap();
        assert_eq!(bound(&step), vec![("deliveryDelay".to_string(), json!(25))]);
    }

    #[test]
    fn test_uri_match_prefers_highest_priority_kind() {
        let connector = Step::new("log-action", "log", kinds::CAMEL_CONNECTOR, StepType::Middle);
        let kamelet = Step::new("log", "log", kinds::KAMELET, StepType::Middle);
        let eip = Step::new("log-eip", "log", kinds::EIP, StepType::Middle);
        let catalog = StepCatalog::from_steps(vec![kamelet, eip, connector]);
        let snapshot = catalog.snapshot();

        let engine = BindingEngine::default();
        let step = engine.match_uri("log:info", StepType::Middle, &snapshot).unwrap();
        assert_eq!(step.id, "log-action");
    }

    #[test]
    fn test_uri_match_prefers_requested_type_within_kind() {
        let catalog = StepCatalog::from_steps(vec![
            Step::new("timer-action", "timer", kinds::CAMEL_CONNECTOR, StepType::Middle),
            Step::new("timer-consumer", "timer", kinds::CAMEL_CONNECTOR, StepType::Start),
            Step::new("timer-producer", "timer", kinds::CAMEL_CONNECTOR, StepType::End),
        ]);
        let snapshot = catalog.snapshot();
        let engine = BindingEngine::default();

        assert_eq!(
            engine.match_uri("timer:tick", StepType::Start, &snapshot).unwrap().id,
            "timer-consumer"
        );
        assert_eq!(
            engine.match_uri("timer:tick", StepType::End, &snapshot).unwrap().id,
            "timer-producer"
        );
    }

    #[test]
    fn test_uri_without_scheme_resolves_to_nothing() {
        let catalog = StepCatalog::from_steps(vec![Step::new(
            "timer-consumer",
            "timer",
            kinds::CAMEL_CONNECTOR,
            StepType::Start,
        )]);
        let snapshot = catalog.snapshot();
        let engine = BindingEngine::default();

        assert!(engine.match_uri("timer", StepType::Start, &snapshot).is_none());
        assert!(engine
            .resolve_step(&BindingStep::from_uri("timer"), StepType::Start, &snapshot)
            .is_none());
        assert_eq!(
            engine
                .resolve_step(&BindingStep::from_uri("timer:tick"), StepType::Start, &snapshot)
                .unwrap()
                .id,
            "timer-consumer"
        );
    }

    #[test]
    fn test_ref_match_prefers_lowest_priority_kind() {
        let catalog = StepCatalog::from_steps(vec![
            Step::new("slack-sink", "slack", kinds::KAMELET, StepType::End),
            Step::new("slack-producer", "slack", kinds::CAMEL_CONNECTOR, StepType::End),
            Step::new("slack-source", "slack", kinds::KAMELET, StepType::Start),
        ]);
        let snapshot = catalog.snapshot();
        let engine = BindingEngine::default();

        let any_kind = ObjectReference::new("slack", "", "camel.apache.org/v1alpha1");
        assert_eq!(
            engine.match_ref(&any_kind, StepType::End, &snapshot).unwrap().id,
            "slack-sink"
        );

        let connector = ObjectReference::new("slack", "camel-connector", "camel.apache.org/v1alpha1");
        assert_eq!(
            engine.match_ref(&connector, StepType::End, &snapshot).unwrap().id,
            "slack-producer"
        );
        assert!(engine.match_ref(&connector, StepType::Middle, &snapshot).is_none());
    }

    #[test]
    fn test_priority() {
        let engine = BindingEngine::default();
        assert_eq!(engine.priority("kamelet"), 0);
        assert_eq!(engine.priority("Camel-Connector"), 2);
        assert_eq!(engine.priority("EIP"), -1);
    }
}
