use conduit_model::{humanize, kinds, Parameter, ParameterType, Step, StepType};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use super::DescriptorParser;
use crate::error::{CatalogError, CatalogResult};
use crate::source::RawDescriptor;

/// Id of the parameter every component step carries for its in-route identifier
pub const STEP_ID_PARAMETER: &str = "step-id";

/// Parses component schema documents (`*.json`).
///
/// One document yields up to three steps: `<name>-consumer` (START),
/// `<name>-producer` (END) and `<name>-action` (MIDDLE).
#[derive(Debug, Default, Clone, Copy)]
pub struct ComponentDescriptorParser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentHeader {
    #[serde(default)]
    kind: Option<String>,
    name: String,
    #[serde(default)]
    scheme: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    syntax: Option<String>,
    #[serde(default)]
    consumer_only: bool,
    #[serde(default)]
    producer_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertySchema {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    schema_type: Option<String>,
    #[serde(default)]
    default_value: Option<Value>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    group: Option<String>,
}

impl PropertySchema {
    fn is_path(&self) -> bool {
        self.kind
            .as_deref()
            .map_or(false, |k| k.eq_ignore_ascii_case("path"))
    }

    fn tags(&self) -> String {
        format!(
            "{} {}",
            self.label.as_deref().unwrap_or_default(),
            self.group.as_deref().unwrap_or_default()
        )
        .to_ascii_lowercase()
    }

    fn consumer_only(&self) -> bool {
        let tags = self.tags();
        tags.contains("consumer") && !tags.contains("producer")
    }

    fn producer_only(&self) -> bool {
        let tags = self.tags();
        tags.contains("producer") && !tags.contains("consumer")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Consumer,
    Producer,
    Action,
}

impl Variant {
    fn suffix(&self) -> &'static str {
        match self {
            Variant::Consumer => "consumer",
            Variant::Producer => "producer",
            Variant::Action => "action",
        }
    }

    fn step_type(&self) -> StepType {
        match self {
            Variant::Consumer => StepType::Start,
            Variant::Producer => StepType::End,
            Variant::Action => StepType::Middle,
        }
    }

    fn includes(&self, property: &PropertySchema) -> bool {
        if property.is_path() {
            return true;
        }
        match self {
            Variant::Consumer => !property.producer_only(),
            Variant::Producer | Variant::Action => !property.consumer_only(),
        }
    }
}

/// Position and separator of each path parameter, derived from the endpoint syntax
#[derive(Debug, Default)]
struct PathLayout {
    positions: HashMap<String, (u32, String)>,
}

impl PathLayout {
    /// Read `scheme:first:second`-style syntax. Each path parameter gets the
    /// literal text that precedes it; parameters missing from the syntax are
    /// ordered after those present, in declaration order.
    fn new(syntax: Option<&str>, scheme: &str, declared_paths: &[&str]) -> Self {
        let mut layout = PathLayout::default();

        if let Some(syntax) = syntax {
            let prefix = format!("{}:", scheme);
            let remainder = syntax.strip_prefix(prefix.as_str()).unwrap_or(syntax);

            let mut order = 0u32;
            let mut pending_separator = String::new();
            let mut first = true;
            for (token, is_ident) in tokenize(remainder) {
                if !is_ident {
                    pending_separator = token.to_string();
                    continue;
                }
                if declared_paths.contains(&token) && !layout.positions.contains_key(token) {
                    order += 1;
                    // text before the first parameter is part of the scheme prefix
                    let separator = if first || pending_separator.is_empty() {
                        conduit_model::DEFAULT_PATH_SEPARATOR.to_string()
                    } else {
                        pending_separator.clone()
                    };
                    layout.positions.insert(token.to_string(), (order, separator));
                    first = false;
                }
                pending_separator.clear();
            }
        }

        let mut order = layout.positions.len() as u32;
        for id in declared_paths {
            if !layout.positions.contains_key(*id) {
                order += 1;
                layout.positions.insert(
                    id.to_string(),
                    (order, conduit_model::DEFAULT_PATH_SEPARATOR.to_string()),
                );
            }
        }

        layout
    }

    fn position(&self, id: &str) -> Option<&(u32, String)> {
        self.positions.get(id)
    }
}

/// Split into alternating separator and identifier runs
fn tokenize(input: &str) -> Vec<(&str, bool)> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current_ident: Option<bool> = None;

    for (i, c) in input.char_indices() {
        let is_ident = c.is_alphanumeric() || c == '_';
        match current_ident {
            Some(kind) if kind == is_ident => {}
            Some(kind) => {
                tokens.push((&input[start..i], kind));
                start = i;
                current_ident = Some(is_ident);
            }
            None => current_ident = Some(is_ident),
        }
    }
    if let Some(kind) = current_ident {
        tokens.push((&input[start..], kind));
    }
    tokens
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ComponentDescriptorParser {
    fn build_parameter(id: &str, schema: &PropertySchema, layout: &PathLayout) -> Parameter {
        let param_type =
            ParameterType::from_schema_type(schema.schema_type.as_deref().unwrap_or("object"));
        let mut parameter = Parameter::new(id, param_type)
            .with_title(non_blank(&schema.display_name).unwrap_or_else(|| humanize(id)))
            .with_description(non_blank(&schema.description).unwrap_or_else(|| humanize(id)));

        if let Some(default_value) = &schema.default_value {
            parameter = parameter.with_default(default_value.clone());
        }

        if schema.is_path() {
            if let Some((order, separator)) = layout.position(id) {
                parameter = parameter.as_path(*order).with_path_separator(separator.clone());
            }
        }

        parameter
    }

    fn step_id_parameter() -> Parameter {
        Parameter::new(STEP_ID_PARAMETER, ParameterType::String)
            .with_title("Step ID")
            .with_description("Identifier of this step inside the route.")
    }
}

impl DescriptorParser for ComponentDescriptorParser {
    fn identifier(&self) -> &'static str {
        "component"
    }

    fn applies_to(&self, file_name: &str) -> bool {
        file_name.to_ascii_lowercase().ends_with(".json")
    }

    fn parse(&self, descriptor: &RawDescriptor) -> CatalogResult<Vec<Step>> {
        let document: Value = serde_json::from_str(&descriptor.content)
            .map_err(|e| CatalogError::descriptor(&descriptor.name, e))?;

        let Some(header_value) = document.get("component") else {
            debug!(file = %descriptor.name, "No component section, skipping");
            return Ok(Vec::new());
        };
        let header: ComponentHeader = serde_json::from_value(header_value.clone())
            .map_err(|e| CatalogError::descriptor(&descriptor.name, e))?;

        if let Some(kind) = &header.kind {
            if !kind.eq_ignore_ascii_case("component") {
                debug!(file = %descriptor.name, kind = %kind, "Not a component descriptor, skipping");
                return Ok(Vec::new());
            }
        }
        if header.name.trim().is_empty() {
            return Err(CatalogError::descriptor(&descriptor.name, "component name is empty"));
        }

        let empty = Map::new();
        let raw_properties = match document.get("properties") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(CatalogError::descriptor(
                    &descriptor.name,
                    "properties must be an object",
                ))
            }
        };

        let mut properties: Vec<(String, PropertySchema)> = Vec::with_capacity(raw_properties.len());
        for (id, raw) in raw_properties {
            let schema: PropertySchema = serde_json::from_value(raw.clone()).map_err(|e| {
                CatalogError::descriptor(&descriptor.name, format!("property {}: {}", id, e))
            })?;
            properties.push((id.clone(), schema));
        }

        let scheme = header.scheme.clone().unwrap_or_else(|| header.name.clone());
        let declared_paths: Vec<&str> = properties
            .iter()
            .filter(|(_, schema)| schema.is_path())
            .map(|(id, _)| id.as_str())
            .collect();
        let layout = PathLayout::new(header.syntax.as_deref(), &scheme, &declared_paths);

        let title = non_blank(&header.title).unwrap_or_else(|| humanize(&header.name));
        let description = non_blank(&header.description).unwrap_or_else(|| humanize(&header.name));

        let variants: &[Variant] = if header.consumer_only {
            &[Variant::Consumer]
        } else if header.producer_only {
            &[Variant::Producer, Variant::Action]
        } else {
            &[Variant::Consumer, Variant::Producer, Variant::Action]
        };

        let mut steps = Vec::with_capacity(variants.len());
        for variant in variants {
            let mut step = Step::new(
                format!("{}-{}", header.name, variant.suffix()),
                header.name.clone(),
                kinds::CAMEL_CONNECTOR,
                variant.step_type(),
            );
            step.title = title.clone();
            step.description = description.clone();

            for (id, schema) in properties.iter().filter(|(_, s)| variant.includes(s)) {
                step.parameters.push(Self::build_parameter(id, schema, &layout));
                if schema.required {
                    step.required.push(id.clone());
                }
            }
            if step.parameter(STEP_ID_PARAMETER).is_none() {
                step.parameters.push(Self::step_id_parameter());
            }

            step.validate()
                .map_err(|e| CatalogError::descriptor(&descriptor.name, e))?;
            steps.push(step);
        }

        Ok(steps)
    }
}
