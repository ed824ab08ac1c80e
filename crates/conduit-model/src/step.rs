use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::kinds;
use crate::parameter::Parameter;

/// Position of a step inside an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepType {
    Start,
    Middle,
    End,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Start => "START",
            StepType::Middle => "MIDDLE",
            StepType::End => "END",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "START" => Ok(StepType::Start),
            "MIDDLE" => Ok(StepType::Middle),
            "END" => Ok(StepType::End),
            _ => Err(ModelError::InvalidStepType(s.to_string())),
        }
    }
}

/// Normalized catalog entry: one integration building block.
///
/// Steps held by a catalog are templates; binding always works on a clone so
/// the catalog copy keeps its unbound parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique id within a catalog (e.g. `browse-consumer`)
    pub id: String,

    /// Component name shared by all variants (e.g. `browse`)
    pub name: String,

    /// Category tag (connector, kamelet, knative, ...)
    pub kind: String,

    #[serde(rename = "type")]
    pub step_type: StepType,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Ids of parameters that must be provided
    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Step {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        step_type: StepType,
    ) -> Self {
        let name = name.into();
        let title = crate::text::humanize(&name);
        Self {
            id: id.into(),
            description: title.clone(),
            title,
            name,
            kind: kind.into(),
            step_type,
            required: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Whether this step's kind equals `kind`, ignoring case
    pub fn is_kind(&self, kind: &str) -> bool {
        kinds::same_kind(&self.kind, kind)
    }

    /// Case-insensitive parameter lookup
    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.matches_id(id))
    }

    /// Case-insensitive mutable parameter lookup
    pub fn parameter_mut(&mut self, id: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.matches_id(id))
    }

    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_path())
    }

    /// Stable sort of the parameters by their path order.
    ///
    /// Parameters sharing an order keep their declaration order.
    pub fn sort_parameters(&mut self) {
        self.parameters.sort_by_key(|p| p.path_order());
    }

    /// Values explicitly bound on this step, keyed by parameter id
    pub fn bound_values(&self) -> BTreeMap<String, Value> {
        self.parameters
            .iter()
            .filter_map(|p| p.value().map(|v| (p.id().to_string(), v.clone())))
            .collect()
    }

    /// Check the structural invariants: unique parameter ids and required ids
    /// that name existing parameters.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for p in &self.parameters {
            if !seen.insert(p.id().to_ascii_lowercase()) {
                return Err(ModelError::DuplicateParameter {
                    step: self.id.clone(),
                    parameter: p.id().to_string(),
                });
            }
        }

        for required in &self.required {
            if self.parameter(required).is_none() {
                return Err(ModelError::MissingRequiredParameter {
                    step: self.id.clone(),
                    parameter: required.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_step() -> Step {
        let mut step = Step::new("jms-producer", "jms", kinds::CAMEL_CONNECTOR, StepType::End);
        step.parameters = vec![
            Parameter::new("deliveryDelay", ParameterType::Number),
            Parameter::new("destinationName", ParameterType::String).as_path(2),
            Parameter::new("destinationType", ParameterType::String).as_path(1),
        ];
        step.required = vec!["destinationName".into()];
        step
    }

    #[test]
    fn test_step_type_parsing() {
        assert_eq!("start".parse::<StepType>().unwrap(), StepType::Start);
        assert_eq!("MIDDLE".parse::<StepType>().unwrap(), StepType::Middle);
        assert_eq!(" End ".parse::<StepType>().unwrap(), StepType::End);
        assert!("sideways".parse::<StepType>().is_err());
        assert_eq!(StepType::Start.to_string(), "START");
    }

    #[test]
    fn test_parameter_lookup_is_case_insensitive() {
        let mut step = sample_step();
        assert!(step.parameter("DELIVERYDELAY").is_some());
        step.parameter_mut("destinationname").unwrap().set_value(json!("orders"));
        assert_eq!(step.bound_values().get("destinationName"), Some(&json!("orders")));
    }

    #[test]
    fn test_sort_parameters_is_stable() {
        let mut step = sample_step();
        step.sort_parameters();
        let ids: Vec<&str> = step.parameters.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["deliveryDelay", "destinationType", "destinationName"]);
    }

    #[test]
    fn test_validate() {
        let step = sample_step();
        assert!(step.validate().is_ok());

        let mut missing = sample_step();
        missing.required.push("nope".into());
        assert_eq!(
            missing.validate().unwrap_err().error_code(),
            "ERR_MODEL_REQUIRED_PARAMETER"
        );

        let mut dup = sample_step();
        dup.parameters.push(Parameter::new("DeliveryDelay", ParameterType::Number));
        assert_eq!(dup.validate().unwrap_err().error_code(), "ERR_MODEL_DUPLICATE_PARAMETER");
    }

    #[test]
    fn test_clone_is_independent() {
        let template = sample_step();
        let mut copy = template.clone();
        copy.parameter_mut("deliveryDelay").unwrap().set_value(json!(5));
        assert!(template.parameter("deliveryDelay").unwrap().value().is_none());
    }

    #[test]
    fn test_serialized_type_field() {
        let encoded = serde_json::to_value(sample_step()).unwrap();
        assert_eq!(encoded["type"], json!("END"));
        assert_eq!(encoded["kind"], json!("CAMEL-CONNECTOR"));
    }
}
