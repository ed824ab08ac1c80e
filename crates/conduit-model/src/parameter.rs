use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

use crate::error::ModelError;

/// Separator used between positional path segments when a descriptor declares none
pub const DEFAULT_PATH_SEPARATOR: &str = ":";

/// The value kinds a parameter can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
}

impl ParameterType {
    /// Map a schema type name onto a parameter type.
    ///
    /// Unknown or structured schema types fall back to `Object`.
    pub fn from_schema_type(schema_type: &str) -> Self {
        match schema_type.trim().to_ascii_lowercase().as_str() {
            "string" | "duration" => ParameterType::String,
            "integer" | "number" => ParameterType::Number,
            "boolean" => ParameterType::Boolean,
            _ => ParameterType::Object,
        }
    }

    /// Convert a raw value into this type, or `None` when it has no representation.
    pub fn coerce(&self, raw: &Value) -> Option<Value> {
        if raw.is_null() {
            return Some(Value::Null);
        }

        match self {
            ParameterType::String => match raw {
                Value::String(_) => Some(raw.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                other => Some(Value::String(other.to_string())),
            },
            ParameterType::Number => match raw {
                Value::Number(_) => Some(raw.clone()),
                Value::String(s) => parse_number(s.trim()),
                _ => None,
            },
            ParameterType::Boolean => match raw {
                Value::Bool(_) => Some(raw.clone()),
                Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
                Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
                _ => None,
            },
            ParameterType::Object => Some(raw.clone()),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
        };
        f.write_str(name)
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn default_path_separator() -> String {
    DEFAULT_PATH_SEPARATOR.to_string()
}

/// A named, typed configuration slot on a step.
///
/// `id`, type and default are fixed once the parameter is built; only the bound
/// value changes during binding resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    id: String,
    title: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(rename = "type")]
    param_type: ParameterType,
    #[serde(default)]
    path: bool,
    #[serde(default = "default_path_separator")]
    path_separator: String,
    #[serde(default)]
    path_order: u32,
}

impl Parameter {
    /// Create a parameter whose title and description are the humanized id
    pub fn new(id: impl Into<String>, param_type: ParameterType) -> Self {
        let id = id.into();
        let title = crate::text::humanize(&id);
        Self {
            description: title.clone(),
            title,
            id,
            default_value: None,
            value: None,
            param_type,
            path: false,
            path_separator: default_path_separator(),
            path_order: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the default; it is stored already converted to the parameter's type
    /// when a conversion exists.
    pub fn with_default(mut self, default_value: Value) -> Self {
        let converted = self.param_type.coerce(&default_value).unwrap_or(default_value);
        self.default_value = if converted.is_null() { None } else { Some(converted) };
        self
    }

    /// Mark the parameter as a positional path segment with the given order
    pub fn as_path(mut self, order: u32) -> Self {
        self.path = true;
        self.path_order = order;
        self
    }

    pub fn with_path_separator(mut self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        if !separator.is_empty() {
            self.path_separator = separator;
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }

    pub fn is_path(&self) -> bool {
        self.path
    }

    pub fn path_separator(&self) -> &str {
        &self.path_separator
    }

    pub fn path_order(&self) -> u32 {
        self.path_order
    }

    /// Case-insensitive id comparison
    pub fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }

    /// The bound value, falling back to the default
    pub fn effective_value(&self) -> Option<&Value> {
        self.value.as_ref().or(self.default_value.as_ref())
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
    }

    /// Convert a raw value to this parameter's declared type.
    pub fn convert_to_type(&self, raw: &Value) -> Result<Value, ModelError> {
        self.param_type
            .coerce(raw)
            .ok_or_else(|| ModelError::Coercion {
                parameter: self.id.clone(),
                expected: self.param_type,
                value: raw.to_string(),
            })
    }

    /// Convert and bind `raw`, unless the converted value equals the default.
    ///
    /// Returns whether a value was recorded.
    pub fn bind_override(&mut self, raw: &Value) -> Result<bool, ModelError> {
        let converted = self.convert_to_type(raw)?;
        if self.default_value.as_ref() == Some(&converted) {
            return Ok(false);
        }
        self.value = Some(converted);
        Ok(true)
    }

    /// Convert and bind `raw` unconditionally
    pub fn bind(&mut self, raw: &Value) -> Result<(), ModelError> {
        let converted = self.convert_to_type(raw)?;
        self.value = Some(converted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_type_mapping() {
        assert_eq!(ParameterType::from_schema_type("string"), ParameterType::String);
        assert_eq!(ParameterType::from_schema_type("duration"), ParameterType::String);
        assert_eq!(ParameterType::from_schema_type("integer"), ParameterType::Number);
        assert_eq!(ParameterType::from_schema_type("NUMBER"), ParameterType::Number);
        assert_eq!(ParameterType::from_schema_type("boolean"), ParameterType::Boolean);
        assert_eq!(ParameterType::from_schema_type("array"), ParameterType::Object);
        assert_eq!(ParameterType::from_schema_type("whatever"), ParameterType::Object);
    }

    #[test]
    fn test_number_coercion() {
        let p = Parameter::new("period", ParameterType::Number);
        assert_eq!(p.convert_to_type(&json!("1000")).unwrap(), json!(1000));
        assert_eq!(p.convert_to_type(&json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(p.convert_to_type(&json!(7)).unwrap(), json!(7));
        assert!(p.convert_to_type(&json!("soon")).is_err());
        assert!(p.convert_to_type(&json!(true)).is_err());
    }

    #[test]
    fn test_boolean_coercion() {
        let p = Parameter::new("lazy", ParameterType::Boolean);
        assert_eq!(p.convert_to_type(&json!("TRUE")).unwrap(), json!(true));
        assert_eq!(p.convert_to_type(&json!("false")).unwrap(), json!(false));
        assert_eq!(p.convert_to_type(&json!(false)).unwrap(), json!(false));
        assert!(p.convert_to_type(&json!("maybe")).is_err());
    }

    #[test]
    fn test_string_coercion() {
        let p = Parameter::new("name", ParameterType::String);
        assert_eq!(p.convert_to_type(&json!(42)).unwrap(), json!("42"));
        assert_eq!(p.convert_to_type(&json!(true)).unwrap(), json!("true"));
        assert_eq!(p.convert_to_type(&json!("x")).unwrap(), json!("x"));
    }

    #[test]
    fn test_object_passthrough() {
        let p = Parameter::new("headers", ParameterType::Object);
        let raw = json!({"a": [1, 2]});
        assert_eq!(p.convert_to_type(&raw).unwrap(), raw);
    }

    #[test]
    fn test_bind_override_skips_default() {
        let mut p = Parameter::new("period", ParameterType::Number).with_default(json!(1000));
        assert!(!p.bind_override(&json!("1000")).unwrap());
        assert!(p.value().is_none());
        assert!(p.bind_override(&json!("250")).unwrap());
        assert_eq!(p.value(), Some(&json!(250)));
        assert_eq!(p.effective_value(), Some(&json!(250)));
    }

    #[test]
    fn test_default_is_converted() {
        let p = Parameter::new("period", ParameterType::Number).with_default(json!("1000"));
        assert_eq!(p.default_value(), Some(&json!(1000)));
    }

    #[test]
    fn test_humanized_title() {
        let p = Parameter::new("bridgeErrorHandler", ParameterType::Boolean);
        assert_eq!(p.title(), "Bridge Error Handler");
        assert_eq!(p.description(), "Bridge Error Handler");
        assert_eq!(p.path_separator(), ":");
        assert!(!p.is_path());
    }

    #[test]
    fn test_serde_shape() {
        let p = Parameter::new("name", ParameterType::String)
            .with_default(json!("d1"))
            .as_path(1);
        let encoded = serde_json::to_value(&p).unwrap();
        assert_eq!(encoded["type"], json!("string"));
        assert_eq!(encoded["defaultValue"], json!("d1"));
        assert_eq!(encoded["path"], json!(true));
        assert_eq!(encoded["pathSeparator"], json!(":"));
        assert!(encoded.get("value").is_none());
    }
}
