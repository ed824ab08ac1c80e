//! Integration document parsers.
//!
//! A [`StepParser`] recognises one document format and turns it into resolved
//! steps. The [`ParserRegistry`] uses the first applicable parser to resolve a
//! document and every applicable parser to build views.

use conduit_catalog::CatalogSnapshot;
use conduit_model::{Parameter, Step};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::document::BindingDocument;
use crate::engine::BindingEngine;
use crate::error::{BindingError, BindingResult};

lazy_static! {
    // `kind: KameletBinding` in YAML, or `"kind": "KameletBinding"` in JSON
    static ref KAMELET_BINDING_KIND: Regex =
        Regex::new(r#"(?m)(?:^|[\s{,])"?kind"?\s*:\s*"?KameletBinding"?(?:\s|,|\}|$)"#).unwrap();
}

/// Steps plus the document-level data a deployment generator needs to render
/// the integration back
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseResult {
    pub steps: Vec<Step>,
    pub metadata: Map<String, Value>,
    pub parameters: Vec<Parameter>,
}

/// One integration document format
pub trait StepParser: Send + Sync {
    fn identifier(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether `text` carries this format's discriminator
    fn applies_to(&self, text: &str) -> bool;

    /// Resolve the document and capture its metadata
    fn deep_parse(&self, text: &str, snapshot: &CatalogSnapshot) -> BindingResult<ParseResult>;

    /// Resolve the document into its steps
    fn parse(&self, text: &str, snapshot: &CatalogSnapshot) -> BindingResult<Vec<Step>> {
        Ok(self.deep_parse(text, snapshot)?.steps)
    }
}

/// Parser for `KameletBinding` resources
#[derive(Debug, Clone, Default)]
pub struct KameletBindingParser {
    engine: BindingEngine,
}

impl KameletBindingParser {
    pub fn new(engine: BindingEngine) -> Self {
        Self { engine }
    }

    /// Decode `text` without resolving it
    pub fn decode(&self, text: &str) -> BindingResult<BindingDocument> {
        if !self.applies_to(text) {
            return Err(BindingError::UnsupportedFormat(
                "document is not a KameletBinding".to_string(),
            ));
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

impl StepParser for KameletBindingParser {
    fn identifier(&self) -> &'static str {
        "KameletBinding"
    }

    fn description(&self) -> &'static str {
        "Links a source step to a sink step through optional intermediate action steps."
    }

    fn applies_to(&self, text: &str) -> bool {
        KAMELET_BINDING_KIND.is_match(text)
    }

    #[instrument(skip_all, fields(parser = "KameletBinding"))]
    fn deep_parse(&self, text: &str, snapshot: &CatalogSnapshot) -> BindingResult<ParseResult> {
        let document = self.decode(text)?;
        if document.spec.source.is_none() {
            return Err(BindingError::MissingSection("spec.source".to_string()));
        }
        if document.spec.sink.is_none() {
            return Err(BindingError::MissingSection("spec.sink".to_string()));
        }

        let steps = self.engine.resolve(&document, snapshot);
        Ok(ParseResult {
            steps,
            metadata: document.metadata_map(),
            parameters: Vec::new(),
        })
    }
}

/// The steps one parser produced for a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationView {
    pub steps: Vec<Step>,
    pub parser: String,
}

/// Ordered set of integration parsers
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn StepParser>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self { parsers: Vec::new() }
    }

    pub fn register(mut self, parser: Arc<dyn StepParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.identifier()).collect()
    }

    /// Resolve `text` with the first parser that applies to it
    pub fn deep_resolve(&self, text: &str, snapshot: &CatalogSnapshot) -> BindingResult<ParseResult> {
        let parser = self
            .parsers
            .iter()
            .find(|p| p.applies_to(text))
            .ok_or_else(|| {
                BindingError::UnsupportedFormat("no parser recognises this document".to_string())
            })?;
        debug!(parser = parser.identifier(), "Resolving document");
        parser.deep_parse(text, snapshot)
    }

    pub fn resolve(&self, text: &str, snapshot: &CatalogSnapshot) -> BindingResult<Vec<Step>> {
        Ok(self.deep_resolve(text, snapshot)?.steps)
    }

    /// One view per parser that applies to `text`, in registration order
    pub fn views(&self, text: &str, snapshot: &CatalogSnapshot) -> BindingResult<Vec<IntegrationView>> {
        let mut views = Vec::new();
        for parser in &self.parsers {
            trace!(parser = parser.identifier(), "Using parser");
            if parser.applies_to(text) {
                trace!(parser = parser.identifier(), "Applying parser");
                views.push(IntegrationView {
                    steps: parser.parse(text, snapshot)?,
                    parser: parser.identifier().to_string(),
                });
            }
        }
        Ok(views)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        ParserRegistry::empty().register(Arc::new(KameletBindingParser::default()))
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.identifiers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator() {
        let parser = KameletBindingParser::default();
        assert!(parser.applies_to("apiVersion: v1\nkind: KameletBinding\n"));
        assert!(parser.applies_to("kind: \"KameletBinding\"\nspec: {}"));
        assert!(parser.applies_to(r#"{"apiVersion": "camel.apache.org/v1alpha1", "kind": "KameletBinding"}"#));
        assert!(parser.applies_to(r#"{"kind":"KameletBinding","spec":{}}"#));
        assert!(!parser.applies_to("kind: Kamelet\n"));
        assert!(!parser.applies_to("kind: KameletBindingList\n"));
        assert!(!parser.applies_to("name: KameletBinding\n"));
    }

    #[test]
    fn test_decode_rejects_other_formats() {
        let err = KameletBindingParser::default()
            .decode("kind: Integration\n")
            .unwrap_err();
        assert_eq!(err.error_code(), "ERR_BINDING_UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_registry_identifiers() {
        let registry = ParserRegistry::default();
        assert_eq!(registry.identifiers(), vec!["KameletBinding"]);
        assert!(ParserRegistry::empty().identifiers().is_empty());
    }
}
